//! End-to-end anti-entropy convergence between real nodes.

use bytes::Bytes;
use lattice_e2e_tests::{launch_cluster, wait_until};
use lattice_types::{Event, GossipKey, GossipRecord, UnitId};
use std::time::Duration;

const DEADLINE: Duration = Duration::from_secs(15);

#[test]
fn disjoint_facts_converge_across_nodes() {
    let unit = UnitId::new("gossip-e2e");
    let nodes = launch_cluster(&["n1", "n2"], &unit);

    nodes[0].publish(Event::PublishFact(GossipRecord::new(
        "inventory/widgets",
        Bytes::from_static(b"41"),
        0,
    )));
    nodes[1].publish(Event::PublishFact(GossipRecord::new(
        "inventory/gears",
        Bytes::from_static(b"17"),
        0,
    )));

    // Both repositories end up holding both facts with identical values.
    assert!(wait_until(DEADLINE, || {
        nodes.iter().all(|node| node.repo_view.len() == 2)
    }));
    for key in ["inventory/widgets", "inventory/gears"] {
        let key = GossipKey::new(key);
        let a = nodes[0].repo_view.snapshot();
        let b = nodes[1].repo_view.snapshot();
        assert_eq!(a.get(&key), b.get(&key));
        assert!(a.get(&key).is_some());
    }

    for node in nodes {
        node.shutdown();
    }
}

#[test]
fn newer_write_beats_older_one_everywhere() {
    let unit = UnitId::new("gossip-lww");
    let nodes = launch_cluster(&["n1", "n2"], &unit);

    let key = GossipKey::new("config/limit");
    nodes[0].publish(Event::PublishFact(GossipRecord::new(
        "config/limit",
        Bytes::from_static(b"old"),
        1_000,
    )));
    nodes[1].publish(Event::PublishFact(GossipRecord::new(
        "config/limit",
        Bytes::from_static(b"new"),
        2_000,
    )));

    // The higher-timestamp value wins on both sides.
    assert!(wait_until(DEADLINE, || {
        nodes.iter().all(|node| {
            node.repo_view
                .snapshot()
                .get(&key)
                .map(|r| r.value == Bytes::from_static(b"new"))
                .unwrap_or(false)
        })
    }));

    for node in nodes {
        node.shutdown();
    }
}

#[test]
fn three_nodes_reach_the_same_state() {
    let unit = UnitId::new("gossip-three");
    let nodes = launch_cluster(&["n1", "n2", "n3"], &unit);

    for (i, node) in nodes.iter().enumerate() {
        node.publish(Event::PublishFact(GossipRecord::new(
            format!("node-fact/{i}"),
            Bytes::from_static(b"x"),
            0,
        )));
    }

    assert!(wait_until(DEADLINE, || {
        nodes.iter().all(|node| node.repo_view.len() == 3)
    }));

    let reference = nodes[0].repo_view.snapshot();
    for node in &nodes[1..] {
        let snapshot = node.repo_view.snapshot();
        for record in reference.records() {
            assert_eq!(snapshot.get(&record.key), Some(record));
        }
    }

    for node in nodes {
        node.shutdown();
    }
}
