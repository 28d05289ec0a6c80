//! End-to-end two-phase commit across three nodes over loopback TCP.

use bytes::Bytes;
use lattice_e2e_tests::{launch_cluster, wait_until, AutoValidator, Recorder, TEST_ROUND_TIMEOUT_MS};
use lattice_types::{Event, EventKind, Proposal, UnitId};
use std::time::Duration;

const DEADLINE: Duration = Duration::from_secs(15);

#[test]
fn unanimous_cluster_commits() {
    let unit = UnitId::new("commit-test");
    let mut nodes = launch_cluster(&["n1", "n2", "n3"], &unit);

    // Every node's application validates everything.
    for node in nodes.iter_mut() {
        node.add_actor(AutoValidator::new(unit.clone(), Some(true)));
    }
    let (recorder, reached) = Recorder::new(vec![EventKind::ConsensusReached]);
    nodes[0].add_actor(recorder);
    let (commit_recorder, commits) = Recorder::new(vec![EventKind::CommitDecision]);
    nodes[1].add_actor(commit_recorder);

    let proposal = Proposal::new(Bytes::from_static(b"insert into t values (1)"));
    nodes[0].publish(Event::ConsensusRequest {
        unit: unit.clone(),
        proposal: proposal.clone(),
    });

    let decision = reached
        .recv_timeout(DEADLINE)
        .expect("consensus should decide");
    match decision {
        Event::ConsensusReached {
            proposal: decided,
            committed,
            ..
        } => {
            assert_eq!(decided, proposal);
            assert!(committed, "unanimous accepts must commit");
        }
        other => panic!("unexpected event {other:?}"),
    }

    // Acceptors on other nodes got the phase-two broadcast.
    let commit = commits
        .recv_timeout(DEADLINE)
        .expect("acceptor should see commit");
    match commit {
        Event::CommitDecision {
            proposal: decided,
            commit,
            ..
        } => {
            assert_eq!(decided, proposal);
            assert!(commit);
        }
        other => panic!("unexpected event {other:?}"),
    }

    for node in nodes {
        node.shutdown();
    }
}

#[test]
fn single_rejection_aborts_the_round() {
    let unit = UnitId::new("abort-test");
    let mut nodes = launch_cluster(&["n1", "n2", "n3"], &unit);

    nodes[0].add_actor(AutoValidator::new(unit.clone(), Some(true)));
    nodes[1].add_actor(AutoValidator::new(unit.clone(), Some(false)));
    nodes[2].add_actor(AutoValidator::new(unit.clone(), Some(true)));
    let (recorder, reached) = Recorder::new(vec![EventKind::ConsensusReached]);
    nodes[0].add_actor(recorder);

    nodes[0].publish(Event::ConsensusRequest {
        unit: unit.clone(),
        proposal: Proposal::new(Bytes::from_static(b"drop table users")),
    });

    let decision = reached
        .recv_timeout(DEADLINE)
        .expect("consensus should decide");
    match decision {
        Event::ConsensusReached { committed, .. } => {
            assert!(!committed, "one reject must abort the round");
        }
        other => panic!("unexpected event {other:?}"),
    }

    for node in nodes {
        node.shutdown();
    }
}

#[test]
fn silent_acceptors_force_a_deadline_abort() {
    let unit = UnitId::new("deadline-test");
    let mut nodes = launch_cluster(&["n1", "n2"], &unit);

    // n1 validates; n2's application never answers, so its vote never
    // arrives and only the deadline can decide the round.
    nodes[0].add_actor(AutoValidator::new(unit.clone(), Some(true)));
    nodes[1].add_actor(AutoValidator::new(unit.clone(), None));
    let (recorder, reached) = Recorder::new(vec![EventKind::ConsensusReached]);
    nodes[0].add_actor(recorder);

    let started = std::time::Instant::now();
    nodes[0].publish(Event::ConsensusRequest {
        unit: unit.clone(),
        proposal: Proposal::new(Bytes::from_static(b"update t set x = 2")),
    });

    let decision = reached
        .recv_timeout(DEADLINE)
        .expect("deadline must decide the round");
    match decision {
        Event::ConsensusReached { committed, .. } => {
            assert!(!committed, "deadline expiry must abort");
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert!(
        started.elapsed() >= Duration::from_millis(TEST_ROUND_TIMEOUT_MS),
        "decision cannot precede the round deadline"
    );

    for node in nodes {
        node.shutdown();
    }
}

#[test]
fn suspect_matrix_learns_peers_transitively() {
    let unit = UnitId::new("suspect-test");
    let nodes = launch_cluster(&["n1", "n2", "n3"], &unit);

    // Every node eventually holds an entry for every other node, learned
    // directly or through a third party's vector.
    assert!(wait_until(DEADLINE, || {
        nodes.iter().all(|node| {
            let snapshot = node.suspect_view.snapshot();
            nodes
                .iter()
                .all(|other| snapshot.get(&other.node_id).is_some())
        })
    }));

    for node in nodes {
        node.shutdown();
    }
}
