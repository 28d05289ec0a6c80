//! Versioned fact repository.

use lattice_types::{Digest, GossipKey, GossipRecord};
use std::collections::HashMap;

/// Map of key to versioned record, owned exclusively by the disseminator
/// thread; no internal locking.
///
/// `update` is an unconditional upsert: the last-writer-wins comparison by
/// timestamp happens in the caller before the record gets here, which keeps
/// digest production and application O(n) scans with no version arithmetic.
#[derive(Debug, Clone, Default)]
pub struct GossipRepository {
    records: HashMap<GossipKey, GossipRecord>,
}

impl GossipRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &GossipKey) -> Option<&GossipRecord> {
        self.records.get(key)
    }

    pub fn records(&self) -> impl Iterator<Item = &GossipRecord> {
        self.records.values()
    }

    /// O(n) snapshot of versions only.
    pub fn make_digest(&self) -> Digest {
        let mut digest = Digest::new();
        for record in self.records.values() {
            digest.insert(record.key.clone(), record.timestamp_ms);
        }
        digest
    }

    /// Every local record strictly newer than the peer's recorded version,
    /// or absent from the peer's digest entirely.
    pub fn process_digest(&self, digest: &Digest) -> Vec<GossipRecord> {
        self.records
            .values()
            .filter(|record| match digest.version_of(&record.key) {
                Some(peer_version) => record.timestamp_ms > peer_version,
                None => true,
            })
            .cloned()
            .collect()
    }

    /// Unconditional upsert by key.
    pub fn update(&mut self, record: GossipRecord) {
        self.records.insert(record.key.clone(), record);
    }

    pub fn update_all(&mut self, records: impl IntoIterator<Item = GossipRecord>) {
        for record in records {
            self.update(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn record(key: &str, value: &'static [u8], timestamp_ms: u64) -> GossipRecord {
        GossipRecord::new(key, Bytes::from_static(value), timestamp_ms)
    }

    /// Last-writer-wins application used by the disseminator; duplicated
    /// here so repository tests can exercise convergence end to end.
    fn apply_lww(repo: &mut GossipRepository, records: Vec<GossipRecord>) {
        for incoming in records {
            let adopt = match repo.get(&incoming.key) {
                Some(local) => local.timestamp_ms < incoming.timestamp_ms,
                None => true,
            };
            if adopt {
                repo.update(incoming);
            }
        }
    }

    #[test]
    fn own_digest_yields_nothing_newer() {
        let mut repo = GossipRepository::new();
        repo.update(record("a", b"1", 10));
        repo.update(record("b", b"2", 20));

        let digest = repo.make_digest();
        assert!(repo.process_digest(&digest).is_empty());
    }

    #[test]
    fn missing_keys_are_always_offered() {
        let mut repo = GossipRepository::new();
        repo.update(record("a", b"1", 10));

        let offered = repo.process_digest(&Digest::new());
        assert_eq!(offered.len(), 1);
        assert_eq!(offered[0].key, GossipKey::new("a"));
    }

    #[test]
    fn stale_peer_versions_are_refreshed_ties_are_not() {
        let mut repo = GossipRepository::new();
        repo.update(record("a", b"new", 100));
        repo.update(record("b", b"same", 50));

        let mut peer_digest = Digest::new();
        peer_digest.insert(GossipKey::new("a"), 90); // stale
        peer_digest.insert(GossipKey::new("b"), 50); // identical version

        let offered = repo.process_digest(&peer_digest);
        assert_eq!(offered.len(), 1);
        assert_eq!(offered[0].key, GossipKey::new("a"));
    }

    #[test]
    fn update_is_an_unconditional_upsert() {
        let mut repo = GossipRepository::new();
        repo.update(record("a", b"new", 100));
        // No version check at this layer: an older record overwrites.
        repo.update(record("a", b"old", 10));
        assert_eq!(repo.get(&GossipKey::new("a")).map(|r| r.timestamp_ms), Some(10));
    }

    #[test]
    fn disjoint_repositories_converge_and_stabilize() {
        let mut a = GossipRepository::new();
        a.update(record("a1", b"x", 1));
        a.update(record("a2", b"y", 2));
        let mut b = GossipRepository::new();
        b.update(record("b1", b"z", 3));
        b.update(record("b2", b"w", 4));
        b.update(record("b3", b"v", 5));

        // A pulls from B, then B pulls from A.
        apply_lww(&mut a, b.process_digest(&a.make_digest()));
        apply_lww(&mut b, a.process_digest(&b.make_digest()));

        assert_eq!(a.len(), 5);
        assert_eq!(b.len(), 5);
        for key in ["a1", "a2", "b1", "b2", "b3"] {
            let key = GossipKey::new(key);
            assert_eq!(a.get(&key), b.get(&key));
        }

        // Idempotence: another full exchange moves nothing.
        assert!(b.process_digest(&a.make_digest()).is_empty());
        assert!(a.process_digest(&b.make_digest()).is_empty());
    }

    #[test]
    fn barrier_synchronized_threads_see_each_other() {
        use parking_lot::RwLock;
        use std::sync::{Arc, Barrier};

        let repo = Arc::new(RwLock::new(GossipRepository::new()));
        let barrier = Arc::new(Barrier::new(2));

        let writer = |keys: [u64; 2]| {
            let repo = repo.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                for key in keys {
                    repo.write()
                        .update(GossipRecord::new(key.to_string(), Bytes::new(), key));
                }
                // Write phase done on both sides before anyone reads.
                barrier.wait();
                let repo = repo.read();
                let other: [u64; 2] = if keys == [1, 2] { [3, 4] } else { [1, 2] };
                for key in other {
                    assert!(repo.get(&GossipKey::new(key.to_string())).is_some());
                }
            })
        };

        let t1 = writer([1, 2]);
        let t2 = writer([3, 4]);
        t1.join().expect("thread 1");
        t2.join().expect("thread 2");
    }
}
