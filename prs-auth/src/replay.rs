//! Single-use enforcement for solved proofs of work and recovery tokens.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Remembers which single-use digests have been spent.
///
/// Keys are SHA-256 digests, never the proof or token itself.
/// `check_and_insert` is atomic: of two concurrent calls with one key,
/// exactly one sees it as new. An entry must outlive the item it guards,
/// so retention covers the nonce skew span and the recovery token TTL.
pub trait ReplayCache: Send + Sync {
    /// Record `key` if unseen.
    ///
    /// Returns `Ok(true)` if the key was new and has been recorded,
    /// `Ok(false)` if it was already present (a replay), and
    /// [`ReplayCacheFull`] if it is new but there is no room to remember it.
    fn check_and_insert(&self, key: &[u8; 32]) -> Result<bool, ReplayCacheFull>;
}

/// Every slot holds a live entry. The item must be refused: accepting it
/// unrecorded would let it be spent again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("replay cache full, retry later")]
pub struct ReplayCacheFull;

const SWEEP_EVERY: u64 = 1000;

/// In-process spent-digest set with a TTL and a size bound.
///
/// Entries leave only by expiring. When every slot is live, new digests
/// are refused with [`ReplayCacheFull`] until something expires. Concurrent
/// inserters can overshoot the bound by at most their own number.
/// Replicas do not share state, so a proof spent on one instance is fresh
/// on another.
///
/// ```
/// use prs_auth::replay::{TtlReplayCache, ReplayCache};
/// use std::time::Duration;
///
/// let cache = TtlReplayCache::new(Duration::from_secs(1800), 100_000);
/// assert_eq!(cache.check_and_insert(&[7u8; 32]), Ok(true));
/// assert_eq!(cache.check_and_insert(&[7u8; 32]), Ok(false));
/// ```
pub struct TtlReplayCache {
    cache: DashMap<[u8; 32], Instant>, // digest -> first seen
    ttl: Duration,
    max_entries: usize,
    /// Sweeps run every `SWEEP_EVERY` fresh inserts.
    insert_counter: AtomicU64,
}

impl TtlReplayCache {
    #[must_use]
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            cache: DashMap::with_capacity(max_entries / 4),
            ttl,
            max_entries,
            insert_counter: AtomicU64::new(0),
        }
    }

    /// Drop entries older than the TTL. Lookups already ignore them.
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        self.cache.retain(|_, v| now.duration_since(*v) < self.ttl);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn has_room_for(&self, key: &[u8; 32]) -> bool {
        if self.cache.len() < self.max_entries || self.cache.contains_key(key) {
            return true;
        }
        self.cleanup_expired();
        self.cache.len() < self.max_entries
    }
}

impl ReplayCache for TtlReplayCache {
    fn check_and_insert(&self, key: &[u8; 32]) -> Result<bool, ReplayCacheFull> {
        // Sized before taking the entry lock: `len` reads every shard.
        if !self.has_room_for(key) {
            return Err(ReplayCacheFull);
        }

        let now = Instant::now();
        // The shard lock is held for the whole match.
        let fresh = match self.cache.entry(*key) {
            Entry::Occupied(entry) => {
                if now.duration_since(*entry.get()) < self.ttl {
                    false
                } else {
                    entry.replace_entry(now);
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        };

        if fresh {
            let count = self.insert_counter.fetch_add(1, Ordering::Relaxed);
            if count % SWEEP_EVERY == 0 {
                self.cleanup_expired();
            }
        }

        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};
    use std::sync::Arc;
    use std::thread;

    fn digest(item: &str) -> [u8; 32] {
        Sha256::digest(item.as_bytes()).into()
    }

    #[test]
    fn test_spent_digest_is_refused() {
        let cache = TtlReplayCache::new(Duration::from_secs(60), 1000);
        let proof = digest("pow:00a91f");

        assert_eq!(cache.check_and_insert(&proof), Ok(true));
        assert_eq!(cache.check_and_insert(&proof), Ok(false));
        assert_eq!(cache.check_and_insert(&digest("pow:00b3c2")), Ok(true));
    }

    #[test]
    fn test_flooding_cannot_revive_spent_digest() {
        let cache = TtlReplayCache::new(Duration::from_secs(60), 8);
        let spent = digest("pow:spent");
        assert_eq!(cache.check_and_insert(&spent), Ok(true));

        for i in 0..7 {
            assert_eq!(cache.check_and_insert(&digest(&format!("pow:{i}"))), Ok(true));
        }
        for i in 7..20 {
            assert_eq!(
                cache.check_and_insert(&digest(&format!("pow:{i}"))),
                Err(ReplayCacheFull)
            );
        }

        assert_eq!(cache.len(), 8);
        assert_eq!(cache.check_and_insert(&spent), Ok(false));
    }

    #[test]
    fn test_full_cache_admits_after_expiry() {
        let cache = TtlReplayCache::new(Duration::from_millis(10), 2);
        assert_eq!(cache.check_and_insert(&digest("a")), Ok(true));
        assert_eq!(cache.check_and_insert(&digest("b")), Ok(true));
        assert_eq!(cache.check_and_insert(&digest("c")), Err(ReplayCacheFull));

        thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.check_and_insert(&digest("c")), Ok(true));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_one_winner_under_contention() {
        let cache = Arc::new(TtlReplayCache::new(Duration::from_secs(60), 10_000));
        let key = digest("recovery-jwt");

        let winners = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.check_and_insert(&key))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|fresh| *fresh == Ok(true))
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_expiry_frees_the_digest() {
        let cache = TtlReplayCache::new(Duration::from_millis(10), 1000);
        let key = digest("pow:expired");

        assert_eq!(cache.check_and_insert(&key), Ok(true));
        thread::sleep(Duration::from_millis(20));
        cache.cleanup_expired();
        assert!(cache.is_empty());
        assert_eq!(cache.check_and_insert(&key), Ok(true));
    }
}
