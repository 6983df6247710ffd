use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::clock::{Clock, TokioClock};

/// Number of expired keys removed under a single write lock while sweeping.
pub const SWEEP_BATCH_SIZE: usize = 64;

/// The Store is responsible for managing key-value pairs, with optional expiration instants for
/// each key. Expired keys are never returned: reads evict them lazily, and a periodic sweep
/// (see [`sweep_expired_keys`]) reclaims the ones nobody reads again.
///
/// The store is thread-safe and cheap to clone, every clone shares the same entries.
#[derive(Clone)]
pub struct Store {
    inner: Arc<InnerStore>,
}

struct InnerStore {
    entries: RwLock<HashMap<Key, Entry>>,
    clock: Arc<dyn Clock>,
}

type Key = String;

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub data: Bytes,
    pub expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

impl Store {
    pub fn new() -> Store {
        Self::with_clock(TokioClock)
    }

    pub fn with_clock(clock: impl Clock + 'static) -> Store {
        let inner = Arc::new(InnerStore {
            entries: RwLock::new(HashMap::new()),
            clock: Arc::new(clock),
        });

        Self { inner }
    }

    pub fn now(&self) -> Instant {
        self.inner.clock.now()
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        let now = self.now();

        {
            let entries = self.inner.entries.read();
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired(now) => return Some(entry.data.clone()),
                Some(_) => {}
            }
        }

        // The read guard is gone at this point; another writer may have replaced the entry
        // before we get the write guard, so check again before evicting.
        let mut entries = self.inner.entries.write();
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
            debug!(key, "Evicted expired key on read");
        }

        None
    }

    /// Replaces whatever is stored under `key`, including its expiration.
    pub fn set(&self, key: Key, data: Bytes, expires_at: Option<Instant>) {
        let entry = Entry { data, expires_at };
        self.inner.entries.write().insert(key, entry);
    }

    pub fn remove(&self, key: &str) -> bool {
        self.inner.entries.write().remove(key).is_some()
    }

    /// Number of entries held, including expired ones that were not evicted yet.
    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry whose expiration instant has passed and returns how many were removed.
    ///
    /// Expired keys are collected under the read lock, then deleted in batches of
    /// [`SWEEP_BATCH_SIZE`] so clients are never locked out for the length of a full scan.
    pub fn remove_expired_keys(&self) -> usize {
        let now = self.now();

        let expired: Vec<Key> = self
            .inner
            .entries
            .read()
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        let mut removed = 0;
        for batch in expired.chunks(SWEEP_BATCH_SIZE) {
            let mut entries = self.inner.entries.write();
            for key in batch {
                // The key may have been set again since the snapshot was taken.
                if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
                    entries.remove(key);
                    removed += 1;
                }
            }
        }

        removed
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

/// Periodically sweeps expired keys out of `store` until `shutdown` is cancelled.
pub async fn sweep_expired_keys(store: Store, period: Duration, shutdown: CancellationToken) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Expiry sweeper stopped");
                return;
            }
            _ = interval.tick() => {}
        }

        let removed = store.remove_expired_keys();
        if removed > 0 {
            debug!(removed, remaining = store.len(), "Swept expired keys");
        }
    }
}
