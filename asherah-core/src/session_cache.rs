//! Session caching implementation for the application encryption library
//!
//! Sessions are reference-counted by partition id: concurrent callers for the
//! same partition id share one underlying session (and its intermediate key
//! cache), and a session is only eligible for eviction once its usage count
//! has dropped to zero and stayed there for `sessionCacheExpire`.

use crate::cache::CachePolicy;
use crate::envelope::DataRowRecord;
use crate::error::{Error, Result};
use crate::session::EnvelopeSession;
use crate::Encryption;

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Interface for session caching
pub trait SessionCache: Send + Sync {
    /// Get a session for the given partition ID
    fn get(&self, id: &str) -> Result<Arc<EnvelopeSession>>;

    /// Returns the number of sessions in the cache
    fn count(&self) -> usize;

    /// Close the session cache and all sessions
    fn close(&self);
}

/// Shared encryption wrapper to track concurrent session usage.
///
/// `close()` is the release signal a caller sends when done with a session
/// handle; it decrements the usage count rather than tearing anything down.
/// Only the cache (via [`SharedEncryption::destroy`]) actually releases the
/// wrapped encryption.
pub struct SharedEncryption {
    /// Inner encryption implementation
    inner: Arc<dyn Encryption>,

    /// Creation time
    created: Instant,

    /// Access counter for reference tracking
    access_counter: Mutex<usize>,

    /// Set when the counter last dropped to zero; cleared on reuse.
    /// `None` while in use or never yet released.
    idle_since: Mutex<Option<Instant>>,

    /// Condition variable, signalled whenever the usage counter changes
    cond: Condvar,

    /// Set once the cache has destroyed this slot; further use fails closed.
    closed: AtomicBool,
}

impl SharedEncryption {
    /// Create a new shared encryption wrapper
    pub fn new(encryption: Arc<dyn Encryption>) -> Self {
        Self {
            inner: encryption,
            created: Instant::now(),
            access_counter: Mutex::new(0),
            idle_since: Mutex::new(None),
            cond: Condvar::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Increment the usage counter, marking the slot as in use.
    pub fn increment_usage(&self) {
        let mut counter = self.access_counter.lock().unwrap();
        *counter += 1;
        *self.idle_since.lock().unwrap() = None;
        self.cond.notify_all();
    }

    /// Current number of live handles for this slot.
    pub fn usage_count(&self) -> usize {
        *self.access_counter.lock().unwrap()
    }

    /// When this slot last dropped to a usage count of zero, or `None` if it
    /// is currently in use (or has never been released).
    pub fn idle_since(&self) -> Option<Instant> {
        *self.idle_since.lock().unwrap()
    }

    /// Unconditionally tears down the wrapped encryption and fails closed.
    /// The caller is responsible for only calling this on slots it has
    /// already removed from the cache's map.
    pub fn destroy(&self) {
        self.closed.store(true, Ordering::Release);
        let _ = futures::executor::block_on(self.inner.close());
        self.cond.notify_all();
    }
}

#[async_trait]
impl Encryption for SharedEncryption {
    async fn encrypt_payload(&self, data: &[u8]) -> Result<DataRowRecord> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ClosedSession);
        }
        self.inner.encrypt_payload(data).await
    }

    async fn decrypt_data_row_record(&self, drr: &DataRowRecord) -> Result<Vec<u8>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ClosedSession);
        }
        self.inner.decrypt_data_row_record(drr).await
    }

    async fn close(&self) -> Result<()> {
        let mut counter = self.access_counter.lock().unwrap();
        if *counter > 0 {
            *counter -= 1;
        }
        if *counter == 0 {
            *self.idle_since.lock().unwrap() = Some(Instant::now());
        }
        self.cond.notify_all();
        Ok(())
    }

    fn as_any(&self) -> &(dyn std::any::Any + Send + Sync) {
        self
    }
}

impl fmt::Debug for SharedEncryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedEncryption")
            .field("created", &self.created)
            .field("usage_count", &self.usage_count())
            .finish()
    }
}

/// Session loader function type
type SessionLoaderFn = Arc<dyn Fn(&str) -> Result<Arc<EnvelopeSession>> + Send + Sync>;

/// A single cache slot: the session handed out to callers plus the shared
/// encryption wrapper that tracks its usage count and idle time.
struct Slot {
    session: Arc<EnvelopeSession>,
    shared: Arc<SharedEncryption>,
}

/// Cache wrapper for session cache
pub struct CacheWrapper {
    /// Session loader function
    loader: SessionLoaderFn,

    /// Maximum number of slots before compaction kicks in
    max_size: usize,

    /// Sliding idle TTL since a slot's usage count last dropped to zero
    ttl: Option<Duration>,

    /// All live slots, keyed by partition id
    slots: Mutex<HashMap<String, Slot>>,

    /// Set once `close()` has torn down every slot
    closed: AtomicBool,
}

impl CacheWrapper {
    /// Create a new cache wrapper
    pub fn new(
        loader: SessionLoaderFn,
        max_size: usize,
        expiry: Option<Duration>,
        _eviction_policy: CachePolicy,
    ) -> Self {
        Self {
            loader,
            max_size: max_size.max(1),
            ttl: expiry,
            slots: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Removes slots whose sliding TTL has elapsed. Slots still in use
    /// (usage count > 0) are never touched, regardless of age.
    fn sweep_expired_locked(&self, slots: &mut HashMap<String, Slot>) {
        let Some(ttl) = self.ttl else {
            return;
        };
        let now = Instant::now();
        let expired: Vec<String> = slots
            .iter()
            .filter(|(_, slot)| {
                slot.shared.usage_count() == 0
                    && slot
                        .shared
                        .idle_since()
                        .is_some_and(|released_at| now.duration_since(released_at) >= ttl)
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in expired {
            if let Some(slot) = slots.remove(&id) {
                slot.shared.destroy();
            }
        }
    }

    /// Evicts roughly half of the eligible (usage count = 0) slots,
    /// preferring the longest-idle ones first. If no slot is eligible, does
    /// nothing: the size limit is advisory, correctness of in-flight
    /// sessions is not.
    fn compact_locked(&self, slots: &mut HashMap<String, Slot>) {
        let mut idle: Vec<(String, Instant)> = slots
            .iter()
            .filter(|(_, slot)| slot.shared.usage_count() == 0)
            .map(|(id, slot)| {
                let idle_since = slot.shared.idle_since().unwrap_or_else(Instant::now);
                (id.clone(), idle_since)
            })
            .collect();

        if idle.is_empty() {
            return;
        }

        idle.sort_by_key(|(_, idle_since)| *idle_since);
        let evict_count = (idle.len() / 2).max(1);
        for (id, _) in idle.into_iter().take(evict_count) {
            if let Some(slot) = slots.remove(&id) {
                slot.shared.destroy();
            }
        }
    }

    /// Get or add a session to the cache
    fn get_or_add(&self, id: &str) -> Result<Arc<EnvelopeSession>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ClosedSession);
        }

        let mut slots = self.slots.lock().unwrap();
        self.sweep_expired_locked(&mut slots);

        if let Some(slot) = slots.get(id) {
            slot.shared.increment_usage();
            return Ok(slot.session.clone());
        }

        if slots.len() >= self.max_size {
            self.compact_locked(&mut slots);
        }

        let session = (self.loader)(id)?;
        let shared = Arc::new(SharedEncryption::new(session.encryption.clone()));
        shared.increment_usage();
        let wrapped = Arc::new(EnvelopeSession::new(shared.clone() as Arc<dyn Encryption>));

        slots.insert(
            id.to_string(),
            Slot {
                session: wrapped.clone(),
                shared,
            },
        );

        Ok(wrapped)
    }
}

impl SessionCache for CacheWrapper {
    fn get(&self, id: &str) -> Result<Arc<EnvelopeSession>> {
        self.get_or_add(id)
    }

    fn count(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let mut slots = self.slots.lock().unwrap();
        for (_, slot) in slots.drain() {
            slot.shared.destroy();
        }
    }
}

/// Create a new session cache with default configuration
pub fn new_session_cache(
    loader: impl Fn(&str) -> Result<Arc<EnvelopeSession>> + Send + Sync + 'static,
    max_size: usize,
    expiry: Option<Duration>,
    eviction_policy: Option<CachePolicy>,
) -> Arc<dyn SessionCache> {
    let policy = eviction_policy.unwrap_or(CachePolicy::LRU);
    let loader_fn = Arc::new(loader);

    Arc::new(CacheWrapper::new(loader_fn, max_size, expiry, policy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::DataRowRecord;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    #[derive(Debug)]
    struct CountingEncryption {
        id: String,
    }

    #[async_trait]
    impl Encryption for CountingEncryption {
        async fn encrypt_payload(&self, data: &[u8]) -> Result<DataRowRecord> {
            use crate::envelope::EnvelopeKeyRecord;
            Ok(DataRowRecord {
                data: data.to_vec(),
                key: EnvelopeKeyRecord {
                    revoked: None,
                    id: self.id.clone(),
                    created: 0,
                    encrypted_key: Vec::new(),
                    parent_key_meta: None,
                },
            })
        }

        async fn decrypt_data_row_record(&self, drr: &DataRowRecord) -> Result<Vec<u8>> {
            Ok(drr.data.clone())
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }

        fn as_any(&self) -> &(dyn std::any::Any + Send + Sync) {
            self
        }
    }

    fn counting_loader(loads: Arc<AtomicUsize>) -> impl Fn(&str) -> Result<Arc<EnvelopeSession>> {
        move |id: &str| {
            loads.fetch_add(1, AtomicOrdering::SeqCst);
            let encryption = Arc::new(CountingEncryption { id: id.to_string() });
            Ok(Arc::new(EnvelopeSession::new(encryption)))
        }
    }

    #[test]
    fn reuses_session_for_same_partition_while_any_handle_is_live() {
        let loads = Arc::new(AtomicUsize::new(0));
        let cache = new_session_cache(counting_loader(loads.clone()), 10, None, None);

        let a = cache.get("partition-a").unwrap();
        let b = cache.get("partition-a").unwrap();
        assert!(Arc::ptr_eq(&a.encryption, &b.encryption));
        assert_eq!(loads.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(cache.count(), 1);
    }

    #[test]
    fn never_evicts_a_slot_with_a_live_handle() {
        let loads = Arc::new(AtomicUsize::new(0));
        let cache = new_session_cache(counting_loader(loads), 1, None, None);

        let held = cache.get("keep-me").unwrap();
        // Inserting past max_size with the only slot in use must not evict it.
        let _second = cache.get("evict-candidate").unwrap();
        assert!(cache.get("keep-me").is_ok());
        drop(held);
    }

    #[test]
    fn close_tears_down_all_slots_and_fails_closed() {
        let loads = Arc::new(AtomicUsize::new(0));
        let cache = new_session_cache(counting_loader(loads), 10, None, None);

        let _session = cache.get("partition-a").unwrap();
        cache.close();

        assert!(matches!(cache.get("partition-b"), Err(Error::ClosedSession)));
    }

    #[test]
    fn compaction_prefers_longest_idle_eligible_slot() {
        let loads = Arc::new(AtomicUsize::new(0));
        let cache = new_session_cache(counting_loader(loads), 2, None, None);

        let a = cache.get("a").unwrap();
        let b = cache.get("b").unwrap();
        // Release both so they become eviction-eligible, "a" first (older idle time).
        futures::executor::block_on(a.encryption.close()).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        futures::executor::block_on(b.encryption.close()).unwrap();

        // Triggers compaction since len() == max_size already.
        let _c = cache.get("c").unwrap();
        assert!(cache.count() <= 2);
    }
}
