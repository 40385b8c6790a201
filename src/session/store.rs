//! Session storage keyed by conversation

use super::Session;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared handle to one conversation's session.
///
/// The async mutex is held for the whole handling of an event, so events
/// of one chat are processed one at a time while other chats proceed.
pub type SessionHandle = Arc<tokio::sync::Mutex<Session>>;

/// Session store with an entry-count bound.
///
/// Least recently active conversations are evicted first; an evicted
/// session releases any file it was holding once no event still uses it.
pub struct SessionStore {
    inner: Mutex<LruCache<i64, SessionHandle>>,
}

impl SessionStore {
    /// Create a store tracking at most `capacity` conversations
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Session for `chat_id`, created idle on first contact
    pub fn get_or_create(&self, chat_id: i64) -> SessionHandle {
        let mut inner = self.inner.lock();
        inner
            .get_or_insert(chat_id, || Arc::new(tokio::sync::Mutex::new(Session::new())))
            .clone()
    }

    /// Release held files older than `ttl`, returning how many were dropped.
    ///
    /// Sessions busy with an event are skipped and picked up by a later sweep.
    pub fn sweep_expired(&self, ttl: Duration) -> usize {
        let handles: Vec<SessionHandle> = self
            .inner
            .lock()
            .iter()
            .map(|(_, handle)| handle.clone())
            .collect();

        let now = Instant::now();
        handles
            .iter()
            .filter(|handle| match handle.try_lock() {
                Ok(mut session) => session.expire_held(ttl, now),
                Err(_) => false,
            })
            .count()
    }

    /// Number of tracked conversations
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
