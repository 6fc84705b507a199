use crate::clock::{Clock, SystemClock};
use crate::session::{SessionId, SessionRecord};
use crate::session_store::{is_valid_user_id, NewSession};
use crate::token::{redact, DefaultTokenGenerator, TokenGenerator};
use crate::{Error, Result, SessionStore};
use async_trait::async_trait;
use log::trace;
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

/// # in-memory session store
/// Because there is no external
/// persistence, this session store is ephemeral and will be cleared
/// on server restart.
/// Sessions created by this store never expire, wrap it into an
/// [`ExpiringStore`](crate::ExpiringStore) to bound their lifetime.
///
/// # ***READ THIS BEFORE USING IN A PRODUCTION DEPLOYMENT***
///
/// Storing sessions only in memory brings the following problems:
///
/// 1. All sessions must fit in available memory (important for high load services)
/// 2. Sessions stored in memory are cleared only if a client destroys them, or if
///    [MemoryStore::clear] or [SessionStore::retain] is called.
///    If sessions are not cleaned up properly it might result in OOM
/// 3. All sessions will be lost on shutdown
/// 4. If the service is clustered particular session will be stored only on a single instance.
///    This might be solved by using load balancers with sticky sessions.
#[derive(Debug)]
pub struct MemoryStore<Generator = DefaultTokenGenerator> {
    session_map: Mutex<HashMap<SessionId, SessionRecord>>,
    generator: Generator,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Create a new empty memory store using secure random tokens and the system clock.
    pub fn new() -> Self {
        Self::new_with_generator(DefaultTokenGenerator::default(), Arc::new(SystemClock))
    }
}

impl<Generator: TokenGenerator> MemoryStore<Generator> {
    /// Writing a session fails if the generated token already exists.
    /// This constant indicates how often a new token is generated until the store gives up.
    pub const MAXIMUM_RETRIES_ON_ID_COLLISION: u32 = 16;

    /// Create a new empty memory store with the given token generator and clock.
    pub fn new_with_generator(generator: Generator, clock: Arc<dyn Clock>) -> Self {
        Self {
            session_map: Default::default(),
            generator,
            clock,
        }
    }

    /// Returns the number of sessions in the memory store, including expired ones that were not yet evaluated.
    pub fn len(&self) -> usize {
        self.session_map.lock().len()
    }

    /// Returns true if the memory store is empty.
    pub fn is_empty(&self) -> bool {
        self.session_map.lock().is_empty()
    }

    /// Empties the entire store, deleting all sessions.
    pub fn clear(&self) {
        self.session_map.lock().clear();
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<Generator: TokenGenerator> SessionStore for MemoryStore<Generator> {
    async fn create_session(&self, user_id: &str) -> Result<Option<NewSession>> {
        if !is_valid_user_id(user_id) {
            return Ok(None);
        }

        for _ in 0..Self::MAXIMUM_RETRIES_ON_ID_COLLISION {
            let token = self.generator.generate_token();
            let record = SessionRecord::new(&token, user_id, self.clock.now());

            // replace with `try_insert` once stable #82766
            match self.session_map.lock().entry(record.session_id.clone()) {
                Entry::Occupied(_) => {
                    trace!("Generated session token {} collides, retrying", redact(&token));
                    continue;
                }
                Entry::Vacant(entry) => {
                    entry.insert(record.clone());
                }
            }

            trace!("Created session {} for user {user_id}", redact(&token));
            return Ok(Some(NewSession { token, record }));
        }

        Err(Error::MaximumTokenGenerationTriesReached {
            maximum: Self::MAXIMUM_RETRIES_ON_ID_COLLISION,
        })
    }

    async fn record(&self, token: &str) -> Result<Option<SessionRecord>> {
        let id = SessionId::from_token(token);
        Ok(self.session_map.lock().get(&id).cloned())
    }

    async fn take(&self, token: &str) -> Result<Option<SessionRecord>> {
        let id = SessionId::from_token(token);
        let removed = self.session_map.lock().remove(&id);
        if removed.is_some() {
            trace!("Removed session {}", redact(token));
        }
        Ok(removed)
    }

    async fn retain(
        &self,
        keep: &(dyn for<'r> Fn(&'r SessionRecord) -> bool + Send + Sync),
    ) -> Result<usize> {
        let mut session_map = self.session_map.lock();
        let initial_len = session_map.len();
        session_map.retain(|_, record| keep(record));
        let removed = initial_len - session_map.len();
        trace!("Deleted {removed} sessions from memory store");
        Ok(removed)
    }
}
