use crate::session::SessionRecord;
use crate::Result;
use async_trait::async_trait;
use std::fmt::Debug;

mod expiring;
mod persisted;

pub use expiring::ExpiringStore;
pub use persisted::{JsonFileRecords, PersistedStore, SessionRecords};

/// A session store.
///
/// Session stores map session tokens to the users they were issued for.
/// The layers of this crate are composed by wrapping: [`ExpiringStore`] decorates any store
/// with expiry, and [`PersistedStore`] decorates any store with write-through persistence.
/// Each layer delegates to the layer it wraps, and only adds its own concern.
///
/// All methods take `&self`, stores are shared between concurrently handled requests.
/// Implementations must make [`take`](SessionStore::take) atomic, such that of two concurrent
/// calls on the same token at most one observes the record.
///
/// "Absent" outcomes are reported as `Ok(None)` or `Ok(false)`.
/// The caller cannot distinguish a token that never existed from one that expired or was destroyed.
#[async_trait]
pub trait SessionStore: Debug + Send + Sync {
    /// Create a session for `user_id` and return it together with the token identifying it.
    /// Returns `Ok(None)` if `user_id` is empty.
    async fn create_session(&self, user_id: &str) -> Result<Option<NewSession>>;

    /// Return the active record identified by `token`, if there is one.
    async fn record(&self, token: &str) -> Result<Option<SessionRecord>>;

    /// Remove the record identified by `token` and return it, if it was active.
    async fn take(&self, token: &str) -> Result<Option<SessionRecord>>;

    /// Remove all records for which `keep` returns false.
    /// Returns the number of removed records.
    async fn retain(
        &self,
        keep: &(dyn for<'r> Fn(&'r SessionRecord) -> bool + Send + Sync),
    ) -> Result<usize>;

    /// Create a session for `user_id` and return the token identifying it.
    /// Returns `Ok(None)` if `user_id` is empty.
    async fn create(&self, user_id: &str) -> Result<Option<String>> {
        Ok(self.create_session(user_id).await?.map(|session| session.token))
    }

    /// Return the user owning the session identified by `token`, if the session is active.
    async fn resolve(&self, token: &str) -> Result<Option<String>> {
        Ok(self.record(token).await?.map(|record| record.user_id))
    }

    /// Destroy the session identified by `token`.
    /// Returns true if an active session existed and was removed.
    async fn destroy(&self, token: &str) -> Result<bool> {
        Ok(self.take(token).await?.is_some())
    }
}

/// A newly created session.
#[derive(Debug, Clone)]
pub struct NewSession {
    /// The token to be handed to the client, e.g. as cookie value.
    /// This is the only place where the token appears, stores only keep its hash.
    pub token: String,
    /// The stored record.
    pub record: SessionRecord,
}

/// Returns true if `user_id` can own a session.
pub(crate) fn is_valid_user_id(user_id: &str) -> bool {
    !user_id.trim().is_empty()
}
