use crate::clock::{Clock, SystemClock};
use crate::session::{SessionPolicy, SessionRecord};
use crate::session_store::{is_valid_user_id, NewSession};
use crate::token::redact;
use crate::{Result, SessionStore};
use async_trait::async_trait;
use log::{debug, trace};
use std::sync::Arc;

/// A session store layer that bounds the lifetime of sessions.
///
/// Expiry is evaluated lazily: a session is checked against the policy whenever it is looked up,
/// and an expired session found this way is removed from the inner store.
/// Nothing purges expired sessions in the background, call [`ExpiringStore::purge_expired`]
/// periodically if memory accumulation is a concern.
#[derive(Debug)]
pub struct ExpiringStore<Inner> {
    inner: Inner,
    policy: SessionPolicy,
    clock: Arc<dyn Clock>,
}

impl<Inner: SessionStore> ExpiringStore<Inner> {
    /// Wrap `inner`, expiring sessions according to `policy` and the system clock.
    pub fn new(inner: Inner, policy: SessionPolicy) -> Self {
        Self::new_with_clock(inner, policy, Arc::new(SystemClock))
    }

    /// Wrap `inner`, expiring sessions according to `policy` and the given clock.
    pub fn new_with_clock(inner: Inner, policy: SessionPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner,
            policy,
            clock,
        }
    }

    /// The expiry policy of this store.
    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    /// A reference to the wrapped store.
    pub fn inner(&self) -> &Inner {
        &self.inner
    }

    /// Remove all expired sessions from the inner store.
    /// Returns the number of removed sessions.
    pub async fn purge_expired(&self) -> Result<usize> {
        if !self.policy.expires() {
            return Ok(0);
        }

        let now = self.clock.now();
        let policy = self.policy;
        self.inner
            .retain(&move |record: &SessionRecord| !record.is_expired(now, policy))
            .await
    }

    fn is_expired(&self, record: &SessionRecord) -> bool {
        record.is_expired(self.clock.now(), self.policy)
    }
}

#[async_trait]
impl<Inner: SessionStore> SessionStore for ExpiringStore<Inner> {
    async fn create_session(&self, user_id: &str) -> Result<Option<NewSession>> {
        if !is_valid_user_id(user_id) {
            return Ok(None);
        }
        self.inner.create_session(user_id).await
    }

    async fn record(&self, token: &str) -> Result<Option<SessionRecord>> {
        let Some(record) = self.inner.record(token).await? else {
            return Ok(None);
        };

        if self.is_expired(&record) {
            debug!("Session {} expired", redact(token));
            // A concurrent destroy may have removed it already.
            if let Some(removed) = self.inner.take(token).await? {
                trace!("Evicted expired session of user {}", removed.user_id);
            }
            return Ok(None);
        }

        Ok(Some(record))
    }

    async fn take(&self, token: &str) -> Result<Option<SessionRecord>> {
        Ok(self
            .inner
            .take(token)
            .await?
            .filter(|record| !self.is_expired(record)))
    }

    async fn retain(
        &self,
        keep: &(dyn for<'r> Fn(&'r SessionRecord) -> bool + Send + Sync),
    ) -> Result<usize> {
        self.inner.retain(keep).await
    }
}
