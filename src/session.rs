use chrono::{DateTime, Duration, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Debug, Formatter};

/// The type of a session id.
pub type SessionIdType = [u8; blake3::OUT_LEN];

/// A session id.
///
/// Session ids are never handed out to clients.
/// Clients receive a session token, and the store keys its records by the hash of that token,
/// such that neither the in-memory map nor a persisted collection contains bearer tokens.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SessionId(Box<SessionIdType>);

impl SessionId {
    /// Applies a cryptographic hash function on a session token to obtain the session id for that token.
    ///
    /// This is automatically done by the session stores, and this function is only public for test purposes.
    pub fn from_token(token: &str) -> Self {
        let hash = blake3::hash(token.as_bytes());
        Self(Box::new(hash.into()))
    }

    /// The hexadecimal representation of this id, as it is persisted.
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(*self.0).to_hex().to_string()
    }

    /// Parse the hexadecimal representation of an id.
    /// Returns `None` if the string is not a valid id.
    pub fn from_hex(hex: &str) -> Option<Self> {
        blake3::Hash::from_hex(hex)
            .ok()
            .map(|hash| Self(Box::new(hash.into())))
    }
}

impl From<SessionId> for SessionIdType {
    fn from(id: SessionId) -> Self {
        *id.0
    }
}

impl Debug for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // Eight hex digits are enough to tell ids apart in logs.
        write!(f, "SessionId({}…)", &self.to_hex()[..8])
    }
}

impl Serialize for SessionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).ok_or_else(|| D::Error::custom("malformed session id"))
    }
}

/// A session with a client, as kept by a session store.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// The id of the session.
    pub session_id: SessionId,
    /// The user the session belongs to.
    pub user_id: String,
    /// The time at which the session was created.
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Create a record for a session identified by `token`.
    pub fn new(token: &str, user_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            session_id: SessionId::from_token(token),
            user_id: user_id.into(),
            created_at,
        }
    }

    /// Return true if the session is expired under the given policy.
    /// A session is expired once strictly more than the policy duration has passed since its creation.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use typed_auth::{SessionPolicy, SessionRecord};
    /// use chrono::{Duration, Utc};
    ///
    /// let now = Utc::now();
    /// let record = SessionRecord::new("token", "user", now - Duration::seconds(61));
    /// assert!(record.is_expired(now, SessionPolicy::new(60)));
    /// assert!(!record.is_expired(now, SessionPolicy::new(62)));
    /// assert!(!record.is_expired(now, SessionPolicy::never_expires()));
    /// ```
    pub fn is_expired(&self, now: DateTime<Utc>, policy: SessionPolicy) -> bool {
        if !policy.expires() {
            return false;
        }

        // A duration beyond the range of `Duration` is never reached.
        let Some(duration) = i64::try_from(policy.duration_seconds())
            .ok()
            .and_then(Duration::try_seconds)
        else {
            return false;
        };
        now.signed_duration_since(self.created_at) > duration
    }
}

/// The expiry policy of a session store.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SessionPolicy {
    duration_seconds: u64,
}

impl SessionPolicy {
    /// Sessions expire `duration_seconds` after their creation.
    /// A duration of zero means that sessions never expire.
    pub fn new(duration_seconds: u64) -> Self {
        Self { duration_seconds }
    }

    /// Sessions never expire, unless they are explicitly destroyed.
    pub fn never_expires() -> Self {
        Self::new(0)
    }

    /// The lifetime of a session in seconds, zero meaning unbounded.
    pub fn duration_seconds(&self) -> u64 {
        self.duration_seconds
    }

    /// Returns true if sessions expire at all under this policy.
    pub fn expires(&self) -> bool {
        self.duration_seconds > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_is_token_hash() {
        let id = SessionId::from_token("token");
        assert_eq!(id.to_hex(), blake3::hash(b"token").to_hex().to_string());
        assert_eq!(SessionId::from_hex(&id.to_hex()), Some(id));
        assert_eq!(SessionId::from_hex("token"), None);
        assert_ne!(SessionId::from_token("token"), SessionId::from_token("token2"));
    }

    #[test]
    fn test_record_is_persisted_without_token() {
        let record = SessionRecord::new("secret-token", "42", Utc::now());
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("secret-token"));
        assert!(json.contains(&record.session_id.to_hex()));

        let malformed = json.replace(&record.session_id.to_hex(), "xyz");
        assert!(serde_json::from_str::<SessionRecord>(&malformed).is_err());
    }

    #[test]
    fn test_expiry_is_exact() {
        let now = Utc::now();
        let policy = SessionPolicy::new(60);
        let expired = SessionRecord::new("token", "user", now - Duration::microseconds(60_000_900));
        assert!(expired.is_expired(now, policy));
        let expired = SessionRecord::new("token", "user", now - Duration::nanoseconds(60_000_000_001));
        assert!(expired.is_expired(now, policy));
        let active = SessionRecord::new("token", "user", now - Duration::seconds(60));
        assert!(!active.is_expired(now, policy));

        let ancient = SessionRecord::new("token", "user", DateTime::<Utc>::MIN_UTC);
        assert!(!ancient.is_expired(now, SessionPolicy::new(u64::MAX)));
        assert!(ancient.is_expired(now, SessionPolicy::new(60)));
    }

    #[test]
    fn test_debug_shows_prefix_only() {
        let id = SessionId::from_token("token");
        let debug = format!("{id:?}");
        assert!(debug.starts_with("SessionId("));
        assert!(!debug.contains(&id.to_hex()));
    }
}
