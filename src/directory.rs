use crate::{Error, Result};
use async_trait::async_trait;
use log::trace;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A user record as kept by a [`UserDirectory`].
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// The primary key of the record.
    pub id: String,
    /// The email of the user, which doubles as username.
    pub email: String,
    /// The password digest, as produced by a [`PasswordHasher`](crate::PasswordHasher).
    pub hashed_password: String,
    /// The token of the session the user logged in with most recently, if any.
    pub session_id: Option<String>,
    /// The outstanding password reset token, if any.
    pub reset_token: Option<String>,
}

/// A lookup of a single user record by one of its fields.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Lookup<'a> {
    /// Look up by primary key.
    Id(&'a str),
    /// Look up by email.
    Email(&'a str),
    /// Look up by session token.
    SessionId(&'a str),
    /// Look up by reset token.
    ResetToken(&'a str),
    /// Look up by password digest.
    HashedPassword(&'a str),
}

impl Lookup<'_> {
    /// Returns true if `record` matches this lookup.
    pub fn matches(&self, record: &UserRecord) -> bool {
        match *self {
            Lookup::Id(id) => record.id == id,
            Lookup::Email(email) => record.email == email,
            Lookup::SessionId(token) => record.session_id.as_deref() == Some(token),
            Lookup::ResetToken(token) => record.reset_token.as_deref() == Some(token),
            Lookup::HashedPassword(digest) => record.hashed_password == digest,
        }
    }
}

/// A partial update of a user record. Fields left at `None` are not touched.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct UserUpdate {
    hashed_password: Option<String>,
    session_id: Option<Option<String>>,
    reset_token: Option<Option<String>>,
}

impl UserUpdate {
    /// Create an update that changes nothing.
    pub fn new() -> Self {
        Default::default()
    }

    /// Replace the password digest.
    pub fn hashed_password(mut self, digest: impl Into<String>) -> Self {
        self.hashed_password = Some(digest.into());
        self
    }

    /// Set or clear the session token.
    pub fn session_id(mut self, token: Option<String>) -> Self {
        self.session_id = Some(token);
        self
    }

    /// Set or clear the reset token.
    pub fn reset_token(mut self, token: Option<String>) -> Self {
        self.reset_token = Some(token);
        self
    }

    /// Apply this update to `record`.
    pub fn apply(self, record: &mut UserRecord) {
        if let Some(hashed_password) = self.hashed_password {
            record.hashed_password = hashed_password;
        }
        if let Some(session_id) = self.session_id {
            record.session_id = session_id;
        }
        if let Some(reset_token) = self.reset_token {
            record.reset_token = reset_token;
        }
    }
}

/// Storage of user records.
///
/// This is the backend-facing interface for users, typically implemented on top of a database.
/// Lookup misses are reported as `Ok(None)`, while an update of a nonexistent record is an
/// inconsistency and fails with [`Error::RecordNotFound`].
#[async_trait]
pub trait UserDirectory: Debug + Send + Sync {
    /// Return the first record matching `lookup`.
    async fn find_one(&self, lookup: Lookup<'_>) -> Result<Option<UserRecord>>;

    /// Apply `update` to the record with the given `id`.
    async fn update(&self, id: &str, update: UserUpdate) -> Result<()>;

    /// Create a new record and return it.
    ///
    /// Emails are unique: fails with [`Error::DuplicateRegistration`] if a record with `email`
    /// exists. The check must be atomic with the insertion, e.g. a unique index, since
    /// concurrent registrations of one email may both pass any earlier lookup.
    async fn create(&self, email: &str, hashed_password: &str) -> Result<UserRecord>;
}

/// A user directory kept in memory. Records are kept in insertion order.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    state: Mutex<DirectoryState>,
}

#[derive(Debug, Default)]
struct DirectoryState {
    users: Vec<UserRecord>,
    next_id: u64,
}

impl MemoryDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.state.lock().users.len()
    }

    /// Returns true if there are no records.
    pub fn is_empty(&self) -> bool {
        self.state.lock().users.is_empty()
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn find_one(&self, lookup: Lookup<'_>) -> Result<Option<UserRecord>> {
        let state = self.state.lock();
        Ok(state
            .users
            .iter()
            .find(|record| lookup.matches(record))
            .cloned())
    }

    async fn update(&self, id: &str, update: UserUpdate) -> Result<()> {
        let mut state = self.state.lock();
        let record = state
            .users
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| Error::RecordNotFound { id: id.to_owned() })?;
        update.apply(record);
        Ok(())
    }

    async fn create(&self, email: &str, hashed_password: &str) -> Result<UserRecord> {
        let mut state = self.state.lock();
        if state.users.iter().any(|record| record.email == email) {
            return Err(Error::DuplicateRegistration {
                email: email.to_owned(),
            });
        }
        state.next_id += 1;
        let record = UserRecord {
            id: state.next_id.to_string(),
            email: email.to_owned(),
            hashed_password: hashed_password.to_owned(),
            session_id: None,
            reset_token: None,
        };
        state.users.push(record.clone());
        trace!("Created user record {}", record.id);
        Ok(record)
    }
}
