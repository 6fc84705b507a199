//! Session and credential authentication for small HTTP services.
//!
//! This crate provides the pieces between an HTTP boundary and a user directory:
//! decoding of Basic credentials, password hashing, session stores with expiry and
//! persistence, a policy gating requests, one-shot password reset tokens, and redaction of
//! personal data in log messages.
//! The HTTP layer itself and the storage of users are left to the caller, who connects them
//! through [`AuthRequest`] and [`UserDirectory`].
//!
//! # Session stores
//!
//! Session stores are layered by composition.
//! [`MemoryStore`] maps session tokens to users and never expires them,
//! [`ExpiringStore`] wraps any store and bounds the lifetime of its sessions,
//! and [`PersistedStore`] wraps any store and writes every session through to a durable collection.
//! Expiry is evaluated lazily whenever a session is looked up.
//!
//! # Security
//!
//! Session tokens are drawn from a cryptographically secure random generator,
//! and stores keep only their blake3 hash. Passwords are hashed with Argon2id.
//! Resolution never tells why a credential was refused: unknown, expired and malformed
//! credentials all resolve to `None`.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use typed_auth::{
//!     Argon2Hasher, AuthPolicy, AuthRequest, AuthService, AuthStrategy, ExemptPaths,
//!     ExpiringStore, Gate, MemoryDirectory, MemoryStore, SessionPolicy,
//! };
//!
//! # fn main() -> typed_auth::Result {
//! # async_std::task::block_on(async {
//! let directory = Arc::new(MemoryDirectory::new());
//! let sessions = Arc::new(ExpiringStore::new(MemoryStore::new(), SessionPolicy::new(3600)));
//! let hasher = Arc::new(Argon2Hasher::new());
//!
//! let service = AuthService::new(directory.clone(), sessions.clone(), hasher.clone());
//! let policy = AuthPolicy::new(
//!     AuthStrategy::Session { cookie_name: "session_id".to_owned() },
//!     ExemptPaths::new(["/api/v1/status/"]),
//!     directory,
//!     sessions,
//!     hasher,
//! );
//!
//! service.register_user("bob@example.com", "hunter2").await?;
//! let token = service.login("bob@example.com", "hunter2").await?.unwrap();
//!
//! let request = AuthRequest::new("/api/v1/users/me").with_cookie("session_id", token);
//! let Gate::Allow(Some(user)) = policy.gate(&request).await? else { unreachable!() };
//! assert_eq!(user.email, "bob@example.com");
//! #
//! # Ok(()) }) }
//! ```

#![forbid(unsafe_code)]
#![deny(
    future_incompatible,
    missing_debug_implementations,
    nonstandard_style,
    missing_docs,
    unreachable_pub,
    missing_copy_implementations,
    unused_qualifications
)]

/// A result with the error type of this crate, and default return type of ()
pub type Result<T = ()> = std::result::Result<T, Error>;

mod clock;
mod config;
mod credentials;
mod directory;
mod error;
mod memory_store;
mod password;
mod pii;
mod policy;
mod reset;
mod service;
mod session;
mod session_store;
mod token;
pub mod wire;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuthConfig, AuthType};
pub use credentials::{decode_payload, extract_scheme_payload, split_credentials, BasicCredentials};
pub use directory::{Lookup, MemoryDirectory, UserDirectory, UserRecord, UserUpdate};
pub use error::Error;
pub use memory_store::MemoryStore;
pub use password::{Argon2Hasher, PasswordHasher};
pub use pii::{redact_fields, FieldRedactor, RedactingLogger, PII_FIELDS, REDACTION, SEPARATOR};
pub use policy::{requires_auth, AuthPolicy, AuthRequest, AuthStrategy, ExemptPaths, Gate};
pub use reset::ResetTokenManager;
pub use service::AuthService;
pub use session::{SessionId, SessionIdType, SessionPolicy, SessionRecord};
pub use session_store::{
    ExpiringStore, JsonFileRecords, NewSession, PersistedStore, SessionRecords, SessionStore,
};
pub use token::{DebugTokenGenerator, DefaultTokenGenerator, TokenGenerator, DEFAULT_TOKEN_LENGTH};
