/// All errors that can occur in this crate.
///
/// Malformed credentials and expired sessions are not errors: they resolve to `None`
/// wherever they can occur, so that a caller cannot tell which of the cases applied.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No user matches the given lookup, e.g. when requesting a reset token for an unknown email.
    #[error("no user matches the given lookup")]
    UserNotFound,

    /// The given reset token is not associated with any user.
    #[error("the given token is not valid")]
    InvalidToken,

    /// A user with the given email is already registered.
    #[error("a user with email {email} is already registered")]
    DuplicateRegistration {
        /// The email that was attempted to be registered a second time.
        email: String,
    },

    /// An update referenced a user record that does not exist.
    /// This indicates an inconsistency between the caller and the user directory.
    #[error("the user record with id {id} does not exist")]
    RecordNotFound {
        /// The id of the missing record.
        id: String,
    },

    /// Tried as often as desired to generate a session token, but all generated tokens already exist.
    #[error("the maximum number of retries to generate a session token was reached")]
    MaximumTokenGenerationTriesReached {
        /// The maximum number of retries that was reached.
        maximum: u32,
    },

    /// The password hashing primitive failed.
    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    /// Reading or writing persisted session records failed.
    #[error("session persistence failed: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted session records could not be encoded or decoded.
    #[error("session records are malformed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(serde_json::Error),

    /// A redaction pattern could not be compiled.
    #[error("invalid redaction pattern: {0}")]
    RedactionPattern(#[from] regex::Error),

    /// An error occurred in a user directory or another collaborator.
    #[error("{0}")]
    Directory(anyhow::Error),
}

impl Error {
    /// Wrap an arbitrary collaborator error.
    pub fn directory(error: impl Into<anyhow::Error>) -> Self {
        Self::Directory(error.into())
    }
}

mod expect_impl_error {
    trait ExpectImplError: std::error::Error + Send + Sync + 'static {}

    impl ExpectImplError for super::Error {}
}
