//! Decoding of HTTP Basic credentials.
//!
//! Every stage of the decoding chain takes the output of the previous stage, and passes an
//! absent input through as absent output. Malformed input at any stage is absorbed into `None`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::fmt::{Debug, Formatter};

/// The scheme prefix of a Basic `Authorization` header, including the separating space.
const BASIC_PREFIX: &str = "Basic ";

/// Return the payload following the `"Basic "` prefix of an `Authorization` header.
///
/// The prefix is matched exactly: case-sensitive and with a single space.
///
/// ```rust
/// # use typed_auth::extract_scheme_payload;
/// assert_eq!(extract_scheme_payload(Some("Basic Ym9iOnB3")), Some("Ym9iOnB3"));
/// assert_eq!(extract_scheme_payload(Some("basic Ym9iOnB3")), None);
/// assert_eq!(extract_scheme_payload(Some("Bearer Ym9iOnB3")), None);
/// assert_eq!(extract_scheme_payload(None), None);
/// ```
pub fn extract_scheme_payload(header: Option<&str>) -> Option<&str> {
    header?.strip_prefix(BASIC_PREFIX)
}

/// Decode a base64 payload into UTF-8 text.
/// Returns `None` if the payload is not valid base64 or does not decode to valid UTF-8.
pub fn decode_payload(payload: Option<&str>) -> Option<String> {
    let bytes = STANDARD.decode(payload?).ok()?;
    String::from_utf8(bytes).ok()
}

/// Split decoded credentials at the first colon into username and secret.
/// The secret may itself contain colons.
/// Returns `None` if there is no colon.
pub fn split_credentials(decoded: Option<&str>) -> Option<BasicCredentials> {
    let (username, secret) = decoded?.split_once(':')?;
    Some(BasicCredentials::new(username, secret))
}

/// A username and secret pair, as transported by HTTP Basic authentication.
#[derive(Clone, Eq, PartialEq)]
pub struct BasicCredentials {
    username: String,
    secret: String,
}

impl BasicCredentials {
    /// Create a credential pair.
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }

    /// Decode credentials from the value of an `Authorization` header.
    ///
    /// ```rust
    /// # use typed_auth::BasicCredentials;
    /// let credentials = BasicCredentials::from_header(Some("Basic Ym9iOnB3OndpdGg6Y29sb25z")).unwrap();
    /// assert_eq!(credentials.username(), "bob");
    /// assert_eq!(credentials.secret(), "pw:with:colons");
    /// ```
    pub fn from_header(header: Option<&str>) -> Option<Self> {
        let decoded = decode_payload(extract_scheme_payload(header));
        split_credentials(decoded.as_deref())
    }

    /// Encode these credentials as the value of an `Authorization` header.
    pub fn to_header(&self) -> String {
        let encoded = STANDARD.encode(format!("{}:{}", self.username, self.secret));
        format!("{BASIC_PREFIX}{encoded}")
    }

    /// The username, which is the email of a user in this crate.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The secret.
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl Debug for BasicCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("secret", &"***")
            .finish()
    }
}
