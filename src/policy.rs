use crate::directory::{Lookup, UserDirectory, UserRecord};
use crate::token::redact;
use crate::wire::ErrorBody;
use crate::{BasicCredentials, PasswordHasher, Result, SessionStore};
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

/// A set of path patterns that do not require authentication.
///
/// A pattern is either an exact path, or a prefix followed by `*`.
/// Exact paths are compared ignoring a trailing slash.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ExemptPaths {
    patterns: Vec<ExemptPattern>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
enum ExemptPattern {
    Exact(String),
    Prefix(String),
}

impl ExemptPaths {
    /// Create a set from the given patterns, keeping their order.
    pub fn new<Pattern: Into<String>>(patterns: impl IntoIterator<Item = Pattern>) -> Self {
        patterns.into_iter().collect()
    }

    /// Returns true if there are no patterns.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns true if `path` matches any pattern.
    /// The path is expected to be normalized with [`normalize_path`].
    fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|pattern| match pattern {
            ExemptPattern::Exact(exact) => exact == path,
            ExemptPattern::Prefix(prefix) => path.starts_with(prefix.as_str()),
        })
    }
}

impl<Pattern: Into<String>> FromIterator<Pattern> for ExemptPaths {
    fn from_iter<T: IntoIterator<Item = Pattern>>(iter: T) -> Self {
        let patterns = iter
            .into_iter()
            .map(Into::into)
            .map(|pattern: String| match pattern.strip_suffix('*') {
                Some(prefix) => ExemptPattern::Prefix(prefix.to_owned()),
                None => ExemptPattern::Exact(normalize_path(&pattern)),
            })
            .collect();
        Self { patterns }
    }
}

/// Append a trailing slash to `path` if it does not have one.
fn normalize_path(path: &str) -> String {
    if path.ends_with('/') {
        path.to_owned()
    } else {
        format!("{path}/")
    }
}

/// Returns true if a request for `path` requires authentication.
///
/// This fails closed: an absent path or an empty exempt set always require authentication.
///
/// ```rust
/// # use typed_auth::{requires_auth, ExemptPaths};
/// let exempt = ExemptPaths::new(["/api/v1/status/", "/api/v1/stat*"]);
/// assert!(!requires_auth(Some("/api/v1/status"), &exempt));
/// assert!(!requires_auth(Some("/api/v1/stats"), &exempt));
/// assert!(requires_auth(Some("/api/v1/users"), &exempt));
/// assert!(requires_auth(None, &exempt));
/// assert!(requires_auth(Some("/api/v1/status"), &ExemptPaths::default()));
/// ```
pub fn requires_auth(path: Option<&str>, exempt: &ExemptPaths) -> bool {
    let Some(path) = path else {
        return true;
    };
    if exempt.is_empty() {
        return true;
    }
    !exempt.matches(&normalize_path(path))
}

/// The parts of an HTTP request that authentication looks at.
#[derive(Debug, Clone, Default)]
pub struct AuthRequest {
    path: String,
    headers: Vec<(String, String)>,
    cookies: HashMap<String, String>,
}

impl AuthRequest {
    /// Create a request for `path` without headers and cookies.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add a cookie.
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// The request path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The value of the first header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The value of the `Authorization` header.
    pub fn authorization_header(&self) -> Option<&str> {
        self.header("Authorization")
    }

    /// The value of the cookie named `name`.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }
}

/// The way requests are resolved to users.
/// The strategy is chosen once at startup, see [`AuthConfig::strategy`](crate::AuthConfig::strategy).
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum AuthStrategy {
    /// No credential is ever accepted. Requests to paths that require authentication are refused.
    None,
    /// Credentials are taken from a Basic `Authorization` header and checked against the user directory.
    Basic,
    /// The session token is taken from a cookie and resolved by the session store.
    Session {
        /// The name of the session cookie.
        cookie_name: String,
    },
}

/// The outcome of gating a request.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Gate {
    /// The request may proceed, with the resolved user if the path required authentication.
    Allow(Option<UserRecord>),
    /// The path requires authentication, but the request carries no credential.
    Unauthenticated,
    /// The request carries a credential, but it does not identify a user.
    Forbidden,
}

impl Gate {
    /// The HTTP status code for this outcome.
    pub fn status(&self) -> u16 {
        match self {
            Gate::Allow(_) => 200,
            Gate::Unauthenticated => 401,
            Gate::Forbidden => 403,
        }
    }

    /// The JSON body to answer a refused request with.
    /// The body is constant per outcome and does not reveal why a credential was refused.
    pub fn error_body(&self) -> Option<ErrorBody> {
        match self {
            Gate::Allow(_) => None,
            Gate::Unauthenticated => Some(ErrorBody::unauthorized()),
            Gate::Forbidden => Some(ErrorBody::forbidden()),
        }
    }
}

/// Decides for each request whether authentication is required, and resolves requests to users.
#[derive(Debug, Clone)]
pub struct AuthPolicy {
    strategy: AuthStrategy,
    exempt: ExemptPaths,
    directory: Arc<dyn UserDirectory>,
    sessions: Arc<dyn SessionStore>,
    hasher: Arc<dyn PasswordHasher>,
}

impl AuthPolicy {
    /// Create a policy.
    /// The session store is only consulted by [`AuthStrategy::Session`], but is always passed,
    /// such that login and logout handlers share it with the policy.
    pub fn new(
        strategy: AuthStrategy,
        exempt: ExemptPaths,
        directory: Arc<dyn UserDirectory>,
        sessions: Arc<dyn SessionStore>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            strategy,
            exempt,
            directory,
            sessions,
            hasher,
        }
    }

    /// The active strategy.
    pub fn strategy(&self) -> &AuthStrategy {
        &self.strategy
    }

    /// The session store.
    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Returns true if a request for `path` requires authentication.
    pub fn requires_auth(&self, path: Option<&str>) -> bool {
        requires_auth(path, &self.exempt)
    }

    /// The value of the session cookie, if the strategy uses one and the request carries it.
    pub fn session_cookie<'request>(&self, request: &'request AuthRequest) -> Option<&'request str> {
        match &self.strategy {
            AuthStrategy::Session { cookie_name } => request.cookie(cookie_name),
            AuthStrategy::None | AuthStrategy::Basic => None,
        }
    }

    /// Returns true if the request carries an `Authorization` header or a session cookie.
    pub fn credential_presented(&self, request: &AuthRequest) -> bool {
        request.authorization_header().is_some() || self.session_cookie(request).is_some()
    }

    /// Resolve the user a request was made by.
    ///
    /// Returns `Ok(None)` whenever the credential is missing, malformed, unknown or expired.
    /// Only failures of the user directory or the session store are returned as errors.
    pub async fn resolve_identity(&self, request: &AuthRequest) -> Result<Option<UserRecord>> {
        match &self.strategy {
            AuthStrategy::None => Ok(None),
            AuthStrategy::Basic => {
                let Some(credentials) = BasicCredentials::from_header(request.authorization_header())
                else {
                    debug!("Authorization header is missing or malformed");
                    return Ok(None);
                };
                self.user_from_credentials(&credentials).await
            }
            AuthStrategy::Session { .. } => {
                let Some(token) = self.session_cookie(request) else {
                    return Ok(None);
                };
                self.user_from_session(token).await
            }
        }
    }

    /// Return the user identified by the username of `credentials`, if the secret matches.
    pub async fn user_from_credentials(
        &self,
        credentials: &BasicCredentials,
    ) -> Result<Option<UserRecord>> {
        let Some(user) = self
            .directory
            .find_one(Lookup::Email(credentials.username()))
            .await?
        else {
            debug!("No user for Basic credentials");
            return Ok(None);
        };

        if self.hasher.verify(&user.hashed_password, credentials.secret()) {
            Ok(Some(user))
        } else {
            debug!("Wrong secret for user {}", user.id);
            Ok(None)
        }
    }

    /// Return the user owning the session identified by `token`.
    pub async fn user_from_session(&self, token: &str) -> Result<Option<UserRecord>> {
        let Some(user_id) = self.sessions.resolve(token).await? else {
            debug!("Session {} does not resolve", redact(token));
            return Ok(None);
        };
        self.directory.find_one(Lookup::Id(&user_id)).await
    }

    /// Gate a request.
    ///
    /// Requests to exempt paths are allowed without looking at credentials.
    /// Otherwise, a request without credential is [`Gate::Unauthenticated`], and a request
    /// whose credential does not resolve to a user is [`Gate::Forbidden`].
    pub async fn gate(&self, request: &AuthRequest) -> Result<Gate> {
        if !self.requires_auth(Some(request.path())) {
            return Ok(Gate::Allow(None));
        }
        if !self.credential_presented(request) {
            debug!("Refusing unauthenticated request to {}", request.path());
            return Ok(Gate::Unauthenticated);
        }

        Ok(match self.resolve_identity(request).await? {
            Some(user) => Gate::Allow(Some(user)),
            None => {
                debug!("Refusing request to {} with unknown credential", request.path());
                Gate::Forbidden
            }
        })
    }
}
