use crate::session_store::{ExpiringStore, JsonFileRecords, PersistedStore};
use crate::{AuthStrategy, Error, ExemptPaths, MemoryStore, Result, SessionPolicy, SessionStore};
use log::warn;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

/// The kind of authentication a service runs with.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// Nothing was configured. Behaves like [`AuthType::Auth`].
    #[default]
    None,
    /// Authentication without any accepted credential.
    Auth,
    /// HTTP Basic authentication.
    BasicAuth,
    /// Session cookies backed by a memory store without expiry.
    SessionAuth,
    /// Session cookies backed by an expiring memory store.
    SessionExpAuth,
    /// Session cookies backed by an expiring memory store with write-through to a file.
    SessionDbAuth,
}

impl AuthType {
    /// Parse the value of the `AUTH_TYPE` variable. Unknown values parse to [`AuthType::None`].
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "auth" => Self::Auth,
            "basic_auth" => Self::BasicAuth,
            "session_auth" => Self::SessionAuth,
            "session_exp_auth" => Self::SessionExpAuth,
            "session_db_auth" => Self::SessionDbAuth,
            _ => Self::None,
        }
    }

    /// Returns true if this kind of authentication uses session cookies.
    pub fn uses_sessions(&self) -> bool {
        matches!(
            self,
            Self::SessionAuth | Self::SessionExpAuth | Self::SessionDbAuth
        )
    }
}

/// The configuration of authentication.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// The kind of authentication, `AUTH_TYPE`.
    pub auth_type: AuthType,
    /// The name of the session cookie, `SESSION_NAME`.
    pub session_name: Option<String>,
    /// The lifetime of sessions in seconds, zero meaning unbounded, `SESSION_DURATION`.
    pub session_duration: u64,
    /// The file sessions are persisted to by [`AuthType::SessionDbAuth`], `SESSIONS_FILE`.
    pub sessions_file: PathBuf,
    /// Paths that do not require authentication, `EXEMPT_PATHS` as comma separated list.
    pub exempt_paths: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            auth_type: AuthType::None,
            session_name: None,
            session_duration: 0,
            sessions_file: PathBuf::from(".db_UserSession.json"),
            exempt_paths: [
                "/api/v1/status/",
                "/api/v1/unauthorized/",
                "/api/v1/forbidden/",
                "/api/v1/auth_session/login/",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl AuthConfig {
    /// Read the configuration from environment variables, using defaults for unset variables.
    ///
    /// A `SESSION_DURATION` that is not a non-negative integer is read as zero.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(auth_type) = env::var("AUTH_TYPE") {
            config.auth_type = AuthType::parse(&auth_type);
        }
        config.session_name = env::var("SESSION_NAME")
            .ok()
            .filter(|name| !name.trim().is_empty());
        if let Ok(duration) = env::var("SESSION_DURATION") {
            config.session_duration = duration.trim().parse().unwrap_or_else(|_| {
                warn!("Ignoring invalid SESSION_DURATION {duration:?}, sessions will not expire");
                0
            });
        }
        if let Ok(sessions_file) = env::var("SESSIONS_FILE") {
            config.sessions_file = PathBuf::from(sessions_file);
        }
        if let Ok(exempt_paths) = env::var("EXEMPT_PATHS") {
            config.exempt_paths = exempt_paths
                .split(',')
                .map(str::trim)
                .filter(|path| !path.is_empty())
                .map(String::from)
                .collect();
        }

        config
    }

    /// Parse the configuration from JSON. Missing fields take their defaults.
    ///
    /// Fails with [`Error::Config`] if the JSON is malformed or names an unknown kind of authentication.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::Config)
    }

    /// The session expiry policy.
    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy::new(self.session_duration)
    }

    /// The set of exempt paths.
    pub fn exempt(&self) -> ExemptPaths {
        ExemptPaths::new(self.exempt_paths.iter().cloned())
    }

    /// The strategy to resolve requests with.
    ///
    /// Session authentication without a cookie name cannot accept any credential,
    /// and falls back to [`AuthStrategy::None`].
    pub fn strategy(&self) -> AuthStrategy {
        match self.auth_type {
            AuthType::None | AuthType::Auth => AuthStrategy::None,
            AuthType::BasicAuth => AuthStrategy::Basic,
            AuthType::SessionAuth | AuthType::SessionExpAuth | AuthType::SessionDbAuth => {
                match &self.session_name {
                    Some(cookie_name) => AuthStrategy::Session {
                        cookie_name: cookie_name.clone(),
                    },
                    None => {
                        warn!("Session authentication is configured without SESSION_NAME, refusing all credentials");
                        AuthStrategy::None
                    }
                }
            }
        }
    }

    /// Build the session store layers matching the configured kind of authentication.
    pub fn session_store(&self) -> Arc<dyn SessionStore> {
        let policy = self.session_policy();
        match self.auth_type {
            AuthType::SessionExpAuth => Arc::new(ExpiringStore::new(MemoryStore::new(), policy)),
            AuthType::SessionDbAuth => Arc::new(PersistedStore::new(
                ExpiringStore::new(MemoryStore::new(), policy),
                JsonFileRecords::new(&self.sessions_file),
                policy,
            )),
            AuthType::None | AuthType::Auth | AuthType::BasicAuth | AuthType::SessionAuth => {
                Arc::new(MemoryStore::new())
            }
        }
    }
}
