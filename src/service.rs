use crate::directory::{Lookup, UserDirectory, UserRecord, UserUpdate};
use crate::token::redact;
use crate::{Error, PasswordHasher, ResetTokenManager, Result, SessionStore};
use log::{debug, info};
use std::sync::Arc;

/// The user authentication service: registration, login, logout and password reset.
///
/// Sessions live in the given session store, which is typically shared with an
/// [`AuthPolicy`](crate::AuthPolicy) gating the other routes of the service.
/// The user record additionally remembers the token of its most recent session.
#[derive(Debug, Clone)]
pub struct AuthService {
    directory: Arc<dyn UserDirectory>,
    sessions: Arc<dyn SessionStore>,
    hasher: Arc<dyn PasswordHasher>,
    resets: ResetTokenManager,
}

impl AuthService {
    /// Create a service issuing secure random reset tokens.
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        sessions: Arc<dyn SessionStore>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        let resets = ResetTokenManager::new(directory.clone(), hasher.clone());
        Self::new_with_resets(directory, sessions, hasher, resets)
    }

    /// Create a service using the given reset token manager.
    pub fn new_with_resets(
        directory: Arc<dyn UserDirectory>,
        sessions: Arc<dyn SessionStore>,
        hasher: Arc<dyn PasswordHasher>,
        resets: ResetTokenManager,
    ) -> Self {
        Self {
            directory,
            sessions,
            hasher,
            resets,
        }
    }

    /// Register a new user.
    ///
    /// Fails with [`Error::DuplicateRegistration`] if the email is taken.
    /// The password is only hashed once the email looks free. The directory rejects the email
    /// again on insertion, which decides between concurrent registrations.
    pub async fn register_user(&self, email: &str, password: &str) -> Result<UserRecord> {
        if self.directory.find_one(Lookup::Email(email)).await?.is_some() {
            return Err(Error::DuplicateRegistration {
                email: email.to_owned(),
            });
        }

        let digest = self.hasher.hash(password)?;
        let user = self.directory.create(email, &digest).await?;
        info!("Registered user {}", user.id);
        Ok(user)
    }

    /// Returns true if `password` is the password of the user with the given email.
    pub async fn valid_login(&self, email: &str, password: &str) -> Result<bool> {
        Ok(self.user_for_login(email, password).await?.is_some())
    }

    async fn user_for_login(&self, email: &str, password: &str) -> Result<Option<UserRecord>> {
        if email.is_empty() || password.is_empty() {
            return Ok(None);
        }
        Ok(self
            .directory
            .find_one(Lookup::Email(email))
            .await?
            .filter(|user| self.hasher.verify(&user.hashed_password, password)))
    }

    /// Log in the user with the given email, returning the token of a new session.
    /// Returns `Ok(None)` if the credentials are not valid.
    pub async fn login(&self, email: &str, password: &str) -> Result<Option<String>> {
        let Some(user) = self.user_for_login(email, password).await? else {
            debug!("Refusing login with invalid credentials");
            return Ok(None);
        };
        let Some(token) = self.sessions.create(&user.id).await? else {
            return Ok(None);
        };

        self.directory
            .update(&user.id, UserUpdate::new().session_id(Some(token.clone())))
            .await?;
        info!("User {} logged in with session {}", user.id, redact(&token));
        Ok(Some(token))
    }

    /// Return the user owning the session identified by `token`.
    pub async fn profile(&self, token: Option<&str>) -> Result<Option<UserRecord>> {
        let Some(token) = token else {
            return Ok(None);
        };
        let Some(user_id) = self.sessions.resolve(token).await? else {
            return Ok(None);
        };
        self.directory.find_one(Lookup::Id(&user_id)).await
    }

    /// Log out of the session identified by `token`.
    /// Returns false if the token does not identify an active session.
    pub async fn logout(&self, token: Option<&str>) -> Result<bool> {
        let Some(token) = token else {
            return Ok(false);
        };
        let Some(user) = self.profile(Some(token)).await? else {
            return Ok(false);
        };

        let destroyed = self.sessions.destroy(token).await?;
        if user.session_id.as_deref() == Some(token) {
            self.directory
                .update(&user.id, UserUpdate::new().session_id(None))
                .await?;
        }
        info!("User {} logged out", user.id);
        Ok(destroyed)
    }

    /// Issue a password reset token for the user with the given email.
    ///
    /// Fails with [`Error::UserNotFound`] if there is no such user.
    pub async fn reset_password_token(&self, email: &str) -> Result<String> {
        self.resets.issue(email).await
    }

    /// Set a new password using a reset token.
    ///
    /// Fails with [`Error::InvalidToken`] if the token is unknown or was used before.
    pub async fn update_password(&self, reset_token: &str, password: &str) -> Result<()> {
        self.resets.consume(reset_token, password).await
    }

    /// The reset token manager of this service.
    pub fn resets(&self) -> &ResetTokenManager {
        &self.resets
    }
}
