use crate::directory::{Lookup, UserDirectory, UserUpdate};
use crate::token::{redact, DefaultTokenGenerator, TokenGenerator, DEFAULT_TOKEN_LENGTH};
use crate::{Error, PasswordHasher, Result};
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Issues and consumes one-shot password reset tokens.
///
/// A user holds at most one reset token at a time: issuing a new token replaces the previous one.
/// A token is cleared when it is consumed, so it can change the password only once.
#[derive(Debug, Clone)]
pub struct ResetTokenManager {
    directory: Arc<dyn UserDirectory>,
    hasher: Arc<dyn PasswordHasher>,
    generator: Arc<dyn TokenGenerator>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl ResetTokenManager {
    /// Create a manager issuing secure random tokens.
    pub fn new(directory: Arc<dyn UserDirectory>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self::new_with_generator(
            directory,
            hasher,
            Arc::new(DefaultTokenGenerator::<DEFAULT_TOKEN_LENGTH>),
        )
    }

    /// Create a manager issuing tokens from `generator`.
    pub fn new_with_generator(
        directory: Arc<dyn UserDirectory>,
        hasher: Arc<dyn PasswordHasher>,
        generator: Arc<dyn TokenGenerator>,
    ) -> Self {
        Self {
            directory,
            hasher,
            generator,
            in_flight: Default::default(),
        }
    }

    /// Issue a reset token for the user with the given email, replacing any previous token.
    ///
    /// Fails with [`Error::UserNotFound`] if there is no such user.
    pub async fn issue(&self, email: &str) -> Result<String> {
        let user = self
            .directory
            .find_one(Lookup::Email(email))
            .await?
            .ok_or(Error::UserNotFound)?;

        let token = self.generator.generate_token();
        self.directory
            .update(&user.id, UserUpdate::new().reset_token(Some(token.clone())))
            .await?;
        debug!("Issued reset token {} for user {}", redact(&token), user.id);
        Ok(token)
    }

    /// Set the password of the user holding `token` to `new_secret`, and clear the token.
    ///
    /// Fails with [`Error::InvalidToken`] if no user holds the token, including when it was consumed before.
    pub async fn consume(&self, token: &str, new_secret: &str) -> Result<()> {
        if token.is_empty() {
            return Err(Error::InvalidToken);
        }
        // Concurrent consumers of the same token must not both succeed.
        let Some(_claim) = Claim::acquire(&self.in_flight, token) else {
            return Err(Error::InvalidToken);
        };

        let user = self
            .directory
            .find_one(Lookup::ResetToken(token))
            .await?
            .ok_or(Error::InvalidToken)?;

        let digest = self.hasher.hash(new_secret)?;
        self.directory
            .update(
                &user.id,
                UserUpdate::new().hashed_password(digest).reset_token(None),
            )
            .await?;
        info!("Password of user {} was reset", user.id);
        Ok(())
    }
}

/// Marks a token as being consumed until dropped.
struct Claim<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    token: String,
}

impl<'a> Claim<'a> {
    fn acquire(in_flight: &'a Mutex<HashSet<String>>, token: &str) -> Option<Self> {
        in_flight.lock().insert(token.to_owned()).then(|| Self {
            in_flight,
            token: token.to_owned(),
        })
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.token);
    }
}
