//! JSON bodies exchanged with the HTTP boundary.

use serde::{Deserialize, Serialize};

/// The body of a refused request, e.g. `{"error": "Forbidden"}`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// A constant, generic description of the status.
    pub error: String,
}

impl ErrorBody {
    fn new(error: &str) -> Self {
        Self {
            error: error.to_owned(),
        }
    }

    /// The body of a 401 response.
    pub fn unauthorized() -> Self {
        Self::new("Unauthorized")
    }

    /// The body of a 403 response.
    pub fn forbidden() -> Self {
        Self::new("Forbidden")
    }

    /// The body of a 404 response.
    pub fn not_found() -> Self {
        Self::new("Not found")
    }
}

/// A body carrying only a message, e.g. `{"message": "email already registered"}`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct MessageBody {
    /// The message.
    pub message: String,
}

impl MessageBody {
    /// The answer to a registration with an email that is taken.
    pub fn email_already_registered() -> Self {
        Self {
            message: "email already registered".to_owned(),
        }
    }
}

/// A body naming a user and carrying a message, e.g. `{"email": "a@b.com", "message": "logged in"}`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct UserMessage {
    /// The email of the user.
    pub email: String,
    /// The message.
    pub message: String,
}

impl UserMessage {
    fn new(email: &str, message: &str) -> Self {
        Self {
            email: email.to_owned(),
            message: message.to_owned(),
        }
    }

    /// The answer to a successful registration.
    pub fn user_created(email: &str) -> Self {
        Self::new(email, "user created")
    }

    /// The answer to a successful login.
    pub fn logged_in(email: &str) -> Self {
        Self::new(email, "logged in")
    }

    /// The answer to a successful password update.
    pub fn password_updated(email: &str) -> Self {
        Self::new(email, "Password updated")
    }
}

/// The answer to a reset token request.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ResetTokenIssued {
    /// The email of the user.
    pub email: String,
    /// The issued reset token.
    pub reset_token: String,
}

/// The profile of a logged in user.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// The email of the user.
    pub email: String,
}
