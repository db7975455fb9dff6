//! User and session models shared by the authority and the client.

use serde::{Deserialize, Serialize};

use crate::db::{Collection, Record};
use crate::errors::AppError;

/// Minimum accepted password length at signup.
pub const MIN_PASSWORD_LEN: usize = 6;

/// An authenticated member of the community.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Display alias, never derived from `id`
    pub anonymous_id: String,
}

impl Record for User {
    const COLLECTION: Collection = Collection::Users;

    fn id(&self) -> &str {
        &self.id
    }
}

/// A bearer token together with the user it was issued to.
///
/// This is also the wire shape of every successful authentication call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user: User,
}

/// Request body for credential login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for account creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl SignupRequest {
    /// Check the fields locally, before contacting the authority.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("Name is required".to_string()));
        }
        if !self.email.contains('@') {
            return Err(AppError::Validation(
                "A valid email address is required".to_string(),
            ));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        Ok(())
    }
}

/// Request body for exchanging a one-time external session identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeSessionRequest {
    pub session_id: String,
}

/// Normalize an email for use as an account key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
