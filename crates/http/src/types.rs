//! Wire types exchanged with the auth server

use serde::{Deserialize, Serialize};

/// Body of the refresh-token exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Successful refresh response
///
/// `token` is required; a new refresh token is optional and the current one
/// is kept when it is absent or empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl RefreshResponse {
    /// The rotated refresh token, if the server issued a usable one
    pub fn rotated_refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Credentials posted to the login endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response
///
/// The backend is not consistent about casing, so both spellings of the
/// success flag and message are accepted, and the access token may arrive as
/// `token` or `accessToken`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default, rename = "Success")]
    success_pascal: Option<bool>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default, rename = "accessToken")]
    access_token: Option<String>,
    #[serde(default, rename = "refreshToken")]
    refresh_token: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "Message")]
    message_pascal: Option<String>,
}

impl LoginResponse {
    pub fn is_success(&self) -> bool {
        self.success.unwrap_or(false) || self.success_pascal.unwrap_or(false)
    }

    pub fn access_token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .filter(|t| !t.is_empty())
            .or_else(|| self.access_token.as_deref().filter(|t| !t.is_empty()))
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref().or(self.message_pascal.as_deref())
    }
}
