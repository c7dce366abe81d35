//! Sign-in, sign-out and the signed-in user

use super::{AuthGateway, ClientError};
use crate::types::{LoginRequest, LoginResponse};
use rotary_gate_core::{
    GatewayConfig, SessionClaims, TokenStatus, USER_KEY, inspect_token,
};
use serde_json::Value;

/// A signed-in (or signing-in) user on top of an [`AuthGateway`]
#[derive(Clone)]
pub struct Session {
    gateway: AuthGateway,
    login_url: String,
    profile_url: String,
}

impl Session {
    /// Use the default login and profile paths
    pub fn new(gateway: AuthGateway) -> Self {
        let defaults = GatewayConfig::default();
        let login_url = gateway.endpoint(&defaults.login_path);
        let profile_url = gateway.endpoint(&defaults.profile_path);
        Self {
            gateway,
            login_url,
            profile_url,
        }
    }

    /// Use the paths from `config`
    pub fn from_config(gateway: AuthGateway, config: &GatewayConfig) -> Self {
        let login_url = gateway.endpoint(&config.login_path);
        let profile_url = gateway.endpoint(&config.profile_path);
        Self {
            gateway,
            login_url,
            profile_url,
        }
    }

    pub const fn gateway(&self) -> &AuthGateway {
        &self.gateway
    }

    /// Sign in with email and password.
    ///
    /// Stores the returned tokens, then loads the user's profile through the
    /// gateway and stores it too. When the profile has no `clubId`, the
    /// `ClubId` claim of the access token fills it in. Returns the profile.
    ///
    /// # Errors
    ///
    /// - [`ClientError::AuthenticationFailed`] when the server refuses the
    ///   credentials or returns no token
    /// - [`ClientError::NotFound`] when the profile endpoint returns nothing
    /// - any error from the login call or from loading the profile; tokens
    ///   stored before the failure are kept
    #[instrument(skip_all, fields(email = %credentials.email))]
    pub async fn login(&self, credentials: &LoginRequest) -> Result<Value, ClientError> {
        let response = self
            .gateway
            .http()
            .post(&self.login_url)
            .json(credentials)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            return Err(ClientError::from_status(status, message));
        }

        let login: LoginResponse = response.json().await?;
        if !login.is_success() {
            let message = login.message().unwrap_or("login rejected").to_string();
            return Err(ClientError::AuthenticationFailed(message));
        }
        let token = login.access_token().ok_or_else(|| {
            ClientError::AuthenticationFailed("missing authentication token".into())
        })?;

        let store = self.gateway.store();
        store.store_tokens(token, login.refresh_token()).await?;

        let mut profile: Value = self.gateway.get_json(&self.profile_url).await?;
        if profile.is_null() {
            return Err(ClientError::NotFound("user profile".into()));
        }
        backfill_club_id(&mut profile, token);

        store.set(USER_KEY, &profile.to_string()).await?;
        info!("signed in");
        Ok(profile)
    }

    /// Forget the tokens and the stored user
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Store`] if the store cannot be written
    pub async fn logout(&self) -> Result<(), ClientError> {
        self.gateway.store().clear_session().await?;
        info!("signed out");
        Ok(())
    }

    /// The stored profile, if any and if it parses
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Store`] if the store cannot be read
    pub async fn current_user(&self) -> Result<Option<Value>, ClientError> {
        let Some(raw) = self.gateway.store().user().await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(error) => {
                debug!(%error, "stored user is not valid JSON");
                Ok(None)
            }
        }
    }

    /// Identity claims of the stored access token, if it decodes
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Store`] if the store cannot be read
    pub async fn claims(&self) -> Result<Option<SessionClaims>, ClientError> {
        let Some(token) = self.gateway.store().access_token().await? else {
            return Ok(None);
        };
        match SessionClaims::decode(&token) {
            Ok(claims) => Ok(Some(claims)),
            Err(error) => {
                debug!(%error, "stored access token has unreadable claims");
                Ok(None)
            }
        }
    }

    /// Status of the stored access token
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Store`] if the store cannot be read
    pub async fn token_status(&self) -> Result<TokenStatus, ClientError> {
        let token = self.gateway.store().access_token().await?;
        Ok(inspect_token(token.as_deref(), self.gateway.clock()))
    }
}

fn backfill_club_id(profile: &mut Value, token: &str) {
    let Some(fields) = profile.as_object_mut() else {
        return;
    };
    if fields.get("clubId").is_some_and(|v| !v.is_null()) {
        return;
    }
    if let Some(club_id) = SessionClaims::decode(token).ok().and_then(|c| c.club_id) {
        fields.insert("clubId".to_string(), Value::String(club_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // payload: {"ClubId":"12"}
    const TOKEN_WITH_CLUB: &str = "eyJhbGciOiJIUzI1NiJ9.eyJDbHViSWQiOiIxMiJ9.sig";

    #[test]
    fn test_backfill_only_when_missing() {
        let mut missing = json!({ "id": 1 });
        backfill_club_id(&mut missing, TOKEN_WITH_CLUB);
        assert_eq!(missing["clubId"], "12");

        let mut null = json!({ "id": 1, "clubId": null });
        backfill_club_id(&mut null, TOKEN_WITH_CLUB);
        assert_eq!(null["clubId"], "12");

        let mut present = json!({ "id": 1, "clubId": 7 });
        backfill_club_id(&mut present, TOKEN_WITH_CLUB);
        assert_eq!(present["clubId"], 7);
    }

    #[test]
    fn test_backfill_ignores_unreadable_token() {
        let mut profile = json!({ "id": 1 });
        backfill_club_id(&mut profile, "garbage");
        assert!(profile.get("clubId").is_none());
    }
}
