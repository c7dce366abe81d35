//! Authenticated request gateway
//!
//! Every request goes through the same sequence:
//!
//! ```text
//! CHECKING_TOKEN -> (REFRESHING)? -> SENDING -> (RE-REFRESHING -> RE-SENDING)? -> DONE | SESSION_EXPIRED
//! ```
//!
//! The proactive refresh runs only when the stored token is not valid; the
//! reactive one only when the server answers 401. No state is entered twice,
//! so a single `send` makes at most two HTTP attempts and two refreshes, all
//! strictly one after the other.

pub mod error;
pub mod json;
pub mod observer;
pub mod options;
pub mod session;

use crate::types::{RefreshRequest, RefreshResponse};
use error::{ClientError, SessionExpiredReason};
use observer::SessionObserver;
use options::RequestOptions;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Client, ClientBuilder, Response, StatusCode};
use rotary_gate_core::{
    Clock, GatewayConfig, MemoryTokenStore, StoreError, SystemClock, TokenStore, inspect_token,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Sends requests with a bearer token kept valid across the session
#[derive(Clone)]
pub struct AuthGateway {
    client: Client,
    base_url: String,
    refresh_url: String,
    login_redirect: String,
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    observer: Option<Arc<dyn SessionObserver>>,
    refresh_lock: Option<Arc<Mutex<()>>>,
}

impl AuthGateway {
    /// Create a gateway with an in-memory store and default settings
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new gateway builder
    pub fn builder() -> AuthGatewayBuilder {
        AuthGatewayBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL of a backend path
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// The credential store this gateway reads and rotates
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub(crate) const fn http(&self) -> &Client {
        &self.client
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Send `options` to `url` with a valid bearer token.
    ///
    /// Responses are returned as received, whatever their status, except that
    /// a 401 triggers one refresh and one identical retry whose response is
    /// final. Transport errors pass through unchanged.
    ///
    /// # Errors
    ///
    /// - [`ClientError::SessionExpired`] when a required refresh failed; the
    ///   stored tokens have been cleared
    /// - [`ClientError::Request`] for transport failures and timeouts
    /// - [`ClientError::Cancelled`] when the caller's cancellation token fired
    /// - [`ClientError::Store`] when the token store could not be read
    #[instrument(skip(self, options), fields(method = %options.method))]
    pub async fn send(&self, url: &str, options: RequestOptions) -> Result<Response, ClientError> {
        let stored = self.store.access_token().await?;
        let status = inspect_token(stored.as_deref(), self.clock());

        let token = match stored {
            Some(token) if status.is_valid() => token,
            stale => {
                debug!(?status, "access token unusable, refreshing before send");
                self.refresh_after(stale.as_deref()).await?
            }
        };

        let response = self.dispatch(url, &options, &token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!("server rejected access token, refreshing and retrying once");
        let token = self.refresh_after(Some(&token)).await?;
        self.dispatch(url, &options, &token).await
    }

    /// `send` with default options (a plain GET)
    ///
    /// # Errors
    ///
    /// See [`AuthGateway::send`]
    pub async fn get(&self, url: &str) -> Result<Response, ClientError> {
        self.send(url, RequestOptions::default()).await
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// On success the new access token is stored (and the refresh token too,
    /// if the server rotated it) and returned. On any failure both tokens are
    /// removed from the store and the observer is notified.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::SessionExpired`] whenever the exchange fails,
    /// including when no refresh token is stored
    pub async fn refresh(&self) -> Result<String, ClientError> {
        match &self.refresh_lock {
            Some(lock) => {
                let _guard = lock.lock().await;
                self.rotate_tokens().await
            }
            None => self.rotate_tokens().await,
        }
    }

    /// Refresh because `seen` was unusable.
    ///
    /// With single-flight enabled, a caller that waited for another refresh
    /// reuses the token it produced instead of rotating again.
    async fn refresh_after(&self, seen: Option<&str>) -> Result<String, ClientError> {
        let Some(lock) = &self.refresh_lock else {
            return self.rotate_tokens().await;
        };

        let _guard = lock.lock().await;
        if let Some(current) = self.store.access_token().await? {
            if Some(current.as_str()) != seen
                && inspect_token(Some(&current), self.clock()).is_valid()
            {
                debug!("reusing access token refreshed by a concurrent request");
                return Ok(current);
            }
        }
        self.rotate_tokens().await
    }

    async fn rotate_tokens(&self) -> Result<String, ClientError> {
        match self.exchange_refresh_token().await {
            Ok(token) => {
                info!("access token refreshed");
                Ok(token)
            }
            Err(reason) => Err(self.expire_session(reason).await),
        }
    }

    async fn exchange_refresh_token(&self) -> Result<String, SessionExpiredReason> {
        let store_failed = |e: StoreError| SessionExpiredReason::Store(e.to_string());

        let refresh_token = self
            .store
            .refresh_token()
            .await
            .map_err(store_failed)?
            .filter(|t| !t.is_empty())
            .ok_or(SessionExpiredReason::NoRefreshToken)?;

        let response = self
            .client
            .post(&self.refresh_url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(|e| SessionExpiredReason::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionExpiredReason::Rejected(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SessionExpiredReason::Transport(e.to_string()))?;
        let renewed: RefreshResponse = serde_json::from_slice(&body)
            .map_err(|e| SessionExpiredReason::MalformedResponse(e.to_string()))?;
        if renewed.token.is_empty() {
            return Err(SessionExpiredReason::MalformedResponse(
                "empty access token".into(),
            ));
        }

        self.store
            .store_tokens(&renewed.token, renewed.rotated_refresh_token())
            .await
            .map_err(store_failed)?;

        Ok(renewed.token)
    }

    async fn expire_session(&self, reason: SessionExpiredReason) -> ClientError {
        warn!(%reason, redirect = %self.login_redirect, "token refresh failed, ending session");

        if let Err(error) = self.store.clear_tokens().await {
            error!(%error, "failed to clear stored tokens");
        }
        if let Some(observer) = &self.observer {
            observer.on_session_expired(&reason, &self.login_redirect);
        }

        ClientError::SessionExpired(reason)
    }

    async fn dispatch(
        &self,
        url: &str,
        options: &RequestOptions,
        token: &str,
    ) -> Result<Response, ClientError> {
        let mut bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| ClientError::InvalidHeader(format!("authorization: {e}")))?;
        bearer.set_sensitive(true);

        let mut headers = options.headers.clone();
        headers.insert(AUTHORIZATION, bearer);

        let mut request = self
            .client
            .request(options.method.clone(), url)
            .headers(headers);
        if let Some(body) = &options.body {
            request = request.body(body.clone());
        }
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let pending = request.send();
        let response = match &options.cancel {
            Some(cancel) => tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ClientError::Cancelled),
                result = pending => result?,
            },
            None => pending.await?,
        };

        debug!(status = %response.status(), "response received");
        Ok(response)
    }
}

/// Builder for [`AuthGateway`]
#[derive(Default)]
pub struct AuthGatewayBuilder {
    base_url: Option<String>,
    refresh_path: Option<String>,
    login_redirect: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    store: Option<Arc<dyn TokenStore>>,
    clock: Option<Arc<dyn Clock>>,
    observer: Option<Arc<dyn SessionObserver>>,
    single_flight_refresh: bool,
}

impl AuthGatewayBuilder {
    /// Start from a loaded configuration
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            base_url: Some(config.base_url.clone()),
            refresh_path: Some(config.refresh_path.clone()),
            login_redirect: Some(config.login_redirect.clone()),
            timeout: config.timeout(),
            user_agent: Some(config.user_agent.clone()),
            single_flight_refresh: config.single_flight_refresh,
            ..Self::default()
        }
    }

    /// Set the base URL
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the path of the refresh endpoint (`/api/Auth/refresh` by default)
    #[must_use]
    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = Some(path.into());
        self
    }

    /// Set where observers are told to send the user after teardown
    #[must_use]
    pub fn login_redirect(mut self, redirect: impl Into<String>) -> Self {
        self.login_redirect = Some(redirect.into());
        self
    }

    /// Set the default request timeout (none unless set)
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Set the credential store (an in-memory store by default)
    #[must_use]
    pub fn store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the clock used for expiry checks
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Register the observer notified when a session ends
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Serialize refreshes and let waiting requests reuse the renewed token
    #[must_use]
    pub const fn single_flight_refresh(mut self, enabled: bool) -> Self {
        self.single_flight_refresh = enabled;
        self
    }

    /// Build the gateway
    pub fn build(self) -> Result<AuthGateway, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();
        url::Url::parse(&base_url)
            .map_err(|e| ClientError::Configuration(format!("invalid base_url {base_url:?}: {e}")))?;

        let defaults = GatewayConfig::default();
        let refresh_path = self.refresh_path.unwrap_or(defaults.refresh_path);
        let refresh_url = format!("{base_url}{refresh_path}");

        let mut client_builder = ClientBuilder::new()
            .user_agent(self.user_agent.unwrap_or(defaults.user_agent));
        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }
        let client = client_builder.build()?;

        Ok(AuthGateway {
            client,
            base_url,
            refresh_url,
            login_redirect: self.login_redirect.unwrap_or(defaults.login_redirect),
            store: self
                .store
                .unwrap_or_else(|| Arc::new(MemoryTokenStore::new())),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            observer: self.observer,
            refresh_lock: self
                .single_flight_refresh
                .then(|| Arc::new(Mutex::new(()))),
        })
    }
}
