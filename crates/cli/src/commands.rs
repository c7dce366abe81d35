//! CLI commands

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use reqwest::Method;
use rotary_gate_core::{FileTokenStore, GatewayConfig};
use rotary_gate_http::types::LoginRequest;
use rotary_gate_http::{
    AuthGateway, AuthGatewayBuilder, FnObserver, RequestOptions, Session, SessionExpiredReason,
};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config;

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the session
    Login {
        /// Account email
        email: String,

        /// Account password
        #[arg(long, env = "ROTARY_GATE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the stored session
    Logout,

    /// Show the stored session: token status, claims and user
    Status,

    /// Exchange the refresh token for a new access token now
    Refresh,

    /// Send an authenticated request and print the response body
    Request {
        /// Path relative to the configured base URL, or an absolute URL
        url: String,

        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Extra header as "Name: value" (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Raw request body
        #[arg(long, conflicts_with = "json")]
        data: Option<String>,

        /// JSON request body
        #[arg(long)]
        json: Option<String>,

        /// Timeout for this request in seconds
        #[arg(long)]
        request_timeout: Option<u64>,
    },
}

impl Commands {
    pub async fn execute(
        self,
        data_dir: PathBuf,
        config_path: Option<PathBuf>,
        timeout_secs: u64,
    ) -> Result<()> {
        let mut config = config::load_gateway_config(config_path.as_deref())?;
        config::apply_request_timeout(&mut config, timeout_secs);
        let gateway = build_gateway(&config, &data_dir)?;

        match self {
            Self::Login { email, password } => login(&config, gateway, email, password).await,
            Self::Logout => {
                Session::from_config(gateway, &config).logout().await?;
                println!("Signed out");
                Ok(())
            }
            Self::Status => status(&config, gateway).await,
            Self::Refresh => {
                gateway.refresh().await?;
                println!("Access token refreshed");
                Ok(())
            }
            Self::Request {
                url,
                method,
                headers,
                data,
                json,
                request_timeout,
            } => {
                let options =
                    request_options(&method, &headers, data, json.as_deref(), request_timeout)?;
                request(&gateway, &url, options).await
            }
        }
    }
}

fn build_gateway(config: &GatewayConfig, data_dir: &std::path::Path) -> Result<AuthGateway> {
    let store = FileTokenStore::new(config::session_file(data_dir));
    let observer = FnObserver::new(|reason: &SessionExpiredReason, redirect: &str| {
        warn!(%reason, %redirect, "Session ended, run `rotary-gate login` to sign in again");
    });

    AuthGatewayBuilder::from_config(config)
        .store(Arc::new(store))
        .observer(Arc::new(observer))
        .build()
        .context("building gateway")
}

async fn login(
    config: &GatewayConfig,
    gateway: AuthGateway,
    email: String,
    password: String,
) -> Result<()> {
    let session = Session::from_config(gateway, config);
    let profile = session.login(&LoginRequest { email, password }).await?;
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}

async fn status(config: &GatewayConfig, gateway: AuthGateway) -> Result<()> {
    let session = Session::from_config(gateway, config);
    let token_status = session.token_status().await?;
    let claims = session.claims().await?;
    let role = claims.as_ref().and_then(|c| c.primary_role().map(str::to_string));

    let report = json!({
        "base_url": config.base_url,
        "token": format!("{token_status:?}").to_lowercase(),
        "role": role,
        "claims": claims,
        "user": session.current_user().await?,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn request_options(
    method: &str,
    headers: &[String],
    data: Option<String>,
    json: Option<&str>,
    timeout: Option<u64>,
) -> Result<RequestOptions> {
    let method = Method::from_bytes(method.to_uppercase().as_bytes())
        .with_context(|| format!("invalid method {method:?}"))?;
    let mut options = RequestOptions::new(method);

    for header in headers {
        let Some((name, value)) = header.split_once(':') else {
            bail!("header {header:?} is not in \"Name: value\" form");
        };
        options = options.try_header(name.trim(), value.trim())?;
    }

    if let Some(data) = data {
        options = options.body(data);
    }
    if let Some(json) = json {
        let value: Value = serde_json::from_str(json).context("--json is not valid JSON")?;
        options = options.json(&value)?;
    }
    if let Some(secs) = timeout {
        options = options.timeout(Duration::from_secs(secs));
    }

    Ok(options)
}

fn resolve_url(gateway: &AuthGateway, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else if url.starts_with('/') {
        gateway.endpoint(url)
    } else {
        gateway.endpoint(&format!("/{url}"))
    }
}

async fn request(gateway: &AuthGateway, url: &str, options: RequestOptions) -> Result<()> {
    let url = resolve_url(gateway, url);

    // Ctrl-C abandons the in-flight request
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let response = gateway.send(&url, options.cancel_on(cancel)).await?;
    let status = response.status();
    info!(%status, %url, "Response received");

    let body = response.text().await?;
    if !body.is_empty() {
        println!("{body}");
    }
    if !status.is_success() {
        bail!("server answered {status}");
    }
    Ok(())
}
