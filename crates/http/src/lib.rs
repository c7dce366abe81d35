//! Rotary gate HTTP client
//!
//! [`AuthGateway`] sends requests with a bearer token that it keeps valid:
//! expired tokens are refreshed before sending, and a request the server
//! rejects with 401 is refreshed and retried exactly once. When the session
//! cannot be renewed the stored tokens are cleared and callers receive
//! [`ClientError::SessionExpired`].

#[macro_use]
extern crate tracing;

pub mod client;
pub mod types;

pub use client::error::{ClientError, SessionExpiredReason};
pub use client::observer::{FnObserver, SessionObserver};
pub use client::options::RequestOptions;
pub use client::session::Session;
pub use client::{AuthGateway, AuthGatewayBuilder};
