//! Rotary gate core types and utilities
//!
//! Everything the authenticated request gateway needs that does not touch the
//! network: access token inspection, the credential store abstraction and its
//! implementations, a wall clock seam, and configuration loading.

pub mod clock;
pub mod config;
pub mod error;
pub mod store;
pub mod token;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::GatewayConfig;
pub use error::{CoreError, CoreResult};
pub use store::{
    FileTokenStore, MemoryTokenStore, REFRESH_TOKEN_KEY, StoreError, StoreResult, TOKEN_KEY,
    TokenStore, USER_KEY,
};
pub use token::{
    SessionClaims, TokenDecodeError, TokenStatus, inspect_token, inspect_token_at, is_token_valid,
};
