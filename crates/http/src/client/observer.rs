//! Session teardown notifications
//!
//! The gateway never navigates anywhere itself. When a refresh fails it
//! clears the stored tokens and tells the registered observer, which decides
//! what "go to the login view" means for the application embedding it.

use super::error::SessionExpiredReason;

/// Receives a callback each time the gateway ends a session
pub trait SessionObserver: Send + Sync {
    /// `redirect` is the configured login location (`/login` by default)
    fn on_session_expired(&self, reason: &SessionExpiredReason, redirect: &str);
}

/// Observer backed by a closure
pub struct FnObserver<F>(F);

impl<F> FnObserver<F>
where
    F: Fn(&SessionExpiredReason, &str) + Send + Sync,
{
    pub const fn new(callback: F) -> Self {
        Self(callback)
    }
}

impl<F> SessionObserver for FnObserver<F>
where
    F: Fn(&SessionExpiredReason, &str) + Send + Sync,
{
    fn on_session_expired(&self, reason: &SessionExpiredReason, redirect: &str) {
        (self.0)(reason, redirect);
    }
}
