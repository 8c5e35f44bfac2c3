//! Session Lifecycle
//!
//! Scheduling, coordination and teardown of an authenticated session.

pub mod manager;
mod renewal;
pub mod scheduler;

use crate::error::SessionError;

pub use manager::SessionLifecycleManager;
pub use scheduler::{RefreshScheduler, SchedulerPhase};

/// Receives the end of a session that could not be kept alive.
///
/// Called at most once per session, after retries are exhausted or the
/// refresh token is rejected, and before the stored tokens are cleared.
pub trait SessionTeardown: Send + Sync {
    /// The session ended because of `error`.
    fn on_session_ended(&self, error: &SessionError);
}

impl<F> SessionTeardown for F
where
    F: Fn(&SessionError) + Send + Sync,
{
    fn on_session_ended(&self, error: &SessionError) {
        self(error)
    }
}
