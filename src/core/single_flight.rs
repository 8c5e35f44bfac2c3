//! Single-Flight Coordinator
//!
//! Collapses concurrent renewal requests into one underlying operation.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::error::{SessionError, SessionResult};
use crate::types::TokenTriple;

/// Pending outcome of a coordinated renewal; clone it to wait on it again.
pub type SharedRenewal = Shared<BoxFuture<'static, SessionResult<TokenTriple>>>;

struct InFlight {
    id: u64,
    future: SharedRenewal,
}

type Slot = Arc<Mutex<Option<InFlight>>>;

fn clear_slot(slot: &Slot, id: u64) {
    let mut guard = slot.lock();
    if guard.as_ref().map(|flight| flight.id) == Some(id) {
        *guard = None;
    }
}

/// Guarantees at most one renewal is running at any time.
///
/// The operation is spawned onto the tokio runtime, so it runs to completion
/// even if every caller stops waiting. The in-flight slot is emptied inside the
/// spawned task before the result becomes visible, so a caller that just saw a
/// failure can start a fresh renewal immediately.
#[derive(Default)]
pub struct SingleFlightCoordinator {
    in_flight: Slot,
    next_id: AtomicU64,
    started: AtomicU64,
    joined: AtomicU64,
}

impl SingleFlightCoordinator {
    /// Create new coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `operation` unless a renewal is already running, in which case
    /// the running one is returned and `operation` is never called.
    ///
    /// `operation` is invoked while the coordinator is locked and must only
    /// build the future, not poll or re-enter the coordinator.
    pub fn run_exclusive<F, Fut>(&self, operation: F) -> SharedRenewal
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SessionResult<TokenTriple>> + Send + 'static,
    {
        let mut slot = self.in_flight.lock();

        if let Some(existing) = slot.as_ref() {
            self.joined.fetch_add(1, Ordering::SeqCst);
            debug!(flight = existing.id, "Joining in-flight renewal");
            return existing.future.clone();
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.started.fetch_add(1, Ordering::SeqCst);
        debug!(flight = id, "Starting renewal");

        let task = operation();
        let task_slot = Arc::clone(&self.in_flight);
        let handle = tokio::spawn(async move {
            let result = task.await;
            clear_slot(&task_slot, id);
            result
        });

        let waiter_slot = Arc::clone(&self.in_flight);
        let future = async move {
            match handle.await {
                Ok(result) => result,
                Err(join_error) => {
                    // The task never reached its own cleanup.
                    clear_slot(&waiter_slot, id);
                    Err(SessionError::RenewalAborted {
                        message: join_error.to_string(),
                    })
                }
            }
        }
        .boxed()
        .shared();

        *slot = Some(InFlight {
            id,
            future: future.clone(),
        });

        future
    }

    /// Whether a renewal is currently running.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.lock().is_some()
    }

    /// Number of underlying operations started.
    pub fn started_count(&self) -> u64 {
        self.started.load(Ordering::SeqCst)
    }

    /// Number of requests that joined an operation already running.
    pub fn joined_count(&self) -> u64 {
        self.joined.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for SingleFlightCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlightCoordinator")
            .field("in_flight", &self.is_in_flight())
            .field("started", &self.started_count())
            .field("joined", &self.joined_count())
            .finish()
    }
}
