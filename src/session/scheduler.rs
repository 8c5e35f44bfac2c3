//! Refresh Scheduler
//!
//! Owns the single timer that renews the session shortly before expiry.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::expiry::to_chrono;
use crate::core::{Clock, ExpiryPolicy};
use crate::error::SessionError;
use crate::resilience::RetryPolicy;
use crate::session::renewal::Renewer;
use crate::session::SessionTeardown;
use crate::telemetry::{log_session_error, SessionMetrics};
use crate::token::TokenStore;

/// Scheduler phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// No timer; nothing scheduled.
    Idle,
    /// Timer pending for a triple expiring at `expires_at`.
    Armed { expires_at: DateTime<Utc> },
    /// A renewal is running or a retry is pending. `attempt` counts failures
    /// so far.
    Renewing { attempt: u32 },
    /// Retries exhausted or terminal failure; the session was torn down.
    Failed,
}

struct SchedulerState {
    phase: SchedulerPhase,
    timer: Option<JoinHandle<()>>,
    generation: u64,
    armed_for: Option<Duration>,
    next_fire_at: Option<DateTime<Utc>>,
}

impl SchedulerState {
    /// Invalidate the current timer and any work started from it.
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.generation += 1;
        self.armed_for = None;
        self.next_fire_at = None;
    }
}

pub(crate) struct SchedulerContext {
    pub(crate) renewer: Arc<Renewer>,
    pub(crate) store: Arc<TokenStore>,
    pub(crate) expiry: ExpiryPolicy,
    pub(crate) retry: RetryPolicy,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) teardown: Arc<dyn SessionTeardown>,
    pub(crate) metrics: Arc<dyn SessionMetrics>,
}

struct SchedulerInner {
    state: Mutex<SchedulerState>,
    ctx: SchedulerContext,
}

/// Timer-driven renewal.
///
/// At most one timer task exists at a time. Every arm, disarm, retry and
/// teardown bumps a generation counter; a timer or renewal that finishes under
/// an older generation changes nothing.
pub struct RefreshScheduler {
    inner: Arc<SchedulerInner>,
}

impl RefreshScheduler {
    pub(crate) fn new(ctx: SchedulerContext) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                state: Mutex::new(SchedulerState {
                    phase: SchedulerPhase::Idle,
                    timer: None,
                    generation: 0,
                    armed_for: None,
                    next_fire_at: None,
                }),
                ctx,
            }),
        }
    }

    /// Schedule a renewal `lead_time` before `expires_at`, replacing any
    /// pending timer. An expiry already inside the lead time fires at once.
    ///
    /// Arming a `Failed` scheduler starts a new session.
    pub fn arm(&self, expires_at: DateTime<Utc>) {
        let mut state = self.inner.state.lock();
        if state.phase == SchedulerPhase::Failed {
            info!("Re-arming after teardown; new session");
        }
        self.inner.arm_locked(&mut state, expires_at);
    }

    /// Re-arm from a newer expiry if armed or renewing. A pending retry is
    /// cancelled. Idle and failed schedulers are left alone.
    pub(crate) fn rearm_if_active(&self, expires_at: DateTime<Utc>) {
        let mut state = self.inner.state.lock();
        if matches!(
            state.phase,
            SchedulerPhase::Armed { .. } | SchedulerPhase::Renewing { .. }
        ) {
            self.inner.arm_locked(&mut state, expires_at);
        }
    }

    /// Cancel the pending timer and go idle.
    ///
    /// A renewal already handed to the coordinator still finishes and updates
    /// the store; nothing is scheduled from its result.
    pub fn disarm(&self) {
        let mut state = self.inner.state.lock();
        state.cancel_timer();
        if state.phase != SchedulerPhase::Idle {
            debug!(phase = ?state.phase, "Scheduler disarmed");
        }
        state.phase = SchedulerPhase::Idle;
    }

    /// Renew immediately if the armed triple has become due, e.g. after the
    /// process slept through its timer. Returns whether a renewal was triggered.
    pub fn on_liveness_signal(&self) -> bool {
        let triggered = self.inner.trigger_if_due();
        self.inner.ctx.metrics.record_liveness_signal(triggered);
        triggered
    }

    /// Tear the session down: notify the teardown callback, then clear the
    /// store. Runs at most once per session; later calls are no-ops.
    pub async fn tear_down(&self, error: SessionError) {
        let generation = self.inner.state.lock().generation;
        self.inner.tear_down(generation, error).await;
    }

    /// Current phase.
    pub fn phase(&self) -> SchedulerPhase {
        self.inner.state.lock().phase
    }

    /// Delay the pending timer was armed with.
    pub fn armed_for(&self) -> Option<Duration> {
        self.inner.state.lock().armed_for
    }

    /// Wall-clock instant the pending timer is due.
    pub fn next_fire_at(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock().next_fire_at
    }

    /// Whether a timer task is pending.
    pub fn has_pending_timer(&self) -> bool {
        self.inner
            .state
            .lock()
            .timer
            .as_ref()
            .map_or(false, |timer| !timer.is_finished())
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.inner.state.lock().cancel_timer();
    }
}

impl std::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("RefreshScheduler")
            .field("phase", &state.phase)
            .field("generation", &state.generation)
            .field("next_fire_at", &state.next_fire_at)
            .finish()
    }
}

impl SchedulerInner {
    fn arm_locked(self: &Arc<Self>, state: &mut SchedulerState, expires_at: DateTime<Utc>) {
        state.cancel_timer();

        let now = self.ctx.clock.now();
        let delay = self.ctx.expiry.renewal_delay(expires_at, now);
        state.phase = SchedulerPhase::Armed { expires_at };
        state.armed_for = Some(delay);
        state.next_fire_at = Some(now + to_chrono(delay));
        state.timer = Some(self.spawn_timer(state.generation, delay));

        debug!(
            %expires_at,
            delay_secs = delay.as_secs(),
            generation = state.generation,
            "Scheduler armed"
        );
    }

    fn spawn_timer(self: &Arc<Self>, generation: u64, delay: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.fire(generation).await;
            }
        })
    }

    fn trigger_if_due(self: &Arc<Self>) -> bool {
        let mut state = self.state.lock();
        let SchedulerPhase::Armed { expires_at } = state.phase else {
            return false;
        };

        let now = self.ctx.clock.now();
        if !self.ctx.expiry.needs_renewal(expires_at, now) {
            return false;
        }

        info!(%expires_at, "Liveness signal found a due token; renewing now");
        state.cancel_timer();
        state.armed_for = Some(Duration::ZERO);
        state.next_fire_at = Some(now);
        state.timer = Some(self.spawn_timer(state.generation, Duration::ZERO));
        true
    }

    fn fire(self: Arc<Self>, generation: u64) -> BoxFuture<'static, ()> {
        async move {
            let attempt = {
                let mut state = self.state.lock();
                if state.generation != generation {
                    return;
                }
                // The running task is this one; dropping the handle detaches it.
                state.timer = None;
                state.armed_for = None;
                state.next_fire_at = None;
                let attempt = match state.phase {
                    SchedulerPhase::Renewing { attempt } => attempt,
                    _ => 0,
                };
                state.phase = SchedulerPhase::Renewing { attempt };
                attempt
            };

            // Also covers a pending retry overtaken by an on-demand renewal.
            if let Some(current) = self.ctx.store.read() {
                let now = self.ctx.clock.now();
                if !self.ctx.expiry.needs_renewal(current.expires_at(), now) {
                    debug!(
                        token = %current.fingerprint(),
                        attempt,
                        "Tokens renewed elsewhere; re-arming"
                    );
                    self.arm_if_current(generation, current.expires_at());
                    return;
                }
            }

            let renewal = self.ctx.renewer.renew(attempt + 1);
            match renewal.await {
                Ok(renewed) => self.arm_if_current(generation, renewed.expires_at()),
                Err(error) => self.handle_failure(generation, attempt + 1, error).await,
            }
        }
        .boxed()
    }

    fn arm_if_current(self: &Arc<Self>, generation: u64, expires_at: DateTime<Utc>) {
        let mut state = self.state.lock();
        if state.generation == generation {
            self.arm_locked(&mut state, expires_at);
        } else {
            debug!("Scheduler changed during renewal; not re-arming");
        }
    }

    async fn handle_failure(self: &Arc<Self>, generation: u64, attempt: u32, error: SessionError) {
        let retry = &self.ctx.retry;
        if error.is_retryable() && retry.should_retry(attempt) {
            let delay = retry
                .next_delay(attempt)
                .max(error.retry_after().unwrap_or_default());

            let mut state = self.state.lock();
            if state.generation != generation {
                return;
            }
            state.cancel_timer();
            state.phase = SchedulerPhase::Renewing { attempt };
            state.armed_for = Some(delay);
            state.next_fire_at = Some(self.ctx.clock.now() + to_chrono(delay));
            state.timer = Some(self.spawn_timer(state.generation, delay));

            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Transient renewal failure; retrying"
            );
            self.ctx
                .metrics
                .record_retry(attempt, delay.as_secs_f64() * 1000.0);
            return;
        }

        self.tear_down(generation, error).await;
    }

    async fn tear_down(&self, generation: u64, error: SessionError) {
        {
            let mut state = self.state.lock();
            if state.generation != generation || state.phase == SchedulerPhase::Failed {
                debug!("Session already torn down or superseded");
                return;
            }
            state.cancel_timer();
            state.phase = SchedulerPhase::Failed;
        }

        log_session_error(&error, "session torn down");
        self.ctx.metrics.record_teardown(error.error_code());
        self.ctx.teardown.on_session_ended(&error);

        if let Err(e) = self.ctx.store.clear().await {
            warn!(error = %e, "Failed to clear tokens after teardown");
        }
    }
}
