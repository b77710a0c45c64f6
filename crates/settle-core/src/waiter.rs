//! Convergence waiter
//!
//! Polls a [`Probe`] until the observed state settles on a target label, the
//! resource disappears (when that is the goal), an unexpected state shows up,
//! or the deadline passes.
//!
//! Each call to [`Waiter::wait`] is an independent run. Its counters live in a
//! private `RunState` that is dropped when the call returns, so any number of
//! waits can run concurrently without sharing anything.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};

use crate::backoff::Backoff;
use crate::config::WaitConfig;
use crate::error::{ProbeError, WaitError};
use crate::probe::{Observation, Probe};

/// Drives one wait configuration against probes
#[derive(Debug, Clone)]
pub struct Waiter {
    config: WaitConfig,
    cancel: CancellationToken,
}

impl Waiter {
    /// Create a new waiter
    #[must_use]
    pub fn new(config: WaitConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort waits when `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &WaitConfig {
        &self.config
    }

    /// Poll `probe` until the resource converges
    ///
    /// Returns the payload of the observation that completed the wait. When
    /// waiting for the resource to disappear that payload is `None`.
    ///
    /// # Errors
    /// Returns [`WaitError`] when the configuration is invalid, the probe
    /// fails, an unexpected state or absence is observed, the timeout
    /// elapses, or the cancellation token fires.
    #[instrument(
        skip_all,
        level = "debug",
        fields(expected = ?self.config.expected_states(), timeout = ?self.config.timeout)
    )]
    pub async fn wait<P>(&self, probe: &P) -> Result<Option<P::Payload>, WaitError<P::Payload>>
    where
        P: Probe + ?Sized,
    {
        let config = &self.config;
        config.validate()?;

        let mut run = RunState::new(config);

        if !config.delay.is_zero() {
            debug!(delay = ?config.delay, "delaying first probe");
            if !self.sleep(config.delay).await {
                return Err(run.cancelled());
            }
        }

        loop {
            if self.cancel.is_cancelled() {
                return Err(run.cancelled());
            }

            run.probes += 1;
            let observation = match probe.probe().await {
                Ok(observation) => observation,
                Err(source) => return Err(run.probe_failed(source)),
            };

            if let Step::Done(payload) = run.observe(config, observation)? {
                debug!(
                    probes = run.probes,
                    elapsed = ?run.started.elapsed(),
                    "resource converged"
                );
                return Ok(payload);
            }

            let elapsed = run.started.elapsed();
            if elapsed >= config.timeout {
                debug!(probes = run.probes, elapsed = ?elapsed, "wait timed out");
                return Err(run.timed_out(config));
            }

            let interval = run.backoff.next_interval(config.timeout - elapsed);
            trace!(
                state = run.last_state.as_deref().unwrap_or("<absent>"),
                interval = ?interval,
                "still converging"
            );

            if !self.sleep(interval).await {
                return Err(run.cancelled());
            }
        }
    }

    /// Sleep for `duration`, returning `false` if cancelled first
    async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(duration) => true,
        }
    }
}

/// Wait for a resource to converge
///
/// # Errors
/// See [`Waiter::wait`].
pub async fn wait_for_state<P>(
    config: WaitConfig,
    probe: &P,
) -> Result<Option<P::Payload>, WaitError<P::Payload>>
where
    P: Probe + ?Sized,
{
    Waiter::new(config).wait(probe).await
}

/// Wait for a resource to converge, aborting when `cancel` fires
///
/// # Errors
/// See [`Waiter::wait`].
pub async fn wait_for_state_with_cancel<P>(
    config: WaitConfig,
    probe: &P,
    cancel: CancellationToken,
) -> Result<Option<P::Payload>, WaitError<P::Payload>>
where
    P: Probe + ?Sized,
{
    Waiter::new(config)
        .with_cancellation(cancel)
        .wait(probe)
        .await
}

/// Outcome of classifying one observation
enum Step<T> {
    Continue,
    Done(Option<T>),
}

/// Mutable state of a single run
struct RunState<T> {
    started: Instant,
    backoff: Backoff,
    probes: u32,
    target_occurrences: u32,
    not_found: u32,
    last_state: Option<String>,
    last_payload: Option<T>,
}

impl<T> RunState<T> {
    fn new(config: &WaitConfig) -> Self {
        Self {
            started: Instant::now(),
            backoff: Backoff::from_config(config),
            probes: 0,
            target_occurrences: 0,
            not_found: 0,
            last_state: None,
            last_payload: None,
        }
    }

    fn observe(
        &mut self,
        config: &WaitConfig,
        observation: Observation<T>,
    ) -> Result<Step<T>, WaitError<T>> {
        let Observation { payload, state } = observation;

        let Some(payload) = payload else {
            self.not_found += 1;
            self.target_occurrences = 0;
            trace!(count = self.not_found, "resource not found");

            if config.waits_for_absence() {
                if self.not_found >= config.not_found_checks {
                    return Ok(Step::Done(None));
                }
            } else if self.not_found > config.not_found_checks {
                return Err(WaitError::UnexpectedAbsence {
                    checks: self.not_found,
                    expected: config.expected_states(),
                    last_state: self.last_state.take(),
                    payload: self.last_payload.take(),
                });
            }

            return Ok(Step::Continue);
        };

        self.not_found = 0;

        if config.is_target(&state) {
            self.target_occurrences += 1;
            if self.target_occurrences >= config.continuous_target_occurrence {
                return Ok(Step::Done(Some(payload)));
            }
            trace!(
                state = %state,
                count = self.target_occurrences,
                required = config.continuous_target_occurrence,
                "target state observed"
            );
        } else if config.is_pending(&state) {
            self.target_occurrences = 0;
        } else {
            return Err(WaitError::UnexpectedState {
                state,
                expected: config.expected_states(),
                payload: Some(payload),
            });
        }

        self.last_state = Some(state);
        self.last_payload = Some(payload);
        Ok(Step::Continue)
    }

    fn probe_failed(&mut self, source: ProbeError) -> WaitError<T> {
        WaitError::Probe {
            source,
            last_state: self.last_state.take(),
            payload: self.last_payload.take(),
        }
    }

    fn timed_out(&mut self, config: &WaitConfig) -> WaitError<T> {
        WaitError::Timeout {
            timeout: config.timeout,
            expected: config.expected_states(),
            last_state: self.last_state.take(),
            payload: self.last_payload.take(),
        }
    }

    fn cancelled(&mut self) -> WaitError<T> {
        WaitError::Cancelled {
            last_state: self.last_state.take(),
            payload: self.last_payload.take(),
        }
    }
}
