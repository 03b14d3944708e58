use std::sync::LazyLock;
use std::time::Duration;

use rand::Rng;
use regex::Regex;

use super::run::RunOutcome;
use crate::error::SectionFault;

/// Bounds applied to a wait time parsed out of a rate-limit message.
const MIN_WAIT_HINT: Duration = Duration::from_secs(1);
const MAX_WAIT_HINT: Duration = Duration::from_secs(300);

/// Poll interval growth factor per iteration.
const POLL_BACKOFF_FACTOR: f64 = 1.5;

/// Fraction of the base wait added as random jitter, at most.
const JITTER_FRACTION: f64 = 0.25;

// "Try again in 40 seconds." / "retry after 3 second"
static WAIT_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*second").expect("valid wait hint regex"));

/// Timing and retry limits for one section.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum run submissions per section.
    pub max_attempts: u32,
    pub initial_poll_interval: Duration,
    pub max_poll_interval: Duration,
    /// Wall-clock budget of a single run, measured from submission.
    pub run_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_poll_interval: Duration::from_millis(1500),
            max_poll_interval: Duration::from_secs(6),
            run_timeout: Duration::from_secs(480),
        }
    }
}

/// Per-section retry bookkeeping. Created fresh for every section.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryState {
    /// Submissions made so far (1-based once the first run is submitted).
    pub attempt: u32,
    pub poll_interval: Duration,
    /// Clock reading when the current run was submitted.
    pub run_started: Duration,
}

/// What the executor does after a run ends.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Read the reply of `run_id` and partition it.
    Extract { run_id: String },
    /// Wait, then submit the section again as a new run.
    Retry { reason: SectionFault, wait: Duration },
    /// Stop; every question of the section gets the fault's sentinel.
    GiveUp(SectionFault),
}

impl RetryState {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            attempt: 0,
            poll_interval: policy.initial_poll_interval,
            run_started: Duration::ZERO,
        }
    }

    /// Registers a new submission at clock reading `now` and resets polling.
    pub fn begin_attempt(&mut self, policy: &RetryPolicy, now: Duration) {
        self.attempt += 1;
        self.poll_interval = policy.initial_poll_interval;
        self.run_started = now;
    }

    /// Advances the poll interval geometrically, capped at the policy maximum.
    pub fn grow_poll_interval(&mut self, policy: &RetryPolicy) {
        self.poll_interval = self
            .poll_interval
            .mul_f64(POLL_BACKOFF_FACTOR)
            .min(policy.max_poll_interval);
    }

    pub fn timed_out(&self, policy: &RetryPolicy, now: Duration) -> bool {
        now.saturating_sub(self.run_started) > policy.run_timeout
    }
}

impl RetryPolicy {
    /// Computes the transition for a finished run.
    ///
    /// Rate limits and timeouts retry while `attempt < max_attempts`; every
    /// other fault gives up immediately.
    pub fn next(&self, state: &RetryState, outcome: &RunOutcome) -> Transition {
        let attempt = state.attempt.max(1);
        match outcome {
            RunOutcome::Completed { run_id } => Transition::Extract {
                run_id: run_id.clone(),
            },
            RunOutcome::SubmitRateLimited {
                message,
                retry_after_secs,
            } => {
                let wait = submit_backoff(attempt, *retry_after_secs);
                let fault = SectionFault::TransientRateLimit(message.clone());
                self.retry_or_give_up(state, fault, wait)
            }
            RunOutcome::RateLimited(msg) => {
                let wait =
                    wait_hint(msg).unwrap_or_else(|| Duration::from_secs(30 * u64::from(attempt)));
                let fault = SectionFault::TransientRateLimit(msg.clone());
                self.retry_or_give_up(state, fault, wait)
            }
            RunOutcome::TimedOut => self.retry_or_give_up(
                state,
                SectionFault::Timeout,
                Duration::from_secs(15 * u64::from(attempt)),
            ),
            RunOutcome::RequiresAction => {
                Transition::GiveUp(SectionFault::UnsupportedCapabilityRequested)
            }
            RunOutcome::Failed(detail) | RunOutcome::PollError(detail) => {
                Transition::GiveUp(SectionFault::HardFailure(detail.clone()))
            }
        }
    }

    fn retry_or_give_up(
        &self,
        state: &RetryState,
        fault: SectionFault,
        wait: Duration,
    ) -> Transition {
        if state.attempt < self.max_attempts {
            Transition::Retry {
                reason: fault,
                wait,
            }
        } else {
            Transition::GiveUp(fault)
        }
    }
}

/// Wait before resubmitting after a rejected request: `20 * attempt` seconds,
/// or the server's `retry-after` (clamped) when that is longer.
pub fn submit_backoff(attempt: u32, retry_after_secs: Option<u64>) -> Duration {
    let base = Duration::from_secs(20 * u64::from(attempt.max(1)));
    match retry_after_secs {
        Some(secs) => base.max(Duration::from_secs(secs).clamp(MIN_WAIT_HINT, MAX_WAIT_HINT)),
        None => base,
    }
}

/// Extracts a "N second(s)" wait from a rate-limit message, clamped to sane bounds.
///
/// The phrasing belongs to the upstream service and may drift, so the value is
/// only a hint.
pub fn wait_hint(message: &str) -> Option<Duration> {
    let caps = WAIT_HINT.captures(message)?;
    let secs = caps.get(1)?.as_str().parse::<u64>().ok()?;
    Some(Duration::from_secs(secs).clamp(MIN_WAIT_HINT, MAX_WAIT_HINT))
}

/// Adds up to 25% random jitter to `base`.
pub fn with_jitter(base: Duration) -> Duration {
    if base.is_zero() {
        return base;
    }
    let factor = rand::thread_rng().gen_range(0.0..=JITTER_FRACTION);
    base + base.mul_f64(factor)
}
