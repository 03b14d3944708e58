use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::retry::{RetryPolicy, RetryState, Transition, with_jitter};
use super::run::{RunOutcome, classify};
use crate::assistant::{AssistantApi, AssistantError, CreateRunRequest, RunStatus};
use crate::error::SectionFault;

/// Final result of driving one section to a terminal state.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionResult {
    /// A run completed; its reply can be read from the thread.
    Completed { run_id: String },
    /// Retries exhausted or a non-retryable fault.
    Faulted(SectionFault),
}

/// Structured record of how a section was executed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionAudit {
    pub section: String,
    /// Run submissions attempted, including rejected ones.
    pub attempts: u32,
    pub cancellations: u32,
    /// Status changes seen while polling, in order. Each run starts its own
    /// sequence, so a status can repeat across runs.
    pub statuses: Vec<RunStatus>,
    pub fault: Option<SectionFault>,
    /// Answers in the reply that matched no open question of the section.
    pub unmatched_answers: usize,
    pub duration_ms: u64,
}

/// Submits a section's prompt as runs and polls them to completion.
pub struct RunExecutor<'a, A: AssistantApi, C: Clock> {
    api: &'a A,
    clock: &'a C,
    policy: &'a RetryPolicy,
    assistant_id: &'a str,
}

impl<'a, A: AssistantApi, C: Clock> RunExecutor<'a, A, C> {
    pub fn new(api: &'a A, clock: &'a C, policy: &'a RetryPolicy, assistant_id: &'a str) -> Self {
        Self {
            api,
            clock,
            policy,
            assistant_id,
        }
    }

    /// Runs the section on `thread_id` until a run completes or retries run out.
    ///
    /// Only a non-rate-limit error from run creation escapes as `Err`; every
    /// other fault ends in [`SectionResult::Faulted`].
    pub async fn execute(
        &self,
        thread_id: &str,
        section: &str,
    ) -> Result<(SectionResult, SectionAudit), AssistantError> {
        let started = self.clock.now();
        let mut audit = SectionAudit {
            section: section.to_string(),
            ..Default::default()
        };
        let mut state = RetryState::new(self.policy);

        let result = loop {
            state.begin_attempt(self.policy, self.clock.now());
            audit.attempts = state.attempt;

            let req = CreateRunRequest {
                assistant_id: self.assistant_id.to_string(),
            };
            let outcome = match self.api.create_run(thread_id, &req).await {
                Ok(run) => {
                    debug!(section, run_id = %run.id, attempt = state.attempt, "run submitted");
                    self.poll(thread_id, &run.id, section, &mut state, &mut audit).await
                }
                Err(e) if e.is_rate_limit() => {
                    warn!(
                        section,
                        attempt = state.attempt,
                        error = %e,
                        "run creation rate limited"
                    );
                    RunOutcome::SubmitRateLimited {
                        retry_after_secs: e.retry_after_secs(),
                        message: e.to_string(),
                    }
                }
                Err(e) => return Err(e),
            };

            match self.policy.next(&state, &outcome) {
                Transition::Extract { run_id } => break SectionResult::Completed { run_id },
                Transition::Retry { reason, wait } => {
                    let wait = with_jitter(wait);
                    log_retry(
                        section,
                        state.attempt,
                        self.policy.max_attempts,
                        &reason,
                        wait.as_secs_f64(),
                    );
                    self.clock.sleep(wait).await;
                }
                Transition::GiveUp(fault) => {
                    warn!(section, attempts = state.attempt, %fault, "giving up on section");
                    break SectionResult::Faulted(fault);
                }
            }
        };

        if let SectionResult::Faulted(fault) = &result {
            audit.fault = Some(fault.clone());
        }
        audit.duration_ms = self.clock.now().saturating_sub(started).as_millis() as u64;
        Ok((result, audit))
    }

    /// Polls one run until it is terminal or the run timeout elapses.
    async fn poll(
        &self,
        thread_id: &str,
        run_id: &str,
        section: &str,
        state: &mut RetryState,
        audit: &mut SectionAudit,
    ) -> RunOutcome {
        let mut last_status: Option<RunStatus> = None;

        loop {
            match self.api.retrieve_run(thread_id, run_id).await {
                Ok(run) => {
                    if last_status != Some(run.status) {
                        info!(section, status = %run.status, "run status");
                        last_status = Some(run.status);
                        audit.statuses.push(run.status);
                    }
                    if let Some(outcome) = classify(&run) {
                        if let Some(err) = &run.last_error {
                            warn!(
                                section,
                                status = %run.status,
                                code = %err.code,
                                message = %err.message,
                                "run ended with error"
                            );
                        }
                        return outcome;
                    }
                }
                // A throttled status query says nothing about the run itself.
                Err(e) if e.is_rate_limit() => {
                    debug!(section, error = %e, "status poll rate limited");
                }
                Err(e) => return RunOutcome::PollError(e.to_string()),
            }

            if state.timed_out(self.policy, self.clock.now()) {
                warn!(
                    section,
                    elapsed_secs = self.clock.now().saturating_sub(state.run_started).as_secs(),
                    "run timed out, cancelling"
                );
                audit.cancellations += 1;
                if let Err(e) = self.api.cancel_run(thread_id, run_id).await {
                    debug!(section, error = %e, "cancel failed, ignoring");
                }
                return RunOutcome::TimedOut;
            }

            self.clock.sleep(state.poll_interval).await;
            state.grow_poll_interval(self.policy);
        }
    }
}

fn log_retry(section: &str, attempt: u32, max: u32, reason: &SectionFault, wait_secs: f64) {
    warn!("↻ Retry {attempt}/{max} for '{section}': {reason} (waiting {wait_secs:.1}s)");
}
