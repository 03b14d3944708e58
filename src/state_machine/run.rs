use std::fmt;

use serde::{Deserialize, Serialize};

use crate::assistant::{Run, RunStatus};

/// How one submitted run ended, as seen by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    /// `completed`: the reply of `run_id` can be extracted.
    Completed { run_id: String },
    /// Creating the run was rejected with a rate-limit error. Carries the
    /// server's `retry-after` in seconds when it sent one.
    SubmitRateLimited {
        message: String,
        retry_after_secs: Option<u64>,
    },
    /// The run ended `failed`/`cancelled`/`expired` with a rate-limit error code.
    RateLimited(String),
    /// Any other terminal fault. Carries the error message, or the status when none was given.
    Failed(String),
    /// `requires_action`: the model asked for a tool although none are enabled.
    RequiresAction,
    /// Still non-terminal when the section timeout elapsed.
    TimedOut,
    /// Polling the run status failed with a non-retryable error.
    PollError(String),
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Completed { run_id } => write!(f, "completed ({run_id})"),
            RunOutcome::SubmitRateLimited { message, .. } => {
                write!(f, "run creation rate limited: {message}")
            }
            RunOutcome::RateLimited(msg) => write!(f, "rate limited: {msg}"),
            RunOutcome::Failed(detail) => write!(f, "failed: {detail}"),
            RunOutcome::RequiresAction => write!(f, "requires_action"),
            RunOutcome::TimedOut => write!(f, "timed out"),
            RunOutcome::PollError(msg) => write!(f, "poll error: {msg}"),
        }
    }
}

/// Whether a status ends the polling loop.
pub fn is_terminal(status: RunStatus) -> bool {
    matches!(
        status,
        RunStatus::Completed
            | RunStatus::Failed
            | RunStatus::Cancelled
            | RunStatus::Expired
            | RunStatus::Incomplete
            | RunStatus::RequiresAction
    )
}

/// Maps a polled run to its outcome; `None` while the run is still pending.
///
/// `queued`, `in_progress`, `cancelling` and unrecognized statuses keep the
/// loop polling until the section timeout.
pub fn classify(run: &Run) -> Option<RunOutcome> {
    if !is_terminal(run.status) {
        return None;
    }
    match run.status {
        RunStatus::Completed => Some(RunOutcome::Completed {
            run_id: run.id.clone(),
        }),
        RunStatus::RequiresAction => Some(RunOutcome::RequiresAction),
        _ => {
            let error = run.last_error.as_ref();
            let message = error.map(|e| e.message.clone()).unwrap_or_default();
            if error.is_some_and(|e| e.code.contains("rate_limit")) {
                Some(RunOutcome::RateLimited(message))
            } else if message.is_empty() {
                Some(RunOutcome::Failed(run.status.to_string()))
            } else {
                Some(RunOutcome::Failed(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::types::RunError;

    fn run(status: RunStatus, error: Option<(&str, &str)>) -> Run {
        Run {
            id: "run_1".into(),
            thread_id: "thread_1".into(),
            status,
            last_error: error.map(|(code, message)| RunError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }

    #[test]
    fn pending_statuses_keep_polling() {
        for status in [
            RunStatus::Queued,
            RunStatus::InProgress,
            RunStatus::Cancelling,
            RunStatus::Unknown,
        ] {
            assert_eq!(classify(&run(status, None)), None);
            assert!(!is_terminal(status));
        }
    }

    #[test]
    fn completed_and_requires_action_are_terminal() {
        assert_eq!(
            classify(&run(RunStatus::Completed, None)),
            Some(RunOutcome::Completed {
                run_id: "run_1".into()
            })
        );
        assert_eq!(
            classify(&run(RunStatus::RequiresAction, None)),
            Some(RunOutcome::RequiresAction)
        );
    }

    #[test]
    fn rate_limit_code_is_recognized_on_any_fault_status() {
        for status in [RunStatus::Failed, RunStatus::Cancelled, RunStatus::Expired] {
            let outcome = classify(&run(
                status,
                Some(("rate_limit_exceeded", "Try again in 7 seconds.")),
            ));
            assert_eq!(
                outcome,
                Some(RunOutcome::RateLimited("Try again in 7 seconds.".into()))
            );
        }
    }

    #[test]
    fn other_faults_carry_message_or_status() {
        assert_eq!(
            classify(&run(RunStatus::Failed, Some(("server_error", "Something broke")))),
            Some(RunOutcome::Failed("Something broke".into()))
        );
        assert_eq!(
            classify(&run(RunStatus::Expired, None)),
            Some(RunOutcome::Failed("expired".into()))
        );
    }
}
