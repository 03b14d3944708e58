//! Run lifecycle: submission, polling, retry and backoff for one section.

mod clock;
mod executor;
mod retry;
mod run;

#[cfg(test)]
pub use clock::FakeClock;
pub use clock::{Clock, TokioClock};
pub use executor::{RunExecutor, SectionAudit, SectionResult};
pub use retry::{RetryPolicy, submit_backoff, with_jitter};
