use thiserror::Error;

use crate::answer::NO_INFORMATION;
pub use crate::assistant::AssistantError;

#[derive(Debug, Error)]
pub enum AnalystError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Question catalog error: {0}")]
    Catalog(String),

    #[error("No .txt documents found in {0}")]
    NoDocuments(String),

    #[error("Assistant API error: {0}")]
    Assistant(#[from] AssistantError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),
}

/// Why a section could not produce model-derived answers.
///
/// Every variant is absorbed at the section boundary and rendered as a
/// sentinel answer for each question of the section.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SectionFault {
    /// Rate limited on every allowed attempt.
    TransientRateLimit(String),
    /// The run never reached a terminal status in time, on every allowed attempt.
    Timeout,
    /// The run asked for a tool call although no tools are enabled.
    UnsupportedCapabilityRequested,
    /// Non-retryable failure: failed/cancelled/expired run or a polling error.
    HardFailure(String),
    /// The run completed but left no assistant reply on the thread.
    EmptyReply,
}

impl SectionFault {
    /// The sentinel answer recorded for every question of a faulted section.
    pub fn sentinel(&self) -> String {
        let reason = match self {
            SectionFault::TransientRateLimit(msg) if msg.is_empty() => {
                "rate_limit_exceeded".to_string()
            }
            SectionFault::TransientRateLimit(msg) => format!("rate_limit_exceeded: {msg}"),
            SectionFault::Timeout => "timeout".to_string(),
            SectionFault::UnsupportedCapabilityRequested => {
                "requires_action sin tools".to_string()
            }
            SectionFault::HardFailure(detail) => detail.clone(),
            SectionFault::EmptyReply => "sin respuesta del modelo".to_string(),
        };
        format!("{NO_INFORMATION} ({reason}).")
    }
}

impl std::fmt::Display for SectionFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SectionFault::TransientRateLimit(msg) => write!(f, "Rate limited: {msg}"),
            SectionFault::Timeout => write!(f, "Timed out"),
            SectionFault::UnsupportedCapabilityRequested => {
                write!(f, "Run requires action but no tools are enabled")
            }
            SectionFault::HardFailure(detail) => write!(f, "Run failed: {detail}"),
            SectionFault::EmptyReply => write!(f, "No assistant reply"),
        }
    }
}
