pub mod client;
pub mod error;
pub mod types;

pub use client::{AssistantApi, AssistantClient};
pub use error::AssistantError;
pub use types::{
    Assistant, AssistantRequest, CreateMessageRequest, CreateRunRequest, Role, Run, RunStatus,
    ThreadMessage,
};
