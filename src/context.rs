//! Conversation Context Store: one remote thread per document.
//!
//! Messages are append-only and persisted remotely; the only thing read back
//! is the latest assistant reply of a finished run.

use tracing::info;

use crate::answer::NO_INFORMATION;
use crate::assistant::{AssistantApi, AssistantError, CreateMessageRequest, Role, ThreadMessage};

const DOCUMENT_START: &str = "----- INICIO DEL DOCUMENTO -----";
const DOCUMENT_END: &str = "----- FIN DEL DOCUMENTO -----";

/// A long-lived dialogue scoped to one document.
pub struct Conversation<'a, A: AssistantApi> {
    api: &'a A,
    id: String,
}

impl<'a, A: AssistantApi> Conversation<'a, A> {
    /// Creates a fresh remote thread.
    pub async fn create(api: &'a A) -> Result<Self, AssistantError> {
        let thread = api.create_thread().await?;
        info!(thread_id = %thread.id, "created thread");
        Ok(Self { api, id: thread.id })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn append(&self, role: Role, text: &str) -> Result<ThreadMessage, AssistantError> {
        let req = CreateMessageRequest {
            role,
            content: text.to_string(),
        };
        self.api.create_message(&self.id, &req).await
    }

    /// Up to `limit` most recent messages with the given role, newest first.
    pub async fn latest(
        &self,
        role: Role,
        limit: u32,
    ) -> Result<Vec<ThreadMessage>, AssistantError> {
        let page = self.api.list_messages(&self.id, limit).await?;
        Ok(page.data.into_iter().filter(|m| m.role == role).collect())
    }

    /// Text of the newest assistant message produced by `run_id`, if any.
    pub async fn reply_of(
        &self,
        run_id: &str,
        limit: u32,
    ) -> Result<Option<String>, AssistantError> {
        let messages = self.latest(Role::Assistant, limit).await?;
        Ok(messages
            .iter()
            .filter(|m| m.run_id.as_deref() == Some(run_id))
            .find_map(|m| m.text())
            .filter(|text| !text.trim().is_empty())
            .map(str::to_string))
    }

    /// Appends the (truncated) document as the first user message.
    ///
    /// Returns the number of characters injected.
    pub async fn inject_document(
        &self,
        doc_text: &str,
        max_chars: usize,
    ) -> Result<usize, AssistantError> {
        let safe_text = truncate_chars(doc_text, max_chars);
        let injected = safe_text.chars().count();
        info!(chars = injected, "injecting document into thread context");
        self.append(Role::User, &document_context_message(safe_text)).await?;
        Ok(injected)
    }
}

/// Longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Frames the document between delimiter markers with the no-fabrication rule.
pub fn document_context_message(doc_text: &str) -> String {
    format!(
        "Contenido del documento a analizar (no inventes información; si no encuentras algo di exactamente: \
         \"{NO_INFORMATION}\").\n\n\
         {DOCUMENT_START}\n\
         {doc_text}\n\
         {DOCUMENT_END}"
    )
}
