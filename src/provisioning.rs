//! Idempotent assistant provisioning.

use tracing::{debug, info};

use crate::assistant::{Assistant, AssistantApi, AssistantError, AssistantRequest};

pub const ASSISTANT_NAME: &str = "DocumentAnalysisAssistant";

pub const ASSISTANT_INSTRUCTIONS: &str = "Eres un asistente experto en el análisis de documentos técnicos. \
Debes responder exclusivamente con la información contenida en el documento cargado. \
No puedes inventar, asumir ni completar respuestas por fuera del contenido. \
Si no encuentras la información necesaria en el documento, responde exactamente: \
\"No hay información en el documento\". \
Evita especulaciones y no reformules la pregunta. \
Tus respuestas deben ser claras, concretas y basadas únicamente en el texto disponible.";

/// Returns the id of the assistant called `name`, creating it if needed.
///
/// An existing assistant is always normalized: tools removed, model and
/// instructions refreshed, sampling reset. Calling this twice yields the same id.
pub async fn ensure_assistant<A: AssistantApi>(
    api: &A,
    name: &str,
    instructions: &str,
    model: &str,
) -> Result<String, AssistantError> {
    let req = AssistantRequest::without_tools(name, instructions, model);

    match find_by_name(api, name).await? {
        Some(existing) => {
            if !existing.tools.is_empty() {
                debug!(assistant_id = %existing.id, tools = existing.tools.len(), "removing tools");
            }
            let updated = api.update_assistant(&existing.id, &req).await?;
            info!(assistant_id = %updated.id, model, "using existing assistant");
            Ok(updated.id)
        }
        None => {
            let created = api.create_assistant(&req).await?;
            info!(assistant_id = %created.id, model, "created assistant");
            Ok(created.id)
        }
    }
}

/// Walks every page of the assistant listing looking for an exact name match.
async fn find_by_name<A: AssistantApi>(
    api: &A,
    name: &str,
) -> Result<Option<Assistant>, AssistantError> {
    let mut cursor: Option<String> = None;
    loop {
        let page = api.list_assistants(cursor.as_deref()).await?;
        if let Some(found) = page
            .data
            .iter()
            .find(|a| a.name.as_deref() == Some(name))
        {
            return Ok(Some(found.clone()));
        }
        match page.last_id {
            Some(last) if page.has_more => cursor = Some(last),
            _ => return Ok(None),
        }
    }
}
