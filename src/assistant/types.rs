//! Tipos de dados da API de Assistants (assistants, threads, messages, runs).
//!
//! Todas as structs derivam `Serialize` e `Deserialize` para conversão JSON
//! conforme o formato dos endpoints `/openai/assistants` e `/openai/threads`.
//! Campos opcionais que o serviço pode omitir usam `#[serde(default)]`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Um assistente hospedado, identificado por um id estável.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assistant {
    pub id: String,
    /// Nome legível; é a chave usada pelo provisionamento.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    pub model: String,
    /// Ferramentas auxiliares habilitadas (sempre vazio após a normalização).
    #[serde(default)]
    pub tools: Vec<serde_json::Value>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub top_p: Option<f32>,
}

/// Corpo de criação e de atualização de um assistente.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssistantRequest {
    pub name: String,
    pub instructions: String,
    pub model: String,
    /// Lista de ferramentas; serializada como `[]` para remover qualquer ferramenta anterior.
    pub tools: Vec<serde_json::Value>,
    pub temperature: f32,
    pub top_p: f32,
}

impl AssistantRequest {
    /// Requisição normalizada: sem ferramentas, temperatura 0.6 e `top_p` 1.
    pub fn without_tools(name: &str, instructions: &str, model: &str) -> Self {
        Self {
            name: name.to_string(),
            instructions: instructions.to_string(),
            model: model.to_string(),
            tools: Vec::new(),
            temperature: 0.6,
            top_p: 1.0,
        }
    }
}

/// Envelope paginado usado pelos endpoints de listagem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub first_id: Option<String>,
    #[serde(default)]
    pub last_id: Option<String>,
    #[serde(default)]
    pub has_more: bool,
}

/// Uma conversa (thread) remota.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
}

/// Papel do remetente de uma mensagem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Corpo de criação de uma mensagem numa thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessageRequest {
    pub role: Role,
    pub content: String,
}

/// Mensagem persistida numa thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: Vec<MessageContent>,
    /// Run que produziu a mensagem; `None` para mensagens do usuário.
    #[serde(default)]
    pub run_id: Option<String>,
}

impl ThreadMessage {
    /// Texto do primeiro bloco textual, se houver.
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            MessageContent::Text { text } => Some(text.value.as_str()),
            MessageContent::Other => None,
        })
    }
}

/// Bloco de conteúdo de uma mensagem. Apenas texto é interpretado.
///
/// O campo `type` do JSON seleciona a variante; blocos desconhecidos
/// (imagens, arquivos) caem em [`MessageContent::Other`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: TextContent },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    pub value: String,
}

/// Corpo de criação de um run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRunRequest {
    pub assistant_id: String,
}

/// Status de um run, conforme reportado pelo serviço.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
            RunStatus::Completed => "completed",
            RunStatus::Incomplete => "incomplete",
            RunStatus::Expired => "expired",
            RunStatus::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Descritor de erro de um run que terminou em falha.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunError {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Uma execução de modelo vinculada a uma thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub thread_id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub last_error: Option<RunError>,
}
