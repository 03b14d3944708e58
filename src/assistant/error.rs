//! Tipos de erro para o cliente da API de Assistants.
//!
//! Define [`AssistantError`] com variantes para rate limiting, erros da API
//! e erros de rede. Usa `thiserror` para derivar `Display` e `Error`
//! automaticamente a partir dos atributos `#[error(...)]`.

use thiserror::Error;

/// Erros que podem ocorrer ao interagir com a API de Assistants.
#[derive(Debug, Error)]
pub enum AssistantError {
    /// O servidor retornou HTTP 429 (rate limit).
    /// `retry_after_secs` vem do cabeçalho `retry-after`, quando presente.
    #[error("rate limited: {message}")]
    RateLimited {
        retry_after_secs: Option<u64>,
        message: String,
    },

    /// Erro retornado pela API (ex.: 401 chave inválida, 500 erro interno).
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Falha de rede subjacente (DNS, conexão recusada, timeout, corpo inválido).
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

impl AssistantError {
    /// Indica se o erro tem "sabor" de rate limit e pode ser retentado.
    ///
    /// Alguns gateways devolvem o limite como corpo de erro genérico, então a
    /// mensagem também é inspecionada.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            AssistantError::RateLimited { .. } => true,
            AssistantError::ApiError { status, message } => {
                *status == 429 || message.contains("rate_limit")
            }
            AssistantError::NetworkError(_) => false,
        }
    }

    /// Espera sugerida pelo servidor no cabeçalho `retry-after`, se houver.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            AssistantError::RateLimited {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_display() {
        let err = AssistantError::RateLimited {
            retry_after_secs: Some(5),
            message: "slow down".into(),
        };
        assert_eq!(err.to_string(), "rate limited: slow down");
        assert_eq!(err.retry_after_secs(), Some(5));
    }

    #[test]
    fn api_error_display() {
        let err = AssistantError::ApiError {
            status: 401,
            message: "Invalid API key".into(),
        };
        assert_eq!(err.to_string(), "API error (status 401): Invalid API key");
    }

    #[test]
    fn rate_limit_classification() {
        let limited = AssistantError::RateLimited {
            retry_after_secs: None,
            message: String::new(),
        };
        assert!(limited.is_rate_limit());

        let body = AssistantError::ApiError {
            status: 400,
            message: r#"{"error":{"code":"rate_limit_exceeded"}}"#.into(),
        };
        assert!(body.is_rate_limit());

        let hard = AssistantError::ApiError {
            status: 500,
            message: "internal".into(),
        };
        assert!(!hard.is_rate_limit());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AssistantError>();
    }
}
