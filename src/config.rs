//! Configuração do doc-analyst.
//!
//! A struct [`AnalystConfig`] é montada em camadas: defaults, depois o arquivo
//! `doc-analyst.toml` (se existir), depois variáveis de ambiente (incluindo as
//! carregadas de `.env`), e por fim flags da CLI aplicadas em `main`.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::AnalystError;
use crate::state_machine::RetryPolicy;

/// Arquivo de configuração procurado no diretório atual.
pub const DEFAULT_CONFIG_FILE: &str = "doc-analyst.toml";

/// Configuração de nível superior.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalystConfig {
    /// Chave da API do serviço de assistentes.
    pub api_key: String,

    /// Endpoint do recurso, ex.: `https://my-resource.openai.azure.com`.
    pub endpoint: String,

    pub api_version: String,

    /// Nome do deployment do modelo.
    pub model: String,

    /// Desativa a verificação TLS (proxies corporativos, certificados autoassinados).
    pub accept_invalid_certs: bool,

    /// Tempo máximo de um run, em segundos, medido a partir da submissão.
    pub per_section_timeout_sec: u64,

    pub initial_poll_interval_sec: f64,

    pub max_poll_interval_sec: f64,

    /// Caracteres do documento injetados na conversa; o resto é descartado.
    pub max_chars_context: usize,

    /// Máximo de submissões de run por seção.
    pub max_retries_rate: u32,

    pub pause_between_sections_sec: f64,

    pub cool_down_between_docs_sec: f64,

    pub input_dir: PathBuf,

    pub output_dir: PathBuf,

    /// Grava também `<stem>_responses.xlsx` ao lado do JSON.
    pub export_spreadsheet: bool,

    /// Catálogo de perguntas alternativo; sem ele usa-se o embutido.
    pub questions_file: Option<PathBuf>,

    /// Nível de log padrão quando `RUST_LOG` não está definido.
    pub log_level: String,
}

impl Default for AnalystConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: String::new(),
            api_version: "2024-05-01-preview".to_string(),
            model: "gpt-4o-2".to_string(),
            accept_invalid_certs: false,
            per_section_timeout_sec: 480,
            initial_poll_interval_sec: 1.5,
            max_poll_interval_sec: 6.0,
            max_chars_context: 80_000,
            max_retries_rate: 3,
            pause_between_sections_sec: 2.0,
            cool_down_between_docs_sec: 5.0,
            input_dir: PathBuf::from("data/input"),
            output_dir: PathBuf::from("data/output"),
            export_spreadsheet: false,
            questions_file: None,
            log_level: "info".to_string(),
        }
    }
}

impl AnalystConfig {
    /// Carrega a configuração de `path`, ou de `doc-analyst.toml` se nenhum
    /// caminho for dado. Um caminho explícito inexistente é erro; o arquivo
    /// padrão ausente resulta nos defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, AnalystError> {
        let path = match path {
            Some(p) if !p.exists() => {
                return Err(AnalystError::Config(format!(
                    "config file not found: {}",
                    p.display()
                )));
            }
            Some(p) => p,
            None => Path::new(DEFAULT_CONFIG_FILE),
        };

        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(toml::from_str::<AnalystConfig>(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Aplica variáveis de ambiente sobre os valores atuais.
    ///
    /// `lookup` é normalmente `|k| std::env::var(k).ok()`. Valores vazios são
    /// ignorados; valores que não fazem parse são erro de configuração.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), AnalystError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("AZURE_OPENAI_API_KEY") {
            self.api_key = v;
        }
        if let Some(v) = var("AZURE_OPENAI_ENDPOINT") {
            self.endpoint = v;
        }
        if let Some(v) = var("AZURE_OPENAI_API_VERSION") {
            self.api_version = v;
        }
        if let Some(v) = var("AZURE_OPENAI_MODEL") {
            self.model = v;
        }
        if let Some(v) = var("AZURE_OPENAI_ACCEPT_INVALID_CERTS") {
            self.accept_invalid_certs = parse_var("AZURE_OPENAI_ACCEPT_INVALID_CERTS", &v)?;
        }
        if let Some(v) = var("PER_SECTION_TIMEOUT_SEC") {
            self.per_section_timeout_sec = parse_var("PER_SECTION_TIMEOUT_SEC", &v)?;
        }
        if let Some(v) = var("INITIAL_POLL_INTERVAL_SEC") {
            self.initial_poll_interval_sec = parse_var("INITIAL_POLL_INTERVAL_SEC", &v)?;
        }
        if let Some(v) = var("MAX_POLL_INTERVAL_SEC") {
            self.max_poll_interval_sec = parse_var("MAX_POLL_INTERVAL_SEC", &v)?;
        }
        if let Some(v) = var("MAX_CHARS_CONTEXT") {
            self.max_chars_context = parse_var("MAX_CHARS_CONTEXT", &v)?;
        }
        if let Some(v) = var("MAX_RETRIES_RATE") {
            self.max_retries_rate = parse_var("MAX_RETRIES_RATE", &v)?;
        }
        if let Some(v) = var("PAUSE_BETWEEN_SECTIONS_SEC") {
            self.pause_between_sections_sec = parse_var("PAUSE_BETWEEN_SECTIONS_SEC", &v)?;
        }
        if let Some(v) = var("COOL_DOWN_BETWEEN_DOCS_SEC") {
            self.cool_down_between_docs_sec = parse_var("COOL_DOWN_BETWEEN_DOCS_SEC", &v)?;
        }
        if let Some(v) = var("INPUT_DIR") {
            self.input_dir = PathBuf::from(v);
        }
        if let Some(v) = var("OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = var("EXPORT_SPREADSHEET") {
            self.export_spreadsheet = parse_var("EXPORT_SPREADSHEET", &v)?;
        }
        if let Some(v) = var("QUESTIONS_FILE") {
            self.questions_file = Some(PathBuf::from(v));
        }
        if let Some(v) = var("LOG_LEVEL") {
            self.log_level = v;
        }
        Ok(())
    }

    /// Verifica credenciais e limites antes de qualquer chamada remota.
    pub fn validate(&self) -> Result<(), AnalystError> {
        if self.api_key.trim().is_empty() {
            return Err(AnalystError::Config(
                "missing API key (set AZURE_OPENAI_API_KEY)".into(),
            ));
        }
        if self.endpoint.trim().is_empty() {
            return Err(AnalystError::Config(
                "missing endpoint (set AZURE_OPENAI_ENDPOINT)".into(),
            ));
        }
        if self.max_retries_rate == 0 {
            return Err(AnalystError::Config("max_retries_rate must be at least 1".into()));
        }
        if self.per_section_timeout_sec == 0 {
            return Err(AnalystError::Config("per_section_timeout_sec must be positive".into()));
        }
        if self.max_chars_context == 0 {
            return Err(AnalystError::Config("max_chars_context must be positive".into()));
        }
        let initial = seconds("initial_poll_interval_sec", self.initial_poll_interval_sec)?;
        let max = seconds("max_poll_interval_sec", self.max_poll_interval_sec)?;
        if initial.is_zero() {
            return Err(AnalystError::Config(
                "initial_poll_interval_sec must be positive".into(),
            ));
        }
        if max < initial {
            return Err(AnalystError::Config(
                "max_poll_interval_sec must not be below initial_poll_interval_sec".into(),
            ));
        }
        seconds("pause_between_sections_sec", self.pause_between_sections_sec)?;
        seconds("cool_down_between_docs_sec", self.cool_down_between_docs_sec)?;
        Ok(())
    }

    /// Política de retry e polling derivada da configuração.
    pub fn retry_policy(&self) -> Result<RetryPolicy, AnalystError> {
        Ok(RetryPolicy {
            max_attempts: self.max_retries_rate,
            initial_poll_interval: seconds(
                "initial_poll_interval_sec",
                self.initial_poll_interval_sec,
            )?,
            max_poll_interval: seconds("max_poll_interval_sec", self.max_poll_interval_sec)?,
            run_timeout: Duration::from_secs(self.per_section_timeout_sec),
        })
    }

    pub fn pause_between_sections(&self) -> Result<Duration, AnalystError> {
        seconds("pause_between_sections_sec", self.pause_between_sections_sec)
    }

    pub fn cool_down_between_docs(&self) -> Result<Duration, AnalystError> {
        seconds("cool_down_between_docs_sec", self.cool_down_between_docs_sec)
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, AnalystError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| AnalystError::Config(format!("invalid value for {key}: {value:?}")))
}

// Segundos fracionários não negativos e finitos.
fn seconds(field: &str, value: f64) -> Result<Duration, AnalystError> {
    Duration::try_from_secs_f64(value).map_err(|_| {
        AnalystError::Config(format!("{field} must be a non-negative number of seconds"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn valid() -> AnalystConfig {
        AnalystConfig {
            api_key: "key".into(),
            endpoint: "https://example.openai.azure.com".into(),
            ..Default::default()
        }
    }

    #[test]
    fn default_config_values() {
        let config = AnalystConfig::default();
        assert_eq!(config.model, "gpt-4o-2");
        assert_eq!(config.per_section_timeout_sec, 480);
        assert_eq!(config.max_chars_context, 80_000);
        assert_eq!(config.max_retries_rate, 3);
        assert_eq!(config.input_dir, PathBuf::from("data/input"));
        assert!(config.api_key.is_empty());
        assert!(!config.accept_invalid_certs);
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            model = "gpt-4o-mini"
            max_retries_rate = 5
            pause_between_sections_sec = 0.5
        "#;
        let config: AnalystConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_retries_rate, 5);
        assert_eq!(config.pause_between_sections_sec, 0.5);
        assert_eq!(config.api_version, "2024-05-01-preview");
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "output_dir = \"out\"\n").unwrap();

        let config = AnalystConfig::load(Some(&path)).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn load_missing_explicit_file_is_error() {
        let err =
            AnalystConfig::load(Some(Path::new("/nonexistent/doc-analyst.toml"))).unwrap_err();
        assert!(matches!(err, AnalystError::Config(_)));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = AnalystConfig::default();
        config
            .apply_env(env(&[
                ("AZURE_OPENAI_API_KEY", "secret"),
                ("AZURE_OPENAI_ENDPOINT", "https://x.openai.azure.com"),
                ("MAX_RETRIES_RATE", "5"),
                ("INITIAL_POLL_INTERVAL_SEC", "0.5"),
                ("AZURE_OPENAI_ACCEPT_INVALID_CERTS", "true"),
                ("QUESTIONS_FILE", "q.toml"),
                ("EXPORT_SPREADSHEET", "true"),
                ("AZURE_OPENAI_MODEL", ""),
            ]))
            .unwrap();

        assert_eq!(config.api_key, "secret");
        assert_eq!(config.max_retries_rate, 5);
        assert_eq!(config.initial_poll_interval_sec, 0.5);
        assert!(config.accept_invalid_certs);
        assert_eq!(config.questions_file, Some(PathBuf::from("q.toml")));
        assert!(config.export_spreadsheet);
        // Empty values do not clobber.
        assert_eq!(config.model, "gpt-4o-2");
    }

    #[test]
    fn unparsable_env_value_is_error() {
        let mut config = AnalystConfig::default();
        let err = config
            .apply_env(env(&[("MAX_RETRIES_RATE", "three")]))
            .unwrap_err();
        assert!(err.to_string().contains("MAX_RETRIES_RATE"));
    }

    #[test]
    fn validate_requires_credentials() {
        assert!(AnalystConfig::default().validate().is_err());
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn validate_rejects_inverted_poll_intervals() {
        let config = AnalystConfig {
            initial_poll_interval_sec: 10.0,
            max_poll_interval_sec: 2.0,
            ..valid()
        };
        assert!(config.validate().is_err());

        let config = AnalystConfig {
            cool_down_between_docs_sec: -1.0,
            ..valid()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn retry_policy_mirrors_config() {
        let policy = valid().retry_policy().unwrap();
        assert_eq!(policy, RetryPolicy::default());
    }
}
