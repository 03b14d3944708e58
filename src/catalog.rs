//! Catálogo de perguntas agrupadas por seção.
//!
//! O catálogo embutido vem de `config/questions.toml`; um arquivo TOML com o
//! mesmo formato (`[[section]]` com `name` e `questions`) pode substituí-lo.
//! A ordem das seções e das perguntas é preservada: é ela que associa cada
//! resposta numerada de volta à sua pergunta.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AnalystError;

const BUILTIN_CATALOG: &str = include_str!("../config/questions.toml");

/// A named group of questions evaluated as one batched request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub questions: Vec<String>,
}

/// Ordered sections, loaded once and shared read-only by every document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionCatalog {
    #[serde(rename = "section", default)]
    sections: Vec<Section>,
}

impl QuestionCatalog {
    /// The catalog shipped with the binary.
    pub fn builtin() -> Result<Self, AnalystError> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, AnalystError> {
        let catalog: QuestionCatalog = toml::from_str(contents)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self, AnalystError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Uses `path` when given, the built-in catalog otherwise.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self, AnalystError> {
        match path {
            Some(p) => Self::load(p),
            None => Self::builtin(),
        }
    }

    fn validate(&self) -> Result<(), AnalystError> {
        if self.sections.is_empty() {
            return Err(AnalystError::Catalog("catalog has no sections".into()));
        }
        for section in &self.sections {
            if section.name.trim().is_empty() {
                return Err(AnalystError::Catalog("section with empty name".into()));
            }
            if section.questions.is_empty() {
                return Err(AnalystError::Catalog(format!(
                    "section '{}' has no questions",
                    section.name
                )));
            }
        }
        Ok(())
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn total_questions(&self) -> usize {
        self.sections.iter().map(|s| s.questions.len()).sum()
    }
}
