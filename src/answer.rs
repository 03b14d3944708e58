use serde::{Deserialize, Serialize};

/// Answer recorded when the document holds no information for a question.
pub const NO_INFORMATION: &str = "No hay información en el documento";

/// One answered question of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub section: String,
    pub question: String,
    pub answer: String,
}

impl AnswerRecord {
    pub fn new(
        section: impl Into<String>,
        question: impl Into<String>,
        answer: impl Into<String>,
    ) -> Self {
        Self {
            section: section.into(),
            question: question.into(),
            answer: answer.into(),
        }
    }

    /// Record carrying the bare sentinel answer.
    pub fn no_information(section: impl Into<String>, question: impl Into<String>) -> Self {
        Self::new(section, question, NO_INFORMATION)
    }

    /// Whether the answer is the sentinel, with or without an annotated reason.
    pub fn is_sentinel(&self) -> bool {
        self.answer.starts_with(NO_INFORMATION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_plain_field_names() {
        let record = AnswerRecord::new("DIAGNÓSTICO", "¿Hay árbol de problemas?", "Sí");
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"section":"DIAGNÓSTICO","question":"¿Hay árbol de problemas?","answer":"Sí"}"#
        );
    }

    #[test]
    fn sentinel_detection_includes_annotated_reasons() {
        assert!(AnswerRecord::no_information("S", "Q").is_sentinel());
        let record = AnswerRecord::new("S", "Q", "No hay información en el documento (timeout).");
        assert!(record.is_sentinel());
        assert!(!AnswerRecord::new("S", "Q", "Bogotá").is_sentinel());
    }
}
