//! Output artifacts: per-document answer files and the batch report.

use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Format, Workbook};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::answer::AnswerRecord;
use crate::error::AnalystError;
use crate::state_machine::SectionAudit;

pub const REPORT_FILE: &str = "batch_report.json";

/// Writes `<stem>_responses.json` into `dir` as pretty-printed UTF-8 JSON.
///
/// The directory is created if missing. Returns the written path.
pub fn write_responses(
    dir: &Path,
    stem: &str,
    records: &[AnswerRecord],
) -> Result<PathBuf, AnalystError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{stem}_responses.json"));
    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(&path, json)?;
    Ok(path)
}

/// Writes `<stem>_responses.xlsx` into `dir`: a header row, then one row
/// per record in catalog order.
pub fn write_spreadsheet(
    dir: &Path,
    stem: &str,
    records: &[AnswerRecord],
) -> Result<PathBuf, AnalystError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{stem}_responses.xlsx"));

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let header = Format::new().set_bold();
    for (col, title) in ["Sección", "Pregunta", "Respuesta"].into_iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, title, &header)?;
    }
    for (idx, record) in records.iter().enumerate() {
        let row = (idx + 1) as u32;
        sheet.write_string(row, 0, record.section.as_str())?;
        sheet.write_string(row, 1, record.question.as_str())?;
        sheet.write_string(row, 2, record.answer.as_str())?;
    }
    sheet.set_column_width(0, 28)?;
    sheet.set_column_width(1, 60)?;
    sheet.set_column_width(2, 90)?;

    workbook.save(&path)?;
    Ok(path)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Completed,
    Skipped,
}

/// Per-document entry of the batch report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    pub document: String,
    pub status: DocumentStatus,
    /// Why the document was skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub records: usize,
    /// Records whose answer is a "no information" sentinel.
    pub sentinel_answers: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    pub sections: Vec<SectionAudit>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl DocumentReport {
    pub fn completed(
        document: &str,
        records: &[AnswerRecord],
        output: PathBuf,
        sections: Vec<SectionAudit>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            document: document.to_string(),
            status: DocumentStatus::Completed,
            reason: None,
            records: records.len(),
            sentinel_answers: records.iter().filter(|r| r.is_sentinel()).count(),
            output: Some(output),
            sections,
            started_at,
            completed_at: now,
            duration_ms: (now - started_at).num_milliseconds(),
        }
    }

    pub fn skipped(document: &str, reason: String, started_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            document: document.to_string(),
            status: DocumentStatus::Skipped,
            reason: Some(reason),
            records: 0,
            sentinel_answers: 0,
            output: None,
            sections: Vec::new(),
            started_at,
            completed_at: now,
            duration_ms: (now - started_at).num_milliseconds(),
        }
    }
}

/// Audit trail of one batch invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub model: String,
    pub assistant_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub documents: Vec<DocumentReport>,
}

impl BatchReport {
    pub fn new(model: &str, assistant_id: &str) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            model: model.to_string(),
            assistant_id: assistant_id.to_string(),
            started_at: Utc::now(),
            completed_at: None,
            documents: Vec::new(),
        }
    }

    pub fn push(&mut self, doc: DocumentReport) {
        self.documents.push(doc);
    }

    pub fn completed(&self) -> usize {
        self.count(DocumentStatus::Completed)
    }

    pub fn skipped(&self) -> usize {
        self.count(DocumentStatus::Skipped)
    }

    fn count(&self, status: DocumentStatus) -> usize {
        self.documents.iter().filter(|d| d.status == status).count()
    }

    /// Stamps the completion time and writes the report into `dir`.
    pub fn finish(&mut self, dir: &Path) -> Result<PathBuf, AnalystError> {
        self.completed_at = Some(Utc::now());
        std::fs::create_dir_all(dir)?;
        let path = dir.join(REPORT_FILE);
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }
}
