use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::answer::{AnswerRecord, NO_INFORMATION};
use crate::assistant::{AssistantApi, AssistantError, Role};
use crate::catalog::{QuestionCatalog, Section};
use crate::context::Conversation;
use crate::documents;
use crate::error::{AnalystError, SectionFault};
use crate::output::{self, BatchReport, DocumentReport};
use crate::partition::partition_section;
use crate::state_machine::{
    Clock, RetryPolicy, RunExecutor, SectionAudit, SectionResult, submit_backoff, with_jitter,
};

/// Assistant messages inspected when looking for a run's reply.
const REPLY_WINDOW: u32 = 10;

/// Pacing and context limits for a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSettings {
    pub policy: RetryPolicy,
    pub max_chars_context: usize,
    pub pause_between_sections: Duration,
    pub cool_down_between_docs: Duration,
    /// Also write each document's answers as a spreadsheet.
    pub export_spreadsheet: bool,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            policy: RetryPolicy::default(),
            max_chars_context: 80_000,
            pause_between_sections: Duration::from_secs(2),
            cool_down_between_docs: Duration::from_secs(5),
            export_spreadsheet: false,
        }
    }
}

/// Everything produced for one document.
#[derive(Debug, Clone)]
pub struct DocumentAnalysis {
    pub thread_id: String,
    pub injected_chars: usize,
    pub records: Vec<AnswerRecord>,
    pub sections: Vec<SectionAudit>,
}

/// The user message asking every question of a section, numbered from 1.
pub fn build_section_prompt(section: &Section) -> String {
    let mut lines = vec![
        format!(
            "Responde las siguientes preguntas de la sección '{}' de forma numerada (1., 2., ...).",
            section.name
        ),
        "Usa exclusivamente el documento que te compartí en este hilo como fuente.".to_string(),
        format!(
            "Si alguna pregunta no tiene evidencia en el documento, responde exactamente: \"{NO_INFORMATION}\"."
        ),
        String::new(),
    ];
    lines.extend(
        section
            .questions
            .iter()
            .enumerate()
            .map(|(i, q)| format!("{}. {q}", i + 1)),
    );
    lines.join("\n")
}

/// Sentinel records for every question of a section that could not be answered.
fn fault_records(section: &Section, fault: &SectionFault) -> Vec<AnswerRecord> {
    let answer = fault.sentinel();
    section
        .questions
        .iter()
        .map(|q| AnswerRecord::new(section.name.as_str(), q.as_str(), answer.as_str()))
        .collect()
}

/// Drives documents through the section-batched question flow.
pub struct Orchestrator<'a, A: AssistantApi, C: Clock> {
    api: &'a A,
    clock: &'a C,
    catalog: &'a QuestionCatalog,
    assistant_id: String,
    settings: BatchSettings,
}

impl<'a, A: AssistantApi, C: Clock> Orchestrator<'a, A, C> {
    pub fn new(
        api: &'a A,
        clock: &'a C,
        catalog: &'a QuestionCatalog,
        assistant_id: impl Into<String>,
        settings: BatchSettings,
    ) -> Self {
        Self {
            api,
            clock,
            catalog,
            assistant_id: assistant_id.into(),
            settings,
        }
    }

    /// Asks every catalog section against `doc_text` in a fresh conversation.
    ///
    /// Section faults become sentinel answers, and so does a section prompt
    /// that stays rate limited. Any other failure to create or append to the
    /// conversation, or to submit a run, aborts the document.
    pub async fn ask_questions(&self, doc_text: &str) -> Result<DocumentAnalysis, AssistantError> {
        let conversation = Conversation::create(self.api).await?;
        let injected_chars = conversation
            .inject_document(doc_text, self.settings.max_chars_context)
            .await?;

        let executor = RunExecutor::new(
            self.api,
            self.clock,
            &self.settings.policy,
            &self.assistant_id,
        );
        let sections = self.catalog.sections();
        let mut records = Vec::with_capacity(self.catalog.total_questions());
        let mut audits = Vec::with_capacity(sections.len());

        for (idx, section) in sections.iter().enumerate() {
            info!(
                section = %section.name,
                questions = section.questions.len(),
                "processing section"
            );
            let (section_records, audit) =
                match self.append_section_prompt(&conversation, section).await? {
                    Some((fault, attempts)) => (
                        fault_records(section, &fault),
                        SectionAudit {
                            section: section.name.clone(),
                            attempts,
                            fault: Some(fault),
                            ..Default::default()
                        },
                    ),
                    None => self.run_section(&executor, &conversation, section).await?,
                };
            records.extend(section_records);
            audits.push(audit);

            if idx + 1 < sections.len() && !self.settings.pause_between_sections.is_zero() {
                self.clock.sleep(self.settings.pause_between_sections).await;
            }
        }

        Ok(DocumentAnalysis {
            thread_id: conversation.id().to_string(),
            injected_chars,
            records,
            sections: audits,
        })
    }

    /// Appends the section prompt, backing off on rate limits the same way a
    /// rejected run submission does.
    ///
    /// Returns the fault and the attempts made once `max_attempts` appends
    /// were all rate limited.
    async fn append_section_prompt(
        &self,
        conversation: &Conversation<'_, A>,
        section: &Section,
    ) -> Result<Option<(SectionFault, u32)>, AssistantError> {
        let prompt = build_section_prompt(section);
        let max_attempts = self.settings.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match conversation.append(Role::User, &prompt).await {
                Ok(_) => return Ok(None),
                Err(e) if e.is_rate_limit() => e,
                Err(e) => return Err(e),
            };
            if attempt >= max_attempts {
                warn!(
                    section = %section.name,
                    attempts = attempt,
                    error = %err,
                    "giving up on section prompt"
                );
                return Ok(Some((SectionFault::TransientRateLimit(err.to_string()), attempt)));
            }
            let wait = with_jitter(submit_backoff(attempt, err.retry_after_secs()));
            warn!(
                "↻ Retry {attempt}/{max_attempts} for '{}' prompt: {err} (waiting {:.1}s)",
                section.name,
                wait.as_secs_f64()
            );
            self.clock.sleep(wait).await;
        }
    }

    /// Runs a section whose prompt is already on the thread and partitions the reply.
    async fn run_section(
        &self,
        executor: &RunExecutor<'_, A, C>,
        conversation: &Conversation<'_, A>,
        section: &Section,
    ) -> Result<(Vec<AnswerRecord>, SectionAudit), AssistantError> {
        let (result, mut audit) = executor.execute(conversation.id(), &section.name).await?;
        let section_records = match result {
            SectionResult::Completed { run_id } => {
                match conversation.reply_of(&run_id, REPLY_WINDOW).await {
                    Ok(Some(reply)) => {
                        let answers = partition_section(&section.name, &reply, &section.questions);
                        for extra in &answers.unmatched {
                            warn!(
                                section = %section.name,
                                question = %extra.question,
                                answer = %extra.answer,
                                "answer matched no open question"
                            );
                        }
                        audit.unmatched_answers = answers.unmatched.len();
                        answers.records
                    }
                    Ok(None) => {
                        warn!(section = %section.name, %run_id, "run completed without a reply");
                        audit.fault = Some(SectionFault::EmptyReply);
                        fault_records(section, &SectionFault::EmptyReply)
                    }
                    Err(e) => {
                        let fault = SectionFault::HardFailure(e.to_string());
                        error!(section = %section.name, error = %e, "could not read reply");
                        let fallback = fault_records(section, &fault);
                        audit.fault = Some(fault);
                        fallback
                    }
                }
            }
            SectionResult::Faulted(fault) => fault_records(section, &fault),
        };
        Ok((section_records, audit))
    }

    /// Reads, analyzes and saves one document. Never fails: problems are
    /// logged and reported as a skipped document.
    pub async fn process_document(&self, path: &Path, output_dir: &Path) -> DocumentReport {
        let started_at = Utc::now();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let outcome: Result<(PathBuf, DocumentAnalysis), AnalystError> = async {
            let text = documents::read_document(path)?;
            let analysis = self.ask_questions(&text).await?;
            let stem = documents::stem(path);
            let written = output::write_responses(output_dir, &stem, &analysis.records)?;
            if self.settings.export_spreadsheet {
                // The JSON file is the primary artifact; a failed workbook only warns.
                match output::write_spreadsheet(output_dir, &stem, &analysis.records) {
                    Ok(sheet) => info!(spreadsheet = %sheet.display(), "spreadsheet saved"),
                    Err(e) => warn!(document = %stem, error = %e, "could not write spreadsheet"),
                }
            }
            Ok((written, analysis))
        }
        .await;

        match outcome {
            Ok((written, analysis)) => {
                info!(
                    document = %name,
                    thread_id = %analysis.thread_id,
                    injected_chars = analysis.injected_chars,
                    records = analysis.records.len(),
                    output = %written.display(),
                    "responses saved"
                );
                DocumentReport::completed(
                    &name,
                    &analysis.records,
                    written,
                    analysis.sections,
                    started_at,
                )
            }
            Err(e) => {
                error!(document = %name, error = %e, "skipping document");
                DocumentReport::skipped(&name, e.to_string(), started_at)
            }
        }
    }

    /// Processes `documents` in order, cooling down between them.
    ///
    /// `on_done` sees each document's report as soon as it is ready.
    pub async fn run_batch(
        &self,
        documents: &[PathBuf],
        output_dir: &Path,
        report: &mut BatchReport,
        mut on_done: impl FnMut(usize, &DocumentReport),
    ) {
        let total = documents.len();
        for (idx, path) in documents.iter().enumerate() {
            info!("[{}/{}] Processing: {}", idx + 1, total, path.display());
            let doc_report = self.process_document(path, output_dir).await;
            on_done(idx, &doc_report);
            report.push(doc_report);

            let cool_down = self.settings.cool_down_between_docs;
            if idx + 1 < total && !cool_down.is_zero() {
                info!("Cooling down for {:.1}s to avoid rate limits", cool_down.as_secs_f64());
                self.clock.sleep(cool_down).await;
            }
        }
    }
}
