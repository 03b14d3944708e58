//! Splits a free-text, numbered model reply back into per-question answers.
//!
//! Partitioning is total: malformed numbering never fails, it only yields
//! placeholder question labels or sentinel answers.

use std::sync::LazyLock;

use regex::Regex;

use crate::answer::{AnswerRecord, NO_INFORMATION};

/// Label used when the reply numbers an answer beyond the section's questions.
pub const QUESTION_NOT_FOUND: &str = "[Pregunta no encontrada]";

/// Label used when the numbering marker cannot be read as an index.
pub const INDEX_ERROR: &str = "[Error al procesar pregunta]";

// A line starting with an integer and a period, e.g. "  3. ".
static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(\d+)\.\s*").expect("valid marker regex"));

/// An answer with the zero-based question position it was matched to, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberedAnswer {
    pub position: Option<usize>,
    pub record: AnswerRecord,
}

/// Recovers `(question, answer)` records from a numbered reply.
///
/// One answer per numbering marker, in reply order. A reply with no markers
/// at all is assigned whole to the first question, and every other question
/// gets the sentinel answer.
pub fn split_numbered_response(
    section: &str,
    reply: &str,
    questions: &[String],
) -> Vec<NumberedAnswer> {
    let markers: Vec<(usize, usize, &str)> = MARKER
        .captures_iter(reply)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let index = caps.get(1)?;
            Some((whole.start(), whole.end(), index.as_str()))
        })
        .collect();

    if markers.is_empty() {
        return questions
            .iter()
            .enumerate()
            .map(|(i, q)| {
                let answer = if i == 0 { reply.trim() } else { NO_INFORMATION };
                NumberedAnswer {
                    position: Some(i),
                    record: AnswerRecord::new(section, q.as_str(), answer),
                }
            })
            .collect();
    }

    markers
        .iter()
        .enumerate()
        .map(|(i, &(_, body_start, index))| {
            let body_end = markers.get(i + 1).map_or(reply.len(), |m| m.0);
            let answer = reply[body_start..body_end].trim();
            let (position, question) = match index.parse::<usize>() {
                Ok(n) if (1..=questions.len()).contains(&n) => {
                    (Some(n - 1), questions[n - 1].as_str())
                }
                Ok(_) => (None, QUESTION_NOT_FOUND),
                Err(_) => (None, INDEX_ERROR),
            };
            NumberedAnswer {
                position,
                record: AnswerRecord::new(section, question, answer),
            }
        })
        .collect()
}

/// A section's answers lined up with its questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionAnswers {
    /// Exactly one record per question, in catalog order.
    pub records: Vec<AnswerRecord>,
    /// Placeholder-labelled or duplicate answers that matched no open question.
    pub unmatched: Vec<AnswerRecord>,
}

/// Partitions a reply and lines the result up with the section's questions.
///
/// The first answer for a question wins and unanswered questions get the
/// sentinel; everything else lands in [`SectionAnswers::unmatched`].
pub fn partition_section(section: &str, reply: &str, questions: &[String]) -> SectionAnswers {
    let mut slots: Vec<Option<AnswerRecord>> = vec![None; questions.len()];
    let mut unmatched = Vec::new();

    for p in split_numbered_response(section, reply, questions) {
        match p.position {
            Some(i) if slots[i].is_none() => slots[i] = Some(p.record),
            _ => unmatched.push(p.record),
        }
    }

    let records = slots
        .into_iter()
        .zip(questions)
        .map(|(slot, q)| slot.unwrap_or_else(|| AnswerRecord::no_information(section, q.as_str())))
        .collect();
    SectionAnswers { records, unmatched }
}
