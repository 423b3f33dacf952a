//! In-memory answer and flag state for one attempt.
//!
//! Mutations validate that the question exists and the answer tag matches the
//! question type; an invalid mutation is rejected as a no-op, never a crash.
//! Persisting the result is the session's job, not the store's.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::models::attempt::{PaletteEntry, PaletteStatus};
use crate::models::question::{Answer, Question};

/// What happened to a requested mutation. Rejections carry enough to log,
/// nothing more; the caller treats them as no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Applied,
    UnknownQuestion,
    TypeMismatch,
}

impl MutationOutcome {
    pub fn was_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied)
    }
}

pub struct AnswerStore {
    questions: Vec<Question>,
    index_by_id: HashMap<String, usize>,
    answers: BTreeMap<String, Answer>,
    flags: BTreeSet<String>,
}

impl AnswerStore {
    pub fn new() -> Self {
        Self {
            questions: Vec::new(),
            index_by_id: HashMap::new(),
            answers: BTreeMap::new(),
            flags: BTreeSet::new(),
        }
    }

    /// Ingest a question batch (initial fetch or a later page), deduplicating
    /// by id. Returns how many questions were actually added.
    pub fn register_questions(&mut self, batch: Vec<Question>) -> usize {
        let mut added = 0;
        for question in batch {
            if self.index_by_id.contains_key(&question.id) {
                tracing::debug!("Duplicate question ignored: id={}", question.id);
                continue;
            }
            self.index_by_id
                .insert(question.id.clone(), self.questions.len());
            self.questions.push(question);
            added += 1;
        }
        added
    }

    pub fn set_answer(&mut self, question_id: &str, answer: Answer) -> MutationOutcome {
        let Some(question) = self.question(question_id) else {
            tracing::debug!("Rejected answer for unknown question: id={}", question_id);
            return MutationOutcome::UnknownQuestion;
        };
        if !answer.matches(question.question_type) {
            tracing::debug!(
                "Rejected answer with mismatched tag: question={}, type={:?}",
                question_id,
                question.question_type
            );
            return MutationOutcome::TypeMismatch;
        }

        self.answers.insert(question_id.to_string(), answer);
        MutationOutcome::Applied
    }

    pub fn clear_answer(&mut self, question_id: &str) -> MutationOutcome {
        if self.question(question_id).is_none() {
            tracing::debug!("Rejected clear for unknown question: id={}", question_id);
            return MutationOutcome::UnknownQuestion;
        }
        self.answers.remove(question_id);
        MutationOutcome::Applied
    }

    pub fn toggle_flag(&mut self, question_id: &str) -> MutationOutcome {
        if self.question(question_id).is_none() {
            tracing::debug!("Rejected flag for unknown question: id={}", question_id);
            return MutationOutcome::UnknownQuestion;
        }
        if !self.flags.remove(question_id) {
            self.flags.insert(question_id.to_string());
        }
        MutationOutcome::Applied
    }

    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.index_by_id
            .get(question_id)
            .map(|&i| &self.questions[i])
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn answers(&self) -> &BTreeMap<String, Answer> {
        &self.answers
    }

    pub fn flags(&self) -> &BTreeSet<String> {
        &self.flags
    }

    /// Per-question palette status for the navigation grid. A question counts
    /// as visited once its index is at or below the current one, or once it
    /// carries an answer or flag; marked-for-review wins over answered.
    pub fn palette(&self, current_question_index: usize) -> Vec<PaletteEntry> {
        self.questions
            .iter()
            .enumerate()
            .map(|(i, question)| {
                let flagged = self.flags.contains(&question.id);
                let answered = self.answers.contains_key(&question.id);
                let visited = i <= current_question_index || answered || flagged;

                let status = if flagged {
                    PaletteStatus::MarkedForReview
                } else if answered {
                    PaletteStatus::Answered
                } else if visited {
                    PaletteStatus::NotAnswered
                } else {
                    PaletteStatus::NotVisited
                };

                PaletteEntry {
                    question_id: question.id.clone(),
                    status,
                }
            })
            .collect()
    }
}

impl Default for AnswerStore {
    fn default() -> Self {
        Self::new()
    }
}
