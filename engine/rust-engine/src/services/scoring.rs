//! Pure scoring: (questions, final answers) -> score breakdown.
//!
//! The per-question award is delegated to a `MarkingScheme` so the rule set
//! can be swapped without touching the engine. The shipped default is
//! additive-only; `PenaltyMarking` implements the advertised
//! "+marks/-negative_marks" variant for assessments that want it.

use std::collections::BTreeMap;

use crate::models::question::{Answer, CorrectAnswer, Question};
use crate::models::score::{QuestionScore, ScoreBreakdown};

/// Numeric answers match within this absolute tolerance.
const NUMERIC_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    Correct,
    Incorrect,
    Unanswered,
}

pub trait MarkingScheme: Send + Sync {
    fn award(&self, question: &Question, outcome: AnswerOutcome) -> f64;
}

/// Marking rules M1-M3:
/// M1: full marks for a correct answer
/// M2: 0 for an incorrect answer (negative_marks is NOT subtracted)
/// M3: 0 for an unanswered question
pub struct AdditiveMarking;

impl MarkingScheme for AdditiveMarking {
    fn award(&self, question: &Question, outcome: AnswerOutcome) -> f64 {
        match outcome {
            AnswerOutcome::Correct => question.marks,
            AnswerOutcome::Incorrect | AnswerOutcome::Unanswered => 0.0,
        }
    }
}

/// The negative-marking variant: full marks for correct, minus
/// `negative_marks` for incorrect, 0 for unanswered.
pub struct PenaltyMarking;

impl MarkingScheme for PenaltyMarking {
    fn award(&self, question: &Question, outcome: AnswerOutcome) -> f64 {
        match outcome {
            AnswerOutcome::Correct => question.marks,
            AnswerOutcome::Incorrect => -question.negative_marks,
            AnswerOutcome::Unanswered => 0.0,
        }
    }
}

/// Whether the answer matches the question's correct answer. A shape mismatch
/// (already rejected at the store boundary) is simply incorrect here.
pub fn is_correct(question: &Question, answer: &Answer) -> bool {
    match (&question.correct_answer, answer) {
        (CorrectAnswer::Text(expected), Answer::Choice(selected)) => expected == selected,
        (CorrectAnswer::Options(expected), Answer::MultiChoice(selected)) => expected == selected,
        (CorrectAnswer::Value(expected), Answer::Numeric(selected)) => {
            (selected - expected).abs() < NUMERIC_TOLERANCE
        }
        _ => false,
    }
}

pub fn score(
    questions: &[Question],
    answers: &BTreeMap<String, Answer>,
    scheme: &dyn MarkingScheme,
) -> ScoreBreakdown {
    let mut per_question = Vec::with_capacity(questions.len());
    let mut total_score = 0.0;
    let mut total_marks = 0.0;

    for question in questions {
        let answer = answers.get(&question.id);
        let outcome = match answer {
            Some(answer) if is_correct(question, answer) => AnswerOutcome::Correct,
            Some(_) => AnswerOutcome::Incorrect,
            None => AnswerOutcome::Unanswered,
        };

        let awarded = scheme.award(question, outcome);
        total_score += awarded;
        total_marks += question.marks;

        per_question.push(QuestionScore {
            question_id: question.id.clone(),
            awarded_marks: awarded,
            correct: outcome == AnswerOutcome::Correct,
            answered: answer.is_some(),
        });
    }

    let percentage = if total_marks > 0.0 {
        (100.0 * total_score / total_marks).round() as i32
    } else {
        0
    };

    ScoreBreakdown {
        per_question,
        score: total_score,
        total_marks,
        percentage,
    }
}
