use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    Integer,
    Numerical,
}

/// One question of an assessment. Immutable once fetched.
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub prompt: String,
    pub question_type: QuestionType,
    /// Ordered option texts; present for the choice types.
    #[serde(default)]
    pub options: Option<Vec<String>>,
    pub correct_answer: CorrectAnswer,
    #[validate(range(exclusive_min = 0.0))]
    pub marks: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub negative_marks: f64,
    /// Shown during post-submission review.
    #[serde(default)]
    pub explanation: Option<String>,
}

/// A submitted answer. The wire form is the raw union value (string, string
/// array, or number), so the variant tag is recovered from the JSON shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Choice(String),
    MultiChoice(BTreeSet<String>),
    Numeric(f64),
}

impl Answer {
    /// Whether this answer's tag is valid for a question of the given type.
    pub fn matches(&self, question_type: QuestionType) -> bool {
        matches!(
            (self, question_type),
            (Answer::Choice(_), QuestionType::SingleChoice)
                | (Answer::MultiChoice(_), QuestionType::MultipleChoice)
                | (Answer::Numeric(_), QuestionType::Integer)
                | (Answer::Numeric(_), QuestionType::Numerical)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrectAnswer {
    Text(String),
    Options(BTreeSet<String>),
    Value(f64),
}
