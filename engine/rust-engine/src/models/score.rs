use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionScore {
    pub question_id: String,
    pub awarded_marks: f64,
    pub correct: bool,
    pub answered: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub per_question: Vec<QuestionScore>,
    pub score: f64,
    pub total_marks: f64,
    pub percentage: i32,
}
