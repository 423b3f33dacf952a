use serde::{Deserialize, Serialize};
use validator::Validate;

use self::question::Question;

/// What the assessment collaborator returns for one assessment id: the time
/// budget and the (initial) question set.
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
pub struct AssessmentManifest {
    pub assessment_id: String,
    pub title: String,
    #[validate(range(min = 1))]
    pub duration_seconds: u32,
    #[validate(length(min = 1), nested)]
    pub questions: Vec<Question>,
}

pub mod attempt;
pub mod event;
pub mod question;
pub mod score;
pub mod timer;
pub mod violation;
