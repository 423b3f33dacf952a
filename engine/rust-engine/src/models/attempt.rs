use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::question::{Answer, Question};
use super::score::ScoreBreakdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptStatus {
    InProgress,
    Submitted,
    Absent,
}

impl AttemptStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptStatus::InProgress)
    }
}

/// The full state of one attempt, frozen at submission and handed read-only
/// to the results collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt_id: String,
    pub answers: BTreeMap<String, Answer>,
    pub flags: BTreeSet<String>,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: u32,
    pub current_question_index: usize,
    pub violation_count: u32,
    pub status: AttemptStatus,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl AttemptRecord {
    /// Remaining time is always derived from `started_at` + `duration_seconds`;
    /// it is never stored, so suspending the tab cannot stretch the clock.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> u32 {
        let elapsed = (now - self.started_at).num_seconds().max(0) as u64;
        u64::from(self.duration_seconds).saturating_sub(elapsed) as u32
    }
}

/// The persisted wire form of an attempt, one JSON document per attempt id.
/// `version` is the save-sequencing counter for the last-writer-wins
/// discipline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSnapshot {
    pub answers: BTreeMap<String, Answer>,
    pub flags: BTreeSet<String>,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: u32,
    pub current_question_index: usize,
    pub violation_count: u32,
    pub status: AttemptStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    pub version: u64,
}

/// What caused a Submitted transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitTrigger {
    User,
    TimeExpired,
    MaxViolations,
}

impl SubmitTrigger {
    pub fn as_label(&self) -> &'static str {
        match self {
            SubmitTrigger::User => "user",
            SubmitTrigger::TimeExpired => "time_expired",
            SubmitTrigger::MaxViolations => "max_violations",
        }
    }
}

#[derive(Debug)]
pub enum SubmitOutcome {
    Submitted {
        result_id: Option<String>,
        breakdown: ScoreBreakdown,
    },
    /// The attempt had already settled; first trigger wins.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PaletteStatus {
    Answered,
    NotAnswered,
    MarkedForReview,
    NotVisited,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaletteEntry {
    pub question_id: String,
    pub status: PaletteStatus,
}

/// Read-only view of a settled attempt: questions with correct answers and
/// explanations, the frozen record, and the computed breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptReview {
    pub record: AttemptRecord,
    pub questions: Vec<Question>,
    pub breakdown: ScoreBreakdown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn remaining_seconds_is_derived_and_floored_at_zero() {
        let started_at = Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap();
        let record = AttemptRecord {
            attempt_id: "a1".to_string(),
            answers: BTreeMap::new(),
            flags: BTreeSet::new(),
            started_at,
            duration_seconds: 600,
            current_question_index: 0,
            violation_count: 0,
            status: AttemptStatus::InProgress,
            submitted_at: None,
        };

        assert_eq!(record.remaining_seconds(started_at), 600);
        assert_eq!(
            record.remaining_seconds(started_at + chrono::Duration::seconds(90)),
            510
        );
        assert_eq!(
            record.remaining_seconds(started_at + chrono::Duration::seconds(601)),
            0
        );
        assert_eq!(
            record.remaining_seconds(started_at + chrono::Duration::seconds(100_000)),
            0
        );
    }
}
