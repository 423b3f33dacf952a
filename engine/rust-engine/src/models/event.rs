use serde::Serialize;

use super::attempt::SubmitTrigger;
use super::timer::{TimeExpired, TimerTick};
use super::violation::ViolationWarning;

/// Everything the embedding UI can observe about a running session. The UI
/// subscribes to this stream instead of owning any attempt state.
#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SessionEvent {
    MonitoringStarted { attempt_id: String },
    Tick(TimerTick),
    TimeExpired(TimeExpired),
    ViolationWarning(ViolationWarning),
    SnapshotSaved { version: u64 },
    SaveFailed { message: String },
    Submitted {
        trigger: SubmitTrigger,
        result_id: Option<String>,
    },
    MarkedAbsent { attempt_id: String },
}

impl SessionEvent {
    pub fn to_ui_data(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            SessionEvent::MonitoringStarted { .. } => "monitoring-started",
            SessionEvent::Tick(_) => "timer-tick",
            SessionEvent::TimeExpired(_) => "time-expired",
            SessionEvent::ViolationWarning(_) => "violation-warning",
            SessionEvent::SnapshotSaved { .. } => "snapshot-saved",
            SessionEvent::SaveFailed { .. } => "save-failed",
            SessionEvent::Submitted { .. } => "submitted",
            SessionEvent::MarkedAbsent { .. } => "marked-absent",
        }
    }
}
