use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationKind {
    TabSwitch,
    FullscreenExit,
    WindowFocusChange,
    BlockedShortcut,
}

impl ViolationKind {
    pub fn as_label(&self) -> &'static str {
        match self {
            ViolationKind::TabSwitch => "tab_switch",
            ViolationKind::FullscreenExit => "fullscreen_exit",
            ViolationKind::WindowFocusChange => "window_focus_change",
            ViolationKind::BlockedShortcut => "blocked_shortcut",
        }
    }
}

/// A detected integrity-policy breach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationEvent {
    pub kind: ViolationKind,
    pub timestamp: DateTime<Utc>,
}

/// UI affordance attached to a warning. Resolving it does not refund the
/// violation credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationAction {
    ReenterFullscreen,
}

/// The user-facing warning raised for each violation: which breach, how many
/// so far out of how many allowed, and an optional remediation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationWarning {
    pub event: ViolationEvent,
    pub violation_count: u32,
    pub max_violations: u32,
    pub remediation: Option<RemediationAction>,
}
