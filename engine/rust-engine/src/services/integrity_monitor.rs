//! Violation classification and escalation.
//!
//! The monitor is armed while the session is in progress (after monitoring
//! consent) and disarmed the moment it settles; signals seen while disarmed
//! are ignored, so there is no double counting and no double submit. The
//! force-submit check is a single post-increment equality against
//! `max_violations`, latched to fire at most once.

use chrono::{DateTime, Utc};

use crate::metrics::INTEGRITY_VIOLATIONS_TOTAL;
use crate::models::violation::{
    RemediationAction, ViolationEvent, ViolationKind, ViolationWarning,
};
use crate::signals::{EnvironmentSignal, SignalEvent};

/// What the session should do with an observed signal.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorVerdict {
    /// Non-qualifying signal, disarmed monitor, or kill-switch: nothing to do.
    Ignored,
    /// Qualifying violation below the limit: warn the user.
    Warning(ViolationWarning),
    /// The violation limit was reached: warn, then force-submit. Raised at
    /// most once per attempt.
    ForceSubmit(ViolationWarning),
}

pub struct IntegrityMonitor {
    max_violations: u32,
    violation_count: u32,
    armed: bool,
    force_submit_fired: bool,
}

impl IntegrityMonitor {
    pub fn new(max_violations: u32) -> Self {
        Self {
            max_violations,
            violation_count: 0,
            armed: false,
            force_submit_fired: false,
        }
    }

    /// Rebuild the monitor from a restored snapshot. A count already at the
    /// limit keeps the latch closed so restore can never re-fire the submit.
    pub fn restore(max_violations: u32, violation_count: u32) -> Self {
        Self {
            max_violations,
            violation_count,
            armed: false,
            force_submit_fired: violation_count >= max_violations,
        }
    }

    pub fn arm(&mut self) {
        self.armed = true;
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }

    pub fn violation_count(&self) -> u32 {
        self.violation_count
    }

    pub fn max_violations(&self) -> u32 {
        self.max_violations
    }

    pub fn observe(&mut self, event: &SignalEvent, now: DateTime<Utc>) -> MonitorVerdict {
        if !self.armed || self.force_submit_fired {
            return MonitorVerdict::Ignored;
        }

        let signal = match event {
            SignalEvent::Signal(signal) => signal,
            SignalEvent::Fault {
                capability,
                message,
            } => {
                // Source errors never count as violations.
                tracing::warn!(
                    "Signal source fault: capability={:?}, message={}",
                    capability,
                    message
                );
                return MonitorVerdict::Ignored;
            }
        };

        let Some((kind, remediation)) = Self::classify(signal) else {
            return MonitorVerdict::Ignored;
        };

        if Self::monitor_disabled() {
            tracing::debug!(
                "Monitoring disabled (MONITOR_DISABLED=1); skipping violation kind={}",
                kind.as_label()
            );
            return MonitorVerdict::Ignored;
        }

        self.violation_count += 1;
        INTEGRITY_VIOLATIONS_TOTAL
            .with_label_values(&[kind.as_label()])
            .inc();

        tracing::warn!(
            "Integrity violation: kind={}, count={}/{}",
            kind.as_label(),
            self.violation_count,
            self.max_violations
        );

        let warning = ViolationWarning {
            event: ViolationEvent {
                kind,
                timestamp: now,
            },
            violation_count: self.violation_count,
            max_violations: self.max_violations,
            remediation,
        };

        // Single explicit equality, checked after the increment.
        if self.violation_count == self.max_violations {
            self.force_submit_fired = true;
            MonitorVerdict::ForceSubmit(warning)
        } else {
            MonitorVerdict::Warning(warning)
        }
    }

    /// Map an environment signal to a violation kind. Fullscreen exits carry
    /// the re-enter affordance; only the detection consumed the credit, so
    /// resolving it is purely a UI concern. Context-menu attempts are
    /// suppressed but never counted.
    fn classify(
        signal: &EnvironmentSignal,
    ) -> Option<(ViolationKind, Option<RemediationAction>)> {
        match signal {
            EnvironmentSignal::TabHidden => Some((ViolationKind::TabSwitch, None)),
            EnvironmentSignal::FullscreenExited => Some((
                ViolationKind::FullscreenExit,
                Some(RemediationAction::ReenterFullscreen),
            )),
            EnvironmentSignal::WindowBlurred => Some((ViolationKind::WindowFocusChange, None)),
            EnvironmentSignal::ShortcutBlocked { combo } => {
                tracing::debug!("Blocked shortcut attempt: combo={}", combo);
                Some((ViolationKind::BlockedShortcut, None))
            }
            EnvironmentSignal::ContextMenuOpened => {
                tracing::debug!("Context menu attempt suppressed");
                None
            }
        }
    }

    /// Helper to check whether monitoring is disabled via env var
    fn monitor_disabled() -> bool {
        std::env::var("MONITOR_DISABLED").unwrap_or_else(|_| "0".to_string()) == "1"
    }
}
