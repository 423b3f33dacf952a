//! The attempt state machine.
//!
//! One session owns all mutable state of one attempt: the answer store, the
//! integrity monitor, the derived timer, and the persistence versioning. The
//! embedding UI issues intents and subscribes to `SessionEvent`s; the Runner
//! pumps clock ticks and environment signals in. Nothing else mutates the
//! record.
//!
//! Phases: ConsentPending -> InProgress -> {Submitted, Absent}. The consent
//! gate blocks Clock/Monitor start; terminal phases are read-only and every
//! submission trigger after the first is a no-op.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use validator::Validate;

use crate::clock::TimeSource;
use crate::metrics::{
    ATTEMPTS_ACTIVE, ATTEMPTS_TOTAL, FORCE_SUBMITS_TOTAL, SNAPSHOT_SAVES_TOTAL,
};
use crate::models::attempt::{
    AttemptRecord, AttemptReview, AttemptSnapshot, AttemptStatus, PaletteEntry, SubmitOutcome,
    SubmitTrigger,
};
use crate::models::event::SessionEvent;
use crate::models::question::{Answer, Question};
use crate::models::timer::{TimeExpired, TimerTick};
use crate::persistence::PersistenceGateway;
use crate::services::answer_store::AnswerStore;
use crate::services::assessment_client::{AssessmentSource, ResultsSink};
use crate::services::integrity_monitor::{IntegrityMonitor, MonitorVerdict};
use crate::services::scoring::{score, MarkingScheme};
use crate::services::EngineState;
use crate::signals::SignalEvent;
use crate::utils::retry::{retry_with_backoff, BackoffPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    ConsentPending,
    InProgress,
    Submitted,
    Absent,
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Submitted | SessionPhase::Absent)
    }
}

#[derive(Debug, Clone, Copy)]
enum SaveTrigger {
    WriteThrough,
    Autosave,
    Retry,
    Final,
}

impl SaveTrigger {
    fn as_label(&self) -> &'static str {
        match self {
            SaveTrigger::WriteThrough => "write_through",
            SaveTrigger::Autosave => "autosave",
            SaveTrigger::Retry => "retry",
            SaveTrigger::Final => "final",
        }
    }
}

pub struct AttemptSession {
    attempt_id: String,
    assessment_id: String,
    autosave_interval_ticks: u32,
    time: Arc<dyn TimeSource>,
    gateway: Arc<dyn PersistenceGateway>,
    assessments: Arc<dyn AssessmentSource>,
    results: Arc<dyn ResultsSink>,
    marking: Arc<dyn MarkingScheme>,
    store: AnswerStore,
    monitor: IntegrityMonitor,
    phase: SessionPhase,
    started_at: DateTime<Utc>,
    duration_seconds: u32,
    current_question_index: usize,
    submitted_at: Option<DateTime<Utc>>,
    tick_count: u64,
    save_version: u64,
    save_retry_pending: bool,
    /// Generation counter for in-flight async work; bumped when the session
    /// settles so a late fetch result is discarded, not applied.
    epoch: u64,
    events: broadcast::Sender<SessionEvent>,
    breakdown: Option<crate::models::score::ScoreBreakdown>,
    result_id: Option<String>,
}

impl AttemptSession {
    /// Bootstrap a session: fetch and validate the assessment manifest, then
    /// either resume from a persisted snapshot or enter the consent gate.
    ///
    /// A restored InProgress snapshot skips consent and resumes with the
    /// remaining time recomputed from `started_at` + `duration_seconds`; if
    /// that time is already up, the attempt is submitted during bootstrap.
    /// A terminal snapshot opens a read-only review session.
    pub async fn open(
        state: &EngineState,
        assessment_id: &str,
        attempt_id: &str,
    ) -> Result<Self> {
        let assessments = state.assessments.clone();
        let manifest = retry_with_backoff(BackoffPolicy::collaborator(), || {
            assessments.fetch_assessment(assessment_id)
        })
        .await
        .context("Failed to fetch assessment")?;
        manifest
            .validate()
            .context("Assessment manifest failed validation")?;

        // A failed load is non-blocking: warn and enter the attempt fresh.
        let snapshot = match state.gateway.load(attempt_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(
                    "Snapshot load failed, treating attempt as fresh: attempt={}, error={}",
                    attempt_id,
                    e
                );
                None
            }
        };

        let mut store = AnswerStore::new();
        store.register_questions(manifest.questions.clone());

        let (events, _) = broadcast::channel(64);

        let mut session = Self {
            attempt_id: attempt_id.to_string(),
            assessment_id: assessment_id.to_string(),
            autosave_interval_ticks: state.config.autosave_interval_ticks,
            time: state.time.clone(),
            gateway: state.gateway.clone(),
            assessments: state.assessments.clone(),
            results: state.results.clone(),
            marking: state.marking.clone(),
            store,
            monitor: IntegrityMonitor::new(state.config.max_violations),
            phase: SessionPhase::ConsentPending,
            started_at: state.time.now(),
            duration_seconds: manifest.duration_seconds,
            current_question_index: 0,
            submitted_at: None,
            tick_count: 0,
            save_version: 0,
            save_retry_pending: false,
            epoch: 0,
            events,
            breakdown: None,
            result_id: None,
        };

        if let Some(snapshot) = snapshot {
            session.restore_from(snapshot, state.config.max_violations);
        } else {
            tracing::info!(
                "No snapshot for attempt {}; entering consent gate",
                attempt_id
            );
        }

        // Invariant: remaining time is derived, never trusted. Coming back
        // to an expired attempt submits it right away.
        if session.phase == SessionPhase::InProgress && session.remaining_seconds() == 0 {
            tracing::info!(
                "Attempt {} expired while away; submitting during bootstrap",
                attempt_id
            );
            session.submit(SubmitTrigger::TimeExpired).await;
        }

        Ok(session)
    }

    fn restore_from(&mut self, snapshot: AttemptSnapshot, max_violations: u32) {
        for (question_id, answer) in &snapshot.answers {
            let outcome = self.store.set_answer(question_id, answer.clone());
            if !outcome.was_applied() {
                tracing::warn!(
                    "Dropped persisted answer for question {}: {:?}",
                    question_id,
                    outcome
                );
            }
        }
        for question_id in &snapshot.flags {
            let outcome = self.store.toggle_flag(question_id);
            if !outcome.was_applied() {
                tracing::warn!("Dropped persisted flag for question {}", question_id);
            }
        }

        self.phase = match snapshot.status {
            AttemptStatus::InProgress => SessionPhase::InProgress,
            AttemptStatus::Submitted => SessionPhase::Submitted,
            AttemptStatus::Absent => SessionPhase::Absent,
        };
        self.started_at = snapshot.started_at;
        self.duration_seconds = snapshot.duration_seconds;
        self.current_question_index = snapshot.current_question_index;
        self.submitted_at = snapshot.submitted_at;
        self.save_version = snapshot.version;
        self.monitor = IntegrityMonitor::restore(max_violations, snapshot.violation_count);

        if self.phase == SessionPhase::InProgress {
            self.monitor.arm();
            ATTEMPTS_TOTAL.with_label_values(&["resumed"]).inc();
            ATTEMPTS_ACTIVE.inc();
        } else {
            // Terminal snapshot: recompute the breakdown for review.
            self.breakdown = Some(score(
                self.store.questions(),
                self.store.answers(),
                &*self.marking,
            ));
        }

        tracing::info!(
            "Restored attempt {}: status={:?}, version={}, violations={}",
            self.attempt_id,
            snapshot.status,
            snapshot.version,
            snapshot.violation_count
        );
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn attempt_id(&self) -> &str {
        &self.attempt_id
    }

    pub fn assessment_id(&self) -> &str {
        &self.assessment_id
    }

    pub fn question_count(&self) -> usize {
        self.store.question_count()
    }

    pub fn current_question_index(&self) -> usize {
        self.current_question_index
    }

    pub fn violation_count(&self) -> u32 {
        self.monitor.violation_count()
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.record().remaining_seconds(self.time.now())
    }

    pub fn palette(&self) -> Vec<PaletteEntry> {
        self.store.palette(self.current_question_index)
    }

    /// The current state of the attempt, as the record handed to the results
    /// collaborator at submission.
    pub fn record(&self) -> AttemptRecord {
        AttemptRecord {
            attempt_id: self.attempt_id.clone(),
            answers: self.store.answers().clone(),
            flags: self.store.flags().clone(),
            started_at: self.started_at,
            duration_seconds: self.duration_seconds,
            current_question_index: self.current_question_index,
            violation_count: self.monitor.violation_count(),
            status: self.status(),
            submitted_at: self.submitted_at,
        }
    }

    fn status(&self) -> AttemptStatus {
        match self.phase {
            // ConsentPending is a session phase, not a persisted status;
            // nothing is saved before the consent decision.
            SessionPhase::ConsentPending | SessionPhase::InProgress => AttemptStatus::InProgress,
            SessionPhase::Submitted => AttemptStatus::Submitted,
            SessionPhase::Absent => AttemptStatus::Absent,
        }
    }

    /// The user accepted monitoring: stamp the start time, arm the monitor,
    /// and perform the first write-through save. The embedding starts the
    /// Runner (Clock + signal pump) only after this returns.
    pub async fn accept_monitoring(&mut self) {
        if self.phase != SessionPhase::ConsentPending {
            tracing::debug!(
                "accept_monitoring ignored: attempt={}, phase={:?}",
                self.attempt_id,
                self.phase
            );
            return;
        }

        self.started_at = self.time.now();
        self.phase = SessionPhase::InProgress;
        self.monitor.arm();

        ATTEMPTS_TOTAL.with_label_values(&["started"]).inc();
        ATTEMPTS_ACTIVE.inc();

        tracing::info!(
            "Monitoring accepted: attempt={}, duration={}s",
            self.attempt_id,
            self.duration_seconds
        );
        self.emit(SessionEvent::MonitoringStarted {
            attempt_id: self.attempt_id.clone(),
        });
        self.persist(SaveTrigger::WriteThrough).await;
    }

    /// The user declined to attempt and asked for the answer key: mark the
    /// record Absent with empty answers. No Clock or Monitor ever start.
    pub async fn decline_and_review(&mut self) -> Option<AttemptReview> {
        if self.phase == SessionPhase::ConsentPending {
            self.phase = SessionPhase::Absent;
            self.epoch += 1;
            self.breakdown = Some(score(
                self.store.questions(),
                self.store.answers(),
                &*self.marking,
            ));

            ATTEMPTS_TOTAL.with_label_values(&["absent"]).inc();

            tracing::info!("Attempt {} marked absent", self.attempt_id);
            self.persist(SaveTrigger::Final).await;
            self.emit(SessionEvent::MarkedAbsent {
                attempt_id: self.attempt_id.clone(),
            });
        }
        self.review()
    }

    pub async fn set_answer(&mut self, question_id: &str, answer: Answer) -> bool {
        if self.phase != SessionPhase::InProgress {
            tracing::debug!(
                "Answer ignored outside InProgress: attempt={}, question={}",
                self.attempt_id,
                question_id
            );
            return false;
        }
        let applied = self.store.set_answer(question_id, answer).was_applied();
        if applied {
            self.persist(SaveTrigger::WriteThrough).await;
        }
        applied
    }

    pub async fn clear_answer(&mut self, question_id: &str) -> bool {
        if self.phase != SessionPhase::InProgress {
            return false;
        }
        let applied = self.store.clear_answer(question_id).was_applied();
        if applied {
            self.persist(SaveTrigger::WriteThrough).await;
        }
        applied
    }

    pub async fn toggle_flag(&mut self, question_id: &str) -> bool {
        if self.phase != SessionPhase::InProgress {
            return false;
        }
        let applied = self.store.toggle_flag(question_id).was_applied();
        if applied {
            self.persist(SaveTrigger::WriteThrough).await;
        }
        applied
    }

    /// Navigate to a question. Only the index changes; the next autosave
    /// picks it up.
    pub fn jump_to(&mut self, index: usize) -> bool {
        if self.phase != SessionPhase::InProgress {
            return false;
        }
        if index >= self.store.question_count() {
            tracing::debug!(
                "Navigation out of range ignored: attempt={}, index={}",
                self.attempt_id,
                index
            );
            return false;
        }
        self.current_question_index = index;
        true
    }

    /// One 1 Hz tick: emit the derived remaining time, autosave on cadence
    /// (retrying a previously failed save first), and submit exactly once
    /// when the derived remaining time reaches zero.
    pub async fn handle_tick(&mut self) {
        if self.phase != SessionPhase::InProgress {
            return;
        }

        self.tick_count += 1;
        let now = self.time.now();
        let remaining = self.record().remaining_seconds(now);

        self.emit(SessionEvent::Tick(TimerTick {
            attempt_id: self.attempt_id.clone(),
            remaining_seconds: remaining,
            elapsed_seconds: self.duration_seconds - remaining,
            total_seconds: self.duration_seconds,
            timestamp: now,
        }));

        if remaining == 0 {
            tracing::info!("Timer expired: attempt={}", self.attempt_id);
            self.emit(SessionEvent::TimeExpired(TimeExpired {
                attempt_id: self.attempt_id.clone(),
                timestamp: now,
                message: "Time limit exceeded".to_string(),
            }));
            self.submit(SubmitTrigger::TimeExpired).await;
            return;
        }

        if self.save_retry_pending {
            self.persist(SaveTrigger::Retry).await;
        } else if self.tick_count % u64::from(self.autosave_interval_ticks) == 0 {
            self.persist(SaveTrigger::Autosave).await;
        }
    }

    /// One environment signal: classify through the monitor, surface the
    /// warning, and submit when the violation limit is reached.
    pub async fn handle_signal(&mut self, event: SignalEvent) {
        if self.phase != SessionPhase::InProgress {
            return;
        }

        match self.monitor.observe(&event, self.time.now()) {
            MonitorVerdict::Ignored => {}
            MonitorVerdict::Warning(warning) => {
                self.emit(SessionEvent::ViolationWarning(warning));
                self.persist(SaveTrigger::WriteThrough).await;
            }
            MonitorVerdict::ForceSubmit(warning) => {
                self.emit(SessionEvent::ViolationWarning(warning));
                self.submit(SubmitTrigger::MaxViolations).await;
            }
        }
    }

    /// Freeze the attempt. First trigger wins; every later call is a no-op.
    /// Nothing in here can block the transition: the final save and the
    /// results forwarding are both best-effort.
    pub async fn submit(&mut self, trigger: SubmitTrigger) -> SubmitOutcome {
        if self.phase != SessionPhase::InProgress {
            tracing::debug!(
                "Submit ignored: attempt={}, trigger={}, phase={:?}",
                self.attempt_id,
                trigger.as_label(),
                self.phase
            );
            return SubmitOutcome::Ignored;
        }

        let now = self.time.now();
        self.phase = SessionPhase::Submitted;
        self.submitted_at = Some(now);
        self.monitor.disarm();
        self.epoch += 1;

        let breakdown = score(self.store.questions(), self.store.answers(), &*self.marking);
        self.breakdown = Some(breakdown.clone());

        ATTEMPTS_TOTAL.with_label_values(&["submitted"]).inc();
        ATTEMPTS_ACTIVE.dec();
        if trigger != SubmitTrigger::User {
            FORCE_SUBMITS_TOTAL
                .with_label_values(&[trigger.as_label()])
                .inc();
        }

        self.persist(SaveTrigger::Final).await;

        let record = self.record();
        let results = self.results.clone();
        let result_id = match retry_with_backoff(BackoffPolicy::collaborator(), || {
            results.submit_attempt(&record, &breakdown)
        })
        .await
        {
            Ok(result_id) => Some(result_id),
            Err(e) => {
                tracing::error!(
                    "Failed to forward attempt {} to results service: {:#}",
                    self.attempt_id,
                    e
                );
                None
            }
        };
        self.result_id = result_id.clone();

        tracing::info!(
            "Attempt {} submitted: trigger={}, score={}/{} ({}%)",
            self.attempt_id,
            trigger.as_label(),
            breakdown.score,
            breakdown.total_marks,
            breakdown.percentage
        );
        self.emit(SessionEvent::Submitted {
            trigger,
            result_id: result_id.clone(),
        });

        SubmitOutcome::Submitted {
            result_id,
            breakdown,
        }
    }

    /// Read-only review of a settled attempt: the frozen record, the
    /// questions with correct answers and explanations, and the breakdown.
    pub fn review(&self) -> Option<AttemptReview> {
        if !self.phase.is_terminal() {
            return None;
        }
        let breakdown = self.breakdown.clone().unwrap_or_else(|| {
            score(self.store.questions(), self.store.answers(), &*self.marking)
        });
        Some(AttemptReview {
            record: self.record(),
            questions: self.store.questions().to_vec(),
            breakdown,
        })
    }

    /// Apply a resolved question fetch. Returns false (and discards the
    /// batch) if the session's epoch advanced since the fetch was issued.
    pub fn apply_fetched_questions(&mut self, epoch: u64, questions: Vec<Question>) -> bool {
        if epoch != self.epoch || self.phase != SessionPhase::InProgress {
            tracing::debug!(
                "Discarding stale question fetch: attempt={}, fetch_epoch={}, current_epoch={}",
                self.attempt_id,
                epoch,
                self.epoch
            );
            return false;
        }
        let added = self.store.register_questions(questions);
        if added > 0 {
            tracing::info!(
                "Registered {} additional questions for attempt {}",
                added,
                self.attempt_id
            );
        }
        true
    }

    async fn persist(&mut self, trigger: SaveTrigger) {
        self.save_version += 1;
        let snapshot = self.snapshot();

        match self.gateway.save(&self.attempt_id, &snapshot).await {
            Ok(()) => {
                self.save_retry_pending = false;
                SNAPSHOT_SAVES_TOTAL
                    .with_label_values(&[trigger.as_label(), "success"])
                    .inc();
                self.emit(SessionEvent::SnapshotSaved {
                    version: snapshot.version,
                });
            }
            Err(e) if e.is_stale() => {
                // A newer snapshot already won; nothing to retry.
                SNAPSHOT_SAVES_TOTAL
                    .with_label_values(&[trigger.as_label(), "stale"])
                    .inc();
                tracing::debug!(
                    "Stale snapshot save skipped: attempt={}, {}",
                    self.attempt_id,
                    e
                );
            }
            Err(e) => {
                self.save_retry_pending = true;
                SNAPSHOT_SAVES_TOTAL
                    .with_label_values(&[trigger.as_label(), "failure"])
                    .inc();
                tracing::warn!(
                    "Snapshot save failed, will retry on next tick: attempt={}, error={}",
                    self.attempt_id,
                    e
                );
                self.emit(SessionEvent::SaveFailed {
                    message: e.to_string(),
                });
            }
        }
    }

    fn snapshot(&self) -> AttemptSnapshot {
        AttemptSnapshot {
            answers: self.store.answers().clone(),
            flags: self.store.flags().clone(),
            started_at: self.started_at,
            duration_seconds: self.duration_seconds,
            current_question_index: self.current_question_index,
            violation_count: self.monitor.violation_count(),
            status: self.status(),
            submitted_at: self.submitted_at,
            version: self.save_version,
        }
    }

    fn emit(&self, event: SessionEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }
}

/// Fetch the next question page for an in-progress session without holding
/// the session lock across the network call. The epoch captured before the
/// fetch guards the apply: if the session settled meanwhile, the resolved
/// batch is discarded.
pub async fn load_more_questions(
    session: &tokio::sync::Mutex<AttemptSession>,
) -> Result<bool> {
    let (epoch, assessment_id, offset, assessments) = {
        let session = session.lock().await;
        if session.phase() != SessionPhase::InProgress {
            return Ok(false);
        }
        (
            session.epoch(),
            session.assessment_id().to_string(),
            session.question_count(),
            session.assessments.clone(),
        )
    };

    let questions = retry_with_backoff(BackoffPolicy::collaborator(), || {
        assessments.fetch_more_questions(&assessment_id, offset)
    })
    .await
    .context("Failed to fetch more questions")?;

    let mut session = session.lock().await;
    Ok(session.apply_fetched_questions(epoch, questions))
}
