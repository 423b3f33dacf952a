#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::broadcast;

use preparena_engine::clock::ManualTimeSource;
use preparena_engine::config::EngineConfig;
use preparena_engine::error::PersistenceError;
use preparena_engine::models::attempt::AttemptSnapshot;
use preparena_engine::models::event::SessionEvent;
use preparena_engine::models::question::{CorrectAnswer, Question, QuestionType};
use preparena_engine::models::AssessmentManifest;
use preparena_engine::persistence::{InMemoryGateway, PersistenceGateway};
use preparena_engine::services::assessment_client::{MemoryResultsSink, StaticAssessmentSource};
use preparena_engine::services::EngineState;

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap()
}

pub fn q1() -> Question {
    Question {
        id: "q1".to_string(),
        prompt: "A ball is dropped from rest. What is its speed after 1.1 s?".to_string(),
        question_type: QuestionType::SingleChoice,
        options: Some(vec![
            "9 m/s".to_string(),
            "11 m/s".to_string(),
            "13 m/s".to_string(),
            "15 m/s".to_string(),
        ]),
        correct_answer: CorrectAnswer::Text("11 m/s".to_string()),
        marks: 4.0,
        negative_marks: 1.0,
        explanation: Some("v = g * t with g ≈ 10 m/s^2.".to_string()),
    }
}

pub fn q2() -> Question {
    Question {
        id: "q2".to_string(),
        prompt: "Compute the ratio of the two periods.".to_string(),
        question_type: QuestionType::Numerical,
        options: None,
        correct_answer: CorrectAnswer::Value(2.00),
        marks: 4.0,
        negative_marks: 1.0,
        explanation: None,
    }
}

pub fn physics_manifest() -> AssessmentManifest {
    manifest_with_duration(3600)
}

pub fn manifest_with_duration(duration_seconds: u32) -> AssessmentManifest {
    AssessmentManifest {
        assessment_id: "mock-physics".to_string(),
        title: "Physics Mock Test".to_string(),
        duration_seconds,
        questions: vec![q1(), q2()],
    }
}

/// In-memory gateway wrapper that counts successful writes and can inject
/// save failures.
pub struct CountingGateway {
    inner: InMemoryGateway,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl CountingGateway {
    pub fn new() -> Self {
        Self {
            inner: InMemoryGateway::new(),
            saves: AtomicUsize::new(0),
            fail_saves: AtomicBool::new(false),
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PersistenceGateway for CountingGateway {
    async fn save(
        &self,
        attempt_id: &str,
        snapshot: &AttemptSnapshot,
    ) -> Result<(), PersistenceError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable(
                "injected save failure".to_string(),
            ));
        }
        self.inner.save(attempt_id, snapshot).await?;
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load(&self, attempt_id: &str) -> Result<Option<AttemptSnapshot>, PersistenceError> {
        self.inner.load(attempt_id).await
    }
}

pub struct TestHarness {
    pub state: EngineState,
    pub time: Arc<ManualTimeSource>,
    pub gateway: Arc<CountingGateway>,
    pub results: Arc<MemoryResultsSink>,
}

pub fn harness() -> TestHarness {
    harness_with(physics_manifest())
}

pub fn harness_with(manifest: AssessmentManifest) -> TestHarness {
    harness_with_source(StaticAssessmentSource::new(manifest))
}

pub fn harness_with_source(source: StaticAssessmentSource) -> TestHarness {
    // Initialize tracing for tests
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let time = Arc::new(ManualTimeSource::starting_at(start_time()));
    let gateway = Arc::new(CountingGateway::new());
    let results = Arc::new(MemoryResultsSink::new());

    let state = EngineState::new(
        EngineConfig::default(),
        gateway.clone(),
        Arc::new(source),
        results.clone(),
    )
    .with_time_source(time.clone());

    TestHarness {
        state,
        time,
        gateway,
        results,
    }
}

/// Drain everything currently buffered on an event receiver.
pub fn drain_events(receiver: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    events
}
