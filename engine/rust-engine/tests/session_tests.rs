mod common;

use std::sync::Arc;

use tokio::sync::Mutex;

use preparena_engine::models::attempt::{AttemptStatus, SubmitOutcome, SubmitTrigger};
use preparena_engine::models::attempt::PaletteStatus;
use preparena_engine::models::event::SessionEvent;
use preparena_engine::models::question::Answer;
use preparena_engine::services::assessment_client::StaticAssessmentSource;
use preparena_engine::services::attempt_session::{
    load_more_questions, AttemptSession, SessionPhase,
};

#[tokio::test]
async fn consent_gate_blocks_mutations_and_persistence() {
    let harness = common::harness();
    let mut session = AttemptSession::open(&harness.state, "mock-physics", "attempt-1")
        .await
        .unwrap();

    assert_eq!(session.phase(), SessionPhase::ConsentPending);

    // Nothing may move before the user accepts monitoring.
    assert!(
        !session
            .set_answer("q1", Answer::Choice("11 m/s".to_string()))
            .await
    );
    assert!(!session.toggle_flag("q1").await);
    session.handle_tick().await;
    assert_eq!(harness.gateway.save_count(), 0);

    let mut events = session.subscribe();
    session.accept_monitoring().await;
    assert_eq!(session.phase(), SessionPhase::InProgress);
    // Consent performs the first write-through save.
    assert_eq!(harness.gateway.save_count(), 1);

    let emitted = common::drain_events(&mut events);
    assert!(matches!(
        emitted.first(),
        Some(SessionEvent::MonitoringStarted { .. })
    ));
}

#[tokio::test]
async fn accepting_twice_is_a_no_op() {
    let harness = common::harness();
    let mut session = AttemptSession::open(&harness.state, "mock-physics", "attempt-1")
        .await
        .unwrap();

    session.accept_monitoring().await;
    session.accept_monitoring().await;
    assert_eq!(harness.gateway.save_count(), 1);
}

#[tokio::test]
async fn full_marks_end_to_end() {
    let harness = common::harness();
    let mut session = AttemptSession::open(&harness.state, "mock-physics", "attempt-1")
        .await
        .unwrap();
    session.accept_monitoring().await;

    assert!(
        session
            .set_answer("q1", Answer::Choice("11 m/s".to_string()))
            .await
    );
    assert!(session.set_answer("q2", Answer::Numeric(2.0)).await);

    let outcome = session.submit(SubmitTrigger::User).await;
    let SubmitOutcome::Submitted {
        result_id,
        breakdown,
    } = outcome
    else {
        panic!("expected a submitted outcome");
    };

    assert!(result_id.is_some());
    assert_eq!(breakdown.score, 8.0);
    assert_eq!(breakdown.total_marks, 8.0);
    assert_eq!(breakdown.percentage, 100);

    // The frozen record reached the results collaborator.
    let submissions = harness.results.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].0.status, AttemptStatus::Submitted);
    assert!(submissions[0].0.submitted_at.is_some());
}

#[tokio::test]
async fn terminal_state_is_immutable() {
    let harness = common::harness();
    let mut session = AttemptSession::open(&harness.state, "mock-physics", "attempt-1")
        .await
        .unwrap();
    session.accept_monitoring().await;
    session
        .set_answer("q1", Answer::Choice("11 m/s".to_string()))
        .await;
    session.submit(SubmitTrigger::User).await;

    let frozen = session.record();
    let saves_before = harness.gateway.save_count();

    assert!(
        !session
            .set_answer("q2", Answer::Numeric(2.0))
            .await
    );
    assert!(!session.clear_answer("q1").await);
    assert!(!session.toggle_flag("q1").await);
    assert!(!session.jump_to(1));
    session.handle_tick().await;

    let after = session.record();
    assert_eq!(frozen.answers, after.answers);
    assert_eq!(frozen.flags, after.flags);
    assert_eq!(frozen.current_question_index, after.current_question_index);
    assert_eq!(frozen.status, after.status);
    assert_eq!(harness.gateway.save_count(), saves_before);
}

#[tokio::test]
async fn second_submit_trigger_is_ignored() {
    let harness = common::harness();
    let mut session = AttemptSession::open(&harness.state, "mock-physics", "attempt-1")
        .await
        .unwrap();
    session.accept_monitoring().await;

    let first = session.submit(SubmitTrigger::User).await;
    assert!(matches!(first, SubmitOutcome::Submitted { .. }));

    // A near-simultaneous expiry trigger loses the race and no-ops.
    let second = session.submit(SubmitTrigger::TimeExpired).await;
    assert!(matches!(second, SubmitOutcome::Ignored));

    assert_eq!(harness.results.submissions().len(), 1);
}

#[tokio::test]
async fn declining_marks_the_attempt_absent() {
    let harness = common::harness();
    let mut session = AttemptSession::open(&harness.state, "mock-physics", "attempt-1")
        .await
        .unwrap();

    let review = session.decline_and_review().await.unwrap();
    assert_eq!(session.phase(), SessionPhase::Absent);
    assert_eq!(review.record.status, AttemptStatus::Absent);
    assert!(review.record.answers.is_empty());
    assert!(review.record.submitted_at.is_none());
    // The answer key is available for review.
    assert_eq!(review.questions.len(), 2);
    assert_eq!(review.breakdown.score, 0.0);

    // Absence is terminal: consent can no longer be accepted.
    session.accept_monitoring().await;
    assert_eq!(session.phase(), SessionPhase::Absent);

    // An absent record is not a submission.
    assert!(harness.results.submissions().is_empty());
}

#[tokio::test]
async fn review_is_only_available_after_settling() {
    let harness = common::harness();
    let mut session = AttemptSession::open(&harness.state, "mock-physics", "attempt-1")
        .await
        .unwrap();

    assert!(session.review().is_none());
    session.accept_monitoring().await;
    assert!(session.review().is_none());

    session.submit(SubmitTrigger::User).await;
    let review = session.review().unwrap();
    assert_eq!(review.record.status, AttemptStatus::Submitted);
}

#[tokio::test]
async fn palette_tracks_answers_and_flags() {
    let harness = common::harness();
    let mut session = AttemptSession::open(&harness.state, "mock-physics", "attempt-1")
        .await
        .unwrap();
    session.accept_monitoring().await;

    session
        .set_answer("q1", Answer::Choice("13 m/s".to_string()))
        .await;
    session.toggle_flag("q2").await;

    let palette = session.palette();
    assert_eq!(palette[0].status, PaletteStatus::Answered);
    assert_eq!(palette[1].status, PaletteStatus::MarkedForReview);
}

#[tokio::test]
async fn fetched_questions_apply_only_while_the_epoch_holds() {
    let source = StaticAssessmentSource::new(common::physics_manifest())
        .with_additional_questions(vec![preparena_engine::models::question::Question {
            id: "q3".to_string(),
            prompt: "One more.".to_string(),
            question_type: preparena_engine::models::question::QuestionType::Integer,
            options: None,
            correct_answer: preparena_engine::models::question::CorrectAnswer::Value(7.0),
            marks: 4.0,
            negative_marks: 0.0,
            explanation: None,
        }]);
    let harness = common::harness_with_source(source);

    let mut session = AttemptSession::open(&harness.state, "mock-physics", "attempt-1")
        .await
        .unwrap();
    session.accept_monitoring().await;
    let session = Arc::new(Mutex::new(session));

    // While in progress the page lands.
    assert!(load_more_questions(&session).await.unwrap());
    assert_eq!(session.lock().await.question_count(), 3);

    // Capture an epoch, settle the session, then try to apply a late result.
    let stale_epoch = session.lock().await.epoch();
    session.lock().await.submit(SubmitTrigger::User).await;

    let late_page = vec![preparena_engine::models::question::Question {
        id: "q4".to_string(),
        prompt: "Too late.".to_string(),
        question_type: preparena_engine::models::question::QuestionType::Integer,
        options: None,
        correct_answer: preparena_engine::models::question::CorrectAnswer::Value(1.0),
        marks: 4.0,
        negative_marks: 0.0,
        explanation: None,
    }];
    let applied = session
        .lock()
        .await
        .apply_fetched_questions(stale_epoch, late_page);
    assert!(!applied);
    assert_eq!(session.lock().await.question_count(), 3);

    // The helper short-circuits entirely on a settled session.
    assert!(!load_more_questions(&session).await.unwrap());
}
