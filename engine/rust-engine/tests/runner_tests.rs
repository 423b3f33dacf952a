mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use preparena_engine::clock::ManualClock;
use preparena_engine::services::attempt_session::{AttemptSession, SessionPhase};
use preparena_engine::services::runner::Runner;
use preparena_engine::signals::{
    EnvironmentSignal, NullSignalSource, SyntheticSignalSource,
};

async fn settle() {
    // Give the pump tasks a chance to drain their queues.
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn runner_pumps_ticks_into_the_session() {
    let harness = common::harness();
    let mut session = AttemptSession::open(&harness.state, "mock-physics", "attempt-1")
        .await
        .unwrap();
    session.accept_monitoring().await;
    let session = Arc::new(Mutex::new(session));

    let clock = Arc::new(ManualClock::new());
    let signals = Arc::new(SyntheticSignalSource::with_all_capabilities());
    let handle = Runner::spawn(session.clone(), clock.clone(), signals.clone());

    harness.time.advance_seconds(1);
    clock.advance(1);
    settle().await;

    assert_eq!(session.lock().await.remaining_seconds(), 3599);

    handle.shutdown();
    // Shutting down twice must be harmless.
    handle.shutdown();
    handle.join().await;
}

#[tokio::test]
async fn violation_signals_settle_the_session_and_stop_the_pumps() {
    let harness = common::harness();
    let mut session = AttemptSession::open(&harness.state, "mock-physics", "attempt-1")
        .await
        .unwrap();
    session.accept_monitoring().await;
    let session = Arc::new(Mutex::new(session));

    let clock = Arc::new(ManualClock::new());
    let signals = Arc::new(SyntheticSignalSource::with_all_capabilities());
    let handle = Runner::spawn(session.clone(), clock.clone(), signals.clone());

    signals.emit(EnvironmentSignal::TabHidden);
    signals.emit(EnvironmentSignal::TabHidden);
    signals.emit(EnvironmentSignal::TabHidden);
    settle().await;

    {
        let session = session.lock().await;
        assert_eq!(session.phase(), SessionPhase::Submitted);
        assert_eq!(session.violation_count(), 3);
    }
    assert_eq!(harness.results.submissions().len(), 1);

    // The pumps tore themselves down; join returns without an explicit
    // shutdown call.
    handle.join().await;
}

#[tokio::test]
async fn capability_less_source_does_not_kill_the_clock() {
    let harness = common::harness_with(common::manifest_with_duration(10));
    let mut session = AttemptSession::open(&harness.state, "mock-physics", "attempt-1")
        .await
        .unwrap();
    session.accept_monitoring().await;
    let session = Arc::new(Mutex::new(session));

    let clock = Arc::new(ManualClock::new());
    let handle = Runner::spawn(session.clone(), clock.clone(), Arc::new(NullSignalSource));
    settle().await;

    // The null source's stream ended immediately, but ticks keep flowing.
    for _ in 0..3 {
        harness.time.advance_seconds(1);
        clock.advance(1);
    }
    settle().await;
    assert_eq!(session.lock().await.remaining_seconds(), 7);

    handle.shutdown();
    handle.join().await;
}

#[tokio::test]
async fn expiry_through_the_runner_stops_the_clock() {
    let harness = common::harness_with(common::manifest_with_duration(3));
    let mut session = AttemptSession::open(&harness.state, "mock-physics", "attempt-1")
        .await
        .unwrap();
    session.accept_monitoring().await;
    let session = Arc::new(Mutex::new(session));

    let clock = Arc::new(ManualClock::new());
    let signals = Arc::new(SyntheticSignalSource::with_all_capabilities());
    let handle = Runner::spawn(session.clone(), clock.clone(), signals.clone());

    for _ in 0..3 {
        harness.time.advance_seconds(1);
        clock.advance(1);
    }
    settle().await;

    assert_eq!(session.lock().await.phase(), SessionPhase::Submitted);
    assert_eq!(harness.results.submissions().len(), 1);

    // Both pumps exit on their own once the session settled.
    handle.join().await;
}
