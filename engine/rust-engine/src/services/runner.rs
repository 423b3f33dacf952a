//! The event pump: connects a Clock and an EnvironmentSignalSource to a
//! shared session.
//!
//! Cleanup contract: stopping the clock and unsubscribing all signal
//! listeners must always happen on session exit. The pumps do it themselves
//! once the session settles; `RunnerHandle::shutdown` covers the
//! navigate-away path and is idempotent.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::services::attempt_session::AttemptSession;
use crate::signals::EnvironmentSignalSource;

pub type SharedSession = Arc<Mutex<AttemptSession>>;

pub struct Runner;

impl Runner {
    /// Start pumping ticks and signals into the session. Call only after the
    /// consent gate has been passed: the gate is what blocks Clock and
    /// Monitor start.
    pub fn spawn(
        session: SharedSession,
        clock: Arc<dyn Clock>,
        signals: Arc<dyn EnvironmentSignalSource>,
    ) -> RunnerHandle {
        let tick_task = {
            let session = session.clone();
            let clock = clock.clone();
            let signals = signals.clone();
            tokio::spawn(async move {
                let mut ticks = clock.start();
                while ticks.next().await.is_some() {
                    let mut guard = session.lock().await;
                    guard.handle_tick().await;
                    if guard.phase().is_terminal() {
                        break;
                    }
                }
                // The session settled or the clock was stopped externally;
                // either way both sources get released.
                clock.stop();
                signals.shutdown();
            })
        };

        let signal_task = {
            let session = session.clone();
            let clock = clock.clone();
            let signals = signals.clone();
            tokio::spawn(async move {
                let mut events = signals.subscribe();
                while let Some(event) = events.next().await {
                    let mut guard = session.lock().await;
                    guard.handle_signal(event).await;
                    if guard.phase().is_terminal() {
                        break;
                    }
                }
                // A capability-less source ends its stream immediately; only
                // tear the clock down if the session actually settled.
                if session.lock().await.phase().is_terminal() {
                    clock.stop();
                    signals.shutdown();
                }
            })
        };

        RunnerHandle {
            clock,
            signals,
            tick_task,
            signal_task,
        }
    }
}

pub struct RunnerHandle {
    clock: Arc<dyn Clock>,
    signals: Arc<dyn EnvironmentSignalSource>,
    tick_task: JoinHandle<()>,
    signal_task: JoinHandle<()>,
}

impl RunnerHandle {
    /// Stop the clock and drop all signal listeners. Idempotent; safe to call
    /// after the pumps already shut themselves down.
    pub fn shutdown(&self) {
        self.clock.stop();
        self.signals.shutdown();
    }

    /// Wait for both pumps to drain. Intended for tests and orderly
    /// embedding teardown after `shutdown` or a terminal transition.
    pub async fn join(self) {
        let _ = self.tick_task.await;
        let _ = self.signal_task.await;
    }
}
