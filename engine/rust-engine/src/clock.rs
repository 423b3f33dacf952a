//! Tick and wall-clock abstractions.
//!
//! The session never reads the system clock directly: `TimeSource` supplies
//! "now" (so derived remaining time can be fast-forwarded in tests) and
//! `Clock` supplies the 1 Hz tick stream (so tests never wait on real time).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::mpsc;

pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Virtual time for tests: starts at a fixed instant and only moves when
/// `advance_seconds` is called.
pub struct ManualTimeSource {
    now: Mutex<DateTime<Utc>>,
}

impl ManualTimeSource {
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance_seconds(&self, seconds: i64) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::seconds(seconds);
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

pub trait Clock: Send + Sync {
    /// Begin ticking; the stream yields one item per interval until `stop`.
    fn start(&self) -> BoxStream<'static, ()>;

    /// Idempotent; must always be invoked on session exit so no timer leaks.
    fn stop(&self);
}

/// Real-time clock: one tick per second, driven by `tokio::time::sleep`.
pub struct SystemClock {
    tick_interval: Duration,
    stopped: Arc<AtomicBool>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::with_interval(Duration::from_secs(1))
    }

    /// Shorter intervals are useful in integration tests that drive a real
    /// runner without waiting out wall-clock seconds.
    pub fn with_interval(tick_interval: Duration) -> Self {
        Self {
            tick_interval,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn start(&self) -> BoxStream<'static, ()> {
        self.stopped.store(false, Ordering::SeqCst);
        let tick_interval = self.tick_interval;
        stream::unfold(self.stopped.clone(), move |stopped| async move {
            tokio::time::sleep(tick_interval).await;
            if stopped.load(Ordering::SeqCst) {
                return None;
            }
            Some(((), stopped))
        })
        .boxed()
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Test clock: ticks are delivered only when `advance` is called.
pub struct ManualClock {
    sender: Mutex<Option<mpsc::UnboundedSender<()>>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            sender: Mutex::new(None),
        }
    }

    /// Deliver `ticks` ticks to the active subscriber, if any.
    pub fn advance(&self, ticks: u32) {
        if let Some(sender) = self.sender.lock().unwrap().as_ref() {
            for _ in 0..ticks {
                let _ = sender.send(());
            }
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn start(&self) -> BoxStream<'static, ()> {
        let (sender, receiver) = mpsc::unbounded_channel();
        *self.sender.lock().unwrap() = Some(sender);
        stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|tick| (tick, receiver))
        })
        .boxed()
    }

    fn stop(&self) {
        self.sender.lock().unwrap().take();
    }
}
