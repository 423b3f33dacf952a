//! Capability-typed environment signal source.
//!
//! The portal embedding forwards browser-level integrity signals (tab
//! visibility, fullscreen, focus, blocked shortcuts, context menu) through
//! this seam. A platform that lacks an API simply omits the capability;
//! absence degrades silently, it never errors.

use std::collections::HashSet;
use std::sync::Mutex;

use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Visibility,
    Fullscreen,
    WindowFocus,
    BlockedShortcut,
    ContextMenu,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "kebab-case")]
pub enum EnvironmentSignal {
    TabHidden,
    FullscreenExited,
    WindowBlurred,
    ShortcutBlocked { combo: String },
    ContextMenuOpened,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SignalEvent {
    Signal(EnvironmentSignal),
    /// A platform error from the source itself (e.g. a rejected fullscreen
    /// request). Logged by the session; never counted as a violation.
    Fault {
        capability: Capability,
        message: String,
    },
}

pub trait EnvironmentSignalSource: Send + Sync {
    fn capabilities(&self) -> HashSet<Capability>;

    fn subscribe(&self) -> BoxStream<'static, SignalEvent>;

    /// Drop all listeners. Idempotent; part of the session-exit cleanup
    /// contract.
    fn shutdown(&self);
}

/// For platforms with no monitoring APIs at all: no capabilities, and a
/// stream that ends immediately.
pub struct NullSignalSource;

impl EnvironmentSignalSource for NullSignalSource {
    fn capabilities(&self) -> HashSet<Capability> {
        HashSet::new()
    }

    fn subscribe(&self) -> BoxStream<'static, SignalEvent> {
        stream::empty().boxed()
    }

    fn shutdown(&self) {}
}

/// In-memory source: tests and headless embeddings inject synthetic events.
pub struct SyntheticSignalSource {
    capabilities: HashSet<Capability>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<SignalEvent>>>,
}

impl SyntheticSignalSource {
    pub fn new(capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            capabilities: capabilities.into_iter().collect(),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn with_all_capabilities() -> Self {
        Self::new([
            Capability::Visibility,
            Capability::Fullscreen,
            Capability::WindowFocus,
            Capability::BlockedShortcut,
            Capability::ContextMenu,
        ])
    }

    pub fn emit(&self, signal: EnvironmentSignal) {
        self.broadcast(SignalEvent::Signal(signal));
    }

    pub fn emit_fault(&self, capability: Capability, message: &str) {
        self.broadcast(SignalEvent::Fault {
            capability,
            message: message.to_string(),
        });
    }

    fn broadcast(&self, event: SignalEvent) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}

impl EnvironmentSignalSource for SyntheticSignalSource {
    fn capabilities(&self) -> HashSet<Capability> {
        self.capabilities.clone()
    }

    fn subscribe(&self) -> BoxStream<'static, SignalEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(sender);
        stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|event| (event, receiver))
        })
        .boxed()
    }

    fn shutdown(&self) {
        self.subscribers.lock().unwrap().clear();
    }
}
