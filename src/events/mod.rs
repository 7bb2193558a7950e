//! Lifecycle events and the emitter that dispatches them
//!
//! Dispatch is synchronous: [`Emitter::emit`] returns after every listener
//! has run.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

/// Every event an instance may emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    FileWatching,
    FileReload,
    ServiceExit,
    BrowserReload,
    BrowserError,
    StreamChanged,
    ClientConnected,
    ServiceRunning,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::FileWatching,
        EventKind::FileReload,
        EventKind::ServiceExit,
        EventKind::BrowserReload,
        EventKind::BrowserError,
        EventKind::StreamChanged,
        EventKind::ClientConnected,
        EventKind::ServiceRunning,
    ];

    /// Wire name, e.g. `file:reload`
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::FileWatching => "file:watching",
            EventKind::FileReload => "file:reload",
            EventKind::ServiceExit => "service:exit",
            EventKind::BrowserReload => "browser:reload",
            EventKind::BrowserError => "browser:error",
            EventKind::StreamChanged => "stream:changed",
            EventKind::ClientConnected => "client:connected",
            EventKind::ServiceRunning => "service:running",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown event `{}`", s))
    }
}

pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

/// Handle returned by [`Emitter::on`], used to remove the listener again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Shared, cloneable event emitter
#[derive(Clone, Default)]
pub struct Emitter {
    listeners: Arc<RwLock<HashMap<EventKind, Vec<(ListenerId, Listener)>>>>,
    next_id: Arc<AtomicU64>,
}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<EventKind, usize> = self
            .listeners
            .read()
            .iter()
            .map(|(kind, listeners)| (*kind, listeners.len()))
            .collect();
        f.debug_struct("Emitter").field("listeners", &counts).finish()
    }
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `kind`
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns false when it was not registered.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let Some(entries) = listeners.get_mut(&kind) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(entry, _)| *entry != id);
        entries.len() != before
    }

    /// Run every listener for `kind`, in registration order
    pub fn emit(&self, kind: EventKind, payload: &Value) {
        // Snapshot so listeners can subscribe or emit without deadlocking.
        let listeners = self
            .listeners
            .read()
            .get(&kind)
            .map(|entries| entries.iter().map(|(_, l)| Arc::clone(l)).collect::<Vec<_>>())
            .unwrap_or_default();

        for listener in listeners {
            listener(payload);
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.read().get(&kind).map_or(0, Vec::len)
    }
}
