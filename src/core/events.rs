//! Pad event definitions and synchronous dispatch
//!
//! Handlers run on whichever thread raises the event (normally the background
//! reader), in subscription order. A panicking handler is not caught: it
//! unwinds out of `emit` and later handlers for that event do not run.

use crate::error::PadError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Named event channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Key pressed
    Down,
    /// Key released
    Up,
    /// Background reader failed
    Error,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [EventKind::Down, EventKind::Up, EventKind::Error];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Down => "down",
            EventKind::Up => "up",
            EventKind::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "down" => Ok(EventKind::Down),
            "up" => Ok(EventKind::Up),
            "error" => Ok(EventKind::Error),
            other => Err(format!("Unknown event name: {}", other)),
        }
    }
}

/// Events raised by the pad
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PadEvent {
    /// Key pressed (zero-based key index)
    Down(usize),
    /// Key released (zero-based key index)
    Up(usize),
    /// The reader stopped on a transport failure
    Error(PadError),
}

impl PadEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PadEvent::Down(_) => EventKind::Down,
            PadEvent::Up(_) => EventKind::Up,
            PadEvent::Error(_) => EventKind::Error,
        }
    }
}

pub type EventHandler = Arc<dyn Fn(&PadEvent) + Send + Sync>;

/// Event name to ordered handler list
#[derive(Default)]
pub struct EventDispatcher {
    handlers: RwLock<HashMap<EventKind, Vec<EventHandler>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; handlers for the same kind run in registration order
    pub fn on<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&PadEvent) + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .entry(kind)
            .or_default()
            .push(Arc::new(handler));
    }

    /// Forward every event kind into an unbounded channel
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<PadEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        for kind in EventKind::ALL {
            let tx = tx.clone();
            self.on(kind, move |event| {
                let _ = tx.send(event.clone());
            });
        }
        rx
    }

    /// Invoke every handler registered for the event's kind
    pub fn emit(&self, event: &PadEvent) {
        // Snapshot so handlers may subscribe without deadlocking
        let handlers: Vec<EventHandler> = self
            .handlers
            .read()
            .get(&event.kind())
            .cloned()
            .unwrap_or_default();

        for handler in handlers {
            handler(event);
        }
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.read().get(&kind).map_or(0, Vec::len)
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read();
        let mut map = f.debug_map();
        for kind in EventKind::ALL {
            map.entry(&kind.as_str(), &handlers.get(&kind).map_or(0, Vec::len));
        }
        map.finish()
    }
}
