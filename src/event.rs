//! Diagnostics emitted by a codec session.
//!
//! A session records every event it emits and forwards it to `tracing` and
//! to the handler installed for its level. Handlers only observe: a codec
//! failure is returned to the caller as a `Result`, never raised from a
//! handler.

use std::io::Write;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventLevel {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for EventLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => f.write_str("error"),
            Self::Warning => f.write_str("warning"),
            Self::Info => f.write_str("info"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub level: EventLevel,
    pub message: String,
}

/// Callback slot: receives the message and the manager's output stream.
pub type EventHandler = Box<dyn FnMut(&str, &mut dyn Write)>;

/// Three independent handler slots plus the stream they write to.
pub struct EventManager {
    error_handler: Option<EventHandler>,
    warning_handler: Option<EventHandler>,
    info_handler: Option<EventHandler>,
    output: Box<dyn Write>,
}

impl EventManager {
    /// A manager with no handlers installed, writing to `output`.
    pub fn new(output: impl Write + 'static) -> Self {
        Self {
            error_handler: None,
            warning_handler: None,
            info_handler: None,
            output: Box::new(output),
        }
    }

    /// Prints warnings and info verbatim, one per line, and errors with an
    /// `[ERROR]` prefix.
    pub fn console(output: impl Write + 'static) -> Self {
        Self::new(output)
            .on_error(|msg, out| {
                let _ = writeln!(out, "[ERROR] {msg}");
            })
            .on_warning(print_line)
            .on_info(print_line)
    }

    pub fn on_error(mut self, handler: impl FnMut(&str, &mut dyn Write) + 'static) -> Self {
        self.error_handler = Some(Box::new(handler));
        self
    }

    pub fn on_warning(mut self, handler: impl FnMut(&str, &mut dyn Write) + 'static) -> Self {
        self.warning_handler = Some(Box::new(handler));
        self
    }

    pub fn on_info(mut self, handler: impl FnMut(&str, &mut dyn Write) + 'static) -> Self {
        self.info_handler = Some(Box::new(handler));
        self
    }

    pub(crate) fn dispatch(&mut self, event: &Event) {
        let slot = match event.level {
            EventLevel::Error => &mut self.error_handler,
            EventLevel::Warning => &mut self.warning_handler,
            EventLevel::Info => &mut self.info_handler,
        };
        if let Some(handler) = slot {
            handler(&event.message, &mut *self.output);
            let _ = self.output.flush();
        }
    }
}

impl std::fmt::Debug for EventManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventManager")
            .field("error_handler", &self.error_handler.is_some())
            .field("warning_handler", &self.warning_handler.is_some())
            .field("info_handler", &self.info_handler.is_some())
            .finish_non_exhaustive()
    }
}

fn print_line(message: &str, out: &mut dyn Write) {
    let _ = writeln!(out, "{message}");
}

/// Events recorded by one session, in emission order.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<Event>,
    manager: Option<EventManager>,
}

impl EventLog {
    pub fn attach(&mut self, manager: EventManager) {
        self.manager = Some(manager);
    }

    pub fn emit(&mut self, level: EventLevel, message: impl Into<String>) {
        let event = Event {
            level,
            message: message.into(),
        };
        let message = event.message.as_str();
        match level {
            EventLevel::Error => tracing::error!(target: "j2k_roundtrip::codec", "{message}"),
            EventLevel::Warning => tracing::warn!(target: "j2k_roundtrip::codec", "{message}"),
            EventLevel::Info => tracing::info!(target: "j2k_roundtrip::codec", "{message}"),
        }
        if let Some(manager) = self.manager.as_mut() {
            manager.dispatch(&event);
        }
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn take(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn messages(&self, level: EventLevel) -> impl Iterator<Item = &str> {
        self.events
            .iter()
            .filter(move |e| e.level == level)
            .map(|e| e.message.as_str())
    }
}

/// A cloneable in-memory writer; every clone appends to the same buffer.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        String::from_utf8_lossy(&guard).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
