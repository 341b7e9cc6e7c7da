//! Transient user notifications.
//!
//! The terminal equivalent of a toast: one line on stderr, prefixed with a
//! check mark or a cross. Errors are also logged through `tracing` so they
//! survive `enable_notifications = false`.

use std::io::Write;

/// Toasts kept in [`Toaster::history`]; older ones are dropped.
pub const HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
}

/// Where toasts go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastSink {
    Stderr,
    /// Recorded in history only.
    Silent,
}

#[derive(Debug)]
pub struct Toaster {
    enabled: bool,
    sink: ToastSink,
    history: Vec<Toast>,
}

impl Toaster {
    pub fn new(enabled: bool, sink: ToastSink) -> Self {
        Self {
            enabled,
            sink,
            history: Vec::new(),
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(ToastKind::Success, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(toast = %message, "operation failed");
        self.push(ToastKind::Error, message);
    }

    /// The most recent toasts, oldest first, at most [`HISTORY_LIMIT`].
    pub fn history(&self) -> &[Toast] {
        &self.history
    }

    pub fn last(&self) -> Option<&Toast> {
        self.history.last()
    }

    fn push(&mut self, kind: ToastKind, message: String) {
        if !self.enabled {
            return;
        }
        if self.sink == ToastSink::Stderr {
            let mark = match kind {
                ToastKind::Success => "✓",
                ToastKind::Error => "✗",
            };
            let _ = writeln!(std::io::stderr(), "{} {}", mark, message);
        }
        if self.history.len() == HISTORY_LIMIT {
            self.history.remove(0);
        }
        self.history.push(Toast { kind, message });
    }
}
