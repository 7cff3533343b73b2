//! Notification system: fans short messages out to best-effort sinks.
//! Lightweight: no queues. A sink failure is logged and otherwise ignored.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use autopower_core::NotificationSink;

const HISTORY_LIMIT: usize = 100;

/// A notification shown to the user.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub timestamp: chrono::DateTime<chrono::Local>,
}

/// Sink that writes notifications to the log.
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, title: &str, body: &str) -> Result<(), String> {
        tracing::info!("📢 {title}: {body}");
        Ok(())
    }
}

/// Notification router: delivers to every sink and keeps a short history.
pub struct NotifyRouter {
    sinks: Vec<Arc<dyn NotificationSink>>,
    /// In-memory ring buffer, newest last.
    history: Mutex<VecDeque<Notification>>,
}

impl NotifyRouter {
    pub fn new() -> Self {
        Self {
            sinks: Vec::new(),
            history: Mutex::new(VecDeque::new()),
        }
    }

    /// Register a sink.
    pub fn register(&mut self, sink: Arc<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    /// Record and deliver a notification.
    pub fn send(&self, title: &str, body: &str) {
        for sink in &self.sinks {
            if let Err(e) = sink.notify(title, body) {
                tracing::warn!("⚠️ Notification sink failed: {e}");
            }
        }
        if let Ok(mut history) = self.history.lock() {
            history.push_back(Notification {
                title: title.to_string(),
                body: body.to_string(),
                timestamp: chrono::Local::now(),
            });
            if history.len() > HISTORY_LIMIT {
                history.pop_front();
            }
        }
    }

    /// Snapshot of the notification history, oldest first.
    pub fn history(&self) -> Vec<Notification> {
        self.history
            .lock()
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for NotifyRouter {
    fn default() -> Self {
        Self::new()
    }
}
