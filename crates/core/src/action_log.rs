//! Fire-and-forget log of user actions.
//!
//! Recording never fails and never blocks the editor; sinks that cannot
//! deliver an event drop it.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAction {
    DocumentLoaded,
    DocumentClosed,
    TextAdded,
    ShapeAdded,
    AnnotationRemoved,
    ExportStarted,
    ExportFinished,
    ExportFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEvent {
    /// RFC 3339 timestamp
    pub timestamp: String,
    pub action: UserAction,
    pub file_name: String,
    pub elements_count: usize,
    pub details: serde_json::Value,
}

impl ActionEvent {
    /// Entry stamped with the current time.
    pub fn new(action: UserAction, file_name: Option<&str>, elements_count: usize) -> Self {
        Self::at(Utc::now(), action, file_name, elements_count)
    }

    /// Entry stamped with `time` instead of the current clock.
    pub fn at(
        time: DateTime<Utc>,
        action: UserAction,
        file_name: Option<&str>,
        elements_count: usize,
    ) -> Self {
        Self {
            timestamp: time.to_rfc3339_opts(SecondsFormat::Millis, true),
            action,
            file_name: file_name.unwrap_or("N/A").to_owned(),
            elements_count,
            details: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    /// Attach action-specific details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

pub trait ActionLog: Send + Sync {
    fn record(&self, event: ActionEvent);
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopActionLog;

impl ActionLog for NoopActionLog {
    fn record(&self, _event: ActionEvent) {}
}

/// Emits each event as a JSON `info` record on the `action_log` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingActionLog;

impl ActionLog for TracingActionLog {
    fn record(&self, event: ActionEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => tracing::info!(target: "action_log", event = %json, "user action"),
            Err(err) => tracing::debug!(target: "action_log", %err, "dropped action event"),
        }
    }
}

/// Keeps events in memory, for hosts that forward them in batches.
#[derive(Debug, Default)]
pub struct MemoryActionLog {
    events: Mutex<Vec<ActionEvent>>,
}

impl MemoryActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns the recorded events.
    pub fn drain(&self) -> Vec<ActionEvent> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl ActionLog for MemoryActionLog {
    fn record(&self, event: ActionEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
