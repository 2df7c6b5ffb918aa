//! Raw IDE interaction events as delivered by upstream collectors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::completion::CompletionPayload;
use crate::types::SessionId;

/// One recorded IDE interaction.
///
/// Events are produced upstream and consumed exactly once by this core;
/// nothing here mutates them. The trigger timestamp is optional at this
/// level because upstream logs do contain events without one — the
/// `NoTimeFilter` removes those before any interval processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier for this event.
    pub id: String,
    /// The IDE session this event was recorded in.
    pub session_id: SessionId,
    /// When the interaction started.
    pub triggered_at: Option<DateTime<Utc>>,
    /// When the interaction finished, for events with a duration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminated_at: Option<DateTime<Utc>>,
    /// Version string of the collector that produced this event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    /// Kind-specific payload.
    pub kind: EventKind,
}

impl Event {
    /// Event duration in milliseconds; zero when either timestamp is absent.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        match (self.triggered_at, self.terminated_at) {
            (Some(start), Some(end)) => (end - start).num_milliseconds(),
            _ => 0,
        }
    }

    /// The activity tag, for window events; `Other` for everything else.
    #[must_use]
    pub fn activity(&self) -> Activity {
        match &self.kind {
            EventKind::Window { activity, .. } => *activity,
            _ => Activity::Other,
        }
    }

    /// The active window name, for window events.
    #[must_use]
    pub fn active_window(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Window { window, .. } => Some(window),
            _ => None,
        }
    }
}

/// The kind of interaction captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// The active window changed, or the developer entered/left the IDE.
    Window {
        /// Name of the window that became active.
        window: String,
        /// Enter/leave tag; `Other` for plain window switches.
        #[serde(default)]
        activity: Activity,
    },
    /// A code-completion session ran to termination.
    Completion(CompletionPayload),
    /// A named IDE command was invoked.
    Command { command: String },
    /// Any other interaction; carried through untyped.
    Other,
}

/// Activity tag attached to window events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    /// Focus returned to the IDE.
    EnterIde,
    /// Focus left the IDE.
    LeaveIde,
    #[default]
    Other,
}
