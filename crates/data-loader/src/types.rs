//! Core types for raw interaction logs.
//!
//! A log is nothing more than a sequence of "user touched item" events. The
//! identifiers are kept as the opaque strings found in the source; dense
//! integer indices are assigned later by the pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// Type Aliases
// =============================================================================

/// Raw user identifier as it appears in the log
pub type UserId = String;

/// Raw item identifier as it appears in the log
pub type ItemId = String;

/// Unix timestamp attached to an event, when the log carries one
pub type Timestamp = i64;

// =============================================================================
// Events
// =============================================================================

/// A single interaction event from the raw log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub user_id: UserId,
    pub item_id: ItemId,
    /// `None` when the log has no timestamp column
    pub timestamp: Option<Timestamp>,
}

impl RawEvent {
    pub fn new(user_id: impl Into<UserId>, item_id: impl Into<ItemId>) -> Self {
        Self {
            user_id: user_id.into(),
            item_id: item_id.into(),
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// How a delimited log file is laid out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFormat {
    /// Field separator, e.g. "," or "::"
    pub delimiter: String,
    /// Whether the first non-empty line is a header to skip
    pub has_header: bool,
}

impl Default for LogFormat {
    fn default() -> Self {
        Self {
            delimiter: ",".to_string(),
            has_header: true,
        }
    }
}

impl LogFormat {
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }
}

// =============================================================================
// EventLog
// =============================================================================

/// An owned, parsed event log
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<RawEvent>,
}

impl EventLog {
    pub fn new(events: Vec<RawEvent>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[RawEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<RawEvent> {
        self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Project every event down to its (user, item) pair
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.events
            .iter()
            .map(|e| (e.user_id.as_str(), e.item_id.as_str()))
    }

    /// Number of distinct users and items in the log
    pub fn counts(&self) -> (usize, usize) {
        let users: BTreeSet<&str> = self.events.iter().map(|e| e.user_id.as_str()).collect();
        let items: BTreeSet<&str> = self.events.iter().map(|e| e.item_id.as_str()).collect();
        (users.len(), items.len())
    }
}

impl From<Vec<RawEvent>> for EventLog {
    fn from(events: Vec<RawEvent>) -> Self {
        Self::new(events)
    }
}
