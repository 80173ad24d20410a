//! Bounded log of heartbeat traffic

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Where a log entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
    /// Lifecycle and error notices generated locally
    System,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Direction::Sent => "sent",
            Direction::Received => "received",
            Direction::System => "system",
        };
        f.write_str(label)
    }
}

/// One sent, received or system event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    /// Frame payload exactly as sent or received
    pub raw_text: String,
}

impl LogEntry {
    pub fn new(direction: Direction, raw_text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            direction,
            raw_text: raw_text.into(),
        }
    }

    pub fn sent(raw_text: impl Into<String>) -> Self {
        Self::new(Direction::Sent, raw_text)
    }

    pub fn received(raw_text: impl Into<String>) -> Self {
        Self::new(Direction::Received, raw_text)
    }

    pub fn system(raw_text: impl Into<String>) -> Self {
        Self::new(Direction::System, raw_text)
    }

    /// Pretty-printed JSON when the payload parses, the raw text otherwise
    pub fn display_text(&self) -> String {
        match serde_json::from_str::<serde_json::Value>(&self.raw_text) {
            Ok(value) if value.is_object() || value.is_array() => {
                serde_json::to_string_pretty(&value).unwrap_or_else(|_| self.raw_text.clone())
            }
            _ => self.raw_text.clone(),
        }
    }
}

/// Ring buffer of log entries; the oldest entry is evicted once full
#[derive(Debug, Clone)]
pub struct HeartbeatLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl Default for HeartbeatLog {
    fn default() -> Self {
        Self::with_capacity(crate::defaults::HEARTBEAT_LOG_CAPACITY)
    }
}

impl HeartbeatLog {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, entry: LogEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Entries in display order, most recent first
    pub fn newest_first(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().rev()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.back()
    }
}
