//! Activity log
//!
//! Bounded newest-first ring of human-readable events for the operator
//! surfaces. Not an audit trail; entries past the cap are simply gone.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// One logged event
#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Newest-first ring of activity entries
pub struct ActivityLog {
    entries: VecDeque<ActivityEntry>,
    cap: usize,
}

impl ActivityLog {
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Record an event, evicting the oldest entry past the cap
    pub fn push(&mut self, message: impl Into<String>) {
        self.entries.push_front(ActivityEntry {
            timestamp: Utc::now(),
            message: message.into(),
        });
        while self.entries.len() > self.cap {
            self.entries.pop_back();
        }
    }

    /// All entries, newest first
    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newest_first_and_capped() {
        let mut log = ActivityLog::new(3);
        for i in 0..5 {
            log.push(format!("event {}", i));
        }

        let entries = log.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].message, "event 4");
        assert_eq!(entries[2].message, "event 2");
    }
}
