use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    SchedulerStarted,
    SchedulerStopped,
    TitleUpdated,
    CycleFailed,
    TickSkipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: ActivityKind,
    pub message: String,
}

impl std::fmt::Display for ActivityEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.message
        )
    }
}

/// Recent engine activity for display, oldest first. Old entries are
/// discarded once `capacity` is reached.
#[derive(Debug)]
pub struct ActivityLog {
    entries: Mutex<VecDeque<ActivityEntry>>,
    capacity: usize,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn record(&self, kind: ActivityKind, message: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        let entry = ActivityEntry {
            timestamp: Utc::now(),
            kind,
            message: message.into(),
        };
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn latest(&self) -> Option<ActivityEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .back()
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_newest_entries() {
        let log = ActivityLog::new(3);
        for i in 0..5 {
            log.record(ActivityKind::TitleUpdated, format!("title {}", i));
        }
        let messages: Vec<String> = log.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["title 2", "title 3", "title 4"]);
        assert_eq!(log.latest().unwrap().message, "title 4");
    }

    #[test]
    fn test_zero_capacity_records_nothing() {
        let log = ActivityLog::new(0);
        log.record(ActivityKind::CycleFailed, "ignored");
        assert!(log.is_empty());
    }

    #[test]
    fn test_display() {
        let log = ActivityLog::new(1);
        log.record(ActivityKind::SchedulerStarted, "Started");
        let line = log.latest().unwrap().to_string();
        assert!(line.starts_with('['));
        assert!(line.ends_with("] Started"));
    }
}
