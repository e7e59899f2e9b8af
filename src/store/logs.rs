//! Dashboard log store
//!
//! Append-only, capped ring of log entries shown in the dashboard terminal.
//! Every entry is mirrored to `tracing` so the console and the rolling log
//! file carry the same history.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::{error, info, warn};

use crate::types::LogKind;

/// Maximum number of entries returned by a listing
pub const LOG_PAGE_SIZE: usize = 100;

/// Sink the bot core writes its log entries to
pub trait LogSink: Send + Sync {
    fn add_log(&self, kind: LogKind, message: &str);
}

/// One dashboard log line
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub message: String,
    pub timestamp: String,
}

struct LogBuffer {
    entries: VecDeque<LogEntry>,
    next_id: u64,
}

/// In-memory log store with a fixed capacity
pub struct LogStore {
    buffer: RwLock<LogBuffer>,
    capacity: usize,
}

impl LogStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: RwLock::new(LogBuffer {
                entries: VecDeque::with_capacity(capacity.min(1024)),
                next_id: 1,
            }),
            capacity: capacity.max(1),
        }
    }

    /// Newest entries first, at most `limit`
    pub fn recent(&self, limit: usize) -> Vec<LogEntry> {
        self.buffer
            .read()
            .entries
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.buffer.write().entries.clear();
        info!("Dashboard logs cleared");
    }

    pub fn len(&self) -> usize {
        self.buffer.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.read().entries.is_empty()
    }
}

impl LogSink for LogStore {
    fn add_log(&self, kind: LogKind, message: &str) {
        match kind {
            LogKind::Info => info!("[Bot] {}", message),
            LogKind::Warning => warn!("[Bot] {}", message),
            LogKind::Error => error!("[Bot] {}", message),
            LogKind::Chat => info!("[Chat] {}", message),
        }

        let timestamp = chrono::Local::now().format("%H:%M:%S").to_string();
        let mut buffer = self.buffer.write();
        let id = buffer.next_id;
        buffer.next_id += 1;
        buffer.entries.push_back(LogEntry {
            id,
            kind,
            message: message.to_string(),
            timestamp,
        });
        while buffer.entries.len() > self.capacity {
            buffer.entries.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_is_newest_first() {
        let store = LogStore::new(10);
        store.add_log(LogKind::Info, "first");
        store.add_log(LogKind::Chat, "second");

        let entries = store.recent(LOG_PAGE_SIZE);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "second");
        assert_eq!(entries[0].kind, LogKind::Chat);
        assert_eq!(entries[1].message, "first");
        assert!(entries[0].id > entries[1].id);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let store = LogStore::new(3);
        for i in 0..5 {
            store.add_log(LogKind::Info, &format!("line {}", i));
        }

        assert_eq!(store.len(), 3);
        let entries = store.recent(10);
        assert_eq!(entries.last().unwrap().message, "line 2");
    }

    #[test]
    fn test_clear() {
        let store = LogStore::new(3);
        store.add_log(LogKind::Error, "boom");
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_entry_serializes_type_field() {
        let store = LogStore::new(3);
        store.add_log(LogKind::Warning, "careful");
        let json = serde_json::to_value(&store.recent(1)[0]).unwrap();
        assert_eq!(json["type"], "warning");
        assert_eq!(json["message"], "careful");
    }
}
