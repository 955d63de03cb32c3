//! Append-only station transcript.
//!
//! Entries are only ever pushed to the back.  There is no edit, removal,
//! reordering or dedup; insertion order is the only ordering guarantee.

use chrono::{DateTime, Local};
use clawfm_proto::protocol::{LogEntry, LogKind};

pub const AUTHOR_AGENT: &str = "HOST_AGENT";
pub const AUTHOR_TOOL: &str = "MCP_SERVER";
pub const AUTHOR_ADMIN: &str = "SYS_ADMIN";
pub const AUTHOR_USER: &str = "HUMAN_OBSERVER";

/// Wall-clock source for entry timestamps.
pub trait Clock: Send {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// An entry before the stream stamps it with an id and a time.
#[derive(Debug, Clone, PartialEq)]
pub struct LogDraft {
    pub author: &'static str,
    pub kind: LogKind,
    pub content: String,
}

impl LogDraft {
    pub fn new(author: &'static str, kind: LogKind, content: impl Into<String>) -> Self {
        Self {
            author,
            kind,
            content: content.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct LogStream {
    entries: Vec<LogEntry>,
    next_seq: u64,
}

impl LogStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp `draft` and push it to the end.  Returns the stored entry.
    pub fn append(&mut self, draft: LogDraft, now: DateTime<Local>) -> &LogEntry {
        self.next_seq += 1;
        let entry = LogEntry {
            id: format!("log-{:06}", self.next_seq),
            author: draft.author.to_string(),
            kind: draft.kind,
            content: draft.content,
            timestamp: now.format("%H:%M:%S").to_string(),
        };
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Restartable, finite view over the full history so far.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> + '_ {
        self.entries.iter()
    }

    /// Entries appended after the first `offset`.
    pub fn since(&self, offset: usize) -> &[LogEntry] {
        self.entries.get(offset..).unwrap_or(&[])
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_append_preserves_order_and_stamps() {
        let mut log = LogStream::new();
        log.append(LogDraft::new(AUTHOR_ADMIN, LogKind::System, "boot"), at(9, 5, 7));
        log.append(LogDraft::new(AUTHOR_USER, LogKind::User, "hi"), at(9, 5, 8));
        log.append(LogDraft::new(AUTHOR_USER, LogKind::User, "hi"), at(9, 5, 8));

        let contents: Vec<&str> = log.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["boot", "hi", "hi"]);
        assert_eq!(log.iter().next().unwrap().timestamp, "09:05:07");
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_ids_are_unique() {
        let mut log = LogStream::new();
        for i in 0..50 {
            log.append(
                LogDraft::new(AUTHOR_AGENT, LogKind::Agent, format!("{i}")),
                at(10, 0, 0),
            );
        }
        let ids: HashSet<&str> = log.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn test_view_is_restartable() {
        let mut log = LogStream::new();
        log.append(LogDraft::new(AUTHOR_TOOL, LogKind::Tool, "a"), at(1, 2, 3));
        let first: Vec<_> = log.iter().cloned().collect();
        let second: Vec<_> = log.iter().cloned().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_since_handles_out_of_range() {
        let mut log = LogStream::new();
        log.append(LogDraft::new(AUTHOR_TOOL, LogKind::Tool, "a"), at(1, 2, 3));
        log.append(LogDraft::new(AUTHOR_TOOL, LogKind::Tool, "b"), at(1, 2, 4));
        assert_eq!(log.since(1).len(), 1);
        assert_eq!(log.since(1)[0].content, "b");
        assert!(log.since(2).is_empty());
        assert!(log.since(99).is_empty());
    }
}
