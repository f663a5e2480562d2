//! Processing log
//!
//! Every pipeline run leaves an append-only trail of timestamped entries.
//! Entries are also emitted as tracing events so the server log and the
//! UI log tell the same story.

use crate::models::{LogEntry, LogLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, info, warn};

/// Subsystem tag shown next to each entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogTag {
    Encrypt,
    Ipfs,
    Zkproof,
    Aura,
    Lender,
    Plutus,
    System,
}

impl LogTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogTag::Encrypt => "ENCRYPT",
            LogTag::Ipfs => "IPFS",
            LogTag::Zkproof => "ZKPROOF",
            LogTag::Aura => "AURA",
            LogTag::Lender => "LENDER",
            LogTag::Plutus => "PLUTUS",
            LogTag::System => "SYSTEM",
        }
    }
}

impl fmt::Display for LogTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `HH:MM:SS.mmm` in UTC for a millisecond clock reading
pub fn clock_timestamp(now_ms: u64) -> String {
    let at = i64::try_from(now_ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_default();
    at.format("%H:%M:%S%.3f").to_string()
}

/// Build an entry and mirror it into tracing
pub fn record(
    now_ms: u64,
    level: LogLevel,
    tag: LogTag,
    message: impl Into<String>,
    data: Option<serde_json::Value>,
) -> LogEntry {
    let entry = LogEntry {
        timestamp: clock_timestamp(now_ms),
        level,
        stage: tag.as_str().to_string(),
        message: message.into(),
        data,
    };
    trace_entry(&entry);
    entry
}

fn trace_entry(entry: &LogEntry) {
    let stage = entry.stage.as_str();
    let message = entry.message.as_str();
    match entry.level {
        LogLevel::Error => error!(stage, data = ?entry.data, "{}", message),
        LogLevel::Warning => warn!(stage, data = ?entry.data, "{}", message),
        LogLevel::Debug => debug!(stage, data = ?entry.data, "{}", message),
        LogLevel::Info | LogLevel::Success => info!(stage, data = ?entry.data, "{}", message),
    }
}

pub fn level_prefix(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Success => "[OK]",
        LogLevel::Error => "[ERR]",
        LogLevel::Warning => "[WARN]",
        LogLevel::Debug => "[DBG]",
        LogLevel::Info => "[INFO]",
    }
}

/// Terminal rendering: `12:00:01.250 [OK] [IPFS] Pinned successfully`
pub fn render_line(entry: &LogEntry) -> String {
    let mut line = format!(
        "{} {} [{}] {}",
        entry.timestamp,
        level_prefix(entry.level),
        entry.stage,
        entry.message
    );
    if let Some(data) = &entry.data {
        line.push(' ');
        line.push_str(&data.to_string());
    }
    line
}

/// Tracks how much of a growing log has been handed out already
#[derive(Debug, Default)]
pub struct LogCursor {
    printed: usize,
}

impl LogCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries not yet returned. A shorter log means a reset, so it starts over.
    pub fn advance<'a>(&mut self, logs: &'a [LogEntry]) -> &'a [LogEntry] {
        if logs.len() < self.printed {
            self.printed = 0;
        }
        let fresh = &logs[self.printed..];
        self.printed = logs.len();
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clock_timestamp_format() {
        assert_eq!(clock_timestamp(0), "00:00:00.000");
        // 1h 2m 3.045s
        assert_eq!(clock_timestamp(3_723_045), "01:02:03.045");
        // wraps at midnight
        assert_eq!(clock_timestamp(86_400_000 + 1), "00:00:00.001");
    }

    #[test]
    fn test_record_fills_entry() {
        let entry = record(
            1_500,
            LogLevel::Success,
            LogTag::Ipfs,
            "Pinned successfully",
            Some(json!({ "cid": "bafybei..." })),
        );

        assert_eq!(entry.timestamp, "00:00:01.500");
        assert_eq!(entry.stage, "IPFS");
        assert_eq!(entry.level, LogLevel::Success);
        assert_eq!(entry.message, "Pinned successfully");
    }

    #[test]
    fn test_render_line() {
        let entry = record(0, LogLevel::Error, LogTag::System, "boom", None);
        assert_eq!(render_line(&entry), "00:00:00.000 [ERR] [SYSTEM] boom");

        let entry = record(0, LogLevel::Info, LogTag::Lender, "Decision", Some(json!({"a": 1})));
        assert_eq!(render_line(&entry), r#"00:00:00.000 [INFO] [LENDER] Decision {"a":1}"#);
    }

    #[test]
    fn test_tags_serialize_uppercase() {
        assert_eq!(serde_json::to_value(LogTag::Zkproof).unwrap(), json!("ZKPROOF"));
        assert_eq!(LogTag::Plutus.to_string(), "PLUTUS");
    }

    #[test]
    fn test_cursor_returns_only_new_entries() {
        let mut logs = vec![
            record(0, LogLevel::Info, LogTag::Encrypt, "one", None),
            record(0, LogLevel::Info, LogTag::Encrypt, "two", None),
        ];
        let mut cursor = LogCursor::new();
        assert_eq!(cursor.advance(&logs).len(), 2);
        assert!(cursor.advance(&logs).is_empty());

        logs.push(record(0, LogLevel::Success, LogTag::System, "three", None));
        let fresh = cursor.advance(&logs);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].message, "three");
    }

    #[test]
    fn test_cursor_starts_over_after_reset() {
        let logs: Vec<LogEntry> = (0..3)
            .map(|i| record(0, LogLevel::Info, LogTag::Ipfs, format!("old {}", i), None))
            .collect();
        let mut cursor = LogCursor::new();
        cursor.advance(&logs);

        let restarted = vec![record(0, LogLevel::Info, LogTag::Encrypt, "new", None)];
        let fresh = cursor.advance(&restarted);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].message, "new");
    }
}
