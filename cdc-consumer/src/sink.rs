use std::io::{self, Write};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::log_entry::LogEntry;

/// Destination for the record stream. Implementations must be callable concurrently, one call
/// per record, each call independent of the others.
pub trait LogSink: Send + Sync {
    fn emit(&self, entry: &LogEntry) -> io::Result<()>;
}

#[derive(Serialize)]
struct Record<'a> {
    timestamp: String,
    #[serde(flatten)]
    entry: &'a LogEntry,
}

/// ISO-8601 UTC with millisecond precision, e.g. `2024-05-01T12:00:00.123Z`.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Serializes an entry as a single JSON line (no trailing newline), stamped with the current time.
pub fn render(entry: &LogEntry) -> serde_json::Result<String> {
    serde_json::to_string(&Record {
        timestamp: timestamp(),
        entry,
    })
}

/// Newline-delimited JSON on the process's standard streams.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdioSink;

impl LogSink for StdioSink {
    fn emit(&self, entry: &LogEntry) -> io::Result<()> {
        let line = render(entry)?;
        if entry.is_error() {
            writeln!(io::stderr().lock(), "{line}")
        } else {
            writeln!(io::stdout().lock(), "{line}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_entry::SkipReason;
    use crate::session::RawMessage;
    use chrono::DateTime;

    #[test]
    fn rendered_record_is_one_timestamped_line() {
        let message = RawMessage {
            topic: "users".to_string(),
            partition: 2,
            offset: 10,
            payload: None,
        };
        let entry = LogEntry::skipped(
            &message,
            SkipReason::NonJsonPayload,
            Some("line one\nline two".to_string()),
        );

        let line = render(&entry).unwrap();
        assert!(!line.contains('\n'));
        assert!(line.starts_with(r#"{"timestamp":""#));

        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        let timestamp = value["timestamp"].as_str().unwrap();
        assert!(timestamp.ends_with('Z'));
        assert!(DateTime::parse_from_rfc3339(timestamp).is_ok());
        assert_eq!(value["preview"], "line one\nline two");
    }
}
