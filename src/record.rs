use chrono::Utc;
use std::collections::BTreeMap;

/// A single buffered log line waiting to be pushed.
///
/// `labels` holds entry-scoped overrides merged on top of the sink labels at
/// serialization time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Nanoseconds since the Unix epoch, captured at write time.
    pub timestamp: i64,
    pub payload: Vec<u8>,
    pub labels: BTreeMap<String, String>,
}

impl LogEntry {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self::with_labels(payload, BTreeMap::new())
    }

    pub fn with_labels(payload: impl Into<Vec<u8>>, labels: BTreeMap<String, String>) -> Self {
        Self {
            timestamp: now_nanos(),
            payload: payload.into(),
            labels,
        }
    }

    /// Payload as a Loki log line. Invalid UTF-8 is replaced.
    pub fn line(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

fn now_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamps_entries_in_nanoseconds() {
        let before = Utc::now().timestamp_nanos_opt().unwrap();
        let entry = LogEntry::new("hello");
        let after = Utc::now().timestamp_nanos_opt().unwrap();

        assert!(entry.timestamp >= before && entry.timestamp <= after);
        assert_eq!(entry.line(), "hello");
        assert!(entry.labels.is_empty());
    }

    #[test]
    fn lossy_line_for_invalid_utf8() {
        let entry = LogEntry::new(vec![b'o', b'k', 0xff]);
        assert_eq!(entry.line(), "ok\u{fffd}");
    }
}
