//! Loki push API payload.
//!
//! Refer <https://grafana.com/docs/loki/latest/reference/loki-http-api/#ingest-logs>.

use crate::record::LogEntry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRequest {
    pub streams: Vec<Stream>,
}

/// Log lines sharing one label set. Each value is `[unix_nanos, line]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    pub stream: BTreeMap<String, String>,
    pub values: Vec<[String; 2]>,
}

impl PushRequest {
    /// Group `entries` by their effective label set: `labels` overlaid with
    /// each entry's own labels. Streams appear in order of first use and
    /// values keep enqueue order.
    pub fn from_entries(labels: &BTreeMap<String, String>, entries: &[LogEntry]) -> Self {
        let mut streams: Vec<Stream> = Vec::new();
        let mut index: HashMap<BTreeMap<String, String>, usize> = HashMap::new();

        for entry in entries {
            let value = [entry.timestamp.to_string(), entry.line()];

            let effective = if entry.labels.is_empty() {
                labels.clone()
            } else {
                let mut merged = labels.clone();
                merged.extend(entry.labels.iter().map(|(k, v)| (k.clone(), v.clone())));
                merged
            };

            match index.get(&effective) {
                Some(&i) => streams[i].values.push(value),
                None => {
                    index.insert(effective.clone(), streams.len());
                    streams.push(Stream {
                        stream: effective,
                        values: vec![value],
                    });
                }
            }
        }

        PushRequest { streams }
    }

    pub fn entry_count(&self) -> usize {
        self.streams.iter().map(|s| s.values.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn entry(ts: i64, line: &str, extra: &[(&str, &str)]) -> LogEntry {
        LogEntry {
            timestamp: ts,
            payload: line.as_bytes().to_vec(),
            labels: labels(extra),
        }
    }

    #[test]
    fn serializes_to_push_json() {
        let base = labels(&[("app", "api")]);
        let request = PushRequest::from_entries(&base, &[entry(1, "first", &[]), entry(2, "second", &[])]);

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "streams": [{
                    "stream": {"app": "api"},
                    "values": [["1", "first"], ["2", "second"]]
                }]
            })
        );
    }

    #[test]
    fn entry_labels_override_and_split_streams() {
        let base = labels(&[("app", "api"), ("env", "dev")]);
        let entries = [
            entry(1, "a", &[]),
            entry(2, "b", &[("env", "prod")]),
            entry(3, "c", &[]),
            entry(4, "d", &[("env", "prod")]),
        ];

        let request = PushRequest::from_entries(&base, &entries);

        assert_eq!(request.streams.len(), 2);
        assert_eq!(request.streams[0].stream, base);
        assert_eq!(
            request.streams[0].values,
            vec![["1".to_string(), "a".to_string()], ["3".to_string(), "c".to_string()]]
        );
        assert_eq!(request.streams[1].stream, labels(&[("app", "api"), ("env", "prod")]));
        assert_eq!(request.entry_count(), 4);
    }

    #[test]
    fn empty_batch_has_no_streams() {
        let request = PushRequest::from_entries(&BTreeMap::new(), &[]);
        assert!(request.streams.is_empty());
        assert_eq!(serde_json::to_string(&request).unwrap(), r#"{"streams":[]}"#);
    }
}
