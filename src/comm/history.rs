use crate::comm::diagnostics::{Diagnostic, DiagnosticSink};
use crate::comm::message::{Message, SYSTEM_AUTHOR};
use crate::comm::store::KvStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::rc::Rc;

pub const HISTORY_KEY: &str = "commHistoryV1";
pub const DEFAULT_MAX_HISTORY: usize = 1000;

/// Persisted shape of one entry; ids and colors are not kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub username: String,
    pub time: String,
    pub message: String,
}

pub struct HistoryStore {
    store: Rc<dyn KvStore>,
    max_entries: usize,
    sink: Rc<dyn DiagnosticSink>,
}

fn string_field(entry: &Value, field: &str) -> String {
    entry
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

impl HistoryStore {
    pub fn new(store: Rc<dyn KvStore>, max_entries: usize, sink: Rc<dyn DiagnosticSink>) -> Self {
        Self {
            store,
            max_entries,
            sink,
        }
    }

    /// Stored entries in order. Missing or malformed payloads load as empty.
    pub fn load(&self) -> Vec<Message> {
        let raw = match self.store.get(HISTORY_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                self.sink
                    .report(Diagnostic::storage("history-load", format!("{err:#}")));
                return Vec::new();
            }
        };

        let parsed = match serde_json::from_str::<Value>(&raw) {
            Ok(value) => value,
            Err(err) => {
                self.sink
                    .report(Diagnostic::malformed("history-load", err.to_string()));
                return Vec::new();
            }
        };
        let Some(entries) = parsed.as_array() else {
            self.sink.report(Diagnostic::malformed(
                "history-load",
                "payload is not an array",
            ));
            return Vec::new();
        };

        let mut out = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            if !entry.is_object() {
                self.sink.report(Diagnostic::parse_skip(
                    "history-load",
                    format!("entry={index} is not an object"),
                ));
                continue;
            }
            let mut username = string_field(entry, "username");
            if username.is_empty() {
                username = SYSTEM_AUTHOR.to_string();
            }
            let message = string_field(entry, "message");
            if message.trim().is_empty() {
                continue;
            }
            out.push(Message::authored(username, string_field(entry, "time"), message));
        }
        out
    }

    pub fn payload(&self, log: &[Message]) -> Vec<StoredMessage> {
        let persistable: Vec<&Message> = log.iter().filter(|m| !m.is_local()).collect();
        let skip = persistable.len().saturating_sub(self.max_entries);
        persistable
            .into_iter()
            .skip(skip)
            .map(|m| StoredMessage {
                username: m.username.clone(),
                time: m.time.clone(),
                message: m.message.clone(),
            })
            .collect()
    }

    /// Best effort; returns whether the payload was written.
    pub fn save(&self, log: &[Message]) -> bool {
        let payload = self.payload(log);
        let data = match serde_json::to_string(&payload) {
            Ok(data) => data,
            Err(err) => {
                self.sink
                    .report(Diagnostic::storage("history-save", err.to_string()));
                return false;
            }
        };
        match self.store.set(HISTORY_KEY, &data) {
            Ok(()) => true,
            Err(err) => {
                self.sink
                    .report(Diagnostic::storage("history-save", format!("{err:#}")));
                false
            }
        }
    }

    /// Drops the stored payload only; the caller owns the in-memory log.
    pub fn clear(&self) -> bool {
        match self.store.remove(HISTORY_KEY) {
            Ok(()) => true,
            Err(err) => {
                self.sink
                    .report(Diagnostic::storage("history-clear", format!("{err:#}")));
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::diagnostics::{DiagnosticKind, RecordingSink};
    use crate::comm::store::memory::MemoryStore;

    fn history(store: &MemoryStore, sink: &Rc<RecordingSink>) -> HistoryStore {
        HistoryStore::new(
            Rc::new(store.clone()),
            DEFAULT_MAX_HISTORY,
            sink.clone(),
        )
    }

    #[test]
    fn save_caps_to_most_recent_entries() {
        let store = MemoryStore::default();
        let sink = Rc::new(RecordingSink::default());
        let log: Vec<Message> = (0..1500)
            .map(|i| Message::authored("Alice", "1:00 PM", format!("msg {i}")))
            .collect();

        assert!(history(&store, &sink).save(&log));

        let raw = store.raw(HISTORY_KEY).expect("payload");
        let saved: Vec<StoredMessage> = serde_json::from_str(&raw).expect("json");
        assert_eq!(saved.len(), 1000);
        assert_eq!(saved[0].message, "msg 500");
        assert_eq!(saved[999].message, "msg 1499");
    }

    #[test]
    fn save_drops_local_notices_and_ids() {
        let store = MemoryStore::default();
        let sink = Rc::new(RecordingSink::default());
        let log = vec![
            Message::authored("Alice", "1:00 PM", "hi").with_id("77"),
            Message::local_notice("Friends: (none)"),
        ];
        history(&store, &sink).save(&log);
        let raw = store.raw(HISTORY_KEY).expect("payload");
        assert_eq!(raw, r#"[{"username":"Alice","time":"1:00 PM","message":"hi"}]"#);
    }

    #[test]
    fn save_failure_is_reported_not_raised() {
        let store = MemoryStore::failing_writes();
        let sink = Rc::new(RecordingSink::default());
        let saved = history(&store, &sink).save(&[Message::system("x")]);
        assert!(!saved);
        assert_eq!(sink.count(DiagnosticKind::StorageSoftFail), 1);
    }

    #[test]
    fn load_defaults_missing_fields_and_skips_junk() {
        let store = MemoryStore::default();
        store.put(
            HISTORY_KEY,
            r#"[{"message":"boot"},{"username":"Bob","time":"2:00 PM","message":"yo"},7,{"username":"Eve"}]"#,
        );
        let sink = Rc::new(RecordingSink::default());
        let loaded = history(&store, &sink).load();
        assert_eq!(
            loaded,
            vec![
                Message::authored(SYSTEM_AUTHOR, "", "boot"),
                Message::authored("Bob", "2:00 PM", "yo"),
            ]
        );
        assert_eq!(sink.count(DiagnosticKind::ParseSkip), 1);
    }

    #[test]
    fn malformed_payload_loads_empty() {
        let store = MemoryStore::default();
        store.put(HISTORY_KEY, r#"{"not":"an array"}"#);
        let sink = Rc::new(RecordingSink::default());
        assert!(history(&store, &sink).load().is_empty());
        assert_eq!(sink.count(DiagnosticKind::MalformedConfig), 1);
    }

    #[test]
    fn clear_removes_payload() {
        let store = MemoryStore::default();
        store.put(HISTORY_KEY, "[]");
        let sink = Rc::new(RecordingSink::default());
        assert!(history(&store, &sink).clear());
        assert!(store.raw(HISTORY_KEY).is_none());
    }
}
