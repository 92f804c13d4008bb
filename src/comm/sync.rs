use crate::comm::engine::Engine;
use crate::comm::feed::{ExtractionSource, FeedSnapshot, extract_snapshot};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub source: ExtractionSource,
    pub candidates: usize,
    pub added: usize,
    pub persisted: bool,
    pub total: usize,
}

/// One synchronization pass: extract (structured, else lines), merge, persist.
pub fn run_pass(engine: &mut Engine, snapshot: &FeedSnapshot, blacklist: &BTreeSet<String>) -> SyncOutcome {
    let extraction = extract_snapshot(snapshot, blacklist, engine.sink());
    let merged = engine.merge(&extraction.candidates);
    SyncOutcome {
        source: extraction.source,
        candidates: extraction.candidates.len(),
        added: merged.added,
        persisted: merged.persisted,
        total: engine.messages().len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::diagnostics::RecordingSink;
    use crate::comm::lines::default_blacklist;
    use crate::comm::store::memory::MemoryStore;
    use serde_json::json;
    use std::rc::Rc;

    fn engine() -> Engine {
        Engine::new(
            Rc::new(MemoryStore::default()),
            Rc::new(MemoryStore::default()),
            1000,
            Rc::new(RecordingSink::default()),
        )
    }

    #[test]
    fn rerendered_feed_adds_only_new_messages() {
        let mut e = engine();
        let first = FeedSnapshot {
            nodes: vec![
                json!({"id": "2", "authorLabel": "Bob", "timeLabel": "1:01 PM", "bodyText": "two"}),
                json!({"id": "1", "authorLabel": "Alice", "timeLabel": "1:00 PM", "bodyText": "one"}),
            ],
            text: None,
        };
        let out = run_pass(&mut e, &first, &default_blacklist());
        assert_eq!(out.added, 2);
        assert!(out.persisted);

        let second = FeedSnapshot {
            nodes: vec![
                json!({"id": "3", "authorLabel": "Cara", "timeLabel": "1:02 PM", "bodyText": "three"}),
                json!({"id": "2", "authorLabel": "Bob", "timeLabel": "1:01 PM", "bodyText": "two"}),
            ],
            text: None,
        };
        let out = run_pass(&mut e, &second, &default_blacklist());
        assert_eq!(out.added, 1);
        assert_eq!(out.total, 3);
        let bodies: Vec<_> = e.messages().iter().map(|m| m.message.as_str()).collect();
        assert_eq!(bodies, vec!["one", "two", "three"]);
    }

    #[test]
    fn fallback_is_decided_per_pass() {
        let mut e = engine();
        let degraded = FeedSnapshot::from_text("000123\n3:45 PM\nAlice\nhello world");
        let out = run_pass(&mut e, &degraded, &default_blacklist());
        assert_eq!(out.source, ExtractionSource::Lines);
        assert_eq!(out.added, 1);

        let structured = FeedSnapshot {
            nodes: vec![json!({"id": "9", "authorLabel": "Bob", "bodyText": "back"})],
            text: Some("stale text".to_string()),
        };
        let out = run_pass(&mut e, &structured, &default_blacklist());
        assert_eq!(out.source, ExtractionSource::Structured);
        assert_eq!(out.added, 1);
    }

    #[test]
    fn empty_snapshot_is_a_no_op() {
        let mut e = engine();
        let out = run_pass(&mut e, &FeedSnapshot::default(), &default_blacklist());
        assert_eq!(out.candidates, 0);
        assert!(!out.persisted);
    }
}
