use crate::comm::message::Message;
use std::collections::{HashMap, HashSet};

/// First-seen-ordered, deduplicated message log.
///
/// Every entry except local notices owns exactly one key in `keys`. Entries
/// restored from history carry no id; `restored` counts their composite keys so
/// the first live observation of the same message (which may carry an id) is
/// absorbed instead of appended a second time.
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    log: Vec<Message>,
    keys: HashSet<String>,
    restored: HashMap<String, usize>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.log
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.log.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    #[cfg(test)]
    pub fn contains_key(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Merges an oldest-first batch. Returns how many entries were appended.
    ///
    /// A new key is recorded and its message appended, with one exception: an
    /// id-bearing message whose composite key matches a restored, id-less entry
    /// only records its key, since that entry already shows it.
    pub fn merge(&mut self, batch: &[Message]) -> usize {
        let mut added = 0usize;
        for candidate in batch {
            if candidate.message.trim().is_empty() {
                continue;
            }
            let msg = candidate.normalized();
            let key = msg.dedup_key();
            if self.keys.contains(&key) {
                continue;
            }
            if msg.id.is_some() && self.absorb_restored(&msg.composite_key()) {
                self.keys.insert(key);
                continue;
            }
            self.keys.insert(key);
            self.log.push(msg);
            added += 1;
        }
        added
    }

    fn absorb_restored(&mut self, composite: &str) -> bool {
        let Some(remaining) = self.restored.get_mut(composite) else {
            return false;
        };
        *remaining -= 1;
        if *remaining == 0 {
            self.restored.remove(composite);
        }
        true
    }

    /// Inserts persisted entries, skipping keys already present. Returns how many were kept.
    pub fn restore(&mut self, entries: Vec<Message>) -> usize {
        let mut kept = 0usize;
        for entry in entries {
            let msg = entry.normalized();
            let key = msg.dedup_key();
            if !self.keys.insert(key) {
                continue;
            }
            if msg.id.is_none() {
                *self.restored.entry(msg.composite_key()).or_insert(0) += 1;
            }
            self.log.push(msg);
            kept += 1;
        }
        kept
    }

    /// Appends a notice outside the key set so it can never shadow a remote message.
    pub fn push_local_notice(&mut self, text: impl Into<String>) {
        self.log.push(Message::local_notice(text));
    }

    pub fn clear(&mut self) {
        self.log.clear();
        self.keys.clear();
        self.restored.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::message::{LOCAL_AUTHOR, SYSTEM_AUTHOR};
    use std::collections::HashSet;

    fn batch() -> Vec<Message> {
        vec![
            Message::authored("Alice", "3:45 PM", "first").with_id("1"),
            Message::authored("Bob", "3:46 PM", "second").with_id("2"),
            Message::system("maintenance soon"),
        ]
    }

    #[test]
    fn merge_is_idempotent() {
        let mut t = Transcript::new();
        assert_eq!(t.merge(&batch()), 3);
        let before = t.messages().to_vec();
        assert_eq!(t.merge(&batch()), 0);
        assert_eq!(t.messages(), before.as_slice());
    }

    #[test]
    fn overlapping_batches_keep_first_seen_order() {
        let mut t = Transcript::new();
        t.merge(&batch()[..2]);
        let next = vec![
            Message::authored("Bob", "3:46 PM", "second").with_id("2"),
            Message::authored("Cara", "3:47 PM", "third").with_id("3"),
        ];
        assert_eq!(t.merge(&next), 1);
        let bodies: Vec<_> = t.messages().iter().map(|m| m.message.as_str()).collect();
        assert_eq!(bodies, vec!["first", "second", "third"]);
    }

    #[test]
    fn dedup_keys_are_unique_across_log() {
        let mut t = Transcript::new();
        t.merge(&batch());
        t.merge(&[
            Message::system("maintenance soon"),
            Message::authored("Alice", "3:45 PM", "first"),
        ]);
        let keys: HashSet<_> = t.messages().iter().map(Message::dedup_key).collect();
        assert_eq!(keys.len(), t.len());
    }

    #[test]
    fn empty_bodies_never_enter_the_log() {
        let mut t = Transcript::new();
        assert_eq!(t.merge(&[Message::authored("Alice", "", "   ")]), 0);
        assert!(t.is_empty());
    }

    #[test]
    fn missing_author_defaults_to_system() {
        let mut t = Transcript::new();
        t.merge(&[Message::authored("", "", "orphan")]);
        assert_eq!(t.messages()[0].username, SYSTEM_AUTHOR);
    }

    #[test]
    fn local_notices_do_not_block_remote_messages() {
        let mut t = Transcript::new();
        t.push_local_notice("Added friend: Bob");
        assert_eq!(t.messages()[0].username, LOCAL_AUTHOR);
        let remote = Message {
            username: LOCAL_AUTHOR.to_string(),
            ..Message::system("Added friend: Bob")
        };
        assert_eq!(t.merge(&[remote]), 1);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn restore_self_heals_duplicates() {
        let mut t = Transcript::new();
        let kept = t.restore(vec![
            Message::authored("Alice", "3:45 PM", "hi"),
            Message::authored("Alice", "3:45 PM", "hi"),
            Message::authored("Bob", "3:46 PM", "yo"),
        ]);
        assert_eq!(kept, 2);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn restored_entry_absorbs_its_live_observation_once() {
        let mut t = Transcript::new();
        t.restore(vec![Message::authored("Alice", "3:45 PM", "hi")]);

        let live = Message::authored("Alice", "3:45 PM", "hi").with_id("991");
        assert_eq!(t.merge(std::slice::from_ref(&live)), 0);
        assert_eq!(t.merge(std::slice::from_ref(&live)), 0);
        assert!(t.contains_key("991"));

        let repeat = Message::authored("Alice", "3:45 PM", "hi").with_id("992");
        assert_eq!(t.merge(&[repeat]), 1);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn clear_forgets_everything() {
        let mut t = Transcript::new();
        t.merge(&batch());
        t.clear();
        assert!(t.is_empty());
        assert_eq!(t.merge(&batch()), 3);
    }
}
