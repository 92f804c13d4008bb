use crate::comm::annotate::{RenderHints, annotate};
use crate::comm::config::CommConfig;
use crate::comm::diagnostics::DiagnosticSink;
use crate::comm::friends::FriendRegistry;
use crate::comm::history::HistoryStore;
use crate::comm::message::Message;
use crate::comm::paths::CommPaths;
use crate::comm::store::{FileStore, KvStore};
use crate::comm::transcript::Transcript;
use std::rc::Rc;

/// Owns the transcript, the history store and the friend registry for one data directory.
pub struct Engine {
    transcript: Transcript,
    history: HistoryStore,
    friends: FriendRegistry,
    sink: Rc<dyn DiagnosticSink>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub added: usize,
    pub persisted: bool,
}

impl Engine {
    pub fn new(
        config_store: Rc<dyn KvStore>,
        local_store: Rc<dyn KvStore>,
        max_history: usize,
        sink: Rc<dyn DiagnosticSink>,
    ) -> Self {
        let friends = FriendRegistry::load(config_store, local_store.clone(), sink.clone());
        let history = HistoryStore::new(local_store, max_history, sink.clone());
        Self {
            transcript: Transcript::new(),
            history,
            friends,
            sink,
        }
    }

    /// File-backed engine with history already restored.
    pub fn open(paths: &CommPaths, cfg: &CommConfig, sink: Rc<dyn DiagnosticSink>) -> Self {
        let config_store: Rc<dyn KvStore> = Rc::new(FileStore::new(&paths.config_store_dir));
        let local_store: Rc<dyn KvStore> = Rc::new(FileStore::new(&paths.local_store_dir));
        let mut engine = Self::new(config_store, local_store, cfg.history.max_entries, sink);
        engine.load();
        engine
    }

    pub fn sink(&self) -> &dyn DiagnosticSink {
        self.sink.as_ref()
    }

    pub fn messages(&self) -> &[Message] {
        self.transcript.messages()
    }

    pub fn friends(&self) -> &FriendRegistry {
        &self.friends
    }

    pub fn friends_mut(&mut self) -> &mut FriendRegistry {
        &mut self.friends
    }

    /// Restores persisted history into the transcript. Returns how many entries were kept.
    pub fn load(&mut self) -> usize {
        let entries = self.history.load();
        self.transcript.restore(entries)
    }

    /// Merges an oldest-first batch and persists when anything new arrived.
    pub fn merge(&mut self, batch: &[Message]) -> MergeOutcome {
        let added = self.transcript.merge(batch);
        let persisted = added > 0 && self.history.save(self.transcript.messages());
        MergeOutcome { added, persisted }
    }

    /// Empties the in-memory log and the stored history.
    pub fn clear(&mut self) -> bool {
        self.transcript.clear();
        self.history.clear()
    }

    pub fn push_local_notice(&mut self, text: impl Into<String>) {
        self.transcript.push_local_notice(text);
    }

    pub fn annotated<'a>(
        &'a self,
        self_identity: &'a str,
    ) -> impl Iterator<Item = (&'a Message, RenderHints)> + 'a {
        self.transcript
            .messages()
            .iter()
            .map(move |msg| (msg, annotate(msg, &self.friends, self_identity)))
    }
}
