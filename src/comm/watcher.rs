use crate::comm::audit;
use crate::comm::config::{CommConfig, load_config};
use crate::comm::diagnostics::{Diagnostic, DiagnosticSink, WarnSink};
use crate::comm::engine::Engine;
use crate::comm::feed::FeedSnapshot;
use crate::comm::paths::{CommPaths, resolve_paths};
use crate::comm::render::render_line;
use crate::comm::scheduler::FrameScheduler;
use crate::comm::sync::{SyncOutcome, run_pass};
use crate::comm::util::now_epoch_secs;
use crate::error::CommError;
use anyhow::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant, SystemTime};

#[derive(Debug, Clone)]
pub struct WatchCycleOutcome {
    pub feed_path: String,
    pub sync: SyncOutcome,
    pub rendered: Vec<String>,
    /// Change notifications folded into an already pending pass, since the watcher started.
    pub coalesced: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonLockPayload {
    pub pid: u32,
    pub build_uuid: String,
    pub start_time: u64,
}

/// Change signature of the feed file; a different value counts as a mutation.
///
/// A rewrite that keeps the same length within one mtime tick goes unnoticed
/// until the next change; the overlay appends, so that case is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FeedFingerprint {
    modified: Option<SystemTime>,
    len: u64,
}

fn fingerprint(path: &Path) -> Option<FeedFingerprint> {
    let meta = fs::metadata(path).ok()?;
    Some(FeedFingerprint {
        modified: meta.modified().ok(),
        len: meta.len(),
    })
}

pub fn resolve_feed_path(cfg: &CommConfig, override_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = override_path {
        return Ok(path.to_path_buf());
    }
    cfg.feed_path().ok_or_else(|| {
        CommError::FeedUnavailable("no feed path configured (COMM_FEED_PATH or --feed)".to_string())
            .into()
    })
}

/// Drives sync passes from feed-file mutations, one pass per frame at most.
pub struct FeedWatcher {
    engine: Engine,
    feed_path: PathBuf,
    blacklist: BTreeSet<String>,
    self_identity: String,
    scheduler: FrameScheduler,
    last_seen: Option<FeedFingerprint>,
}

impl FeedWatcher {
    pub fn new(engine: Engine, feed_path: PathBuf, cfg: &CommConfig) -> Self {
        Self {
            engine,
            feed_path,
            blacklist: cfg.blacklist(),
            self_identity: cfg.identity.self_name.clone(),
            scheduler: FrameScheduler::new(),
            last_seen: None,
        }
    }

    #[cfg(test)]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    #[cfg(test)]
    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    /// Checks the feed for a mutation and schedules a pass. Returns whether one is pending.
    pub fn observe(&mut self) -> bool {
        let current = fingerprint(&self.feed_path);
        if current.is_some() && current != self.last_seen {
            self.last_seen = current;
            self.scheduler.request();
        }
        self.scheduler.is_pending()
    }

    /// Runs the scheduled pass, if any, to completion.
    pub fn frame(&mut self) -> Result<Option<WatchCycleOutcome>> {
        if !self.scheduler.take() {
            return Ok(None);
        }
        let snapshot = match FeedSnapshot::read(&self.feed_path, self.engine.sink()) {
            Ok(snapshot) => snapshot,
            // The feed can vanish between observe and frame; the next mutation reschedules.
            Err(_) if !self.feed_path.exists() => return Ok(None),
            Err(err) => return Err(err),
        };
        let sync = run_pass(&mut self.engine, &snapshot, &self.blacklist);

        let messages = self.engine.messages();
        let start = messages.len().saturating_sub(sync.added);
        let rendered = self
            .engine
            .annotated(&self.self_identity)
            .skip(start)
            .map(|(msg, hints)| render_line(msg, &hints))
            .collect();

        Ok(Some(WatchCycleOutcome {
            feed_path: self.feed_path.display().to_string(),
            sync,
            rendered,
            coalesced: self.scheduler.dropped(),
        }))
    }
}

fn audit_pass(paths: &CommPaths, outcome: &WatchCycleOutcome) -> Result<()> {
    if outcome.sync.added == 0 {
        return Ok(());
    }
    audit::append_event(
        paths,
        "sync",
        if outcome.sync.persisted { "ok" } else { "degraded" },
        &format!(
            "source={} candidates={} added={} total={} persisted={} coalesced={}",
            outcome.sync.source.as_str(),
            outcome.sync.candidates,
            outcome.sync.added,
            outcome.sync.total,
            outcome.sync.persisted,
            outcome.coalesced
        ),
    )
}

pub fn run_once(feed_override: Option<&Path>) -> Result<WatchCycleOutcome> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;
    let feed_path = resolve_feed_path(&cfg, feed_override)?;
    if !feed_path.exists() {
        return Err(CommError::FeedUnavailable(feed_path.display().to_string()).into());
    }

    let engine = Engine::open(&paths, &cfg, Rc::new(WarnSink));
    let mut watcher = FeedWatcher::new(engine, feed_path, &cfg);
    watcher.observe();
    let outcome = watcher
        .frame()?
        .context("feed snapshot disappeared before the pass ran")?;
    audit_pass(&paths, &outcome)?;
    Ok(outcome)
}

fn acquire_daemon_lock(paths: &CommPaths) -> Result<File> {
    fs::create_dir_all(&paths.logs_dir)
        .with_context(|| format!("failed to create {}", paths.logs_dir.display()))?;
    let lock_path = paths.daemon_lock_file();
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .with_context(|| format!("failed to open {}", lock_path.display()))?;
    if file.try_lock_exclusive().is_err() {
        return Err(CommError::Locked(lock_path.display().to_string()).into());
    }

    let payload = DaemonLockPayload {
        pid: std::process::id(),
        build_uuid: env!("BUILD_UUID").to_string(),
        start_time: now_epoch_secs()?,
    };
    file.set_len(0)?;
    file.write_all(serde_json::to_string(&payload)?.as_bytes())?;
    file.flush()?;
    Ok(file)
}

pub fn read_daemon_lock(paths: &CommPaths) -> Result<Option<DaemonLockPayload>> {
    let lock_path = paths.daemon_lock_file();
    if !lock_path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(&lock_path)
        .with_context(|| format!("failed to read {}", lock_path.display()))?;
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let payload = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", lock_path.display()))?;
    Ok(Some(payload))
}

/// Runs the scheduled pass and audits it. Read and audit failures are reported, never returned.
fn daemon_frame(
    watcher: &mut FeedWatcher,
    paths: &CommPaths,
    sink: &dyn DiagnosticSink,
) -> Option<WatchCycleOutcome> {
    let outcome = match watcher.frame() {
        Ok(outcome) => outcome?,
        Err(err) => {
            sink.report(Diagnostic::parse_skip("feed-read", format!("{err:#}")));
            return None;
        }
    };
    if let Err(err) = audit_pass(paths, &outcome) {
        sink.report(Diagnostic::storage("audit", format!("{err:#}")));
    }
    Some(outcome)
}

pub fn run_daemon(feed_override: Option<&Path>) -> Result<()> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;
    let feed_path = resolve_feed_path(&cfg, feed_override)?;
    let _lock = acquire_daemon_lock(&paths)?;

    let sink: Rc<dyn DiagnosticSink> = Rc::new(WarnSink);
    let engine = Engine::open(&paths, &cfg, sink.clone());
    let mut watcher = FeedWatcher::new(engine, feed_path, &cfg);
    let frame = Duration::from_millis(cfg.watcher.frame_interval_ms);
    let poll = Duration::from_millis(cfg.watcher.poll_interval_ms);
    let mut last_poll: Option<Instant> = None;

    loop {
        if last_poll.is_none_or(|at| at.elapsed() >= poll) {
            watcher.observe();
            last_poll = Some(Instant::now());
        }
        if let Some(outcome) = daemon_frame(&mut watcher, &paths, sink.as_ref()) {
            for line in &outcome.rendered {
                println!("{line}");
            }
        }
        thread::sleep(frame);
    }
}
