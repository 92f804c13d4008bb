use crate::comm::history::DEFAULT_MAX_HISTORY;
use crate::comm::lines::default_blacklist;
use crate::comm::paths::CommPaths;
use crate::error::CommError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommHistoryConfig {
    pub max_entries: usize,
}

impl Default for CommHistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_HISTORY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommWatcherConfig {
    /// How often the feed file is checked for changes.
    pub poll_interval_ms: u64,
    /// Length of one frame; a scheduled pass runs at the next frame boundary.
    pub frame_interval_ms: u64,
}

impl Default for CommWatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 250,
            frame_interval_ms: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommFeedConfig {
    pub path: Option<String>,
    pub blacklist: Vec<String>,
}

impl Default for CommFeedConfig {
    fn default() -> Self {
        Self {
            path: None,
            blacklist: default_blacklist().into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CommIdentityConfig {
    pub self_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CommConfig {
    pub history: CommHistoryConfig,
    pub watcher: CommWatcherConfig,
    pub feed: CommFeedConfig,
    pub identity: CommIdentityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialCommConfig {
    history: Option<CommHistoryConfig>,
    watcher: Option<CommWatcherConfig>,
    feed: Option<CommFeedConfig>,
    identity: Option<CommIdentityConfig>,
}

impl CommConfig {
    pub fn blacklist(&self) -> BTreeSet<String> {
        self.feed.blacklist.iter().cloned().collect()
    }

    pub fn feed_path(&self) -> Option<PathBuf> {
        self.feed
            .path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_usize(var: &str, fallback: usize) -> usize {
    match env::var(var) {
        Ok(v) => v.trim().parse::<usize>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_opt_string(var: &str, fallback: Option<String>) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => fallback,
    }
}

fn env_or_raw_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) => v.trim().to_string(),
        Err(_) => fallback.to_string(),
    }
}

fn env_or_csv(var: &str, fallback: &[String]) -> Vec<String> {
    match env::var(var) {
        Ok(v) => v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
            .collect(),
        Err(_) => fallback.to_vec(),
    }
}

fn validate(cfg: &CommConfig) -> Result<()> {
    if cfg.history.max_entries == 0 {
        return Err(CommError::InvalidConfig("history max entries must be >= 1".into()).into());
    }
    if cfg.watcher.poll_interval_ms == 0 {
        return Err(CommError::InvalidConfig("watcher poll interval must be >= 1 ms".into()).into());
    }
    if cfg.watcher.frame_interval_ms == 0 {
        return Err(CommError::InvalidConfig("watcher frame interval must be >= 1 ms".into()).into());
    }
    Ok(())
}

pub fn resolve_config_path(paths: &CommPaths) -> PathBuf {
    if let Ok(custom) = env::var("COMM_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    paths.comm_home.join("commlog.toml")
}

fn merge_file_config(base: &mut CommConfig, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(path)
        .map_err(|err| CommError::InvalidConfig(format!("{}: {err}", path.display())))?;
    let parsed: PartialCommConfig = toml::from_str(&raw)
        .map_err(|err| CommError::InvalidConfig(format!("{}: {err}", path.display())))?;
    if let Some(history) = parsed.history {
        base.history = history;
    }
    if let Some(watcher) = parsed.watcher {
        base.watcher = watcher;
    }
    if let Some(feed) = parsed.feed {
        base.feed = feed;
    }
    if let Some(identity) = parsed.identity {
        base.identity = identity;
    }
    Ok(())
}

pub fn load_config(paths: &CommPaths) -> Result<CommConfig> {
    let mut cfg = CommConfig::default();
    merge_file_config(&mut cfg, &resolve_config_path(paths))?;

    cfg.history.max_entries = env_or_usize("COMM_HISTORY_MAX", cfg.history.max_entries);
    cfg.watcher.poll_interval_ms =
        env_or_u64("COMM_POLL_INTERVAL_MS", cfg.watcher.poll_interval_ms);
    cfg.watcher.frame_interval_ms =
        env_or_u64("COMM_FRAME_INTERVAL_MS", cfg.watcher.frame_interval_ms);
    cfg.feed.path = env_or_opt_string("COMM_FEED_PATH", cfg.feed.path.clone());
    cfg.feed.blacklist = env_or_csv("COMM_FEED_BLACKLIST", &cfg.feed.blacklist);
    cfg.identity.self_name = env_or_raw_string("COMM_SELF_NAME", &cfg.identity.self_name);

    validate(&cfg)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_sections_replace_defaults() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("commlog.toml");
        fs::write(
            &path,
            "[history]\nmax_entries = 50\n\n[identity]\nself_name = \"Alice\"\n",
        )
        .expect("write");

        let mut cfg = CommConfig::default();
        merge_file_config(&mut cfg, &path).expect("merge");
        assert_eq!(cfg.history.max_entries, 50);
        assert_eq!(cfg.identity.self_name, "Alice");
        assert_eq!(cfg.watcher.poll_interval_ms, 250);
        assert!(cfg.blacklist().contains("[UNPIN]"));
    }

    #[test]
    fn broken_file_is_an_error() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("commlog.toml");
        fs::write(&path, "[history\n").expect("write");
        let mut cfg = CommConfig::default();
        let err = merge_file_config(&mut cfg, &path).expect_err("broken toml");
        assert!(matches!(
            err.downcast_ref::<CommError>(),
            Some(CommError::InvalidConfig(_))
        ));
    }

    #[test]
    fn validate_rejects_zero_cap() {
        let mut cfg = CommConfig::default();
        cfg.history.max_entries = 0;
        assert!(validate(&cfg).is_err());
        assert!(validate(&CommConfig::default()).is_ok());
    }

    #[test]
    fn blank_feed_path_is_ignored() {
        let mut cfg = CommConfig::default();
        cfg.feed.path = Some("  ".to_string());
        assert_eq!(cfg.feed_path(), None);
    }
}
