use anyhow::Result;
use std::env;
use std::rc::Rc;

use crate::comm::config::{load_config, resolve_config_path};
use crate::comm::diagnostics::WarnSink;
use crate::comm::engine::Engine;
use crate::comm::paths::resolve_paths;
use crate::comm::watcher::read_daemon_lock;
use crate::commands::CommandReport;

include!(concat!(env!("OUT_DIR"), "/comm_env_allowlist.rs"));

fn unknown_comm_env_vars(
    present: impl Iterator<Item = String>,
    allowlist: &[&str],
) -> Vec<String> {
    let mut unknown: Vec<String> = present
        .filter(|key| key.starts_with("COMM_"))
        .filter(|key| !allowlist.contains(&key.as_str()))
        .collect();
    unknown.sort();
    unknown
}

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("status");

    report.detail(format!("build_uuid={}", env!("BUILD_UUID")));
    report.detail(format!("comm_home={}", paths.comm_home.display()));
    report.detail(format!("config_store_dir={}", paths.config_store_dir.display()));
    report.detail(format!("local_store_dir={}", paths.local_store_dir.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));
    report.detail(format!("exports_dir={}", paths.exports_dir.display()));
    report.detail(format!("config_path={}", resolve_config_path(&paths).display()));

    let cfg = load_config(&paths)?;
    match cfg.feed_path() {
        Some(feed) => {
            report.detail(format!("feed_path={}", feed.display()));
            if !feed.exists() {
                report.issue(format!("feed file not found: {}", feed.display()));
            }
        }
        None => report.detail("feed_path=<unset>"),
    }
    report.detail(format!("history_max={}", cfg.history.max_entries));

    let engine = Engine::open(&paths, &cfg, Rc::new(WarnSink));
    report.detail(format!("history_entries={}", engine.messages().len()));
    report.detail(format!("friends={}", engine.friends().len()));

    match read_daemon_lock(&paths) {
        Ok(Some(lock)) => {
            report.detail(format!("daemon_pid={}", lock.pid));
            report.detail(format!("daemon_started_at={}", lock.start_time));
            if lock.build_uuid != env!("BUILD_UUID") {
                report.detail(format!(
                    "daemon build differs (running={}); restart the watcher",
                    lock.build_uuid
                ));
            }
        }
        Ok(None) => report.detail("daemon=stopped"),
        Err(err) => report.issue(format!("daemon lock unreadable: {err:#}")),
    }

    for key in unknown_comm_env_vars(
        env::vars().map(|(key, _)| key),
        GENERATED_COMM_ENV_ALLOWLIST,
    ) {
        report.issue(format!("unrecognized environment variable {key}"));
    }
    Ok(report)
}
