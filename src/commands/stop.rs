use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

use crate::comm::paths::resolve_paths;
use crate::comm::watcher::read_daemon_lock;
use crate::commands::CommandReport;

const STOP_TIMEOUT: Duration = Duration::from_secs(8);
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

fn process_alive(pid: u32) -> Result<bool> {
    let status = Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .status()
        .context("failed to probe process state with `kill -0`")?;
    if !status.success() {
        return Ok(false);
    }

    let ps_out = Command::new("ps")
        .arg("-p")
        .arg(pid.to_string())
        .arg("-o")
        .arg("stat=")
        .output()
        .context("failed to inspect process state with `ps`")?;
    if !ps_out.status.success() {
        return Ok(false);
    }
    let proc_state = String::from_utf8_lossy(&ps_out.stdout).trim().to_string();
    Ok(!proc_state.starts_with('Z'))
}

fn process_command_line(pid: u32) -> Result<String> {
    let output = Command::new("ps")
        .arg("-p")
        .arg(pid.to_string())
        .arg("-o")
        .arg("command=")
        .output()
        .context("failed to inspect process command line with `ps`")?;
    if !output.status.success() {
        return Ok(String::new());
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn is_watch_daemon(command_line: &str) -> bool {
    command_line.contains("commlog") && command_line.contains("watch") && !command_line.contains("--once")
}

fn send_sigterm(pid: u32) -> Result<()> {
    let status = Command::new("kill")
        .arg("-TERM")
        .arg(pid.to_string())
        .status()
        .context("failed to send SIGTERM with `kill -TERM`")?;
    if status.success() || !process_alive(pid)? {
        return Ok(());
    }
    anyhow::bail!("`kill -TERM {pid}` failed and process is still alive");
}

fn cleanup_lock_file(lock_path: &Path, report: &mut CommandReport) {
    match fs::remove_file(lock_path) {
        Ok(()) => report.detail(format!("removed daemon lock {}", lock_path.display())),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => report.detail(format!(
            "failed to remove daemon lock {}: {}",
            lock_path.display(),
            err
        )),
    }
}

pub fn run() -> Result<CommandReport> {
    let mut report = CommandReport::new("stop");
    let paths = resolve_paths()?;
    let lock_path = paths.daemon_lock_file();
    report.detail(format!("daemon_lock={}", lock_path.display()));

    let payload = match read_daemon_lock(&paths) {
        Ok(Some(payload)) => payload,
        Ok(None) => {
            report.detail("watcher daemon already stopped (no lock payload)");
            return Ok(report);
        }
        Err(err) => {
            report.issue(format!("failed to read daemon lock: {err:#}"));
            return Ok(report);
        }
    };
    let pid = payload.pid;
    report.detail(format!("daemon_pid={pid}"));

    if !process_alive(pid)? {
        report.detail(format!("daemon pid {pid} is not running"));
        cleanup_lock_file(&lock_path, &mut report);
        return Ok(report);
    }

    let command_line = process_command_line(pid)?;
    if !is_watch_daemon(&command_line) {
        report.issue(format!(
            "refusing to stop pid {pid}; command does not match the watcher daemon: {}",
            if command_line.is_empty() {
                "<unknown>"
            } else {
                command_line.as_str()
            }
        ));
        return Ok(report);
    }

    send_sigterm(pid)?;
    let deadline = Instant::now() + STOP_TIMEOUT;
    while Instant::now() < deadline {
        if !process_alive(pid)? {
            report.detail(format!("stopped watcher daemon pid={pid}"));
            cleanup_lock_file(&lock_path, &mut report);
            return Ok(report);
        }
        thread::sleep(STOP_POLL_INTERVAL);
    }

    report.issue(format!(
        "timed out waiting for daemon pid {pid} to stop after {}s",
        STOP_TIMEOUT.as_secs()
    ));
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::is_watch_daemon;

    #[test]
    fn only_the_looping_watcher_matches() {
        assert!(is_watch_daemon("/usr/local/bin/commlog watch --daemon"));
        assert!(is_watch_daemon("commlog watch"));
        assert!(!is_watch_daemon("commlog watch --once"));
        assert!(!is_watch_daemon("vim watch.rs"));
    }
}
