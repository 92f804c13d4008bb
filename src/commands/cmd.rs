use anyhow::Result;
use std::rc::Rc;

use crate::comm::audit;
use crate::comm::config::load_config;
use crate::comm::diagnostics::WarnSink;
use crate::comm::engine::Engine;
use crate::comm::local_commands::{LocalCommand, handle};
use crate::comm::paths::resolve_paths;
use crate::commands::CommandReport;

/// Runs one chat-input line through the local command handler.
pub fn run(text: &str) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;
    let mut engine = Engine::open(&paths, &cfg, Rc::new(WarnSink));
    let mut report = CommandReport::new("cmd");

    let Some(reply) = handle(&mut engine, text, &paths.exports_dir) else {
        report.issue(format!("not a local command: {}", text.trim()));
        return Ok(report);
    };

    if let Some(notice) = &reply.notice {
        for line in notice.lines() {
            report.detail(line);
        }
    }
    if !reply.ok {
        report.issue(format!("{:?} failed", reply.command));
    }

    let phase = match reply.command {
        LocalCommand::Clear => Some("clear"),
        LocalCommand::Export => Some("export"),
        _ => None,
    };
    if let Some(phase) = phase {
        audit::append_event(
            &paths,
            phase,
            if reply.ok { "ok" } else { "degraded" },
            "local command",
        )?;
    }
    Ok(report)
}
