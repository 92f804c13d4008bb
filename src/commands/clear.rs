use anyhow::Result;
use std::rc::Rc;

use crate::comm::audit;
use crate::comm::config::load_config;
use crate::comm::diagnostics::WarnSink;
use crate::comm::engine::Engine;
use crate::comm::paths::resolve_paths;
use crate::commands::CommandReport;

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;
    let mut engine = Engine::open(&paths, &cfg, Rc::new(WarnSink));

    let mut report = CommandReport::new("clear");
    let dropped = engine.messages().len();
    let cleared = engine.clear();
    report.detail(format!("dropped={dropped}"));
    if !cleared {
        report.issue("stored history could not be removed");
    }
    audit::append_event(
        &paths,
        "clear",
        if cleared { "ok" } else { "degraded" },
        &format!("dropped={dropped}"),
    )?;
    Ok(report)
}
