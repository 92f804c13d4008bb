use anyhow::Result;
use std::path::Path;
use std::rc::Rc;

use crate::comm::audit;
use crate::comm::config::load_config;
use crate::comm::diagnostics::WarnSink;
use crate::comm::engine::Engine;
use crate::comm::export::write_export;
use crate::comm::paths::resolve_paths;
use crate::commands::CommandReport;

pub fn run(out_dir: Option<&Path>) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;
    let engine = Engine::open(&paths, &cfg, Rc::new(WarnSink));
    let dir = out_dir.unwrap_or(paths.exports_dir.as_path());

    let mut report = CommandReport::new("export");
    let outcome = write_export(dir, engine.messages())?;
    report.detail(format!("path={}", outcome.path.display()));
    report.detail(format!("rows={}", outcome.rows));
    audit::append_event(
        &paths,
        "export",
        "ok",
        &format!("rows={} path={}", outcome.rows, outcome.path.display()),
    )?;
    Ok(report)
}
