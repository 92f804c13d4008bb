use anyhow::Result;
use std::rc::Rc;

use crate::comm::config::load_config;
use crate::comm::diagnostics::WarnSink;
use crate::comm::engine::Engine;
use crate::comm::paths::resolve_paths;
use crate::comm::render::{empty_placeholder, render_line};
use crate::commands::CommandReport;

pub struct ShowOptions {
    pub limit: Option<usize>,
    /// Overrides the configured self identity for mention detection.
    pub me: Option<String>,
}

pub fn run(opts: &ShowOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;
    let engine = Engine::open(&paths, &cfg, Rc::new(WarnSink));
    let me = opts
        .me
        .clone()
        .unwrap_or_else(|| cfg.identity.self_name.clone());

    let mut report = CommandReport::new("show");
    let total = engine.messages().len();
    if total == 0 {
        report.detail(empty_placeholder());
        return Ok(report);
    }

    let skip = opts.limit.map_or(0, |limit| total.saturating_sub(limit));
    for (msg, hints) in engine.annotated(&me).skip(skip) {
        report.detail(render_line(msg, &hints));
    }
    Ok(report)
}
