use anyhow::Result;
use std::path::Path;

use crate::comm::watcher::{run_daemon, run_once};
use crate::commands::CommandReport;
use crate::commands::sync::describe;

pub struct WatchOptions<'a> {
    pub once: bool,
    pub feed: Option<&'a Path>,
}

pub fn run(opts: &WatchOptions<'_>) -> Result<CommandReport> {
    if !opts.once {
        run_daemon(opts.feed)?;
        return Ok(CommandReport::new("watch"));
    }

    let mut report = CommandReport::new("watch");
    report.detail("mode=once");
    let outcome = run_once(opts.feed)?;
    describe(&mut report, &outcome);
    for line in outcome.rendered {
        report.detail(line);
    }
    Ok(report)
}
