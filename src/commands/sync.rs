use anyhow::Result;
use std::path::Path;

use crate::comm::watcher::{WatchCycleOutcome, run_once};
use crate::commands::CommandReport;

pub fn describe(report: &mut CommandReport, outcome: &WatchCycleOutcome) {
    report.detail(format!("feed={}", outcome.feed_path));
    report.detail(format!("source={}", outcome.sync.source.as_str()));
    report.detail(format!("candidates={}", outcome.sync.candidates));
    report.detail(format!("added={}", outcome.sync.added));
    report.detail(format!("total={}", outcome.sync.total));
    if outcome.sync.added > 0 && !outcome.sync.persisted {
        report.issue("history not persisted; new messages kept in memory only");
    }
}

pub fn run(feed: Option<&Path>) -> Result<CommandReport> {
    let mut report = CommandReport::new("sync");
    let outcome = run_once(feed)?;
    describe(&mut report, &outcome);
    Ok(report)
}
