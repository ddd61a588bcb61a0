//! Drives operations over input files and turns errors into skip or abort.

use log::{error, warn};
use std::path::{Path, PathBuf};

use crate::error::{Disposition, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Run `op` on every path in order. Files whose error is per-file are
/// logged and counted as failures; anything else stops the run and is
/// returned for the caller to report.
pub fn run_each<F>(paths: &[PathBuf], mut op: F) -> Result<RunSummary>
where
    F: FnMut(&Path) -> Result<()>,
{
    let mut summary = RunSummary::default();
    for path in paths {
        summary.processed += 1;
        match op(path) {
            Ok(()) => {}
            Err(e) => match e.disposition() {
                Disposition::SkipFile => {
                    warn!("{} -- skipping", e);
                    summary.failed += 1;
                }
                Disposition::AbortRun => return Err(e),
            },
        }
    }
    Ok(summary)
}

/// Run a single operation where any error ends the run.
pub fn run_batch<T, F>(op: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    op().map_err(|e| {
        error!("{}", e);
        e
    })
}
