//! Verify command - compare matching images with their recorded md5sum

use super::{Result, RunOptions};
use crate::db::Store;
use crate::output::display_path;
use crate::verify::{verify_image, VerifyOutcome};
use colored::Colorize;
use std::io::Write;
use tracing::info;

/// Counts from one verification pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifySummary {
    pub checked: usize,
    pub ok: usize,
    pub mismatched: usize,
    pub missing: usize,
    pub unhashed: usize,
}

impl VerifySummary {
    fn record(&mut self, outcome: &VerifyOutcome) {
        self.checked += 1;
        match outcome {
            VerifyOutcome::Ok => self.ok += 1,
            VerifyOutcome::Mismatch { .. } => self.mismatched += 1,
            VerifyOutcome::Missing(_) => self.missing += 1,
            VerifyOutcome::NoHash => self.unhashed += 1,
        }
    }
}

/// Check every matching image, reporting problems one per line
///
/// Problems never stop the scan. With `options.quiet` only mismatches are
/// reported.
///
/// # Errors
///
/// Returns an error if a store lookup fails or `out` cannot be written.
pub fn execute(store: &Store, options: &RunOptions, out: &mut dyn Write) -> Result<VerifySummary> {
    let index_dir = options.index_dir();
    let mut summary = VerifySummary::default();

    for path in store.select_paths(&options.criteria, index_dir)? {
        let Some(record) = store.project(&path)? else {
            continue;
        };
        let outcome = verify_image(&record, &options.image_file(&path));
        summary.record(&outcome);

        let Some(label) = outcome.label() else {
            continue;
        };
        if options.quiet && !outcome.is_mismatch() {
            continue;
        }
        let label = match &outcome {
            VerifyOutcome::Mismatch { .. } => label.red().bold(),
            VerifyOutcome::Missing(_) => label.yellow(),
            _ => label.dimmed(),
        };
        let display = display_path(&path, index_dir, options.relative);
        writeln!(out, "{label} {display} ({outcome})")?;
    }

    info!(
        checked = summary.checked,
        ok = summary.ok,
        mismatched = summary.mismatched,
        missing = summary.missing,
        unhashed = summary.unhashed,
        "verification complete"
    );
    Ok(summary)
}
