//! Grep command - print matching images, or the tags they carry

use super::{Result, RunOptions};
use crate::db::Store;
use crate::output::{display_path, formatter_for};
use std::io::Write;
use tracing::{info, warn};

/// Execute the query in `options` and write each result to `out`
///
/// Returns the number of results written.
///
/// # Errors
///
/// Returns an error if a store lookup fails or `out` cannot be written.
pub fn execute(store: &Store, options: &RunOptions, out: &mut dyn Write) -> Result<usize> {
    let formatter = formatter_for(options.format, options.output);
    let index_dir = options.index_dir();

    if options.tags_only {
        let tags = store.select_tags(&options.criteria, index_dir)?;
        for (tag, category) in &tags {
            formatter.write_tag(out, tag, category)?;
        }
        info!(tags = tags.len(), "tags listed");
        return Ok(tags.len());
    }

    let paths = store.select_paths(&options.criteria, index_dir)?;
    let mut written = 0;
    for path in &paths {
        let Some(record) = store.project(path)? else {
            warn!(path = %path, "matched image has no row");
            continue;
        };
        let display = display_path(path, index_dir, options.relative);
        formatter.write_record(out, &record, &display)?;
        written += 1;
    }
    info!(matched = written, "query complete");
    Ok(written)
}
