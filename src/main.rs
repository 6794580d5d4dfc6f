//! kpa-grep entry point
//!
//! Prints the images of a KPhotoAlbum index that match the given tags,
//! exclusions, capture time and path substrings.
//!
//! # Usage
//!
//! ```bash
//! # Images tagged "paris", as absolute paths
//! kpa-grep -t paris
//!
//! # Feed matches to another tool
//! kpa-grep -t paris --since "last month" --print0 | xargs -0 feh
//!
//! # Whole records as KPhotoAlbum XML fragments
//! kpa-grep -t paris --xml
//!
//! # Check recorded md5sums of everything shot this year
//! kpa-grep --since "this year" --verify
//! ```
//!
//! # Configuration
//!
//! Optional defaults live in the user's config directory
//! (`~/.config/kpa-grep/config.toml` on Linux) and `KPA_GREP_*` environment
//! variables. Without `--index` or a configured index, the album KPhotoAlbum
//! last opened is used.

use chrono::Local;
use colored::Colorize;
use kpa_grep::{
    cli::Cli,
    commands::{self, RunOptions},
    config::{AppConfig, SystemEnv},
    KpaError,
};
use std::io::{self, BufWriter, ErrorKind, Write};
use std::process::ExitCode;

type Result<T> = std::result::Result<T, KpaError>;

fn run(cli: &Cli) -> Result<()> {
    let config = AppConfig::load()?;
    let options = RunOptions::resolve(cli, &config, &SystemEnv, Local::now().naive_local())?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    commands::run(&options, &mut out)?;
    out.flush()?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        // Reader went away (e.g. piped into `head`).
        Err(KpaError::IoError(e)) if e.kind() == ErrorKind::BrokenPipe => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
