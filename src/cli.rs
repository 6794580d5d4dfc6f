//! Command-line interface definitions and parsing
//!
//! `kpa-grep` has no subcommands: the flags describe one query against one
//! index, plus how to print the results.
//!
//! # Examples
//!
//! ```bash
//! # Every image tagged both "paris" and "trip"
//! kpa-grep -t paris -t trip
//!
//! # Images from the last week that are not tagged "private", as JSON
//! kpa-grep --since "last week" -x private --json
//!
//! # Tags used by images under 2010/
//! kpa-grep -p 2010/ --tags-only --show-category
//! ```

use crate::output::{OutputFormat, OutputOptions};
use crate::query::FilterCriteria;
use chrono::NaiveDateTime;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "kpa-grep",
    version,
    about = "Search a KPhotoAlbum index by tag, capture time and path"
)]
pub struct Cli {
    /// Index file (default: from the config file or KPhotoAlbum's own settings)
    #[arg(long, value_name = "PATH")]
    pub index: Option<PathBuf>,

    /// Image must carry this tag (repeatable, all must match)
    #[arg(short = 't', long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Image must not carry this tag (repeatable)
    #[arg(short = 'x', long = "exclude", value_name = "TAG")]
    pub excludes: Vec<String>,

    /// Only images taken after this time ("2010-01-01", "last week", "3 days ago")
    #[arg(short = 's', long, value_name = "EXPR")]
    pub since: Option<String>,

    /// Path must contain this substring (repeatable, any may match)
    #[arg(short = 'p', long = "path", value_name = "SUBSTR")]
    pub paths: Vec<String>,

    /// Output format
    #[arg(long, value_enum, value_name = "FORMAT", conflicts_with_all = ["json", "xml", "markdown"])]
    pub format: Option<OutputFormat>,

    /// Shorthand for --format json
    #[arg(long, conflicts_with_all = ["xml", "markdown"])]
    pub json: bool,

    /// Shorthand for --format xml
    #[arg(long, conflicts_with = "markdown")]
    pub xml: bool,

    /// Shorthand for --format markdown
    #[arg(long)]
    pub markdown: bool,

    /// Terminate plain output with NUL instead of newline
    #[arg(long)]
    pub print0: bool,

    /// Print paths as stored in the index instead of joined with its directory
    #[arg(long)]
    pub relative: bool,

    /// Print the distinct tags of matching images instead of the images
    #[arg(long, conflicts_with = "verify")]
    pub tags_only: bool,

    /// With --tags-only, print tags as category/tag
    #[arg(long, requires = "tags_only")]
    pub show_category: bool,

    /// Check matching images against their recorded md5sum
    #[arg(long)]
    pub verify: bool,

    /// Build the store in memory and leave the cache alone
    #[arg(long, conflicts_with = "rebuild")]
    pub no_cache: bool,

    /// Rebuild the cached store even if it looks current
    #[arg(long)]
    pub rebuild: bool,

    /// Cache directory (default: platform cache dir + kpa-grep)
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Only print results (and, with --verify, only mismatches)
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// More log output on stderr (repeat for more)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Parse command-line arguments
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Format chosen on the command line, if any
    #[must_use]
    pub const fn output_format(&self) -> Option<OutputFormat> {
        if self.json {
            Some(OutputFormat::Json)
        } else if self.xml {
            Some(OutputFormat::Xml)
        } else if self.markdown {
            Some(OutputFormat::Markdown)
        } else {
            self.format
        }
    }

    #[must_use]
    pub const fn output_options(&self, print0_default: bool) -> OutputOptions {
        OutputOptions {
            print0: self.print0 || print0_default,
            show_category: self.show_category,
        }
    }

    /// Filter criteria from the flags, with `since` already resolved
    #[must_use]
    pub fn criteria(&self, since: Option<NaiveDateTime>) -> FilterCriteria {
        let builder = FilterCriteria::builder()
            .tags(self.tags.iter().cloned())
            .excludes(self.excludes.iter().cloned())
            .paths(self.paths.iter().cloned());
        match since {
            Some(since) => builder.since(since).build(),
            None => builder.build(),
        }
    }

    /// Log level for stderr diagnostics
    #[must_use]
    pub const fn log_level(&self) -> Level {
        if self.quiet {
            return Level::ERROR;
        }
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::parse_timestamp;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("kpa-grep").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_repeatable_filters() {
        let cli = parse(&["-t", "paris", "--tag", "trip", "-x", "london", "-p", "2010", "-p", "2011"]);
        assert_eq!(cli.tags, vec!["paris", "trip"]);
        assert_eq!(cli.excludes, vec!["london"]);
        assert_eq!(cli.paths, vec!["2010", "2011"]);

        let criteria = cli.criteria(None);
        assert_eq!(criteria.required_tags.len(), 2);
        assert!(criteria.excluded_tags.contains("london"));
        assert_eq!(criteria.path_substrings, vec!["2010", "2011"]);
        assert!(criteria.since.is_none());
    }

    #[test]
    fn test_criteria_takes_resolved_since() {
        let cli = parse(&["--since", "yesterday"]);
        assert_eq!(cli.since.as_deref(), Some("yesterday"));
        let since = parse_timestamp("2020-01-01").unwrap();
        assert_eq!(cli.criteria(Some(since)).since, Some(since));
    }

    #[test]
    fn test_format_shorthands() {
        assert_eq!(parse(&[]).output_format(), None);
        assert_eq!(parse(&["--json"]).output_format(), Some(OutputFormat::Json));
        assert_eq!(parse(&["--xml"]).output_format(), Some(OutputFormat::Xml));
        assert_eq!(parse(&["--markdown"]).output_format(), Some(OutputFormat::Markdown));
        assert_eq!(
            parse(&["--format", "markdown"]).output_format(),
            Some(OutputFormat::Markdown)
        );
    }

    #[test]
    fn test_conflicting_flags_rejected() {
        for args in [
            &["kpa-grep", "--json", "--xml"][..],
            &["kpa-grep", "--format", "plain", "--json"],
            &["kpa-grep", "--no-cache", "--rebuild"],
            &["kpa-grep", "--tags-only", "--verify"],
            &["kpa-grep", "--show-category"],
        ] {
            assert!(Cli::try_parse_from(args).is_err(), "{args:?} should fail");
        }
    }

    #[test]
    fn test_log_levels() {
        assert_eq!(parse(&[]).log_level(), Level::WARN);
        assert_eq!(parse(&["-v"]).log_level(), Level::INFO);
        assert_eq!(parse(&["-vv"]).log_level(), Level::DEBUG);
        assert_eq!(parse(&["-vvv"]).log_level(), Level::TRACE);
        assert_eq!(parse(&["-q", "-vv"]).log_level(), Level::ERROR);
    }

    #[test]
    fn test_output_options() {
        let cli = parse(&["--tags-only", "--show-category"]);
        assert_eq!(
            cli.output_options(true),
            OutputOptions {
                print0: true,
                show_category: true
            }
        );
        assert!(!parse(&[]).output_options(false).print0);
    }
}
