use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{crate_description, crate_version, ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::debug;

use sechist::date_bounds::{parse_datetime, DateBounds};
use sechist::issue_id::IssueId;
use sechist::profile::{PermanentErrorPolicy, ProjectProfile};
use sechist::report::ReportFormat;
use sechist::workdir::WorkDir;

// -----------------------------------------------------------------------------
// command-line args
// -----------------------------------------------------------------------------
#[derive(Parser, Debug)]
#[command(
    author,   // retrieved from Cargo.toml `authors`
    version,  // retrieved from Cargo.toml `version`
    about,    // retrieved from Cargo.toml `description`

    long_version = concat!(
        crate_version!(),
    ),

    long_about = concat!(
        crate_description!(),
        "\n\n",
        "The work is split into three phases, run in order: `collect`, `identify`, and `match`.",
    ),
)]
#[deny(missing_docs)]
/// Find the commits that fix security issues in the history of a browser engine
pub struct CommandLineArgs {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub global_args: GlobalArgs,
}

impl CommandLineArgs {
    pub fn parse_args() -> Self {
        let mut s = Self::parse();

        // If `NO_COLOR` is set in the environment, disable colored output
        //
        // https://no-color.org/
        if std::env::var("NO_COLOR").is_ok() {
            s.global_args.color = Mode::Never
        }

        s
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Collect the issue IDs referenced in a repository's history
    ///
    /// Every commit message in the selected window of history is searched for issue references
    /// according to the project's conventions. The unique IDs found are written to
    /// `<OUT>/<PROJECT>_issue_ids.json`, in the order they were first seen.
    #[command(display_order = 1)]
    Collect(CollectArgs),

    /// Ask the issue tracker which collected issues are security-related
    ///
    /// Issue IDs are queried one at a time, with a pause between queries, and each verdict is
    /// saved to `<OUT>/<PROJECT>_classification.db` before the next query is made.
    ///
    /// Issues that already have a saved verdict are never queried again, so an interrupted run
    /// can simply be restarted. When a query fails more often than `--retry` allows, the run stops
    /// and reports the `--from` value to resume with.
    ///
    /// A Bugzilla API key can be supplied using the `SECHIST_BUGZILLA_API_KEY` environment variable.
    #[command(display_order = 2)]
    Identify(IdentifyArgs),

    /// Write out the commits that reference security-related issues
    ///
    /// History is scanned again, and every commit that references at least one issue identified
    /// as security-related is written to `<OUT>/<PROJECT>_sec_commits.<FORMAT>`, in history order.
    #[command(display_order = 3)]
    Match(MatchArgs),
}

// -----------------------------------------------------------------------------
// global options
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
#[command(next_help_heading = "Global Options")]
pub struct GlobalArgs {
    /// Use the built-in profile of the specified project
    #[arg(global=true, long, short, value_name="PROJECT")]
    pub project: Option<Project>,

    /// Use the project profile in the specified YAML file instead of a built-in one
    #[arg(global=true, long, value_name="FILE")]
    pub profile: Option<PathBuf>,

    /// Read and write phase files in the specified directory
    #[arg(global=true, long, short, value_name="DIR", env("SECHIST_OUT"), default_value=".")]
    pub out: PathBuf,

    /// Enable verbose output
    ///
    /// This can be repeated up to 3 times to enable successively more output.
    #[arg(global=true, long, short, action=ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error feedback messages
    ///
    /// This silences WARNING, INFO, DEBUG, and TRACE messages and disables progress bars.
    /// This overrides any provided verbosity and progress reporting options.
    #[arg(global=true, long, short)]
    pub quiet: bool,

    /// Enable or disable colored output
    ///
    /// When this is "auto", colors are enabled when stdout is a tty.
    ///
    /// If the `NO_COLOR` environment variable is set, it takes precedence and is equivalent to `--color=never`.
    #[arg(global=true, long, default_value_t=Mode::Auto, value_name="MODE")]
    pub color: Mode,

    /// Enable or disable progress bars
    ///
    /// When this is "auto", progress bars are enabled when stderr is a tty.
    #[arg(global=true, long, default_value_t=Mode::Auto, value_name="MODE")]
    pub progress: Mode,
}

impl GlobalArgs {
    pub fn use_color(&self) -> bool {
        match self.color {
            Mode::Never => false,
            Mode::Always => true,
            Mode::Auto => atty::is(atty::Stream::Stdout),
        }
    }

    pub fn use_progress(&self) -> bool {
        if self.quiet {
            return false;
        }
        match self.progress {
            Mode::Never => false,
            Mode::Always => true,
            Mode::Auto => atty::is(atty::Stream::Stderr),
        }
    }

    /// Load the selected project profile.
    pub fn load_profile(&self) -> Result<ProjectProfile> {
        match (&self.profile, &self.project) {
            (Some(path), _) => ProjectProfile::from_yaml_file(path),
            (None, Some(project)) => ProjectProfile::builtin(project.name())
                .with_context(|| format!("Failed to load profile for {}", project.name())),
            (None, None) => bail!("No project specified; use `--project` or `--profile`"),
        }
    }

    pub fn workdir(&self, profile: &ProjectProfile) -> WorkDir {
        let workdir = WorkDir::new(&self.out, &profile.name);
        debug!("Using output directory {}", workdir.root().display());
        workdir
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum Mode {
    Auto,
    Never,
    Always,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Mode::Auto => "auto",
            Mode::Never => "never",
            Mode::Always => "always",
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Project {
    /// WebKit, with issues in bugs.webkit.org
    Webkit,

    /// Firefox, with issues in bugzilla.mozilla.org
    Firefox,
}

impl Project {
    pub fn name(&self) -> &'static str {
        match self {
            Project::Webkit => "webkit",
            Project::Firefox => "firefox",
        }
    }
}

// -----------------------------------------------------------------------------
// history options
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
#[command(next_help_heading = "History Options")]
pub struct HistoryArgs {
    /// Path to a local clone of the project's Git repository
    #[arg(long, short, value_name = "DIR")]
    pub repo: PathBuf,

    /// Scan the history reachable from the specified revision
    #[arg(long, value_name = "REV", default_value = "HEAD")]
    pub rev: String,

    /// Only consider commits committed before the specified time
    ///
    /// The time is given as `YYYY-MM-DD [HH[:MM[:SS]]]` and interpreted as UTC.
    #[arg(long, value_name = "DATETIME", value_parser = parse_datetime)]
    pub before: Option<DateTime<Utc>>,

    /// Only consider commits committed after the specified time
    ///
    /// The time is given as `YYYY-MM-DD [HH[:MM[:SS]]]` and interpreted as UTC.
    #[arg(long, value_name = "DATETIME", value_parser = parse_datetime)]
    pub after: Option<DateTime<Utc>>,
}

impl HistoryArgs {
    pub fn bounds(&self) -> DateBounds {
        DateBounds::new(self.after, self.before)
    }
}

// -----------------------------------------------------------------------------
// `collect` command
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
pub struct CollectArgs {
    #[command(flatten)]
    pub history_args: HistoryArgs,
}

// -----------------------------------------------------------------------------
// `identify` command
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
pub struct IdentifyArgs {
    /// Repeat a failed query up to the specified number of times before giving up
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub retry: usize,

    /// Start with the specified issue ID, skipping the IDs collected before it
    #[arg(long, value_name = "ID")]
    pub from: Option<IssueId>,

    /// Stop after the specified issue ID, skipping the IDs collected after it
    #[arg(long, value_name = "ID")]
    pub to: Option<IssueId>,

    /// Wait at least the specified number of seconds between tracker queries
    #[arg(long, value_name = "SECONDS", default_value_t = sechist::defaults::DEFAULT_REQUEST_DELAY_SECS)]
    pub delay: f64,

    /// Wait the specified number of seconds before repeating a failed query
    ///
    /// If the tracker asks for a longer wait, that is used instead.
    #[arg(long, value_name = "SECONDS", default_value_t = sechist::defaults::DEFAULT_RETRY_DELAY_SECS)]
    pub retry_delay: f64,

    /// Discard all saved verdicts before starting
    #[arg(long)]
    pub reset: bool,

    /// Use the issue tracker at the specified base URL instead of the project's
    #[arg(long, value_name = "URL")]
    pub tracker_url: Option<String>,

    /// What to do when the tracker rejects a query, e.g., for an issue that does not exist
    ///
    /// If not given, the project profile decides.
    #[arg(long, value_name = "POLICY")]
    pub on_permanent_error: Option<PermanentErrorArg>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PermanentErrorArg {
    /// Stop the run
    Abort,

    /// Record the issue as not security-related and continue
    NotSecurity,
}

impl From<PermanentErrorArg> for PermanentErrorPolicy {
    fn from(arg: PermanentErrorArg) -> Self {
        match arg {
            PermanentErrorArg::Abort => PermanentErrorPolicy::Abort,
            PermanentErrorArg::NotSecurity => PermanentErrorPolicy::NotSecurity,
        }
    }
}

// -----------------------------------------------------------------------------
// `match` command
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
pub struct MatchArgs {
    #[command(flatten)]
    pub history_args: HistoryArgs,

    /// Write output in the specified format
    #[arg(long, short, value_name="FORMAT", default_value_t=OutputFormat::Json)]
    pub format: OutputFormat,

    /// Include author, committer, and message of each commit
    #[arg(long)]
    pub extended: bool,
}

// -----------------------------------------------------------------------------
// output format
// -----------------------------------------------------------------------------
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON format
    Json,

    /// YAML format
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
        };
        write!(f, "{s}")
    }
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => ReportFormat::Json,
            OutputFormat::Yaml => ReportFormat::Yaml,
        }
    }
}
