//! Command line arguments for `subval`.

use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{ColorChoice, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use colorchoice_clap::Color;
use subval_model::DataType;
use subval_server::logging::{LogConfig, LogFormat};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(
    name = "subval",
    version,
    about = "Validate tab-separated data submissions",
    long_about = "Validate tab-separated data submissions.\n\n\
                  Checks required files, key uniqueness, foreign key relations and\n\
                  surjectivity across file types, either once for a directory or\n\
                  continuously for every project queued in an open release."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for warnings only).
    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for humans, json for log shippers).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the validation scheduler over an open release until Ctrl-C.
    Serve(ServeArgs),

    /// Validate one submission directory and print a summary.
    Validate(ValidateArgs),

    /// List the key declarations of every file type.
    FileTypes,
}

#[derive(Parser)]
pub struct ServeArgs {
    /// Server configuration file.
    #[arg(long = "config", value_name = "PATH", default_value = "subval.toml")]
    pub config: PathBuf,

    /// Name of the release to open.
    #[arg(long = "release", value_name = "NAME", default_value = "release1")]
    pub release: String,

    /// Dictionary version recorded on the release.
    #[arg(long = "dictionary-version", value_name = "VERSION", default_value = "0.1")]
    pub dictionary_version: String,

    /// Override `validator.max_simultaneous`.
    #[arg(long = "max-simultaneous", value_name = "N")]
    pub max_simultaneous: Option<usize>,

    /// Data types queued for every project found (default: all).
    #[arg(long = "data-type", value_name = "TYPE", value_delimiter = ',')]
    pub data_types: Vec<DataType>,

    /// Address notified about every project's validation.
    #[arg(long = "notify", value_name = "EMAIL")]
    pub notify: Vec<String>,
}

#[derive(Parser)]
pub struct ValidateArgs {
    /// Directory holding the submission files.
    #[arg(value_name = "SUBMISSION_DIR")]
    pub submission_dir: PathBuf,

    /// Directory holding previously accepted files of the same project.
    #[arg(long = "existing", value_name = "DIR")]
    pub existing: Option<PathBuf>,

    /// Deletion manifest (default: <SUBMISSION_DIR>/deletions.txt when present).
    #[arg(long = "deletions", value_name = "FILE")]
    pub deletions: Option<PathBuf>,

    /// Data types to validate (default: every data type with files present).
    #[arg(long = "data-type", value_name = "TYPE", value_delimiter = ',')]
    pub data_types: Vec<DataType>,

    /// Write normalized observation files to this directory.
    #[arg(long = "normalized-dir", value_name = "DIR")]
    pub normalized_dir: Option<PathBuf>,

    /// Print the report as JSON instead of tables.
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

impl From<LogLevelArg> for LevelFilter {
    fn from(level: LogLevelArg) -> Self {
        match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        }
    }
}

impl From<LogFormatArg> for LogFormat {
    fn from(format: LogFormatArg) -> Self {
        match format {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Compact => LogFormat::Compact,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

impl Cli {
    /// Logging settings from the global flags.
    ///
    /// `--log-level` wins over `-v`/`-q`; `RUST_LOG` applies only when neither is given.
    pub fn log_config(&self) -> LogConfig {
        let explicit = self.verbosity.is_present() || self.log_level.is_some();
        let with_ansi = match self.color.color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => self.log_file.is_none() && io::stderr().is_terminal(),
        };
        LogConfig {
            level_filter: self
                .log_level
                .map_or_else(|| self.verbosity.tracing_level_filter(), LevelFilter::from),
            use_env_filter: !explicit,
            with_ansi,
            format: self.log_format.into(),
            log_file: self.log_file.clone(),
            ..LogConfig::default()
        }
    }
}
