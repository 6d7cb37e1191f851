use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "corral",
    about = "corral: a dependency resolver, lockfile, and installer",
    version,
    long_about = None
)]
pub struct Cli {
    /// Print verbose resolver/installer debug output.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimum severity of log lines written to stderr.
    #[arg(long = "log-level", short = 'l', global = true, default_value_t = LogLevel::Info, value_enum)]
    pub log_level: LogLevel,

    /// Output format for machine readability.
    #[arg(long, global = true, default_value_t = OutputFormat::Text, value_enum)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        write!(f, "{s}")
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
        };
        write!(f, "{s}")
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new project.toml in the current directory.
    Init(InitArgs),
    /// Resolve and install dependencies, writing/reading the lockfile.
    #[command(alias = "i")]
    Install(InstallArgs),
    /// Re-resolve ignoring the current lockfile's pins and rewrite it.
    Update(UpdateArgs),
    /// List locked packages that have a newer version available.
    Outdated(OutdatedArgs),
    /// Check project.toml and the lockfile for consistency problems.
    Lint(LintArgs),
    /// List every package the lockfile currently pins.
    List(ListArgs),
    /// Print the resolved version and source of a single package.
    Get(GetArgs),
    /// Print metadata about the current project.
    Info(InfoArgs),
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Project name. Defaults to the current directory's name.
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Registry base URL to resolve packages against.
    #[arg(long, default_value = "https://registry.example.invalid")]
    pub registry: String,
    /// Directory packages are installed into.
    #[arg(long, default_value = "vendor")]
    pub target: PathBuf,
    /// Resolve without consulting the network; fail if anything is missing
    /// from the lockfile.
    #[arg(long)]
    pub offline: bool,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    #[arg(long, default_value = "https://registry.example.invalid")]
    pub registry: String,
    /// Limit the re-resolve to these packages; omit to update everything.
    #[arg(value_name = "PACKAGE")]
    pub packages: Vec<String>,
}

#[derive(Args, Debug)]
pub struct OutdatedArgs {
    #[arg(long, default_value = "https://registry.example.invalid")]
    pub registry: String,
}

#[derive(Args, Debug)]
pub struct LintArgs {}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Also print each package's own dependencies.
    #[arg(long)]
    pub tree: bool,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    #[arg(value_name = "PACKAGE")]
    pub package: String,
}

#[derive(Args, Debug)]
pub struct InfoArgs {}
