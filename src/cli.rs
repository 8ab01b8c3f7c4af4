use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "cms-image-import",
    version,
    about = "Migrate inline article images into locally stored CMS image assets"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Import(ImportArgs),
    Scan(ScanArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    #[arg(long, default_value = "drupal.sqlite")]
    pub db_path: PathBuf,

    #[arg(long, default_value = "files")]
    pub files_root: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = 30)]
    pub http_timeout_secs: u64,

    #[arg(long, default_value_t = 5000)]
    pub busy_timeout_ms: u64,

    #[arg(long, value_enum, default_value_t = MissingBodyPolicy::Abort)]
    pub missing_body: MissingBodyPolicy,
}

/// What to do with an article node that has no current body row.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum MissingBodyPolicy {
    Abort,
    Skip,
}

impl MissingBodyPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Abort => "abort",
            Self::Skip => "skip",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    #[arg(long, default_value = "drupal.sqlite")]
    pub db_path: PathBuf,

    #[arg(long, default_value_t = 5000)]
    pub busy_timeout_ms: u64,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = "drupal.sqlite")]
    pub db_path: PathBuf,

    #[arg(long, default_value = "files")]
    pub files_root: PathBuf,
}
