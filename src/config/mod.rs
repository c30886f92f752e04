pub mod endpoint;
pub mod settings;

#[cfg(feature = "cli")]
use crate::config::settings::RunSettings;
#[cfg(feature = "cli")]
use clap::{Parser, ValueEnum};
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "matrix-etl")]
#[command(about = "Configuration-driven ETL: convert a source endpoint into a target endpoint")]
pub struct CliConfig {
    /// JSON config file describing the source endpoint
    pub source_config: String,

    /// Key of the source entry inside the source config file
    pub source_key: String,

    /// JSON config file describing the target endpoint
    pub target_config: String,

    /// Key of the target entry inside the target config file
    pub target_key: String,

    /// Optional TOML file with run settings
    #[arg(long)]
    pub settings: Option<String>,

    #[arg(long, help = "Records per chunk (default 1000)")]
    pub chunk_size: Option<usize>,

    #[arg(long, help = "Transform worker count (default: available parallelism)")]
    pub workers: Option<usize>,

    #[arg(long, help = "Run timeout in seconds")]
    pub timeout: Option<u64>,

    #[arg(long, help = "Directory for OUTPUT artifacts")]
    pub output_dir: Option<String>,

    #[arg(long, value_enum, default_value = "compact")]
    pub log_format: LogFormat,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,

    #[arg(long, help = "Resolve and dispatch only, no data I/O")]
    pub dry_run: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// 命令列參數覆蓋設定檔
    pub fn apply_overrides(&self, settings: &mut RunSettings) {
        if let Some(chunk_size) = self.chunk_size {
            settings.pipeline.chunk_size = Some(chunk_size);
        }
        if let Some(workers) = self.workers {
            settings.pipeline.workers = Some(workers);
        }
        if let Some(timeout) = self.timeout {
            settings.pipeline.timeout_seconds = Some(timeout);
        }
        if let Some(output_dir) = &self.output_dir {
            settings.output.directory = Some(output_dir.clone());
        }
    }
}
