//! # Service Configuration
//!
//! Command-line options, each with a `FILE_LOADER_*` environment fallback.
//! Explicit flags win over the environment, which wins over defaults.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use fileloader_core::DigestAlgorithm;
use fileloader_store::config::DEFAULT_CHUNK_SIZE;
use fileloader_store::{StoreConfig, StoreError};

/// Prefix shared by every environment variable read by [`AppConfig`].
pub const ENV_PREFIX: &str = "FILE_LOADER_";

/// Content-addressed file storage over HTTP.
#[derive(Parser, Debug, Clone)]
#[command(name = "fileloader-api", version, about, long_about = None)]
pub struct AppConfig {
    /// Address the HTTP listener binds to.
    #[arg(long, env = "FILE_LOADER_API_ADDRESS", default_value = "0.0.0.0")]
    pub api_address: String,

    /// Port the HTTP listener binds to.
    #[arg(
        long,
        env = "FILE_LOADER_API_PORT",
        default_value_t = 8081,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub api_port: u16,

    /// Storage root. Created with its parents at startup if missing.
    #[arg(long, env = "FILE_LOADER_STORAGE", default_value = "./storage")]
    pub storage: PathBuf,

    /// Chunk size in bytes for streaming downloads.
    #[arg(
        long,
        env = "FILE_LOADER_CHUNK_SIZE",
        default_value_t = DEFAULT_CHUNK_SIZE,
        value_parser = parse_positive
    )]
    pub chunk_size: usize,

    /// Digest algorithm naming stored blobs (md5 or sha256).
    #[arg(long, env = "FILE_LOADER_DIGEST", default_value_t = DigestAlgorithm::Md5)]
    pub digest: DigestAlgorithm,

    /// Minimum log level.
    #[arg(long, env = "FILE_LOADER_LOG_LEVEL", value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log line format.
    #[arg(long, env = "FILE_LOADER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Staging files older than this many seconds are swept.
    #[arg(long, env = "FILE_LOADER_STAGING_MAX_AGE_SECS", default_value_t = 3600)]
    pub staging_max_age_secs: u64,

    /// Seconds between staging sweeps. 0 disables the sweep.
    #[arg(long, env = "FILE_LOADER_SWEEP_INTERVAL_SECS", default_value_t = 600)]
    pub sweep_interval_secs: u64,

    /// Write the process id here while running.
    #[arg(long, env = "FILE_LOADER_PID_FILE")]
    pub pid_file: Option<PathBuf>,

    /// Account to switch to once the listener is bound.
    #[arg(long, env = "FILE_LOADER_USER")]
    pub user: Option<String>,
}

/// Log verbosity accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

impl LogLevel {
    /// `EnvFilter` directive for this level. `fatal` has no tracing
    /// equivalent and maps to `error`.
    pub fn directive(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error | Self::Fatal => "error",
        }
    }
}

/// Log output format.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Plain,
    Json,
}

fn parse_positive(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("must be greater than zero".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

impl AppConfig {
    /// Blob store settings derived from these options.
    pub fn store_config(&self) -> Result<StoreConfig, StoreError> {
        let config = StoreConfig::new(&self.storage)
            .with_chunk_size(self.chunk_size)
            .with_algorithm(self.digest)
            .with_staging_max_age(Duration::from_secs(self.staging_max_age_secs));
        config.validate()?;
        Ok(config)
    }

    /// Interval of the background staging sweep, if enabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}

/// Remove every `FILE_LOADER_*` variable from the process environment.
///
/// Must run before any other thread is spawned.
pub fn clear_env() {
    let keys: Vec<_> = std::env::vars_os()
        .filter_map(|(key, _)| {
            key.to_str()
                .filter(|k| k.starts_with(ENV_PREFIX))
                .map(str::to_owned)
        })
        .collect();
    for key in keys {
        std::env::remove_var(key);
    }
}
