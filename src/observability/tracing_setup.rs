//! Tracing subscriber initialization for the replay binary.
//!
//! Filter priority, highest first: `STREAMEVAL_LOG`, `RUST_LOG`, the
//! `--verbose`/`--quiet` flags, then the default `warn`.

use tracing::Level;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Env var holding per-target filter directives.
pub const LOG_ENV_VAR: &str = "STREAMEVAL_LOG";

/// Verbosity level derived from CLI flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

impl Verbosity {
    /// Verbose wins when both flags are set.
    pub const fn from_flags(verbose: bool, quiet: bool) -> Self {
        if verbose {
            Self::Verbose
        } else if quiet {
            Self::Quiet
        } else {
            Self::Normal
        }
    }

    /// Level used when no env directives apply.
    pub const fn default_level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::WARN,
            Self::Verbose => Level::DEBUG,
        }
    }
}

/// Resolves the filter from the environment, falling back to `verbosity`.
pub fn build_env_filter(verbosity: Verbosity) -> EnvFilter {
    for var in [LOG_ENV_VAR, "RUST_LOG"] {
        if let Ok(directives) = std::env::var(var) {
            if let Ok(filter) = EnvFilter::try_new(&directives) {
                return filter;
            }
        }
    }
    EnvFilter::new(verbosity.default_level().as_str().to_ascii_lowercase())
}

/// Installs the global stderr subscriber. Returns `false` if one was already set.
pub fn init_subscriber(verbosity: Verbosity) -> bool {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);
    tracing_subscriber::registry()
        .with(build_env_filter(verbosity))
        .with(fmt_layer)
        .try_init()
        .is_ok()
}
