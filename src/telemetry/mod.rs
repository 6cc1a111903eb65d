//! Logging setup
//!
//! `RUST_LOG` wins when set; otherwise the CLI verbosity picks the level.

use crate::cli::Verbosity;
use tracing_subscriber::EnvFilter;

/// Default filter directive for a verbosity level
pub fn default_directive(verbosity: Verbosity) -> &'static str {
    match verbosity {
        Verbosity::Quiet => "warn",
        Verbosity::Normal => "info",
        Verbosity::Verbose => "epiguard=debug,info",
        Verbosity::VeryVerbose => "trace",
    }
}

/// Install the global tracing subscriber
pub fn init(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    // A subscriber may already be installed (tests, embedding)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert_eq!(default_directive(Verbosity::Quiet), "warn");
        assert_eq!(default_directive(Verbosity::Normal), "info");
        assert!(default_directive(Verbosity::Verbose).contains("debug"));
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(Verbosity::Normal);
        init(Verbosity::Verbose);
    }
}
