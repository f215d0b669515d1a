//! Utility module
//!
//! This module provides common helpers used by binaries and demos embedding
//! the library.

use tracing_subscriber::EnvFilter;

use crate::core::{Error, Result};

/// Installs a formatted `tracing` subscriber filtered by `filter`
///
/// `RUST_LOG`, when set, takes precedence over `filter`.
pub fn init_logging(filter: &str) -> Result<()> {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(env) if !env.trim().is_empty() => EnvFilter::try_new(env),
        _ => EnvFilter::try_new(filter),
    }
    .map_err(|e| Error::config(format!("Invalid log filter: {}", e)))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| Error::config(format!("Failed to install log subscriber: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice() {
        // Only one global subscriber can be installed per process
        let _ = init_logging("lora_clocksync=debug");
        assert!(init_logging("info").is_err());
    }
}
