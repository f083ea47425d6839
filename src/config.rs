// src/config.rs

//! Orchestrator configuration.
//!
//! This only covers the knobs the orchestration layer itself needs: the work
//! queue capacity and the solver's soft time limit. Everything solver- or
//! cluster-specific travels inside the optimisation's own options blob.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::{OptimisationError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub solver: SolverSection,
    pub queue: QueueSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SolverSection {
    /// Soft time limit for one engine run, in seconds. A run that exceeds it
    /// is classified as a soft timeout, not a generic failure.
    pub soft_time_limit_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueSection {
    /// Capacity of the work queue channel.
    pub capacity: usize,
}

impl Default for SolverSection {
    fn default() -> Self {
        Self {
            soft_time_limit_secs: 3000,
        }
    }
}

impl Default for QueueSection {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            solver: SolverSection::default(),
            queue: QueueSection::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn soft_time_limit(&self) -> Duration {
        Duration::from_secs(self.solver.soft_time_limit_secs)
    }

    fn validate(self) -> Result<Self> {
        if self.queue.capacity == 0 {
            return Err(OptimisationError::ConfigError(
                "[queue].capacity must be >= 1 (got 0)".to_string(),
            ));
        }
        if self.solver.soft_time_limit_secs == 0 {
            return Err(OptimisationError::ConfigError(
                "[solver].soft_time_limit_secs must be >= 1 (got 0)".to_string(),
            ));
        }
        Ok(self)
    }
}

/// Load configuration from a TOML file and run semantic validation.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<OrchestratorConfig> {
    let contents = fs::read_to_string(path.as_ref())?;
    load_from_str(&contents)
}

/// Parse and validate configuration from a TOML string.
pub fn load_from_str(contents: &str) -> Result<OrchestratorConfig> {
    let config: OrchestratorConfig = toml::from_str(contents)?;
    config.validate()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = load_from_str("").unwrap();
        assert_eq!(cfg.queue.capacity, 64);
        assert_eq!(cfg.solver.soft_time_limit_secs, 3000);
    }

    #[test]
    fn parses_sections() {
        let cfg = load_from_str(
            "[solver]\nsoft_time_limit_secs = 120\n\n[queue]\ncapacity = 8\n",
        )
        .unwrap();
        assert_eq!(cfg.solver.soft_time_limit_secs, 120);
        assert_eq!(cfg.queue.capacity, 8);
    }

    #[test]
    fn rejects_zero_capacity() {
        let err = load_from_str("[queue]\ncapacity = 0\n").unwrap_err();
        assert!(matches!(err, OptimisationError::ConfigError(_)));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Routeflow.toml");
        std::fs::write(&path, "[solver]\nsoft_time_limit_secs = 5\n").unwrap();
        let cfg = load_and_validate(&path).unwrap();
        assert_eq!(cfg.soft_time_limit(), Duration::from_secs(5));
    }
}
