// src/errors.rs

//! Crate-wide error type and helpers.

use std::time::Duration;

use thiserror::Error;

use crate::model::optimisation::OptimisationState;

#[derive(Error, Debug)]
pub enum OptimisationError {
    /// The optimisation input is infeasible or malformed (domain error).
    #[error("Optimisation input invalid: {0}")]
    Validation(String),

    /// The solver reported an internal error.
    #[error("Solver error: {0}")]
    Solver(String),

    /// The engine run exceeded its soft time limit.
    #[error("Soft time limit of {0:?} exceeded")]
    SoftTimeout(Duration),

    #[error("Illegal state transition {from:?} -> {to:?}")]
    IllegalTransition {
        from: OptimisationState,
        to: OptimisationState,
    },

    #[error("Unknown {entity} id: {id}")]
    NotFound { entity: &'static str, id: u64 },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OptimisationError {
    pub fn not_found(entity: &'static str, id: u64) -> Self {
        OptimisationError::NotFound { entity, id }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, OptimisationError>;
