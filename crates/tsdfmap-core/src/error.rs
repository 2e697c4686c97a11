//! Domain error types shared across the workspace.
//!
//! Library crates return these directly; `tsdfmap-cli` wraps them in
//! `anyhow::Result` with `.context(...)` at the process boundary.

use thiserror::Error;

/// Configuration validation failures, raised by `Config::validate`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },
    #[error("`{a}` and `{b}` cannot both be enabled")]
    MutuallyExclusive { a: &'static str, b: &'static str },
}

/// Errors surfaced by the mapping pipeline, integrators, and pose graph.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A transport-level failure (queue full, sensor timeout) that the
    /// caller may reasonably retry.
    #[error("transient transport failure: {0}")]
    TransportTransient(String),

    /// Malformed or out-of-range input (NaN points, mismatched frame,
    /// empty cloud where one is required).
    #[error("invalid input: {0}")]
    InputInvalid(String),

    /// A pose-graph constraint referenced an unknown node or carried a
    /// malformed information matrix.
    #[error("malformed constraint: {0}")]
    ConstraintMalformed(String),

    /// The nonlinear least-squares solver failed to converge within its
    /// iteration/tolerance budget.
    #[error("solver did not converge: {0}")]
    SolverNonConvergence(String),

    /// Serialization / deserialization / file IO failure.
    #[error("io failure: {0}")]
    IoFailure(#[from] std::io::Error),

    /// A resource bound (queue length, block budget, thread pool) was
    /// exceeded.
    #[error("resource exhausted: {0}")]
    ResourceExhaustion(String),
}

pub type MapResult<T> = Result<T, MapError>;
