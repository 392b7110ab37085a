//! Structured error types for the solver.
//!
//! `SolverError` is the type callers can match on (configuration vs. mesh
//! vs. arithmetic vs. solver-state failures); most internal call sites
//! instead propagate through `anyhow::Result` and attach context with
//! `.context(...)`, reserving the variant match for the handful of call
//! sites (the CLI's exit-code mapping) that care which kind of failure
//! occurred.

use thiserror::Error;

/// A fatal error raised anywhere in the spatial operator or time loop.
///
/// Every variant here is intentionally unrecoverable per spec: the only
/// local recovery paths are the wall-BC density/pressure floors and the
/// Barth-Jespersen limiter clip, both of which live next to the code they
/// protect rather than going through this type.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("mesh error: {0}")]
    Mesh(String),

    #[error(
        "arithmetic error at shard {shard}, element {element}, field {field} (step {step}, sub-step {sub_step}): {detail}"
    )]
    Arithmetic {
        shard: usize,
        element: usize,
        field: usize,
        step: u64,
        sub_step: usize,
        detail: String,
    },

    #[error("solver state error: {0}")]
    SolverState(String),

    #[error("boundary condition error: {0}")]
    BoundaryCondition(String),
}

impl SolverError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn mesh(msg: impl Into<String>) -> Self {
        Self::Mesh(msg.into())
    }

    pub fn solver_state(msg: impl Into<String>) -> Self {
        Self::SolverState(msg.into())
    }

    pub fn boundary_condition(msg: impl Into<String>) -> Self {
        Self::BoundaryCondition(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SolverError>;
