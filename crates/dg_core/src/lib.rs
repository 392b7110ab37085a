//! Nodal DG / Direct Flux Reconstruction core: mesh topology, the
//! reference-triangle and Raviart-Thomas elements, Euler physics and
//! numerical fluxes, the spatial operator, and the 4-stage SSP
//! Runge-Kutta time driver.
//!
//! `dg_core` has no knowledge of disk formats, CLI flags, or process
//! exit codes -- those live in `dg_cli`. This crate only owns the
//! numerics and the in-memory concurrency model that runs them.

pub mod basis1d;
pub mod config;
pub mod error;
pub mod euler;
pub mod flux;
pub mod init;
pub mod limiter;
pub mod mesh;
pub mod operator;
pub mod partition;
pub mod reference_triangle;
pub mod rk;
pub mod rt_element;
pub mod sensor;
pub mod snapshot;
pub mod state;

pub use config::Config;
pub use error::{Result, SolverError};
pub use euler::State;
pub use mesh::{Mesh, MeshSource, RawMesh};
pub use operator::{build_periodic_partners, Axis, BoundaryKind, BoundaryTable};
pub use rk::{LimiterKind, RkDriver, SolverConfig, StepReport};
