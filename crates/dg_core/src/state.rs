//! Per-shard solution, edge, and RT DOF array layouts (spec.md sec 3),
//! plus the Runge-Kutta working-state buffers.
//!
//! Storage is column-major-by-field: field `i`, local element `k` sits
//! at offset `k + kshard * i` inside a flat `Vec<f64>` of length
//! `rows * kshard`. This is exactly `nalgebra::DMatrix`'s native
//! column-major layout when `rows` is the row count, so these wrappers
//! are thin views over a `DMatrix<f64>` per field.

use nalgebra::DMatrix;

pub const NUM_FIELDS: usize = 4;

/// A `(rows x kshard)` matrix per conservative field.
#[derive(Debug, Clone)]
pub struct FieldArray {
    pub fields: [DMatrix<f64>; NUM_FIELDS],
}

impl FieldArray {
    pub fn zeros(rows: usize, kshard: usize) -> Self {
        Self {
            fields: std::array::from_fn(|_| DMatrix::zeros(rows, kshard)),
        }
    }

    pub fn rows(&self) -> usize {
        self.fields[0].nrows()
    }

    pub fn kshard(&self) -> usize {
        self.fields[0].ncols()
    }
}

/// Per-shard working state: solution nodes `Q` (`Np x Kshard`), edge
/// nodes `Q_face` (`3*Nedge x Kshard`), and the RT DOF array
/// `F_RT_DOF` (`NpFlux x Kshard`).
pub struct ShardState {
    pub q: FieldArray,
    pub q_face: FieldArray,
    pub f_rt_dof: FieldArray,
}

impl ShardState {
    pub fn new(np: usize, nedge: usize, np_flux: usize, kshard: usize) -> Self {
        Self {
            q: FieldArray::zeros(np, kshard),
            q_face: FieldArray::zeros(3 * nedge, kshard),
            f_rt_dof: FieldArray::zeros(np_flux, kshard),
        }
    }
}

/// The four-stage SSP RK working buffers: three intermediate snapshots,
/// the RHS, per-element local time step, and per-shard max wavespeed.
/// The Residual is aliased onto `q1` per spec.md sec 3 (no separate
/// allocation).
pub struct RkWorkspace {
    pub q1: FieldArray,
    pub q2: FieldArray,
    pub q3: FieldArray,
    pub rhs: FieldArray,
    pub local_dt: Vec<f64>,
    pub max_wavespeed: f64,
}

impl RkWorkspace {
    pub fn new(np: usize, kshard: usize) -> Self {
        Self {
            q1: FieldArray::zeros(np, kshard),
            q2: FieldArray::zeros(np, kshard),
            q3: FieldArray::zeros(np, kshard),
            rhs: FieldArray::zeros(np, kshard),
            local_dt: vec![0.0; kshard],
            max_wavespeed: 0.0,
        }
    }

    /// Residual is aliased onto `q1`: exposed as a mutable accessor
    /// rather than a second allocation.
    pub fn residual_mut(&mut self) -> &mut FieldArray {
        &mut self.q1
    }
}
