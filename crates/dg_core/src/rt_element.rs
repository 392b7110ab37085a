//! The custom Raviart-Thomas flux element of order `N+1`.
//!
//! Layout of the `NpFlux = (N+1)(N+3)` degrees of freedom: `2*NpInt`
//! interior DOFs (`NpInt = N(N+1)/2` points, each carrying an r- and an
//! s-component) followed by `3*Nedge` edge-normal DOFs (`Nedge = N+1`
//! points per edge). The provisional polynomial space is
//! `[P_N]^2 (+) x * P~_N` (total-degree-<=N vector fields, plus position
//! times homogeneous-degree-N scalars); its `NpFlux` basis functions are
//! made unisolvent on this node/test-direction layout by inverting the
//! square interpolation matrix `A` described in the spec (see
//! `DESIGN.md` for how the interior node locations were chosen -- the
//! original `NewRTElement` construction was not present in the
//! retrieved reference source).

use crate::error::{Result, SolverError};
use crate::reference_triangle::{
    edge_gauss_points, grad_simplex_2d_p, rs_to_ab, simplex_2d_p, LagrangeElement,
};
use nalgebra::DMatrix;

/// Outward unit normals for edges 0 (hypotenuse), 1 (left), 2 (bottom) of
/// the *reference* triangle only, used solely to build the RT
/// interpolation matrix `A` below (the test direction assigned to each
/// edge node). This has no relationship to any physical mesh triangle's
/// edge normal -- those are genuinely different per element and are
/// computed straight from vertex coordinates in `mesh.rs`'s
/// `EdgeSide::{nx,ny}`, not derived from this constant.
pub const EDGE_REF_NORMALS: [(f64, f64); 3] = [
    (std::f64::consts::FRAC_1_SQRT_2, std::f64::consts::FRAC_1_SQRT_2),
    (-1.0, 0.0),
    (0.0, -1.0),
];

pub struct RtElement {
    pub n: usize,
    pub np_int: usize,
    pub nedge: usize,
    pub np_flux: usize,
    /// Divergence operator: `Np x NpFlux`, maps RT DOF to divergence at
    /// the order-`N` solution points.
    pub div: DMatrix<f64>,
    /// Interior node locations, length `NpInt`.
    pub interior_r: Vec<f64>,
    pub interior_s: Vec<f64>,
}

impl RtElement {
    /// `sol` is the order-`N` Lagrange solution element; its nodes are
    /// where the divergence operator's output rows live.
    pub fn build(n: usize, sol: &LagrangeElement) -> Result<Self> {
        let np_int = n * (n + 1) / 2;
        let nedge = n + 1;
        let np_flux = (n + 1) * (n + 3);
        let np = (n + 1) * (n + 2) / 2;

        let (interior_r, interior_s) = interior_nodes(n, np_int)?;
        let (edge_r, edge_s) = edge_gauss_points(nedge);

        // --- provisional basis column catalogue ---
        // 0..np            : (phi_a, 0)
        // np..2*np         : (0, phi_a)
        // 2*np..2*np+(n+1) : (r*m_k, s*m_k), m_k = r^(n-k) s^k homogeneous degree n
        let dubiner_pairs = dubiner_index_pairs(n);
        debug_assert_eq!(dubiner_pairs.len(), np);

        let eval_basis = |r: f64, s: f64| -> Vec<(f64, f64)> {
            let rs = [r];
            let ss = [s];
            let (a, b) = rs_to_ab(&rs, &ss);
            let mut out = Vec::with_capacity(np_flux);
            for &(i, j) in &dubiner_pairs {
                let phi = simplex_2d_p(&a, &b, i, j)[0];
                out.push((phi, 0.0));
            }
            for &(i, j) in &dubiner_pairs {
                let phi = simplex_2d_p(&a, &b, i, j)[0];
                out.push((0.0, phi));
            }
            for k in 0..=n {
                let m = r.powi((n - k) as i32) * s.powi(k as i32);
                out.push((r * m, s * m));
            }
            out
        };

        let eval_div_basis = |r: f64, s: f64| -> Vec<f64> {
            let rs = [r];
            let ss = [s];
            let (a, b) = rs_to_ab(&rs, &ss);
            let mut out = Vec::with_capacity(np_flux);
            for &(i, j) in &dubiner_pairs {
                let (ddr, _) = grad_simplex_2d_p(&a, &b, i, j);
                out.push(ddr[0]);
            }
            for &(i, j) in &dubiner_pairs {
                let (_, dds) = grad_simplex_2d_p(&a, &b, i, j);
                out.push(dds[0]);
            }
            for k in 0..=n {
                let m = r.powi((n - k) as i32) * s.powi(k as i32);
                out.push((n as f64 + 2.0) * m);
            }
            out
        };

        // --- matrix A: row = (node, test direction), col = basis function ---
        let mut a = DMatrix::<f64>::zeros(np_flux, np_flux);
        for i in 0..np_int {
            let basis = eval_basis(interior_r[i], interior_s[i]);
            for (col, (br, _bs)) in basis.iter().enumerate() {
                a[(i, col)] = *br;
            }
        }
        for i in 0..np_int {
            let basis = eval_basis(interior_r[i], interior_s[i]);
            for (col, (_br, bs)) in basis.iter().enumerate() {
                a[(np_int + i, col)] = *bs;
            }
        }
        for e in 0..3 {
            let (nx, ny) = EDGE_REF_NORMALS[e];
            for j in 0..nedge {
                let idx = e * nedge + j;
                let row = 2 * np_int + idx;
                let basis = eval_basis(edge_r[idx], edge_s[idx]);
                for (col, (br, bs)) in basis.iter().enumerate() {
                    a[(row, col)] = nx * br + ny * bs;
                }
            }
        }

        let c = a
            .try_inverse()
            .ok_or_else(|| SolverError::solver_state("RT interpolation matrix A is singular"))?;

        // --- Gdiv: Np x NpFlux, divergence of each provisional basis function
        // at the order-N solution points ---
        let mut gdiv = DMatrix::<f64>::zeros(np, np_flux);
        for i in 0..np {
            let row = eval_div_basis(sol.r[i], sol.s[i]);
            for (col, val) in row.into_iter().enumerate() {
                gdiv[(i, col)] = val;
            }
        }

        let div = gdiv * c;

        Ok(Self {
            n,
            np_int,
            nedge,
            np_flux,
            div,
            interior_r,
            interior_s,
        })
    }
}

fn dubiner_index_pairs(n: usize) -> Vec<(usize, usize)> {
    let mut pairs = Vec::with_capacity((n + 1) * (n + 2) / 2);
    for i in 0..=n {
        for j in 0..=(n - i) {
            pairs.push((i, j));
        }
    }
    pairs
}

/// Interior RT node locations. For `N == 1` there is a single interior
/// point (the centroid); for `N >= 2` the order-`(N-1)` Lagrange nodal
/// set has exactly `N(N+1)/2` nodes, so it is reused directly.
fn interior_nodes(n: usize, np_int: usize) -> Result<(Vec<f64>, Vec<f64>)> {
    if np_int == 0 {
        return Ok((Vec::new(), Vec::new()));
    }
    if n == 1 {
        return Ok((vec![-1.0 / 3.0], vec![-1.0 / 3.0]));
    }
    let lower = LagrangeElement::build(n - 1)?;
    debug_assert_eq!(lower.np, np_int);
    Ok((lower.r, lower.s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn np_flux_matches_invariant() {
        for n in 1..=6 {
            let np_int = n * (n + 1) / 2;
            let nedge = n + 1;
            assert_eq!(2 * np_int + 3 * nedge, (n + 1) * (n + 3));
        }
    }

    #[test]
    fn divergence_operator_has_expected_shape() {
        for n in 1..=4 {
            let sol = LagrangeElement::build(n).unwrap();
            let rt = RtElement::build(n, &sol).unwrap();
            assert_eq!(rt.div.nrows(), sol.np);
            assert_eq!(rt.div.ncols(), rt.np_flux);
        }
    }

    #[test]
    fn divergence_of_constant_flux_is_zero() {
        // A constant vector flux (Fx, Fy) = (1, 0) has zero divergence
        // everywhere; exercise the whole DOF-assembly -> divergence path.
        let n = 2;
        let sol = LagrangeElement::build(n).unwrap();
        let rt = RtElement::build(n, &sol).unwrap();

        let np_int = rt.np_int;
        let nedge = rt.nedge;
        let mut dof = vec![0.0; rt.np_flux];
        for i in 0..np_int {
            dof[i] = 1.0; // Fx=1 at interior r-rows
            dof[np_int + i] = 0.0; // Fy=0 at interior s-rows
        }
        let (edge_r, edge_s) = edge_gauss_points(nedge);
        for e in 0..3 {
            let (nx, _ny) = EDGE_REF_NORMALS[e];
            for j in 0..nedge {
                let idx = e * nedge + j;
                let _ = (edge_r[idx], edge_s[idx]);
                dof[2 * np_int + idx] = nx * 1.0;
            }
        }

        let dof_vec = DMatrix::from_vec(rt.np_flux, 1, dof);
        let divergence = &rt.div * dof_vec;
        for i in 0..sol.np {
            assert!(
                divergence[(i, 0)].abs() < 1e-6,
                "divergence of constant flux should vanish, got {}",
                divergence[(i, 0)]
            );
        }
    }
}
