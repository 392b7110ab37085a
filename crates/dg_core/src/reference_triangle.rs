//! The order-`N` Lagrange reference triangle: warp-and-blend nodes, the
//! Dubiner modal Vandermonde stack, derivative matrices, mass matrix,
//! edge lift, and the flux-edge interpolation matrix used to carry the
//! solution to the RT element's edge nodes.
//!
//! Reference triangle vertices are `(-1,-1)`, `(1,-1)`, `(-1,1)`. Edges
//! are numbered by which side of the triangle they lie on:
//! edge 0 is the hypotenuse (`r+s=0`), edge 1 is the left edge (`r=-1`),
//! edge 2 is the bottom edge (`s=-1`) -- matching the normal-direction
//! convention used when the Raviart-Thomas element is built.

use crate::basis1d::{gauss_legendre, grad_jacobi_p, jacobi_gl, jacobi_p, vandermonde_1d};
use crate::error::{Result, SolverError};
use nalgebra::DMatrix;

const NODE_TOL: f64 = 1e-8;

/// Optimal warp-and-blend alpha for `N in 1..=15`; `5/3` beyond that.
const ALPHA_OPT: [f64; 16] = [
    0.0000, 0.0000, 1.4152, 0.1001, 0.2751, 0.9800, 1.0999, 1.2832, 1.3648, 1.4773, 1.4959,
    1.5743, 1.5770, 1.6223, 1.6258, 1.6258,
];

fn warp_alpha(n: usize) -> f64 {
    if n < ALPHA_OPT.len() {
        ALPHA_OPT[n]
    } else {
        5.0 / 3.0
    }
}

/// Computes the 1D "warp" displacement used to push equidistant nodes
/// towards the Gauss-Lobatto distribution along one edge.
fn warp_factor(n: usize, rout: &[f64]) -> Vec<f64> {
    let lgl = jacobi_gl(0.0, 0.0, n);
    let req: Vec<f64> = (0..=n)
        .map(|i| -1.0 + 2.0 * i as f64 / n as f64)
        .collect();
    let veq = vandermonde_1d(n, &req);

    let mut pmat = DMatrix::<f64>::zeros(n + 1, rout.len());
    for i in 0..=n {
        let row = jacobi_p(rout, 0.0, 0.0, i);
        for j in 0..rout.len() {
            pmat[(i, j)] = row[j];
        }
    }

    let veq_t = veq.transpose();
    let lmat_t = veq_t
        .lu()
        .solve(&pmat)
        .expect("warp factor: equidistant Vandermonde is always invertible");
    let lmat = lmat_t.transpose();

    let diff: Vec<f64> = lgl.iter().zip(&req).map(|(a, b)| a - b).collect();
    let warp = &lmat * DMatrix::from_vec(rout.len(), 1, diff);

    let mut out = vec![0.0; rout.len()];
    for i in 0..rout.len() {
        let mut zerof = if rout[i].abs() < 1.0 { 1.0 } else { rout[i] };
        zerof -= 1e-10;
        let sf = 1.0 - (zerof * rout[i]).powi(2);
        out[i] = warp[(i, 0)] / sf * (zerof - 1.0);
    }
    out
}

/// Warp-and-blend nodal set of order `N` on the equilateral triangle,
/// returned as equilateral `(x, y)` coordinates.
fn equilateral_nodes(n: usize) -> (Vec<f64>, Vec<f64>) {
    let np = (n + 1) * (n + 2) / 2;
    let alpha = warp_alpha(n);
    let fnn = 1.0 / n as f64;

    let mut l1 = vec![0.0; np];
    let mut l2 = vec![0.0; np];
    let mut l3 = vec![0.0; np];
    let mut x = vec![0.0; np];
    let mut y = vec![0.0; np];

    let mut sk = 0;
    for nn in 0..=n {
        for m in 0..(n + 1 - nn) {
            l1[sk] = nn as f64 * fnn;
            l3[sk] = m as f64 * fnn;
            l2[sk] = 1.0 - l1[sk] - l3[sk];
            x[sk] = l3[sk] - l2[sk];
            y[sk] = (-l3[sk] - l2[sk] + 2.0 * l1[sk]) / 3f64.sqrt();
            sk += 1;
        }
    }

    let blend1: Vec<f64> = (0..np).map(|i| 4.0 * l3[i] * l2[i]).collect();
    let blend2: Vec<f64> = (0..np).map(|i| 4.0 * l1[i] * l3[i]).collect();
    let blend3: Vec<f64> = (0..np).map(|i| 4.0 * l2[i] * l1[i]).collect();

    let d32: Vec<f64> = (0..np).map(|i| l3[i] - l2[i]).collect();
    let d13: Vec<f64> = (0..np).map(|i| l1[i] - l3[i]).collect();
    let d21: Vec<f64> = (0..np).map(|i| l2[i] - l1[i]).collect();
    let warpf1 = warp_factor(n, &d32);
    let warpf2 = warp_factor(n, &d13);
    let warpf3 = warp_factor(n, &d21);

    for i in 0..np {
        let warp1 = blend1[i] * warpf1[i] * (1.0 + (alpha * l1[i]).sqrt());
        let warp2 = blend2[i] * warpf2[i] * (1.0 + (alpha * l2[i]).sqrt());
        let warp3 = blend3[i] * warpf3[i] * (1.0 + (alpha * l3[i]).sqrt());
        x[i] += warp1 + (2.0 * std::f64::consts::PI / 3.0).cos() * warp2
            + (4.0 * std::f64::consts::PI / 3.0).cos() * warp3;
        y[i] += (2.0 * std::f64::consts::PI / 3.0).sin() * warp2
            + (4.0 * std::f64::consts::PI / 3.0).sin() * warp3;
    }

    (x, y)
}

/// Equilateral `(x, y)` to reference-triangle `(r, s)`.
fn xy_to_rs(x: &[f64], y: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let sr3 = 3f64.sqrt();
    let np = x.len();
    let mut r = vec![0.0; np];
    let mut s = vec![0.0; np];
    for i in 0..np {
        let l1 = (sr3 * y[i] + 1.0) / 3.0;
        let l2 = (-3.0 * x[i] - sr3 * y[i] + 2.0) / 6.0;
        let l3 = (3.0 * x[i] - sr3 * y[i] + 2.0) / 6.0;
        r[i] = -l2 + l3 - l1;
        s[i] = -l2 - l3 + l1;
    }
    (r, s)
}

/// Collapsed coordinates `(a, b)` from `(r, s)` (`b = s`).
pub(crate) fn rs_to_ab(r: &[f64], s: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut a = vec![0.0; r.len()];
    for i in 0..r.len() {
        a[i] = if s[i] != 1.0 {
            2.0 * (1.0 + r[i]) / (1.0 - s[i]) - 1.0
        } else {
            -1.0
        };
    }
    (a, s.to_vec())
}

/// Dubiner basis function `psi_{ij}(a,b) = sqrt(2) P_i^{0,0}(a) P_j^{2i+1,0}(b) (1-b)^i`.
pub(crate) fn simplex_2d_p(a: &[f64], b: &[f64], i: usize, j: usize) -> Vec<f64> {
    let h1 = jacobi_p(a, 0.0, 0.0, i);
    let h2 = jacobi_p(b, 2.0 * i as f64 + 1.0, 0.0, j);
    let sq2 = 2f64.sqrt();
    (0..a.len())
        .map(|k| sq2 * h1[k] * h2[k] * (1.0 - b[k]).powi(i as i32))
        .collect()
}

/// r/s-derivatives of [`simplex_2d_p`].
pub(crate) fn grad_simplex_2d_p(a: &[f64], b: &[f64], id: usize, jd: usize) -> (Vec<f64>, Vec<f64>) {
    let fa = jacobi_p(a, 0.0, 0.0, id);
    let dfa = grad_jacobi_p(a, 0.0, 0.0, id);
    let gb = jacobi_p(b, 2.0 * id as f64 + 1.0, 0.0, jd);
    let dgb = grad_jacobi_p(b, 2.0 * id as f64 + 1.0, 0.0, jd);

    let n = a.len();
    let mut ddr = vec![0.0; n];
    let mut dds = vec![0.0; n];
    let norm = 2f64.powf(id as f64 + 0.5);

    for k in 0..n {
        let pow_id_m1 = if id > 0 { (0.5 * (1.0 - b[k])).powi(id as i32 - 1) } else { 1.0 };
        let pow_id = (0.5 * (1.0 - b[k])).powi(id as i32);

        let mut dr = dfa[k] * gb[k];
        if id > 0 {
            dr *= pow_id_m1;
        }
        ddr[k] = dr * norm;

        let mut ds = 0.5 * dfa[k] * gb[k] * (1.0 + a[k]);
        if id > 0 {
            ds *= pow_id_m1;
        }
        let mut tmp = dgb[k] * pow_id;
        if id > 0 {
            tmp -= 0.5 * id as f64 * gb[k] * pow_id_m1;
        }
        ds += fa[k] * tmp;
        dds[k] = ds * norm;
    }
    (ddr, dds)
}

/// 2D Vandermonde over the Dubiner basis, column `sk` <-> pair `(i, j)` with
/// `i + j <= N` in the usual row-major triangular enumeration.
fn vandermonde_2d(n: usize, r: &[f64], s: &[f64]) -> DMatrix<f64> {
    let (a, b) = rs_to_ab(r, s);
    let np = (n + 1) * (n + 2) / 2;
    let mut v = DMatrix::<f64>::zeros(r.len(), np);
    let mut sk = 0;
    for i in 0..=n {
        for j in 0..=(n - i) {
            let col = simplex_2d_p(&a, &b, i, j);
            for k in 0..r.len() {
                v[(k, sk)] = col[k];
            }
            sk += 1;
        }
    }
    v
}

fn grad_vandermonde_2d(n: usize, r: &[f64], s: &[f64]) -> (DMatrix<f64>, DMatrix<f64>) {
    let (a, b) = rs_to_ab(r, s);
    let np = (n + 1) * (n + 2) / 2;
    let mut vr = DMatrix::<f64>::zeros(r.len(), np);
    let mut vs = DMatrix::<f64>::zeros(r.len(), np);
    let mut sk = 0;
    for i in 0..=n {
        for j in 0..=(n - i) {
            let (ddr, dds) = grad_simplex_2d_p(&a, &b, i, j);
            for k in 0..r.len() {
                vr[(k, sk)] = ddr[k];
                vs[(k, sk)] = dds[k];
            }
            sk += 1;
        }
    }
    (vr, vs)
}

/// Indices of the solution nodes lying on each of the three reference edges.
pub struct FaceMask {
    pub edges: [Vec<usize>; 3],
}

fn build_face_mask(r: &[f64], s: &[f64]) -> FaceMask {
    let mut edges: [Vec<usize>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for i in 0..r.len() {
        if (r[i] + s[i]).abs() < NODE_TOL {
            edges[0].push(i);
        }
        if (r[i] + 1.0).abs() < NODE_TOL {
            edges[1].push(i);
        }
        if (s[i] + 1.0).abs() < NODE_TOL {
            edges[2].push(i);
        }
    }
    FaceMask { edges }
}

/// The immutable order-`N` Lagrange reference triangle.
pub struct LagrangeElement {
    pub n: usize,
    pub np: usize,
    pub nedge: usize,
    pub r: Vec<f64>,
    pub s: Vec<f64>,
    pub v: DMatrix<f64>,
    pub v_inv: DMatrix<f64>,
    pub mass: DMatrix<f64>,
    pub dr: DMatrix<f64>,
    pub ds: DMatrix<f64>,
    pub lift: DMatrix<f64>,
    pub face_mask: FaceMask,
    /// Maps solution-node values to the `3*Nedge` edge Gauss points, edge-by-edge.
    pub flux_edge_interp: DMatrix<f64>,
    /// Reference `(r, s)` of the edge Gauss points, laid out edge-by-edge.
    pub edge_r: Vec<f64>,
    pub edge_s: Vec<f64>,
}

impl LagrangeElement {
    pub fn build(n: usize) -> Result<Self> {
        if n < 1 {
            return Err(SolverError::configuration("PolynomialOrder must be >= 1"));
        }
        let np = (n + 1) * (n + 2) / 2;
        let nedge = n + 1;

        let (ex, ey) = equilateral_nodes(n);
        let (r, s) = xy_to_rs(&ex, &ey);

        let v = vandermonde_2d(n, &r, &s);
        let v_inv = v
            .clone()
            .try_inverse()
            .ok_or_else(|| SolverError::solver_state("Lagrange Vandermonde is singular"))?;
        let mass = (&v_inv).transpose() * &v_inv;

        let (vr, vs) = grad_vandermonde_2d(n, &r, &s);
        let dr = &vr * &v_inv;
        let ds = &vs * &v_inv;

        let face_mask = build_face_mask(&r, &s);
        for (e, nodes) in face_mask.edges.iter().enumerate() {
            if nodes.len() != nedge {
                return Err(SolverError::solver_state(format!(
                    "edge {e} face mask has {} nodes, expected {nedge}",
                    nodes.len()
                )));
            }
        }

        let lift = build_lift(n, np, nedge, &r, &s, &v, &face_mask)?;

        let (edge_r, edge_s) = edge_gauss_points(nedge);
        let vnew = vandermonde_2d(n, &edge_r, &edge_s);
        let flux_edge_interp = &vnew * &v_inv;

        Ok(Self {
            n,
            np,
            nedge,
            r,
            s,
            v,
            v_inv,
            mass,
            dr,
            ds,
            lift,
            face_mask,
            flux_edge_interp,
            edge_r,
            edge_s,
        })
    }
}

/// Gauss-Legendre points on each of the three reference edges, in
/// reference `(r, s)` coordinates, laid out edge-by-edge.
pub(crate) fn edge_gauss_points(nedge: usize) -> (Vec<f64>, Vec<f64>) {
    let (gx, _) = gauss_legendre(nedge - 1);
    let verts = [(-1.0, -1.0), (1.0, -1.0), (-1.0, 1.0)];
    // edge0: v1->v2, edge1: v2->v0, edge2: v0->v1
    let edge_vertex_pairs = [(verts[1], verts[2]), (verts[2], verts[0]), (verts[0], verts[1])];

    let mut r = Vec::with_capacity(3 * nedge);
    let mut s = Vec::with_capacity(3 * nedge);
    for (a, b) in edge_vertex_pairs {
        for &t in gx.iter() {
            let tt = (t + 1.0) / 2.0;
            r.push(a.0 + tt * (b.0 - a.0));
            s.push(a.1 + tt * (b.1 - a.1));
        }
    }
    (r, s)
}

fn build_lift(
    n: usize,
    np: usize,
    nedge: usize,
    r: &[f64],
    s: &[f64],
    v: &DMatrix<f64>,
    face_mask: &FaceMask,
) -> Result<DMatrix<f64>> {
    let mut emat = DMatrix::<f64>::zeros(np, 3 * nedge);

    for (e, nodes) in face_mask.edges.iter().enumerate() {
        // Edge 0 and 1 vary along r or an oblique direction; edge 2 varies
        // along r too at s=-1. Parametrize each edge's own nodes by whichever
        // of r or s actually varies along it, matching the book convention
        // of using the coordinate that is not fixed on that edge.
        let param: Vec<f64> = match e {
            0 => nodes.iter().map(|&i| r[i]).collect(),
            1 => nodes.iter().map(|&i| s[i]).collect(),
            _ => nodes.iter().map(|&i| r[i]).collect(),
        };
        let v1d = vandermonde_1d(n, &param);
        let gram = &v1d * v1d.transpose();
        let mass_edge = gram
            .try_inverse()
            .ok_or_else(|| SolverError::solver_state("edge mass matrix is singular"))?;
        for (li, &gi) in nodes.iter().enumerate() {
            for (lj, _) in nodes.iter().enumerate() {
                emat[(gi, e * nedge + lj)] = mass_edge[(li, lj)];
            }
        }
    }

    Ok(v * (v.transpose() * emat))
}
