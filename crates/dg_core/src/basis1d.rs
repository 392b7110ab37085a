//! Orthonormal Jacobi polynomial basis on `[-1, 1]`: point evaluation,
//! Gauss/Gauss-Lobatto quadrature nodes, and the 1D Vandermonde stack.
//!
//! This is the leaf layer everything else in the crate is built on:
//! the Dubiner basis of the triangle (`reference_triangle`) is a tensor
//! product of these polynomials in collapsed coordinates, and the
//! Raviart-Thomas edge nodes (`rt_element`) sit at the Gauss abscissae
//! computed here.

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use special::Gamma;

fn gamma0(alpha: f64, beta: f64) -> f64 {
    2f64.powf(alpha + beta + 1.0) / (alpha + beta + 1.0) * (alpha + 1.0).gamma() * (beta + 1.0).gamma()
        / (alpha + beta + 1.0).gamma()
}

fn gamma1(alpha: f64, beta: f64) -> f64 {
    gamma0(alpha, beta) * (alpha + 1.0) * (beta + 1.0) / (alpha + beta + 3.0)
}

/// Evaluates the order-`n` orthonormal Jacobi polynomial `P_n^{alpha,beta}`
/// at every point in `r`, via the three-term recurrence.
pub fn jacobi_p(r: &[f64], alpha: f64, beta: f64, n: usize) -> Vec<f64> {
    let nc = r.len();
    let rg = 1.0 / gamma0(alpha, beta).sqrt();
    if n == 0 {
        return vec![rg; nc];
    }

    let mut pl: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    pl.push(vec![rg; nc]);

    let ab = alpha + beta;
    let rg1 = 1.0 / gamma1(alpha, beta).sqrt();
    let mut row1 = vec![0.0; nc];
    for i in 0..nc {
        row1[i] = rg1 * ((ab + 2.0) * r[i] / 2.0 + (alpha - beta) / 2.0);
    }
    pl.push(row1);

    if n == 1 {
        return pl.pop().unwrap();
    }

    let a1 = alpha + 1.0;
    let b1 = beta + 1.0;
    let ab1 = ab + 1.0;
    let mut aold = 2.0 * (a1 * b1 / (ab + 3.0)).sqrt() / (ab + 2.0);

    for i in 0..(n - 1) {
        let ip1 = (i + 1) as f64;
        let ip2 = ip1 + 1.0;
        let h1 = 2.0 * ip1 + ab;
        let anew = 2.0 / (h1 + 2.0)
            * (ip2 * (ip1 + ab1) * (ip1 + a1) * (ip1 + b1) / (h1 + 1.0) / (h1 + 3.0)).sqrt();
        let bnew = -(alpha * alpha - beta * beta) / h1 / (h1 + 2.0);

        let (xi, xip1) = (&pl[i], &pl[i + 1]);
        let mut next = vec![0.0; nc];
        for j in 0..nc {
            next[j] = (-aold * xi[j] + (r[j] - bnew) * xip1[j]) / anew;
        }
        pl.push(next);
        aold = anew;
    }

    pl.pop().unwrap()
}

/// Derivative of `P_n^{alpha,beta}`, via `P' = sqrt(n(n+alpha+beta+1)) P_{n-1}^{alpha+1,beta+1}`.
pub fn grad_jacobi_p(r: &[f64], alpha: f64, beta: f64, n: usize) -> Vec<f64> {
    if n == 0 {
        return vec![0.0; r.len()];
    }
    let fac = ((n as f64) * (n as f64 + alpha + beta + 1.0)).sqrt();
    jacobi_p(r, alpha + 1.0, beta + 1.0, n - 1)
        .into_iter()
        .map(|v| v * fac)
        .collect()
}

/// Gauss quadrature nodes/weights for the Jacobi weight `(1-x)^alpha (1+x)^beta`,
/// obtained by diagonalizing the Golub-Welsch symmetric tridiagonal matrix.
pub fn jacobi_gq(alpha: f64, beta: f64, n: usize) -> (Vec<f64>, Vec<f64>) {
    if n == 0 {
        let x = -(alpha - beta) / (alpha + beta + 2.0);
        return (vec![x], vec![2.0]);
    }

    let np1 = n + 1;
    let mut h1 = vec![0.0; np1];
    for i in 0..np1 {
        h1[i] = 2.0 * i as f64 + alpha + beta;
    }

    let mut diag = vec![0.0; np1];
    let fac = -0.5 * (alpha * alpha - beta * beta);
    for i in 0..np1 {
        diag[i] = fac / (h1[i] * (h1[i] + 2.0));
    }
    if alpha + beta < 10.0 * 1e-16 {
        diag[0] = 0.0;
    }

    let mut off = vec![0.0; n];
    for i in 0..n {
        let ip1 = (i + 1) as f64;
        off[i] = 2.0 / (h1[i] + 2.0)
            * (ip1 * (ip1 + alpha + beta) * (ip1 + alpha) * (ip1 + beta) / (h1[i] + 1.0)
                / (h1[i] + 3.0))
                .sqrt();
    }

    let mut mat = DMatrix::<f64>::zeros(np1, np1);
    for i in 0..np1 {
        mat[(i, i)] = diag[i];
    }
    for i in 0..n {
        mat[(i, i + 1)] = off[i];
        mat[(i + 1, i)] = off[i];
    }

    let eig = SymmetricEigen::new(mat);
    let mut pairs: Vec<(f64, usize)> = eig.eigenvalues.iter().copied().zip(0..np1).collect();
    pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

    let mut x = vec![0.0; np1];
    let mut w = vec![0.0; np1];
    let g0 = gamma0(alpha, beta);
    for (slot, (val, orig_col)) in pairs.into_iter().enumerate() {
        x[slot] = val;
        let first = eig.eigenvectors[(0, orig_col)];
        w[slot] = first * first * g0;
    }
    (x, w)
}

/// `N+1` Gauss-Lobatto abscissae (endpoints `+/-1` plus interior Gauss
/// points of `jacobi_gq(alpha+1, beta+1, N-2)`).
pub fn jacobi_gl(alpha: f64, beta: f64, n: usize) -> Vec<f64> {
    let mut x = vec![0.0; n + 1];
    if n == 1 {
        x[0] = -1.0;
        x[1] = 1.0;
        return x;
    }
    let (xint, _) = jacobi_gq(alpha + 1.0, beta + 1.0, n - 2);
    x[0] = -1.0;
    x[n] = 1.0;
    x[1..n].copy_from_slice(&xint);
    x
}

/// 1D Vandermonde matrix: column `j` holds `P_j^{0,0}` evaluated at `r`.
pub fn vandermonde_1d(n: usize, r: &[f64]) -> DMatrix<f64> {
    let mut v = DMatrix::<f64>::zeros(r.len(), n + 1);
    for j in 0..=n {
        let col = jacobi_p(r, 0.0, 0.0, j);
        for i in 0..r.len() {
            v[(i, j)] = col[i];
        }
    }
    v
}

/// Derivative counterpart of [`vandermonde_1d`].
pub fn grad_vandermonde_1d(n: usize, r: &[f64]) -> DMatrix<f64> {
    let mut v = DMatrix::<f64>::zeros(r.len(), n + 1);
    for j in 0..=n {
        let col = grad_jacobi_p(r, 0.0, 0.0, j);
        for i in 0..r.len() {
            v[(i, j)] = col[i];
        }
    }
    v
}

/// Convenience: Gauss-Legendre (alpha=beta=0) nodes/weights as `DVector`s.
pub fn gauss_legendre(n: usize) -> (DVector<f64>, DVector<f64>) {
    let (x, w) = jacobi_gq(0.0, 0.0, n);
    (DVector::from_vec(x), DVector::from_vec(w))
}
