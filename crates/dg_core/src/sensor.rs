//! Persson modal-decay shock sensor, the scalar artificial-viscosity
//! field it drives, and the C0 vertex aggregation that smooths it
//! across element boundaries (spec.md sec 4.7).

use crate::reference_triangle::LagrangeElement;
use nalgebra::DMatrix;
use std::f64::consts::PI;

/// `S0 = 1/N^4`; the sensor's midpoint threshold.
pub fn s0(n: usize) -> f64 {
    1.0 / (n as f64).powi(4)
}

/// Builds `Clip = V * diag(1,...,1,0) * V^{-1}`, which truncates the
/// highest-order modal coefficient of a nodal field.
pub fn build_clip(el: &LagrangeElement) -> DMatrix<f64> {
    let np = el.np;
    let mut diag = DMatrix::<f64>::identity(np, np);
    diag[(np - 1, np - 1)] = 0.0;
    &el.v * diag * &el.v_inv
}

/// Persson indicator `S_e = log10(m)`, `m = sum_i (q_i - qhat_i)^2 / q_i^2`.
pub fn persson_indicator(q: &[f64], clip: &DMatrix<f64>) -> f64 {
    let np = q.len();
    let q_vec = DMatrix::from_vec(np, 1, q.to_vec());
    let q_hat = clip * &q_vec;
    let mut m = 0.0;
    for i in 0..np {
        let d = q[i] - q_hat[(i, 0)];
        m += d * d / (q[i] * q[i]);
    }
    m.log10()
}

/// Per-element scalar viscosity from the indicator, per spec's smoothed
/// step function with half-sine blending between `left` and `right`.
pub fn element_epsilon(s_e: f64, n: usize, jdet: f64, kappa: f64) -> f64 {
    let s0_val = s0(n);
    let left = s0_val - kappa;
    let right = s0_val + kappa;
    let eps0 = (2.0 * jdet).sqrt() / n as f64;

    if s_e < left {
        0.0
    } else if s_e < right {
        0.5 * eps0 * (1.0 + (PI * (s_e - s0_val) / (2.0 * kappa)).sin())
    } else {
        eps0
    }
}

/// Aggregates per-element epsilon onto mesh vertices by taking the max
/// over all elements incident to each vertex.
pub fn aggregate_vertex_epsilon(num_vertices: usize, e_to_v: &[[usize; 3]], element_eps: &[f64]) -> Vec<f64> {
    let mut vertex_eps = vec![0.0; num_vertices];
    for (k, tri) in e_to_v.iter().enumerate() {
        for &v in tri {
            if element_eps[k] > vertex_eps[v] {
                vertex_eps[v] = element_eps[k];
            }
        }
    }
    vertex_eps
}

/// Linearly interpolates the three vertex epsilon values back to an
/// element's solution points using the barycentric coordinates implied
/// by `(r, s)` on the reference triangle.
pub fn interpolate_epsilon_to_nodes(tri_vertex_eps: [f64; 3], r: &[f64], s: &[f64]) -> Vec<f64> {
    r.iter()
        .zip(s.iter())
        .map(|(&ri, &si)| {
            let l1 = -(ri + si) / 2.0;
            let l2 = (ri + 1.0) / 2.0;
            let l3 = (si + 1.0) / 2.0;
            l1 * tri_vertex_eps[0] + l2 * tri_vertex_eps[1] + l3 * tri_vertex_eps[2]
        })
        .collect()
}

/// Dissipation contribution `div(eps * grad Q)` on solution points for a
/// single field, per spec: apply Dr/Ds, scale by eps, apply Dr/Ds again,
/// divide by Jdet^2.
pub fn dissipation_laplacian(
    field: &[f64],
    eps: &[f64],
    dr: &DMatrix<f64>,
    ds: &DMatrix<f64>,
    jdet: f64,
) -> Vec<f64> {
    let np = field.len();
    let q = DMatrix::from_vec(np, 1, field.to_vec());
    let qr = dr * &q;
    let qs = ds * &q;

    let mut eps_qr = DMatrix::<f64>::zeros(np, 1);
    let mut eps_qs = DMatrix::<f64>::zeros(np, 1);
    for i in 0..np {
        eps_qr[(i, 0)] = eps[i] * qr[(i, 0)];
        eps_qs[(i, 0)] = eps[i] * qs[(i, 0)];
    }

    let lap_r = dr * &eps_qr;
    let lap_s = ds * &eps_qs;
    let jdet2 = jdet * jdet;
    (0..np).map(|i| (lap_r[(i, 0)] + lap_s[(i, 0)]) / jdet2).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smooth_field_sensor_stays_below_threshold() {
        let n = 4;
        let el = LagrangeElement::build(n).unwrap();
        let clip = build_clip(&el);
        // A field linear in r is exactly representable below the
        // highest mode, so clipping barely perturbs it.
        let q: Vec<f64> = el.r.iter().map(|&r| 2.0 + r).collect();
        let s_e = persson_indicator(&q, &clip);
        assert!(s_e < s0(n) - 4.0, "expected smooth field well below threshold, got {s_e}");
    }

    #[test]
    fn discontinuous_field_sensor_exceeds_threshold() {
        let n = 4;
        let el = LagrangeElement::build(n).unwrap();
        let clip = build_clip(&el);
        let q: Vec<f64> = el
            .r
            .iter()
            .map(|&r| if r < 0.0 { 1.0 } else { 10.0 })
            .collect();
        let s_e = persson_indicator(&q, &clip);
        assert!(s_e > s0(n) + 4.0, "expected jump field well above threshold, got {s_e}");
    }

    #[test]
    fn epsilon_is_zero_below_left_and_eps0_above_right() {
        let n = 4;
        let jdet = 0.5;
        let kappa = 4.0;
        let s0_val = s0(n);
        assert_eq!(element_epsilon(s0_val - kappa - 1.0, n, jdet, kappa), 0.0);
        let eps0 = (2.0 * jdet).sqrt() / n as f64;
        assert!((element_epsilon(s0_val + kappa + 1.0, n, jdet, kappa) - eps0).abs() < 1e-12);
    }

    #[test]
    fn vertex_aggregation_takes_max_over_incident_elements() {
        let e_to_v = vec![[0, 1, 2], [1, 3, 2]];
        let element_eps = vec![0.1, 0.5];
        let agg = aggregate_vertex_epsilon(4, &e_to_v, &element_eps);
        assert_eq!(agg[1], 0.5);
        assert_eq!(agg[2], 0.5);
        assert_eq!(agg[0], 0.1);
        assert_eq!(agg[3], 0.5);
    }
}
