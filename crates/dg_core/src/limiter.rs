//! Barth-Jespersen slope limiter (spec.md sec 4.7), applied only to
//! elements flagged by the shock sensor.

use nalgebra::DMatrix;

/// Limits a single field on one element given its three neighbor means.
///
/// `field` holds the nodal values on this element's solution points;
/// `r`, `s` the node locations; `dr`, `ds` the reference derivative
/// operators; `neighbor_means` the mean value of this field on the (up
/// to three) elements across each edge, `None` at boundaries.
pub fn limit_field(
    field: &mut [f64],
    r: &[f64],
    s: &[f64],
    dr: &DMatrix<f64>,
    ds: &DMatrix<f64>,
    neighbor_means: [Option<f64>; 3],
) {
    let np = field.len();
    let u_bar = field.iter().sum::<f64>() / np as f64;

    let mut u_min = u_bar;
    let mut u_max = u_bar;
    for m in neighbor_means.into_iter().flatten() {
        u_min = u_min.min(m);
        u_max = u_max.max(m);
    }

    let q = DMatrix::from_vec(np, 1, field.to_vec());
    let ur = dr * &q;
    let us = ds * &q;
    // Cell-average gradient: mean of the nodal derivative values.
    let ur_bar = (0..np).map(|i| ur[(i, 0)]).sum::<f64>() / np as f64;
    let us_bar = (0..np).map(|i| us[(i, 0)]).sum::<f64>() / np as f64;

    let r_bar = r.iter().sum::<f64>() / np as f64;
    let s_bar = s.iter().sum::<f64>() / np as f64;

    let mut psi = 1.0f64;
    for i in 0..np {
        let delta = ur_bar * (r[i] - r_bar) + us_bar * (s[i] - s_bar);
        if delta.abs() < 1e-14 {
            continue;
        }
        let reconstructed = u_bar + delta;
        let candidate = if reconstructed > u_max {
            ((u_max - u_bar) / delta).clamp(0.0, 1.0)
        } else if reconstructed < u_min {
            ((u_min - u_bar) / delta).clamp(0.0, 1.0)
        } else {
            1.0
        };
        psi = psi.min(candidate);
    }

    for i in 0..np {
        let delta = ur_bar * (r[i] - r_bar) + us_bar * (s[i] - s_bar);
        field[i] = u_bar + psi * delta;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference_triangle::LagrangeElement;

    #[test]
    fn constant_field_is_unaffected() {
        let el = LagrangeElement::build(3).unwrap();
        let mut field = vec![2.0; el.np];
        let means = [Some(2.0), Some(2.0), Some(2.0)];
        limit_field(&mut field, &el.r, &el.s, &el.dr, &el.ds, means);
        for &v in &field {
            assert!((v - 2.0).abs() < 1e-12);
        }
    }

    #[test]
    fn limiter_clamps_overshoot_within_neighbor_bounds() {
        let el = LagrangeElement::build(3).unwrap();
        // A steep linear ramp whose vertex extrapolation would exceed
        // tight neighbor bounds; the limiter must pull it back.
        let mut field: Vec<f64> = el.r.iter().map(|&r| 5.0 + 3.0 * r).collect();
        let means = [Some(5.0), Some(5.0), Some(5.0)];
        limit_field(&mut field, &el.r, &el.s, &el.dr, &el.ds, means);

        let u_bar = field.iter().sum::<f64>() / field.len() as f64;
        assert!((u_bar - 5.0).abs() < 1.0, "mean should stay near original mean, got {u_bar}");
    }
}
