//! Numerical flux kernels and boundary-condition state constructors.
//!
//! Each kernel computes the shared flux `(Fx, Fy)` across a face given
//! the interior and exterior traces `qm`, `qp`, then projects onto the
//! face normal to return a 4-vector, matching spec.md sec 4.5.

use crate::euler::{flux, max_wave_speed, State};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FluxType {
    Average,
    LaxFriedrichs,
    Roe,
}

/// Normal numerical flux `F . n` across a face, given interior trace
/// `qm` and exterior trace `qp`.
pub fn numerical_flux(kind: FluxType, qm: &State, qp: &State, nx: f64, ny: f64, gamma: f64) -> [f64; 4] {
    match kind {
        FluxType::Average => average_flux(qm, qp, nx, ny, gamma),
        FluxType::LaxFriedrichs => lax_friedrichs_flux(qm, qp, nx, ny, gamma),
        FluxType::Roe => roe_flux(qm, qp, nx, ny, gamma),
    }
}

fn project(fx: [f64; 4], fy: [f64; 4], nx: f64, ny: f64) -> [f64; 4] {
    let mut out = [0.0; 4];
    for c in 0..4 {
        out[c] = fx[c] * nx + fy[c] * ny;
    }
    out
}

fn average_flux(qm: &State, qp: &State, nx: f64, ny: f64, gamma: f64) -> [f64; 4] {
    let (fxm, fym) = flux(qm, gamma);
    let (fxp, fyp) = flux(qp, gamma);
    let fm = project(fxm, fym, nx, ny);
    let fp = project(fxp, fyp, nx, ny);
    let mut out = [0.0; 4];
    for c in 0..4 {
        out[c] = 0.5 * (fm[c] + fp[c]);
    }
    out
}

fn lax_friedrichs_flux(qm: &State, qp: &State, nx: f64, ny: f64, gamma: f64) -> [f64; 4] {
    let avg = average_flux(qm, qp, nx, ny, gamma);
    let lambda = max_wave_speed(qm, gamma).max(max_wave_speed(qp, gamma));
    let qm_vec = [qm.rho, qm.rho_u, qm.rho_v, qm.e];
    let qp_vec = [qp.rho, qp.rho_u, qp.rho_v, qp.e];
    let mut out = [0.0; 4];
    for c in 0..4 {
        out[c] = avg[c] - 0.5 * lambda * (qp_vec[c] - qm_vec[c]);
    }
    out
}

/// Roe's approximate Riemann solver, using the Roe-averaged state for
/// the upwind dissipation term.
fn roe_flux(qm: &State, qp: &State, nx: f64, ny: f64, gamma: f64) -> [f64; 4] {
    let sqrt_rho_m = qm.rho.sqrt();
    let sqrt_rho_p = qp.rho.sqrt();
    let denom = sqrt_rho_m + sqrt_rho_p;
    let rho_bar = sqrt_rho_m * sqrt_rho_p;

    let u = (sqrt_rho_m * qm.u() + sqrt_rho_p * qp.u()) / denom;
    let v = (sqrt_rho_m * qm.v() + sqrt_rho_p * qp.v()) / denom;
    let h = (sqrt_rho_m * qm.enthalpy(gamma) + sqrt_rho_p * qp.enthalpy(gamma)) / denom;
    let q2 = u * u + v * v;
    let g1 = gamma - 1.0;
    let c2 = (g1 * (h - 0.5 * q2)).max(1e-12);
    let c = c2.sqrt();
    let un = u * nx + v * ny;

    let d_rho = qp.rho - qm.rho;
    let du = qp.u() - qm.u();
    let dv = qp.v() - qm.v();
    let dun = du * nx + dv * ny;
    let dp = qp.pressure(gamma) - qm.pressure(gamma);

    let eig_entropy = un.abs();
    let eig_minus = (un - c).abs();
    let eig_plus = (un + c).abs();

    let alpha_entropy = d_rho - dp / c2;
    let alpha_minus = 0.5 * (dp / c2 - rho_bar * dun / c);
    let alpha_plus = 0.5 * (dp / c2 + rho_bar * dun / c);

    let r_entropy = [1.0, u, v, 0.5 * q2];
    let r_minus = [1.0, u - c * nx, v - c * ny, h - c * un];
    let r_plus = [1.0, u + c * nx, v + c * ny, h + c * un];

    // Tangential velocity jump, carried by the entropy wave alongside
    // the density jump (Hesthaven-Warburton form of the shear wave).
    let du_tan = du - dun * nx;
    let dv_tan = dv - dun * ny;
    let r_shear = [0.0, du_tan, dv_tan, u * du_tan + v * dv_tan];

    let mut dissipation = [0.0; 4];
    for c_idx in 0..4 {
        dissipation[c_idx] = eig_entropy * alpha_entropy * r_entropy[c_idx]
            + eig_minus * alpha_minus * r_minus[c_idx]
            + eig_plus * alpha_plus * r_plus[c_idx]
            + eig_entropy * rho_bar * r_shear[c_idx];
    }

    let avg = average_flux(qm, qp, nx, ny, gamma);
    let mut out = [0.0; 4];
    for c_idx in 0..4 {
        out[c_idx] = avg[c_idx] - 0.5 * dissipation[c_idx];
    }
    out
}

/// Far-field boundary: exterior state equals the prescribed freestream
/// state regardless of the interior trace.
pub fn far_field_state(freestream: &State) -> State {
    *freestream
}

/// Inviscid wall (slip) boundary: mirror the normal velocity component,
/// keep density and energy.
pub fn wall_state(qm: &State, nx: f64, ny: f64) -> State {
    let un = qm.u() * nx + qm.v() * ny;
    let u_mirror = qm.u() - 2.0 * un * nx;
    let v_mirror = qm.v() - 2.0 * un * ny;
    State::new(qm.rho, qm.rho * u_mirror, qm.rho * v_mirror, qm.e)
}

/// Isentropic vortex exact state at a point, used both for
/// initialization and as a time-dependent exterior boundary trace.
pub fn isentropic_vortex_state(x: f64, y: f64, t: f64, gamma: f64, minf: f64, x0: f64, y0: f64, beta: f64) -> State {
    let xt = x - x0 - minf * t;
    let yt = y - y0;
    let r2 = xt * xt + yt * yt;
    let g1 = gamma - 1.0;
    let du = -beta / (2.0 * std::f64::consts::PI) * yt * (0.5 * (1.0 - r2)).exp();
    let dv = beta / (2.0 * std::f64::consts::PI) * xt * (0.5 * (1.0 - r2)).exp();
    let dtemp = -g1 * beta * beta / (8.0 * gamma * std::f64::consts::PI * std::f64::consts::PI) * (1.0 - r2).exp();

    let rho = (1.0 + dtemp).powf(1.0 / g1);
    let u = minf + du;
    let v = dv;
    let p = rho.powf(gamma) / gamma;
    let e = p / g1 + 0.5 * rho * (u * u + v * v);
    State::new(rho, rho * u, rho * v, e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_flux_of_identical_states_equals_physical_flux() {
        let q = State::new(1.0, 0.2, 0.1, 2.5);
        let got = average_flux(&q, &q, 1.0, 0.0, 1.4);
        let (fx, _fy) = flux(&q, 1.4);
        for c in 0..4 {
            assert!((got[c] - fx[c]).abs() < 1e-12);
        }
    }

    #[test]
    fn lax_friedrichs_reduces_to_average_for_equal_states() {
        let q = State::new(1.0, 0.2, 0.1, 2.5);
        let avg = average_flux(&q, &q, 0.0, 1.0, 1.4);
        let lf = lax_friedrichs_flux(&q, &q, 0.0, 1.0, 1.4);
        for c in 0..4 {
            assert!((avg[c] - lf[c]).abs() < 1e-12);
        }
    }

    #[test]
    fn roe_flux_reduces_to_physical_flux_for_equal_states() {
        let q = State::new(1.0, 0.2, 0.15, 2.5);
        let got = roe_flux(&q, &q, 1.0, 0.0, 1.4);
        let (fx, _fy) = flux(&q, 1.4);
        for c in 0..4 {
            assert!((got[c] - fx[c]).abs() < 1e-8, "c={c}: {} vs {}", got[c], fx[c]);
        }
    }

    #[test]
    fn wall_state_mirrors_normal_velocity_only() {
        let qm = State::new(1.0, 0.3, 0.4, 2.5);
        let qp = wall_state(&qm, 1.0, 0.0);
        assert!((qp.u() + qm.u()).abs() < 1e-12);
        assert!((qp.v() - qm.v()).abs() < 1e-12);
        assert!((qp.rho - qm.rho).abs() < 1e-12);
        assert!((qp.e - qm.e).abs() < 1e-12);
    }

    #[test]
    fn isentropic_vortex_decays_to_freestream_far_away() {
        let gamma = 1.4;
        let minf = 0.5;
        let q = isentropic_vortex_state(50.0, 50.0, 0.0, gamma, minf, 0.0, 0.0, 5.0);
        assert!((q.rho - 1.0).abs() < 1e-6);
        assert!((q.u() - minf).abs() < 1e-6);
        assert!(q.v().abs() < 1e-6);
    }
}
