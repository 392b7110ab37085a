//! 2D compressible Euler physics: the conservative state, the flux
//! function, pressure/wavespeed, and the flux Jacobian used by tests.

/// Conservative state `(rho, rho*u, rho*v, E)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct State {
    pub rho: f64,
    pub rho_u: f64,
    pub rho_v: f64,
    pub e: f64,
}

impl State {
    pub fn new(rho: f64, rho_u: f64, rho_v: f64, e: f64) -> Self {
        Self { rho, rho_u, rho_v, e }
    }

    pub fn u(&self) -> f64 {
        self.rho_u / self.rho
    }

    pub fn v(&self) -> f64 {
        self.rho_v / self.rho
    }

    pub fn pressure(&self, gamma: f64) -> f64 {
        (gamma - 1.0) * (self.e - 0.5 * (self.rho_u * self.rho_u + self.rho_v * self.rho_v) / self.rho)
    }

    pub fn sound_speed(&self, gamma: f64) -> f64 {
        (gamma * self.pressure(gamma) / self.rho).sqrt()
    }

    pub fn enthalpy(&self, gamma: f64) -> f64 {
        (self.e + self.pressure(gamma)) / self.rho
    }

    /// Checks spec.md sec 7's "Arithmetic" failure model: non-finite state
    /// or non-positive density/pressure.
    pub fn is_physical(&self, gamma: f64) -> bool {
        let p = self.pressure(gamma);
        self.rho > 0.0
            && p > 0.0
            && self.rho.is_finite()
            && self.rho_u.is_finite()
            && self.rho_v.is_finite()
            && self.e.is_finite()
    }
}

/// Physical flux tensor `(Fx, Fy)`, each a 4-vector over the conservative fields.
pub fn flux(q: &State, gamma: f64) -> ([f64; 4], [f64; 4]) {
    let u = q.u();
    let v = q.v();
    let p = q.pressure(gamma);
    let fx = [q.rho_u, q.rho_u * u + p, q.rho_u * v, u * (q.e + p)];
    let fy = [q.rho_v, q.rho_v * u, q.rho_v * v + p, v * (q.e + p)];
    (fx, fy)
}

/// Maximum signal speed `|u| + c`, used by Lax-Friedrichs and by the CFL
/// time-step selection.
pub fn max_wave_speed(q: &State, gamma: f64) -> f64 {
    let speed = (q.u() * q.u() + q.v() * q.v()).sqrt();
    speed + q.sound_speed(gamma)
}

/// The 4x4 flux Jacobian `dF/dQ` projected along direction `(nx, ny)`,
/// row-major, matching the analytic Roe-linearization Jacobian.
pub fn flux_jacobian(q: &State, gamma: f64, nx: f64, ny: f64) -> [[f64; 4]; 4] {
    let u = q.u();
    let v = q.v();
    let q2 = u * u + v * v;
    let g1 = gamma - 1.0;
    let h = q.enthalpy(gamma);
    let un = u * nx + v * ny;

    [
        [0.0, nx, ny, 0.0],
        [
            -u * un + nx * g1 * 0.5 * q2,
            un + u * nx - g1 * u * nx,
            u * ny - g1 * v * nx,
            g1 * nx,
        ],
        [
            -v * un + ny * g1 * 0.5 * q2,
            v * nx - g1 * u * ny,
            un + v * ny - g1 * v * ny,
            g1 * ny,
        ],
        [
            un * (g1 * 0.5 * q2 - h),
            h * nx - g1 * u * un,
            h * ny - g1 * v * un,
            gamma * un,
        ],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, tol: f64, what: &str) {
        assert!((a - b).abs() < tol, "{what}: got {a}, expected {b}");
    }

    #[test]
    fn flux_jacobian_matches_reference_values() {
        // spec.md E4: rho=1, u=0.1, v=0, E=1.79071, gamma=1.4, x-direction.
        let rho = 1.0;
        let u = 0.1;
        let v = 0.0;
        let e = 1.79071;
        let q = State::new(rho, rho * u, rho * v, e);
        let j = flux_jacobian(&q, 1.4, 1.0, 0.0);

        let expected = [
            [0.0, 1.0, 0.0, 0.0],
            [-0.008, 0.16, 0.0, 0.4],
            [0.0, 0.0, 0.1, 0.0],
            [-0.2503, 2.501, 0.0, 0.14],
        ];
        for i in 0..4 {
            for c in 0..4 {
                assert_close(j[i][c], expected[i][c], 1e-3, &format!("J[{i}][{c}]"));
            }
        }
    }

    #[test]
    fn pressure_is_positive_for_freestream() {
        let q = State::new(1.0, 0.2, 0.0, 2.5);
        assert!(q.pressure(1.4) > 0.0);
        assert!(q.is_physical(1.4));
    }
}
