//! Initial conditions: `freestream`, `ivortex` (isentropic vortex), and
//! `shocktube` (Sod's problem). Not named as a distinct component in
//! spec.md sec 2, but required to exercise the E1/E2/E3/E6 scenarios in
//! spec.md sec 8 and not excluded by any Non-goal.

use crate::euler::State;
use crate::flux::isentropic_vortex_state;
use crate::mesh::Mesh;
use crate::reference_triangle::LagrangeElement;
use crate::state::FieldArray;

/// Uniform free-stream state at the given Mach number and angle of
/// attack `alpha` (degrees).
pub fn freestream_state(minf: f64, alpha_deg: f64, gamma: f64) -> State {
    let alpha = alpha_deg.to_radians();
    let rho = 1.0;
    let p = 1.0 / gamma;
    let u = minf * alpha.cos();
    let v = minf * alpha.sin();
    let e = p / (gamma - 1.0) + 0.5 * rho * (u * u + v * v);
    State::new(rho, rho * u, rho * v, e)
}

/// Fills `q` with a uniform free-stream state.
pub fn init_freestream(q: &mut FieldArray, sol: &LagrangeElement, minf: f64, alpha_deg: f64, gamma: f64) {
    let state = freestream_state(minf, alpha_deg, gamma);
    let values = [state.rho, state.rho_u, state.rho_v, state.e];
    for field in 0..4 {
        for c in 0..q.kshard() {
            for r in 0..sol.np {
                q.fields[field][(r, c)] = values[field];
            }
        }
    }
}

/// Fills `q` with the analytic isentropic vortex at `t = 0`, per
/// `original_source/model_problems/Euler2D/euler_test.go`.
pub fn init_isentropic_vortex(
    q: &mut FieldArray,
    sol: &LagrangeElement,
    mesh: &Mesh,
    gamma: f64,
    minf: f64,
    x0: f64,
    y0: f64,
    beta: f64,
) {
    for c in 0..q.kshard() {
        for r in 0..sol.np {
            let (x, y) = mesh.map_to_physical(c, sol.r[r], sol.s[r]);
            let state = isentropic_vortex_state(x, y, 0.0, gamma, minf, x0, y0, beta);
            q.fields[0][(r, c)] = state.rho;
            q.fields[1][(r, c)] = state.rho_u;
            q.fields[2][(r, c)] = state.rho_v;
            q.fields[3][(r, c)] = state.e;
        }
    }
}

/// Fills `q` with Sod's shock tube states, split at `x_split` along the
/// x axis, per `original_source/model_problems/Euler2D/sod_shock_tube/
/// shock_tube.go`.
pub fn init_shocktube(q: &mut FieldArray, sol: &LagrangeElement, mesh: &Mesh, gamma: f64, x_split: f64) {
    let left = State::new(1.0, 0.0, 0.0, 1.0 / (gamma - 1.0));
    let right = State::new(0.125, 0.0, 0.0, 0.1 / (gamma - 1.0));
    for c in 0..q.kshard() {
        for r in 0..sol.np {
            let (x, _y) = mesh.map_to_physical(c, sol.r[r], sol.s[r]);
            let state = if x < x_split { left } else { right };
            q.fields[0][(r, c)] = state.rho;
            q.fields[1][(r, c)] = state.rho_u;
            q.fields[2][(r, c)] = state.rho_v;
            q.fields[3][(r, c)] = state.e;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::RawMesh;
    use std::collections::HashMap as StdHashMap;

    fn two_triangle_mesh() -> (Mesh, LagrangeElement) {
        let raw = RawMesh {
            vx: vec![0.0, 1.0, 0.0, 1.0],
            vy: vec![0.0, 0.0, 1.0, 1.0],
            e_to_v: vec![[0, 1, 2], [1, 3, 2]],
            boundary_tags: StdHashMap::new(),
        };
        let mesh = Mesh::build(raw).unwrap();
        let sol = LagrangeElement::build(2).unwrap();
        (mesh, sol)
    }

    #[test]
    fn freestream_state_is_physical_at_zero_alpha() {
        let state = freestream_state(0.5, 0.0, 1.4);
        assert!(state.is_physical(1.4));
        assert!((state.v()).abs() < 1e-12);
        assert!((state.u() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn init_freestream_fills_every_node_uniformly() {
        let (mesh, sol) = two_triangle_mesh();
        let mut q = FieldArray::zeros(sol.np, mesh.num_elements());
        init_freestream(&mut q, &sol, 0.3, 5.0, 1.4);
        let expected = freestream_state(0.3, 5.0, 1.4);
        for c in 0..mesh.num_elements() {
            for r in 0..sol.np {
                assert!((q.fields[0][(r, c)] - expected.rho).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn shocktube_init_produces_discontinuity_across_x_split() {
        let (mesh, sol) = two_triangle_mesh();
        let mut q = FieldArray::zeros(sol.np, mesh.num_elements());
        init_shocktube(&mut q, &sol, &mesh, 1.4, 0.5);
        // Some nodes must be at the left-state density, some at the right.
        let mut saw_left = false;
        let mut saw_right = false;
        for c in 0..mesh.num_elements() {
            for r in 0..sol.np {
                if (q.fields[0][(r, c)] - 1.0).abs() < 1e-12 {
                    saw_left = true;
                }
                if (q.fields[0][(r, c)] - 0.125).abs() < 1e-12 {
                    saw_right = true;
                }
            }
        }
        assert!(saw_left && saw_right);
    }
}
