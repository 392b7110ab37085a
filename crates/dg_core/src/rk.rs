//! Four-stage SSP Runge-Kutta driver and the per-shard worker pool
//! (spec.md sec 4.8, sec 5).
//!
//! One thread per shard is spawned inside [`std::thread::scope`] for
//! the lifetime of a single [`RkDriver::step`] call; `std::sync::Barrier`
//! marks the 17 ordered sub-step boundaries. Data that must be visible
//! across shard boundaries (the full-mesh `Q`/`Q_face` arrays, the
//! per-element mean used by the limiter, and the per-vertex aggregated
//! viscosity) lives behind `RwLock`/`Mutex` rather than the literal
//! lock-free edge-ownership scheme spec.md sec 5 describes — see
//! `DESIGN.md` for why that tradeoff was made.

use crate::error::Result;
use crate::flux::FluxType;
use crate::limiter::limit_field;
use crate::mesh::Mesh;
use crate::operator::{BoundaryTable, SpatialOperator};
use crate::partition::PartitionMap;
use crate::reference_triangle::LagrangeElement;
use crate::rt_element::RtElement;
use crate::sensor;
use crate::state::FieldArray;
use std::collections::HashMap;
use std::sync::{Barrier, RwLock};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimiterKind {
    None,
    BarthJespersen,
}

#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub gamma: f64,
    pub cfl: f64,
    pub flux_type: FluxType,
    pub kappa: f64,
    pub local_time_stepping: bool,
    pub limiter: LimiterKind,
}

pub struct RkDriver {
    pub sol: LagrangeElement,
    pub rt: RtElement,
    pub mesh: Mesh,
    pub partition: PartitionMap,
    pub bcs: BoundaryTable,
    pub periodic_partners: HashMap<u64, u64>,
    pub config: SolverConfig,
}

/// Outcome of a single `step` call.
pub struct StepReport {
    pub dt: f64,
    pub max_wavespeed: f64,
    pub limiter_active_elements: usize,
}

impl RkDriver {
    pub fn num_shards(&self) -> usize {
        self.partition.num_shards()
    }

    /// Advances `q` (shape `Np x K`, whole mesh) by one RK step in
    /// place, returning the step's diagnostics. `t` is the time at the
    /// start of the step.
    pub fn step(&self, q: &mut FieldArray, t: f64) -> Result<StepReport> {
        let k = self.mesh.num_elements();
        let np = self.sol.np;
        let p = self.num_shards();

        let global_q = RwLock::new(q.clone());
        let global_q_face = RwLock::new(FieldArray::zeros(3 * self.sol.nedge, k));
        let element_means = RwLock::new(vec![[0.0f64; 4]; k]);
        let element_eps = RwLock::new(vec![0.0f64; k]);
        let vertex_eps = RwLock::new(vec![0.0f64; self.mesh.vx.len()]);
        let shard_max_ws = RwLock::new(vec![0.0f64; p]);
        let local_dt = RwLock::new(vec![0.0f64; k]);
        let global_dt = RwLock::new(0.0f64);
        let limiter_flags = RwLock::new(vec![false; k]);

        // sub-step 0 (wavespeed) + 4 stages * 4 sub-steps (interpolate,
        // rhs+update, sensor, limiter) = 17.
        let barrier = Barrier::new(p);

        std::thread::scope(|scope| -> Result<()> {
            let mut handles = Vec::with_capacity(p);
            for shard in 0..p {
                let range = self.shard_range(shard);
                let driver = &*self;
                let global_q = &global_q;
                let global_q_face = &global_q_face;
                let element_means = &element_means;
                let element_eps = &element_eps;
                let vertex_eps = &vertex_eps;
                let shard_max_ws = &shard_max_ws;
                let local_dt = &local_dt;
                let global_dt = &global_dt;
                let limiter_flags = &limiter_flags;
                let barrier = &barrier;

                handles.push(scope.spawn(move || {
                    driver.shard_worker(
                        shard,
                        range,
                        t,
                        global_q,
                        global_q_face,
                        element_means,
                        element_eps,
                        vertex_eps,
                        shard_max_ws,
                        local_dt,
                        global_dt,
                        limiter_flags,
                        barrier,
                    )
                }));
            }
            for handle in handles {
                handle.join().expect("shard worker thread panicked")?;
            }
            Ok(())
        })?;

        *q = global_q.into_inner().unwrap();
        let max_ws = shard_max_ws.into_inner().unwrap().into_iter().fold(0.0, f64::max);
        let dt = *global_dt.read().unwrap();
        let active = limiter_flags.into_inner().unwrap().into_iter().filter(|&b| b).count();

        Ok(StepReport {
            dt,
            max_wavespeed: max_ws,
            limiter_active_elements: active,
        })
    }

    fn shard_range(&self, shard: usize) -> std::ops::Range<usize> {
        let start = (0..shard).map(|s| self.partition.shard_len(s)).sum::<usize>();
        start..start + self.partition.shard_len(shard)
    }

    #[allow(clippy::too_many_arguments)]
    fn shard_worker(
        &self,
        shard: usize,
        range: std::ops::Range<usize>,
        t: f64,
        global_q: &RwLock<FieldArray>,
        global_q_face: &RwLock<FieldArray>,
        element_means: &RwLock<Vec<[f64; 4]>>,
        element_eps: &RwLock<Vec<f64>>,
        vertex_eps: &RwLock<Vec<f64>>,
        shard_max_ws: &RwLock<Vec<f64>>,
        local_dt: &RwLock<Vec<f64>>,
        global_dt: &RwLock<f64>,
        limiter_flags: &RwLock<Vec<bool>>,
        barrier: &Barrier,
    ) -> Result<()> {
        let op = SpatialOperator {
            sol: &self.sol,
            rt: &self.rt,
            mesh: &self.mesh,
            gamma: self.config.gamma,
            flux_type: self.config.flux_type,
            bcs: &self.bcs,
            periodic_partners: &self.periodic_partners,
        };
        // --- sub-step 0: local max wavespeed, then controller-style dt ---
        let q0 = slice_cols(&global_q.read().unwrap(), range.clone());
        {
            let ws = op.max_wave_speed_over(&q0);
            shard_max_ws.write().unwrap()[shard] = ws;
            if self.config.local_time_stepping {
                let mut ld = local_dt.write().unwrap();
                for (local_kk, global_kk) in range.clone().enumerate() {
                    let mut elem_ws = 0.0f64;
                    for i in 0..self.sol.np {
                        let state = crate::euler::State::new(
                            q0.fields[0][(i, local_kk)],
                            q0.fields[1][(i, local_kk)],
                            q0.fields[2][(i, local_kk)],
                            q0.fields[3][(i, local_kk)],
                        );
                        elem_ws = elem_ws.max(crate::euler::max_wave_speed(&state, self.config.gamma));
                    }
                    let h = (2.0 * self.mesh.metrics[global_kk].jdet).sqrt();
                    ld[global_kk] = self.config.cfl * h / elem_ws.max(1e-12);
                }
            }
        }
        barrier.wait();
        if shard == 0 {
            let max_ws = shard_max_ws.read().unwrap().iter().cloned().fold(0.0, f64::max).max(1e-12);
            *global_dt.write().unwrap() = self.config.cfl / max_ws;
        }
        barrier.wait();
        let dt = *global_dt.read().unwrap();
        let mut stage = q0.clone();

        // 4 Shu-Osher stages; the per-stage combination coefficients live
        // in `apply_stage_update`.
        for stage_idx in 0..4 {
            // sub-step: interpolate to faces, publish into shared Q_face.
            let q_face_local = op.interpolate_to_faces(&stage);
            write_cols(&mut global_q_face.write().unwrap(), range.clone(), &q_face_local);
            barrier.wait();

            // sub-step: RHS (divergence + dissipation) and stage update.
            let q_face_snapshot = global_q_face.read().unwrap().clone();
            let (mut rhs, _ws) = op.divergence_rhs_range(&stage, &q_face_snapshot, t, range.clone())?;
            {
                let eps_nodal = build_eps_nodal(&element_eps.read().unwrap(), &vertex_eps.read().unwrap(), &self.mesh, &self.sol, range.clone());
                op.add_dissipation(&mut rhs, &stage, &eps_nodal, range.start);
            }
            let dt_per_col: Vec<f64> = if self.config.local_time_stepping {
                let ld = local_dt.read().unwrap();
                range.clone().map(|k| ld[k]).collect()
            } else {
                vec![dt; range.len()]
            };
            stage = apply_stage_update(stage_idx, &q0, &stage, &rhs, &dt_per_col);
            write_cols(&mut global_q.write().unwrap(), range.clone(), &stage);
            barrier.wait();

            // sub-step: Persson sensor + vertex epsilon aggregation.
            {
                let clip = sensor::build_clip(&self.sol);
                let mut eps_guard = element_eps.write().unwrap();
                let mut means_guard = element_means.write().unwrap();
                for (local_kk, global_kk) in range.clone().enumerate() {
                    let rho: Vec<f64> = (0..self.sol.np).map(|i| stage.fields[0][(i, local_kk)]).collect();
                    let s_e = sensor::persson_indicator(&rho, &clip);
                    let jdet = self.mesh.metrics[global_kk].jdet;
                    eps_guard[global_kk] = sensor::element_epsilon(s_e, self.sol.n, jdet, self.config.kappa);
                    for field in 0..4 {
                        let mean = (0..self.sol.np).map(|i| stage.fields[field][(i, local_kk)]).sum::<f64>() / self.sol.np as f64;
                        means_guard[global_kk][field] = mean;
                    }
                    limiter_flags.write().unwrap()[global_kk] = eps_guard[global_kk] > 0.0;
                    if eps_guard[global_kk] > 0.0 {
                        debug!(shard, element = global_kk, stage = stage_idx, eps = eps_guard[global_kk], "sensor flagged element");
                    }
                }
            }
            barrier.wait();
            // controller-only reduction: aggregate element eps to vertices.
            if shard == 0 {
                let eps = element_eps.read().unwrap();
                let agg = sensor::aggregate_vertex_epsilon(self.mesh.vx.len(), &self.mesh.e_to_v, &eps);
                *vertex_eps.write().unwrap() = agg;
            }
            barrier.wait();

            // sub-step: Barth-Jespersen limiter on flagged elements.
            if self.config.limiter == LimiterKind::BarthJespersen {
                let flags = limiter_flags.read().unwrap().clone();
                let means = element_means.read().unwrap().clone();
                for (local_kk, global_kk) in range.clone().enumerate() {
                    if !flags[global_kk] {
                        continue;
                    }
                    let neighbor_means = self.neighbor_means(global_kk, &means);
                    for field in 0..4 {
                        let mut col: Vec<f64> = (0..self.sol.np).map(|i| stage.fields[field][(i, local_kk)]).collect();
                        let nm = [
                            neighbor_means[0].map(|m: [f64; 4]| m[field]),
                            neighbor_means[1].map(|m: [f64; 4]| m[field]),
                            neighbor_means[2].map(|m: [f64; 4]| m[field]),
                        ];
                        limit_field(&mut col, &self.sol.r, &self.sol.s, &self.sol.dr, &self.sol.ds, nm);
                        for i in 0..self.sol.np {
                            stage.fields[field][(i, local_kk)] = col[i];
                        }
                    }
                }
            }
            write_cols(&mut global_q.write().unwrap(), range.clone(), &stage);
            barrier.wait();
        }

        Ok(())
    }

    fn neighbor_means(&self, element: usize, means: &[[f64; 4]]) -> [Option<[f64; 4]>; 3] {
        let mut out = [None; 3];
        let tri = self.mesh.e_to_v[element];
        for local_edge in 0..3 {
            let (va, vb) = match local_edge {
                0 => (tri[1], tri[2]),
                1 => (tri[2], tri[0]),
                _ => (tri[0], tri[1]),
            };
            let key = crate::mesh::pack_edge_key(va, vb);
            if let Some(rec) = self.mesh.edges.get(&key) {
                for side in &rec.sides {
                    if side.element != element {
                        out[local_edge] = Some(means[side.element]);
                    }
                }
            }
        }
        out
    }
}

fn apply_stage_update(stage_idx: usize, q0: &FieldArray, prev: &FieldArray, rhs: &FieldArray, dt: &[f64]) -> FieldArray {
    let k = q0.kshard();
    let np = q0.rows();
    let mut out = FieldArray::zeros(np, k);
    for field in 0..4 {
        for c in 0..k {
            let dt_c = dt[c];
            for r in 0..np {
                out.fields[field][(r, c)] = match stage_idx {
                    0 => q0.fields[field][(r, c)] + 0.5 * dt_c * rhs.fields[field][(r, c)],
                    1 => q0.fields[field][(r, c)] + 0.25 * dt_c * rhs.fields[field][(r, c)],
                    2 => (2.0 * q0.fields[field][(r, c)] + prev.fields[field][(r, c)] + dt_c * rhs.fields[field][(r, c)]) / 3.0,
                    _ => prev.fields[field][(r, c)] + 0.25 * dt_c * rhs.fields[field][(r, c)],
                };
            }
        }
    }
    out
}

fn slice_cols(full: &FieldArray, range: std::ops::Range<usize>) -> FieldArray {
    let np = full.rows();
    let mut out = FieldArray::zeros(np, range.len());
    for field in 0..4 {
        for (local, global) in range.clone().enumerate() {
            out.fields[field].set_column(local, &full.fields[field].column(global));
        }
    }
    out
}

fn write_cols(full: &mut FieldArray, range: std::ops::Range<usize>, local: &FieldArray) {
    for field in 0..4 {
        for (l, global) in range.clone().enumerate() {
            full.fields[field].set_column(global, &local.fields[field].column(l));
        }
    }
}

fn build_eps_nodal(
    element_eps: &[f64],
    vertex_eps: &[f64],
    mesh: &Mesh,
    sol: &LagrangeElement,
    range: std::ops::Range<usize>,
) -> Vec<Vec<f64>> {
    range
        .map(|k| {
            let tri = mesh.e_to_v[k];
            let tri_v = [vertex_eps[tri[0]], vertex_eps[tri[1]], vertex_eps[tri[2]]];
            if element_eps[k] > 0.0 {
                sensor::interpolate_epsilon_to_nodes(tri_v, &sol.r, &sol.s)
            } else {
                vec![0.0; sol.np]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::euler::State;
    use crate::mesh::RawMesh;
    use std::collections::HashMap as StdHashMap;

    fn two_triangle_driver(flux_type: FluxType) -> RkDriver {
        let raw = RawMesh {
            vx: vec![0.0, 1.0, 0.0, 1.0],
            vy: vec![0.0, 0.0, 1.0, 1.0],
            e_to_v: vec![[0, 1, 2], [1, 3, 2]],
            boundary_tags: {
                let mut m = StdHashMap::new();
                let mesh_probe = Mesh::build(RawMesh {
                    vx: vec![0.0, 1.0, 0.0, 1.0],
                    vy: vec![0.0, 0.0, 1.0, 1.0],
                    e_to_v: vec![[0, 1, 2], [1, 3, 2]],
                    boundary_tags: StdHashMap::new(),
                })
                .unwrap();
                for rec in mesh_probe.edges.values() {
                    if !rec.is_interior() {
                        m.insert(rec.key, "farfield".to_string());
                    }
                }
                m
            },
        };
        let n = 2;
        let mesh = Mesh::build(raw).unwrap();
        let sol = LagrangeElement::build(n).unwrap();
        let rt = RtElement::build(n, &sol).unwrap();
        let partition = PartitionMap::new(mesh.num_elements(), 2);
        let mut bcs = BoundaryTable::new();
        bcs.insert(
            "farfield".to_string(),
            crate::operator::BoundaryKind::FarField(State::new(1.0, 0.2, 0.0, 2.5)),
        );
        RkDriver {
            sol,
            rt,
            mesh,
            partition,
            bcs,
            periodic_partners: HashMap::new(),
            config: SolverConfig {
                gamma: 1.4,
                cfl: 0.3,
                flux_type,
                kappa: 4.0,
                local_time_stepping: false,
                limiter: LimiterKind::None,
            },
        }
    }

    #[test]
    fn uniform_freestream_state_stays_uniform_after_a_step() {
        let driver = two_triangle_driver(FluxType::LaxFriedrichs);
        let k = driver.mesh.num_elements();
        let mut q = FieldArray::zeros(driver.sol.np, k);
        let uniform = [1.0, 0.2, 0.0, 2.5];
        for field in 0..4 {
            for c in 0..k {
                for r in 0..driver.sol.np {
                    q.fields[field][(r, c)] = uniform[field];
                }
            }
        }
        let report = driver.step(&mut q, 0.0).unwrap();
        assert!(report.dt > 0.0);
        for field in 0..4 {
            for c in 0..k {
                for r in 0..driver.sol.np {
                    assert!(
                        (q.fields[field][(r, c)] - uniform[field]).abs() < 1e-6,
                        "field {field} elem {c} node {r} drifted: {}",
                        q.fields[field][(r, c)]
                    );
                }
            }
        }
    }
}
