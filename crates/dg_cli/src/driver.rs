//! Wires a loaded [`dg_core::Config`] and mesh to an [`dg_core::RkDriver`]
//! and runs the step loop to completion, logging progress with `tracing`
//! the way the rest of the ambient stack does.

use anyhow::{bail, Context};
use dg_core::mesh::MeshSource;
use dg_core::operator::{self, Axis, BoundaryKind, BoundaryTable};
use dg_core::reference_triangle::LagrangeElement;
use dg_core::rt_element::RtElement;
use dg_core::state::FieldArray;
use dg_core::{init, partition::PartitionMap, snapshot, Config, Mesh, RkDriver, SolverConfig};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Outcome of running the solver to completion, for the CLI's exit-code
/// mapping.
pub struct RunOutcome {
    pub steps_taken: u64,
    pub final_time: f64,
}

pub fn run(config: &Config, mesh_source: &dyn MeshSource, num_shards: usize, snapshot_path: Option<&Path>) -> anyhow::Result<RunOutcome> {
    let raw = mesh_source.read().context("reading mesh")?;
    let mesh = Mesh::build(raw).context("building mesh topology")?;
    info!(elements = mesh.num_elements(), "mesh loaded");

    let sol = LagrangeElement::build(config.polynomial_order).context("building Lagrange element")?;
    let rt = RtElement::build(config.polynomial_order, &sol).context("building RT element")?;
    let partition = PartitionMap::new(mesh.num_elements(), num_shards.max(1));

    let (bcs, periodic_partners) = build_boundary_table(config, &mesh)?;

    let solver_config = SolverConfig {
        gamma: config.gamma,
        cfl: config.cfl,
        flux_type: config.flux_kind()?,
        kappa: config.kappa,
        local_time_stepping: config.local_time_stepping,
        limiter: config.limiter_kind()?,
    };

    let mut q = FieldArray::zeros(sol.np, mesh.num_elements());
    match config.init_type.as_str() {
        "freestream" => init::init_freestream(&mut q, &sol, config.minf, config.alpha, config.gamma),
        "ivortex" => init::init_isentropic_vortex(&mut q, &sol, &mesh, config.gamma, config.minf, 5.0, 0.0, 5.0),
        "shocktube" => init::init_shocktube(&mut q, &sol, &mesh, config.gamma, 0.5),
        other => bail!("unknown InitType '{other}'"),
    }

    let driver = RkDriver {
        sol,
        rt,
        mesh,
        partition: partition.clone(),
        bcs,
        periodic_partners,
        config: solver_config,
    };

    let mut t = 0.0f64;
    let mut step = 0u64;
    while t < config.final_time && step < config.max_iterations {
        let report = driver.step(&mut q, t).with_context(|| format!("step {step} failed"))?;
        t += report.dt;
        step += 1;
        if report.limiter_active_elements > 0 {
            warn!(step, elements = report.limiter_active_elements, "limiter active");
        }
        if step % 10 == 0 || step == 1 {
            info!(step, t, dt = report.dt, max_wavespeed = report.max_wavespeed, "step complete");
        }
        debug!(step, t, "sub-step diagnostics recorded");
    }

    if let Some(path) = snapshot_path {
        let header = snapshot::SnapshotHeader {
            n: driver.sol.n,
            k: driver.mesh.num_elements(),
            p: driver.num_shards(),
            t,
            step,
        };
        let file = std::fs::File::create(path).with_context(|| format!("creating snapshot file {}", path.display()))?;
        snapshot::write_snapshot(file, &header, &partition, &q).context("writing snapshot")?;
        info!(path = %path.display(), "snapshot written");
    }

    Ok(RunOutcome { steps_taken: step, final_time: t })
}

/// Builds the boundary table and periodic partner map from
/// `Config::bcs`. The nested map is interpreted as
/// `tag -> kind -> numeric params`; a tag with kind `"periodic"` carries
/// an `axis` parameter (`0.0` for x, `1.0` for y) and is paired with
/// another periodic tag sharing the same axis, sorted by tag name.
fn build_boundary_table(config: &Config, mesh: &Mesh) -> anyhow::Result<(BoundaryTable, HashMap<u64, u64>)> {
    let mut bcs = BoundaryTable::new();
    let mut periodic_tags: Vec<(String, Axis)> = Vec::new();

    let mut tags: Vec<&String> = config.bcs.keys().collect();
    tags.sort();

    for tag in tags {
        let kind_map = &config.bcs[tag];
        let mut kinds: Vec<&String> = kind_map.keys().collect();
        kinds.sort();
        let kind_name = kinds.first().ok_or_else(|| anyhow::anyhow!("boundary tag '{tag}' has no kind entry"))?;
        if kinds.len() > 1 {
            warn!(tag = %tag, "boundary tag has more than one kind entry; using '{kind_name}'");
        }
        let params = &kind_map[*kind_name];

        match kind_name.as_str() {
            "farfield" => {
                let state = init::freestream_state(config.minf, config.alpha, config.gamma);
                bcs.insert(tag.clone(), BoundaryKind::FarField(state));
            }
            "wall" => {
                bcs.insert(tag.clone(), BoundaryKind::Wall);
            }
            "vortex" | "ivortex" => {
                let x0 = params.get("x0").copied().unwrap_or(5.0);
                let y0 = params.get("y0").copied().unwrap_or(0.0);
                let beta = params.get("beta").copied().unwrap_or(5.0);
                bcs.insert(tag.clone(), BoundaryKind::IsentropicVortex { x0, y0, beta });
            }
            "periodic" => {
                let axis = match params.get("axis").copied().unwrap_or(0.0) {
                    a if a >= 0.5 => Axis::Y,
                    _ => Axis::X,
                };
                bcs.insert(tag.clone(), BoundaryKind::Periodic);
                periodic_tags.push((tag.clone(), axis));
            }
            other => bail!("unknown boundary kind '{other}' for tag '{tag}'"),
        }
    }

    let mut periodic_partners = HashMap::new();
    let mut remaining = periodic_tags;
    while let Some((tag_a, axis_a)) = remaining.pop() {
        let idx = remaining
            .iter()
            .position(|(_, axis_b)| matches!((axis_a, *axis_b), (Axis::X, Axis::X) | (Axis::Y, Axis::Y)));
        let Some(idx) = idx else {
            bail!("periodic boundary tag '{tag_a}' has no matching partner with the same axis");
        };
        let (tag_b, _) = remaining.remove(idx);
        let partners = operator::build_periodic_partners(mesh, &tag_a, &tag_b, axis_a)?;
        periodic_partners.extend(partners);
    }

    Ok((bcs, periodic_partners))
}
