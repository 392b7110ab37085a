//! Mesh topology, edge adjacency, and per-element affine metrics.
//!
//! Mesh ingest itself (turning a file into `VX`/`VY`/`EToV`/boundary
//! tags) is outside this crate's scope -- `dg_cli` implements the
//! [`RawMesh`] producer. This module only consumes that triple and
//! builds everything the solver needs from it: the edge dictionary,
//! per-side adjacency and orientation, and the affine Jacobian/metric
//! terms per element.

use crate::error::{Result, SolverError};
use std::collections::HashMap;

/// What an external mesh reader hands to the solver (spec.md sec 6).
#[derive(Debug, Clone)]
pub struct RawMesh {
    pub vx: Vec<f64>,
    pub vy: Vec<f64>,
    /// Counter-clockwise vertex indices per triangle.
    pub e_to_v: Vec<[usize; 3]>,
    /// Boundary tag keyed by the packed edge key, for edges with exactly
    /// one connected triangle.
    pub boundary_tags: HashMap<u64, String>,
}

/// External mesh ingest boundary (spec.md sec 6): anything that can
/// produce a [`RawMesh`]. `dg_core` only consumes the result; reading a
/// mesh off disk is `dg_cli`'s concern.
pub trait MeshSource {
    fn read(&self) -> Result<RawMesh>;
}

/// Packs an unordered vertex-index pair into a single 64-bit key:
/// low 32 bits = `min(v0, v1)`, high 32 bits = `max(v0, v1)`.
pub fn pack_edge_key(v0: usize, v1: usize) -> u64 {
    let (lo, hi) = if v0 <= v1 { (v0, v1) } else { (v1, v0) };
    (lo as u64) | ((hi as u64) << 32)
}

/// Inverse of [`pack_edge_key`]: returns `(min, max)`.
pub fn unpack_edge_key(key: u64) -> (u32, u32) {
    let lo = (key & 0xFFFF_FFFF) as u32;
    let hi = (key >> 32) as u32;
    (lo, hi)
}

#[derive(Debug, Clone, Copy)]
pub struct EdgeSide {
    pub element: usize,
    pub local_edge: usize,
    /// True when this triangle traverses the edge from the higher to the
    /// lower global vertex id.
    pub reversed: bool,
    /// Ratio of physical to reference edge length on this side, used to
    /// scale the normal flux into RT units.
    pub n_norm: f64,
    /// True physical outward unit normal `(nx, ny)` of this side, computed
    /// from the triangle's own vertex coordinates (not the reference
    /// element's fixed per-edge direction) -- see
    /// `original_source/model_problems/Euler2D/edges.go`'s `getEdgeNormal`.
    pub nx: f64,
    pub ny: f64,
}

#[derive(Debug, Clone)]
pub struct EdgeRecord {
    pub key: u64,
    pub sides: Vec<EdgeSide>,
    pub boundary_tag: Option<String>,
}

impl EdgeRecord {
    pub fn is_interior(&self) -> bool {
        self.sides.len() == 2
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ElementMetrics {
    pub xr: f64,
    pub xs: f64,
    pub yr: f64,
    pub ys: f64,
    pub jdet: f64,
    /// `(Jinv00, Jinv01, Jinv10, Jinv11) = (1/Jdet) * [[ys,-yr],[-xs,xr]]`
    /// per spec.md sec 4.4.
    pub jinv: [f64; 4],
}

/// Reference-edge lengths for edges 0 (hypotenuse), 1 (left), 2 (bottom).
const REF_EDGE_LEN: [f64; 3] = [2.0 * std::f64::consts::SQRT_2, 2.0, 2.0];

/// Local edge `(va, vb)` vertex-index pairs, matching the reference
/// triangle's edge numbering (edge e is opposite local vertex e).
fn local_edge_vertices(tri: &[usize; 3], local_edge: usize) -> (usize, usize) {
    match local_edge {
        0 => (tri[1], tri[2]),
        1 => (tri[2], tri[0]),
        _ => (tri[0], tri[1]),
    }
}

pub struct Mesh {
    pub vx: Vec<f64>,
    pub vy: Vec<f64>,
    pub e_to_v: Vec<[usize; 3]>,
    pub edges: HashMap<u64, EdgeRecord>,
    /// Stable iteration order over edge keys, sorted for determinism.
    pub edge_keys_sorted: Vec<u64>,
    pub metrics: Vec<ElementMetrics>,
}

impl Mesh {
    pub fn build(raw: RawMesh) -> Result<Self> {
        let k = raw.e_to_v.len();
        let mut edges: HashMap<u64, EdgeRecord> = HashMap::new();

        for (elem, tri) in raw.e_to_v.iter().enumerate() {
            for local_edge in 0..3 {
                let (va, vb) = local_edge_vertices(tri, local_edge);
                let key = pack_edge_key(va, vb);
                let dx = raw.vx[vb] - raw.vx[va];
                let dy = raw.vy[vb] - raw.vy[va];
                let phys_len = (dx * dx + dy * dy).sqrt();
                let n_norm = phys_len / REF_EDGE_LEN[local_edge];
                // Outward unit normal of a CCW-wound triangle's edge
                // traversed va->vb is the edge vector rotated -90 degrees:
                // (dy, -dx) normalized. Jdet > 0 is enforced at mesh build,
                // so every triangle's own vertex order is CCW and this
                // formula needs no separate per-triangle winding check.
                let (nx, ny) = (dy / phys_len, -dx / phys_len);
                let side = EdgeSide {
                    element: elem,
                    local_edge,
                    reversed: va > vb,
                    n_norm,
                    nx,
                    ny,
                };
                let rec = edges.entry(key).or_insert_with(|| EdgeRecord {
                    key,
                    sides: Vec::with_capacity(2),
                    boundary_tag: raw.boundary_tags.get(&key).cloned(),
                });
                rec.sides.push(side);
                if rec.sides.len() > 2 {
                    return Err(SolverError::mesh(format!(
                        "non-manifold edge: key {key} referenced by more than two triangles"
                    )));
                }
            }
        }

        for tag_key in raw.boundary_tags.keys() {
            if !edges.contains_key(tag_key) {
                return Err(SolverError::mesh(format!(
                    "boundary tag declared for edge key {tag_key} that does not exist in the mesh"
                )));
            }
        }

        let mut edge_keys_sorted: Vec<u64> = edges.keys().copied().collect();
        edge_keys_sorted.sort_unstable();

        let mut metrics = Vec::with_capacity(k);
        for tri in &raw.e_to_v {
            let (x0, y0) = (raw.vx[tri[0]], raw.vy[tri[0]]);
            let (x1, y1) = (raw.vx[tri[1]], raw.vy[tri[1]]);
            let (x2, y2) = (raw.vx[tri[2]], raw.vy[tri[2]]);
            let xr = (x1 - x0) / 2.0;
            let xs = (x2 - x0) / 2.0;
            let yr = (y1 - y0) / 2.0;
            let ys = (y2 - y0) / 2.0;
            let jdet = xr * ys - xs * yr;
            if jdet <= 0.0 {
                return Err(SolverError::mesh(
                    "degenerate or clockwise-wound triangle (Jdet <= 0)",
                ));
            }
            let jinv = [ys / jdet, -yr / jdet, -xs / jdet, xr / jdet];
            metrics.push(ElementMetrics { xr, xs, yr, ys, jdet, jinv });
        }

        Ok(Self {
            vx: raw.vx,
            vy: raw.vy,
            e_to_v: raw.e_to_v,
            edges,
            edge_keys_sorted,
            metrics,
        })
    }

    pub fn num_elements(&self) -> usize {
        self.e_to_v.len()
    }

    /// Physical `(x, y)` of a reference point `(r, s)` inside element `k`.
    pub fn map_to_physical(&self, k: usize, r: f64, s: f64) -> (f64, f64) {
        let tri = &self.e_to_v[k];
        let (x0, y0) = (self.vx[tri[0]], self.vy[tri[0]]);
        let (x1, y1) = (self.vx[tri[1]], self.vy[tri[1]]);
        let (x2, y2) = (self.vx[tri[2]], self.vy[tri[2]]);
        let l1 = -(r + s) / 2.0;
        let l2 = (r + 1.0) / 2.0;
        let l3 = (s + 1.0) / 2.0;
        (l1 * x0 + l2 * x1 + l3 * x2, l1 * y0 + l2 * y1 + l3 * y2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_key_round_trips() {
        let cases: [(u32, u32); 5] = [(0, 1), (5, 3), (u32::MAX, 0), (1, u32::MAX), (12345, 6789)];
        for (v0, v1) in cases {
            let key = pack_edge_key(v0 as usize, v1 as usize);
            let (lo, hi) = unpack_edge_key(key);
            assert_eq!((lo, hi), (v0.min(v1), v0.max(v1)));
        }
    }

    fn two_triangle_mesh() -> RawMesh {
        // Two right triangles sharing the diagonal edge (1,2).
        RawMesh {
            vx: vec![0.0, 1.0, 0.0, 1.0],
            vy: vec![0.0, 0.0, 1.0, 1.0],
            e_to_v: vec![[0, 1, 2], [1, 3, 2]],
            boundary_tags: HashMap::new(),
        }
    }

    #[test]
    fn shared_edge_has_two_opposite_oriented_sides() {
        let mesh = Mesh::build(two_triangle_mesh()).unwrap();
        let key = pack_edge_key(1, 2);
        let rec = &mesh.edges[&key];
        assert!(rec.is_interior());
        assert_eq!(rec.sides.len(), 2);
        assert_ne!(rec.sides[0].reversed, rec.sides[1].reversed);
    }

    #[test]
    fn all_jacobians_are_positive() {
        let mesh = Mesh::build(two_triangle_mesh()).unwrap();
        for m in &mesh.metrics {
            assert!(m.jdet > 0.0);
        }
    }

    #[test]
    fn hypotenuse_normal_matches_vertex_geometry_on_a_non_isoceles_triangle() {
        // A triangle that is not a rotation/uniform-scale of the reference
        // triangle: EDGE_REF_NORMALS[0] would wrongly give (0.707, 0.707)
        // for the hypotenuse here. The true outward normal, computed from
        // vertices v1=(2,0), v2=(0,1), is (1,2)/sqrt(5).
        let raw = RawMesh {
            vx: vec![0.0, 2.0, 0.0],
            vy: vec![0.0, 0.0, 1.0],
            e_to_v: vec![[0, 1, 2]],
            boundary_tags: HashMap::new(),
        };
        let mesh = Mesh::build(raw).unwrap();
        let key = pack_edge_key(1, 2);
        let side = &mesh.edges[&key].sides[0];
        assert_eq!(side.local_edge, 0);
        let expected = (1.0 / 5.0_f64.sqrt(), 2.0 / 5.0_f64.sqrt());
        assert!((side.nx - expected.0).abs() < 1e-12, "nx = {}", side.nx);
        assert!((side.ny - expected.1).abs() < 1e-12, "ny = {}", side.ny);

        // Edge 1 (v2->v0 = left edge) outward normal is (-1, 0).
        let left = &mesh.edges[&pack_edge_key(2, 0)].sides[0];
        assert!((left.nx - (-1.0)).abs() < 1e-12);
        assert!(left.ny.abs() < 1e-12);

        // Edge 2 (v0->v1 = bottom edge) outward normal is (0, -1).
        let bottom = &mesh.edges[&pack_edge_key(0, 1)].sides[0];
        assert!(bottom.nx.abs() < 1e-12);
        assert!((bottom.ny - (-1.0)).abs() < 1e-12);
    }

    #[test]
    fn degenerate_triangle_is_rejected() {
        let raw = RawMesh {
            vx: vec![0.0, 1.0, 2.0],
            vy: vec![0.0, 0.0, 0.0],
            e_to_v: vec![[0, 1, 2]],
            boundary_tags: HashMap::new(),
        };
        assert!(Mesh::build(raw).is_err());
    }
}
