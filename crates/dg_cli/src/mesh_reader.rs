//! A plain-text `MeshSource`, following `original_source/main.go`'s mesh
//! convention: a vertex count and lines, a triangle count and
//! counter-clockwise vertex-index lines, then optional trailing
//! boundary-tag lines.
//!
//! ```text
//! 4
//! 0.0 0.0
//! 1.0 0.0
//! 0.0 1.0
//! 1.0 1.0
//! 2
//! 0 1 2
//! 1 3 2
//! 0 1 farfield
//! 2 3 farfield
//! ```

use anyhow::{bail, Context};
use dg_core::mesh::{pack_edge_key, MeshSource, RawMesh};
use dg_core::SolverError;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub struct FileMeshSource {
    path: PathBuf,
}

impl FileMeshSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }
}

impl MeshSource for FileMeshSource {
    fn read(&self) -> dg_core::Result<RawMesh> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("reading mesh file {}", self.path.display()))
            .map_err(|e| SolverError::mesh(format!("{e:#}")))?;
        parse_mesh_text(&text).map_err(|e| SolverError::mesh(format!("{e:#}")))
    }
}

fn parse_mesh_text(text: &str) -> anyhow::Result<RawMesh> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty() && !l.starts_with('#'));

    let nv: usize = lines
        .next()
        .context("mesh file missing vertex count")?
        .parse()
        .context("invalid vertex count")?;
    let mut vx = Vec::with_capacity(nv);
    let mut vy = Vec::with_capacity(nv);
    for _ in 0..nv {
        let line = lines.next().context("mesh file ended before all vertices were read")?;
        let mut parts = line.split_whitespace();
        let x: f64 = parts.next().context("vertex line missing x")?.parse()?;
        let y: f64 = parts.next().context("vertex line missing y")?.parse()?;
        vx.push(x);
        vy.push(y);
    }

    let nt: usize = lines
        .next()
        .context("mesh file missing triangle count")?
        .parse()
        .context("invalid triangle count")?;
    let mut e_to_v = Vec::with_capacity(nt);
    for _ in 0..nt {
        let line = lines.next().context("mesh file ended before all triangles were read")?;
        let mut parts = line.split_whitespace();
        let v0: usize = parts.next().context("triangle line missing v0")?.parse()?;
        let v1: usize = parts.next().context("triangle line missing v1")?.parse()?;
        let v2: usize = parts.next().context("triangle line missing v2")?.parse()?;
        if v0 >= nv || v1 >= nv || v2 >= nv {
            bail!("triangle references vertex index out of range: {v0} {v1} {v2}");
        }
        e_to_v.push([v0, v1, v2]);
    }

    let mut boundary_tags = HashMap::new();
    for line in lines {
        let mut parts = line.split_whitespace();
        let v0: usize = parts.next().context("boundary tag line missing v0")?.parse()?;
        let v1: usize = parts.next().context("boundary tag line missing v1")?.parse()?;
        let name = parts.next().context("boundary tag line missing tag name")?.to_string();
        boundary_tags.insert(pack_edge_key(v0, v1), name);
    }

    Ok(RawMesh { vx, vy, e_to_v, boundary_tags })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unit_square_with_boundary_tags() {
        let text = "4\n0.0 0.0\n1.0 0.0\n0.0 1.0\n1.0 1.0\n2\n0 1 2\n1 3 2\n0 1 farfield\n2 3 farfield\n";
        let raw = parse_mesh_text(text).unwrap();
        assert_eq!(raw.vx.len(), 4);
        assert_eq!(raw.e_to_v.len(), 2);
        assert_eq!(raw.boundary_tags.len(), 2);
    }

    #[test]
    fn rejects_out_of_range_vertex_index() {
        let text = "3\n0.0 0.0\n1.0 0.0\n0.0 1.0\n1\n0 1 9\n";
        assert!(parse_mesh_text(text).is_err());
    }

    #[test]
    fn ignores_blank_lines_and_comments() {
        let text = "# a comment\n4\n0.0 0.0\n1.0 0.0\n\n0.0 1.0\n1.0 1.0\n2\n0 1 2\n1 3 2\n";
        let raw = parse_mesh_text(text).unwrap();
        assert_eq!(raw.vx.len(), 4);
        assert_eq!(raw.e_to_v.len(), 2);
        assert!(raw.boundary_tags.is_empty());
    }
}
