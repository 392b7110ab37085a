//! Snapshot/restore (spec.md sec 6, "Persisted state"): serializes a
//! header `{N, K, P, t, step}` followed by `Q` in shard order.
//!
//! No new dependency is pulled in for this: the header is five fixed-width
//! little-endian fields and the payload is a plain `f64` stream, since
//! `dg_core` has no I/O concerns beyond this one narrow need.

use crate::error::{Result, SolverError};
use crate::partition::PartitionMap;
use crate::state::FieldArray;
use std::io::{Read, Write};

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotHeader {
    pub n: usize,
    pub k: usize,
    pub p: usize,
    pub t: f64,
    pub step: u64,
}

const HEADER_LEN: usize = 8 * 5;

impl SnapshotHeader {
    fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..8].copy_from_slice(&(self.n as u64).to_le_bytes());
        buf[8..16].copy_from_slice(&(self.k as u64).to_le_bytes());
        buf[16..24].copy_from_slice(&(self.p as u64).to_le_bytes());
        buf[24..32].copy_from_slice(&self.t.to_le_bytes());
        buf[32..40].copy_from_slice(&self.step.to_le_bytes());
        buf
    }

    fn from_bytes(buf: &[u8; HEADER_LEN]) -> Self {
        Self {
            n: u64::from_le_bytes(buf[0..8].try_into().unwrap()) as usize,
            k: u64::from_le_bytes(buf[8..16].try_into().unwrap()) as usize,
            p: u64::from_le_bytes(buf[16..24].try_into().unwrap()) as usize,
            t: f64::from_le_bytes(buf[24..32].try_into().unwrap()),
            step: u64::from_le_bytes(buf[32..40].try_into().unwrap()),
        }
    }
}

pub fn write_snapshot<W: Write>(
    mut out: W,
    header: &SnapshotHeader,
    partition: &PartitionMap,
    q: &FieldArray,
) -> Result<()> {
    out.write_all(&header.to_bytes())
        .map_err(|e| SolverError::solver_state(format!("snapshot write failed: {e}")))?;

    // Q in shard order: for each shard, for each local element, for each
    // field, for each solution node, one little-endian f64.
    for shard in 0..partition.num_shards() {
        for local in 0..partition.shard_len(shard) {
            let global = partition.to_global(shard, local);
            for field in 0..4 {
                for row in 0..q.rows() {
                    out.write_all(&q.fields[field][(row, global)].to_le_bytes())
                        .map_err(|e| SolverError::solver_state(format!("snapshot write failed: {e}")))?;
                }
            }
        }
    }
    Ok(())
}

pub fn read_snapshot<R: Read>(mut input: R, partition: &PartitionMap, np: usize) -> Result<(SnapshotHeader, FieldArray)> {
    let mut header_buf = [0u8; HEADER_LEN];
    input
        .read_exact(&mut header_buf)
        .map_err(|e| SolverError::solver_state(format!("snapshot read failed: {e}")))?;
    let header = SnapshotHeader::from_bytes(&header_buf);

    if header.k != partition.bucket_sizes.iter().sum::<usize>() {
        return Err(SolverError::solver_state("snapshot element count does not match partition"));
    }

    let mut q = FieldArray::zeros(np, header.k);
    let mut f64_buf = [0u8; 8];
    for shard in 0..partition.num_shards() {
        for local in 0..partition.shard_len(shard) {
            let global = partition.to_global(shard, local);
            for field in 0..4 {
                for row in 0..np {
                    input
                        .read_exact(&mut f64_buf)
                        .map_err(|e| SolverError::solver_state(format!("snapshot read failed: {e}")))?;
                    q.fields[field][(row, global)] = f64::from_le_bytes(f64_buf);
                }
            }
        }
    }
    Ok((header, q))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_round_trips_state_and_header() {
        let partition = PartitionMap::new(5, 2);
        let np = 3;
        let mut q = FieldArray::zeros(np, 5);
        for field in 0..4 {
            for c in 0..5 {
                for r in 0..np {
                    q.fields[field][(r, c)] = (field * 100 + c * 10 + r) as f64;
                }
            }
        }
        let header = SnapshotHeader { n: 2, k: 5, p: 2, t: 1.25, step: 40 };

        let mut buf = Vec::new();
        write_snapshot(&mut buf, &header, &partition, &q).unwrap();
        let (got_header, got_q) = read_snapshot(buf.as_slice(), &partition, np).unwrap();

        assert_eq!(got_header, header);
        for field in 0..4 {
            for c in 0..5 {
                for r in 0..np {
                    assert_eq!(got_q.fields[field][(r, c)], q.fields[field][(r, c)]);
                }
            }
        }
    }
}
