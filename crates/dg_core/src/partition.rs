//! Deterministic partitioning of element indices into `P` shards.
//!
//! Bucketing is a plain contiguous split (global index `g` falls in
//! shard `s` if `g` lies in `s`'s contiguous range) -- simple, stable
//! across runs, and sufficient since load balance here is driven purely
//! by element count, not by any runtime cost model.

#[derive(Debug, Clone)]
pub struct PartitionMap {
    /// Number of elements owned by each shard.
    pub bucket_sizes: Vec<usize>,
    /// Prefix sum of `bucket_sizes`; `offsets[s]` is the first global
    /// index owned by shard `s`.
    offsets: Vec<usize>,
    /// Global index -> (shard, local index).
    global_to_local: Vec<(usize, usize)>,
}

impl PartitionMap {
    pub fn new(k: usize, p: usize) -> Self {
        let p = p.max(1);
        let base = k / p;
        let rem = k % p;
        let mut bucket_sizes = vec![base; p];
        for s in bucket_sizes.iter_mut().take(rem) {
            *s += 1;
        }

        let mut offsets = Vec::with_capacity(p);
        let mut acc = 0;
        for &size in &bucket_sizes {
            offsets.push(acc);
            acc += size;
        }

        let mut global_to_local = Vec::with_capacity(k);
        for (shard, &size) in bucket_sizes.iter().enumerate() {
            for local in 0..size {
                global_to_local.push((shard, local));
            }
        }

        Self {
            bucket_sizes,
            offsets,
            global_to_local,
        }
    }

    pub fn num_shards(&self) -> usize {
        self.bucket_sizes.len()
    }

    pub fn shard_len(&self, shard: usize) -> usize {
        self.bucket_sizes[shard]
    }

    pub fn to_local(&self, global: usize) -> (usize, usize) {
        self.global_to_local[global]
    }

    pub fn to_global(&self, shard: usize, local: usize) -> usize {
        self.offsets[shard] + local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_sizes_sum_to_k() {
        for k in [1usize, 2, 3, 7, 16, 100] {
            for p in [1usize, 2, 3, 4, 8] {
                let pm = PartitionMap::new(k, p);
                assert_eq!(pm.bucket_sizes.iter().sum::<usize>(), k);
            }
        }
    }

    #[test]
    fn round_trip_local_global() {
        let pm = PartitionMap::new(17, 4);
        for g in 0..17 {
            let (s, l) = pm.to_local(g);
            assert_eq!(pm.to_global(s, l), g);
        }
    }
}
