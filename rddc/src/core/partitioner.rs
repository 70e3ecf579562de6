use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{require_positive, Result};

/// Content-hash partitioner used by `repartition`.
///
/// An element is hashed through its compact json form, so the assignment only
/// depends on the element's value and the seed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashPartitioner {
    num_partitions: usize,
    seed: u32,
}

impl HashPartitioner {
    pub fn new(num_partitions: usize, seed: u32) -> Result<Self> {
        Ok(Self {
            num_partitions: require_positive("num_partitions", num_partitions)?,
            seed,
        })
    }

    pub fn partitions_num(&self) -> usize {
        self.num_partitions
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// # Panics
    /// If the partitioner was deserialized with zero partitions.
    pub fn partition_of(&self, value: &Value) -> usize {
        // object keys are sorted, so equal values always print the same way
        let canonical = value.to_string();
        murmur3_32(canonical.as_bytes(), self.seed) as usize % self.num_partitions
    }
}

const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;

#[inline]
fn mix_k1(k1: u32) -> u32 {
    k1.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2)
}

#[inline]
fn mix_h1(h1: u32, k1: u32) -> u32 {
    (h1 ^ k1)
        .rotate_left(13)
        .wrapping_mul(5)
        .wrapping_add(0xe654_6b64)
}

#[inline]
fn fmix(mut h1: u32) -> u32 {
    h1 ^= h1 >> 16;
    h1 = h1.wrapping_mul(0x85eb_ca6b);
    h1 ^= h1 >> 13;
    h1 = h1.wrapping_mul(0xc2b2_ae35);
    h1 ^ (h1 >> 16)
}

/// MurmurHash3, x86 32-bit variant.
pub fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    let mut h1 = seed;
    let mut blocks = data.chunks_exact(4);
    for block in &mut blocks {
        let k1 = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        h1 = mix_h1(h1, mix_k1(k1));
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        let k1 = tail
            .iter()
            .enumerate()
            .fold(0_u32, |k1, (i, byte)| k1 | (u32::from(*byte) << (8 * i)));
        h1 ^= mix_k1(k1);
    }

    fmix(h1 ^ data.len() as u32)
}
