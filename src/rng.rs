//! Injectable deterministic randomness.
//!
//! Every randomized step (document sampling, truncation side, mask substitution,
//! n-gram subset shuffle) draws from one `DeterministicRng` owned by the worker
//! processing a document. Seeds are derived from `(seed, epoch, doc_idx)` so a
//! document produces the same instances regardless of which thread handles it.

use std::hash::Hash;

use crate::constants::rng::{DOCUMENT_SEED_SALT, EPOCH_SEED_OFFSET};
use crate::hash::stable_hash_with;
use crate::types::DocIndex;

/// Small deterministic RNG (splitmix64) used for reproducible generation.
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    /// Create a generator from a raw seed.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Generator dedicated to one document within one epoch.
    pub fn for_document(seed: u64, epoch: u64, doc_idx: DocIndex) -> Self {
        Self::new(document_seed(seed, epoch, doc_idx))
    }

    fn next_u64_internal(&mut self) -> u64 {
        let mut z = self.state.wrapping_add(0x9E3779B97F4A7C15);
        self.state = z;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^ (z >> 31)
    }
}

impl rand::RngCore for DeterministicRng {
    fn next_u32(&mut self) -> u32 {
        self.next_u64_internal() as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.next_u64_internal()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        let mut offset = 0;
        while offset < dest.len() {
            let value = self.next_u64_internal();
            let bytes = value.to_le_bytes();
            let remaining = dest.len() - offset;
            let copy_len = remaining.min(bytes.len());
            dest[offset..offset + copy_len].copy_from_slice(&bytes[..copy_len]);
            offset += copy_len;
        }
    }
}

/// Derive the seed for one epoch from the run seed.
pub fn epoch_seed(seed: u64, epoch: u64) -> u64 {
    seed ^ EPOCH_SEED_OFFSET.wrapping_mul(epoch.wrapping_add(1))
}

/// Derive the seed for one document of one epoch.
pub fn document_seed(seed: u64, epoch: u64, doc_idx: DocIndex) -> u64 {
    stable_hash_with(|hasher| {
        DOCUMENT_SEED_SALT.hash(hasher);
        epoch_seed(seed, epoch).hash(hasher);
        (doc_idx as u64).hash(hasher);
    })
}
