//! Structural diffing of x86-64 binaries.
//!
//! Given two PE or ELF images, `bindelta` recovers function boundaries and
//! control flow from their `.text` sections, pairs functions across the two
//! images by a coarse fingerprint, scores candidate pairs block-by-block,
//! and reports matched, removed, and added functions.
//!
//! The pipeline runs loader -> analyzer -> matcher; see [`differ::BinaryDiffer`]
//! for the orchestration and [`DiffResult`] for the output shape.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

pub mod algorithms;
pub mod analyzer;
pub mod decoder;
pub mod differ;
pub mod loader;
pub mod matching;
pub mod similarity;
pub mod ui;

/// A basic block recovered from the `.text` section.
///
/// Blocks reference their successors by start address rather than by owning
/// pointers, so a function's blocks live in one flat `Vec` in discovery
/// order. `end_address` is exclusive: the first byte past the last decoded
/// instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicBlockInfo {
    pub start_address: u64,
    pub end_address: u64,
    /// Formatted instruction text, in program order.
    pub instructions: Vec<String>,
    /// Start addresses of successor blocks.
    pub successors: Vec<u64>,
}

impl BasicBlockInfo {
    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }
}

/// Coarse function signature used to prune the pairwise comparison space.
///
/// Two functions are only ever scored against each other when their
/// fingerprints are equal; collisions inside a bucket are resolved by the
/// full block-level similarity pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub block_count: usize,
    pub instruction_count: usize,
}

impl Hash for Fingerprint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Golden-ratio combiner, keeps (a, b) and (b, a) in distinct buckets.
        let h1 = self.block_count as u64;
        let h2 = self.instruction_count as u64;
        let mixed = h1
            ^ h2.wrapping_add(0x9e37_79b9)
                .wrapping_add(h1 << 6)
                .wrapping_add(h1 >> 2);
        state.write_u64(mixed);
    }
}

/// A function recovered from one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub start_address: u64,
    /// Maximum `end_address` over all blocks (exclusive).
    pub end_address: u64,
    /// Blocks in discovery order. The matcher aligns blocks positionally,
    /// so this order is part of the contract.
    pub basic_blocks: Vec<BasicBlockInfo>,
    pub fingerprint: Fingerprint,
    /// Set by the matcher; 0.0 until the function is part of an accepted pair.
    pub similarity_score: f64,
    /// Per-block diff detail, set by the matcher; empty until matched.
    pub diff_details: Vec<String>,
}

impl FunctionInfo {
    pub fn instruction_count(&self) -> usize {
        self.basic_blocks.iter().map(|b| b.instruction_count()).sum()
    }
}

/// An accepted one-to-one pairing between a primary and a secondary function.
///
/// The primary copy carries the similarity score and diff details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionMatch {
    pub primary: FunctionInfo,
    pub secondary: FunctionInfo,
}

impl FunctionMatch {
    pub fn similarity(&self) -> f64 {
        self.primary.similarity_score
    }

    /// A match is "unchanged" when the pair scored 1.0; anything lower is a
    /// modified function.
    pub fn is_unchanged(&self) -> bool {
        self.primary.similarity_score >= 1.0
    }
}

/// Three-way partition of the two function populations.
///
/// Every recovered function appears in exactly one place: as one side of a
/// matched pair, or in the unmatched list for its image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffResult {
    pub matched: Vec<FunctionMatch>,
    /// Functions present only in the primary image ("removed").
    pub unmatched_primary: Vec<FunctionInfo>,
    /// Functions present only in the secondary image ("added").
    pub unmatched_secondary: Vec<FunctionInfo>,
}

impl DiffResult {
    /// Mean similarity over matched pairs, 0.0 when nothing matched.
    pub fn overall_similarity(&self) -> f64 {
        if self.matched.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.matched.iter().map(|m| m.similarity()).sum();
        sum / self.matched.len() as f64
    }

    pub fn unchanged_count(&self) -> usize {
        self.matched.iter().filter(|m| m.is_unchanged()).count()
    }

    pub fn modified_count(&self) -> usize {
        self.matched.len() - self.unchanged_count()
    }
}
