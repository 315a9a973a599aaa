//! Cross-image function matching.
//!
//! Candidate pairs are generated only inside shared fingerprint buckets,
//! which keeps the pairwise scoring tractable on real binaries. The flip
//! side is accepted: a function whose block or instruction count changed at
//! all can never match its counterpart.

use std::cmp::Ordering;

use log::{debug, info};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::similarity::SimilarityAnalyzer;
use crate::{Fingerprint, FunctionInfo, FunctionMatch};

/// Acceptance floor for a candidate pair's similarity score.
const SIMILARITY_FLOOR: f64 = 0.7;

pub struct MatchingEngine {
    similarity_floor: f64,
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchingEngine {
    pub fn new() -> Self {
        MatchingEngine { similarity_floor: SIMILARITY_FLOOR }
    }

    pub fn with_floor(similarity_floor: f64) -> Self {
        MatchingEngine { similarity_floor }
    }

    /// Pair functions one-to-one across the two images.
    ///
    /// The returned matches carry the similarity score and diff details on
    /// the primary copy. Selection is greedy over candidates sorted by
    /// score descending, ties broken by (primary index, secondary index)
    /// ascending, so the result is deterministic.
    pub fn match_functions(
        &self,
        primary: &[FunctionInfo],
        secondary: &[FunctionInfo],
    ) -> Vec<FunctionMatch> {
        let primary_buckets = bucket_by_fingerprint(primary);
        let secondary_buckets = bucket_by_fingerprint(secondary);

        // Enumerate pairs inside shared buckets only.
        let mut pairs: Vec<(usize, usize)> = Vec::new();
        for (fingerprint, p_bucket) in &primary_buckets {
            let Some(s_bucket) = secondary_buckets.get(fingerprint) else { continue };
            debug!(
                "bucket ({} blocks, {} instructions): {} primary x {} secondary",
                fingerprint.block_count,
                fingerprint.instruction_count,
                p_bucket.len(),
                s_bucket.len()
            );
            for &p in p_bucket {
                for &s in s_bucket {
                    pairs.push((p, s));
                }
            }
        }

        // Buckets are independent, so pair scoring parallelizes freely; the
        // sort below restores a deterministic order.
        let mut candidates: Vec<(f64, usize, usize, Vec<String>)> = pairs
            .par_iter()
            .filter_map(|&(p, s)| {
                let (score, details) =
                    SimilarityAnalyzer::calculate_function_similarity(&primary[p], &secondary[s]);
                (score > self.similarity_floor).then(|| (score, p, s, details))
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
                .then_with(|| a.2.cmp(&b.2))
        });

        // Greedy one-to-one sweep.
        let mut matches = Vec::new();
        let mut used_primary = FxHashSet::default();
        let mut used_secondary = FxHashSet::default();

        for (score, p, s, details) in candidates {
            if used_primary.contains(&p) || used_secondary.contains(&s) {
                continue;
            }

            let mut annotated = primary[p].clone();
            annotated.similarity_score = score;
            annotated.diff_details = details;

            matches.push(FunctionMatch { primary: annotated, secondary: secondary[s].clone() });
            used_primary.insert(p);
            used_secondary.insert(s);
        }

        info!(
            "matching complete: {} matches from {} primary and {} secondary functions",
            matches.len(),
            primary.len(),
            secondary.len()
        );

        matches
    }
}

fn bucket_by_fingerprint(functions: &[FunctionInfo]) -> FxHashMap<Fingerprint, Vec<usize>> {
    let mut buckets: FxHashMap<Fingerprint, Vec<usize>> = FxHashMap::default();
    for (index, function) in functions.iter().enumerate() {
        buckets.entry(function.fingerprint).or_default().push(index);
    }
    buckets
}
