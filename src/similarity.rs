//! Block-aligned function similarity scoring.

use log::debug;

use crate::algorithms::DiffAlgorithms;
use crate::{BasicBlockInfo, FunctionInfo};

pub struct SimilarityAnalyzer;

impl SimilarityAnalyzer {
    /// Score two functions in `[0.0, 1.0]` and collect per-block diff details.
    ///
    /// Blocks are aligned positionally: the i-th block of `f1` against the
    /// i-th block of `f2`, up to the shorter function. Pairs scoring above
    /// 0.5 contribute to the function score; pairs below 1.0 also emit a
    /// diff detail entry. Extra blocks of the longer function are left to
    /// the rendering layer.
    pub fn calculate_function_similarity(
        f1: &FunctionInfo,
        f2: &FunctionInfo,
    ) -> (f64, Vec<String>) {
        let mut total_similarity = 0.0;
        let mut compared_blocks = 0usize;
        let mut diff_details = Vec::new();

        let pairs = f1.basic_blocks.len().min(f2.basic_blocks.len());
        for i in 0..pairs {
            let bb1 = &f1.basic_blocks[i];
            let bb2 = &f2.basic_blocks[i];

            let mut block_similarity = Self::block_similarity(bb1, bb2);

            // Very dissimilar blocks may just have been reordered by the
            // compiler; look for a better counterpart anywhere in f2. The
            // alignment (and the diff detail below) stays positional.
            if block_similarity < 0.3 {
                let mut best_similarity = 0.0;
                for other in &f2.basic_blocks {
                    let current = Self::block_similarity(bb1, other);
                    if current > best_similarity {
                        best_similarity = current;
                        block_similarity = current;
                    }
                }
            }

            if block_similarity > 0.5 {
                debug!("block {} similarity: {:.3}", i, block_similarity);
                total_similarity += block_similarity;
                compared_blocks += 1;

                if block_similarity < 1.0 {
                    diff_details.push(Self::block_detail(bb1, bb2, block_similarity));
                }
            }
        }

        let score = if compared_blocks > 0 {
            total_similarity / compared_blocks as f64
        } else {
            0.0
        };

        (score, diff_details)
    }

    /// `1 - d/n` over the two instruction sequences, where `d` is the
    /// Levenshtein distance and `n` the longer length. Two empty blocks
    /// count as identical.
    fn block_similarity(bb1: &BasicBlockInfo, bb2: &BasicBlockInfo) -> f64 {
        let n = bb1.instructions.len().max(bb2.instructions.len());
        if n == 0 {
            return 1.0;
        }
        let distance = DiffAlgorithms::levenshtein_distance(&bb1.instructions, &bb2.instructions);
        1.0 - distance as f64 / n as f64
    }

    fn block_detail(bb1: &BasicBlockInfo, bb2: &BasicBlockInfo, similarity: f64) -> String {
        let mut detail = format!(
            "Block at 0x{:x} -> 0x{:x} ({:.1}% similar):\n",
            bb1.start_address,
            bb2.start_address,
            similarity * 100.0
        );

        let (removed, added) =
            DiffAlgorithms::instruction_differences(&bb1.instructions, &bb2.instructions);
        if !removed.is_empty() {
            detail.push_str("  Removed:\n");
            for insn in &removed {
                detail.push_str(&format!("    - {insn}\n"));
            }
        }
        if !added.is_empty() {
            detail.push_str("  Added:\n");
            for insn in &added {
                detail.push_str(&format!("    + {insn}\n"));
            }
        }

        detail
    }
}
