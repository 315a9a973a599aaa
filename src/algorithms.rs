//! Sequence algorithms shared by the similarity pass.

/// Edit-distance and subsequence kernels over instruction-text sequences.
///
/// Elements are compared verbatim; normalization happens (or doesn't) at the
/// decoder's formatting step.
pub struct DiffAlgorithms;

impl DiffAlgorithms {
    /// Minimum number of single-element insertions, deletions, or
    /// substitutions required to turn `seq1` into `seq2`.
    pub fn levenshtein_distance(seq1: &[String], seq2: &[String]) -> usize {
        let m = seq1.len();
        let n = seq2.len();

        let mut dp = vec![vec![0usize; n + 1]; m + 1];
        for (i, row) in dp.iter_mut().enumerate() {
            row[0] = i;
        }
        for j in 0..=n {
            dp[0][j] = j;
        }

        for i in 1..=m {
            for j in 1..=n {
                if seq1[i - 1] == seq2[j - 1] {
                    dp[i][j] = dp[i - 1][j - 1];
                } else {
                    let deletion = dp[i - 1][j];
                    let insertion = dp[i][j - 1];
                    let substitution = dp[i - 1][j - 1];
                    dp[i][j] = 1 + deletion.min(insertion).min(substitution);
                }
            }
        }

        dp[m][n]
    }

    /// Longest common subsequence of the two sequences.
    pub fn longest_common_subsequence(seq1: &[String], seq2: &[String]) -> Vec<String> {
        let m = seq1.len();
        let n = seq2.len();

        let mut dp = vec![vec![0usize; n + 1]; m + 1];
        for i in 1..=m {
            for j in 1..=n {
                if seq1[i - 1] == seq2[j - 1] {
                    dp[i][j] = dp[i - 1][j - 1] + 1;
                } else {
                    dp[i][j] = dp[i - 1][j].max(dp[i][j - 1]);
                }
            }
        }

        let mut lcs = Vec::with_capacity(dp[m][n]);
        let (mut i, mut j) = (m, n);
        while i > 0 && j > 0 {
            if seq1[i - 1] == seq2[j - 1] {
                lcs.push(seq1[i - 1].clone());
                i -= 1;
                j -= 1;
            } else if dp[i - 1][j] > dp[i][j - 1] {
                i -= 1;
            } else {
                j -= 1;
            }
        }
        lcs.reverse();
        lcs
    }

    /// Derive what was removed from `seq1` and added in `seq2` by walking
    /// both sequences against their LCS.
    ///
    /// When neither side matches the next common element, one element of each
    /// side is consumed in the same step (primary reported as removed,
    /// secondary as added) rather than folding the pair into a substitution.
    pub fn instruction_differences(
        seq1: &[String],
        seq2: &[String],
    ) -> (Vec<String>, Vec<String>) {
        let lcs = Self::longest_common_subsequence(seq1, seq2);

        let mut removed = Vec::new();
        let mut added = Vec::new();
        let (mut i, mut j, mut k) = (0usize, 0usize, 0usize);

        while i < seq1.len() || j < seq2.len() {
            if k < lcs.len() && i < seq1.len() && seq1[i] == lcs[k] {
                i += 1;
                k += 1;
            } else if k < lcs.len() && j < seq2.len() && seq2[j] == lcs[k] {
                j += 1;
                k += 1;
            } else {
                if i < seq1.len() {
                    removed.push(seq1[i].clone());
                    i += 1;
                }
                if j < seq2.len() {
                    added.push(seq2[j].clone());
                    j += 1;
                }
            }
        }

        (removed, added)
    }
}
