//! Top-level comparison driver.

use std::path::Path;

use anyhow::Result;
use log::{info, warn};
use rustc_hash::FxHashSet;

use crate::analyzer::FunctionAnalyzer;
use crate::loader::Image;
use crate::matching::MatchingEngine;
use crate::{DiffResult, FunctionInfo, FunctionMatch};

/// Orchestrates the pipeline for one pair of images: load, recover
/// functions, match, and partition the residuals.
pub struct BinaryDiffer {
    primary: Image,
    secondary: Image,
}

impl BinaryDiffer {
    /// Load both images. File and header problems surface here; everything
    /// after `new` degrades locally instead of failing.
    pub fn new(primary: impl AsRef<Path>, secondary: impl AsRef<Path>) -> Result<Self> {
        Ok(BinaryDiffer {
            primary: Image::load(primary)?,
            secondary: Image::load(secondary)?,
        })
    }

    pub fn compare(&self) -> Result<DiffResult> {
        let (Some(primary_text), Some(secondary_text)) =
            (self.primary.text_section(), self.secondary.text_section())
        else {
            warn!("no .text section in one of the images; reporting an empty diff");
            return Ok(DiffResult::default());
        };

        info!(
            "text section sizes: primary {}, secondary {}",
            primary_text.data.len(),
            secondary_text.data.len()
        );

        let primary_analyzer = FunctionAnalyzer::new(
            &primary_text.data,
            self.primary.image_base() + primary_text.virtual_address,
        )?;
        let secondary_analyzer = FunctionAnalyzer::new(
            &secondary_text.data,
            self.secondary.image_base() + secondary_text.virtual_address,
        )?;

        let primary_funcs = primary_analyzer.identify_functions();
        let secondary_funcs = secondary_analyzer.identify_functions();

        info!(
            "functions identified: primary {}, secondary {}",
            primary_funcs.len(),
            secondary_funcs.len()
        );

        let matched = MatchingEngine::new().match_functions(&primary_funcs, &secondary_funcs);
        Ok(partition(matched, primary_funcs, secondary_funcs))
    }
}

/// Load two images and diff them in one call.
pub fn diff_binaries(
    primary: impl AsRef<Path>,
    secondary: impl AsRef<Path>,
) -> Result<DiffResult> {
    BinaryDiffer::new(primary, secondary)?.compare()
}

/// Sort the recovered functions into the three-way result: matched pairs
/// plus, per image, everything whose start address no accepted pair claims.
fn partition(
    matched: Vec<FunctionMatch>,
    primary_funcs: Vec<FunctionInfo>,
    secondary_funcs: Vec<FunctionInfo>,
) -> DiffResult {
    let matched_primary: FxHashSet<u64> =
        matched.iter().map(|m| m.primary.start_address).collect();
    let matched_secondary: FxHashSet<u64> =
        matched.iter().map(|m| m.secondary.start_address).collect();

    let unmatched_primary = primary_funcs
        .into_iter()
        .filter(|f| !matched_primary.contains(&f.start_address))
        .collect();
    let unmatched_secondary = secondary_funcs
        .into_iter()
        .filter(|f| !matched_secondary.contains(&f.start_address))
        .collect();

    DiffResult { matched, unmatched_primary, unmatched_secondary }
}
