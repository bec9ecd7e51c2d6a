use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::correction::{benjamini_hochberg, bonferroni};
use crate::types::VariantCandidate;

/// Multiple-testing correction applied within each variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowCorrection {
    #[default]
    Bonferroni,
    #[serde(alias = "bh", alias = "fdr")]
    BenjaminiHochberg,
}

/// Corrected q of every pair, adjusted across the mediators of its variant.
/// Returned in input order.
pub fn rowwise_q(candidates: &[VariantCandidate], correction: RowCorrection) -> Vec<f64> {
    let mut by_variant: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, c) in candidates.iter().enumerate() {
        by_variant.entry(c.variant.as_str()).or_default().push(i);
    }
    let mut q = vec![f64::NAN; candidates.len()];
    for rows in by_variant.values() {
        let p: Vec<f64> = rows.iter().map(|&i| candidates[i].p_value).collect();
        let adjusted = match correction {
            RowCorrection::Bonferroni => bonferroni(&p),
            RowCorrection::BenjaminiHochberg => benjamini_hochberg(&p),
        };
        for (&i, adj) in rows.iter().zip(adjusted) {
            q[i] = adj;
        }
    }
    q
}

/// Hit mediators per variant, variants sorted by id. A pair is a hit when
/// its corrected q is below `q_threshold` and its PIP exceeds `pip_threshold`.
pub fn variant_hits(
    candidates: &[VariantCandidate],
    correction: RowCorrection,
    q_threshold: f64,
    pip_threshold: f64,
) -> BTreeMap<String, Vec<String>> {
    let q = rowwise_q(candidates, correction);
    let mut hits: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (c, q) in candidates.iter().zip(q) {
        if q < q_threshold && c.pip > pip_threshold {
            let mediators = hits.entry(c.variant.clone()).or_default();
            if !mediators.contains(&c.mediator) {
                mediators.push(c.mediator.clone());
            }
        }
    }
    hits
}

/// Consecutive chunks of `group_size` variants; these are the grid rows of a
/// genotype screen.
pub fn group_variants(
    hits: &BTreeMap<String, Vec<String>>,
    group_size: usize,
) -> Vec<Vec<String>> {
    let variants: Vec<String> = hits.keys().cloned().collect();
    variants
        .chunks(group_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}
