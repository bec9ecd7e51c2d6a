//! Multiple-testing corrections over one family of p-values.
//!
//! Missing (NaN) p-values stay missing and do not count towards the family
//! size. Adjusted values are clipped to 1.

use std::cmp::Ordering;

fn valid_indices(pvalues: &[f64]) -> Vec<usize> {
    (0..pvalues.len())
        .filter(|&i| !pvalues[i].is_nan())
        .collect()
}

pub fn bonferroni(pvalues: &[f64]) -> Vec<f64> {
    let m = valid_indices(pvalues).len() as f64;
    pvalues
        .iter()
        .map(|&p| if p.is_nan() { f64::NAN } else { (p * m).min(1.0) })
        .collect()
}

/// Step-up Benjamini-Hochberg adjustment. Ties keep input order.
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    let mut order = valid_indices(pvalues);
    let m = order.len();
    let mut q = vec![f64::NAN; pvalues.len()];
    if m == 0 {
        return q;
    }
    order.sort_by(|&i, &j| {
        pvalues[i]
            .partial_cmp(&pvalues[j])
            .unwrap_or(Ordering::Equal)
            .then(i.cmp(&j))
    });

    let mut prev = 1.0_f64;
    for (rank0, &idx) in order.iter().enumerate().rev() {
        let rank = rank0 + 1;
        let adj = (pvalues[idx] * m as f64 / rank as f64).min(1.0);
        prev = prev.min(adj);
        q[idx] = prev;
    }
    q
}
