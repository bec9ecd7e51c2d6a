use std::collections::BTreeMap;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::types::{FitError, FitResult, LogisticFit};

/// Cluster-robust (sandwich) covariance for a weighted logistic fit.
///
/// Rows sharing a cluster id contribute one summed score vector to the meat,
/// so duplicated rows of the same subject are not counted as independent.
/// The `G / (G - 1)` small-sample adjustment is applied.
pub fn cluster_robust_vcov(
    fit: &LogisticFit,
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    weights: Option<ArrayView1<f64>>,
    clusters: &[usize],
) -> FitResult<Array2<f64>> {
    let (n, p) = x.dim();
    if y.len() != n || clusters.len() != n || fit.fitted.len() != n {
        return Err(FitError::Dimension(format!(
            "sandwich inputs disagree: {n} rows, {} responses, {} clusters, {} fitted",
            y.len(),
            clusters.len(),
            fit.fitted.len()
        )));
    }

    let w = match weights {
        Some(w) if w.len() == n => w.to_owned(),
        Some(w) => {
            return Err(FitError::Dimension(format!(
                "sandwich has {n} rows but weights have {}",
                w.len()
            )));
        }
        None => Array1::ones(n),
    };
    let resid = &w * &(&y - &fit.fitted);
    let row_scores = &x * &resid.view().insert_axis(Axis(1));

    let mut index: BTreeMap<usize, usize> = BTreeMap::new();
    for (r, &cluster) in clusters.iter().enumerate() {
        if w[r] != 0.0 {
            let next = index.len();
            index.entry(cluster).or_insert(next);
        }
    }
    let g = index.len();
    if g < 2 {
        return Err(FitError::TooFewObservations {
            observed: g,
            parameters: p,
        });
    }

    let mut scores = Array2::<f64>::zeros((g, p));
    for (r, score) in row_scores.rows().into_iter().enumerate() {
        if let Some(&k) = index.get(&clusters[r]) {
            let mut acc = scores.row_mut(k);
            acc += &score;
        }
    }
    let meat = scores.t().dot(&scores);
    let adjust = g as f64 / (g as f64 - 1.0);
    let bread = &fit.vcov;
    Ok(bread.dot(&meat).dot(bread) * adjust)
}
