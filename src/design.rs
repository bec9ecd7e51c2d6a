use ndarray::{Array1, Array2};

/// Complete-case design for one fit: intercept, the factor, then covariates.
#[derive(Debug, Clone)]
pub struct Design {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    /// Source row of each design row.
    pub rows: Vec<usize>,
    /// Covariates kept after dropping the ones constant on the complete cases.
    pub covariates_used: usize,
}

impl Design {
    pub const INTERCEPT: usize = 0;
    pub const FACTOR: usize = 1;

    pub fn n_obs(&self) -> usize {
        self.rows.len()
    }
}

fn is_constant(values: impl Iterator<Item = f64>) -> bool {
    let mut first = None;
    for v in values {
        match first {
            None => first = Some(v),
            Some(f) if f != v => return false,
            Some(_) => {}
        }
    }
    true
}

/// Listwise deletion local to this fit: a row is kept only when the response,
/// the factor and every covariate are present. Covariates that do not vary on
/// the kept rows (e.g. sex within a single-sex stratum) are left out.
pub fn complete_design(response: &[f64], factor: &[f64], covariates: &[Vec<f64>]) -> Design {
    let n = response.len();
    let rows: Vec<usize> = (0..n)
        .filter(|&i| {
            response[i].is_finite()
                && factor.get(i).is_some_and(|v| v.is_finite())
                && covariates
                    .iter()
                    .all(|c| c.get(i).is_some_and(|v| v.is_finite()))
        })
        .collect();

    let kept: Vec<&Vec<f64>> = covariates
        .iter()
        .filter(|c| !is_constant(rows.iter().map(|&i| c[i])))
        .collect();

    let p = 2 + kept.len();
    let mut x = Array2::<f64>::zeros((rows.len(), p));
    let mut y = Array1::<f64>::zeros(rows.len());
    for (r, &i) in rows.iter().enumerate() {
        x[(r, Design::INTERCEPT)] = 1.0;
        x[(r, Design::FACTOR)] = factor[i];
        for (j, c) in kept.iter().enumerate() {
            x[(r, 2 + j)] = c[i];
        }
        y[r] = response[i];
    }

    Design {
        x,
        y,
        rows,
        covariates_used: kept.len(),
    }
}
