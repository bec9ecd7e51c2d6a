use ndarray::{Array1, Array2};
use thiserror::Error;

use crate::stats::{wald_normal, wald_t};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("design matrix is singular or rank deficient")]
    Singular,

    #[error("solver did not converge after {0} iterations")]
    NonConvergence(usize),

    #[error("fitted probabilities numerically 0 or 1")]
    Separation,

    #[error("too few complete observations ({observed}) for {parameters} parameters")]
    TooFewObservations { observed: usize, parameters: usize },

    #[error("response has no variation")]
    DegenerateResponse,

    #[error("dimension mismatch: {0}")]
    Dimension(String),
}

pub type FitResult<T> = std::result::Result<T, FitError>;

/// Wald summary of a single regression coefficient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficient {
    pub estimate: f64,
    pub se: f64,
    pub statistic: f64,
    pub p_value: f64,
    pub ci_low: f64,
    pub ci_high: f64,
}

impl Coefficient {
    pub fn missing() -> Self {
        Self {
            estimate: f64::NAN,
            se: f64::NAN,
            statistic: f64::NAN,
            p_value: f64::NAN,
            ci_low: f64::NAN,
            ci_high: f64::NAN,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.estimate.is_finite() && self.se.is_finite() && self.p_value.is_finite()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IrlsControl {
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for IrlsControl {
    fn default() -> Self {
        Self {
            max_iter: 25,
            tol: 1e-8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OlsFit {
    pub coefficients: Array1<f64>,
    pub vcov: Array2<f64>,
    pub sigma2: f64,
    pub df_resid: usize,
    pub n_obs: usize,
}

impl OlsFit {
    pub fn sigma(&self) -> f64 {
        self.sigma2.sqrt()
    }

    /// t-based inference for coefficient `j`.
    pub fn coefficient(&self, j: usize, level: f64) -> Coefficient {
        if j >= self.coefficients.len() {
            return Coefficient::missing();
        }
        let se = self.vcov[(j, j)].max(0.0).sqrt();
        wald_t(self.coefficients[j], se, self.df_resid as f64, level)
    }
}

#[derive(Debug, Clone)]
pub struct LogisticFit {
    pub coefficients: Array1<f64>,
    /// Model-based covariance, the inverse of the weighted information matrix.
    pub vcov: Array2<f64>,
    pub fitted: Array1<f64>,
    pub deviance: f64,
    pub iterations: usize,
    pub n_obs: usize,
}

impl LogisticFit {
    pub fn coefficient(&self, j: usize, level: f64) -> Coefficient {
        self.coefficient_with(j, &self.vcov, level)
    }

    /// Normal-based inference for coefficient `j` under an alternative
    /// covariance, e.g. a cluster-robust sandwich.
    pub fn coefficient_with(&self, j: usize, vcov: &Array2<f64>, level: f64) -> Coefficient {
        let p = self.coefficients.len();
        if j >= p || vcov.dim() != (p, p) {
            return Coefficient::missing();
        }
        let se = vcov[(j, j)].max(0.0).sqrt();
        wald_normal(self.coefficients[j], se, level)
    }
}
