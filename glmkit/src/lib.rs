//! Regression engine for the mediation screen: least squares, logistic IRLS,
//! Wald inference, and cluster-robust covariance.

pub mod linalg;
pub mod logistic;
pub mod ols;
pub mod se;
pub mod stats;
pub mod types;

pub use logistic::fit_logistic;
pub use ols::fit_ols;
pub use se::cluster_robust_vcov;
pub use types::*;
