use statrs::distribution::{ContinuousCDF, Normal, StudentsT};
use statrs::function::erf::erfc;

use crate::types::Coefficient;

/// Two-sided p-value of a standard normal statistic, accurate far into the tail.
pub fn two_sided_normal_p(z: f64) -> f64 {
    if !z.is_finite() {
        return f64::NAN;
    }
    erfc(z.abs() / std::f64::consts::SQRT_2).min(1.0)
}

pub fn two_sided_t_p(t: f64, df: f64) -> f64 {
    if !t.is_finite() || df.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => (2.0 * dist.sf(t.abs())).min(1.0),
        Err(_) => f64::NAN,
    }
}

pub fn normal_quantile(prob: f64) -> f64 {
    match Normal::new(0.0, 1.0) {
        Ok(dist) => dist.inverse_cdf(prob),
        Err(_) => f64::NAN,
    }
}

pub fn t_quantile(prob: f64, df: f64) -> f64 {
    if df.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => dist.inverse_cdf(prob),
        Err(_) => f64::NAN,
    }
}

pub fn wald_normal(estimate: f64, se: f64, level: f64) -> Coefficient {
    if !estimate.is_finite() || !se.is_finite() || se <= 0.0 {
        return Coefficient {
            estimate,
            ..Coefficient::missing()
        };
    }
    let z = estimate / se;
    let q = normal_quantile(0.5 + level / 2.0);
    Coefficient {
        estimate,
        se,
        statistic: z,
        p_value: two_sided_normal_p(z),
        ci_low: estimate - q * se,
        ci_high: estimate + q * se,
    }
}

pub fn wald_t(estimate: f64, se: f64, df: f64, level: f64) -> Coefficient {
    if !estimate.is_finite() || !se.is_finite() || se <= 0.0 {
        return Coefficient {
            estimate,
            ..Coefficient::missing()
        };
    }
    let t = estimate / se;
    let q = t_quantile(0.5 + level / 2.0, df);
    Coefficient {
        estimate,
        se,
        statistic: t,
        p_value: two_sided_t_p(t, df),
        ci_low: estimate - q * se,
        ci_high: estimate + q * se,
    }
}
