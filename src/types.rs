use std::fmt;
use std::str::FromStr;

use glmkit::Coefficient;
use serde::{Deserialize, Serialize};

use crate::error::MedScreenError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stratum {
    #[serde(rename = "all")]
    Combined,
    Male,
    Female,
}

impl Stratum {
    pub const ALL: [Stratum; 3] = [Stratum::Combined, Stratum::Male, Stratum::Female];

    pub fn label(&self) -> &'static str {
        match self {
            Stratum::Combined => "all",
            Stratum::Male => "male",
            Stratum::Female => "female",
        }
    }
}

impl fmt::Display for Stratum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Stratum {
    type Err = MedScreenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "combined" | "both" => Ok(Stratum::Combined),
            "male" | "m" => Ok(Stratum::Male),
            "female" | "f" => Ok(Stratum::Female),
            other => Err(MedScreenError::InvalidArgument(format!(
                "unknown stratum '{other}' (expected all, male or female)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorKind {
    Exposure,
    Measurement,
    Genotype,
}

impl FromStr for FactorKind {
    type Err = MedScreenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exposure" | "environment" | "e" => Ok(FactorKind::Exposure),
            "measurement" | "physiological" | "m" => Ok(FactorKind::Measurement),
            "genotype" | "variant" | "snp" | "g" => Ok(FactorKind::Genotype),
            other => Err(MedScreenError::Parse(format!("unknown factor kind '{other}'"))),
        }
    }
}

/// Which strata a factor or outcome is defined in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SexSpecificity {
    Both,
    MaleOnly,
    FemaleOnly,
}

impl SexSpecificity {
    pub fn applies_to(&self, stratum: Stratum) -> bool {
        match self {
            SexSpecificity::Both => true,
            SexSpecificity::MaleOnly => stratum != Stratum::Female,
            SexSpecificity::FemaleOnly => stratum != Stratum::Male,
        }
    }
}

impl FromStr for SexSpecificity {
    type Err = MedScreenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "both" | "all" | "none" | "0" | "no" | "false" => Ok(SexSpecificity::Both),
            "male" | "m" | "male_only" => Ok(SexSpecificity::MaleOnly),
            "female" | "f" | "female_only" => Ok(SexSpecificity::FemaleOnly),
            other => Err(MedScreenError::Parse(format!(
                "unknown sex specificity '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Factor {
    pub id: String,
    pub kind: FactorKind,
    pub category: String,
    pub sex: SexSpecificity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeDef {
    pub id: String,
    pub category: String,
    pub sex: SexSpecificity,
}

/// One row of a Stage-1 screen: a factor's association with `id`
/// (a mediator, or an outcome in total-effect screens).
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationRecord {
    pub id: String,
    pub effect: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    pub statistic: f64,
    pub p_value: f64,
    pub p_bonferroni: f64,
    pub p_bh: f64,
    pub n_obs: usize,
    pub fit_error: Option<String>,
}

impl AssociationRecord {
    pub fn from_coefficient(id: &str, coef: &Coefficient, n_obs: usize) -> Self {
        Self {
            id: id.to_string(),
            effect: coef.estimate,
            ci_low: coef.ci_low,
            ci_high: coef.ci_high,
            statistic: coef.statistic,
            p_value: coef.p_value,
            p_bonferroni: f64::NAN,
            p_bh: f64::NAN,
            n_obs,
            fit_error: None,
        }
    }

    pub fn failed(id: &str, n_obs: usize, reason: String) -> Self {
        Self {
            id: id.to_string(),
            effect: f64::NAN,
            ci_low: f64::NAN,
            ci_high: f64::NAN,
            statistic: f64::NAN,
            p_value: f64::NAN,
            p_bonferroni: f64::NAN,
            p_bh: f64::NAN,
            n_obs,
            fit_error: Some(reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectEstimate {
    pub estimate: f64,
    pub se: f64,
    pub p_value: f64,
    pub p_adjusted: f64,
    pub ci_low: f64,
    pub ci_high: f64,
}

impl EffectEstimate {
    pub fn missing() -> Self {
        Self {
            estimate: f64::NAN,
            se: f64::NAN,
            p_value: f64::NAN,
            p_adjusted: f64::NAN,
            ci_low: f64::NAN,
            ci_high: f64::NAN,
        }
    }
}

impl From<Coefficient> for EffectEstimate {
    fn from(c: Coefficient) -> Self {
        Self {
            estimate: c.estimate,
            se: c.se,
            p_value: c.p_value,
            p_adjusted: f64::NAN,
            ci_low: c.ci_low,
            ci_high: c.ci_high,
        }
    }
}

/// Natural-effects decomposition for one (factor, mediator, outcome, stratum).
/// All effect fields are missing when the fit failed.
#[derive(Debug, Clone, PartialEq)]
pub struct MediationRecord {
    pub mediator: String,
    pub direct: EffectEstimate,
    pub indirect: EffectEstimate,
    pub n_obs: usize,
    pub fit_error: Option<String>,
}

impl MediationRecord {
    pub fn failed(mediator: &str, n_obs: usize, reason: String) -> Self {
        Self {
            mediator: mediator.to_string(),
            direct: EffectEstimate::missing(),
            indirect: EffectEstimate::missing(),
            n_obs,
            fit_error: Some(reason),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.fit_error.is_some()
    }
}

/// How a Stage-2 (factor, outcome, stratum) unit finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Completed,
    NoCandidates,
    NotApplicable,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutcomeStatus::Completed => "completed",
            OutcomeStatus::NoCandidates => "no_candidates",
            OutcomeStatus::NotApplicable => "not_applicable",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenKind {
    Factor,
    Genotype,
}

impl ScreenKind {
    pub fn label(&self) -> &'static str {
        match self {
            ScreenKind::Factor => "factor",
            ScreenKind::Genotype => "genotype",
        }
    }
}

impl fmt::Display for ScreenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ScreenKind {
    type Err = MedScreenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "factor" | "e-p-d" | "epd" => Ok(ScreenKind::Factor),
            "genotype" | "g-p-d" | "gpd" => Ok(ScreenKind::Genotype),
            other => Err(MedScreenError::InvalidArgument(format!(
                "unknown screen '{other}' (expected factor or genotype)"
            ))),
        }
    }
}

/// One (variant, mediator) row supplied by the fine-mapping collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantCandidate {
    pub variant: String,
    pub mediator: String,
    pub p_value: f64,
    pub pip: f64,
}
