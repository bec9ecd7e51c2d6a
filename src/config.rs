use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glmkit::IrlsControl;
use serde::{Deserialize, Serialize};

use crate::filter::SignificanceGate;
use crate::genotype::RowCorrection;
use crate::qc::{check_at_least, check_probability};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    Raw,
    Bonferroni,
    #[serde(alias = "bh", alias = "fdr")]
    BenjaminiHochberg,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub gate: GateKind,
    pub threshold: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            gate: GateKind::Bonferroni,
            threshold: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenotypeConfig {
    pub correction: RowCorrection,
    pub q_threshold: f64,
    pub pip_threshold: f64,
    pub group_size: usize,
}

impl Default for GenotypeConfig {
    fn default() -> Self {
        Self {
            correction: RowCorrection::Bonferroni,
            q_threshold: 0.05,
            pip_threshold: 0.9,
            group_size: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub stage1: GateConfig,
    pub mediation_threshold: f64,
    pub confidence_level: f64,
    pub max_shard_width: usize,
    pub genotype: GenotypeConfig,
    pub threads: Option<usize>,
    pub irls_max_iter: usize,
    pub irls_tol: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("out"),
            stage1: GateConfig::default(),
            mediation_threshold: 0.05,
            confidence_level: 0.95,
            max_shard_width: 1,
            genotype: GenotypeConfig::default(),
            threads: None,
            irls_max_iter: 25,
            irls_tol: 1e-8,
        }
    }
}

impl RunConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config: RunConfig =
            toml::from_str(&text).with_context(|| format!("parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_probability(self.stage1.threshold, "stage1.threshold")?;
        check_probability(self.mediation_threshold, "mediation_threshold")?;
        check_probability(self.confidence_level, "confidence_level")?;
        check_probability(self.genotype.q_threshold, "genotype.q_threshold")?;
        check_at_least(self.max_shard_width, 1, "max_shard_width")?;
        check_at_least(self.genotype.group_size, 1, "genotype.group_size")?;
        check_at_least(self.irls_max_iter, 1, "irls_max_iter")?;
        if !(0.0..1.0).contains(&self.genotype.pip_threshold) {
            anyhow::bail!(
                "genotype.pip_threshold should be in [0, 1), got {}",
                self.genotype.pip_threshold
            );
        }
        if let Some(threads) = self.threads {
            check_at_least(threads, 1, "threads")?;
        }
        Ok(())
    }

    pub fn gate(&self) -> SignificanceGate {
        match self.stage1.gate {
            GateKind::Raw => SignificanceGate::Raw(self.stage1.threshold),
            GateKind::Bonferroni => SignificanceGate::Bonferroni(self.stage1.threshold),
            GateKind::BenjaminiHochberg => {
                SignificanceGate::BenjaminiHochberg(self.stage1.threshold)
            }
        }
    }

    pub fn irls(&self) -> IrlsControl {
        IrlsControl {
            max_iter: self.irls_max_iter,
            tol: self.irls_tol,
        }
    }
}
