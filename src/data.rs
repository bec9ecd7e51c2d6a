use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use polars::prelude::DataFrame;
use tracing::{debug, info};

use crate::error::MedScreenError;
use crate::io::{column_names, f64_column, read_table, string_column};
use crate::qc::check_file_exists;
use crate::schema::{self, resolve_column_map};
use crate::types::{Factor, OutcomeDef, SexSpecificity, Stratum, VariantCandidate};

pub const FACTOR_CATALOG: &str = "factor_catalog.tsv";
pub const OUTCOME_CATALOG: &str = "outcome_catalog.tsv";
pub const VARIANT_CANDIDATES: &str = "variant_candidates.tsv";
pub const COVARIATES: &str = "covariates.tsv";
pub const MEDIATORS: &str = "mediators.tsv";
pub const FACTORS: &str = "factors.tsv";
pub const OUTCOMES: &str = "outcomes.tsv";

/// Sample-aligned numeric columns with a name -> position lookup built once.
#[derive(Debug, Clone, Default)]
pub struct NumericTable {
    names: Vec<String>,
    index: HashMap<String, usize>,
    columns: Vec<Vec<f64>>,
}

impl NumericTable {
    pub fn new(names: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self> {
        if names.len() != columns.len() {
            anyhow::bail!("{} names for {} columns", names.len(), columns.len());
        }
        if let Some(first) = columns.first()
            && let Some(bad) = columns.iter().position(|c| c.len() != first.len())
        {
            anyhow::bail!(
                "column {} has {} rows, expected {}",
                names[bad],
                columns[bad].len(),
                first.len()
            );
        }
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(MedScreenError::Parse(format!("duplicate column {name}")).into());
            }
        }
        Ok(Self {
            names,
            index,
            columns,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.index.get(name).map(|&i| self.columns[i].as_slice())
    }

    pub fn require(&self, name: &str) -> Result<&[f64]> {
        self.column(name)
            .ok_or_else(|| MedScreenError::UnknownId(name.to_string()).into())
    }

    pub fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }
}

/// Everything one stratum contributes to a shard, read-only for its lifetime.
#[derive(Debug, Clone)]
pub struct StratumData {
    pub stratum: Stratum,
    pub sample_ids: Vec<String>,
    pub covariates: NumericTable,
    pub mediators: NumericTable,
    pub factors: NumericTable,
    pub outcomes: NumericTable,
}

impl StratumData {
    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn validate(&self) -> Result<()> {
        let n = self.n_samples();
        for (label, table) in [
            ("covariates", &self.covariates),
            ("mediators", &self.mediators),
            ("factors", &self.factors),
            ("outcomes", &self.outcomes),
        ] {
            if let Some(col) = table.columns().first()
                && col.len() != n
            {
                anyhow::bail!(
                    "{label} table for stratum {} has {} rows, expected {n}",
                    self.stratum,
                    col.len()
                );
            }
        }
        for (name, col) in self.outcomes.names().iter().zip(self.outcomes.columns()) {
            if let Some(v) = col.iter().find(|v| !v.is_nan() && **v != 0.0 && **v != 1.0) {
                return Err(MedScreenError::Parse(format!(
                    "outcome {name} in stratum {} has non-binary value {v}",
                    self.stratum
                ))
                .into());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub factors: Vec<Factor>,
    pub outcomes: Vec<OutcomeDef>,
    factor_index: HashMap<String, usize>,
    outcome_index: HashMap<String, usize>,
}

impl Catalog {
    pub fn new(factors: Vec<Factor>, outcomes: Vec<OutcomeDef>) -> Result<Self> {
        let mut factor_index = HashMap::new();
        for (i, f) in factors.iter().enumerate() {
            if factor_index.insert(f.id.clone(), i).is_some() {
                return Err(MedScreenError::Parse(format!("duplicate factor id {}", f.id)).into());
            }
        }
        let mut outcome_index = HashMap::new();
        for (i, o) in outcomes.iter().enumerate() {
            if outcome_index.insert(o.id.clone(), i).is_some() {
                return Err(
                    MedScreenError::Parse(format!("duplicate outcome id {}", o.id)).into(),
                );
            }
        }
        Ok(Self {
            factors,
            outcomes,
            factor_index,
            outcome_index,
        })
    }

    pub fn factor_position(&self, id: &str) -> Option<usize> {
        self.factor_index.get(id).copied()
    }

    pub fn outcome_position(&self, id: &str) -> Option<usize> {
        self.outcome_index.get(id).copied()
    }

    pub fn factor(&self, id: &str) -> Result<&Factor> {
        self.factor_position(id)
            .map(|i| &self.factors[i])
            .ok_or_else(|| MedScreenError::UnknownId(format!("factor {id}")).into())
    }

    pub fn outcome(&self, id: &str) -> Result<&OutcomeDef> {
        self.outcome_position(id)
            .map(|i| &self.outcomes[i])
            .ok_or_else(|| MedScreenError::UnknownId(format!("outcome {id}")).into())
    }
}

/// Loads catalogs and stratum tables by logical key.
pub trait CohortSource: Sync {
    fn catalog(&self) -> Result<Catalog>;
    fn stratum(&self, stratum: Stratum) -> Result<StratumData>;
    fn variant_candidates(&self) -> Result<Vec<VariantCandidate>>;
}

/// In-memory source, used when data is already loaded (or simulated).
#[derive(Debug, Clone)]
pub struct MemorySource {
    pub catalog: Catalog,
    pub strata: HashMap<Stratum, StratumData>,
    pub variants: Vec<VariantCandidate>,
}

impl CohortSource for MemorySource {
    fn catalog(&self) -> Result<Catalog> {
        Ok(self.catalog.clone())
    }

    fn stratum(&self, stratum: Stratum) -> Result<StratumData> {
        self.strata
            .get(&stratum)
            .cloned()
            .ok_or_else(|| MedScreenError::MissingArtifact(format!("stratum {stratum}")).into())
    }

    fn variant_candidates(&self) -> Result<Vec<VariantCandidate>> {
        Ok(self.variants.clone())
    }
}

/// Delimited-text tables under a data directory.
#[derive(Debug, Clone)]
pub struct TableSource {
    root: PathBuf,
}

impl TableSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn input(&self, relative: &Path) -> Result<PathBuf> {
        let path = self.root.join(relative);
        check_file_exists(&path, &relative.display().to_string())?;
        Ok(path)
    }
}

fn read_input(path: &Path) -> Result<(DataFrame, String)> {
    let df = read_table(path)?;
    Ok((df, path.display().to_string()))
}

type CatalogRow = (String, String, String, String);

fn read_catalog_rows(path: &Path, with_kind: bool) -> Result<Vec<CatalogRow>> {
    let (df, filename) = read_input(path)?;
    let headers = column_names(&df);
    let required: &[&str] = if with_kind {
        &[schema::ID, schema::KIND]
    } else {
        &[schema::ID]
    };
    let map = resolve_column_map(&headers, required, &[schema::CATEGORY, schema::SEX], &filename)?;
    for line in &map.info {
        debug!("{line}");
    }
    let ids = string_column(&df, map.require(schema::ID)?)?;
    let optional = |role: &str| -> Result<Vec<String>> {
        match map.get(role) {
            Some(col) => string_column(&df, col),
            None => Ok(vec![String::new(); df.height()]),
        }
    };
    let kinds = optional(schema::KIND)?;
    let categories = optional(schema::CATEGORY)?;
    let sexes = optional(schema::SEX)?;
    Ok(ids
        .into_iter()
        .zip(kinds)
        .zip(categories)
        .zip(sexes)
        .filter(|(((id, _), _), _)| !id.is_empty())
        .map(|(((id, kind), category), sex)| (id, kind, category, sex))
        .collect())
}

/// Reads `sample_id` + numeric columns and re-orders rows to `order`.
/// Samples absent from the table get NaN.
fn read_aligned(path: &Path, order: Option<&[String]>) -> Result<(Vec<String>, NumericTable)> {
    let (df, filename) = read_input(path)?;
    let headers = column_names(&df);
    let map = resolve_column_map(&headers, &[schema::SAMPLE_ID], &[], &filename)?;
    let id_col = map.require(schema::SAMPLE_ID)?.to_string();
    let ids = string_column(&df, &id_col)?;

    let names: Vec<String> = headers.into_iter().filter(|h| *h != id_col).collect();
    let mut columns = Vec::with_capacity(names.len());
    for name in &names {
        columns.push(f64_column(&df, name)?);
    }

    let Some(order) = order else {
        return Ok((ids, NumericTable::new(names, columns)?));
    };

    let position: HashMap<&str, usize> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();
    let matched = order
        .iter()
        .filter(|id| position.contains_key(id.as_str()))
        .count();
    debug!("{filename}: {matched} of {} samples matched", order.len());
    let aligned = columns
        .iter()
        .map(|col| {
            order
                .iter()
                .map(|id| position.get(id.as_str()).map_or(f64::NAN, |&i| col[i]))
                .collect()
        })
        .collect();
    Ok((order.to_vec(), NumericTable::new(names, aligned)?))
}

impl CohortSource for TableSource {
    fn catalog(&self) -> Result<Catalog> {
        let factor_path = self.input(Path::new(FACTOR_CATALOG))?;
        let mut factors = Vec::new();
        for (id, kind, category, sex) in read_catalog_rows(&factor_path, true)? {
            factors.push(Factor {
                kind: kind.parse().with_context(|| format!("factor {id}"))?,
                sex: sex.parse().with_context(|| format!("factor {id}"))?,
                id,
                category,
            });
        }
        let outcome_path = self.input(Path::new(OUTCOME_CATALOG))?;
        let mut outcomes = Vec::new();
        for (id, _, category, sex) in read_catalog_rows(&outcome_path, false)? {
            let sex: SexSpecificity = sex.parse().with_context(|| format!("outcome {id}"))?;
            outcomes.push(OutcomeDef { id, category, sex });
        }
        info!(
            "Loaded catalog: {} factors, {} outcomes",
            factors.len(),
            outcomes.len()
        );
        Catalog::new(factors, outcomes)
    }

    fn stratum(&self, stratum: Stratum) -> Result<StratumData> {
        let dir = PathBuf::from(stratum.label());
        let (sample_ids, covariates) = read_aligned(&self.input(&dir.join(COVARIATES))?, None)?;
        let (_, mediators) = read_aligned(&self.input(&dir.join(MEDIATORS))?, Some(&sample_ids))?;
        let (_, factors) = read_aligned(&self.input(&dir.join(FACTORS))?, Some(&sample_ids))?;
        let (_, outcomes) = read_aligned(&self.input(&dir.join(OUTCOMES))?, Some(&sample_ids))?;
        let data = StratumData {
            stratum,
            sample_ids,
            covariates,
            mediators,
            factors,
            outcomes,
        };
        data.validate()?;
        info!(
            "Stratum {stratum}: {} samples, {} covariates, {} mediators, {} factors, {} outcomes",
            data.n_samples(),
            data.covariates.n_columns(),
            data.mediators.n_columns(),
            data.factors.n_columns(),
            data.outcomes.n_columns()
        );
        Ok(data)
    }

    fn variant_candidates(&self) -> Result<Vec<VariantCandidate>> {
        let path = self.input(Path::new(VARIANT_CANDIDATES))?;
        let (df, filename) = read_input(&path)?;
        let headers = column_names(&df);
        let map = resolve_column_map(
            &headers,
            &[schema::VARIANT, schema::MEDIATOR, schema::P, schema::PIP],
            &[],
            &filename,
        )?;
        let variants = string_column(&df, map.require(schema::VARIANT)?)?;
        let mediators = string_column(&df, map.require(schema::MEDIATOR)?)?;
        let p = f64_column(&df, map.require(schema::P)?)?;
        let pip = f64_column(&df, map.require(schema::PIP)?)?;
        Ok(variants
            .into_iter()
            .zip(mediators)
            .zip(p)
            .zip(pip)
            .map(|(((variant, mediator), p_value), pip)| VariantCandidate {
                variant,
                mediator,
                p_value,
                pip,
            })
            .collect())
    }
}
