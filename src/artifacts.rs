use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::io::{
    f64_column, frame_from_series, read_json, read_table, string_column, write_json_atomic,
    write_table_atomic,
};
use crate::types::{
    AssociationRecord, EffectEstimate, MediationRecord, OutcomeStatus, ScreenKind, Stratum,
};

pub const STAGE1_VALUE_COLUMNS: [&str; 7] = [
    "effect",
    "ci_low",
    "ci_high",
    "statistic",
    "p",
    "p_bonferroni",
    "p_bh",
];

pub const MEDIATOR_COLUMN: &str = "mediator";

pub const STAGE2_VALUE_COLUMNS: [&str; 12] = [
    "direct_effect",
    "direct_se",
    "direct_p",
    "direct_adj_p",
    "direct_ci_low",
    "direct_ci_high",
    "indirect_effect",
    "indirect_se",
    "indirect_p",
    "indirect_adj_p",
    "indirect_ci_low",
    "indirect_ci_high",
];

/// Written last, next to the two Stage-2 tables of one (factor, outcome).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionMarker {
    pub status: OutcomeStatus,
    /// Rows of the all-candidates table.
    pub candidates: usize,
    /// Candidates with a successful fit.
    pub rows: usize,
    pub significant: usize,
}

/// Where every artifact of a run lives under the output directory.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stage1(&self, stratum: Stratum, factor: &str) -> PathBuf {
        self.root
            .join("stage1")
            .join(stratum.label())
            .join(format!("{factor}.tsv"))
    }

    fn stage2_dir(&self, screen: ScreenKind, stratum: Stratum, factor: &str) -> PathBuf {
        self.root
            .join("stage2")
            .join(screen.label())
            .join(stratum.label())
            .join(factor)
    }

    pub fn stage2_all(
        &self,
        screen: ScreenKind,
        stratum: Stratum,
        factor: &str,
        outcome: &str,
    ) -> PathBuf {
        self.stage2_dir(screen, stratum, factor)
            .join(format!("{outcome}.all.tsv"))
    }

    pub fn stage2_significant(
        &self,
        screen: ScreenKind,
        stratum: Stratum,
        factor: &str,
        outcome: &str,
    ) -> PathBuf {
        self.stage2_dir(screen, stratum, factor)
            .join(format!("{outcome}.tsv"))
    }

    pub fn marker(
        &self,
        screen: ScreenKind,
        stratum: Stratum,
        factor: &str,
        outcome: &str,
    ) -> PathBuf {
        self.stage2_dir(screen, stratum, factor)
            .join(format!("{outcome}.done"))
    }

    pub fn total_effect(&self, stratum: Stratum, factor: &str) -> PathBuf {
        self.root
            .join("total_effect")
            .join(stratum.label())
            .join(format!("{factor}.tsv"))
    }

    pub fn aggregate(&self, screen: ScreenKind, stratum: Stratum) -> PathBuf {
        self.root
            .join("aggregate")
            .join(format!("{screen}_{stratum}.tsv"))
    }

    pub fn worklist(&self, screen: ScreenKind, stratum: Stratum) -> PathBuf {
        self.root
            .join("reconcile")
            .join(format!("{screen}_{stratum}.tsv"))
    }

    pub fn manifest(&self, screen: ScreenKind, stratum: Stratum) -> PathBuf {
        self.root
            .join("reconcile")
            .join(format!("{screen}_{stratum}.manifest.tsv"))
    }

    pub fn log(&self, screen: ScreenKind, stratum: Stratum, label: &str) -> PathBuf {
        self.root
            .join("logs")
            .join(format!("{screen}_{stratum}_{label}.log"))
    }
}

fn cell(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

fn round5(value: f64) -> Option<f64> {
    cell((value * 1e5).round() / 1e5)
}

pub fn association_frame(records: &[AssociationRecord], id_column: &str) -> DataFrame {
    let values: [Vec<Option<f64>>; 7] = [
        records.iter().map(|r| cell(r.effect)).collect(),
        records.iter().map(|r| cell(r.ci_low)).collect(),
        records.iter().map(|r| cell(r.ci_high)).collect(),
        records.iter().map(|r| cell(r.statistic)).collect(),
        records.iter().map(|r| cell(r.p_value)).collect(),
        records.iter().map(|r| cell(r.p_bonferroni)).collect(),
        records.iter().map(|r| cell(r.p_bh)).collect(),
    ];
    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    let mut series = vec![Series::new(id_column.into(), ids)];
    for (name, column) in STAGE1_VALUE_COLUMNS.iter().zip(values) {
        series.push(Series::new((*name).into(), column));
    }
    frame_from_series(series)
}

fn effect_cells(effect: &EffectEstimate) -> [Option<f64>; 6] {
    [
        round5(effect.estimate),
        round5(effect.se),
        cell(effect.p_value),
        cell(effect.p_adjusted),
        round5(effect.ci_low),
        round5(effect.ci_high),
    ]
}

pub fn mediation_frame(records: &[MediationRecord]) -> DataFrame {
    let mut columns: Vec<Vec<Option<f64>>> = vec![Vec::with_capacity(records.len()); 12];
    for record in records {
        let cells = effect_cells(&record.direct)
            .into_iter()
            .chain(effect_cells(&record.indirect));
        for (column, value) in columns.iter_mut().zip(cells) {
            column.push(value);
        }
    }
    let ids: Vec<&str> = records.iter().map(|r| r.mediator.as_str()).collect();
    let mut series = vec![Series::new(MEDIATOR_COLUMN.into(), ids)];
    for (name, column) in STAGE2_VALUE_COLUMNS.iter().zip(columns) {
        series.push(Series::new((*name).into(), column));
    }
    frame_from_series(series)
}

pub fn write_association_table(
    path: &Path,
    records: &[AssociationRecord],
    id_column: &str,
) -> Result<()> {
    let mut df = association_frame(records, id_column);
    write_table_atomic(&mut df, path)
}

/// Reads a Stage-1 style table back into records (fit errors are not kept).
pub fn read_association_table(path: &Path, id_column: &str) -> Result<Vec<AssociationRecord>> {
    let df = read_table(path)?;
    let ids = string_column(&df, id_column)?;
    let mut values = Vec::with_capacity(STAGE1_VALUE_COLUMNS.len());
    for name in STAGE1_VALUE_COLUMNS {
        values.push(f64_column(&df, name).with_context(|| format!("read {}", path.display()))?);
    }
    Ok(ids
        .into_iter()
        .enumerate()
        .map(|(i, id)| AssociationRecord {
            id,
            effect: values[0][i],
            ci_low: values[1][i],
            ci_high: values[2][i],
            statistic: values[3][i],
            p_value: values[4][i],
            p_bonferroni: values[5][i],
            p_bh: values[6][i],
            n_obs: 0,
            fit_error: None,
        })
        .collect())
}

/// Both Stage-2 tables, then the marker. The marker makes the pair visible
/// to the reconciler and the aggregator.
pub fn write_outcome_artifacts(
    all_path: &Path,
    significant_path: &Path,
    marker_path: &Path,
    status: OutcomeStatus,
    records: &[MediationRecord],
    significant: &[MediationRecord],
) -> Result<CompletionMarker> {
    // A marker from an earlier execution must not vouch for tables being replaced.
    if marker_path.exists() {
        fs::remove_file(marker_path)
            .with_context(|| format!("remove stale marker {}", marker_path.display()))?;
    }
    let mut all = mediation_frame(records);
    write_table_atomic(&mut all, all_path)?;
    let mut sig = mediation_frame(significant);
    write_table_atomic(&mut sig, significant_path)?;
    let marker = CompletionMarker {
        status,
        candidates: records.len(),
        rows: records.iter().filter(|r| !r.is_failed()).count(),
        significant: significant.len(),
    };
    write_json_atomic(&marker, marker_path)?;
    Ok(marker)
}

pub fn read_marker(path: &Path) -> Option<CompletionMarker> {
    if !path.is_file() {
        return None;
    }
    read_json(path).ok()
}

/// Data rows of a written table, without parsing it.
pub fn table_rows(path: &Path) -> Result<usize> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut lines = 0usize;
    for line in BufReader::new(file).lines() {
        if !line?.trim().is_empty() {
            lines += 1;
        }
    }
    Ok(lines.saturating_sub(1))
}
