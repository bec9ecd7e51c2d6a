use std::collections::BTreeSet;

use anyhow::Result;
use polars::prelude::*;
use tracing::{debug, info};

use crate::artifacts::{
    CompletionMarker, MEDIATOR_COLUMN, OutputLayout, STAGE2_VALUE_COLUMNS, mediation_frame,
    read_marker, table_rows,
};
use crate::df_utils::{ensure_f64, ensure_utf8, prepend_keys};
use crate::filter::SignificanceGate;
use crate::io::{frame_from_series, read_table, write_table_atomic};
use crate::pipeline::{ScreenPlan, stored_candidates};
use crate::types::OutcomeStatus;

pub type WorkKey = (String, String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationReport {
    pub expected: usize,
    pub produced: usize,
    /// Sorted (factor, outcome) keys still outstanding.
    pub outstanding: Vec<WorkKey>,
}

/// A key counts as produced only once its marker parses, both tables exist,
/// and the all-candidates table has as many rows as the marker promises.
/// When the upstream candidate count is known, an applicable artifact with
/// fewer rows than that count is stale. Anything short of that (including a
/// shard still writing) is outstanding.
pub fn produced_marker(
    plan: &ScreenPlan,
    layout: &OutputLayout,
    factor: &str,
    outcome: &str,
    upstream: Option<usize>,
) -> Option<CompletionMarker> {
    let (screen, stratum) = (plan.screen, plan.stratum);
    let marker = read_marker(&layout.marker(screen, stratum, factor, outcome))?;
    let all = layout.stage2_all(screen, stratum, factor, outcome);
    let significant = layout.stage2_significant(screen, stratum, factor, outcome);
    if !significant.is_file() {
        return None;
    }
    let rows = table_rows(&all).ok()?;
    if rows != marker.candidates {
        debug!(
            "{}: {rows} rows but marker expects {}",
            all.display(),
            marker.candidates
        );
        return None;
    }
    if let Some(upstream) = upstream
        && marker.status != OutcomeStatus::NotApplicable
        && rows < upstream
    {
        debug!(
            "{}: {rows} rows but Stage 1 has {upstream} candidates",
            all.display()
        );
        return None;
    }
    Some(marker)
}

/// A key that must have a Stage-2 artifact, with the Stage-1 candidate count
/// it has to cover when that count is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedKey {
    pub key: WorkKey,
    pub upstream: Option<usize>,
}

/// Keys that must have a Stage-2 artifact: every outcome of every factor
/// with at least one Stage-1 candidate, plus every factor whose Stage-1
/// artifact is missing (its candidate count is unknown).
pub fn expected_keys(
    plan: &ScreenPlan,
    layout: &OutputLayout,
    gate: SignificanceGate,
) -> Result<Vec<ExpectedKey>> {
    let mut keys = Vec::new();
    for unit in plan.units() {
        let upstream = match &unit.fixed_candidates {
            Some(fixed) => Some(fixed.len()),
            None => stored_candidates(layout, plan.stratum, &unit.factor_id, gate)?
                .map(|candidates| candidates.len()),
        };
        if upstream == Some(0) {
            continue;
        }
        for outcome in &plan.outcomes {
            keys.push(ExpectedKey {
                key: (unit.factor_id.clone(), outcome.id.clone()),
                upstream,
            });
        }
    }
    Ok(keys)
}

/// Expected minus produced, written as a two-column worklist. Reads only;
/// running it again without new executions rewrites the same list.
pub fn reconcile(
    plan: &ScreenPlan,
    layout: &OutputLayout,
    gate: SignificanceGate,
) -> Result<ReconciliationReport> {
    let expected = expected_keys(plan, layout, gate)?;
    let outstanding: BTreeSet<WorkKey> = expected
        .iter()
        .filter(|e| produced_marker(plan, layout, &e.key.0, &e.key.1, e.upstream).is_none())
        .map(|e| e.key.clone())
        .collect();
    let report = ReconciliationReport {
        expected: expected.len(),
        produced: expected.len() - outstanding.len(),
        outstanding: outstanding.into_iter().collect(),
    };

    let mut df = frame_from_series(vec![
        Series::new(
            "factor".into(),
            report
                .outstanding
                .iter()
                .map(|(f, _)| f.as_str())
                .collect::<Vec<_>>(),
        ),
        Series::new(
            "outcome".into(),
            report
                .outstanding
                .iter()
                .map(|(_, o)| o.as_str())
                .collect::<Vec<_>>(),
        ),
    ]);
    write_table_atomic(&mut df, &layout.worklist(plan.screen, plan.stratum))?;
    info!(
        "Reconcile {} {}: {} expected, {} produced, {} outstanding",
        plan.screen,
        plan.stratum,
        report.expected,
        report.produced,
        report.outstanding.len()
    );
    Ok(report)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRow {
    pub factor: String,
    pub outcome: String,
    pub marker: CompletionMarker,
}

/// Every produced Stage-2 artifact of the plan, in grid order.
pub fn manifest(plan: &ScreenPlan, layout: &OutputLayout) -> Vec<ManifestRow> {
    let mut rows = Vec::new();
    for unit in plan.units() {
        for outcome in &plan.outcomes {
            let marker = produced_marker(plan, layout, &unit.factor_id, &outcome.id, None);
            if let Some(marker) = marker {
                rows.push(ManifestRow {
                    factor: unit.factor_id.clone(),
                    outcome: outcome.id.clone(),
                    marker,
                });
            }
        }
    }
    rows
}

pub fn write_manifest(
    plan: &ScreenPlan,
    rows: &[ManifestRow],
    path: &std::path::Path,
) -> Result<()> {
    let stratum = plan.stratum.label();
    let mut df = frame_from_series(vec![
        Series::new(
            "factor".into(),
            rows.iter().map(|r| r.factor.as_str()).collect::<Vec<_>>(),
        ),
        Series::new(
            "outcome".into(),
            rows.iter().map(|r| r.outcome.as_str()).collect::<Vec<_>>(),
        ),
        Series::new("stratum".into(), vec![stratum; rows.len()]),
        Series::new(
            "status".into(),
            rows.iter()
                .map(|r| r.marker.status.to_string())
                .collect::<Vec<_>>(),
        ),
        Series::new(
            "candidates".into(),
            rows.iter()
                .map(|r| r.marker.candidates as u64)
                .collect::<Vec<_>>(),
        ),
        Series::new(
            "rows".into(),
            rows.iter().map(|r| r.marker.rows as u64).collect::<Vec<_>>(),
        ),
        Series::new(
            "significant".into(),
            rows.iter()
                .map(|r| r.marker.significant as u64)
                .collect::<Vec<_>>(),
        ),
    ]);
    write_table_atomic(&mut df, path)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateSummary {
    pub artifacts: usize,
    pub rows: usize,
}

/// Merge every produced significant-mediator table into one keyed table.
/// Re-running after late shards finish picks up their results.
pub fn aggregate(plan: &ScreenPlan, layout: &OutputLayout) -> Result<AggregateSummary> {
    let stratum = plan.stratum.label();
    let keys = ["factor", "outcome", "stratum"];
    let mut merged: Option<DataFrame> = None;
    let mut artifacts = 0;

    for row in manifest(plan, layout) {
        artifacts += 1;
        if row.marker.significant == 0 {
            continue;
        }
        let path = layout.stage2_significant(plan.screen, plan.stratum, &row.factor, &row.outcome);
        let df = read_table(&path)?;
        let df = ensure_utf8(df, &[MEDIATOR_COLUMN])?;
        let df = ensure_f64(df, &STAGE2_VALUE_COLUMNS)?;
        let keyed = prepend_keys(
            &df,
            &[
                (keys[0], row.factor.as_str()),
                (keys[1], row.outcome.as_str()),
                (keys[2], stratum),
            ],
        )?;
        match merged.as_mut() {
            Some(acc) => {
                acc.vstack_mut(&keyed)?;
            }
            None => merged = Some(keyed),
        }
    }

    let mut merged = match merged {
        Some(df) => df,
        None => prepend_keys(&mediation_frame(&[]), &keys.map(|k| (k, "")))?,
    };
    let rows = merged.height();
    write_table_atomic(&mut merged, &layout.aggregate(plan.screen, plan.stratum))?;
    info!(
        "Aggregate {} {}: {rows} significant rows from {artifacts} artifacts",
        plan.screen, plan.stratum
    );
    Ok(AggregateSummary { artifacts, rows })
}
