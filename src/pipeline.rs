use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::artifacts::{
    CompletionMarker, MEDIATOR_COLUMN, OutputLayout, read_association_table, table_rows,
    write_association_table, write_outcome_artifacts,
};
use crate::association::{FitSettings, stage1_screen, total_effect_screen};
use crate::config::RunConfig;
use crate::data::{Catalog, StratumData};
use crate::error::MedScreenError;
use crate::filter::{SignificanceGate, filter_candidates};
use crate::genotype::{group_variants, variant_hits};
use crate::io::{read_table, string_column};
use crate::logging::{log_line, open_log, warn_line};
use crate::mediation::run_outcome;
use crate::shard::{Sharder, WorkItem};
use crate::types::{
    AssociationRecord, FactorKind, OutcomeDef, OutcomeStatus, ScreenKind, Stratum, VariantCandidate,
};

/// One factor (or variant) of a grid row.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorUnit {
    pub factor_id: String,
    /// Genotype screens fix the candidate set up front; factor screens take
    /// it from the Stage-1 artifact.
    pub fixed_candidates: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridRow {
    pub label: String,
    pub units: Vec<FactorUnit>,
}

/// The work grid of one (screen, stratum), rebuilt from inputs alone.
#[derive(Debug, Clone)]
pub struct ScreenPlan {
    pub screen: ScreenKind,
    pub stratum: Stratum,
    pub rows: Vec<GridRow>,
    pub outcomes: Vec<OutcomeDef>,
    pub sharder: Sharder,
    unit_index: HashMap<String, (usize, usize)>,
    outcome_index: HashMap<String, usize>,
}

impl ScreenPlan {
    pub fn build(
        screen: ScreenKind,
        stratum: Stratum,
        catalog: &Catalog,
        variants: &[VariantCandidate],
        config: &RunConfig,
    ) -> Result<Self> {
        let rows = match screen {
            ScreenKind::Factor => catalog
                .factors
                .iter()
                .filter(|f| f.kind != FactorKind::Genotype && f.sex.applies_to(stratum))
                .map(|f| GridRow {
                    label: f.id.clone(),
                    units: vec![FactorUnit {
                        factor_id: f.id.clone(),
                        fixed_candidates: None,
                    }],
                })
                .collect(),
            ScreenKind::Genotype => {
                let hits = variant_hits(
                    variants,
                    config.genotype.correction,
                    config.genotype.q_threshold,
                    config.genotype.pip_threshold,
                );
                group_variants(&hits, config.genotype.group_size)
                    .into_iter()
                    .enumerate()
                    .map(|(g, group)| GridRow {
                        label: format!("group_{}", g + 1),
                        units: group
                            .into_iter()
                            .map(|variant| FactorUnit {
                                fixed_candidates: hits.get(&variant).cloned(),
                                factor_id: variant,
                            })
                            .collect(),
                    })
                    .collect()
            }
        };
        Self::from_rows(screen, stratum, rows, catalog.outcomes.clone(), config.max_shard_width)
    }

    pub fn from_rows(
        screen: ScreenKind,
        stratum: Stratum,
        rows: Vec<GridRow>,
        outcomes: Vec<OutcomeDef>,
        width: usize,
    ) -> Result<Self> {
        let sharder = Sharder::new(rows.len(), outcomes.len(), width)?;
        let mut unit_index = HashMap::new();
        for (r, row) in rows.iter().enumerate() {
            for (u, unit) in row.units.iter().enumerate() {
                unit_index.insert(unit.factor_id.clone(), (r, u));
            }
        }
        let outcome_index = outcomes
            .iter()
            .enumerate()
            .map(|(i, o)| (o.id.clone(), i))
            .collect();
        Ok(Self {
            screen,
            stratum,
            rows,
            outcomes,
            sharder,
            unit_index,
            outcome_index,
        })
    }

    pub fn units(&self) -> impl Iterator<Item = &FactorUnit> {
        self.rows.iter().flat_map(|r| r.units.iter())
    }

    pub fn unit(&self, factor_id: &str) -> Result<&FactorUnit> {
        self.unit_index
            .get(factor_id)
            .map(|&(r, u)| &self.rows[r].units[u])
            .ok_or_else(|| {
                MedScreenError::UnknownId(format!("factor {factor_id} in {} screen", self.screen))
                    .into()
            })
    }

    pub fn outcome(&self, outcome_id: &str) -> Result<&OutcomeDef> {
        self.outcome_index
            .get(outcome_id)
            .map(|&i| &self.outcomes[i])
            .ok_or_else(|| MedScreenError::UnknownId(format!("outcome {outcome_id}")).into())
    }

    pub fn summary(&self) -> String {
        format!(
            "{} screen, stratum {}: {} rows x {} outcomes = {} work items, width {}, {} shards",
            self.screen,
            self.stratum,
            self.sharder.rows(),
            self.sharder.outcomes(),
            self.sharder.grid_size(),
            self.sharder.width(),
            self.sharder.shard_count()
        )
    }
}

pub fn fit_settings(config: &RunConfig) -> FitSettings {
    FitSettings {
        level: config.confidence_level,
        irls: config.irls(),
        threads: config.threads,
    }
}

/// Stage 1 for one factor; the table is written before it is returned.
pub fn run_stage1(
    data: &StratumData,
    factor_id: &str,
    config: &RunConfig,
    layout: &OutputLayout,
) -> Result<Vec<AssociationRecord>> {
    let records = stage1_screen(data, factor_id, fit_settings(config))?;
    write_association_table(&layout.stage1(data.stratum, factor_id), &records, MEDIATOR_COLUMN)?;
    Ok(records)
}

pub fn run_total_effect(
    data: &StratumData,
    factor_id: &str,
    outcomes: &[OutcomeDef],
    config: &RunConfig,
    layout: &OutputLayout,
) -> Result<Vec<AssociationRecord>> {
    let records = total_effect_screen(data, factor_id, outcomes, fit_settings(config))?;
    write_association_table(&layout.total_effect(data.stratum, factor_id), &records, "outcome")?;
    Ok(records)
}

/// Stage-1 candidates from an existing artifact, if one was written.
pub fn stored_candidates(
    layout: &OutputLayout,
    stratum: Stratum,
    factor_id: &str,
    gate: SignificanceGate,
) -> Result<Option<Vec<String>>> {
    let path = layout.stage1(stratum, factor_id);
    if !path.is_file() {
        return Ok(None);
    }
    let records = read_association_table(&path, MEDIATOR_COLUMN)?;
    Ok(Some(filter_candidates(&records, gate)))
}

/// Executes work items for one shard process. Stage-1 candidate sets are
/// cached for the lifetime of the runner.
pub struct Runner<'a> {
    config: &'a RunConfig,
    layout: &'a OutputLayout,
    data: &'a StratumData,
    plan: &'a ScreenPlan,
    candidates: HashMap<String, Vec<String>>,
    log: File,
}

impl<'a> Runner<'a> {
    pub fn new(
        config: &'a RunConfig,
        layout: &'a OutputLayout,
        data: &'a StratumData,
        plan: &'a ScreenPlan,
        label: &str,
    ) -> Result<Self> {
        if data.stratum != plan.stratum {
            return Err(MedScreenError::InvalidArgument(format!(
                "stratum data is {} but the plan is for {}",
                data.stratum, plan.stratum
            ))
            .into());
        }
        let mut log = open_log(&layout.log(plan.screen, plan.stratum, label))?;
        log_line(&mut log, &plan.summary(), false)?;
        Ok(Self {
            config,
            layout,
            data,
            plan,
            candidates: HashMap::new(),
            log,
        })
    }

    fn candidates_for(&mut self, unit: &FactorUnit) -> Result<Vec<String>> {
        if let Some(fixed) = &unit.fixed_candidates {
            return Ok(fixed.clone());
        }
        if let Some(cached) = self.candidates.get(&unit.factor_id) {
            return Ok(cached.clone());
        }
        let gate = self.config.gate();
        let stored = stored_candidates(self.layout, self.plan.stratum, &unit.factor_id, gate)?;
        let candidates = match stored {
            Some(candidates) => candidates,
            None => {
                let records = run_stage1(self.data, &unit.factor_id, self.config, self.layout)?;
                filter_candidates(&records, gate)
            }
        };
        log_line(
            &mut self.log,
            &format!(
                "{}: {} candidate mediators pass the {} < {} gate",
                unit.factor_id,
                candidates.len(),
                gate.label(),
                gate.threshold()
            ),
            true,
        )?;
        self.candidates
            .insert(unit.factor_id.clone(), candidates.clone());
        Ok(candidates)
    }

    /// Stage 2 for one (factor, outcome); always leaves both tables and a marker.
    pub fn run_unit(
        &mut self,
        unit: &FactorUnit,
        outcome: &OutcomeDef,
    ) -> Result<CompletionMarker> {
        let candidates = self.candidates_for(unit)?;
        let result = run_outcome(
            self.data,
            &unit.factor_id,
            &candidates,
            outcome,
            fit_settings(self.config),
            self.config.mediation_threshold,
        )?;
        let (screen, stratum) = (self.plan.screen, self.plan.stratum);
        let marker = write_outcome_artifacts(
            &self.layout.stage2_all(screen, stratum, &unit.factor_id, &outcome.id),
            &self
                .layout
                .stage2_significant(screen, stratum, &unit.factor_id, &outcome.id),
            &self.layout.marker(screen, stratum, &unit.factor_id, &outcome.id),
            result.status,
            &result.records,
            &result.significant,
        )?;

        let message = format!(
            "{} -> {} ({stratum}): {}, {} candidates, {} fitted, {} significant",
            unit.factor_id,
            outcome.id,
            marker.status,
            marker.candidates,
            marker.rows,
            marker.significant
        );
        if marker.status == OutcomeStatus::Completed && marker.rows < marker.candidates {
            warn_line(
                &mut self.log,
                &format!("{message} ({} fits failed)", marker.candidates - marker.rows),
            )?;
        } else {
            log_line(&mut self.log, &message, true)?;
        }
        Ok(marker)
    }

    pub fn run_item(&mut self, item: WorkItem) -> Result<Vec<CompletionMarker>> {
        let plan = self.plan;
        let row = plan.rows.get(item.row).ok_or_else(|| {
            MedScreenError::InvalidArgument(format!("grid row {} out of range", item.row + 1))
        })?;
        let outcome = plan.outcomes.get(item.outcome).ok_or_else(|| {
            MedScreenError::InvalidArgument(format!("outcome {} out of range", item.outcome + 1))
        })?;
        let mut markers = Vec::with_capacity(row.units.len());
        for unit in &row.units {
            markers.push(self.run_unit(unit, outcome)?);
        }
        Ok(markers)
    }

    pub fn run_shard(&mut self, shard: usize) -> Result<Vec<CompletionMarker>> {
        let items = self.plan.sharder.pairs_for_shard(shard)?;
        log_line(
            &mut self.log,
            &format!("Shard {shard} owns {} work items", items.len()),
            true,
        )?;
        let mut markers = Vec::new();
        for item in items {
            markers.extend(self.run_item(item)?);
        }
        Ok(markers)
    }

    /// Runs only the listed (factor, outcome) keys.
    pub fn rerun(&mut self, worklist: &[(String, String)]) -> Result<Vec<CompletionMarker>> {
        let plan = self.plan;
        log_line(
            &mut self.log,
            &format!("Re-running {} outstanding work items", worklist.len()),
            true,
        )?;
        let mut markers = Vec::with_capacity(worklist.len());
        for (factor_id, outcome_id) in worklist {
            let unit = plan.unit(factor_id)?;
            let outcome = plan.outcome(outcome_id)?;
            markers.push(self.run_unit(unit, outcome)?);
        }
        Ok(markers)
    }
}

pub fn read_worklist(path: &Path) -> Result<Vec<(String, String)>> {
    if table_rows(path)? == 0 {
        info!("Worklist {} is empty", path.display());
        return Ok(Vec::new());
    }
    let df = read_table(path).with_context(|| format!("read worklist {}", path.display()))?;
    let factors = string_column(&df, "factor")?;
    let outcomes = string_column(&df, "outcome")?;
    let items: Vec<(String, String)> = factors
        .into_iter()
        .zip(outcomes)
        .filter(|(f, o)| !f.is_empty() && !o.is_empty())
        .collect();
    info!("Worklist {}: {} items", path.display(), items.len());
    Ok(items)
}
