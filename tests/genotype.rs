mod common;

use common::catalog;
use medscreen::config::RunConfig;
use medscreen::genotype::{RowCorrection, group_variants, rowwise_q, variant_hits};
use medscreen::pipeline::ScreenPlan;
use medscreen::types::{ScreenKind, Stratum, VariantCandidate};

fn candidate(variant: &str, mediator: &str, p: f64, pip: f64) -> VariantCandidate {
    VariantCandidate {
        variant: variant.to_string(),
        mediator: mediator.to_string(),
        p_value: p,
        pip,
    }
}

fn candidates() -> Vec<VariantCandidate> {
    vec![
        candidate("rs3", "P1", 0.001, 0.95),
        candidate("rs3", "P2", 0.2, 0.99),
        candidate("rs3", "P3", f64::NAN, 0.99),
        candidate("rs1", "P1", 0.01, 0.95),
        candidate("rs1", "P2", 0.01, 0.5),
        candidate("rs2", "P4", 0.04, 0.91),
        candidate("rs4", "P1", 1e-6, 0.97),
    ]
}

#[test]
fn bonferroni_is_applied_within_each_variant() {
    let q = rowwise_q(&candidates(), RowCorrection::Bonferroni);
    assert!((q[0] - 0.002).abs() < 1e-12);
    assert!((q[1] - 0.4).abs() < 1e-12);
    assert!(q[2].is_nan());
    assert!((q[3] - 0.02).abs() < 1e-12);
    assert!((q[5] - 0.04).abs() < 1e-12);
    assert!((q[6] - 1e-6).abs() < 1e-15);
}

#[test]
fn benjamini_hochberg_is_applied_within_each_variant() {
    let q = rowwise_q(&candidates(), RowCorrection::BenjaminiHochberg);
    // rs3: p = (0.001, 0.2) over two tests
    assert!((q[0] - 0.002).abs() < 1e-12);
    assert!((q[1] - 0.2).abs() < 1e-12);
    assert!(q[2].is_nan());
    // rs1: tied p-values share the same q
    assert!((q[3] - 0.01).abs() < 1e-12);
    assert!((q[4] - 0.01).abs() < 1e-12);
    assert!((q[6] - 1e-6).abs() < 1e-15);
}

#[test]
fn genotype_correction_reads_from_config() {
    let config: RunConfig = toml::from_str("[genotype]\ncorrection = \"bh\"\n").unwrap();
    assert_eq!(config.genotype.correction, RowCorrection::BenjaminiHochberg);
    assert_eq!(
        RunConfig::default().genotype.correction,
        RowCorrection::Bonferroni
    );
}

#[test]
fn hits_need_both_q_and_pip() {
    let hits = variant_hits(&candidates(), RowCorrection::Bonferroni, 0.05, 0.9);
    let variants: Vec<&str> = hits.keys().map(String::as_str).collect();
    assert_eq!(variants, vec!["rs1", "rs2", "rs3", "rs4"]);
    assert_eq!(hits["rs1"], vec!["P1"]);
    assert_eq!(hits["rs3"], vec!["P1"]);

    let strict = variant_hits(&candidates(), RowCorrection::Bonferroni, 0.01, 0.96);
    assert_eq!(strict.keys().collect::<Vec<_>>(), vec!["rs4"]);
}

#[test]
fn variants_are_chunked_into_groups() {
    let hits = variant_hits(&candidates(), RowCorrection::Bonferroni, 0.05, 0.9);
    let groups = group_variants(&hits, 3);
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0], vec!["rs1", "rs2", "rs3"]);
    assert_eq!(groups[1], vec!["rs4"]);
}

#[test]
fn genotype_plan_grid_is_groups_by_outcomes() {
    let mut config = RunConfig::default();
    config.genotype.group_size = 3;
    config.max_shard_width = 4;
    let plan = ScreenPlan::build(
        ScreenKind::Genotype,
        Stratum::Combined,
        &catalog(),
        &candidates(),
        &config,
    )
    .unwrap();
    assert_eq!(plan.rows.len(), 2);
    assert_eq!(plan.rows[0].label, "group_1");
    assert_eq!(plan.sharder.grid_size(), 6);
    assert_eq!(plan.sharder.shard_count(), 2);
    let unit = plan.unit("rs2").unwrap();
    assert_eq!(unit.fixed_candidates.as_deref(), Some(&["P4".to_string()][..]));
    assert!(plan.unit("rs9").is_err());
    assert_eq!(plan.units().count(), 4);
}
