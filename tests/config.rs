use std::fs;

use medscreen::config::{GateKind, RunConfig};
use medscreen::filter::SignificanceGate;
use tempfile::TempDir;

#[test]
fn defaults_without_a_file() {
    let config = RunConfig::load(None).unwrap();
    config.validate().unwrap();
    assert_eq!(config.gate(), SignificanceGate::Bonferroni(0.05));
    assert_eq!(config.max_shard_width, 1);
    assert_eq!(config.genotype.group_size, 50);
    assert_eq!(config.irls().max_iter, 25);
}

#[test]
fn partial_file_keeps_remaining_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run.toml");
    fs::write(
        &path,
        r#"
output_dir = "results"
max_shard_width = 6

[stage1]
gate = "bh"
threshold = 0.1

[genotype]
pip_threshold = 0.8
"#,
    )
    .unwrap();
    let config = RunConfig::load(Some(&path)).unwrap();
    config.validate().unwrap();
    assert_eq!(config.stage1.gate, GateKind::BenjaminiHochberg);
    assert_eq!(config.gate(), SignificanceGate::BenjaminiHochberg(0.1));
    assert_eq!(config.output_dir.to_str(), Some("results"));
    assert_eq!(config.max_shard_width, 6);
    assert_eq!(config.genotype.pip_threshold, 0.8);
    assert_eq!(config.genotype.q_threshold, 0.05);
    assert_eq!(config.mediation_threshold, 0.05);
}

#[test]
fn invalid_values_are_rejected() {
    let mut config = RunConfig::default();
    config.stage1.threshold = 0.0;
    assert!(config.validate().is_err());

    let mut config = RunConfig::default();
    config.max_shard_width = 0;
    assert!(config.validate().is_err());

    let mut config = RunConfig::default();
    config.genotype.pip_threshold = 1.0;
    assert!(config.validate().is_err());

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[stage1]\ngate = \"sometimes\"\n").unwrap();
    assert!(RunConfig::load(Some(&path)).is_err());
}
