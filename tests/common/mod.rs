#![allow(dead_code)]

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use medscreen::data::{Catalog, MemorySource, NumericTable, StratumData};
use medscreen::types::{Factor, FactorKind, OutcomeDef, SexSpecificity, Stratum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

pub fn normal(rng: &mut StdRng) -> f64 {
    StandardNormal.sample(rng)
}

pub fn bernoulli(rng: &mut StdRng, p: f64) -> f64 {
    if rng.r#gen::<f64>() < p { 1.0 } else { 0.0 }
}

pub fn inv_logit(eta: f64) -> f64 {
    1.0 / (1.0 + (-eta).exp())
}

pub fn table(names: &[&str], columns: Vec<Vec<f64>>) -> NumericTable {
    NumericTable::new(names.iter().map(|s| s.to_string()).collect(), columns).unwrap()
}

pub fn factor(id: &str, kind: FactorKind) -> Factor {
    Factor {
        id: id.to_string(),
        kind,
        category: "test".to_string(),
        sex: SexSpecificity::Both,
    }
}

pub fn outcome(id: &str, sex: SexSpecificity) -> OutcomeDef {
    OutcomeDef {
        id: id.to_string(),
        category: "test".to_string(),
        sex,
    }
}

/// Factor `E1` acts on outcome `D2` through mediator `P1`; the other
/// mediators are noise and `E2` is a null factor. `D1` has no events and
/// `D3` is female-only, missing for men.
pub fn simulate_stratum(stratum: Stratum, n: usize, n_mediators: usize, seed: u64) -> StratumData {
    let mut rng = StdRng::seed_from_u64(seed);
    let sample_ids: Vec<String> = (0..n).map(|i| format!("S{i:05}")).collect();
    let age: Vec<f64> = (0..n).map(|_| 55.0 + 8.0 * normal(&mut rng)).collect();
    let sex: Vec<f64> = match stratum {
        Stratum::Combined => (0..n).map(|_| bernoulli(&mut rng, 0.5)).collect(),
        Stratum::Male => vec![1.0; n],
        Stratum::Female => vec![0.0; n],
    };
    let e1: Vec<f64> = (0..n).map(|_| bernoulli(&mut rng, 0.5)).collect();
    let e2: Vec<f64> = (0..n).map(|_| bernoulli(&mut rng, 0.4)).collect();

    let mut mediators = Vec::with_capacity(n_mediators);
    let mut names = Vec::with_capacity(n_mediators);
    for j in 0..n_mediators {
        let column: Vec<f64> = (0..n)
            .map(|i| {
                let signal = if j == 0 { 0.9 * e1[i] } else { 0.0 };
                signal + 0.01 * (age[i] - 55.0) + normal(&mut rng)
            })
            .collect();
        mediators.push(column);
        names.push(format!("P{}", j + 1));
    }

    let d1 = vec![0.0; n];
    let d2: Vec<f64> = (0..n)
        .map(|i| {
            let eta = -0.8 + 0.3 * e1[i] + 0.9 * mediators[0][i];
            bernoulli(&mut rng, inv_logit(eta))
        })
        .collect();
    let d3: Vec<f64> = match stratum {
        Stratum::Male => vec![f64::NAN; n],
        _ => (0..n).map(|_| bernoulli(&mut rng, 0.2)).collect(),
    };

    StratumData {
        stratum,
        sample_ids,
        covariates: table(&["age", "sex"], vec![age, sex]),
        mediators: NumericTable::new(names, mediators).unwrap(),
        factors: table(&["E1", "E2"], vec![e1, e2]),
        outcomes: table(&["D1", "D2", "D3"], vec![d1, d2, d3]),
    }
}

pub fn catalog() -> Catalog {
    Catalog::new(
        vec![
            factor("E1", FactorKind::Exposure),
            factor("E2", FactorKind::Measurement),
        ],
        vec![
            outcome("D1", SexSpecificity::Both),
            outcome("D2", SexSpecificity::Both),
            outcome("D3", SexSpecificity::FemaleOnly),
        ],
    )
    .unwrap()
}

pub fn memory_source(n: usize, n_mediators: usize) -> MemorySource {
    let mut strata = HashMap::new();
    for (k, stratum) in Stratum::ALL.into_iter().enumerate() {
        strata.insert(stratum, simulate_stratum(stratum, n, n_mediators, 100 + k as u64));
    }
    MemorySource {
        catalog: catalog(),
        strata,
        variants: Vec::new(),
    }
}

fn format_value(v: f64) -> String {
    if v.is_nan() { "NA".to_string() } else { format!("{v:.6}") }
}

fn write_numeric(path: &Path, ids: &[String], table: &NumericTable) {
    let mut out = String::from("sample_id");
    for name in table.names() {
        write!(out, "\t{name}").unwrap();
    }
    out.push('\n');
    for (i, id) in ids.iter().enumerate() {
        out.push_str(id);
        for column in table.columns() {
            write!(out, "\t{}", format_value(column[i])).unwrap();
        }
        out.push('\n');
    }
    fs::write(path, out).unwrap();
}

/// Writes a source to the on-disk layout read by `TableSource`.
pub fn write_data_dir(dir: &Path, source: &MemorySource) {
    fs::create_dir_all(dir).unwrap();
    let mut factors = String::from("id\tkind\tcategory\tsex\n");
    for f in &source.catalog.factors {
        let kind = match f.kind {
            FactorKind::Exposure => "exposure",
            FactorKind::Measurement => "measurement",
            FactorKind::Genotype => "genotype",
        };
        writeln!(factors, "{}\t{kind}\t{}\tboth", f.id, f.category).unwrap();
    }
    fs::write(dir.join("factor_catalog.tsv"), factors).unwrap();

    let mut outcomes = String::from("code\tcategory\tsex_specific\n");
    for o in &source.catalog.outcomes {
        let sex = match o.sex {
            SexSpecificity::Both => "both",
            SexSpecificity::MaleOnly => "male",
            SexSpecificity::FemaleOnly => "female",
        };
        writeln!(outcomes, "{}\t{}\t{sex}", o.id, o.category).unwrap();
    }
    fs::write(dir.join("outcome_catalog.tsv"), outcomes).unwrap();

    for (stratum, data) in &source.strata {
        let sdir = dir.join(stratum.label());
        fs::create_dir_all(&sdir).unwrap();
        write_numeric(&sdir.join("covariates.tsv"), &data.sample_ids, &data.covariates);
        write_numeric(&sdir.join("mediators.tsv"), &data.sample_ids, &data.mediators);
        write_numeric(&sdir.join("factors.tsv"), &data.sample_ids, &data.factors);
        write_numeric(&sdir.join("outcomes.tsv"), &data.sample_ids, &data.outcomes);
    }
}
