use crate::correction::{benjamini_hochberg, bonferroni};
use crate::types::{AssociationRecord, MediationRecord};

/// Which p-value decides Stage-1 candidacy, and its threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignificanceGate {
    Raw(f64),
    Bonferroni(f64),
    BenjaminiHochberg(f64),
}

impl SignificanceGate {
    pub fn threshold(&self) -> f64 {
        match *self {
            SignificanceGate::Raw(t)
            | SignificanceGate::Bonferroni(t)
            | SignificanceGate::BenjaminiHochberg(t) => t,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SignificanceGate::Raw(_) => "raw p",
            SignificanceGate::Bonferroni(_) => "Bonferroni p",
            SignificanceGate::BenjaminiHochberg(_) => "BH p",
        }
    }

    pub fn passes(&self, record: &AssociationRecord) -> bool {
        let value = match self {
            SignificanceGate::Raw(_) => record.p_value,
            SignificanceGate::Bonferroni(_) => record.p_bonferroni,
            SignificanceGate::BenjaminiHochberg(_) => record.p_bh,
        };
        value < self.threshold()
    }
}

/// Attach Bonferroni and BH p-values across the whole family, in place.
pub fn apply_corrections(records: &mut [AssociationRecord]) {
    let raw: Vec<f64> = records.iter().map(|r| r.p_value).collect();
    let bonf = bonferroni(&raw);
    let bh = benjamini_hochberg(&raw);
    for ((record, b), q) in records.iter_mut().zip(bonf).zip(bh) {
        record.p_bonferroni = b;
        record.p_bh = q;
    }
}

/// Ids of the records passing the gate, in input order. May be empty.
pub fn filter_candidates(records: &[AssociationRecord], gate: SignificanceGate) -> Vec<String> {
    records
        .iter()
        .filter(|r| gate.passes(r))
        .map(|r| r.id.clone())
        .collect()
}

/// BH-adjust direct and indirect p-values separately across the candidate
/// set, then keep the records whose adjusted indirect p is below `threshold`.
pub fn filter_mediation(records: &mut [MediationRecord], threshold: f64) -> Vec<MediationRecord> {
    let direct: Vec<f64> = records.iter().map(|r| r.direct.p_value).collect();
    let indirect: Vec<f64> = records.iter().map(|r| r.indirect.p_value).collect();
    let direct_adj = benjamini_hochberg(&direct);
    let indirect_adj = benjamini_hochberg(&indirect);
    for ((record, d), i) in records.iter_mut().zip(direct_adj).zip(indirect_adj) {
        record.direct.p_adjusted = d;
        record.indirect.p_adjusted = i;
    }
    records
        .iter()
        .filter(|r| r.indirect.p_adjusted < threshold)
        .cloned()
        .collect()
}
