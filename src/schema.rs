use std::collections::HashMap;

use crate::error::{MedScreenError, Result};

pub const SAMPLE_ID: &str = "SAMPLE_ID";
pub const ID: &str = "ID";
pub const KIND: &str = "KIND";
pub const CATEGORY: &str = "CATEGORY";
pub const SEX: &str = "SEX";
pub const VARIANT: &str = "VARIANT";
pub const MEDIATOR: &str = "MEDIATOR";
pub const P: &str = "P";
pub const PIP: &str = "PIP";

#[derive(Debug, Clone)]
pub struct ColumnMap {
    /// Canonical name -> header as it appears in the file.
    pub columns: HashMap<String, String>,
    pub info: Vec<String>,
}

impl ColumnMap {
    pub fn get(&self, canonical: &str) -> Option<&str> {
        self.columns.get(canonical).map(String::as_str)
    }

    pub fn require(&self, canonical: &str) -> Result<&str> {
        self.get(canonical)
            .ok_or_else(|| MedScreenError::MissingColumn(canonical.to_string()))
    }
}

pub fn normalize_header(header: &str) -> String {
    header.trim().to_ascii_uppercase()
}

fn synonyms() -> HashMap<&'static str, Vec<&'static str>> {
    let mut synonyms: HashMap<&'static str, Vec<&'static str>> = HashMap::new();
    synonyms.insert(
        SAMPLE_ID,
        vec!["SAMPLE_ID", "SAMPLEID", "EID", "IID", "ID", "SAMPLE", "PARTICIPANT"],
    );
    synonyms.insert(ID, vec!["ID", "NAME", "CODE", "PHENOTYPE", "TRAIT"]);
    synonyms.insert(KIND, vec!["KIND", "TYPE", "FACTOR_TYPE"]);
    synonyms.insert(CATEGORY, vec!["CATEGORY", "GROUP", "DOMAIN"]);
    synonyms.insert(SEX, vec!["SEX", "SEX_SPECIFIC", "SEX_SPECIFICITY"]);
    synonyms.insert(
        VARIANT,
        vec!["VARIANT", "VARIANT_ID", "SNP", "RSID", "RS_ID", "MARKERNAME"],
    );
    synonyms.insert(MEDIATOR, vec!["MEDIATOR", "PROTEIN", "GENE", "ASSAY"]);
    synonyms.insert(P, vec!["P", "PVALUE", "PVAL", "P_VALUE", "P-VALUE", "P.VALUE"]);
    synonyms.insert(PIP, vec!["PIP", "POSTERIOR", "POSTERIOR_PROB", "PP"]);
    synonyms
}

/// Map the requested canonical roles onto a table's headers.
///
/// Canonical names are tried first, then synonyms in listed order. A header
/// claimed by one role is not reused for another.
pub fn resolve_column_map(
    headers: &[String],
    required: &[&str],
    optional: &[&str],
    filename: &str,
) -> Result<ColumnMap> {
    let synonyms = synonyms();
    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
    let mut claimed = vec![false; headers.len()];
    let mut columns = HashMap::new();
    let mut info = Vec::new();

    for (role, is_required) in required
        .iter()
        .map(|r| (*r, true))
        .chain(optional.iter().map(|r| (*r, false)))
    {
        let candidates = synonyms.get(role).cloned().unwrap_or_else(|| vec![role]);
        let found = candidates.iter().find_map(|name| {
            normalized
                .iter()
                .enumerate()
                .find(|(idx, h)| !claimed[*idx] && h.as_str() == *name)
                .map(|(idx, _)| idx)
        });
        match found {
            Some(idx) => {
                claimed[idx] = true;
                if normalized[idx] != role {
                    info.push(format!(
                        "Interpreting the {} column in {filename} as {role}",
                        headers[idx]
                    ));
                }
                columns.insert(role.to_string(), headers[idx].clone());
            }
            None if is_required => {
                return Err(MedScreenError::MissingColumn(format!(
                    "{role} in {filename}"
                )));
            }
            None => {}
        }
    }

    Ok(ColumnMap { columns, info })
}

