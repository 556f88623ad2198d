//! Output types: fused records and the final report.

use crate::extraction::{IdCardFields, SecurityAssessment, Side};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key the primary identifying number is published under, whatever the document type.
pub const DOCUMENT_NUMBER_KEY: &str = "numero_doc";

/// Checks the report claims to run; fixed for both document types.
pub const VERIFICATION_NUMBER: u32 = 3;

/// `justify` value when the verification count does not exceed the threshold.
pub const NON_CONFORMING: &str = "Document Non-Conforme !";

/// One ID card reconciled across all of its pages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdCardRecord {
    pub face: Side,
    #[serde(flatten)]
    pub fields: IdCardFields,
}

impl IdCardRecord {
    /// The `info` mapping: `face` plus every field, with `numero_cni`
    /// published as [`DOCUMENT_NUMBER_KEY`].
    pub fn info(&self) -> BTreeMap<String, Option<String>> {
        let mut info = BTreeMap::new();
        info.insert("face".to_string(), Some(self.face.as_str().to_string()));
        for (name, value) in self.fields.entries() {
            let key = if name == "numero_cni" { DOCUMENT_NUMBER_KEY } else { name };
            info.insert(key.to_string(), value.map(str::to_string));
        }
        info
    }
}

/// The biographic data kept from a passport's first page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassportRecord {
    pub nom: Option<String>,
    pub prenoms: Option<String>,
    pub date_naissance: Option<String>,
    pub numero_doc: Option<String>,
    pub date_expiration: Option<String>,
    /// The model's own security assessment, kept for the caller but not scored.
    pub security: SecurityAssessment,
}

impl PassportRecord {
    pub fn info(&self) -> BTreeMap<String, Option<String>> {
        BTreeMap::from([
            ("nom".to_string(), self.nom.clone()),
            ("prenoms".to_string(), self.prenoms.clone()),
            ("date_naissance".to_string(), self.date_naissance.clone()),
            (DOCUMENT_NUMBER_KEY.to_string(), self.numero_doc.clone()),
            ("date_expiration".to_string(), self.date_expiration.clone()),
        ])
    }
}

/// Final analysis result for one document.
///
/// Built once per analysis and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub score: Option<u8>,
    pub type_document: String,
    /// `DD/MM/YYYY à HH:MM`, local time.
    pub date_analyse: String,
    pub info: BTreeMap<String, Option<String>>,
    pub verification_number: u32,
    pub justify: Option<String>,
}

/// Format an analysis timestamp the way reports display it.
pub fn format_analysis_date(at: &DateTime<Local>) -> String {
    format!("{} à {}", at.format("%d/%m/%Y"), at.format("%H:%M"))
}

/// Justification text for a report.
///
/// Compares the fixed verification count against the score threshold, not the
/// score itself. With the default threshold of 75 this always yields
/// [`NON_CONFORMING`]; the rule is kept as-is until the business rule is settled.
pub fn justify(verification_number: u32, score_threshold: u32, accepted: &str) -> String {
    if verification_number > score_threshold {
        accepted.to_string()
    } else {
        NON_CONFORMING.to_string()
    }
}
