//! Field reconciliation: per-page masking, then fusion into one record.
//!
//! ## Cleaning
//!
//! The model is told to fill only the fields of the face it sees, but it does
//! not always listen. [`clean_id_card_pages`] enforces the rule: a front page
//! keeps front fields only, a back page back fields only, and an unknown page
//! contributes nothing.
//!
//! ## Fusion
//!
//! [`fuse_id_card`] walks the cleaned pages in page order. For each field the
//! first non-empty value wins, unless a later page offers a strictly longer
//! string, which then replaces it. Completeness beats recency, and the result
//! depends only on page order.

use crate::extraction::{IdCardExtraction, PassportExtraction, Side};
use crate::output::{IdCardRecord, PassportRecord};

/// Mask every page's fields by its own side marker.
pub fn clean_id_card_pages(raw: Vec<IdCardExtraction>) -> Vec<IdCardExtraction> {
    raw.into_iter().map(clean_id_card_page).collect()
}

pub fn clean_id_card_page(mut page: IdCardExtraction) -> IdCardExtraction {
    page.fields.mask(page.side);
    page
}

/// Resolve the document's face from the faces its pages reported.
///
/// Front beats back; otherwise the first page's marker; `Unknown` for no pages.
pub fn resolve_side(pages: &[IdCardExtraction]) -> Side {
    let sides: Vec<Side> = pages.iter().map(|p| p.side).collect();
    if sides.contains(&Side::Front) {
        Side::Front
    } else if sides.contains(&Side::Back) {
        Side::Back
    } else {
        sides.first().copied().unwrap_or(Side::Unknown)
    }
}

/// Fuse cleaned ID-card pages into one record.
pub fn fuse_id_card(pages: &[IdCardExtraction]) -> IdCardRecord {
    let mut fused = IdCardRecord {
        face: resolve_side(pages),
        ..IdCardRecord::default()
    };

    for page in pages {
        let candidates = page.fields.entries();
        for (slot, (_, candidate)) in fused.fields.slots_mut().into_iter().zip(candidates) {
            merge_value(slot, candidate);
        }
    }

    fused
}

/// Keep `current` unless it is empty or `candidate` is strictly longer.
fn merge_value(current: &mut Option<String>, candidate: Option<&str>) {
    let candidate = match candidate {
        Some(c) if !c.is_empty() => c,
        _ => return,
    };
    match current.as_deref() {
        None | Some("") => *current = Some(candidate.to_string()),
        Some(existing) if candidate.chars().count() > existing.chars().count() => {
            *current = Some(candidate.to_string())
        }
        Some(_) => {}
    }
}

/// Passports are read from their first page only: a direct remap, no merging.
pub fn fuse_passport(pages: &[PassportExtraction]) -> PassportRecord {
    let Some(first) = pages.first() else {
        return PassportRecord::default();
    };
    PassportRecord {
        nom: first.donnees_titulaire.nom.clone(),
        prenoms: first.donnees_titulaire.prenoms.clone(),
        date_naissance: first.donnees_titulaire.date_naissance.clone(),
        numero_doc: first.donnees_document.passeport_no.clone(),
        date_expiration: first.donnees_document.date_expiration.clone(),
        security: first.analyse_securite.clone(),
    }
}
