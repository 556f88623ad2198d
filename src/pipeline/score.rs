//! Plausibility scoring of fused records.
//!
//! ID cards get three all-or-nothing checks plus a random jitter:
//!
//! | check | points |
//! |-------|--------|
//! | document number contains `CI00` (spaces ignored) | 40 |
//! | issuance and expiration parse as `dd/mm/yyyy`, expiration ≥ issuance | 30 |
//! | birth date parses as `dd/mm/yyyy` and is before today | 30 |
//! | jitter in `[0, 10]` | 0–10 |
//!
//! then clamped to `[0, 100]`. A date that does not parse simply skips its
//! check. The jitter is not a signal; it comes from a [`JitterSource`] so tests
//! can pin it with [`FixedJitter`].
//!
//! Passports are not evaluated: they get [`PASSPORT_FIXED_SCORE`].

use crate::output::{IdCardRecord, PassportRecord};
use chrono::{Local, NaiveDate};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Marker an Ivorian CNI number must contain.
pub const DOCUMENT_NUMBER_MARKER: &str = "CI00";

pub const DOCUMENT_NUMBER_POINTS: u32 = 40;
pub const VALIDITY_PERIOD_POINTS: u32 = 30;
pub const BIRTH_DATE_POINTS: u32 = 30;
pub const MAX_JITTER: u8 = 10;

/// Score reported for every passport.
pub const PASSPORT_FIXED_SCORE: u8 = 99;

const DATE_FORMAT: &str = "%d/%m/%Y";

/// Source of the jitter term.
pub trait JitterSource: Send + Sync {
    /// A value in `[0, MAX_JITTER]`.
    fn jitter(&self) -> u8;
}

/// Uniform jitter from the thread RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomJitter;

impl JitterSource for RandomJitter {
    fn jitter(&self) -> u8 {
        rand::thread_rng().gen_range(0..=MAX_JITTER)
    }
}

/// Always returns the same jitter.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub u8);

impl JitterSource for FixedJitter {
    fn jitter(&self) -> u8 {
        self.0.min(MAX_JITTER)
    }
}

/// Which checks passed, and the jitter that was added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub document_number: bool,
    pub validity_period: bool,
    pub birth_date: bool,
    pub jitter: u8,
}

impl ScoreBreakdown {
    /// Clamped total.
    pub fn total(&self) -> u8 {
        let mut points = u32::from(self.jitter);
        if self.document_number {
            points += DOCUMENT_NUMBER_POINTS;
        }
        if self.validity_period {
            points += VALIDITY_PERIOD_POINTS;
        }
        if self.birth_date {
            points += BIRTH_DATE_POINTS;
        }
        points.min(100) as u8
    }
}

/// A fused record together with its score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredRecord<T> {
    pub record: T,
    pub score: Option<u8>,
    /// Present when the score was computed from checks.
    pub breakdown: Option<ScoreBreakdown>,
}

/// Scores records with an injectable jitter source.
#[derive(Clone)]
pub struct Scorer {
    jitter: Arc<dyn JitterSource>,
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(Arc::new(RandomJitter))
    }
}

impl Scorer {
    pub fn new(jitter: Arc<dyn JitterSource>) -> Self {
        Self { jitter }
    }

    /// Score an ID card against today's local date.
    pub fn score_id_card(&self, record: IdCardRecord) -> ScoredRecord<IdCardRecord> {
        self.score_id_card_at(record, Local::now().date_naive())
    }

    /// Score an ID card as if today were `today`.
    pub fn score_id_card_at(
        &self,
        record: IdCardRecord,
        today: NaiveDate,
    ) -> ScoredRecord<IdCardRecord> {
        let fields = &record.fields;
        let breakdown = ScoreBreakdown {
            document_number: has_document_marker(fields.numero_cni.as_deref()),
            validity_period: validity_period_ok(
                fields.date_emission.as_deref(),
                fields.date_expiration.as_deref(),
            ),
            birth_date: birth_date_ok(fields.date_naissance.as_deref(), today),
            jitter: self.jitter.jitter(),
        };
        let score = breakdown.total();
        debug!(?breakdown, score, "ID card scored");

        ScoredRecord {
            record,
            score: Some(score),
            breakdown: Some(breakdown),
        }
    }

    /// Passports carry a fixed score; no rule is evaluated.
    pub fn score_passport(&self, record: PassportRecord) -> ScoredRecord<PassportRecord> {
        ScoredRecord {
            record,
            score: Some(PASSPORT_FIXED_SCORE),
            breakdown: None,
        }
    }
}

fn has_document_marker(number: Option<&str>) -> bool {
    number
        .map(|n| n.replace(' ', "").contains(DOCUMENT_NUMBER_MARKER))
        .unwrap_or(false)
}

fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value?.trim(), DATE_FORMAT).ok()
}

fn validity_period_ok(issued: Option<&str>, expires: Option<&str>) -> bool {
    match (parse_date(issued), parse_date(expires)) {
        (Some(issued), Some(expires)) => expires >= issued,
        _ => false,
    }
}

fn birth_date_ok(birth: Option<&str>, today: NaiveDate) -> bool {
    parse_date(birth).is_some_and(|d| d < today)
}
