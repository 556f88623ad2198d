//! Per-page extraction records returned by the vision model.
//!
//! Every declared field is always present on these types (as `None` when the
//! model left it out), so downstream stages never deal with missing keys.
//! Decoding is deliberately forgiving: a number where a string was expected is
//! stringified, a garbled sub-object becomes its default, and only a response
//! that is not a JSON object at all is treated as malformed.

use serde::{Deserialize, Deserializer, Serialize};

/// Which face of an ID card a page shows.
///
/// Serialised as `front` / `back` / `unknown`. On input the French markers
/// used by the prompt (`recto` / `verso` / `inconnu`) are accepted too, and
/// anything unrecognised (including a missing or non-string value) becomes
/// [`Side::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Front,
    Back,
    #[default]
    Unknown,
}

impl Side {
    pub fn normalize(raw: Option<&str>) -> Side {
        match raw.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("front") | Some("recto") => Side::Front,
            Some("back") | Some("verso") => Side::Back,
            _ => Side::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Front => "front",
            Side::Back => "back",
            Side::Unknown => "unknown",
        }
    }
}

impl<'de> Deserialize<'de> for Side {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = lenient::string(deserializer)?;
        Ok(Side::normalize(raw.as_deref()))
    }
}

// ── ID card ──────────────────────────────────────────────────────────────

/// Field values of an Ivorian national ID card.
///
/// The first six fields are printed on the front, the last three on the back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdCardFields {
    #[serde(default, deserialize_with = "lenient::string")]
    pub numero_cni: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub nom: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub prenoms: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub date_naissance: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub nationalite: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub date_expiration: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub nni: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub profession: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub date_emission: Option<String>,
}

impl IdCardFields {
    pub const FRONT: [&'static str; 6] = [
        "numero_cni",
        "nom",
        "prenoms",
        "date_naissance",
        "nationalite",
        "date_expiration",
    ];

    pub const BACK: [&'static str; 3] = ["nni", "profession", "date_emission"];

    /// All field names in declaration order (front first, then back).
    pub const ALL: [&'static str; 9] = [
        "numero_cni",
        "nom",
        "prenoms",
        "date_naissance",
        "nationalite",
        "date_expiration",
        "nni",
        "profession",
        "date_emission",
    ];

    /// `(name, value)` pairs in [`IdCardFields::ALL`] order.
    pub fn entries(&self) -> [(&'static str, Option<&str>); 9] {
        [
            ("numero_cni", self.numero_cni.as_deref()),
            ("nom", self.nom.as_deref()),
            ("prenoms", self.prenoms.as_deref()),
            ("date_naissance", self.date_naissance.as_deref()),
            ("nationalite", self.nationalite.as_deref()),
            ("date_expiration", self.date_expiration.as_deref()),
            ("nni", self.nni.as_deref()),
            ("profession", self.profession.as_deref()),
            ("date_emission", self.date_emission.as_deref()),
        ]
    }

    /// Mutable slots in [`IdCardFields::ALL`] order.
    pub fn slots_mut(&mut self) -> [&mut Option<String>; 9] {
        [
            &mut self.numero_cni,
            &mut self.nom,
            &mut self.prenoms,
            &mut self.date_naissance,
            &mut self.nationalite,
            &mut self.date_expiration,
            &mut self.nni,
            &mut self.profession,
            &mut self.date_emission,
        ]
    }

    /// Value of a field by name, `None` for unknown names.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries()
            .into_iter()
            .find(|(n, _)| *n == name)
            .and_then(|(_, v)| v)
    }

    /// Null every field a page showing `side` is not allowed to contribute.
    ///
    /// Unknown-side pages are not trusted at all.
    pub fn mask(&mut self, side: Side) {
        for (name, slot) in Self::ALL.into_iter().zip(self.slots_mut()) {
            let allowed = match side {
                Side::Front => Self::FRONT.contains(&name),
                Side::Back => Self::BACK.contains(&name),
                Side::Unknown => false,
            };
            if !allowed {
                *slot = None;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries().iter().all(|(_, v)| v.is_none())
    }
}

/// One page of an ID card as read by the model, or cleaned by the reconciler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdCardExtraction {
    #[serde(rename = "face", default)]
    pub side: Side,
    #[serde(flatten)]
    pub fields: IdCardFields,
    /// Model text kept for diagnosis when it could not be parsed as JSON.
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl IdCardExtraction {
    /// All-null record for a model answer that was not JSON.
    pub fn malformed(raw: impl Into<String>) -> Self {
        Self {
            side: Side::Unknown,
            fields: IdCardFields::default(),
            raw_response: Some(raw.into()),
        }
    }

    pub fn is_malformed(&self) -> bool {
        self.raw_response.is_some()
    }
}

// ── Passport ─────────────────────────────────────────────────────────────

/// Control points the model checks on the data page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlPoints {
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub mrz_presente: Option<bool>,
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub image_fantome_visible: Option<bool>,
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub logos_conformes: Option<bool>,
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub dates_coherentes: Option<bool>,
}

/// The model's own authenticity assessment of a passport page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityAssessment {
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub document_complet: Option<bool>,
    /// `oui` | `non` | `douteux`
    #[serde(default, deserialize_with = "lenient::string")]
    pub authenticite_probable: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub points_de_controle: ControlPoints,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub alertes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderData {
    #[serde(default, deserialize_with = "lenient::string")]
    pub nom: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub prenoms: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub date_naissance: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub lieu_naissance: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub sexe: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub nationalite: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub profession: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassportDocumentData {
    #[serde(default, deserialize_with = "lenient::string")]
    pub passeport_no: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient::string")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub code_pays: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub date_emission: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub date_expiration: Option<String>,
}

/// The biographic page of a passport as read by the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassportExtraction {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub analyse_securite: SecurityAssessment,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub donnees_titulaire: HolderData,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub donnees_document: PassportDocumentData,
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl PassportExtraction {
    pub fn malformed(raw: impl Into<String>) -> Self {
        Self {
            raw_response: Some(raw.into()),
            ..Self::default()
        }
    }

    pub fn is_malformed(&self) -> bool {
        self.raw_response.is_some()
    }
}

// ── Lenient field decoding ───────────────────────────────────────────────

/// Deserializers that never fail on a type mismatch inside an object.
pub(crate) mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn scalar_to_string(v: Value) -> Option<String> {
        match v {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(scalar_to_string(Value::deserialize(d)?))
    }

    pub fn boolean<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Bool(b) => Some(b),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "oui" | "yes" => Some(true),
                "false" | "non" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        })
    }

    pub fn strings<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items.into_iter().filter_map(scalar_to_string).collect(),
            Value::String(s) => vec![s],
            _ => Vec::new(),
        })
    }

    pub fn or_default<'de, D, T>(d: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        let v = Value::deserialize(d)?;
        Ok(serde_json::from_value(v).unwrap_or_default())
    }
}
