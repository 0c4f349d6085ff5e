//! Result types returned to callers and serialised as the HTTP response body.
//!
//! The JSON shape is the contract with front-ends, so field names here are
//! wire names: `document_type`, `extracted_sections`, `inconsistencies`,
//! `confidence_indication`, `raw_output`, `total_pages`, `pages`, and
//! `page` inside each [`PageResult`].
//!
//! Decoding is forgiving about *shape details* the model tends
//! to get wrong (missing keys, `null` lists, "Passport" vs "passport", a bare
//! string where a section object or a list belongs) and strict about the
//! outer *structure*: a top-level array, or `extracted_sections` that is not
//! an object, is rejected and handled by the fallback in
//! [`crate::pipeline::llm`].

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Inconsistency note recorded when the model output is not usable JSON.
pub const PARSE_FAILURE_NOTE: &str = "Failed to parse JSON";

/// Fields of one section, keyed by the label printed on the document.
///
/// Values are kept as raw JSON so that numbers or booleans emitted by the
/// model survive untouched; unreadable fields are `null`.
pub type SectionFields = BTreeMap<String, serde_json::Value>;

/// Sections keyed by heading (e.g. "Personal Details", "MRZ").
pub type Sections = BTreeMap<String, SectionFields>;

/// Field label used when the model sends a bare value instead of a section
/// object, e.g. `"MRZ": "P<UTO..."`.
pub const SECTION_VALUE_FIELD: &str = "value";

/// Kind of identity document recognised on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum DocumentType {
    Passport,
    NationalId,
    DrivingLicense,
    #[default]
    Other,
}

impl From<String> for DocumentType {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "passport" => DocumentType::Passport,
            "national_id" => DocumentType::NationalId,
            "driving_license" => DocumentType::DrivingLicense,
            _ => DocumentType::Other,
        }
    }
}

/// The model's self-reported confidence for a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum Confidence {
    High,
    Medium,
    #[default]
    Low,
}

impl From<String> for Confidence {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Confidence::High,
            "medium" => Confidence::Medium,
            _ => Confidence::Low,
        }
    }
}

/// Structured fields extracted from one page (or one image upload).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub document_type: DocumentType,

    #[serde(default, deserialize_with = "lenient_sections")]
    pub extracted_sections: Sections,

    #[serde(default, deserialize_with = "lenient_notes")]
    pub inconsistencies: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub confidence_indication: Confidence,

    /// Unparsed model text; present only on the parse-failure fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
}

impl ExtractionResult {
    /// The degraded result used when the model's reply is not valid JSON.
    pub fn parse_failure(raw_output: impl Into<String>) -> Self {
        Self {
            document_type: DocumentType::Other,
            extracted_sections: Sections::new(),
            inconsistencies: vec![PARSE_FAILURE_NOTE.to_string()],
            confidence_indication: Confidence::Low,
            raw_output: Some(raw_output.into()),
        }
    }
}

/// One rendered page and what the model extracted from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number.
    #[serde(rename = "page")]
    pub page_number: usize,
    pub result: ExtractionResult,
}

/// The response body for one uploaded document.
///
/// For a single page this is the page's [`ExtractionResult`] with
/// `total_pages = 1` and no `pages` key. For several pages it is the merged
/// view built by [`crate::aggregate::aggregate`] plus every page's own result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    #[serde(flatten)]
    pub result: ExtractionResult,

    pub total_pages: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<PageResult>>,
}

impl AggregateResult {
    /// Wrap a single page's result without any merging.
    pub fn single(result: ExtractionResult) -> Self {
        Self {
            result,
            total_pages: 1,
            pages: None,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `extracted_sections` must be an object (or `null`). A section whose value
/// is not an object is kept as a one-field section under
/// [`SECTION_VALUE_FIELD`]; a `null` section is kept empty.
fn lenient_sections<'de, D>(deserializer: D) -> Result<Sections, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => return Ok(Sections::new()),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(D::Error::custom(format!(
                "extracted_sections must be an object, got {other}"
            )))
        }
    };

    Ok(raw
        .into_iter()
        .map(|(heading, value)| {
            let fields = match value {
                Value::Object(fields) => fields.into_iter().collect(),
                Value::Null => SectionFields::new(),
                bare => SectionFields::from([(SECTION_VALUE_FIELD.to_string(), bare)]),
            };
            (heading, fields)
        })
        .collect())
}

/// `inconsistencies` as a list of notes. A single string becomes one note,
/// an object becomes one `"key: value"` note per entry, and non-string list
/// items are rendered as JSON text. `null` items are dropped.
fn lenient_notes<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .into_iter()
            .filter(|v| !v.is_null())
            .map(note_text)
            .collect(),
        Some(Value::Object(map)) => map
            .into_iter()
            .map(|(k, v)| format!("{k}: {}", note_text(v)))
            .collect(),
        Some(Value::String(s)) if s.trim().is_empty() => Vec::new(),
        Some(single) => vec![note_text(single)],
    })
}

fn note_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}
