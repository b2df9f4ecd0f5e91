use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog reference entity. Read-only from the pipeline's perspective;
/// owned by a separate administrative process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Biomarker {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub unit: Option<String>,
    pub optimal_min: Option<f64>,
    pub optimal_max: Option<f64>,
    pub conventional_min: Option<f64>,
    pub conventional_max: Option<f64>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    Borderline,
    Abnormal,
    Critical,
}

/// One extracted value tied to a document. Created once per extraction run;
/// re-analysis inserts new rows rather than updating in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiomarkerReading {
    #[serde(rename = "_id")]
    pub id: String,
    pub document_id: String,
    /// Catalog entry this reading matched, if any.
    pub biomarker_id: Option<String>,
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub reference_range: Option<String>,
    pub confidence: f64,
    pub matched_from_db: bool,
    pub severity: Severity,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl BiomarkerReading {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        document_id: String,
        biomarker_id: Option<String>,
        name: String,
        value: f64,
        unit: String,
        reference_range: Option<String>,
        confidence: f64,
        severity: Severity,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            document_id,
            matched_from_db: biomarker_id.is_some(),
            biomarker_id,
            name,
            value,
            unit,
            reference_range,
            confidence,
            severity,
            created_at: Utc::now(),
        }
    }
}
