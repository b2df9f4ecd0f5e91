//! Prompt and schema construction for the two LLM calls.

use crate::models::{Biomarker, BiomarkerReading, analysis::UserProfile};
use serde_json::{json, Value};

pub fn extraction_prompt(document_text: &str, catalog: &[Biomarker]) -> String {
    let known_names: Vec<&str> = catalog.iter().map(|b| b.name.as_str()).collect();

    format!(
        "You are a clinical lab report parser. Extract every biomarker \
         measurement from the blood test document below.\n\
         \n\
         Rules:\n\
         - Report values exactly as printed; do not convert units.\n\
         - Include the reference range text when present.\n\
         - Set confidence in [0,1] per biomarker based on how clearly the \
           value is stated.\n\
         - Quote the source line in source_text.\n\
         - Prefer canonical names from this known list when applicable: {}\n\
         \n\
         Document:\n{}",
        known_names.join(", "),
        document_text
    )
}

pub fn extraction_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "biomarkers": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "value": { "type": "number" },
                        "unit": { "type": "string" },
                        "reference_range": { "type": ["string", "null"] },
                        "confidence": { "type": "number" },
                        "source_text": { "type": ["string", "null"] },
                        "category": { "type": ["string", "null"] },
                        "aliases": { "type": "array", "items": { "type": "string" } }
                    },
                    "required": ["name", "value", "unit", "reference_range", "confidence", "source_text", "category", "aliases"],
                    "additionalProperties": false
                }
            },
            "document_type": { "type": ["string", "null"] },
            "confidence": { "type": "number" },
            "notes": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["biomarkers", "document_type", "confidence", "notes"],
        "additionalProperties": false
    })
}

fn readings_and_profile_block(
    readings: &[BiomarkerReading],
    catalog: &[Biomarker],
    profile: &UserProfile,
) -> String {
    let readings_block = readings
        .iter()
        .map(|r| {
            format!(
                "- {}: {} {} (ref: {}, severity: {:?}, matched: {})",
                r.name,
                r.value,
                r.unit,
                r.reference_range.as_deref().unwrap_or("n/a"),
                r.severity,
                r.matched_from_db
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let ranges_block = catalog
        .iter()
        .filter(|b| b.optimal_min.is_some() || b.optimal_max.is_some())
        .map(|b| {
            format!(
                "- {}: optimal {:?}-{:?} {}",
                b.name,
                b.optimal_min,
                b.optimal_max,
                b.unit.as_deref().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Patient profile: {}\n\
         \n\
         Biomarker readings:\n{}\n\
         \n\
         Optimal ranges:\n{}",
        serde_json::to_string(profile).unwrap_or_default(),
        readings_block,
        ranges_block
    )
}

pub fn core_analysis_prompt(
    readings: &[BiomarkerReading],
    catalog: &[Biomarker],
    profile: &UserProfile,
) -> String {
    format!(
        "You are a functional medicine practitioner producing a structured \
         health analysis from blood test results.\n\
         \n\
         {}\n\
         \n\
         Produce: an overall assessment with a 0-100 score and a category \
         (optimal, good, needs attention, concerning), per-biomarker \
         insights, likely root causes, a monitoring plan with retest \
         intervals, personalization factors, an evidence summary, and \
         concrete next steps. Do not include recommendations here; those \
         are requested separately.",
        readings_and_profile_block(readings, catalog, profile)
    )
}

/// Per-category recommendation prompt. The natural-substances-only
/// constraint on supplements is a content policy carried in the prompt; the
/// server does not filter the model's output.
pub fn category_prompt(
    category: &str,
    core_summary: &str,
    readings: &[BiomarkerReading],
    catalog: &[Biomarker],
    profile: &UserProfile,
) -> String {
    let category_instruction = match category {
        "supplements" => {
            "Recommend supplements. IMPORTANT: limit recommendations to \
             natural and nutraceutical substances (vitamins, minerals, herbs, \
             amino acids). Never recommend pharmaceuticals or prescription \
             drugs. Include dosage, timing, rationale, and cautions."
        }
        "diet" => {
            "Recommend dietary changes. For each, include the rationale and \
             specific foods to include and to avoid."
        }
        "lifestyle" => {
            "Recommend lifestyle changes (sleep, stress, sunlight, habits) \
             with rationale and priority."
        }
        "workout" => {
            "Recommend physical activity: the activity, frequency, intensity, \
             and rationale, appropriate for the patient's profile."
        }
        other => other,
    };

    format!(
        "You are a functional medicine practitioner. The core analysis \
         summary for this patient is:\n{}\n\
         \n\
         {}\n\
         \n\
         {}",
        core_summary,
        readings_and_profile_block(readings, catalog, profile),
        category_instruction
    )
}

pub fn core_analysis_schema() -> Value {
    let string_array = json!({ "type": "array", "items": { "type": "string" } });

    json!({
        "type": "object",
        "properties": {
            "overall_assessment": {
                "type": "object",
                "properties": {
                    "score": { "type": "number" },
                    "category": { "type": "string" },
                    "summary": { "type": "string" }
                },
                "required": ["score", "category", "summary"],
                "additionalProperties": false
            },
            "insights": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "biomarker": { "type": "string" },
                        "status": { "type": "string" },
                        "interpretation": { "type": "string" },
                        "related_systems": string_array
                    },
                    "required": ["biomarker", "status", "interpretation", "related_systems"],
                    "additionalProperties": false
                }
            },
            "root_causes": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "explanation": { "type": "string" },
                        "affected_biomarkers": string_array,
                        "confidence": { "type": ["number", "null"] }
                    },
                    "required": ["title", "explanation", "affected_biomarkers", "confidence"],
                    "additionalProperties": false
                }
            },
            "monitoring_plan": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "biomarker": { "type": "string" },
                        "retest_interval": { "type": "string" },
                        "target": { "type": ["string", "null"] }
                    },
                    "required": ["biomarker", "retest_interval", "target"],
                    "additionalProperties": false
                }
            },
            "personalization_factors": string_array,
            "evidence_summary": { "type": ["string", "null"] },
            "next_steps": string_array
        },
        "required": [
            "overall_assessment", "insights", "root_causes", "monitoring_plan",
            "personalization_factors", "evidence_summary", "next_steps"
        ],
        "additionalProperties": false
    })
}

/// Schema for one recommendation category: an object with a single array
/// property named after the category.
pub fn category_schema(category: &str) -> Value {
    let string_array = json!({ "type": "array", "items": { "type": "string" } });

    let items = match category {
        "supplements" => json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "dosage": { "type": "string" },
                "timing": { "type": ["string", "null"] },
                "rationale": { "type": "string" },
                "cautions": string_array
            },
            "required": ["name", "dosage", "timing", "rationale", "cautions"],
            "additionalProperties": false
        }),
        "diet" => json!({
            "type": "object",
            "properties": {
                "recommendation": { "type": "string" },
                "rationale": { "type": "string" },
                "foods_to_include": string_array,
                "foods_to_avoid": string_array
            },
            "required": ["recommendation", "rationale", "foods_to_include", "foods_to_avoid"],
            "additionalProperties": false
        }),
        "lifestyle" => json!({
            "type": "object",
            "properties": {
                "recommendation": { "type": "string" },
                "rationale": { "type": "string" },
                "priority": { "type": ["string", "null"] }
            },
            "required": ["recommendation", "rationale", "priority"],
            "additionalProperties": false
        }),
        "workout" => json!({
            "type": "object",
            "properties": {
                "activity": { "type": "string" },
                "frequency": { "type": "string" },
                "intensity": { "type": ["string", "null"] },
                "rationale": { "type": "string" }
            },
            "required": ["activity", "frequency", "intensity", "rationale"],
            "additionalProperties": false
        }),
        _ => json!({ "type": "object" }),
    };

    json!({
        "type": "object",
        "properties": {
            category: { "type": "array", "items": items }
        },
        "required": [category],
        "additionalProperties": false
    })
}
