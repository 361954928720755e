//! Normalization of raw model output into the caller-facing schema.
//!
//! Model output is untrusted. Every failure to interpret it is absorbed
//! into [`SentimentResult::sentinel`], so `normalize` never fails.

use crate::model::{
    AnalysisResult, AttributeTable, Branch, ComparisonResult, Sentiment, SentimentResult,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Explanation used when the output is not valid JSON.
pub const INVALID_JSON: &str = "Invalid JSON response from LLM";

/// Explanation used when a sentiment payload lacks its required keys.
pub const MISSING_KEYS: &str = "Failed to parse LLM response";

/// Key that marks a payload as comparison-shaped.
pub const COMPARISON_KEY: &str = "objects_being_compared";

/// Why a decoded payload could not be mapped onto a result.
#[derive(Debug, Error, PartialEq)]
pub enum ShapeError {
    #[error("response did not contain 'sentiment' and 'confidence'")]
    MissingKeys,

    #[error("confidence is not a number: {0}")]
    NonNumericConfidence(String),

    #[error("'objects_being_compared' is not a list")]
    ObjectsNotAList,

    #[error("expected at least two objects being compared, found {0}")]
    TooFewObjects(usize),

    #[error("object {0} is not a mapping")]
    ObjectNotAMapping(usize),

    #[error("missing 'attributes'")]
    MissingAttributes,

    #[error("'{0}' is not a mapping")]
    NotAMapping(String),
}

/// Remove a leading code fence (tagged `json` or bare) and a trailing fence.
///
/// Only the outermost markers are touched; fences elsewhere are left alone.
pub fn strip_fence(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }

    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }

    text.trim()
}

/// Turn raw model output into an [`AnalysisResult`].
///
/// The payload decides the shape: `branch` is the path that produced the
/// output and is only used for diagnostics.
pub fn normalize(raw: &str, branch: Branch) -> AnalysisResult {
    let body = strip_fence(raw);

    let parsed: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(%branch, error = %e, response = %raw, "Could not decode JSON from LLM response");
            return SentimentResult::sentinel(INVALID_JSON).into();
        }
    };

    if parsed.get(COMPARISON_KEY).is_some() {
        if branch != Branch::Comparison {
            tracing::debug!(%branch, "Comparison-shaped payload on a non-comparison branch");
        }

        return match extract_comparison(&parsed) {
            Ok(comparison) => comparison.into(),
            Err(e) => {
                tracing::warn!(%branch, error = %e, response = %parsed, "Comparison parsing error");
                SentimentResult::sentinel(format!("Comparison parsing error: {e}")).into()
            }
        };
    }

    match extract_sentiment(&parsed) {
        Ok(result) => result.into(),
        Err(ShapeError::MissingKeys) => {
            tracing::warn!(%branch, response = %raw, "LLM response did not contain expected keys");
            SentimentResult::sentinel(MISSING_KEYS).into()
        }
        Err(e) => {
            tracing::warn!(%branch, error = %e, response = %raw, "Sentiment parsing error");
            SentimentResult::sentinel(format!("{MISSING_KEYS}: {e}")).into()
        }
    }
}

/// Map a sentiment payload. Values are passed through without range checks.
pub fn extract_sentiment(parsed: &Value) -> Result<SentimentResult, ShapeError> {
    let obj = parsed.as_object().ok_or(ShapeError::MissingKeys)?;

    let (Some(sentiment), Some(confidence)) = (obj.get("sentiment"), obj.get("confidence")) else {
        return Err(ShapeError::MissingKeys);
    };

    let sentiment = match sentiment {
        Value::String(label) => Sentiment::from(label.clone()),
        other => Sentiment::Other(other.to_string()),
    };

    let confidence = confidence
        .as_f64()
        .or_else(|| confidence.as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| ShapeError::NonNumericConfidence(confidence.to_string()))?;

    let implications = match obj.get("implications") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        Some(Value::String(single)) if !single.is_empty() => vec![single.clone()],
        _ => Vec::new(),
    };

    let explanation = obj
        .get("explanation")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(SentimentResult {
        sentiment,
        confidence,
        implications,
        explanation,
    })
}

/// Map a comparison payload.
///
/// The attribute table is built from the first object's
/// `explicit_attributes`, and each value is recorded under both object
/// names. The schema the model is asked for has no second source of values.
pub fn extract_comparison(parsed: &Value) -> Result<ComparisonResult, ShapeError> {
    let objects = parsed
        .get(COMPARISON_KEY)
        .and_then(Value::as_array)
        .ok_or(ShapeError::ObjectsNotAList)?;

    if objects.len() < 2 {
        return Err(ShapeError::TooFewObjects(objects.len()));
    }

    let object1 = object_name(&objects[0], 0)?;
    let object2 = object_name(&objects[1], 1)?;

    let attributes = as_mapping(
        parsed.get("attributes").ok_or(ShapeError::MissingAttributes)?,
        "attributes",
    )?;

    let explicit = match attributes.get(&object1) {
        None => None,
        Some(entry) => as_mapping(entry, &object1)?
            .get("explicit_attributes")
            .map(|v| as_mapping(v, "explicit_attributes"))
            .transpose()?,
    };

    let mut table = AttributeTable::new();
    for (attribute, value) in explicit.into_iter().flatten() {
        let mut per_object = BTreeMap::new();
        per_object.insert(object1.clone(), value.clone());
        per_object.insert(object2.clone(), value.clone());
        table.insert(attribute.clone(), per_object);
    }

    Ok(ComparisonResult {
        object1,
        object2,
        attributes: table,
    })
}

fn object_name(entry: &Value, index: usize) -> Result<String, ShapeError> {
    let obj = entry
        .as_object()
        .ok_or(ShapeError::ObjectNotAMapping(index))?;

    Ok(obj
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string())
}

fn as_mapping<'a>(value: &'a Value, field: &str) -> Result<&'a Map<String, Value>, ShapeError> {
    value
        .as_object()
        .ok_or_else(|| ShapeError::NotAMapping(field.to_string()))
}
