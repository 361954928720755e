//! Request and result types for text analysis.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The analysis the caller says it wants back.
///
/// This selects nothing inside the pipeline: routing is decided by the
/// backend's comparison-detection answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    Sentiment,
    Comparison,
}

impl FromStr for AnalysisType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sentiment" => Ok(Self::Sentiment),
            "comparison" => Ok(Self::Comparison),
            other => Err(format!("Invalid analysis type: {other}")),
        }
    }
}

/// Which analysis path fired for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    Sentiment,
    Comparison,
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sentiment => write!(f, "sentiment"),
            Self::Comparison => write!(f, "comparison"),
        }
    }
}

impl From<AnalysisType> for Branch {
    fn from(kind: AnalysisType) -> Self {
        match kind {
            AnalysisType::Sentiment => Self::Sentiment,
            AnalysisType::Comparison => Self::Comparison,
        }
    }
}

/// Sentiment label.
///
/// The backend is untrusted, so labels outside the known set are kept
/// verbatim in `Other` rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
    Error,
    Other(String),
}

impl Sentiment {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
            Self::Error => "error",
            Self::Other(label) => label,
        }
    }
}

impl From<String> for Sentiment {
    fn from(label: String) -> Self {
        match label.as_str() {
            "positive" => Self::Positive,
            "negative" => Self::Negative,
            "neutral" => Self::Neutral,
            "error" => Self::Error,
            _ => Self::Other(label),
        }
    }
}

impl From<Sentiment> for String {
    fn from(sentiment: Sentiment) -> Self {
        match sentiment {
            Sentiment::Other(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the sentiment path, also used for the error sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub sentiment: Sentiment,
    /// Reported by the backend; not range-checked.
    pub confidence: f64,
    #[serde(default)]
    pub implications: Vec<String>,
    #[serde(default)]
    pub explanation: String,
}

impl SentimentResult {
    /// The canonical result for any failure to interpret model output.
    pub fn sentinel(explanation: impl Into<String>) -> Self {
        Self {
            sentiment: Sentiment::Error,
            confidence: 0.0,
            implications: Vec::new(),
            explanation: explanation.into(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.sentiment == Sentiment::Error
    }
}

/// Attribute name → object name → value.
pub type AttributeTable = BTreeMap<String, BTreeMap<String, Value>>;

/// Entities compared in the text and their aligned attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub object1: String,
    pub object2: String,
    pub attributes: AttributeTable,
}

/// Wrapper that places a comparison under the `comparison` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonAnalysis {
    pub comparison: ComparisonResult,
}

/// What the caller receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisResult {
    Sentiment(SentimentResult),
    Comparison(ComparisonAnalysis),
}

impl AnalysisResult {
    /// The payload shape, which is not always the branch that fired: a
    /// comparison that fails to normalize comes back as a sentiment sentinel.
    pub fn shape(&self) -> Branch {
        match self {
            Self::Sentiment(_) => Branch::Sentiment,
            Self::Comparison(_) => Branch::Comparison,
        }
    }

    pub fn sentiment(&self) -> Option<&SentimentResult> {
        match self {
            Self::Sentiment(result) => Some(result),
            Self::Comparison(_) => None,
        }
    }

    pub fn comparison(&self) -> Option<&ComparisonResult> {
        match self {
            Self::Sentiment(_) => None,
            Self::Comparison(analysis) => Some(&analysis.comparison),
        }
    }

    /// Whether this is the normalization-failure sentinel.
    pub fn is_error(&self) -> bool {
        self.sentiment().is_some_and(SentimentResult::is_sentinel)
    }
}

impl From<SentimentResult> for AnalysisResult {
    fn from(result: SentimentResult) -> Self {
        Self::Sentiment(result)
    }
}

impl From<ComparisonResult> for AnalysisResult {
    fn from(comparison: ComparisonResult) -> Self {
        Self::Comparison(ComparisonAnalysis { comparison })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_analysis_type_parsing() {
        assert_eq!("sentiment".parse::<AnalysisType>(), Ok(AnalysisType::Sentiment));
        assert_eq!("comparison".parse::<AnalysisType>(), Ok(AnalysisType::Comparison));
        assert!("Sentiment".parse::<AnalysisType>().is_err());
        assert!("summary".parse::<AnalysisType>().is_err());
    }

    #[test]
    fn test_unknown_sentiment_label_is_preserved() {
        let sentiment: Sentiment = serde_json::from_value(json!("mixed")).unwrap();
        assert_eq!(sentiment, Sentiment::Other("mixed".into()));
        assert_eq!(serde_json::to_value(&sentiment).unwrap(), json!("mixed"));
    }

    #[test]
    fn test_sentinel_serialization() {
        let value = serde_json::to_value(AnalysisResult::from(SentimentResult::sentinel(
            "Invalid JSON response from LLM",
        )))
        .unwrap();

        assert_eq!(value["sentiment"], "error");
        assert_eq!(value["confidence"], 0.0);
        assert_eq!(value["explanation"], "Invalid JSON response from LLM");
        assert!(value.get("comparison").is_none());
    }

    #[test]
    fn test_comparison_result_has_no_sentiment_fields() {
        let mut attributes = AttributeTable::new();
        attributes.insert(
            "speed".into(),
            BTreeMap::from([
                ("iPhone".to_string(), json!("faster")),
                ("Samsung".to_string(), json!("faster")),
            ]),
        );
        let result = AnalysisResult::from(ComparisonResult {
            object1: "iPhone".into(),
            object2: "Samsung".into(),
            attributes,
        });

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["comparison"]["object1"], "iPhone");
        assert_eq!(value["comparison"]["attributes"]["speed"]["Samsung"], "faster");
        assert!(value.get("sentiment").is_none());
        assert!(value.get("confidence").is_none());
        assert_eq!(result.shape(), Branch::Comparison);
        assert!(!result.is_error());
    }

    #[test]
    fn test_untagged_deserialization_picks_shape() {
        let sentiment: AnalysisResult = serde_json::from_value(json!({
            "sentiment": "positive",
            "confidence": 0.9,
            "explanation": "uses 'love'"
        }))
        .unwrap();
        assert_eq!(sentiment.shape(), Branch::Sentiment);
        assert!(sentiment.sentiment().unwrap().implications.is_empty());

        let comparison: AnalysisResult = serde_json::from_value(json!({
            "comparison": {"object1": "A", "object2": "B", "attributes": {}}
        }))
        .unwrap();
        assert_eq!(comparison.comparison().unwrap().object2, "B");
    }
}
