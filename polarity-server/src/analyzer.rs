//! Analysis orchestration: detect the branch, run it, normalize the answer.

use crate::completion::CompletionGateway;
use crate::model::{AnalysisResult, Branch};
use crate::normalizer::normalize;
use crate::prompt::{comparison_prompt, detection_prompt, sentiment_prompt};
use polarity_common::{Error, Result};
use std::time::Instant;

/// Drives one request through at most two sequential backend calls.
pub struct Analyzer {
    gateway: CompletionGateway,
}

impl Analyzer {
    pub fn new(gateway: CompletionGateway) -> Self {
        Self { gateway }
    }

    /// Analyze `text`.
    ///
    /// Fails only for blank input or a backend failure. Model output that
    /// cannot be interpreted comes back as the error sentinel.
    pub async fn analyze(&self, text: &str) -> Result<AnalysisResult> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("Text cannot be empty".into()));
        }

        let start = Instant::now();
        let branch = self.detect_branch(text).await?;

        let prompt = match branch {
            Branch::Sentiment => sentiment_prompt(text),
            Branch::Comparison => comparison_prompt(text),
        };
        let raw = self
            .gateway
            .complete(&prompt)
            .await
            .map_err(|e| e.with_context(format!("{branch} analysis")))?;

        let result = normalize(&raw, branch);
        tracing::info!(
            branch = %branch,
            shape = %result.shape(),
            sentinel = result.is_error(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Analysis complete"
        );

        Ok(result)
    }

    /// Ask the backend whether `text` is a comparison.
    pub async fn detect_branch(&self, text: &str) -> Result<Branch> {
        let answer = self
            .gateway
            .complete(&detection_prompt(text))
            .await
            .map_err(|e| e.with_context("comparison detection"))?;

        let branch = if is_comparison_answer(&answer) {
            Branch::Comparison
        } else {
            Branch::Sentiment
        };
        tracing::debug!(answer = %answer.trim(), branch = %branch, "Branch detected");
        Ok(branch)
    }
}

/// Only an exact `yes` (ignoring case and surrounding whitespace) counts.
pub fn is_comparison_answer(answer: &str) -> bool {
    answer.trim().to_lowercase() == "yes"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Sentiment;
    use crate::normalizer::INVALID_JSON;
    use crate::provider::{ChatRequest, ChatResponse, Provider, ProviderError};
    use async_trait::async_trait;
    use polarity_common::LlmConfig;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use test_case::test_case;

    /// Replays canned answers in order and records every request.
    #[derive(Default)]
    struct ScriptedProvider {
        answers: Mutex<VecDeque<std::result::Result<String, u16>>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedProvider {
        fn new(answers: &[std::result::Result<&str, u16>]) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(
                    answers
                        .iter()
                        .map(|a| a.map(String::from))
                        .collect(),
                ),
                requests: Mutex::default(),
            })
        }

        fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn chat(&self, request: ChatRequest) -> std::result::Result<ChatResponse, ProviderError> {
            self.requests.lock().unwrap().push(request.clone());
            let next = self
                .answers
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected backend call");

            match next {
                Ok(content) => Ok(ChatResponse {
                    provider: "scripted".into(),
                    model: request.model,
                    content,
                    usage: Default::default(),
                    finish_reason: Some("end_turn".into()),
                    latency_ms: 0,
                }),
                Err(status) => Err(ProviderError {
                    provider: "scripted".into(),
                    model: request.model,
                    message: "API error: overloaded".into(),
                    status_code: Some(status),
                }),
            }
        }
    }

    fn analyzer(provider: Arc<ScriptedProvider>) -> Analyzer {
        Analyzer::new(CompletionGateway::new(provider, &LlmConfig::default()))
    }

    #[test_case("yes" => true ; "plain")]
    #[test_case("  YES\n" => true ; "padded upper case")]
    #[test_case("Yes" => true ; "capitalized")]
    #[test_case("yes." => false ; "trailing period")]
    #[test_case("Yes, it compares two phones" => false ; "sentence")]
    #[test_case("no" => false ; "no")]
    #[test_case("" => false ; "empty")]
    fn test_is_comparison_answer(answer: &str) -> bool {
        is_comparison_answer(answer)
    }

    #[tokio::test]
    async fn test_blank_text_is_rejected_without_backend_calls() {
        let provider = ScriptedProvider::new(&[]);
        let analyzer = analyzer(provider.clone());

        for text in ["", "   ", "\n\t"] {
            let err = analyzer.analyze(text).await.unwrap_err();
            assert!(err.is_invalid_input());
            assert_eq!(err.status_code(), 400);
        }
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_sentiment_branch() {
        let provider = ScriptedProvider::new(&[
            Ok("no"),
            Ok(r#"{"sentiment": "positive", "confidence": 0.95, "implications": [], "explanation": "contains 'love'"}"#),
        ]);
        let analyzer = analyzer(provider.clone());

        let result = analyzer.analyze("I absolutely love this product!").await.unwrap();
        let sentiment = result.sentiment().unwrap();
        assert_eq!(sentiment.sentiment, Sentiment::Positive);
        assert!(sentiment.confidence > 0.5);

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].system.is_none());
        assert!(requests[0].messages[0].content.contains("Answer with just 'yes' or 'no'."));
        assert!(requests[1]
            .system
            .as_deref()
            .unwrap()
            .contains("sentiment analysis expert"));
    }

    #[tokio::test]
    async fn test_comparison_branch() {
        let provider = ScriptedProvider::new(&[
            Ok(" Yes \n"),
            Ok(r#"```json
{"objects_being_compared": [{"name": "iPhone"}, {"name": "Samsung"}],
 "attributes": {"iPhone": {"explicit_attributes": {"speed": "faster", "price": "more expensive"}}}}
```"#),
        ]);
        let analyzer = analyzer(provider.clone());

        let result = analyzer
            .analyze("The new iPhone is faster but more expensive than the Samsung.")
            .await
            .unwrap();
        let comparison = result.comparison().unwrap();
        assert_eq!(comparison.object1, "iPhone");
        assert_eq!(comparison.object2, "Samsung");
        assert_eq!(comparison.attributes["price"]["Samsung"], "more expensive");

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1]
            .system
            .as_deref()
            .unwrap()
            .contains("objects_being_compared"));
    }

    #[tokio::test]
    async fn test_ambiguous_detection_answer_falls_back_to_sentiment() {
        let provider = ScriptedProvider::new(&[
            Ok("Yes, there is a comparison."),
            Ok(r#"{"sentiment": "neutral", "confidence": 0.7}"#),
        ]);
        let result = analyzer(provider.clone())
            .analyze("A is bigger than B")
            .await
            .unwrap();

        assert_eq!(result.sentiment().unwrap().sentiment, Sentiment::Neutral);
        assert!(provider.requests()[1]
            .system
            .as_deref()
            .unwrap()
            .contains("sentiment analysis expert"));
    }

    #[tokio::test]
    async fn test_malformed_output_becomes_sentinel() {
        let provider = ScriptedProvider::new(&[Ok("no"), Ok("I think it's positive")]);
        let result = analyzer(provider).analyze("nice weather").await.unwrap();

        assert!(result.is_error());
        let sentinel = result.sentiment().unwrap();
        assert_eq!(sentinel.confidence, 0.0);
        assert_eq!(sentinel.explanation, INVALID_JSON);
    }

    #[tokio::test]
    async fn test_detection_failure_stops_pipeline() {
        let provider = ScriptedProvider::new(&[Err(529)]);
        let err = analyzer(provider.clone())
            .analyze("This is the worst experience ever.")
            .await
            .unwrap_err();

        assert!(err.is_backend());
        assert_eq!(err.status_code(), 500);
        assert!(err.to_string().starts_with("comparison detection"));
        assert_eq!(provider.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_task_failure_is_not_retried() {
        let provider = ScriptedProvider::new(&[Ok("no"), Err(500)]);
        let err = analyzer(provider.clone())
            .analyze("This is the worst experience ever.")
            .await
            .unwrap_err();

        assert!(err.is_backend());
        assert!(err.to_string().contains("overloaded"));
        assert_eq!(provider.requests().len(), 2);
    }
}
