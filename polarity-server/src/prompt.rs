//! Prompt construction for the three backend tasks.
//!
//! Prompts are plain data. Nothing here talks to the backend.

/// Words that force a `negative` classification.
pub const NEGATIVE_KEYWORDS: &[&str] = &[
    "worst",
    "terrible",
    "hate",
    "awful",
    "bad",
    "poor",
    "disappointing",
];

/// Words that force a `positive` classification when no negative word is present.
pub const POSITIVE_KEYWORDS: &[&str] = &[
    "love",
    "great",
    "excellent",
    "amazing",
    "wonderful",
    "best",
];

/// A prompt ready to send to the completion backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Optional system instruction
    pub system: Option<String>,
    /// The user message
    pub user: String,
}

/// Ask whether the text compares two or more distinct entities.
pub fn detection_prompt(text: &str) -> Prompt {
    Prompt {
        system: None,
        user: format!(
            r#"Does the following text contain a direct comparison between two or more distinct objects/entities?
Examples of comparisons:
- "The iPhone is faster than the Samsung"
- "Product A has better features than Product B"
- "Company X's revenue is higher than Company Y's"

Examples of non-comparisons:
- "The food was great but the service was terrible" (mixed sentiment)
- "I like both options" (general statement)
- "The movie was interesting, to say the least" (implication)

Text: {text}
Answer with just 'yes' or 'no'."#
        ),
    }
}

/// Classify sentiment with the deterministic keyword rule.
pub fn sentiment_prompt(text: &str) -> Prompt {
    let negative = quoted(NEGATIVE_KEYWORDS);
    let positive = quoted(POSITIVE_KEYWORDS);

    Prompt {
        system: Some(format!(
            r#"You are a sentiment analysis expert. Your task is to classify text as positive, negative, or neutral.

Rules for classification:
1. NEGATIVE: Text containing words like {negative}
2. POSITIVE: Text containing words like {positive}
3. NEUTRAL: Text that is factual or contains mixed sentiments

You must strictly follow these rules. If the text contains any negative words, it MUST be classified as negative, even if it also contains positive words or your overall impression differs.

Return a JSON object with these fields:
- sentiment: "positive", "negative", or "neutral"
- confidence: number between 0 and 1
- implications: list of any hidden meanings
- explanation: brief explanation of your classification"#
        )),
        user: format!("Analyze this text: {text}"),
    }
}

/// Extract the compared entities and their attributes.
pub fn comparison_prompt(text: &str) -> Prompt {
    Prompt {
        system: Some(
            r#"You are an expert at analyzing comparisons between objects in text.

When analyzing text, identify:
1. The objects being compared
2. Their respective attributes
3. The comparison relationship
4. The sentiment towards each object

Interpolate attributes that can reasonably be inferred even when the text does not state them explicitly.

Return a JSON object with this structure:
{
    "objects_being_compared": [
        {"name": "object1_name"},
        {"name": "object2_name"}
    ],
    "attributes": {
        "object1_name": {
            "explicit_attributes": {
                "attribute1": "value1",
                "attribute2": "value2"
            }
        }
    }
}"#
            .to_string(),
        ),
        user: format!("Analyze this text: {text}"),
    }
}

fn quoted(words: &[&str]) -> String {
    words
        .iter()
        .map(|w| format!("'{w}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "The new iPhone is faster but more expensive than the Samsung.";

    #[test]
    fn test_detection_prompt_embeds_text_and_examples() {
        let prompt = detection_prompt(TEXT);
        assert!(prompt.system.is_none());
        assert!(prompt.user.contains(&format!("Text: {TEXT}")));
        assert!(prompt.user.contains("The iPhone is faster than the Samsung"));
        assert!(prompt.user.contains("(mixed sentiment)"));
        assert!(prompt.user.ends_with("Answer with just 'yes' or 'no'."));
    }

    #[test]
    fn test_sentiment_prompt_lists_every_keyword() {
        let prompt = sentiment_prompt("I absolutely love this product!");
        let system = prompt.system.unwrap();
        for word in NEGATIVE_KEYWORDS.iter().chain(POSITIVE_KEYWORDS) {
            assert!(system.contains(&format!("'{word}'")), "missing {word}");
        }
        assert!(system.contains("MUST be classified as negative"));
        assert!(system.contains("implications"));
        assert_eq!(prompt.user, "Analyze this text: I absolutely love this product!");
    }

    #[test]
    fn test_comparison_prompt_describes_schema() {
        let prompt = comparison_prompt(TEXT);
        let system = prompt.system.unwrap();
        assert!(system.contains("objects_being_compared"));
        assert!(system.contains("explicit_attributes"));
        assert!(system.contains("Interpolate"));
        assert!(prompt.user.ends_with(TEXT));
    }

    #[test]
    fn test_prompts_keep_braces_in_text() {
        let prompt = sentiment_prompt("{\"sentiment\": \"positive\"}");
        assert!(prompt.user.contains("{\"sentiment\": \"positive\"}"));
    }
}
