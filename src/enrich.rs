use serde::{Deserialize, Serialize};

/// Result of an enrichment call that can degrade instead of fail.
///
/// Upstream translation/sentiment collaborators are best-effort: rather than
/// swallowing their errors, each call reports whether the value is genuine or
/// a substituted fallback, and why, so tests and diagnostics can assert on the
/// reason instead of relying on log side effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Resolved<T> {
    Ok(T),
    Fallback { value: T, reason: FallbackReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FallbackReason {
    EmptyInput,
    ServiceUnavailable,
    ParseFailure,
}

impl<T> Resolved<T> {
    pub fn into_value(self) -> T {
        match self {
            Resolved::Ok(v) => v,
            Resolved::Fallback { value, .. } => value,
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Resolved::Ok(v) => v,
            Resolved::Fallback { value, .. } => value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Resolved::Fallback { .. })
    }
}

/// Sentiment label attached to every cleaned review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn label(&self) -> &'static str {
        match self {
            Sentiment::Positive => "Positive",
            Sentiment::Neutral => "Neutral",
            Sentiment::Negative => "Negative",
        }
    }

    /// Deterministic rating backfill for reviews that carry no score.
    pub fn default_rating(label: &str) -> i64 {
        match label.to_lowercase().as_str() {
            "positive" => 9,
            "neutral" => 6,
            "negative" => 3,
            _ => 5,
        }
    }
}

/// Text translation collaborator, consumed as a pure `text -> text` call.
pub trait Translator: Send + Sync {
    fn translate(&self, text: &str) -> Resolved<String>;
}

/// Sentiment classification collaborator, a pure `text -> label` call.
pub trait SentimentClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Resolved<Sentiment>;
}

/// Identity translator used when no translation service is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughTranslator;

impl Translator for PassthroughTranslator {
    fn translate(&self, text: &str) -> Resolved<String> {
        if text.trim().is_empty() {
            return Resolved::Fallback {
                value: "N/A".to_string(),
                reason: FallbackReason::EmptyInput,
            };
        }
        Resolved::Ok(text.to_string())
    }
}

const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "excellent", "amazing", "wonderful", "perfect", "clean", "friendly",
    "helpful", "beautiful", "comfortable", "lovely", "nice", "best", "recommend", "delicious",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bad", "poor", "terrible", "awful", "dirty", "rude", "worst", "horrible", "broken",
    "noisy", "disappointing", "uncomfortable", "smell", "never", "avoid", "overpriced",
];

/// Word-polarity classifier mirroring the upstream polarity thresholds:
/// scores above +0.1 are positive, below -0.1 negative, otherwise neutral.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexiconClassifier;

impl SentimentClassifier for LexiconClassifier {
    fn classify(&self, text: &str) -> Resolved<Sentiment> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Resolved::Fallback {
                value: Sentiment::Neutral,
                reason: FallbackReason::EmptyInput,
            };
        }
        let lower = trimmed.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        if words.is_empty() {
            return Resolved::Fallback {
                value: Sentiment::Neutral,
                reason: FallbackReason::ParseFailure,
            };
        }
        let pos = words.iter().filter(|w| POSITIVE_WORDS.contains(w)).count() as f64;
        let neg = words.iter().filter(|w| NEGATIVE_WORDS.contains(w)).count() as f64;
        let polarity = (pos - neg) / words.len() as f64;
        let label = if polarity > 0.1 {
            Sentiment::Positive
        } else if polarity < -0.1 {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        };
        Resolved::Ok(label)
    }
}
