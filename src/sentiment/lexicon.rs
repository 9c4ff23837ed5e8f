use anyhow::Result;
use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::model::{Sentiment, SentimentScore};
use crate::sentiment::SentimentScorer;

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("lexicon.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).expect("valid sentiment lexicon")
});

/// Squashing constant for `raw / sqrt(raw^2 + ALPHA)`.
const ALPHA: f64 = 4.0;
/// Scores within this band of zero are labelled neutral.
const NEUTRAL_BAND: f64 = 0.05;

/// Local, deterministic headline scorer: finance word lexicon with simple negation.
#[derive(Debug, Clone, Default)]
pub struct LexiconScorer;

impl LexiconScorer {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn word_score(&self, w: &str) -> i32 {
        *LEXICON.get(w).unwrap_or(&0)
    }

    /// Returns (raw score, lexicon hits).
    /// A negator within the previous 1..=3 tokens flips the word's sign.
    pub fn score_text(&self, text: &str) -> (i32, usize) {
        let tokens: Vec<String> = tokenize(text).collect();
        let mut score: i32 = 0;
        let mut hits = 0usize;

        for i in 0..tokens.len() {
            let base = self.word_score(tokens[i].as_str());
            if base == 0 {
                continue;
            }
            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            score += if negated { -base } else { base };
            hits += 1;
        }

        (score, hits)
    }

    /// Maps the raw lexicon score into the scorer triple.
    pub fn triple(&self, text: &str) -> SentimentScore {
        let (raw, hits) = self.score_text(text);
        let x = raw as f64;
        let s = x / (x * x + ALPHA).sqrt();

        let label = if s >= NEUTRAL_BAND {
            Sentiment::Positive
        } else if s <= -NEUTRAL_BAND {
            Sentiment::Negative
        } else {
            Sentiment::Neutral
        };
        let confidence = match (hits, label) {
            (0, _) => 0.5,
            (_, Sentiment::Neutral) => 1.0 - s.abs(),
            _ => s.abs(),
        };
        SentimentScore::new(label, confidence, s)
    }
}

#[async_trait::async_trait]
impl SentimentScorer for LexiconScorer {
    async fn score(&self, text: &str) -> Result<SentimentScore> {
        Ok(self.triple(text))
    }

    fn name(&self) -> &'static str {
        "lexicon"
    }
}

/// Alphanumeric, lower-case tokens.
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

// Apostrophes split tokens, so "isn't" arrives as "isn" + "t".
fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "cannot"
            | "without"
            | "hardly"
            | "isn"
            | "wasn"
            | "aren"
            | "doesn"
            | "didn"
            | "won"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexicon_loads() {
        assert!(LEXICON.len() > 50);
    }

    #[test]
    fn polar_headlines_get_polar_labels() {
        let s = LexiconScorer::new();
        let up = s.triple("Apple shares surge on record profit");
        assert_eq!(up.sentiment, Sentiment::Positive);
        assert!(up.sentiment_score > 0.5);

        let down = s.triple("Tesla stock plunges after weak deliveries");
        assert_eq!(down.sentiment, Sentiment::Negative);
        assert!(down.sentiment_score < -0.5);
    }

    #[test]
    fn negation_flips_sign() {
        let s = LexiconScorer::new();
        let (raw, hits) = s.score_text("Analysts say this is not bad news");
        assert_eq!(hits, 1);
        assert!(raw > 0);
    }

    #[test]
    fn no_hits_is_neutral_with_half_confidence() {
        let t = LexiconScorer::new().triple("Quarterly filing published");
        assert_eq!(t.sentiment, Sentiment::Neutral);
        assert_eq!(t.sentiment_score, 0.0);
        assert_eq!(t.confidence, 0.5);
    }

    #[test]
    fn triple_stays_in_range() {
        let t = LexiconScorer::new().triple("soar soar soar surge surge rally rally jump");
        assert!(t.sentiment_score <= 1.0 && t.sentiment_score > 0.9);
        assert!((0.0..=1.0).contains(&t.confidence));
    }
}
