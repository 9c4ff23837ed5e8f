//! Remote FinBERT scorer over the Hugging Face inference API.
//! Label = argmax class, confidence = its probability, score = p(positive) - p(negative).

use anyhow::{anyhow, bail, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::model::{Sentiment, SentimentScore};
use crate::sentiment::SentimentScorer;

pub const DEFAULT_URL: &str = "https://api-inference.huggingface.co/models/ProsusAI/finbert";

#[derive(Debug, Clone, Deserialize)]
struct LabelProb {
    label: String,
    score: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceBody {
    Nested(Vec<Vec<LabelProb>>),
    Flat(Vec<LabelProb>),
}

pub struct FinbertApiScorer {
    http: Client,
    token: String,
    url: String,
}

impl FinbertApiScorer {
    pub fn new(http: Client, token: String) -> Self {
        Self {
            http,
            token,
            url: DEFAULT_URL.to_string(),
        }
    }
}

/// Turn an inference response into the scorer triple.
pub fn parse_inference(body: &Value) -> Result<SentimentScore> {
    let parsed: InferenceBody =
        serde_json::from_value(body.clone()).context("unexpected inference response shape")?;
    let probs = match parsed {
        InferenceBody::Nested(mut v) if !v.is_empty() => v.swap_remove(0),
        InferenceBody::Nested(_) => Vec::new(),
        InferenceBody::Flat(v) => v,
    };

    let mut best: Option<(Sentiment, f64)> = None;
    let (mut p_pos, mut p_neg) = (0.0f64, 0.0f64);
    for lp in probs {
        let label = match lp.label.to_ascii_lowercase().as_str() {
            "positive" => Sentiment::Positive,
            "negative" => Sentiment::Negative,
            "neutral" => Sentiment::Neutral,
            _ => continue,
        };
        match label {
            Sentiment::Positive => p_pos = lp.score,
            Sentiment::Negative => p_neg = lp.score,
            Sentiment::Neutral => {}
        }
        if best.map_or(true, |(_, p)| lp.score > p) {
            best = Some((label, lp.score));
        }
    }

    let (label, confidence) = best.ok_or_else(|| anyhow!("inference response had no known labels"))?;
    Ok(SentimentScore::new(label, confidence, p_pos - p_neg))
}

#[async_trait::async_trait]
impl SentimentScorer for FinbertApiScorer {
    async fn score(&self, text: &str) -> Result<SentimentScore> {
        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&json!({ "inputs": text }))
            .send()
            .await
            .map_err(|e| anyhow!("finbert request failed: {}", e.without_url()))?;

        let status = resp.status();
        if !status.is_success() {
            bail!("finbert api returned {status}");
        }
        let body: Value = resp.json().await.context("decoding finbert response")?;
        parse_inference(&body)
    }

    fn name(&self) -> &'static str {
        "finbert_api"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_response_maps_to_argmax() {
        let body = json!([[
            {"label": "positive", "score": 0.7},
            {"label": "neutral", "score": 0.2},
            {"label": "negative", "score": 0.1}
        ]]);
        let s = parse_inference(&body).unwrap();
        assert_eq!(s.sentiment, Sentiment::Positive);
        assert!((s.confidence - 0.7).abs() < 1e-9);
        assert!((s.sentiment_score - 0.6).abs() < 1e-9);
    }

    #[test]
    fn flat_response_is_accepted() {
        let body = json!([
            {"label": "Negative", "score": 0.55},
            {"label": "Neutral", "score": 0.40},
            {"label": "Positive", "score": 0.05}
        ]);
        let s = parse_inference(&body).unwrap();
        assert_eq!(s.sentiment, Sentiment::Negative);
        assert!((s.sentiment_score + 0.5).abs() < 1e-9);
    }

    #[test]
    fn error_payload_is_an_error() {
        let body = json!({"error": "Model is currently loading"});
        assert!(parse_inference(&body).is_err());
        assert!(parse_inference(&json!([[]])).is_err());
    }
}
