// Ensemble Detector
// Runs both classifiers, blends their AI probabilities and applies the
// readability / token-probability adjustment factors.

use crate::models::{ClassLabel, DetectionResult, Label, ModelRole, ModelScores, TextStatistics};
use crate::services::config_store::{AppConfig, ModelConfig};
use crate::services::providers::{Classifier, ProviderError};
use crate::services::security::{InputSanitizer, RateLimiter, SecurityError};
use crate::services::text_processor::{compute_text_statistics, estimate_tokens, truncate_to_tokens};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

const PRIMARY_WEIGHT: f64 = 0.7;
const SECONDARY_WEIGHT: f64 = 0.3;

const EASY_READABILITY: f64 = 60.0;
const HARD_READABILITY: f64 = 30.0;
const HIGH_TOKEN_PROBABILITY: f64 = 1.0 / 60.0;
const LOW_TOKEN_PROBABILITY: f64 = 1.0 / 200.0;
const BOOST: f64 = 1.10;
const DAMPEN: f64 = 0.90;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("Security violation: {0}")]
    Security(#[from] SecurityError),
    #[error("Classification pipeline failed: {0}")]
    Pipeline(#[from] ProviderError),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to extract text from {path}: {message}")]
    Extraction { path: String, message: String },
}

/// AI probability from a detector head (`Real`/`Fake` or `LABEL_0`/`LABEL_1`)
pub fn primary_ai_probability(labels: &[ClassLabel]) -> Option<f64> {
    let find = |names: &[&str]| {
        labels
            .iter()
            .find(|l| names.iter().any(|n| l.label.eq_ignore_ascii_case(n)))
            .map(|l| l.score)
    };
    find(&["Fake", "LABEL_1", "AI"])
        .or_else(|| find(&["Real", "LABEL_0", "Human"]).map(|s| 1.0 - s))
        .map(|p| p.clamp(0.0, 1.0))
}

/// AI probability from a human-likeness ranker: `LABEL_0` scores how human a
/// text reads, so the AI side is its complement
pub fn secondary_ai_probability(labels: &[ClassLabel]) -> Option<f64> {
    let find = |name: &str| labels.iter().find(|l| l.label.eq_ignore_ascii_case(name)).map(|l| l.score);
    find("LABEL_0")
        .map(|s| 1.0 - s)
        .or_else(|| find("LABEL_1"))
        .map(|p| p.clamp(0.0, 1.0))
}

/// Apply the fixed multiplicative factors; returns the adjusted probability
/// and a note per applied factor
pub fn apply_adjustments(probability: f64, stats: &TextStatistics) -> (f64, Vec<String>) {
    let mut p = probability;
    let mut notes = Vec::new();

    if stats.readability > EASY_READABILITY {
        p *= BOOST;
        notes.push(format!("readability={:.1} (easy) x{:.2}", stats.readability, BOOST));
    } else if stats.readability < HARD_READABILITY {
        p *= DAMPEN;
        notes.push(format!("readability={:.1} (hard) x{:.2}", stats.readability, DAMPEN));
    }

    if stats.avg_token_probability > HIGH_TOKEN_PROBABILITY {
        p *= BOOST;
        notes.push(format!("avg_token_probability={:.4} (predictable) x{:.2}", stats.avg_token_probability, BOOST));
    } else if stats.avg_token_probability < LOW_TOKEN_PROBABILITY {
        p *= DAMPEN;
        notes.push(format!("avg_token_probability={:.4} (surprising) x{:.2}", stats.avg_token_probability, DAMPEN));
    }

    (p.clamp(0.0, 1.0), notes)
}

pub struct Detector {
    config: AppConfig,
    classifier: Arc<dyn Classifier>,
    limiter: RateLimiter,
    sanitizer: InputSanitizer,
}

impl Detector {
    pub fn new(config: AppConfig, classifier: Arc<dyn Classifier>) -> Self {
        let limiter = RateLimiter::new(config.security.rate_limit);
        Self {
            config,
            classifier,
            limiter,
            sanitizer: InputSanitizer,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    /// Classify `text` as AI-generated or human-written
    pub async fn detect(&self, text: &str) -> Result<DetectionResult, DetectorError> {
        if text.trim().is_empty() {
            return Err(DetectorError::InvalidInput("Input text cannot be empty".to_string()));
        }

        self.limiter.check()?;
        let text = self.sanitizer.sanitize(text)?;
        let text = text.trim();

        let min = self.config.analysis.min_text_length;
        let len = text.chars().count();
        if len < min {
            return Err(DetectorError::InvalidInput(format!(
                "Input text too short: {} characters (minimum {})",
                len, min
            )));
        }
        self.sanitizer.check_length(text, self.config.security.max_text_length)?;

        let request_id = uuid::Uuid::new_v4().to_string();
        let start = Instant::now();
        let statistics = compute_text_statistics(text);

        let primary_input = prepare_input(text, &self.config.models.roberta)?;
        let secondary_input = prepare_input(text, &self.config.models.gpt2)?;

        let (primary, secondary) = tokio::join!(
            self.classifier.classify(ModelRole::Primary, &self.config.models.roberta, primary_input),
            self.classifier.classify(ModelRole::Secondary, &self.config.models.gpt2, secondary_input),
        );

        let primary = primary_ai_probability(&primary?).ok_or(ProviderError::MissingContent)?;

        let mut adjustments = Vec::new();
        let secondary = match secondary {
            Ok(labels) => secondary_ai_probability(&labels),
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "detect.secondary_failed");
                None
            }
        };

        let blended = match secondary {
            Some(s) => PRIMARY_WEIGHT * primary + SECONDARY_WEIGHT * s,
            None => {
                adjustments.push("secondary model unavailable; primary only".to_string());
                primary
            }
        };

        let (ai_probability, notes) = apply_adjustments(blended, &statistics);
        adjustments.extend(notes);

        let (label, confidence) = if ai_probability >= 0.5 {
            (Label::Ai, ai_probability)
        } else {
            (Label::Human, 1.0 - ai_probability)
        };
        let uncertain = confidence < self.config.analysis.confidence_threshold;
        let latency_ms = start.elapsed().as_millis() as i64;

        info!(
            request_id = %request_id,
            backend = self.classifier.name(),
            label = %label,
            confidence,
            uncertain,
            chars = len,
            latency_ms,
            "detect.completed"
        );

        Ok(DetectionResult {
            request_id,
            label,
            confidence,
            ai_probability,
            uncertain,
            scores: ModelScores { primary, secondary },
            statistics,
            adjustments,
            latency_ms,
        })
    }
}

/// Enforce a model's `max_length`: truncate, or reject when truncation is off
fn prepare_input<'a>(text: &'a str, model: &ModelConfig) -> Result<&'a str, DetectorError> {
    if estimate_tokens(text) <= model.max_length {
        return Ok(text);
    }
    if model.truncation {
        Ok(truncate_to_tokens(text, model.max_length))
    } else {
        Err(DetectorError::InvalidInput(format!(
            "Input exceeds {} tokens for model {} and truncation is disabled",
            model.max_length, model.model_name
        )))
    }
}
