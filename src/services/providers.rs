// Classifier Providers
// Hosted text-classification pipelines plus an offline stylometric fallback

use crate::models::{ClassLabel, ModelRole};
use crate::services::config_store::{AppConfig, InferenceBackend, ModelConfig};
use crate::services::detection::stylometric::{score_human_likeness, score_ai_probability};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Classifier returned no labels")]
    MissingContent,
    #[error("JSON parse error: {0}")]
    JsonError(String),
}

/// A text-classification pipeline returning `{label, score}` pairs
#[async_trait]
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    async fn classify(
        &self,
        role: ModelRole,
        model: &ModelConfig,
        text: &str,
    ) -> Result<Vec<ClassLabel>, ProviderError>;
}

/// Build the classifier selected by `inference.backend`
pub fn build_classifier(config: &AppConfig) -> Result<Arc<dyn Classifier>, ProviderError> {
    match config.inference.backend {
        InferenceBackend::Remote => Ok(Arc::new(HuggingFaceClassifier::from_config(config)?)),
        InferenceBackend::Local => Ok(Arc::new(LocalClassifier)),
    }
}

// ============ Hosted inference ============

pub struct HuggingFaceClassifier {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl HuggingFaceClassifier {
    pub fn new(base_url: &str, api_token: Option<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        let base_url = env::var("AI_DETECTOR_INFERENCE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| config.inference.base_url.clone());
        Self::new(
            &base_url,
            get_api_token(config),
            Duration::from_secs(config.inference.timeout_secs),
        )
    }

    fn model_url(&self, model_name: &str) -> String {
        format!("{}/{}", self.base_url, model_name)
    }
}

#[async_trait]
impl Classifier for HuggingFaceClassifier {
    fn name(&self) -> &str {
        "huggingface"
    }

    async fn classify(
        &self,
        role: ModelRole,
        model: &ModelConfig,
        text: &str,
    ) -> Result<Vec<ClassLabel>, ProviderError> {
        let request = serde_json::json!({
            "inputs": text,
            "options": { "wait_for_model": true }
        });

        let start = Instant::now();

        let mut builder = self
            .client
            .post(self.model_url(&model.model_name))
            .header("Content-Type", "application/json")
            .json(&request);
        if let Some(token) = &self.api_token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }

        let response = builder.send().await?;
        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        let labels = parse_classification(&data)?;
        debug!(
            role = %role,
            model = %model.model_name,
            latency_ms,
            labels = labels.len(),
            "classifier.remote_response"
        );
        Ok(labels)
    }
}

/// Accepts `[[{label, score}, ..]]`, `[{label, score}, ..]` or `{"error": ..}`
pub fn parse_classification(data: &Value) -> Result<Vec<ClassLabel>, ProviderError> {
    if let Some(err) = data.get("error").and_then(Value::as_str) {
        return Err(ProviderError::ApiError {
            status: 200,
            message: err.to_string(),
        });
    }

    let items = match data.as_array() {
        Some(outer) => match outer.first() {
            Some(Value::Array(inner)) => inner,
            _ => outer,
        },
        None => return Err(ProviderError::JsonError(format!("unexpected response: {}", data))),
    };

    let labels: Vec<ClassLabel> = items
        .iter()
        .map(|item| {
            serde_json::from_value::<ClassLabel>(item.clone())
                .map_err(|e| ProviderError::JsonError(e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if labels.is_empty() {
        return Err(ProviderError::MissingContent);
    }
    Ok(labels)
}

/// Get API token from config, then environment
pub fn get_api_token(config: &AppConfig) -> Option<String> {
    if let Some(token) = config.inference.api_token.as_deref().map(str::trim) {
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    for key in ["HF_API_TOKEN", "HUGGINGFACE_API_TOKEN", "AI_DETECTOR_HF_TOKEN"] {
        if let Ok(val) = env::var(key) {
            let v = val.trim();
            if !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }

    None
}

// ============ Offline scorer ============

/// Deterministic stand-in for both models when no inference service is used.
/// Primary answers like an OpenAI-detector head (`Real`/`Fake`), secondary like
/// a single-logit human-likeness ranker (`LABEL_0`).
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalClassifier;

#[async_trait]
impl Classifier for LocalClassifier {
    fn name(&self) -> &str {
        "local"
    }

    async fn classify(
        &self,
        role: ModelRole,
        _model: &ModelConfig,
        text: &str,
    ) -> Result<Vec<ClassLabel>, ProviderError> {
        Ok(match role {
            ModelRole::Primary => {
                let score = score_ai_probability(text);
                debug!(
                    probability = score.probability,
                    signals = %score.explanations.join("; "),
                    "classifier.local_score"
                );
                let p = score.probability;
                vec![ClassLabel::new("Fake", p), ClassLabel::new("Real", 1.0 - p)]
            }
            ModelRole::Secondary => vec![ClassLabel::new("LABEL_0", score_human_likeness(text))],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_nested_response() {
        let data = json!([[{"label": "Real", "score": 0.8}, {"label": "Fake", "score": 0.2}]]);
        let labels = parse_classification(&data).unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[1], ClassLabel::new("Fake", 0.2));
    }

    #[test]
    fn test_parse_flat_response() {
        let data = json!([{"label": "LABEL_0", "score": 0.4}]);
        let labels = parse_classification(&data).unwrap();
        assert_eq!(labels, vec![ClassLabel::new("LABEL_0", 0.4)]);
    }

    #[test]
    fn test_parse_error_and_empty_responses() {
        let err = parse_classification(&json!({"error": "Model is loading"})).unwrap_err();
        assert!(err.to_string().contains("Model is loading"));
        assert!(matches!(parse_classification(&json!([])), Err(ProviderError::MissingContent)));
        assert!(matches!(parse_classification(&json!({"foo": 1})), Err(ProviderError::JsonError(_))));
    }

    #[test]
    fn test_model_url_joins_base() {
        let client = HuggingFaceClassifier::new("https://example.test/models/", None, Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.model_url("roberta-base-openai-detector"),
            "https://example.test/models/roberta-base-openai-detector"
        );
    }

    #[test]
    fn test_config_token_wins() {
        let mut config = AppConfig::default();
        config.inference.api_token = Some("  hf_abc  ".to_string());
        assert_eq!(get_api_token(&config), Some("hf_abc".to_string()));
    }

    #[tokio::test]
    async fn test_local_classifier_shapes() {
        let model = AppConfig::default().models.roberta;
        let text = "The results were clear. The results were clear. The results were clear.";

        let primary = LocalClassifier.classify(ModelRole::Primary, &model, text).await.unwrap();
        assert_eq!(primary.len(), 2);
        assert!((primary[0].score + primary[1].score - 1.0).abs() < 1e-9);

        let secondary = LocalClassifier.classify(ModelRole::Secondary, &model, text).await.unwrap();
        assert_eq!(secondary[0].label, "LABEL_0");
        assert!((0.0..=1.0).contains(&secondary[0].score));
    }
}
