//! Zero-shot image classification over HTTP.
//!
//! Speaks the Hugging Face inference wire format:
//!
//! ```json
//! {"inputs": "<base64>", "parameters": {"candidate_labels": ["...", "..."]}}
//! ```
//!
//! answered by `[{"label": "...", "score": 0.93}, ...]`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use claimcheck_core::ScoredLabel;

use super::{
    error_message, http_client, secrets::ApiCredential, transport_error, ProviderError,
    ZeroShotClassifier,
};
use crate::image::EncodedImage;

/// Hosted inference endpoint used when no URL is configured.
pub const DEFAULT_INFERENCE_BASE: &str = "https://api-inference.huggingface.co/models";

/// A zero-shot classifier reached over HTTP.
pub struct HttpZeroShotClassifier {
    client: reqwest::Client,
    url: String,
    model: String,
    credential: Option<Arc<ApiCredential>>,
    timeout: Duration,
}

impl std::fmt::Debug for HttpZeroShotClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpZeroShotClassifier")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("credential", &self.credential)
            .finish()
    }
}

impl HttpZeroShotClassifier {
    /// Create a classifier for `model`.
    ///
    /// Without an explicit `url`, requests go to the hosted inference API
    /// for that model.
    pub fn new(
        model: impl Into<String>,
        url: Option<String>,
        credential: Option<Arc<ApiCredential>>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(ProviderError::NotConfigured("classifier model name is empty".into()));
        }

        let url = url.unwrap_or_else(|| format!("{}/{}", DEFAULT_INFERENCE_BASE, model));

        Ok(Self {
            client: http_client(timeout)?,
            url,
            model,
            credential,
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    inputs: String,
    parameters: ClassifyParameters<'a>,
}

#[derive(Debug, Serialize)]
struct ClassifyParameters<'a> {
    candidate_labels: &'a [String],
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

#[async_trait]
impl ZeroShotClassifier for HttpZeroShotClassifier {
    async fn classify(
        &self,
        image: &EncodedImage,
        labels: &[String],
    ) -> Result<Vec<ScoredLabel>, ProviderError> {
        let body = ClassifyRequest {
            inputs: image.to_base64(),
            parameters: ClassifyParameters {
                candidate_labels: labels,
            },
        };

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(credential) = &self.credential {
            request = request.header("authorization", credential.bearer());
        }

        tracing::debug!(model = %self.model, labels = labels.len(), "Sending classification request");

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        let scores: Vec<LabelScore> =
            serde_json::from_str(&text).map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(scores
            .into_iter()
            .map(|s| ScoredLabel::new(s.label, s.score))
            .collect())
    }

    fn name(&self) -> &str {
        &self.model
    }
}
