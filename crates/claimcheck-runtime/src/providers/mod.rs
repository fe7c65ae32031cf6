//! Inference capabilities.
//!
//! The pipelines need exactly two things from a model backend:
//!
//! - [`ZeroShotClassifier`]: score an image against arbitrary text labels
//! - [`VisionLanguageModel`]: answer a text prompt about an image
//!
//! HTTP-backed implementations live behind the `http` feature. Tests and
//! embedders can supply their own.
//!
//! ## Security
//!
//! Providers authenticate with [`ApiCredential`], which never prints its
//! value.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use claimcheck_core::ScoredLabel;

use crate::image::EncodedImage;

pub mod secrets;

#[cfg(feature = "http")]
mod huggingface;
#[cfg(feature = "http")]
mod openai;

pub use secrets::{ApiCredential, CredentialSource};

#[cfg(feature = "http")]
pub use huggingface::HttpZeroShotClassifier;
#[cfg(feature = "http")]
pub use openai::OpenAiVisionModel;

/// Errors from inference providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Response parse error: {0}")]
    Parse(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Scores an image against candidate text labels without label-specific
/// training.
#[async_trait]
pub trait ZeroShotClassifier: Send + Sync {
    /// One score per label, in any order.
    async fn classify(
        &self,
        image: &EncodedImage,
        labels: &[String],
    ) -> Result<Vec<ScoredLabel>, ProviderError>;

    /// Model name reported as `verificationMethod`.
    fn name(&self) -> &str;
}

/// Generates a text completion for an image and a prompt.
#[async_trait]
pub trait VisionLanguageModel: Send + Sync {
    async fn generate(
        &self,
        image: &EncodedImage,
        prompt: &str,
        max_new_tokens: u32,
    ) -> Result<String, ProviderError>;

    /// Model name reported as `verificationMethod`.
    fn name(&self) -> &str;
}

/// Map a `reqwest` transport error, keeping timeouts distinguishable.
#[cfg(feature = "http")]
pub(crate) fn transport_error(e: reqwest::Error, timeout: Duration) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(timeout)
    } else {
        ProviderError::Http(e.to_string())
    }
}

/// Build the shared HTTP client for a provider.
#[cfg(feature = "http")]
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))
}

/// Error message from a non-success response body.
///
/// Inference servers answer `{"error": "..."}`, `{"error": {"message": ...}}`
/// or plain text; the raw body is used when neither shape matches.
#[cfg(feature = "http")]
pub(crate) fn error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|v| {
        let error = v.get("error")?;
        error
            .as_str()
            .or_else(|| error.get("message").and_then(|m| m.as_str()))
            .map(str::to_string)
    });

    message.unwrap_or_else(|| body.chars().take(500).collect())
}

#[cfg(all(test, feature = "http"))]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(error_message(r#"{"error": "Model is loading"}"#), "Model is loading");
        assert_eq!(
            error_message(r#"{"error": {"message": "bad image", "type": "invalid_request"}}"#),
            "bad image"
        );
        assert_eq!(error_message("Service Unavailable"), "Service Unavailable");
    }
}
