//! Request pipelines.
//!
//! Each verifier runs one request end to end:
//! - check the claims and decode the image
//! - build labels (classification) or a prompt (generation)
//! - call the model under the configured timeout
//! - hand the raw output to the deterministic core
//!
//! Anything that goes wrong with a single request becomes a failed
//! `VerificationResult`. Only model initialization failures are returned
//! as errors, since no later request can succeed either.

#[cfg(feature = "http")]
use std::sync::Arc;
use std::time::Duration;

use claimcheck_core::{
    adjudicate, parse_and_adjudicate, Claim, LabelBuilder, VerificationError, VerificationRequest,
    VerificationResult,
};

#[cfg(feature = "http")]
use crate::config::RuntimeConfig;
use crate::handle::ModelHandle;
use crate::image::{decode_image, EncodedImage};
use crate::prompts::build_verification_prompt;
use crate::providers::{ProviderError, VisionLanguageModel, ZeroShotClassifier};
use crate::RuntimeError;

/// Classification path: zero-shot scores adjudicated by threshold policy.
#[derive(Debug)]
pub struct ClassificationVerifier {
    classifier: ModelHandle<dyn ZeroShotClassifier>,
    labels: LabelBuilder,
    timeout: Duration,
}

impl ClassificationVerifier {
    pub fn new(
        classifier: ModelHandle<dyn ZeroShotClassifier>,
        labels: LabelBuilder,
        timeout: Duration,
    ) -> Self {
        Self {
            classifier,
            labels,
            timeout,
        }
    }

    /// Verifier backed by the HTTP classifier described by `config`.
    #[cfg(feature = "http")]
    pub fn from_config(config: &RuntimeConfig, labels: LabelBuilder) -> Self {
        let model = config.classifier_model.clone();
        let url = config.classifier_url.clone();
        let token = config.api_token.clone();
        let timeout = config.inference_timeout;

        let handle = ModelHandle::lazy(config.classifier_model.clone(), move || {
            let model = model.clone();
            let url = url.clone();
            let token = token.clone();
            async move {
                let classifier =
                    crate::providers::HttpZeroShotClassifier::new(model, url, token, timeout)?;
                Ok::<_, ProviderError>(Arc::new(classifier) as Arc<dyn ZeroShotClassifier>)
            }
        });

        Self::new(handle, labels, config.inference_timeout)
    }

    /// Initialize the model ahead of the first request.
    pub async fn warm_up(&self) -> Result<(), RuntimeError> {
        self.classifier.get().await.map(|_| ())
    }

    /// Run one request through the classification pipeline.
    pub async fn verify(
        &self,
        request: &VerificationRequest,
    ) -> Result<VerificationResult, RuntimeError> {
        let (claims, image) = match prepare(request) {
            Ok(prepared) => prepared,
            Err(message) => return Ok(VerificationResult::failure(message)),
        };

        let label_set = match self.labels.build(claims) {
            Ok(set) => set,
            Err(e) => return Ok(VerificationResult::failure(e.to_string())),
        };

        let classifier = self.classifier.get().await?;

        tracing::info!(
            model = classifier.name(),
            claims = claims.len(),
            labels = label_set.len(),
            strict = request.strict(),
            "Running zero-shot classification"
        );

        let scores = match with_timeout(
            self.timeout,
            classifier.classify(&image, label_set.labels()),
        )
        .await
        {
            Ok(scores) => scores,
            Err(e) => return Ok(inference_failure(e)),
        };

        let result = adjudicate(
            &scores,
            claims,
            label_set.label_to_claim(),
            request.strict(),
        );
        Ok(result.with_method(classifier.name()))
    }
}

/// Generative path: a vision-language model's answer parsed and checked.
#[derive(Debug)]
pub struct GenerativeVerifier {
    model: ModelHandle<dyn VisionLanguageModel>,
    timeout: Duration,
    max_new_tokens: u32,
}

impl GenerativeVerifier {
    pub fn new(
        model: ModelHandle<dyn VisionLanguageModel>,
        timeout: Duration,
        max_new_tokens: u32,
    ) -> Self {
        Self {
            model,
            timeout,
            max_new_tokens,
        }
    }

    /// Verifier backed by the OpenAI-compatible model described by `config`.
    #[cfg(feature = "http")]
    pub fn from_config(config: &RuntimeConfig) -> Self {
        let model = config.vlm_model.clone();
        let url = config.vlm_url.clone();
        let token = config.api_token.clone();
        let timeout = config.inference_timeout;

        let handle = ModelHandle::lazy(config.vlm_model.clone(), move || {
            let model = model.clone();
            let url = url.clone();
            let token = token.clone();
            async move {
                let vlm = crate::providers::OpenAiVisionModel::new(model, url, token, timeout)?;
                Ok::<_, ProviderError>(Arc::new(vlm) as Arc<dyn VisionLanguageModel>)
            }
        });

        Self::new(handle, config.inference_timeout, config.max_new_tokens)
    }

    /// Initialize the model ahead of the first request.
    pub async fn warm_up(&self) -> Result<(), RuntimeError> {
        self.model.get().await.map(|_| ())
    }

    /// Run one request through the generative pipeline.
    pub async fn verify(
        &self,
        request: &VerificationRequest,
    ) -> Result<VerificationResult, RuntimeError> {
        let (claims, image) = match prepare(request) {
            Ok(prepared) => prepared,
            Err(message) => return Ok(VerificationResult::failure(message)),
        };

        let prompt = build_verification_prompt(claims, request.strict());
        let model = self.model.get().await?;

        tracing::info!(
            model = model.name(),
            claims = claims.len(),
            strict = request.strict(),
            "Running vision-language verification"
        );

        let raw_text = match with_timeout(
            self.timeout,
            model.generate(&image, &prompt, self.max_new_tokens),
        )
        .await
        {
            Ok(text) => text,
            Err(e) => return Ok(inference_failure(e)),
        };

        tracing::debug!(
            preview = %raw_text.chars().take(200).collect::<String>(),
            "Model response received"
        );

        let result = parse_and_adjudicate(&raw_text, claims, request.strict());
        Ok(result.with_method(model.name()))
    }
}

/// Validate the claims, then decode the image.
///
/// Claims are checked first so an empty claim list is reported as such
/// whatever the image holds.
fn prepare(request: &VerificationRequest) -> Result<(&[Claim], EncodedImage), String> {
    let claims = request.claims().map_err(|e| e.to_string())?;
    if claims.iter().all(|c| c.title.is_empty()) {
        return Err(VerificationError::NoConditions.to_string());
    }

    let data = request.image().map_err(|e| e.to_string())?;
    let image = decode_image(data).map_err(|e| {
        tracing::warn!(error = %e, "Rejecting request: image could not be decoded");
        e.to_string()
    })?;

    Ok((claims, image))
}

async fn with_timeout<T, F>(timeout: Duration, call: F) -> Result<T, RuntimeError>
where
    F: std::future::Future<Output = Result<T, ProviderError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result.map_err(RuntimeError::from),
        Err(_) => Err(RuntimeError::Inference(ProviderError::Timeout(timeout))),
    }
}

fn inference_failure(error: RuntimeError) -> VerificationResult {
    tracing::warn!(error = %error, "Inference failed");
    VerificationResult::failure(error.to_string())
}
