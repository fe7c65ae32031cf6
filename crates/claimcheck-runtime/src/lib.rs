//! # claimcheck-runtime
//!
//! Inference pipelines around the deterministic core.
//!
//! This crate owns everything that talks to a model: decoding the image
//! envelope, rendering the verification prompt, calling a zero-shot
//! classifier or a vision-language model, and handing the raw output to
//! `claimcheck-core` for adjudication.
//!
//! ## Important
//!
//! Verdicts are never decided here. Models only produce scores or text;
//! the rules that turn those into `satisfiesConditions` live in the core
//! crate and are fully deterministic.
//!
//! ## Example
//!
//! ```rust,ignore
//! use claimcheck_core::{LabelBuilder, VerificationRequest};
//! use claimcheck_runtime::{ClassificationVerifier, RuntimeConfig};
//!
//! let config = RuntimeConfig::from_env()?;
//! let verifier = ClassificationVerifier::from_config(&config, LabelBuilder::new());
//!
//! let request = VerificationRequest::from_json(&input)?;
//! let result = verifier.verify(&request).await?;
//! println!("{}", result.to_json());
//! ```

pub mod config;
pub mod handle;
pub mod image;
pub mod orchestrator;
pub mod prompts;
pub mod providers;

pub use config::RuntimeConfig;
pub use handle::ModelHandle;
pub use image::{decode_image, DecodeError, EncodedImage, ImageFormat};
pub use orchestrator::{ClassificationVerifier, GenerativeVerifier};
pub use prompts::build_verification_prompt;
pub use providers::{ProviderError, VisionLanguageModel, ZeroShotClassifier};

use thiserror::Error;

/// Errors that escape a verification pipeline.
///
/// Per-request problems (bad image, failed inference) are reported inside
/// a failed `VerificationResult` instead. Only conditions that make the
/// whole process unusable surface here.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Model initialization failed: {0}")]
    ModelInit(String),

    #[error("Inference failed: {0}")]
    Inference(#[from] ProviderError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
