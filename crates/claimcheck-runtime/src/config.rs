//! Runtime configuration.
//!
//! Values come from `CLAIMCHECK_*` environment variables layered over
//! defaults. Command-line flags are applied on top by the caller.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use crate::providers::{ApiCredential, CredentialSource};
use crate::RuntimeError;

/// Default zero-shot classification model.
pub const DEFAULT_CLASSIFIER_MODEL: &str = "openai/clip-vit-base-patch32";
/// Default vision-language model.
pub const DEFAULT_VLM_MODEL: &str = "llava-hf/llava-1.5-7b-hf";
/// Default OpenAI-compatible base URL (a local vLLM server).
pub const DEFAULT_VLM_URL: &str = "http://localhost:8000/v1";
/// Default per-request inference timeout.
pub const DEFAULT_INFERENCE_TIMEOUT: Duration = Duration::from_secs(60);
/// Default generation budget for the vision-language model.
pub const DEFAULT_MAX_NEW_TOKENS: u32 = 256;

const API_TOKEN_NAME: &str = "API token";

/// Configuration for the inference pipelines.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Zero-shot classification endpoint; the hosted API for
    /// `classifier_model` when unset
    pub classifier_url: Option<String>,

    pub classifier_model: String,

    /// OpenAI-compatible chat completions base URL
    pub vlm_url: String,

    pub vlm_model: String,

    /// Bearer token sent to both backends
    pub api_token: Option<Arc<ApiCredential>>,

    /// Upper bound on a single inference call
    pub inference_timeout: Duration,

    pub max_new_tokens: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            classifier_url: None,
            classifier_model: DEFAULT_CLASSIFIER_MODEL.to_string(),
            vlm_url: DEFAULT_VLM_URL.to_string(),
            vlm_model: DEFAULT_VLM_MODEL.to_string(),
            api_token: None,
            inference_timeout: DEFAULT_INFERENCE_TIMEOUT,
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
        }
    }
}

impl RuntimeConfig {
    const ENV_CLASSIFIER_URL: &'static str = "CLAIMCHECK_CLASSIFIER_URL";
    const ENV_CLASSIFIER_MODEL: &'static str = "CLAIMCHECK_CLASSIFIER_MODEL";
    const ENV_VLM_URL: &'static str = "CLAIMCHECK_VLM_URL";
    const ENV_VLM_MODEL: &'static str = "CLAIMCHECK_VLM_MODEL";
    const ENV_API_TOKEN: &'static str = "CLAIMCHECK_API_TOKEN";
    const ENV_INFERENCE_TIMEOUT: &'static str = "CLAIMCHECK_INFERENCE_TIMEOUT";
    const ENV_MAX_NEW_TOKENS: &'static str = "CLAIMCHECK_MAX_NEW_TOKENS";

    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, RuntimeError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Blank values count as unset. Malformed durations and numbers are
    /// errors rather than silently falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RuntimeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let inference_timeout = match get(Self::ENV_INFERENCE_TIMEOUT) {
            Some(raw) => humantime::parse_duration(&raw).map_err(|e| {
                RuntimeError::Config(format!("{}={}: {}", Self::ENV_INFERENCE_TIMEOUT, raw, e))
            })?,
            None => defaults.inference_timeout,
        };

        let max_new_tokens = match get(Self::ENV_MAX_NEW_TOKENS) {
            Some(raw) => raw.parse::<u32>().map_err(|e| {
                RuntimeError::Config(format!("{}={}: {}", Self::ENV_MAX_NEW_TOKENS, raw, e))
            })?,
            None => defaults.max_new_tokens,
        };

        let api_token = get(Self::ENV_API_TOKEN).map(|token| {
            Arc::new(ApiCredential::new(
                token,
                CredentialSource::Environment,
                API_TOKEN_NAME,
            ))
        });

        let config = Self {
            classifier_url: get(Self::ENV_CLASSIFIER_URL),
            classifier_model: get(Self::ENV_CLASSIFIER_MODEL).unwrap_or(defaults.classifier_model),
            vlm_url: get(Self::ENV_VLM_URL).unwrap_or(defaults.vlm_url),
            vlm_model: get(Self::ENV_VLM_MODEL).unwrap_or(defaults.vlm_model),
            api_token,
            inference_timeout,
            max_new_tokens,
        };

        tracing::debug!(
            classifier_model = %config.classifier_model,
            vlm_model = %config.vlm_model,
            timeout = %humantime::format_duration(config.inference_timeout),
            has_token = config.api_token.is_some(),
            "Loaded runtime configuration"
        );

        Ok(config)
    }

    /// Replace the API token with one given on the command line.
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(Arc::new(ApiCredential::new(
            token,
            CredentialSource::CommandLine,
            API_TOKEN_NAME,
        )));
        self
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.inference_timeout.is_zero() {
            return Err(RuntimeError::Config("inference timeout must be positive".into()));
        }
        if self.max_new_tokens == 0 {
            return Err(RuntimeError::Config("max_new_tokens must be positive".into()));
        }
        if self.classifier_model.trim().is_empty() || self.vlm_model.trim().is_empty() {
            return Err(RuntimeError::Config("model names must not be empty".into()));
        }

        let urls = self
            .classifier_url
            .iter()
            .chain(std::iter::once(&self.vlm_url));
        for url in urls {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(RuntimeError::Config(format!(
                    "URL must start with http:// or https://: {}",
                    url
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.classifier_model, "openai/clip-vit-base-patch32");
        assert_eq!(config.vlm_model, "llava-hf/llava-1.5-7b-hf");
        assert_eq!(config.inference_timeout, Duration::from_secs(60));
        assert_eq!(config.max_new_tokens, 256);
        assert!(config.api_token.is_none());
        assert!(config.classifier_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = RuntimeConfig::from_lookup(lookup(&[
            ("CLAIMCHECK_CLASSIFIER_URL", "http://clip:8080/classify"),
            ("CLAIMCHECK_VLM_MODEL", "llava-next"),
            ("CLAIMCHECK_INFERENCE_TIMEOUT", "2m 30s"),
            ("CLAIMCHECK_MAX_NEW_TOKENS", "512"),
            ("CLAIMCHECK_API_TOKEN", "hf_token"),
        ]))
        .unwrap();

        assert_eq!(config.classifier_url.as_deref(), Some("http://clip:8080/classify"));
        assert_eq!(config.vlm_model, "llava-next");
        assert_eq!(config.inference_timeout, Duration::from_secs(150));
        assert_eq!(config.max_new_tokens, 512);

        let token = config.api_token.as_ref().unwrap();
        assert_eq!(token.expose(), "hf_token");
        assert_eq!(token.source(), CredentialSource::Environment);
        assert!(!format!("{:?}", config).contains("hf_token"));
    }

    #[test]
    fn test_blank_values_ignored() {
        let config =
            RuntimeConfig::from_lookup(lookup(&[("CLAIMCHECK_CLASSIFIER_MODEL", "  ")])).unwrap();
        assert_eq!(config.classifier_model, DEFAULT_CLASSIFIER_MODEL);
    }

    #[test]
    fn test_bad_timeout() {
        let result =
            RuntimeConfig::from_lookup(lookup(&[("CLAIMCHECK_INFERENCE_TIMEOUT", "soon")]));
        assert!(matches!(result, Err(RuntimeError::Config(_))));
    }

    #[test]
    fn test_bad_token_budget() {
        let result = RuntimeConfig::from_lookup(lookup(&[("CLAIMCHECK_MAX_NEW_TOKENS", "-1")]));
        assert!(matches!(result, Err(RuntimeError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let config = RuntimeConfig {
            vlm_url: "localhost:8000".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = RuntimeConfig {
            inference_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_token_overrides() {
        let config = RuntimeConfig::default().with_api_token("cli-token");
        let token = config.api_token.unwrap();
        assert_eq!(token.expose(), "cli-token");
        assert_eq!(token.source(), CredentialSource::CommandLine);
    }
}
