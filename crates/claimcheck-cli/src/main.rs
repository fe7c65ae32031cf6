//! `claimcheck` - check whether an image shows the work a set of claims
//! describes.
//!
//! One JSON request is read from stdin (or `--input`) and one JSON result is
//! written to stdout. Logs go to stderr and are filtered with `RUST_LOG`
//! (default `claimcheck=info`).
//!
//! The process exits 0 whenever a result was written, including failed
//! verifications. Unreadable input, bad configuration and model
//! initialization failures still write a failure document but exit 1.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use claimcheck_core::{
    verify_response, verify_scores, CategoryRules, LabelBuilder, ScoredLabel,
    VerificationRequest, VerificationResult,
};
use claimcheck_runtime::{
    build_verification_prompt, ClassificationVerifier, GenerativeVerifier, RuntimeConfig,
};

#[derive(Parser, Debug)]
#[command(name = "claimcheck", version, about = "Verify NGO image claims")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Read the request from a file instead of stdin
    #[arg(long, short, global = true)]
    input: Option<PathBuf>,

    /// Pretty-print the JSON result
    #[arg(long, global = true)]
    pretty: bool,

    /// YAML file with extra claim categories
    #[arg(long, global = true, env = "CLAIMCHECK_CATEGORIES")]
    categories: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the zero-shot classification pipeline
    Classify(ModelArgs),
    /// Run the vision-language pipeline
    Generate(ModelArgs),
    /// Show the candidate labels built for the request's conditions
    Labels,
    /// Adjudicate precomputed `scores` carried in the request
    Adjudicate,
    /// Adjudicate a model `response` carried in the request
    Parse,
    /// Show the verification prompt for the request
    Prompt,
}

/// Overrides applied on top of the `CLAIMCHECK_*` environment.
#[derive(Args, Debug, Default)]
struct ModelArgs {
    /// Inference endpoint (classifier URL or chat completions base URL)
    #[arg(long)]
    url: Option<String>,

    /// Model name
    #[arg(long)]
    model: Option<String>,

    /// Bearer token for the inference backend
    #[arg(long)]
    api_token: Option<String>,

    /// Per-call inference timeout, e.g. "30s" or "2m"
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Generation budget for the vision-language model
    #[arg(long)]
    max_new_tokens: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Classifier,
    Vlm,
}

impl ModelArgs {
    fn apply(&self, mut config: RuntimeConfig, backend: Backend) -> RuntimeConfig {
        match backend {
            Backend::Classifier => {
                if let Some(url) = &self.url {
                    config.classifier_url = Some(url.clone());
                }
                if let Some(model) = &self.model {
                    config.classifier_model = model.clone();
                }
            }
            Backend::Vlm => {
                if let Some(url) = &self.url {
                    config.vlm_url = url.clone();
                }
                if let Some(model) = &self.model {
                    config.vlm_model = model.clone();
                }
            }
        }

        if let Some(timeout) = self.timeout {
            config.inference_timeout = timeout;
        }
        if let Some(max_new_tokens) = self.max_new_tokens {
            config.max_new_tokens = max_new_tokens;
        }
        match &self.api_token {
            Some(token) => config.with_api_token(token.clone()),
            None => config,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let pretty = cli.pretty;

    match run(cli).await {
        Ok(output) => match emit(&output, pretty) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!(error = %e, "Failed to write result");
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            let message = format!("{:#}", err);
            tracing::error!(error = %message, "claimcheck failed");
            if let Err(e) = emit(&VerificationResult::failure(message).to_json(), pretty) {
                tracing::error!(error = %e, "Failed to write result");
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("claimcheck=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Run one command. `Err` means the process should exit non-zero.
async fn run(cli: Cli) -> Result<Value> {
    let raw = read_input(cli.input.as_deref())?;
    let document = parse_document(&raw)?;

    let request = match VerificationRequest::from_value(&document) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "Rejecting request");
            return Ok(VerificationResult::failure(e.to_string()).to_json());
        }
    };

    let labels = label_builder(cli.categories.as_deref())?;

    match cli.command {
        Command::Classify(args) => {
            let config = load_config(&args, Backend::Classifier)?;
            let verifier = ClassificationVerifier::from_config(&config, labels);
            let result = verifier.verify(&request).await?;
            Ok(result.to_json())
        }
        Command::Generate(args) => {
            let config = load_config(&args, Backend::Vlm)?;
            let verifier = GenerativeVerifier::from_config(&config);
            let result = verifier.verify(&request).await?;
            Ok(result.to_json())
        }
        Command::Labels => Ok(labels_output(&request, &labels)),
        Command::Adjudicate => {
            let result = match scores_field(&document) {
                Ok(scores) => verify_scores(&request, &scores, &labels),
                Err(message) => VerificationResult::failure(message),
            };
            Ok(result.to_json())
        }
        Command::Parse => {
            let result = match response_field(&document) {
                Ok(text) => verify_response(&request, text),
                Err(message) => VerificationResult::failure(message),
            };
            Ok(result.to_json())
        }
        Command::Prompt => Ok(prompt_output(&request)),
    }
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file {}", path.display())),
        None => {
            let mut raw = String::new();
            io::stdin()
                .read_to_string(&mut raw)
                .context("Failed to read request from stdin")?;
            Ok(raw)
        }
    }
}

fn parse_document(raw: &str) -> Result<Value> {
    if raw.trim().is_empty() {
        anyhow::bail!("No request provided");
    }
    serde_json::from_str(raw).context("Input is not valid JSON")
}

fn label_builder(categories: Option<&Path>) -> Result<LabelBuilder> {
    let rules = match categories {
        Some(path) => CategoryRules::from_yaml_file(path)
            .with_context(|| format!("Failed to load categories from {}", path.display()))?,
        None => CategoryRules::builtin(),
    };
    Ok(LabelBuilder::with_rules(rules))
}

fn load_config(args: &ModelArgs, backend: Backend) -> Result<RuntimeConfig> {
    let config = args.apply(RuntimeConfig::from_env()?, backend);
    config.validate()?;
    Ok(config)
}

fn labels_output(request: &VerificationRequest, builder: &LabelBuilder) -> Value {
    let built = request
        .claims()
        .and_then(|claims| builder.build(claims));

    match built {
        Ok(set) => serde_json::to_value(&set)
            .unwrap_or_else(|e| VerificationResult::failure(e.to_string()).to_json()),
        Err(e) => VerificationResult::failure(e.to_string()).to_json(),
    }
}

fn prompt_output(request: &VerificationRequest) -> Value {
    match request.claims() {
        Ok(claims) => json!({
            "success": true,
            "prompt": build_verification_prompt(claims, request.strict()),
        }),
        Err(e) => VerificationResult::failure(e.to_string()).to_json(),
    }
}

/// The `scores` array carried next to the request.
fn scores_field(document: &Value) -> Result<Vec<ScoredLabel>, String> {
    let scores = document
        .get("scores")
        .filter(|v| !v.is_null())
        .ok_or_else(|| "No scores provided".to_string())?;

    serde_json::from_value(scores.clone()).map_err(|e| format!("Invalid scores: {}", e))
}

/// The raw model text carried next to the request.
fn response_field(document: &Value) -> Result<&str, String> {
    match document.get("response") {
        Some(Value::String(text)) => Ok(text),
        Some(Value::Null) | None => Err("No response provided".to_string()),
        Some(_) => Err("Invalid response: expected a string".to_string()),
    }
}

fn emit(output: &Value, pretty: bool) -> Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(output)?
    } else {
        serde_json::to_string(output)?
    };

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", rendered)?;
    stdout.flush()?;
    Ok(())
}
