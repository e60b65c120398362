pub mod anthropic;
pub mod openai;

use clap::ValueEnum;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cli::Provider;
use crate::config::RuntimeConfig;
use crate::error::ModelError;
use crate::model::ModelService;

pub use anthropic::AnthropicModel;
pub use openai::OpenAiCompatibleModel;

pub fn validate_model_for_provider(provider: Provider, model_name: &str) -> Result<()> {
    let is_valid = match provider {
        Provider::Openai => {
            model_name.starts_with("gpt-")
                || model_name.starts_with("o1")
                || model_name.starts_with("o3")
                || model_name.starts_with("o4")
        }
        Provider::Anthropic => model_name.starts_with("claude"),
        Provider::Deepseek => model_name.starts_with("deepseek"),
        Provider::Groq => !model_name.trim().is_empty(),
        Provider::Ollama => !model_name.trim().is_empty(),
        Provider::Auto => true,
    };

    if is_valid {
        return Ok(());
    }

    Err(anyhow::anyhow!(
        "model '{}' is not compatible with provider '{:?}'",
        model_name,
        provider
    ))
}

fn model_name_or(cfg: &RuntimeConfig, default: &str) -> String {
    cfg.model.clone().unwrap_or_else(|| default.to_string())
}

pub fn resolve_model(cfg: &RuntimeConfig) -> Result<(Arc<dyn ModelService>, Provider, String)> {
    let provider = match cfg.provider {
        Provider::Auto => detect_provider().context(
            "no provider could be auto-detected. Set one of OPENAI_API_KEY, ANTHROPIC_API_KEY, \
             DEEPSEEK_API_KEY, GROQ_API_KEY, or use --provider ollama",
        )?,
        p => p,
    };

    match provider {
        Provider::Openai => {
            let api_key = std::env::var("OPENAI_API_KEY")
                .context("OPENAI_API_KEY is required for OpenAI provider")?;
            let base_url = std::env::var("OPENAI_BASE_URL")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| openai::OPENAI_BASE_URL.to_string());
            let model_name = model_name_or(cfg, "gpt-4.1-mini");
            validate_model_for_provider(provider, &model_name)?;
            let model = OpenAiCompatibleModel::new("openai", base_url, Some(api_key), &model_name)
                .with_max_tokens(cfg.max_tokens);
            Ok((Arc::new(model), provider, model_name))
        }
        Provider::Anthropic => {
            let api_key = std::env::var("ANTHROPIC_API_KEY")
                .context("ANTHROPIC_API_KEY is required for Anthropic provider")?;
            let model_name = model_name_or(cfg, "claude-sonnet-4-20250514");
            validate_model_for_provider(provider, &model_name)?;
            let model = AnthropicModel::new(api_key, &model_name).with_max_tokens(cfg.max_tokens);
            Ok((Arc::new(model), provider, model_name))
        }
        Provider::Deepseek => {
            let api_key = std::env::var("DEEPSEEK_API_KEY")
                .context("DEEPSEEK_API_KEY is required for DeepSeek provider")?;
            let model_name = model_name_or(cfg, "deepseek-chat");
            validate_model_for_provider(provider, &model_name)?;
            let model = OpenAiCompatibleModel::new(
                "deepseek",
                openai::DEEPSEEK_BASE_URL,
                Some(api_key),
                &model_name,
            )
            .with_max_tokens(cfg.max_tokens);
            Ok((Arc::new(model), provider, model_name))
        }
        Provider::Groq => {
            let api_key = std::env::var("GROQ_API_KEY")
                .context("GROQ_API_KEY is required for Groq provider")?;
            let model_name = model_name_or(cfg, "llama-3.3-70b-versatile");
            validate_model_for_provider(provider, &model_name)?;
            let model =
                OpenAiCompatibleModel::new("groq", openai::GROQ_BASE_URL, Some(api_key), &model_name)
                    .with_max_tokens(cfg.max_tokens);
            Ok((Arc::new(model), provider, model_name))
        }
        Provider::Ollama => {
            let host = std::env::var("OLLAMA_HOST")
                .unwrap_or_else(|_| "http://localhost:11434".to_string());
            let model_name = model_name_or(cfg, "llama3.1");
            validate_model_for_provider(provider, &model_name)?;
            let base_url = format!("{}/v1", host.trim_end_matches('/'));
            let model = OpenAiCompatibleModel::new("ollama", base_url, None, &model_name)
                .with_max_tokens(cfg.max_tokens);
            Ok((Arc::new(model), provider, model_name))
        }
        Provider::Auto => Err(anyhow::anyhow!(
            "auto provider must be resolved before building a model"
        )),
    }
}

pub fn detect_provider() -> Option<Provider> {
    if env_present("OPENAI_API_KEY") {
        return Some(Provider::Openai);
    }
    if env_present("ANTHROPIC_API_KEY") {
        return Some(Provider::Anthropic);
    }
    if env_present("DEEPSEEK_API_KEY") {
        return Some(Provider::Deepseek);
    }
    if env_present("GROQ_API_KEY") {
        return Some(Provider::Groq);
    }
    if env_present("OLLAMA_HOST") {
        return Some(Provider::Ollama);
    }
    None
}

pub fn env_present(key: &str) -> bool {
    std::env::var(key)
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false)
}

pub fn parse_provider_name(value: &str) -> Result<Provider> {
    Provider::from_str(value, true).map_err(|_| {
        anyhow::anyhow!(
            "invalid provider '{}'. Supported values: auto, openai, anthropic, deepseek, groq, ollama",
            value
        )
    })
}

/// Maps a non-success HTTP status onto the model error taxonomy.
pub fn classify_status(status: u16, body: &str) -> ModelError {
    let detail = format!("HTTP {status}: {}", truncate_detail(body));
    match status {
        401 | 403 => ModelError::Authentication(detail),
        408 => ModelError::Unavailable(detail),
        429 => ModelError::RateLimited(detail),
        500..=599 => ModelError::Unavailable(detail),
        _ => ModelError::InvalidRequest(detail),
    }
}

pub fn classify_transport(err: &reqwest::Error) -> ModelError {
    if err.is_decode() {
        ModelError::MalformedResponse(err.to_string())
    } else {
        ModelError::Unavailable(err.to_string())
    }
}

fn truncate_detail(body: &str) -> String {
    const MAX_DETAIL_CHARS: usize = 400;
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_DETAIL_CHARS {
        return trimmed.to_string();
    }
    let mut out = trimmed.chars().take(MAX_DETAIL_CHARS).collect::<String>();
    out.push_str("...");
    out
}
