use thiserror::Error;

/// Failures at the model service boundary.
///
/// Transient variants are retried by the orchestrator with backoff; the rest
/// end the session and surface verbatim to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("model request timed out after {0}s")]
    Timeout(u64),
    #[error("model service rate limited the request: {0}")]
    RateLimited(String),
    #[error("model service unavailable: {0}")]
    Unavailable(String),
    #[error("model service rejected credentials: {0}")]
    Authentication(String),
    #[error("model service rejected the request: {0}")]
    InvalidRequest(String),
    #[error("model service returned a malformed response: {0}")]
    MalformedResponse(String),
}

impl ModelError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ModelError::Timeout(_) | ModelError::RateLimited(_) | ModelError::Unavailable(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ModelError::Timeout(_) => "timeout",
            ModelError::RateLimited(_) => "rate_limited",
            ModelError::Unavailable(_) => "unavailable",
            ModelError::Authentication(_) => "authentication",
            ModelError::InvalidRequest(_) => "invalid_request",
            ModelError::MalformedResponse(_) => "malformed_response",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Provider,
    Input,
    Capability,
    Config,
    Internal,
}

impl ErrorCategory {
    pub fn code(self) -> &'static str {
        match self {
            ErrorCategory::Provider => "PROVIDER",
            ErrorCategory::Input => "INPUT",
            ErrorCategory::Capability => "CAPABILITY",
            ErrorCategory::Config => "CONFIG",
            ErrorCategory::Internal => "INTERNAL",
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            ErrorCategory::Provider => {
                "Set provider credentials (for example OPENAI_API_KEY) or run with --provider ollama."
            }
            ErrorCategory::Input => {
                "Run docsum --help and check the prompt, --file paths and output options."
            }
            ErrorCategory::Capability => {
                "Check --workspace-root and --path-policy, then retry with RUST_LOG=info for capability logs."
            }
            ErrorCategory::Config => {
                "Check .docsum/config.toml field names or select another profile with --profile."
            }
            ErrorCategory::Internal => {
                "Retry with RUST_LOG=debug. If it persists, capture logs and open an issue."
            }
        }
    }
}

pub fn categorize_error(err: &anyhow::Error) -> ErrorCategory {
    if err
        .chain()
        .any(|cause| cause.downcast_ref::<ModelError>().is_some())
    {
        return ErrorCategory::Provider;
    }

    let msg = format!("{err:#}").to_ascii_lowercase();

    if msg.contains("api_key")
        || msg.contains("no provider could be auto-detected")
        || msg.contains("provider")
    {
        return ErrorCategory::Provider;
    }

    if msg.contains("upload_dir") {
        return ErrorCategory::Config;
    }

    if msg.contains("upload")
        || msg.contains("unsupported file")
        || msg.contains("prompt exceeds")
        || msg.contains("invalid value")
        || msg.contains("failed to read input")
    {
        return ErrorCategory::Input;
    }

    if msg.contains("profile") || msg.contains("config") {
        return ErrorCategory::Config;
    }

    if msg.contains("workspace") || msg.contains("capability") {
        return ErrorCategory::Capability;
    }

    ErrorCategory::Internal
}

pub fn format_cli_error(err: &anyhow::Error) -> String {
    let category = categorize_error(err);
    format!("[{}] {:#}\nHint: {}", category.code(), err, category.hint())
}
