use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::capabilities::path_policy::DENIED_SEGMENTS;
use crate::cli::*;

pub const DEFAULT_MAX_TURNS: u32 = 10;
pub const DEFAULT_OUTPUT_PATH: &str = "output.txt";
pub const DEFAULT_UPLOAD_DIR: &str = ".docsum/uploads";

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub profile: String,
    pub config_path: String,
    pub provider: Provider,
    pub model: Option<String>,
    pub max_turns: u32,
    pub model_timeout_secs: u64,
    pub model_retry_attempts: u32,
    pub model_retry_delay_ms: u64,
    pub max_tokens: u32,
    pub path_policy: PathPolicyMode,
    pub workspace_root: PathBuf,
    pub upload_dir: String,
    pub keep_uploads: bool,
    pub output_path: String,
    pub max_prompt_chars: usize,
    pub telemetry_enabled: bool,
    pub telemetry_path: String,
}

impl RuntimeConfig {
    pub fn upload_root(&self) -> PathBuf {
        self.workspace_root.join(&self.upload_dir)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilesFile {
    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    pub provider: Option<Provider>,
    pub model: Option<String>,
    pub max_turns: Option<u32>,
    pub model_timeout_secs: Option<u64>,
    pub model_retry_attempts: Option<u32>,
    pub model_retry_delay_ms: Option<u64>,
    pub max_tokens: Option<u32>,
    pub path_policy: Option<PathPolicyMode>,
    pub workspace_root: Option<String>,
    pub upload_dir: Option<String>,
    pub keep_uploads: Option<bool>,
    pub output_path: Option<String>,
    pub max_prompt_chars: Option<usize>,
    pub telemetry_enabled: Option<bool>,
    pub telemetry_path: Option<String>,
}

pub fn load_profiles(config_path: &str) -> Result<ProfilesFile> {
    let path = Path::new(config_path);
    if !path.exists() {
        return Ok(ProfilesFile::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read profile config file at '{}'", path.display()))?;
    toml::from_str::<ProfilesFile>(&content).with_context(|| {
        format!(
            "invalid profile configuration in '{}'. Check provider/path_policy values and field names.",
            path.display()
        )
    })
}

fn select_profile(cli: &Cli, profiles: &ProfilesFile) -> Result<ProfileConfig> {
    let selected = cli.profile.trim();
    if selected.is_empty() {
        return Err(anyhow::anyhow!(
            "profile name cannot be empty. Set --profile <name>."
        ));
    }

    if selected == "default" && !profiles.profiles.contains_key("default") {
        return Ok(ProfileConfig::default());
    }

    profiles.profiles.get(selected).cloned().ok_or_else(|| {
        let mut names = profiles.profiles.keys().cloned().collect::<Vec<String>>();
        names.sort();
        if names.is_empty() {
            anyhow::anyhow!(
                "profile '{}' not found in '{}'. No profiles are defined yet.",
                selected,
                cli.config_path
            )
        } else {
            anyhow::anyhow!(
                "profile '{}' not found in '{}'. Available profiles: {}",
                selected,
                cli.config_path,
                names.join(", ")
            )
        }
    })
}

fn resolve_workspace_root(raw: Option<String>) -> Result<PathBuf> {
    let root = match raw.map(|value| value.trim().to_string()) {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => std::env::current_dir()
            .context("failed to resolve workspace root from current directory")?,
    };
    if !root.is_dir() {
        return Err(anyhow::anyhow!(
            "workspace root '{}' is not a directory",
            root.display()
        ));
    }
    root.canonicalize()
        .with_context(|| format!("failed to canonicalize workspace root '{}'", root.display()))
}

/// Staged uploads must stay readable by the capabilities, so under the
/// workspace policy the upload dir is a plain relative path below the root.
fn resolve_upload_dir(raw: Option<String>, path_policy: PathPolicyMode) -> Result<String> {
    let upload_dir = raw
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string());
    if path_policy == PathPolicyMode::Unrestricted {
        return Ok(upload_dir);
    }

    let path = Path::new(&upload_dir);
    if path.is_absolute() {
        return Err(anyhow::anyhow!(
            "invalid upload_dir '{upload_dir}': must be relative to the workspace root under the workspace path policy"
        ));
    }
    for component in path.components() {
        match component {
            Component::Normal(segment)
                if DENIED_SEGMENTS
                    .iter()
                    .any(|denied| segment.to_string_lossy().eq_ignore_ascii_case(denied)) =>
            {
                return Err(anyhow::anyhow!(
                    "invalid upload_dir '{upload_dir}': segment '{}' is blocked by the workspace path policy",
                    segment.to_string_lossy()
                ));
            }
            Component::Normal(_) | Component::CurDir => {}
            _ => {
                return Err(anyhow::anyhow!(
                    "invalid upload_dir '{upload_dir}': '..' would leave the workspace root"
                ));
            }
        }
    }
    Ok(upload_dir)
}

pub fn resolve_runtime_config(cli: &Cli, profiles: &ProfilesFile) -> Result<RuntimeConfig> {
    let profile = select_profile(cli, profiles)?;

    let provider = if cli.provider != Provider::Auto {
        cli.provider
    } else {
        profile.provider.unwrap_or(Provider::Auto)
    };

    let workspace_root =
        resolve_workspace_root(cli.workspace_root.clone().or(profile.workspace_root))?;
    let path_policy = cli
        .path_policy
        .or(profile.path_policy)
        .unwrap_or(PathPolicyMode::Workspace);
    let upload_dir = resolve_upload_dir(profile.upload_dir, path_policy)?;

    Ok(RuntimeConfig {
        profile: cli.profile.trim().to_string(),
        config_path: cli.config_path.clone(),
        provider,
        model: cli.model.clone().or(profile.model),
        max_turns: cli
            .max_turns
            .or(profile.max_turns)
            .unwrap_or(DEFAULT_MAX_TURNS)
            .max(1),
        model_timeout_secs: cli
            .model_timeout_secs
            .or(profile.model_timeout_secs)
            .unwrap_or(120)
            .max(1),
        model_retry_attempts: cli
            .model_retry_attempts
            .or(profile.model_retry_attempts)
            .unwrap_or(3)
            .max(1),
        model_retry_delay_ms: cli
            .model_retry_delay_ms
            .or(profile.model_retry_delay_ms)
            .unwrap_or(500),
        max_tokens: profile.max_tokens.unwrap_or(4096).max(256),
        path_policy,
        workspace_root,
        upload_dir,
        keep_uploads: profile.keep_uploads.unwrap_or(false),
        output_path: profile
            .output_path
            .unwrap_or_else(|| DEFAULT_OUTPUT_PATH.to_string()),
        max_prompt_chars: profile.max_prompt_chars.unwrap_or(32_000),
        telemetry_enabled: cli
            .telemetry_enabled
            .or(profile.telemetry_enabled)
            .unwrap_or(true),
        telemetry_path: cli
            .telemetry_path
            .clone()
            .or(profile.telemetry_path)
            .unwrap_or_else(|| ".docsum/telemetry/events.jsonl".to_string()),
    })
}
