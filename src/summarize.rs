use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;

use crate::assembler::{OutputMode, artifact_refs, assemble, enforce_prompt_limit};
use crate::capabilities::{CapabilityRegistry, PathPolicy};
use crate::cli::{OutputModeArg, PathPolicyMode};
use crate::config::RuntimeConfig;
use crate::delivery::{DeliveryResult, deliver};
use crate::ingest::{Artifact, ExtractionError, StagedArtifact, ingest, stage_artifacts};
use crate::model::ModelService;
use crate::orchestrator::{LoopSettings, Orchestrator, Termination, new_session_id};
use crate::telemetry::TelemetrySink;

pub const DEFAULT_INSTRUCTION: &str = "Read the files and provide a summary";

#[derive(Debug, Clone)]
pub struct SummarizeRequest {
    pub instruction: String,
    pub artifacts: Vec<Artifact>,
    pub output_mode: OutputMode,
}

#[derive(Debug, Clone)]
pub struct SummaryReport {
    pub session_id: String,
    pub delivery: DeliveryResult,
    pub termination: Termination,
    pub turns: usize,
    pub invocations: usize,
    pub extraction_errors: Vec<ExtractionError>,
}

pub fn instruction_from_words(words: &[String]) -> String {
    let joined = words.join(" ");
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        DEFAULT_INSTRUCTION.to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn output_mode_from_args(
    cfg: &RuntimeConfig,
    output: OutputModeArg,
    output_path: Option<String>,
) -> OutputMode {
    match output {
        OutputModeArg::Display => OutputMode::Display,
        OutputModeArg::Persist => OutputMode::Persist {
            path: output_path
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| cfg.output_path.clone()),
        },
    }
}

pub fn build_registry(cfg: &RuntimeConfig) -> Result<CapabilityRegistry> {
    let policy = match cfg.path_policy {
        PathPolicyMode::Workspace => PathPolicy::workspace(&cfg.workspace_root)?,
        PathPolicyMode::Unrestricted => PathPolicy::Unrestricted,
    };
    Ok(CapabilityRegistry::new(policy))
}

/// Location string the registry will resolve back to `path`.
fn reference_location(cfg: &RuntimeConfig, path: &Path) -> String {
    if cfg.path_policy == PathPolicyMode::Workspace
        && let Ok(relative) = path.strip_prefix(&cfg.workspace_root)
    {
        return relative.display().to_string();
    }
    path.display().to_string()
}

fn discard_uploads(dir: &Path) {
    if let Err(err) = std::fs::remove_dir_all(dir) {
        tracing::warn!(path = %dir.display(), error = %err, "failed to remove staged uploads");
    }
}

/// Runs one request end to end: stage, ingest, assemble, loop, deliver.
pub async fn run_summarize(
    cfg: &RuntimeConfig,
    model: Arc<dyn ModelService>,
    request: SummarizeRequest,
    telemetry: &TelemetrySink,
) -> Result<SummaryReport> {
    if request.artifacts.is_empty() {
        return Err(anyhow::anyhow!(
            "no upload provided. Please upload at least one file with --file"
        ));
    }
    enforce_prompt_limit(&request.instruction, cfg.max_prompt_chars)?;

    let registry = build_registry(cfg)?;
    let session_id = new_session_id();
    let upload_dir = cfg.upload_root().join(&session_id);
    let staged = stage_artifacts(&upload_dir, &request.artifacts)
        .context("failed to stage upload for the session")?;

    let (extracted, extraction_errors) = ingest(&request.artifacts);
    tracing::info!(
        session = %session_id,
        artifacts = request.artifacts.len(),
        extracted = extracted.len(),
        extracted_chars = extracted.total_chars(),
        failed = extraction_errors.len(),
        "Ingested uploads"
    );

    let relocated = staged
        .iter()
        .map(|artifact| {
            let location = reference_location(cfg, &artifact.location);
            registry
                .policy()
                .resolve(&location)
                .map_err(|err| anyhow::anyhow!("staged upload is not readable by capabilities: {err}"))?;
            Ok(StagedArtifact {
                location: location.into(),
                ..artifact.clone()
            })
        })
        .collect::<Result<Vec<StagedArtifact>>>();
    let relocated = match relocated {
        Ok(relocated) => relocated,
        Err(err) => {
            if !cfg.keep_uploads {
                discard_uploads(&upload_dir);
            }
            return Err(err);
        }
    };
    let refs = artifact_refs(&relocated, &extraction_errors);
    let instruction = assemble(&request.instruction, &refs, &request.output_mode);
    tracing::debug!(session = %session_id, instruction = %instruction, "Assembled instruction");

    let policy = registry.policy().clone();
    let orchestrator = Orchestrator::new(
        model,
        registry,
        LoopSettings::from_config(cfg),
        telemetry.clone(),
    );
    let outcome = orchestrator.run(&session_id, &instruction).await;
    if !cfg.keep_uploads {
        discard_uploads(&upload_dir);
    }
    let outcome = outcome?;

    let delivery = deliver(&outcome.answer, &request.output_mode, &outcome.turns, &policy);
    let session_telemetry = telemetry.for_session(&session_id);
    for warning in &delivery.warnings {
        session_telemetry.emit(
            "delivery.warning",
            json!({ "mode": request.output_mode.label(), "warning": warning }),
        );
    }

    Ok(SummaryReport {
        invocations: outcome.invocation_count(),
        turns: outcome.turns.len(),
        session_id: outcome.session_id,
        termination: outcome.termination,
        delivery,
        extraction_errors,
    })
}
