pub mod assembler;
pub mod capabilities;
pub mod cli;
pub mod config;
pub mod delivery;
pub mod doctor;
pub mod error;
pub mod ingest;
pub mod model;
pub mod orchestrator;
pub mod profiles;
pub mod provider;
pub mod summarize;
pub mod telemetry;

use std::path::Path;

use anyhow::Result;
use serde_json::json;
use tracing::level_filters::LevelFilter;

use crate::cli::{Cli, Commands, ProfileCommands, TelemetryCommands, command_label};
use crate::config::{RuntimeConfig, load_profiles, resolve_runtime_config};
use crate::doctor::run_doctor;
use crate::error::categorize_error;
use crate::ingest::{Artifact, format_upload_size};
use crate::profiles::{run_profiles_list, run_profiles_show};
use crate::provider::resolve_model;
use crate::summarize::{
    SummarizeRequest, build_registry, instruction_from_words, output_mode_from_args,
    run_summarize,
};
use crate::telemetry::{TelemetrySink, run_telemetry_report};

pub fn init_tracing(log_filter: &str) -> Result<()> {
    let level = log_filter
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::ERROR);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_env_filter(log_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {e}"))
}

pub async fn run_cli(cli: Cli) -> Result<()> {
    init_tracing(&cli.log_filter)?;
    let profiles = load_profiles(&cli.config_path)?;
    let cfg = resolve_runtime_config(&cli, &profiles)?;

    let telemetry = TelemetrySink::new(&cfg, command_label(&cli.command));
    telemetry.emit("command.started", json!({ "profile": cfg.profile }));

    let outcome = dispatch(cli.command, &cfg, &profiles, &telemetry).await;
    match &outcome {
        Ok(()) => telemetry.emit("command.completed", json!({})),
        Err(err) => telemetry.emit(
            "command.failed",
            json!({
                "category": categorize_error(err).code(),
                "error": format!("{err:#}"),
            }),
        ),
    }
    outcome
}

async fn dispatch(
    command: Commands,
    cfg: &RuntimeConfig,
    profiles: &config::ProfilesFile,
    telemetry: &TelemetrySink,
) -> Result<()> {
    match command {
        Commands::Summarize {
            prompt,
            files,
            output,
            output_path,
        } => {
            let artifacts = files
                .iter()
                .map(|file| Artifact::from_file(Path::new(file)))
                .collect::<Result<Vec<Artifact>>>()?;
            if artifacts.is_empty() {
                return Err(anyhow::anyhow!(
                    "no upload provided. Please upload at least one file with --file"
                ));
            }
            eprintln!("Uploaded files:");
            for artifact in &artifacts {
                eprintln!(
                    "- {} ({}, {})",
                    artifact.id(),
                    artifact.kind().label(),
                    format_upload_size(artifact.payload().len())
                );
            }

            let (model, resolved_provider, model_name) = resolve_model(cfg)?;
            tracing::info!(provider = ?resolved_provider, model = %model_name, "Using model");
            telemetry.emit(
                "model.resolved",
                json!({ "provider": format!("{resolved_provider:?}").to_lowercase(), "model": model_name }),
            );

            let request = SummarizeRequest {
                instruction: instruction_from_words(&prompt),
                artifacts,
                output_mode: output_mode_from_args(cfg, output, output_path),
            };
            let report = run_summarize(cfg, model, request, telemetry).await?;

            println!("{}", report.delivery.answer);
            for error in &report.extraction_errors {
                eprintln!(
                    "Warning: text extraction failed for '{}': {}",
                    error.artifact_id, error.reason
                );
            }
            for warning in &report.delivery.warnings {
                eprintln!("Warning: {warning}");
            }
            if let Some(path) = &report.delivery.persisted_path {
                eprintln!("Summary written to '{path}'.");
            }
            tracing::info!(
                session = %report.session_id,
                termination = report.termination.label(),
                turns = report.turns,
                invocations = report.invocations,
                "Summarize finished"
            );
        }
        Commands::Capabilities => {
            let registry = build_registry(cfg)?;
            println!("Capabilities (path_policy={}):", registry.policy().label());
            for descriptor in registry.descriptors() {
                let params = descriptor
                    .params
                    .iter()
                    .map(|param| param.name)
                    .collect::<Vec<&str>>()
                    .join(", ");
                println!("- {}({}): {}", descriptor.name, params, descriptor.purpose);
            }
        }
        Commands::Doctor => {
            run_doctor(cfg)?;
        }
        Commands::Profiles { command } => match command {
            ProfileCommands::List => run_profiles_list(profiles, cfg)?,
            ProfileCommands::Show => run_profiles_show(cfg)?,
        },
        Commands::Telemetry { command } => match command {
            TelemetryCommands::Report { path, limit } => run_telemetry_report(cfg, path, limit)?,
        },
    }

    Ok(())
}
