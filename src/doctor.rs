use std::path::Path;

use anyhow::Result;

use crate::config::RuntimeConfig;
use crate::orchestrator::LoopSettings;
use crate::provider::{detect_provider, env_present};
use crate::summarize::build_registry;

fn directory_writable(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let scratch = dir.join(format!(".docsum-doctor-{}", std::process::id()));
    std::fs::write(&scratch, b"")?;
    std::fs::remove_file(&scratch)?;
    Ok(())
}

pub fn run_doctor(cfg: &RuntimeConfig) -> Result<()> {
    println!(
        "Active profile: '{}' (config: {})",
        cfg.profile, cfg.config_path
    );

    let checks = [
        ("OPENAI_API_KEY", env_present("OPENAI_API_KEY")),
        ("ANTHROPIC_API_KEY", env_present("ANTHROPIC_API_KEY")),
        ("DEEPSEEK_API_KEY", env_present("DEEPSEEK_API_KEY")),
        ("GROQ_API_KEY", env_present("GROQ_API_KEY")),
        ("OLLAMA_HOST", env_present("OLLAMA_HOST")),
    ];

    println!("Provider environment check:");
    for (key, ok) in checks {
        let status = if ok { "set" } else { "missing" };
        println!("- {key}: {status}");
    }

    match detect_provider() {
        Some(provider) => println!("Auto provider resolution: {:?}", provider),
        None => {
            println!("Auto provider resolution: none");
            println!("Tip: export one provider key or run with --provider ollama");
        }
    }
    println!(
        "Model override: {}",
        cfg.model.as_deref().unwrap_or("<provider-default>")
    );

    let registry = build_registry(cfg)?;
    println!(
        "Workspace: root={} path_policy={}",
        cfg.workspace_root.display(),
        registry.policy().label()
    );

    let upload_root = cfg.upload_root();
    match directory_writable(&upload_root) {
        Ok(()) => println!("Upload directory check: ok ({})", upload_root.display()),
        Err(err) => println!(
            "Upload directory check: failed ({}): {err}",
            upload_root.display()
        ),
    }

    let settings = LoopSettings::from_config(cfg);
    println!(
        "Loop: max_turns={} model_timeout_secs={} retry_attempts={} retry_delay_ms={} max_tokens={}",
        settings.max_turns,
        settings.model_timeout.as_secs(),
        settings.retry_attempts,
        settings.retry_delay.as_millis(),
        cfg.max_tokens
    );
    println!(
        "Output: default_path={} max_prompt_chars={} keep_uploads={}",
        cfg.output_path, cfg.max_prompt_chars, cfg.keep_uploads
    );
    println!(
        "Telemetry: enabled={} path={}",
        cfg.telemetry_enabled, cfg.telemetry_path
    );

    Ok(())
}
