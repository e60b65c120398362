use anyhow::Result;

use crate::config::{ProfilesFile, RuntimeConfig};

pub fn run_profiles_list(profiles: &ProfilesFile, cfg: &RuntimeConfig) -> Result<()> {
    let mut names = profiles.profiles.keys().cloned().collect::<Vec<String>>();
    if !names.iter().any(|name| name == "default") {
        names.push("default".to_string());
    }
    names.sort();

    println!("Configured profiles (active='{}'):", cfg.profile);
    for name in names {
        let marker = if name == cfg.profile { "*" } else { " " };
        let source = if profiles.profiles.contains_key(&name) {
            "configured"
        } else {
            "implicit"
        };
        println!("{marker} {name} ({source})");
    }

    Ok(())
}

pub fn run_profiles_show(cfg: &RuntimeConfig) -> Result<()> {
    println!("Active profile: {}", cfg.profile);
    println!("Config path: {}", cfg.config_path);
    println!("Provider: {:?}", cfg.provider);
    println!(
        "Model: {}",
        cfg.model.as_deref().unwrap_or("<provider-default>")
    );
    println!("Max turns: {}", cfg.max_turns);
    println!("Model timeout (secs): {}", cfg.model_timeout_secs);
    println!("Model retry attempts: {}", cfg.model_retry_attempts);
    println!("Model retry delay (ms): {}", cfg.model_retry_delay_ms);
    println!("Max tokens: {}", cfg.max_tokens);
    println!("Path policy: {:?}", cfg.path_policy);
    println!("Workspace root: {}", cfg.workspace_root.display());
    println!("Upload dir: {}", cfg.upload_dir);
    println!("Keep uploads: {}", cfg.keep_uploads);
    println!("Default output path: {}", cfg.output_path);
    println!("Max prompt chars: {}", cfg.max_prompt_chars);
    println!("Telemetry enabled: {}", cfg.telemetry_enabled);
    println!("Telemetry path: {}", cfg.telemetry_path);
    Ok(())
}
