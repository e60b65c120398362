use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Auto,
    Openai,
    Anthropic,
    Deepseek,
    Groq,
    Ollama,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathPolicyMode {
    Workspace,
    Unrestricted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputModeArg {
    Display,
    Persist,
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommands {
    #[command(about = "List configured profiles and highlight the active profile")]
    List,
    #[command(about = "Show the active profile's resolved runtime settings")]
    Show,
}

#[derive(Debug, Subcommand)]
pub enum TelemetryCommands {
    #[command(about = "Summarize telemetry events from a JSONL stream")]
    Report {
        #[arg(long)]
        path: Option<String>,
        #[arg(long, default_value_t = 5000)]
        limit: usize,
    },
}

const CLI_EXAMPLES: &str = "Examples:\n\
  docsum summarize \"Summarize the quarterly results\" --file report.pdf\n\
  docsum summarize \"Compare both proposals\" --file a.txt --file b.pdf --output persist\n\
  docsum summarize --file notes.txt --output persist --output-path summaries/notes.txt\n\
  docsum --provider anthropic --max-turns 6 summarize --file paper.pdf\n\
  docsum capabilities\n\
  docsum doctor\n\
  docsum telemetry report --limit 2000\n\
\n\
Path policy:\n\
  - workspace (default): capabilities may only touch paths under --workspace-root.\n\
  - unrestricted: capabilities read and write any path the model names.";

#[derive(Debug, Parser)]
#[command(name = "docsum")]
#[command(about = "Summarize text and PDF documents with a tool-using language model")]
#[command(after_long_help = CLI_EXAMPLES)]
pub struct Cli {
    #[arg(long, env = "DOCSUM_PROVIDER", value_enum, default_value_t = Provider::Auto)]
    pub provider: Provider,

    #[arg(long, env = "DOCSUM_MODEL")]
    pub model: Option<String>,

    #[arg(long, env = "DOCSUM_PROFILE", default_value = "default")]
    pub profile: String,

    #[arg(long, env = "DOCSUM_CONFIG", default_value = ".docsum/config.toml")]
    pub config_path: String,

    #[arg(long, env = "DOCSUM_MAX_TURNS")]
    pub max_turns: Option<u32>,

    #[arg(long, env = "DOCSUM_MODEL_TIMEOUT_SECS")]
    pub model_timeout_secs: Option<u64>,

    #[arg(long, env = "DOCSUM_MODEL_RETRY_ATTEMPTS")]
    pub model_retry_attempts: Option<u32>,

    #[arg(long, env = "DOCSUM_MODEL_RETRY_DELAY_MS")]
    pub model_retry_delay_ms: Option<u64>,

    #[arg(long, env = "DOCSUM_PATH_POLICY", value_enum)]
    pub path_policy: Option<PathPolicyMode>,

    #[arg(long, env = "DOCSUM_WORKSPACE_ROOT")]
    pub workspace_root: Option<String>,

    #[arg(long, env = "DOCSUM_TELEMETRY_ENABLED", action = clap::ArgAction::Set)]
    pub telemetry_enabled: Option<bool>,

    #[arg(long, env = "DOCSUM_TELEMETRY_PATH")]
    pub telemetry_path: Option<String>,

    #[arg(long, env = "RUST_LOG", default_value = "error")]
    pub log_filter: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Upload documents and print (or persist) a structured summary")]
    Summarize {
        prompt: Vec<String>,
        #[arg(long = "file", short = 'f')]
        files: Vec<String>,
        #[arg(long, value_enum, default_value_t = OutputModeArg::Display)]
        output: OutputModeArg,
        #[arg(long, env = "DOCSUM_OUTPUT_PATH")]
        output_path: Option<String>,
    },
    #[command(about = "List the capabilities the model may invoke")]
    Capabilities,
    #[command(about = "Validate provider environment, workspace and loop configuration")]
    Doctor,
    #[command(about = "Inspect profile configuration and active resolved profile state")]
    Profiles {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    #[command(about = "Telemetry utilities and reporting")]
    Telemetry {
        #[command(subcommand)]
        command: TelemetryCommands,
    },
}

pub fn command_label(command: &Commands) -> String {
    match command {
        Commands::Summarize { .. } => "summarize".to_string(),
        Commands::Capabilities => "capabilities".to_string(),
        Commands::Doctor => "doctor".to_string(),
        Commands::Profiles { command } => match command {
            ProfileCommands::List => "profiles.list".to_string(),
            ProfileCommands::Show => "profiles.show".to_string(),
        },
        Commands::Telemetry { command } => match command {
            TelemetryCommands::Report { .. } => "telemetry.report".to_string(),
        },
    }
}
