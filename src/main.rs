use anyhow::Result;
use clap::Parser;

use docsum::cli::Cli;
use docsum::error::{categorize_error, format_cli_error};
use docsum::run_cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Err(err) = run_cli(cli).await {
        eprintln!("{}", format_cli_error(&err));
        tracing::error!(category = %categorize_error(&err).code(), error = %err, "command failed");
        std::process::exit(1);
    }

    Ok(())
}
