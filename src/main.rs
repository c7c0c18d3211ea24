//! carprice - command-line entry point

use clap::Parser;
use carprice::cli::{cmd_info, cmd_predict, cmd_train, resolve_config, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "carprice=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = resolve_config(cli.config.as_deref(), cli.artifact_dir.as_deref())?;

    match cli.command {
        Commands::Train { train, test, format, alpha } => {
            cmd_train(config, &train, &test, format.as_deref(), alpha)?;
        }
        Commands::Predict { record, data, output } => {
            cmd_predict(config, record.as_deref(), data.as_deref(), output.as_deref())?;
        }
        Commands::Info { data } => {
            cmd_info(config, data.as_deref())?;
        }
    }

    Ok(())
}
