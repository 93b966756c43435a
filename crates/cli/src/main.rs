mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use flowtool_core::config::{load_dotenv, Config};
use flowtool_core::Locale;
use tracing::{error, info};

use crate::cli::{CliArgs, Command};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    load_dotenv();
    let config = Config::from_env();
    let locale = match args.locale.as_deref() {
        Some(raw) => raw.parse::<Locale>().context("invalid --locale")?,
        None => config.locale,
    };
    info!(profile = config.profile_label(), locale = %locale, "flowtool starting");

    let output = match args.command {
        Command::Validate { file } => {
            let defs = commands::load_definitions(&file)?;
            let (output, invalid) = commands::validate(&defs);
            print_json(&output)?;
            if invalid > 0 {
                error!(
                    invalid,
                    total = defs.len(),
                    file = %file.display(),
                    "Tool definitions failed validation"
                );
                anyhow::bail!("{} of {} tool definitions are invalid", invalid, defs.len());
            }
            return Ok(());
        }
        Command::Schema {
            file,
            format,
            tool_choice,
        } => {
            let defs = commands::load_definitions(&file)?;
            commands::schema(&defs, &format, tool_choice.as_deref())
        }
        Command::Resolve { args, vars } => commands::resolve(&args, &vars)?,
        Command::Classify { message, status } => commands::classify(&message, status, locale),
        Command::Config => {
            config.log_summary();
            serde_json::to_value(&config).context("failed to serialize config")?
        }
    };

    print_json(&output)
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{}", rendered);
    Ok(())
}
