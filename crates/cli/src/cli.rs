use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Offline tooling for flowtool tool definitions and error handling.
///
/// Every command prints JSON on stdout.
#[derive(Parser, Debug)]
#[command(name = "flowtool", about = "Inspect tool definitions, templates and error codes")]
pub struct CliArgs {
    /// Language for user-facing messages: en or zh (overrides FLOWTOOL_LOCALE)
    #[arg(long, global = true)]
    pub locale: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check tool definitions (one object or an array) against naming and schema rules
    Validate {
        /// JSON file with tool definitions
        file: PathBuf,
    },

    /// Render tool definitions in a provider's wire format
    Schema {
        /// JSON file with tool definitions
        file: PathBuf,

        /// openai, claude, openai-compatible, or a provider name such as "anthropic"
        #[arg(long, default_value = "openai")]
        format: String,

        /// Also render a tool_choice: auto, none, required, or a tool name
        #[arg(long)]
        tool_choice: Option<String>,
    },

    /// Substitute {{path}} references in a JSON value
    Resolve {
        /// JSON value containing templates
        #[arg(long)]
        args: String,

        /// JSON object of variables
        #[arg(long, default_value = "{}")]
        vars: String,
    },

    /// Classify an error message into a code with remediation hints
    Classify {
        message: String,

        /// HTTP status observed alongside the message
        #[arg(long)]
        status: Option<u16>,
    },

    /// Print the effective configuration
    Config,
}
