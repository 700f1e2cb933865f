//! Command line argument parsing
//!
//! Subcommands:
//! - `check`: Open a script in a session, resolve its directives and report
//! - `defaults`: Print the default references and imports
//! - `show-config`: Show configuration discovery information

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug)]
pub enum ExecutionMode {
    Check(CheckConfig),
    Defaults { config_override: Option<PathBuf> },
    ShowConfig,
}

#[derive(Debug)]
pub struct CheckConfig {
    pub script: PathBuf,
    pub config_override: Option<PathBuf>,
    pub extra_references: Vec<String>,
    pub json: bool,
}

#[derive(Debug, Parser)]
#[command(name = "scripthost")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Open script documents in host sessions and resolve their references")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Open a script, resolve its reference directives and print the result
    Check {
        /// Path to the script file
        script: PathBuf,
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
        /// Additional default reference (can be used multiple times)
        #[arg(short = 'r', long = "reference", value_name = "LOCATION")]
        references: Vec<String>,
        /// Print the report as JSON
        #[arg(long = "json")]
        json: bool,
    },
    /// Print the default reference set and imports
    Defaults {
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
    },
    /// Show configuration discovery information
    ShowConfig,
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    pub fn mode(&self) -> Result<ExecutionMode, String> {
        match &self.command {
            Some(Commands::Check {
                script,
                config,
                references,
                json,
            }) => {
                if script.as_os_str().is_empty() {
                    return Err("Script path must not be empty".to_string());
                }
                Ok(ExecutionMode::Check(CheckConfig {
                    script: script.clone(),
                    config_override: config.clone(),
                    extra_references: references.clone(),
                    json: *json,
                }))
            }
            Some(Commands::Defaults { config }) => Ok(ExecutionMode::Defaults {
                config_override: config.clone(),
            }),
            Some(Commands::ShowConfig) => Ok(ExecutionMode::ShowConfig),
            None => Err("No command given".to_string()),
        }
    }
}
