//! # Command Line Interface
//!
//! `glidepathd serve` runs the control plane; `glidepathd validate-config`
//! loads and validates a configuration file without starting anything, for
//! use in CI and admission hooks.

use clap::{Parser, Subcommand};

use crate::config::load_config;
use crate::errors::Result;

#[derive(Parser)]
#[command(name = "glidepathd")]
#[command(about = "Envoy control plane for Kubernetes")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path, layered under defaults and GLIDEPATH_ env vars.
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the control plane: informers, DAG builder, and the xDS server.
    Serve,

    /// Load and validate configuration, then exit.
    ValidateConfig,
}

/// Parses CLI arguments and runs the selected command. Called from `main`.
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let config = load_config(cli.config.as_deref())?;
            crate::serve(config).await
        }
        Commands::ValidateConfig => {
            let config = load_config(cli.config.as_deref())?;
            println!("configuration is valid");
            println!("  xds:       {}", config.xds.bind_addr());
            println!(
                "  listeners: {}:{{{}, {}}}",
                config.listeners.bind_address, config.listeners.insecure_port, config.listeners.secure_port
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["glidepathd"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_validate_config_subcommand() {
        let cli = Cli::try_parse_from(["glidepathd", "validate-config"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::ValidateConfig)));
    }

    #[test]
    fn parses_config_path_flag() {
        let cli = Cli::try_parse_from(["glidepathd", "--config", "/etc/glidepath.yaml", "serve"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some("/etc/glidepath.yaml"));
    }
}
