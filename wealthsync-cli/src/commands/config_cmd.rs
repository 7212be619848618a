use clap::{Args, Subcommand, ValueEnum};
use std::fs;

use crate::config::Config;

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Manage configuration
#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Initialize configuration file
    Init,
}

const DEFAULT_CONFIG: &str = r#"# wealth configuration

# Directory holding the local document (default: platform data dir)
# data_dir: ~/.local/share/wealth

sync:
  # Relay server; leave unset to run in demo mode
  # server_url: http://localhost:8080
  debounce_ms: 1000
  ui_timeout_ms: 2000
"#;

impl ConfigCommand {
    pub fn run(
        &self,
        config: &Config,
        config_path: Option<std::path::PathBuf>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => print_config(config),
                }
                Ok(())
            }

            ConfigSubcommand::Init => {
                let config_path = config_path.unwrap_or_else(Config::default_config_path);

                if config_path.exists() {
                    println!("Config file already exists: {}", config_path.display());
                    println!("Use 'wealth config show' to view current configuration.");
                    return Ok(());
                }

                if let Some(parent) = config_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&config_path, DEFAULT_CONFIG)?;

                println!("Created config file: {}", config_path.display());
                println!("\nEdit this file to customize your settings.");
                Ok(())
            }
        }
    }
}

fn print_config(config: &Config) {
    println!("Configuration");
    println!("=============\n");

    if let Some(path) = &config.config_file {
        println!("Config file: {}", path.display());
    } else {
        println!(
            "Config file: {} (not found)",
            Config::default_config_path().display()
        );
    }
    println!();

    println!("data_dir: {}", config.data_dir.value.display());
    println!("  source: {}", config.data_dir.source);
    println!();

    match &config.sync.server_url {
        Some(url) => println!("sync.server_url: {}", url),
        None => println!("sync.server_url: (unset, demo mode)"),
    }
    println!("sync.debounce_ms: {}", config.sync.debounce_ms);
    println!("sync.ui_timeout_ms: {}", config.sync.ui_timeout_ms);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, DEFAULT_CONFIG).unwrap();

        let config = Config::load(Some(path)).unwrap();
        assert!(config.sync.server_url.is_none());
        assert_eq!(config.sync.debounce_ms, 1000);
        assert_eq!(config.sync.ui_timeout_ms, 2000);
    }
}
