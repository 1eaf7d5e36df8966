//! Config command - inspect and edit the spendlog config file.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;
use serde_json::Value;

use spendlog_core::SpendlogConfig;

use super::{read_config, resolve_config_path};

const API_KEY: &str = "ocr.api_key";
const MASK: &str = "********";

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration (API key masked)
    Show,

    /// Write a config file with default values
    Init {
        /// Where to write it (default: the active config path)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print one value by dotted key, e.g. "import.batch_size"
    Get { key: String },

    /// Change one value by dotted key; the value is read as JSON, else as text
    Set { key: String, value: String },

    /// Print the active config path and whether the file exists
    Path,
}

/// Config as a JSON tree addressed by dotted keys.
struct ConfigDocument(Value);

impl ConfigDocument {
    fn from_config(config: &SpendlogConfig) -> anyhow::Result<Self> {
        Ok(Self(serde_json::to_value(config)?))
    }

    fn into_config(self, key: &str) -> anyhow::Result<SpendlogConfig> {
        serde_json::from_value(self.0)
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e))
    }

    fn pointer(key: &str) -> String {
        format!("/{}", key.replace('.', "/"))
    }

    fn masked(mut self) -> Self {
        if let Some(secret) = self.0.pointer_mut(&Self::pointer(API_KEY)) {
            *secret = Value::String(MASK.to_string());
        }
        self
    }

    fn lookup(&self, key: &str) -> anyhow::Result<&Value> {
        self.0
            .pointer(&Self::pointer(key))
            .ok_or_else(|| anyhow::anyhow!("Configuration key not found: {}", key))
    }

    /// Replace an existing leaf. The API key is omitted while unset, so it may be added.
    fn assign(&mut self, key: &str, value: Value) -> anyhow::Result<()> {
        let (section, field) = key
            .rsplit_once('.')
            .ok_or_else(|| anyhow::anyhow!("Configuration key not found: {}", key))?;
        let table = self
            .0
            .pointer_mut(&Self::pointer(section))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| anyhow::anyhow!("Configuration key not found: {}", key))?;
        if !table.contains_key(field) && key != API_KEY {
            anyhow::bail!("Configuration key not found: {}", key);
        }
        table.insert(field.to_string(), value);
        Ok(())
    }
}

pub async fn run(args: ConfigArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let path = resolve_config_path(config_path);

    match args.command {
        ConfigCommand::Show => {
            if !path.exists() {
                eprintln!(
                    "{} No config file at {}, showing defaults.",
                    style("ℹ").blue(),
                    path.display()
                );
            }
            let doc = ConfigDocument::from_config(&read_config(&path, false)?)?.masked();
            println!("{}", serde_json::to_string_pretty(&doc.0)?);
        }
        ConfigCommand::Init { output, force } => {
            let target = output.unwrap_or(path);
            if target.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at {}. Use --force to overwrite.",
                    target.display()
                );
            }
            write_config(&target, &SpendlogConfig::default())?;
            println!(
                "{} Created configuration file at {}",
                style("✓").green(),
                target.display()
            );
        }
        ConfigCommand::Get { key } => {
            let doc = ConfigDocument::from_config(&read_config(&path, false)?)?.masked();
            println!("{}", serde_json::to_string_pretty(doc.lookup(&key)?)?);
        }
        ConfigCommand::Set { key, value } => {
            let parsed = serde_json::from_str(&value).unwrap_or(Value::String(value));
            let shown = if key == API_KEY {
                format!("\"{MASK}\"")
            } else {
                parsed.to_string()
            };

            let mut doc = ConfigDocument::from_config(&read_config(&path, false)?)?;
            doc.assign(&key, parsed)?;
            write_config(&path, &doc.into_config(&key)?)?;
            println!("{} Set {} = {}", style("✓").green(), key, shown);
        }
        ConfigCommand::Path => {
            let status = if path.exists() {
                style("exists").green()
            } else {
                style("not created, run 'spendlog config init'").yellow()
            };
            println!("{} ({})", path.display(), status);
        }
    }

    Ok(())
}

fn write_config(path: &Path, config: &SpendlogConfig) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    config.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> ConfigDocument {
        ConfigDocument::from_config(&SpendlogConfig::default()).unwrap()
    }

    #[test]
    fn test_lookup_by_dotted_key() {
        let doc = document();
        assert_eq!(doc.lookup("import.batch_size").unwrap(), &Value::from(10));
        assert!(doc.lookup("import.nope").is_err());
    }

    #[test]
    fn test_assign_only_known_keys() {
        let mut doc = document();
        doc.assign("import.batch_size", Value::from(25)).unwrap();
        assert_eq!(doc.into_config("import.batch_size").unwrap().import.batch_size, 25);

        let mut doc = document();
        assert!(doc.assign("import.nope", Value::from(1)).is_err());
        assert!(doc.assign("batch_size", Value::from(1)).is_err());
    }

    #[test]
    fn test_api_key_is_masked() {
        let mut doc = document();
        doc.assign(API_KEY, Value::from("secret-key")).unwrap();
        let masked = doc.masked();
        assert_eq!(masked.lookup(API_KEY).unwrap(), &Value::from(MASK));
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let mut doc = document();
        doc.assign("import.batch_size", Value::from("many")).unwrap();
        assert!(doc.into_config("import.batch_size").is_err());
    }
}
