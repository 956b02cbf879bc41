#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::env;
use std::path;

use anyhow::bail;
use anyhow::Result;
use clap::ArgMatches;
use clap::Command;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;
use tokio::fs;

use crate::domain::models::ProviderName;

static CONFIG: Lazy<DashMap<String, String>> = Lazy::new(DashMap::new);

#[derive(Clone, Copy, Debug, Eq, PartialEq, EnumIter, EnumVariantNames, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ConfigKey {
    ConfigFile,
    ExportDir,
    Provider,
    ServerURL,
    StorageDir,
    StorageKey,
    SystemPrompt,
    Username,
}

/// Root of everything chatline writes outside of exports.
pub fn cache_dir() -> path::PathBuf {
    return dirs::cache_dir()
        .unwrap_or_else(env::temp_dir)
        .join("chatline");
}

pub struct Config {}

impl Config {
    pub fn get(key: ConfigKey) -> String {
        if let Some(val) = CONFIG.get(&key.to_string()) {
            return val.to_string();
        }

        return "".to_string();
    }

    pub fn set(key: ConfigKey, value: &str) {
        CONFIG.insert(key.to_string(), value.to_string());
    }

    pub fn default(key: ConfigKey) -> String {
        if key == ConfigKey::Username {
            return env::var("USER").unwrap_or_else(|_| return "".to_string());
        }

        #[cfg(not(target_os = "macos"))]
        let config_path = cache_dir().join("config.toml");
        #[cfg(target_os = "macos")]
        let config_path = dirs::home_dir()
            .unwrap_or_else(env::temp_dir)
            .join(".config/chatline/config.toml");

        let storage_dir = cache_dir().join("storage");
        let default_provider = ProviderName::Sse.to_string();

        let res = match key {
            ConfigKey::ExportDir => ".".to_string(),
            ConfigKey::Provider => default_provider,
            ConfigKey::ServerURL => "http://localhost:8000".to_string(),
            ConfigKey::StorageDir => storage_dir.to_string_lossy().to_string(),
            ConfigKey::StorageKey => "chatbot-ui-multiturn".to_string(),
            ConfigKey::SystemPrompt => "".to_string(),

            // Special
            ConfigKey::ConfigFile => config_path.to_string_lossy().to_string(),
            ConfigKey::Username => "".to_string(),
        };

        return res;
    }

    /// Layers defaults, then the TOML config file, then CLI arguments and their
    /// environment variables.
    pub async fn load(cmd: Command, clap_arg_matches: Vec<&ArgMatches>) -> Result<()> {
        for key in ConfigKey::iter() {
            Config::set(key, &Config::default(key))
        }

        let mut config_file = Config::default(ConfigKey::ConfigFile);
        for matches in clap_arg_matches.as_slice() {
            if let Ok(Some(arg_config_file)) =
                matches.try_get_one::<String>(&ConfigKey::ConfigFile.to_string())
            {
                config_file = arg_config_file.to_string();
            }
        }

        let config_path = path::PathBuf::from(config_file);
        if config_path.exists() {
            let toml_str = fs::read_to_string(config_path).await?;
            let doc = toml_str.parse::<toml_edit::Document>()?;

            for key in ConfigKey::iter() {
                let val = match doc.get(&key.to_string()) {
                    Some(val) => val,
                    None => continue,
                };

                // Use clap value parsers to do validation.
                let mut possible_values = vec![];
                if let Some(arg) = cmd
                    .get_arguments()
                    .find(|e| return e.get_long() == Some(key.to_string().as_str()))
                {
                    possible_values = arg
                        .get_possible_values()
                        .iter()
                        .map(|e| return e.get_name().to_string())
                        .collect::<Vec<String>>();
                }

                if let Some(val_int) = val.as_integer() {
                    Config::set(key, &val_int.to_string());
                } else if let Some(val_str) = val.as_str() {
                    if val_str.is_empty() {
                        continue;
                    }
                    if !possible_values.is_empty()
                        && !possible_values.contains(&val_str.to_string())
                    {
                        bail!(format!("config.toml has an invalid value for key '{key}': {val_str}\nPossible values are: {}", possible_values.join(", ")));
                    }
                    Config::set(key, val_str);
                } else {
                    bail!(format!("config.toml has an unsupported value type for key '{key}'"));
                }
            }
        }

        for key in ConfigKey::iter() {
            for matches in clap_arg_matches.as_slice() {
                if let Ok(Some(val)) = matches.try_get_one::<String>(&key.to_string()) {
                    if val.is_empty() {
                        continue;
                    }
                    Config::set(key, val)
                }
            }
        }

        tracing::debug!(
            provider = Config::get(ConfigKey::Provider),
            server_url = Config::get(ConfigKey::ServerURL),
            storage_dir = Config::get(ConfigKey::StorageDir),
            storage_key = Config::get(ConfigKey::StorageKey),
            export_dir = Config::get(ConfigKey::ExportDir),
            "config"
        );

        return Ok(());
    }

    pub fn serialize_default(cmd: Command) -> String {
        let toml_str = ConfigKey::iter()
            .filter_map(|key| {
                if key == ConfigKey::ConfigFile {
                    return None;
                }

                if key == ConfigKey::Username {
                    return Some(
                        "# Your user name shown next to your messages.\n# username = \"\""
                            .to_string(),
                    );
                }

                let arg = cmd
                    .get_arguments()
                    .find(|e| return e.get_long() == Some(key.to_string().as_str()))?;

                let mut description = arg
                    .get_help()?
                    .to_string()
                    .split("[default:")
                    .next()
                    .unwrap_or("")
                    .trim()
                    .to_string();

                if !arg.get_possible_values().is_empty() {
                    let possible_values = arg
                        .get_possible_values()
                        .iter()
                        .map(|e| return e.get_name().to_string())
                        .collect::<Vec<String>>()
                        .join(", ");
                    description = format!("{description} [possible values: {possible_values}]");
                }

                let val = Config::default(key);
                if val.is_empty() {
                    return Some(format!("# {description}\n# {key} = \"\""));
                }

                return Some(format!("# {description}\n{key} = {}", toml_edit::value(val)));
            })
            .collect::<Vec<String>>()
            .join("\n\n");

        return toml_str;
    }
}
