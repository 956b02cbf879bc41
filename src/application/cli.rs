use std::env;
use std::io;
use std::path;

use anyhow::bail;
use anyhow::Result;
use clap::builder::PossibleValuesParser;
use clap::value_parser;
use clap::Arg;
use clap::ArgAction;
use clap::ArgMatches;
use clap::Command;
use clap_complete::generate;
use clap_complete::Generator;
use clap_complete::Shell;
use strum::VariantNames;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use yansi::Paint;

use super::terminal::help_text;
use crate::configuration::cache_dir;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Message;
use crate::domain::models::ProviderName;
use crate::domain::models::Role;
use crate::domain::models::StorageBox;
use crate::domain::services::export;
use crate::domain::services::MessageStore;
use crate::domain::services::CLEARED_GREETING;
use crate::infrastructure::storage::file::FileStorage;

fn print_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
    std::process::exit(0);
}

pub fn log_path() -> path::PathBuf {
    let log_dir = env::var("CHATLINE_LOG_DIR")
        .map(path::PathBuf::from)
        .unwrap_or_else(|_| return cache_dir());

    return log_dir.join("debug.log");
}

async fn create_config_file() -> Result<()> {
    let config_file_path_str = Config::default(ConfigKey::ConfigFile);
    let config_file_path = path::PathBuf::from(&config_file_path_str);
    if config_file_path.exists() {
        bail!(format!(
            "Config file already exists at {config_file_path_str}"
        ));
    }

    if let Some(parent) = config_file_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut file = fs::File::create(&config_file_path).await?;
    file.write_all(Config::serialize_default(build()).as_bytes())
        .await?;

    println!("Created default config file at {config_file_path_str}");
    return Ok(());
}

async fn export_conversation() -> Result<()> {
    let storage: StorageBox = Box::<FileStorage>::default();
    let mut store = MessageStore::load(&storage, &Config::get(ConfigKey::StorageKey)).await;
    store.set_system_prompt(&Config::get(ConfigKey::SystemPrompt));

    let file_path = export::write(&store, path::Path::new(&Config::get(ConfigKey::ExportDir))).await?;
    println!("Exported conversation to {}", file_path.display());

    return Ok(());
}

async fn clear_conversation() -> Result<()> {
    let storage: StorageBox = Box::<FileStorage>::default();
    let key = Config::get(ConfigKey::StorageKey);
    let store = MessageStore::new(vec![Message::new(Role::Assistant, CLEARED_GREETING)]);
    store.save(&storage, &key).await?;

    println!("Cleared conversation {key}");
    return Ok(());
}

fn subcommand_completions() -> Command {
    return Command::new("completions")
        .about("Generates shell completions.")
        .arg(
            clap::Arg::new("shell")
                .short('s')
                .long("shell")
                .help("Which shell to generate completions for.")
                .action(ArgAction::Set)
                .value_parser(value_parser!(Shell))
                .required(true),
        );
}

fn subcommand_config() -> Command {
    return Command::new("config")
        .about("Configuration file options.")
        .subcommand(
            Command::new("create").about("Saves the default config file to the configuration file path. This command will fail if the file exists already.")
        )
        .subcommand(
            Command::new("default").about("Outputs the default configuration file to stdout.")
        )
        .subcommand(
            Command::new("path").about("Returns the default path for the configuration file.")
        );
}

fn subcommand_debug() -> Command {
    return Command::new("debug")
        .about("Debug helpers for chatline")
        .hide(true)
        .subcommand(
            Command::new("log-path").about("Output path to debug log file generated when running chatline with environment variable RUST_LOG=chatline")
        )
        .subcommand(
            Command::new("enum-config").about("List all config keys as strings.")
        );
}

fn arg_config(key: ConfigKey, env: &'static str, help: String) -> Arg {
    return Arg::new(key.to_string())
        .long(key.to_string())
        .env(env)
        .num_args(1)
        .help(help)
        .global(true);
}

pub fn build() -> Command {
    let commands_text = help_text()
        .split('\n')
        .map(|line| {
            if line.starts_with('-') {
                return format!("  {line}");
            }
            if line.starts_with("COMMANDS:") {
                return Paint::new(format!("CHAT {line}"))
                    .underline()
                    .bold()
                    .to_string();
            }
            return line.to_string();
        })
        .collect::<Vec<String>>()
        .join("\n");

    let about = format!(
        "{}\n\nVersion: {}",
        env!("CARGO_PKG_DESCRIPTION"),
        env!("CARGO_PKG_VERSION"),
    );

    return Command::new("chatline")
        .about(about)
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .after_help(commands_text)
        .arg_required_else_help(false)
        .subcommand(Command::new("chat").about("Continue the stored conversation in the terminal. This is the default."))
        .subcommand(Command::new("export").about("Writes the stored conversation to a JSON file in the export directory."))
        .subcommand(Command::new("clear").about("Resets the stored conversation."))
        .subcommand(subcommand_completions())
        .subcommand(subcommand_config())
        .subcommand(subcommand_debug())
        .arg(
            arg_config(
                ConfigKey::Provider,
                "CHATLINE_PROVIDER",
                format!("The provider requesting replies from the chat server. [default: {}]", Config::default(ConfigKey::Provider)),
            )
            .short('p')
            .value_parser(PossibleValuesParser::new(ProviderName::VARIANTS)),
        )
        .arg(arg_config(
            ConfigKey::ServerURL,
            "CHATLINE_SERVER_URL",
            format!("Base URL of the chat server serving /api/chat and /api/chat/stream. [default: {}]", Config::default(ConfigKey::ServerURL)),
        ))
        .arg(arg_config(
            ConfigKey::StorageKey,
            "CHATLINE_STORAGE_KEY",
            format!("Name of the slot the conversation is persisted under. [default: {}]", Config::default(ConfigKey::StorageKey)),
        ))
        .arg(arg_config(
            ConfigKey::StorageDir,
            "CHATLINE_STORAGE_DIR",
            format!("Directory holding persisted conversations. [default: {}]", Config::default(ConfigKey::StorageDir)),
        ))
        .arg(arg_config(
            ConfigKey::ExportDir,
            "CHATLINE_EXPORT_DIR",
            format!("Directory exports are written to. [default: {}]", Config::default(ConfigKey::ExportDir)),
        ))
        .arg(arg_config(
            ConfigKey::SystemPrompt,
            "CHATLINE_SYSTEM_PROMPT",
            "System prompt sent ahead of the conversation with every request.".to_string(),
        ))
        .arg(arg_config(
            ConfigKey::Username,
            "CHATLINE_USERNAME",
            "Your user name shown next to your messages.".to_string(),
        ))
        .arg(
            arg_config(
                ConfigKey::ConfigFile,
                "CHATLINE_CONFIG_FILE",
                format!("Path to configuration file [default: {}]", Config::default(ConfigKey::ConfigFile)),
            )
            .short('c'),
        );
}

async fn load_config(matches: &ArgMatches, subcmd_matches: Option<&ArgMatches>) -> Result<()> {
    let mut all_matches = vec![matches];
    if let Some(subcmd_matches) = subcmd_matches {
        all_matches.push(subcmd_matches);
    }

    return Config::load(build(), all_matches).await;
}

/// Parses arguments and runs one-shot subcommands. Returns true when the chat
/// should start.
pub async fn parse() -> Result<bool> {
    let matches = build().get_matches();

    match matches.subcommand() {
        Some(("debug", debug_matches)) => {
            match debug_matches.subcommand() {
                Some(("log-path", _)) => {
                    println!("{}", log_path().display());
                }
                Some(("enum-config", _)) => {
                    let res = ConfigKey::VARIANTS.join("\n");
                    println!("{}", res);
                }
                _ => {
                    subcommand_debug().print_long_help()?;
                }
            }

            return Ok(false);
        }
        Some(("chat", subcmd_matches)) => {
            load_config(&matches, Some(subcmd_matches)).await?;
        }
        Some(("export", subcmd_matches)) => {
            load_config(&matches, Some(subcmd_matches)).await?;
            export_conversation().await?;
            return Ok(false);
        }
        Some(("clear", subcmd_matches)) => {
            load_config(&matches, Some(subcmd_matches)).await?;
            clear_conversation().await?;
            return Ok(false);
        }
        Some(("completions", subcmd_matches)) => {
            if let Some(completions) = subcmd_matches.get_one::<Shell>("shell").copied() {
                let mut app = build();
                print_completions(completions, &mut app);
            }
        }
        Some(("config", subcmd_matches)) => match subcmd_matches.subcommand() {
            Some(("create", _)) => {
                create_config_file().await?;
                return Ok(false);
            }
            Some(("default", _)) => {
                println!("{}", Config::serialize_default(build()));
                return Ok(false);
            }
            Some(("path", _)) => {
                println!("{}", Config::default(ConfigKey::ConfigFile));
                return Ok(false);
            }
            _ => {
                subcommand_config().print_long_help()?;
                return Ok(false);
            }
        },
        _ => {
            load_config(&matches, None).await?;
        }
    }

    return Ok(true);
}
