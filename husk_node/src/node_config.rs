use std::collections::HashMap;
use std::net::SocketAddr;
use std::num::ParseIntError;
use std::str::FromStr;

use clap::{
    builder::PossibleValue, crate_description, crate_name, crate_version, value_parser, Arg,
    ArgMatches, Command, ValueEnum,
};
use config::{Config, File as CfgFile, FileFormat as CfgFileFormat};
use husk::crypto::LayerKey;
use serde::{de, Deserialize, Deserializer};
use serde_yaml::Value;

/// Config for threading.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize)]
pub enum Threads {
    /// Detect number of threads automatically by the number of CPU cores.
    Auto,
    /// Exact number of threads.
    N(u16),
}

impl FromStr for Threads {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "auto" {
            Ok(Threads::Auto)
        } else {
            u16::from_str(s).map(Threads::N)
        }
    }
}

/// Specifies where to write logs.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize)]
pub enum LogType {
    Stderr,
    Stdout,
    None,
}

impl ValueEnum for LogType {
    fn value_variants<'a>() -> &'a [Self] {
        use self::LogType::*;
        &[Stderr, Stdout, None]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        use self::LogType::*;
        Some(match self {
            Stderr => PossibleValue::new("Stderr"),
            Stdout => PossibleValue::new("Stdout"),
            None => PossibleValue::new("None"),
        })
    }
}

/// Config parsed from command line arguments.
#[derive(Clone, Debug, Deserialize)]
pub struct NodeConfig {
    /// Relay identity, as published by the directory.
    pub id: String,
    /// TCP address the relay listens on.
    #[serde(rename = "bind-address")]
    pub bind_addr: SocketAddr,
    /// Pre-shared AES-256 layer key.
    #[serde(skip_deserializing)]
    pub key: Option<LayerKey>,
    /// True if the key was passed as an argument instead of environment
    /// variable. Necessary to print a warning since the logger backend is
    /// not initialized when we parse arguments.
    #[serde(skip_deserializing)]
    pub key_passed_as_arg: bool,
    /// Path to the file where the raw 32 key bytes are stored.
    /// Required with config.
    #[serde(rename = "keys-file")]
    pub keys_file: Option<String>,
    /// Number of threads for execution.
    #[serde(deserialize_with = "de_threads")]
    pub threads: Threads,
    /// Specifies where to write logs.
    #[serde(rename = "log-type")]
    pub log_type: LogType,
    /// Unused fields while parsing config file.
    #[serde(flatten)]
    pub unused: HashMap<String, Value>,
}

fn de_threads<'de, D>(deserializer: D) -> Result<Threads, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;

    Threads::from_str(&s).map_err(|e| de::Error::custom(format!("threads: {:?}", e)))
}

fn create_key_arg() -> Arg {
    Arg::new("key")
        .short('s')
        .long("key")
        .help(
            "Relay layer key: the 32-character string published by the \
             directory. Note that you should not pass the key via \
             arguments due to security reasons. Use this argument for \
             test purposes only. In the real world use the environment \
             variable instead",
        )
        .num_args(1)
        .conflicts_with("keys-file")
        .env("HUSK_RELAY_KEY")
        .hide(true)
}

fn create_keys_file_arg() -> Arg {
    Arg::new("keys-file")
        .short('k')
        .long("keys-file")
        .help("Path to the file where the raw 32 key bytes are stored")
        .num_args(1)
        .required_unless_present("key")
        .conflicts_with("key")
}

fn app() -> Command {
    Command::new(crate_name!())
        .version(crate_version!())
        .about(crate_description!())
        .args_conflicts_with_subcommands(true)
        .subcommand_negates_reqs(true)
        .subcommand(
            Command::new("config").arg(
                Arg::new("cfg-file")
                    .index(1)
                    .help(
                        "Load settings from saved config file. \
                         Config file format is YAML",
                    )
                    .num_args(1)
                    .required(true),
            ),
        )
        // here go args without subcommands
        .arg(create_key_arg())
        .arg(create_keys_file_arg())
        .arg(
            Arg::new("id")
                .short('i')
                .long("id")
                .help("Relay identity, as published by the directory")
                .num_args(1)
                .required(true),
        )
        .arg(
            Arg::new("bind-address")
                .short('b')
                .long("bind-address")
                .help("TCP address the relay listens on")
                .num_args(1)
                .value_parser(value_parser!(SocketAddr))
                .required(true),
        )
        .arg(
            Arg::new("threads")
                .short('j')
                .long("threads")
                .help(
                    "Number of threads to use. The value 'auto' means that the \
                     number of threads will be determined automatically by the \
                     number of CPU cores",
                )
                .num_args(1)
                .value_parser(value_parser!(Threads))
                .default_value("1"),
        )
        .arg(
            Arg::new("log-type")
                .short('l')
                .long("log-type")
                .help("Where to write logs")
                .num_args(1)
                .value_parser(value_parser!(LogType))
                .default_value("Stderr"),
        )
}

/// Parse command line arguments.
pub fn cli_parse() -> NodeConfig {
    let matches = app().get_matches();

    match matches.subcommand() {
        Some(("config", m)) => run_config(m),
        _ => run_args(&matches),
    }
}

/// Parse settings from a saved file.
fn parse_config(config_path: &str) -> NodeConfig {
    let config_builder = Config::builder()
        .set_default("log-type", "Stderr")
        .expect("Can't set default value for `log-type`")
        .set_default("threads", "1")
        .expect("Can't set default value for `threads`")
        .add_source(CfgFile::new(config_path, CfgFileFormat::Yaml));

    let config_file = match config_builder.build() {
        Ok(cfg) => cfg,
        Err(e) => panic!("Can't build config file {}", e),
    };

    let config: NodeConfig = config_file.try_deserialize().expect("Can't deserialize config");

    if config.keys_file.is_none() {
        panic!("Can't deserialize config: 'keys-file' is not set");
    }

    config
}

fn run_config(matches: &ArgMatches) -> NodeConfig {
    let config_path = matches.get_one::<String>("cfg-file").unwrap();

    parse_config(config_path)
}

fn run_args(matches: &ArgMatches) -> NodeConfig {
    let id = matches.get_one::<String>("id").cloned().unwrap();

    let bind_addr = matches.get_one::<SocketAddr>("bind-address").copied().unwrap();

    let key = matches
        .get_one::<String>("key")
        .map(|s| s.parse().expect("Invalid relay key"));

    let key_passed_as_arg =
        matches.value_source("key") == Some(clap::parser::ValueSource::CommandLine);

    let keys_file = matches.get_one("keys-file").cloned();

    let threads = matches.get_one("threads").copied().unwrap();

    let log_type = matches.get_one("log-type").copied().unwrap();

    NodeConfig {
        id,
        bind_addr,
        key,
        key_passed_as_arg,
        keys_file,
        threads,
        log_type,
        unused: HashMap::new(),
    }
}
