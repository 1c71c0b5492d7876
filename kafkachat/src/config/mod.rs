//! Configuration system for the `KafkaChat` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. Config file (`~/.config/kafkachat/config.toml`, or JSON when the
//!    path ends in `.json`)
//! 4. Compiled defaults
//!
//! Missing default config file is not an error (defaults are used). An
//! explicit config path that doesn't exist is an error.
//!
//! The `kafkaconf` table is passed to the Kafka client as-is.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chat::SessionOptions;
use crate::crypto::CryptoError;
use crate::crypto::keys::SymmetricKey;
use crate::log::ReplayFrom;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// Failed to parse the JSON configuration.
    #[error("failed to parse config file: {0}")]
    ParseJson(#[from] serde_json::Error),

    /// The symmetric key is not a valid key.
    #[error("invalid symmetric_key: {0}")]
    InvalidKey(#[from] CryptoError),

    /// The replay mode is not recognized.
    #[error("invalid replay_from: {0}")]
    InvalidReplay(String),

    /// The topic resolved to an empty string.
    #[error("topic must not be empty")]
    EmptyTopic,

    /// The user name resolved to an empty string.
    #[error("user must not be empty")]
    EmptyUser,
}

// ---------------------------------------------------------------------------
// File structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    kafkaconf: BTreeMap<String, SettingValue>,
    topic: Option<String>,
    symmetric_key: Option<String>,
    user: Option<String>,
    replay_from: Option<String>,
    group_id: Option<String>,
    chat: ChatFileConfig,
    ui: UiFileConfig,
    logging: LoggingFileConfig,
}

/// A `kafkaconf` value. librdkafka takes every setting as a string, but
/// config files naturally carry numbers and booleans too.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(untagged)]
enum SettingValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Flag(bool),
}

impl SettingValue {
    fn to_setting(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Integer(n) => n.to_string(),
            Self::Float(x) => x.to_string(),
            Self::Flag(b) => b.to_string(),
        }
    }
}

/// `[chat]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ChatFileConfig {
    poll_timeout_ms: Option<u64>,
    delivery_timeout_ms: Option<u64>,
    feed_capacity: Option<usize>,
}

/// `[ui]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct UiFileConfig {
    tick_ms: Option<u64>,
}

/// `[logging]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct LoggingFileConfig {
    broker_log_level: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Chat subsystem configuration (used by `ChatSession`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Upper bound on a single subscriber poll.
    pub poll_timeout: Duration,
    /// How long a send waits for the log to confirm a record.
    pub delivery_timeout: Duration,
    /// Capacity of the subscriber-to-UI channel.
    pub feed_capacity: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(50),
            delivery_timeout: Duration::from_secs(10),
            feed_capacity: 256,
        }
    }
}

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -- Kafka --
    /// librdkafka settings, passed through unchanged.
    pub kafka: BTreeMap<String, String>,
    /// librdkafka log verbosity.
    pub broker_log_level: String,

    // -- Session --
    /// Topic to read and write.
    pub topic: String,
    /// Display name.
    pub user: String,
    /// Body key; `None` means plaintext.
    pub symmetric_key: Option<SymmetricKey>,
    /// Where the subscription starts.
    pub replay_from: ReplayFrom,
    /// Stable group id for saved-offset replay.
    pub group_id: Option<String>,

    // -- Chat --
    /// Timeouts and channel sizing.
    pub chat: ChatConfig,

    // -- UI --
    /// Redraw and input poll interval.
    pub tick: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            kafka: BTreeMap::new(),
            broker_log_level: "warn".to_string(),
            topic: "chat".to_string(),
            user: "anonymous".to_string(),
            symmetric_key: None,
            replay_from: ReplayFrom::Earliest,
            group_id: None,
            chat: ChatConfig::default(),
            tick: Duration::from_millis(100),
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a config file.
    ///
    /// If a config path is given and the file does not exist, returns an
    /// error. If not, the default path (`~/.config/kafkachat/config.toml`)
    /// is tried and silently ignored if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or a
    /// resolved value is invalid.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, &file)
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default. This is separated from `load()` to
    /// enable unit testing without CLI parsing.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let topic = cli
            .topic
            .clone()
            .or_else(|| file.topic.clone())
            .unwrap_or(defaults.topic);
        if topic.trim().is_empty() {
            return Err(ConfigError::EmptyTopic);
        }

        let user = cli
            .user
            .clone()
            .or_else(|| file.user.clone())
            .unwrap_or_else(|| default_user(|name| std::env::var(name).ok()));
        if user.trim().is_empty() {
            return Err(ConfigError::EmptyUser);
        }

        let symmetric_key = cli
            .key
            .as_deref()
            .or(file.symmetric_key.as_deref())
            .map(SymmetricKey::parse)
            .transpose()?;

        let replay_from = match (cli.replay_from, file.replay_from.as_deref()) {
            (Some(mode), _) => mode,
            (None, Some(text)) => text
                .parse::<ReplayFrom>()
                .map_err(ConfigError::InvalidReplay)?,
            (None, None) => defaults.replay_from,
        };

        Ok(Self {
            kafka: file
                .kafkaconf
                .iter()
                .map(|(k, v)| (k.clone(), v.to_setting()))
                .collect(),
            broker_log_level: file
                .logging
                .broker_log_level
                .clone()
                .unwrap_or(defaults.broker_log_level),
            topic,
            user,
            symmetric_key,
            replay_from,
            group_id: file.group_id.clone(),
            chat: ChatConfig {
                poll_timeout: file
                    .chat
                    .poll_timeout_ms
                    .map_or(defaults.chat.poll_timeout, Duration::from_millis),
                delivery_timeout: file
                    .chat
                    .delivery_timeout_ms
                    .map_or(defaults.chat.delivery_timeout, Duration::from_millis),
                feed_capacity: file
                    .chat
                    .feed_capacity
                    .unwrap_or(defaults.chat.feed_capacity),
            },
            tick: file
                .ui
                .tick_ms
                .map_or(defaults.tick, Duration::from_millis),
        })
    }

    /// Options for starting a chat session with this configuration.
    #[must_use]
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            topic: self.topic.clone(),
            user: self.user.clone(),
            replay: self.replay_from,
            group_id: self.group_id.clone(),
            key: self.symmetric_key.clone(),
            chat: self.chat.clone(),
        }
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Terminal chat over an Apache Kafka topic")]
pub struct CliArgs {
    /// Path to config file (default: `~/.config/kafkachat/config.toml`).
    pub config: Option<PathBuf>,

    /// Display name shown to other participants.
    #[arg(short, long, env = "KAFKACHAT_USER")]
    pub user: Option<String>,

    /// Topic to chat on.
    #[arg(short, long)]
    pub topic: Option<String>,

    /// Symmetric key for message bodies (see `kafkachat-keygen`).
    #[arg(long)]
    pub key: Option<String>,

    /// Where to start reading: earliest, latest or saved-offset.
    #[arg(long)]
    pub replay_from: Option<ReplayFrom>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "KAFKACHAT_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/kafkachat.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Pick a display name from the login environment.
fn default_user(lookup: impl Fn(&str) -> Option<String>) -> String {
    ["USER", "USERNAME", "LOGNAME"]
        .into_iter()
        .filter_map(lookup)
        .find(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "anonymous".to_string())
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn parse_config(path: &Path, contents: &str) -> Result<ConfigFile, ConfigError> {
    if is_json(path) {
        Ok(serde_json::from_str(contents)?)
    } else {
        Ok(toml::from_str(contents)?)
    }
}

/// Load and parse a config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return parse_config(p, &contents);
    }

    let Some(config_dir) = dirs::config_dir() else {
        return Ok(ConfigFile::default());
    };
    let path = config_dir.join("kafkachat").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => parse_config(&path, &contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
