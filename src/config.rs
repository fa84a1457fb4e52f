//! Operator configuration for the demo drivers.
//!
//! Sources, in precedence order: an explicit properties file passed with
//! `-f`, the process environment when `--env` is given, the conventional
//! `./config/<role>.properties` file, and finally the packaged default
//! configuration embedded in the binary.
//!
//! Malformed individual values never abort the driver: the field falls
//! back to its default and a warning is logged. Only the complete absence
//! of a configuration source is fatal.

use crate::keygen::KeyPolicy;
use pqdemo_transport::SessionConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_QUEUE_NAME: &str = "partitioned-queue-1";
pub const DEFAULT_MSG_VPN: &str = "default";
pub const DEFAULT_TOPIC_PREFIX: &str = "pqdemo";
pub const DEFAULT_UNIQUE_KEYS: u32 = 20;
pub const DEFAULT_TRANSACTED_COUNT: u32 = 8;

/// Which driver the configuration is for. Decides the properties file
/// name and the role-specific defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Publisher,
    Consumer,
    TransactedConsumer,
}

impl Role {
    pub fn properties_file(&self) -> &'static str {
        match self {
            Role::Publisher => "publisher.properties",
            Role::Consumer | Role::TransactedConsumer => "consumer.properties",
        }
    }

    pub fn default_rate(&self) -> u32 {
        match self {
            Role::Publisher => 10,
            Role::Consumer => 2,
            Role::TransactedConsumer => 10,
        }
    }

    fn default_window(&self) -> u32 {
        match self {
            Role::TransactedConsumer => 100,
            _ => 10,
        }
    }

    fn packaged_resource(&self) -> &'static str {
        match self {
            Role::Publisher => include_str!("../config/publisher.properties"),
            Role::Consumer | Role::TransactedConsumer => {
                include_str!("../config/consumer.properties")
            }
        }
    }
}

/// Configuration failures. Individual bad values are not errors; these
/// cover the cases where no usable configuration exists at all.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Neither the requested file nor a packaged default was available.
    #[error("no configuration available: {0}")]
    NoSource(String),

    /// The file exists but could not be read.
    #[error("error reading configuration file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Anything else that prevented configuration from loading.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Process exit code for this failure, matching the demo convention:
    /// -1 missing source, -2 I/O error, -3 other.
    pub fn exit_code(&self) -> i32 {
        match self {
            ConfigError::NoSource(_) => -1,
            ConfigError::Io { .. } => -2,
            ConfigError::Invalid(_) => -3,
        }
    }
}

/// Where to read configuration from, resolved from the CLI flags.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// `-f <path>`: an explicit properties file.
    File(PathBuf),
    /// `--env`: SOLACE_* environment variables.
    Env,
    /// Neither flag: `./config/<role>.properties`.
    DefaultFile,
}

/// Resolved driver configuration. Built once at startup, immutable after.
#[derive(Debug, Clone)]
pub struct Config {
    /// Target rate in messages per second, always within 1..=1000.
    pub rate: u32,
    pub queue_name: String,
    pub vpn_name: String,
    pub key_policy: KeyPolicy,
    pub unique_keys: u32,
    pub transacted_batch: u32,
    pub topic_prefix: String,
    pub transport_window: u32,
    /// Connection bag handed to the transport, including every property
    /// the operator supplied that the driver itself does not consume.
    pub session: SessionConfig,
}

impl Config {
    pub fn with_rate(mut self, rate: u32) -> Self {
        self.rate = rate;
        self
    }
}

/// Load configuration for `role` from `source`, with the packaged default
/// as the last resort.
pub fn load(role: Role, source: &ConfigSource) -> Result<Config, ConfigError> {
    load_with_resource(role, source, Some(role.packaged_resource()))
}

/// As [`load`], with the packaged resource injectable so the missing-both
/// path stays testable.
pub fn load_with_resource(
    role: Role,
    source: &ConfigSource,
    resource: Option<&str>,
) -> Result<Config, ConfigError> {
    let properties = match source {
        ConfigSource::Env => properties_from_env(),
        ConfigSource::File(path) => read_properties_file(path, resource)?,
        ConfigSource::DefaultFile => {
            let path = std::env::current_dir()
                .map_err(|e| ConfigError::Invalid(e.to_string()))?
                .join("config")
                .join(role.properties_file());
            read_properties_file(&path, resource)?
        }
    };
    Ok(Config::from_properties(role, &properties))
}

fn read_properties_file(
    path: &Path,
    resource: Option<&str>,
) -> Result<HashMap<String, String>, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            tracing::info!("loading configuration from {}", path.display());
            Ok(parse_properties(&text))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("configuration file not found: {}", path.display());
            match resource {
                Some(text) => {
                    tracing::warn!("falling back to the packaged default configuration");
                    Ok(parse_properties(text))
                }
                None => Err(ConfigError::NoSource(format!(
                    "{} is missing and no packaged default exists",
                    path.display()
                ))),
            }
        }
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Parse `key=value` properties text: `#` and `!` comment lines, blank
/// lines ignored, `:` accepted as separator.
fn parse_properties(text: &str) -> HashMap<String, String> {
    let mut properties = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let split = line
            .split_once('=')
            .or_else(|| line.split_once(':'));
        if let Some((key, value)) = split {
            properties.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    properties
}

/// Build the property map from SOLACE_* environment variables, applying
/// the documented default for each unset variable.
pub fn properties_from_env() -> HashMap<String, String> {
    let vars: [(&str, &str, &str); 9] = [
        ("SOLACE_HOST", "solace.messaging.transport.host", "localhost"),
        ("SOLACE_MSGVPN_NAME", "solace.messaging.service.vpn-name", "default"),
        (
            "SOLACE_MSG_USER",
            "solace.messaging.authentication.basic.username",
            "client1",
        ),
        (
            "SOLACE_MSG_PASSWORD",
            "solace.messaging.authentication.basic.password",
            "client1pass",
        ),
        (
            "RECONNECTION_ATTEMPTS",
            "solace.messaging.transport.reconnection-attempts",
            "20",
        ),
        (
            "RETRIES_PER_HOST",
            "solace.messaging.transport.connection.retries-per-host",
            "5",
        ),
        ("TOPIC_PREFIX", "topic.prefix", "pqdemo"),
        ("USE_RANDOM_KEY", "use.random.key", "false"),
        ("NUMBER_OF_UNIQUE_KEYS", "number.of.unique.keys", "20"),
    ];
    let mut properties = HashMap::new();
    for (env_key, property_key, default) in vars {
        let value = std::env::var(env_key).unwrap_or_else(|_| default.to_string());
        properties.insert(property_key.to_string(), value);
    }
    properties
}

impl Config {
    fn from_properties(role: Role, properties: &HashMap<String, String>) -> Self {
        let queue_name = properties
            .get("queue.name")
            .cloned()
            .unwrap_or_else(|| DEFAULT_QUEUE_NAME.to_string());
        let vpn_name = first_of(properties, &["vpn_name", "solace.messaging.service.vpn-name"])
            .unwrap_or_else(|| DEFAULT_MSG_VPN.to_string());

        let rate = parse_bounded(properties, "consume.msg.rate", role.default_rate(), 1, 1000);
        let transacted_batch = parse_bounded(
            properties,
            "transacted.msg.count",
            DEFAULT_TRANSACTED_COUNT,
            1,
            256,
        );
        let unique_keys = parse_bounded(
            properties,
            "number.of.unique.keys",
            DEFAULT_UNIQUE_KEYS,
            1,
            u32::MAX,
        );
        let transport_window = parse_bounded(
            properties,
            "sub_ack_window_size",
            role.default_window(),
            1,
            u32::MAX,
        );

        let key_policy = if properties
            .get("use.random.key")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            KeyPolicy::RandomUuid
        } else {
            KeyPolicy::RotatingOrder
        };

        let topic_prefix = properties
            .get("topic.prefix")
            .cloned()
            .unwrap_or_else(|| DEFAULT_TOPIC_PREFIX.to_string());

        let session = SessionConfig {
            host: first_of(properties, &["host", "solace.messaging.transport.host"])
                .unwrap_or_else(|| "localhost".to_string()),
            vpn_name: vpn_name.clone(),
            username: first_of(
                properties,
                &["username", "solace.messaging.authentication.basic.username"],
            )
            .unwrap_or_else(|| "client1".to_string()),
            password: first_of(
                properties,
                &["password", "solace.messaging.authentication.basic.password"],
            )
            .unwrap_or_else(|| "client1pass".to_string()),
            reconnect_retries: parse_bounded(
                properties,
                "solace.messaging.transport.reconnection-attempts",
                20,
                0,
                u32::MAX,
            ),
            connect_retries_per_host: parse_bounded(
                properties,
                "solace.messaging.transport.connection.retries-per-host",
                5,
                0,
                u32::MAX,
            ),
            // Everything passes through verbatim; the transport picks out
            // what it understands.
            extra: properties.clone(),
        };

        Config {
            rate,
            queue_name,
            vpn_name,
            key_policy,
            unique_keys,
            transacted_batch,
            topic_prefix,
            transport_window,
            session,
        }
    }
}

fn first_of(properties: &HashMap<String, String>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| properties.get(*k).cloned())
}

fn parse_bounded(
    properties: &HashMap<String, String>,
    key: &str,
    default: u32,
    min: u32,
    max: u32,
) -> u32 {
    let Some(raw) = properties.get(key) else {
        return default;
    };
    match raw.trim().parse::<i64>() {
        Ok(value) if value >= min as i64 && value <= max as i64 => value as u32,
        Ok(value) => {
            tracing::warn!("[{key}] value {value} is out of bounds, using default={default}");
            default
        }
        Err(_) => {
            tracing::warn!("could not parse [{key}] from properties, using default={default}");
            default
        }
    }
}

/// Interpret the publisher's positional rate argument. Non-numeric or
/// out-of-bounds input falls back to the role default with a warning; the
/// driver never crashes over it.
pub fn resolve_rate_argument(argument: Option<&str>, default: u32) -> u32 {
    let Some(raw) = argument else {
        return default;
    };
    match raw.trim().parse::<i64>() {
        Ok(value) if (1..=1000).contains(&value) => value as u32,
        Ok(_) => {
            tracing::warn!(
                "the input argument (published msgs/second) was out of bounds; using default"
            );
            default
        }
        Err(_) => {
            tracing::warn!(
                "could not convert input argument [{raw}] to an integer value, using default"
            );
            default
        }
    }
}
