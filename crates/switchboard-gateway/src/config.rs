//! Gateway configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use switchboard_types::AgentProfile;
use switchboard_voice::VoiceConfig;
use thiserror::Error;

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Gateway behavior settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Collaborator endpoints and credentials.
    #[serde(default)]
    pub voice: VoiceConfig,

    /// Agent profiles this gateway answers for. Agent persistence belongs to
    /// the surrounding product; the gateway only needs resolved profiles.
    #[serde(default)]
    pub agents: Vec<AgentProfile>,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "switchboard_gateway=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Gateway behavior configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Public base URL of this gateway (e.g. `https://gw.example.com`).
    /// Telephony playback references audio under this URL; when empty, the
    /// dispatcher always falls back to provider-native synthesis.
    #[serde(default)]
    pub public_url: String,

    /// Debounce interval for interim transcript aggregation, in
    /// milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Ceiling on stored synthesized-audio blobs.
    #[serde(default = "default_blob_capacity")]
    pub blob_capacity: usize,

    /// How long a terminated call's registry entry is kept, in seconds.
    #[serde(default = "default_reap_ttl_seconds")]
    pub reap_ttl_seconds: u64,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    4000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_debounce_ms() -> u64 {
    400
}

fn default_blob_capacity() -> usize {
    256
}

fn default_reap_ttl_seconds() -> u64 {
    600
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            public_url: String::new(),
            debounce_ms: default_debounce_ms(),
            blob_capacity: default_blob_capacity(),
            reap_ttl_seconds: default_reap_ttl_seconds(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `SWITCHBOARD_HOST` overrides `server.host`
/// - `SWITCHBOARD_PORT` overrides `server.port`
/// - `SWITCHBOARD_LOG_LEVEL` overrides `logging.level`
/// - `SWITCHBOARD_LOG_JSON` overrides `logging.json` (set to "true")
/// - `SWITCHBOARD_PUBLIC_URL` overrides `gateway.public_url`
/// - `SWITCHBOARD_STT_API_KEY` overrides `voice.stt.api_key`
/// - `SWITCHBOARD_TTS_API_KEY` overrides `voice.tts.api_key`
/// - `SWITCHBOARD_GENERATION_API_KEY` overrides `voice.generation.api_key`
/// - `SWITCHBOARD_TELEPHONY_ACCOUNT_SID` overrides `voice.telephony.account_sid`
/// - `SWITCHBOARD_TELEPHONY_AUTH_TOKEN` overrides `voice.telephony.auth_token`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    // Environment variable overrides
    if let Ok(host) = std::env::var("SWITCHBOARD_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("SWITCHBOARD_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(level) = std::env::var("SWITCHBOARD_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("SWITCHBOARD_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Ok(url) = std::env::var("SWITCHBOARD_PUBLIC_URL") {
        config.gateway.public_url = url;
    }
    if let Ok(key) = std::env::var("SWITCHBOARD_STT_API_KEY") {
        config.voice.stt.api_key = key;
    }
    if let Ok(key) = std::env::var("SWITCHBOARD_TTS_API_KEY") {
        config.voice.tts.api_key = key;
    }
    if let Ok(key) = std::env::var("SWITCHBOARD_GENERATION_API_KEY") {
        config.voice.generation.api_key = key;
    }
    if let Ok(sid) = std::env::var("SWITCHBOARD_TELEPHONY_ACCOUNT_SID") {
        config.voice.telephony.account_sid = sid;
    }
    if let Ok(token) = std::env::var("SWITCHBOARD_TELEPHONY_AUTH_TOKEN") {
        config.voice.telephony.auth_token = token;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_config(Some("/nonexistent/switchboard.toml")).expect("defaults");
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.gateway.debounce_ms, 400);
        assert_eq!(config.gateway.reap_ttl_seconds, 600);
        assert!(config.agents.is_empty());
    }

    #[test]
    fn file_values_and_agents_parse() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"
            [server]
            port = 8443

            [gateway]
            public_url = "https://gw.example.com"
            debounce_ms = 250

            [voice.stt]
            api_key = "dg-key"

            [[agents]]
            id = "agent-1"
            name = "Scheduler"
            instructions = "You schedule meetings."
            phone_number = "+15550100"
            "#
        )
        .expect("write config");

        let config = load_config(file.path().to_str()).expect("config should parse");
        assert_eq!(config.server.port, 8443);
        assert_eq!(config.gateway.public_url, "https://gw.example.com");
        assert_eq!(config.gateway.debounce_ms, 250);
        assert_eq!(config.voice.stt.api_key, "dg-key");
        assert_eq!(config.agents.len(), 1);
        assert_eq!(config.agents[0].id, "agent-1");
        assert_eq!(config.agents[0].phone_number.as_deref(), Some("+15550100"));
    }
}
