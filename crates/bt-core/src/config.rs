//! Configuration management
//!
//! Settings are resolved in this order of precedence:
//! 1. Environment variables
//! 2. `breaders.toml` config file (or the file named by `BREADERS_CONFIG`)
//! 3. Default values
//!
//! Inside the config file, `${VAR_NAME}` is expanded from the environment.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Error;
use crate::constants::INTENT_MEDIUM_CONFIDENCE;

/// Twilio account and AI assistant settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwilioConfig {
    /// Account SID (`AC...`)
    pub account_sid: String,

    /// Auth token, also the HMAC key for webhook signatures
    #[serde(skip_serializing)]
    pub auth_token: String,

    /// Sender number, with or without the `whatsapp:` prefix
    pub whatsapp_number: String,

    /// Twilio AI Assistant id; the assistant is disabled when unset
    pub assistant_id: Option<String>,

    /// Webhook the assistant calls back for asynchronous replies
    pub assistant_webhook_url: Option<String>,

    /// Reject webhook requests whose `X-Twilio-Signature` does not match
    #[serde(default)]
    pub validate_signature: bool,

    /// REST API base (overridden in tests)
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// AI Assistants API base (overridden in tests)
    #[serde(default = "default_assistant_base_url")]
    pub assistant_base_url: String,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: String::new(),
            whatsapp_number: String::new(),
            assistant_id: None,
            assistant_webhook_url: None,
            validate_signature: false,
            api_base_url: default_api_base_url(),
            assistant_base_url: default_assistant_base_url(),
        }
    }
}

impl TwilioConfig {
    /// Whether both the account SID and auth token are present
    pub fn has_credentials(&self) -> bool {
        !self.account_sid.is_empty() && !self.auth_token.is_empty()
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port for the webhook/admin server
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer key for the admin API; the admin API is open when unset
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,

    /// Public base URL Twilio reaches us at (ngrok URL during development)
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            secret_key: None,
            public_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Minimum intent confidence for a canned chatbot reply
    #[serde(default = "default_intent_threshold")]
    pub intent_threshold: f64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            intent_threshold: default_intent_threshold(),
        }
    }
}

/// Local development launcher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DevConfig {
    /// ngrok executable
    #[serde(default = "default_ngrok_bin")]
    pub ngrok_bin: String,

    /// ngrok local inspection API
    #[serde(default = "default_ngrok_api_url")]
    pub ngrok_api_url: String,

    /// Attempts at reading the tunnel list
    #[serde(default = "default_tunnel_retries")]
    pub tunnel_retries: u32,

    /// Seconds to wait for ngrok before the first attempt
    #[serde(default = "default_tunnel_initial_wait")]
    pub tunnel_initial_wait_secs: u64,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            ngrok_bin: default_ngrok_bin(),
            ngrok_api_url: default_ngrok_api_url(),
            tunnel_retries: default_tunnel_retries(),
            tunnel_initial_wait_secs: default_tunnel_initial_wait(),
        }
    }
}

/// Main configuration for the bot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub twilio: TwilioConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub bot: BotConfig,

    #[serde(default)]
    pub dev: DevConfig,
}

fn default_api_base_url() -> String {
    "https://api.twilio.com".to_string()
}

fn default_assistant_base_url() -> String {
    "https://assistants.twilio.com".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_db_path() -> String {
    "data/breaders.db".to_string()
}

fn default_intent_threshold() -> f64 {
    INTENT_MEDIUM_CONFIDENCE
}

fn default_ngrok_bin() -> String {
    "ngrok".to_string()
}

fn default_ngrok_api_url() -> String {
    "http://localhost:4040/api/tunnels".to_string()
}

fn default_tunnel_retries() -> u32 {
    5
}

fn default_tunnel_initial_wait() -> u64 {
    5
}

/// Default config file name
pub const CONFIG_FILE: &str = "breaders.toml";

impl Config {
    /// Expand `${VAR_NAME}` occurrences with environment values.
    /// Unset variables expand to an empty string.
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next();

                let mut var_name = String::new();
                while let Some(c) = chars.next() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();

        let toml_content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let expanded_content = Self::expand_env_vars(&toml_content);

        let mut cfg: Config = toml::from_str(&expanded_content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;

        cfg.apply_env_overrides();
        cfg.validate()?;

        Ok(cfg)
    }

    /// Load from `BREADERS_CONFIG`, `./breaders.toml`, or the environment alone
    pub fn load() -> crate::Result<Self> {
        if let Ok(path) = std::env::var("BREADERS_CONFIG") {
            return Self::from_toml_file(path);
        }

        if Path::new(CONFIG_FILE).exists() {
            return Self::from_toml_file(CONFIG_FILE);
        }

        Self::from_env()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut cfg = Config::default();
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        let flag = |name: &str| non_empty(name).map(|v| v.to_lowercase() != "false" && v != "0");

        // Twilio
        if let Some(sid) = non_empty("TWILIO_ACCOUNT_SID") {
            self.twilio.account_sid = sid;
        }
        if let Some(token) = non_empty("TWILIO_AUTH_TOKEN") {
            self.twilio.auth_token = token;
        }
        if let Some(number) = non_empty("TWILIO_WHATSAPP_NUMBER") {
            self.twilio.whatsapp_number = number;
        }
        if let Some(id) = non_empty("TWILIO_ASSISTANT_ID") {
            self.twilio.assistant_id = Some(id);
        }
        if let Some(url) = non_empty("TWILIO_ASSISTANT_WEBHOOK_URL") {
            self.twilio.assistant_webhook_url = Some(url);
        }
        if let Some(validate) = flag("TWILIO_VALIDATE_SIGNATURE") {
            self.twilio.validate_signature = validate;
        }

        // Server
        if let Some(port) = non_empty("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(key) = non_empty("SECRET_KEY") {
            self.server.secret_key = Some(key);
        }
        if let Some(url) = non_empty("PUBLIC_URL") {
            self.server.public_url = Some(url);
        }

        // Database
        if let Some(path) = non_empty("DB_PATH") {
            self.database.path = path;
        }

        // Bot
        if let Some(threshold) = non_empty("BOT_INTENT_THRESHOLD").and_then(|t| t.parse().ok()) {
            self.bot.intent_threshold = threshold;
        }

        // Dev launcher
        if let Some(bin) = non_empty("NGROK_BIN") {
            self.dev.ngrok_bin = bin;
        }
        if let Some(url) = non_empty("NGROK_API_URL") {
            self.dev.ngrok_api_url = url;
        }
    }

    fn validate(&self) -> crate::Result<()> {
        if !(0.0..=1.0).contains(&self.bot.intent_threshold) {
            return Err(Error::Config(format!(
                "bot.intent_threshold must be within 0.0..=1.0, got {}",
                self.bot.intent_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8000);
        assert!(config.secret_key.is_none());
        assert!(config.public_url.is_none());
    }

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert_eq!(config.path, "data/breaders.db");
    }

    #[test]
    fn test_bot_config_default_threshold() {
        assert_eq!(BotConfig::default().intent_threshold, 0.65);
    }

    #[test]
    fn test_twilio_credentials() {
        let mut twilio = TwilioConfig::default();
        assert!(!twilio.has_credentials());
        twilio.account_sid = "AC123".into();
        assert!(!twilio.has_credentials());
        twilio.auth_token = "secret".into();
        assert!(twilio.has_credentials());
        assert_eq!(twilio.api_base_url, "https://api.twilio.com");
    }

    #[test]
    fn test_expand_env_vars() {
        unsafe {
            std::env::set_var("BREADERS_TEST_VAR", "test_value");
        }

        let result = Config::expand_env_vars("prefix_${BREADERS_TEST_VAR}_suffix");
        assert_eq!(result, "prefix_test_value_suffix");

        let result = Config::expand_env_vars("prefix_${BREADERS_NONEXISTENT_VAR}_suffix");
        assert_eq!(result, "prefix__suffix");

        unsafe {
            std::env::remove_var("BREADERS_TEST_VAR");
        }
    }

    #[test]
    fn test_expand_env_vars_no_braces() {
        assert_eq!(Config::expand_env_vars("$no_vars_here"), "$no_vars_here");
    }

    #[test]
    fn test_toml_config_parsing() {
        let toml_content = r#"
[twilio]
account_sid = "AC123"
auth_token = "token"
whatsapp_number = "whatsapp:+14155238886"
assistant_id = "aia_asst_1"
validate_signature = true

[server]
port = 9000
secret_key = "s3cret"

[database]
path = "/tmp/bot.db"

[bot]
intent_threshold = 0.5

[dev]
tunnel_retries = 3
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.twilio.account_sid, "AC123");
        assert_eq!(config.twilio.assistant_id.as_deref(), Some("aia_asst_1"));
        assert!(config.twilio.validate_signature);
        assert_eq!(config.twilio.api_base_url, "https://api.twilio.com");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.secret_key.as_deref(), Some("s3cret"));
        assert_eq!(config.database.path, "/tmp/bot.db");
        assert_eq!(config.bot.intent_threshold, 0.5);
        assert_eq!(config.dev.tunnel_retries, 3);
        assert_eq!(config.dev.ngrok_bin, "ngrok");
    }

    #[test]
    fn test_from_toml_file_rejects_bad_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("breaders.toml");
        std::fs::write(&path, "[bot]\nintent_threshold = 1.5\n").unwrap();

        let err = Config::from_toml_file(&path).unwrap_err();
        assert!(err.to_string().contains("intent_threshold"));
    }
}
