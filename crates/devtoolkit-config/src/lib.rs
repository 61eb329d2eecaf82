//! Dev Toolkit Configuration
//!
//! TOML configuration loading with `.env` and environment variable overrides

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_MAX_SEGMENT_LEN: usize = 3000;
pub const MIN_SEGMENT_LEN: usize = 32;
/// Telegram rejects messages above 4096 chars; leave room for the segment header.
pub const MAX_SEGMENT_LEN: usize = 4000;

pub const ENV_BOT_TOKEN: &str = "BOT_TOKEN";
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_PROVIDER: &str = "DEVTOOLKIT_PROVIDER";
pub const ENV_MODEL: &str = "DEVTOOLKIT_MODEL";
pub const ENV_DATA_DIR: &str = "DEVTOOLKIT_DATA_DIR";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub core: CoreConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub formatter: FormatterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CoreConfig {
    pub data_dir: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    pub poll_timeout_secs: Option<u64>,
    pub client_recreate_interval_secs: Option<u64>,
    #[serde(default)]
    pub allowed_chats: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    #[default]
    Gemini,
    Openai,
}

impl std::str::FromStr for ProviderType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(ProviderType::Gemini),
            "openai" | "openai_compatible" => Ok(ProviderType::Openai),
            _ => Err(format!("Unknown provider type: {}", s)),
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderType::Gemini => write!(f, "gemini"),
            ProviderType::Openai => write!(f, "openai"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub provider_type: ProviderType,
    #[serde(default)]
    pub api_key: String,
    pub base_url: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: ProviderType::default(),
            api_key: String::new(),
            base_url: None,
            model: default_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatterConfig {
    #[serde(default = "default_max_segment_len")]
    pub max_segment_len: usize,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            max_segment_len: default_max_segment_len(),
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_segment_len() -> usize {
    DEFAULT_MAX_SEGMENT_LEN
}

const CONFIG_TEMPLATE: &str = r#"# Dev Toolkit Bot configuration

[core]
# data_dir = "~/.devtoolkit"
log_level = "info"

[telegram]
# Or set BOT_TOKEN in the environment / .env
bot_token = ""
poll_timeout_secs = 60
client_recreate_interval_secs = 60
# allowed_chats = [123456789]

[provider]
# "gemini" or "openai" (any OpenAI-compatible endpoint)
provider_type = "gemini"
# Or set GEMINI_API_KEY in the environment / .env
api_key = ""
# base_url = "https://generativelanguage.googleapis.com/v1beta"
model = "gemini-2.5-flash"

[formatter]
max_segment_len = 3000
"#;

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the given file, or the default file when present, otherwise starts
    /// from defaults. Environment variables (including a `.env` in the working
    /// directory) always win.
    pub fn load_or_env(path: Option<&Path>) -> anyhow::Result<Self> {
        load_dotenv();

        let path = match path {
            Some(explicit) => Some(explicit.to_path_buf()),
            None => Self::default_path().filter(|p| p.exists()),
        };

        match path {
            Some(path) => Self::load(path),
            None => {
                let mut config = Config::default();
                config.apply_env()?;
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("devtoolkit").join("config.toml"))
    }

    pub fn template() -> &'static str {
        CONFIG_TEMPLATE
    }

    pub fn apply_env(&mut self) -> anyhow::Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    pub fn apply_env_with<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = lookup(ENV_BOT_TOKEN) {
            self.telegram.bot_token = token.trim().to_string();
        }
        if let Some(provider) = lookup(ENV_PROVIDER) {
            self.provider.provider_type = provider
                .parse()
                .map_err(|e| anyhow::anyhow!("{}: {}", ENV_PROVIDER, e))?;
        }
        if let Some(key) = lookup(ENV_GEMINI_API_KEY) {
            self.provider.api_key = key.trim().to_string();
        }
        if let Some(model) = lookup(ENV_MODEL) {
            self.provider.model = model.trim().to_string();
        }
        if let Some(data_dir) = lookup(ENV_DATA_DIR) {
            self.core.data_dir = Some(data_dir);
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            anyhow::bail!(
                "Telegram bot token is not set (telegram.bot_token or {})",
                ENV_BOT_TOKEN
            );
        }
        if !self.telegram.bot_token.contains(':') {
            anyhow::bail!("Telegram bot token must look like '<bot_id>:<secret>'");
        }
        if self.telegram.poll_timeout_secs == Some(0) {
            anyhow::bail!("telegram.poll_timeout_secs must be greater than 0");
        }

        if self.provider.api_key.trim().is_empty() {
            anyhow::bail!(
                "Provider API key is not set (provider.api_key or {})",
                ENV_GEMINI_API_KEY
            );
        }
        if self.provider.model.trim().is_empty() {
            anyhow::bail!("provider.model cannot be empty");
        }
        if let Some(base_url) = &self.provider.base_url {
            let base_url = base_url.trim();
            if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                anyhow::bail!("provider.base_url must be an http(s) URL: '{}'", base_url);
            }
        }

        let max = self.formatter.max_segment_len;
        if !(MIN_SEGMENT_LEN..=MAX_SEGMENT_LEN).contains(&max) {
            anyhow::bail!(
                "formatter.max_segment_len must be between {} and {} (got {})",
                MIN_SEGMENT_LEN,
                MAX_SEGMENT_LEN,
                max
            );
        }

        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        match self.core.data_dir.as_deref() {
            Some(data_dir) => expand_home(data_dir),
            None => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".devtoolkit"),
        }
    }

    pub fn log_level(&self) -> &str {
        self.core.log_level.as_deref().unwrap_or("info")
    }

    /// Copy with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        config.telegram.bot_token = redact(&config.telegram.bot_token);
        config.provider.api_key = redact(&config.provider.api_key);
        config
    }
}

/// Reads `.env` from the working directory if there is one.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

pub fn telegram_account_tag(bot_token: &str) -> String {
    let token = bot_token.trim();
    token.split(':').next().unwrap_or(token).trim().to_string()
}

fn expand_home(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        if path == "~" {
            home
        } else {
            home.join(path.trim_start_matches("~/"))
        }
    } else {
        PathBuf::from(path)
    }
}

fn redact(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("{}****", visible)
    }
}
