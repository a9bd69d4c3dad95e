use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::command::DEFAULT_INVOCATION_MARKER;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

/// What a whitelisted sender has to post to authorize a new group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationTrigger {
    /// Any non-empty message.
    #[default]
    AnyMessage,
    /// Only an explicit assistant invocation with a question.
    Invocation,
}

/// Durable backend for authorized groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantStoreKind {
    #[default]
    File,
    Sqlite,
}

#[derive(Deserialize)]
struct ConfigFile {
    /// Falls back to LINE_CHANNEL_SECRET when empty.
    #[serde(default)]
    line_channel_secret: String,
    /// Falls back to LINE_CHANNEL_ACCESS_TOKEN when empty.
    #[serde(default)]
    line_channel_access_token: String,
    /// Falls back to OPENAI_API_KEY when empty.
    #[serde(default)]
    openai_api_key: String,
    /// LINE user IDs allowed to authorize groups.
    #[serde(default)]
    whitelist_user_ids: Vec<String>,
    #[serde(default = "default_invocation_marker")]
    invocation_marker: String,
    #[serde(default)]
    authorization_trigger: AuthorizationTrigger,
    #[serde(default = "default_listen_addr")]
    listen_addr: String,
    /// Directory for state files (logs, grants). Defaults to current directory.
    data_dir: Option<String>,
    #[serde(default)]
    grant_store: GrantStoreKind,
    #[serde(default = "default_model")]
    model: String,
    #[serde(default = "default_temperature")]
    temperature: f32,
    #[serde(default = "default_gateway_timeout_secs")]
    gateway_timeout_secs: u64,
    #[serde(default = "default_openai_base_url")]
    openai_base_url: String,
    #[serde(default = "default_assistant_persona")]
    assistant_persona: String,
    #[serde(default = "default_home_language")]
    home_language: String,
    #[serde(default = "default_foreign_language")]
    foreign_language: String,
    /// Must contain `{language}` and `{text}`.
    #[serde(default = "default_translation_prompt")]
    translation_prompt: String,
    #[serde(default)]
    dry_run: bool,
}

fn default_invocation_marker() -> String {
    DEFAULT_INVOCATION_MARKER.to_string()
}

fn default_listen_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_gateway_timeout_secs() -> u64 {
    60
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_assistant_persona() -> String {
    "親切でおちゃめなアシスタントです。".to_string()
}

fn default_home_language() -> String {
    "日本語".to_string()
}

fn default_foreign_language() -> String {
    "ロシア語".to_string()
}

fn default_translation_prompt() -> String {
    "次の文章を{language}に自然な口調で翻訳してください：\n{text}".to_string()
}

/// Who may authorize groups, and how messages are recognised as commands.
#[derive(Debug, Clone)]
pub struct RoutingPolicy {
    pub whitelist: HashSet<String>,
    pub invocation_marker: String,
    pub authorization_trigger: AuthorizationTrigger,
}

impl RoutingPolicy {
    pub fn is_whitelisted(&self, sender_id: &str) -> bool {
        self.whitelist.contains(sender_id)
    }
}

/// Prompt wording handed to the gateway.
#[derive(Debug, Clone)]
pub struct PromptConfig {
    /// System prompt for assistant queries.
    pub assistant_persona: String,
    pub home_language: String,
    pub foreign_language: String,
    pub translation_prompt: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            assistant_persona: default_assistant_persona(),
            home_language: default_home_language(),
            foreign_language: default_foreign_language(),
            translation_prompt: default_translation_prompt(),
        }
    }
}

/// Settings for the chat-completions gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

pub struct Config {
    pub line_channel_secret: String,
    pub line_channel_access_token: String,
    pub listen_addr: SocketAddr,
    pub routing: RoutingPolicy,
    pub prompts: PromptConfig,
    pub gateway: GatewayConfig,
    /// Directory for state files (logs, grants).
    pub data_dir: PathBuf,
    pub grant_store: GrantStoreKind,
    pub dry_run: bool,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Load with an explicit environment lookup (secrets and `PORT`).
    pub fn load_with_env<P, F>(path: P, env: F) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        let from_env = |value: String, key: &str| -> Result<String, ConfigError> {
            let value = if value.trim().is_empty() {
                env(key).unwrap_or_default()
            } else {
                value
            };
            if value.trim().is_empty() {
                let field = key.to_lowercase();
                return Err(ConfigError::Validation(format!(
                    "{field} is required (set it in the config file or {key})"
                )));
            }
            Ok(value)
        };

        let line_channel_secret = from_env(file.line_channel_secret, "LINE_CHANNEL_SECRET")?;
        let line_channel_access_token =
            from_env(file.line_channel_access_token, "LINE_CHANNEL_ACCESS_TOKEN")?;
        let openai_api_key = from_env(file.openai_api_key, "OPENAI_API_KEY")?;

        // LINE user IDs look like U followed by 32 hex chars
        if let Some(bad) = file.whitelist_user_ids.iter().find(|id| !id.starts_with('U')) {
            return Err(ConfigError::Validation(format!(
                "whitelist_user_ids entry '{bad}' is not a LINE user ID (expected U...)"
            )));
        }
        if file.invocation_marker.trim().is_empty() {
            return Err(ConfigError::Validation("invocation_marker must not be blank".into()));
        }
        if !(0.0..=2.0).contains(&file.temperature) {
            return Err(ConfigError::Validation(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                file.temperature
            )));
        }
        if file.gateway_timeout_secs == 0 {
            return Err(ConfigError::Validation("gateway_timeout_secs must be positive".into()));
        }
        if !file.translation_prompt.contains("{language}")
            || !file.translation_prompt.contains("{text}")
        {
            return Err(ConfigError::Validation(
                "translation_prompt must contain {language} and {text}".into(),
            ));
        }

        let mut listen_addr: SocketAddr = file.listen_addr.parse().map_err(|e| {
            ConfigError::Validation(format!("listen_addr '{}' is invalid: {e}", file.listen_addr))
        })?;
        if let Some(port) = env("PORT") {
            let port: u16 = port
                .trim()
                .parse()
                .map_err(|e| ConfigError::Validation(format!("PORT '{port}' is invalid: {e}")))?;
            listen_addr.set_port(port);
        }

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            line_channel_secret,
            line_channel_access_token,
            listen_addr,
            routing: RoutingPolicy {
                whitelist: file.whitelist_user_ids.into_iter().collect(),
                invocation_marker: file.invocation_marker,
                authorization_trigger: file.authorization_trigger,
            },
            prompts: PromptConfig {
                assistant_persona: file.assistant_persona,
                home_language: file.home_language,
                foreign_language: file.foreign_language,
                translation_prompt: file.translation_prompt,
            },
            gateway: GatewayConfig {
                api_key: openai_api_key,
                base_url: file.openai_base_url.trim_end_matches('/').to_string(),
                model: file.model,
                temperature: file.temperature,
                timeout_secs: file.gateway_timeout_secs,
            },
            data_dir,
            grant_store: file.grant_store,
            dry_run: file.dry_run,
        })
    }

    /// Where authorized groups are persisted for the configured backend.
    pub fn grant_store_path(&self) -> PathBuf {
        match self.grant_store {
            GrantStoreKind::File => self.data_dir.join("authorized_groups.jsonl"),
            GrantStoreKind::Sqlite => self.data_dir.join("authorized_groups.db"),
        }
    }
}
