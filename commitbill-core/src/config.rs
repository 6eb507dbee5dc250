//! Settings loading and management
//!
//! Settings are loaded from `~/.config/commitbill/config.toml`. Invoice
//! definitions live in a separate JSON file (see [`crate::invoice_config`]).
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/commitbill/` (~/.config/commitbill/)
//! - Data: `$XDG_DATA_HOME/commitbill/` (~/.local/share/commitbill/)
//! - State/Logs: `$XDG_STATE_HOME/commitbill/` (~/.local/state/commitbill/)
//!
//! Credentials may come from the environment, but only [`Config::load`] reads
//! it. Everything downstream receives explicit values from this struct.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
pub(crate) fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        return home_dir();
    }
    match path.strip_prefix("~/") {
        Some(rest) => home_dir().join(rest),
        None => PathBuf::from(path),
    }
}

/// Main settings struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Path to the invoice definitions (JSON). Defaults to
    /// `$XDG_CONFIG_HOME/commitbill/invoices.json`.
    #[serde(default)]
    pub invoices_path: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// GitHub API access
    #[serde(default)]
    pub github: GitHubConfig,

    /// Local repository fallback
    #[serde(default)]
    pub local: LocalConfig,

    /// Text generation backend for the AI stages (optional)
    #[serde(default)]
    pub ai: Option<AiBackendConfig>,

    /// Mail API used for delivery (optional)
    #[serde(default)]
    pub mailer: Option<MailerConfig>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// GitHub REST API configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GitHubConfig {
    /// Personal access token (can also use GITHUB_TOKEN)
    pub token: Option<String>,

    /// API base URL
    #[serde(default = "default_github_api_url")]
    pub api_url: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_github_timeout")]
    pub timeout_secs: u64,

    /// Maximum pages of 100 commits fetched per repo and week
    #[serde(default = "default_github_max_pages")]
    pub max_pages: u32,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: default_github_api_url(),
            timeout_secs: default_github_timeout(),
            max_pages: default_github_max_pages(),
        }
    }
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_github_timeout() -> u64 {
    30
}

fn default_github_max_pages() -> u32 {
    10
}

/// Local repository fallback configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LocalConfig {
    /// Directory searched for `*<customer>*` clones when an invoice has no
    /// explicit sources.
    #[serde(default = "default_search_root")]
    pub search_root: String,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            search_root: default_search_root(),
        }
    }
}

fn default_search_root() -> String {
    "~/code".to_string()
}

impl LocalConfig {
    /// Search root with `~` expanded
    pub fn search_root_path(&self) -> PathBuf {
        expand_tilde(&self.search_root)
    }
}

/// Supported text generation backends
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    /// External CLI reading the prompt on stdin
    Command,
    Ollama,
    Claude,
    OpenAI,
}

impl AiProvider {
    /// Returns the default endpoint for HTTP providers
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            AiProvider::Command => "",
            AiProvider::Ollama => "http://localhost:11434",
            AiProvider::Claude => "https://api.anthropic.com",
            AiProvider::OpenAI => "https://api.openai.com",
        }
    }
}

/// Text generation backend configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AiBackendConfig {
    /// Provider type
    pub provider: AiProvider,

    /// Program to run for the `command` provider
    #[serde(default = "default_ai_command")]
    pub command: String,

    /// Arguments for the `command` provider
    #[serde(default = "default_ai_args")]
    pub args: Vec<String>,

    /// Model to use (HTTP providers)
    #[serde(default)]
    pub model: Option<String>,

    /// API endpoint (optional, uses default for provider)
    pub endpoint: Option<String>,

    /// API key (can also use ANTHROPIC_API_KEY / OPENAI_API_KEY)
    pub api_key: Option<String>,

    /// Per-call timeout in seconds
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
}

fn default_ai_command() -> String {
    "claude".to_string()
}

fn default_ai_args() -> Vec<String> {
    vec!["-p".to_string()]
}

fn default_ai_timeout() -> u64 {
    120
}

/// Mail API configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MailerConfig {
    /// Endpoint accepting a JSON message (Resend-compatible)
    #[serde(default = "default_mailer_endpoint")]
    pub endpoint: String,

    /// API key (can also use COMMITBILL_MAIL_API_KEY)
    pub api_key: Option<String>,

    /// Sender address; invoice `global.defaultFromEmail` takes precedence
    pub from_email: Option<String>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_mailer_timeout")]
    pub timeout_secs: u64,
}

fn default_mailer_endpoint() -> String {
    "https://api.resend.com/emails".to_string()
}

fn default_mailer_timeout() -> u64 {
    30
}

impl MailerConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(Error::Config("mailer.endpoint must not be empty".to_string()));
        }
        if self.api_key.is_none() {
            return Err(Error::Config(
                "mailer.api_key (or COMMITBILL_MAIL_API_KEY) is required".to_string(),
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from the default path and apply environment overrides
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Config::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Fill credentials missing from the file with values from `lookup`.
    ///
    /// Values present in the file win.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.github.token.is_none() {
            self.github.token = lookup("GITHUB_TOKEN");
        }

        if let Some(ai) = self.ai.as_mut() {
            if ai.api_key.is_none() {
                ai.api_key = match ai.provider {
                    AiProvider::Claude => lookup("ANTHROPIC_API_KEY"),
                    AiProvider::OpenAI => lookup("OPENAI_API_KEY"),
                    AiProvider::Command | AiProvider::Ollama => None,
                };
            }
        }

        if let Some(mailer) = self.mailer.as_mut() {
            if mailer.api_key.is_none() {
                mailer.api_key = lookup("COMMITBILL_MAIL_API_KEY");
            }
        }
    }

    /// Resolved path of the invoice definitions file
    pub fn invoices_path(&self) -> PathBuf {
        self.invoices_path
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("invoices.json"))
    }

    /// Returns the config directory
    ///
    /// `$XDG_CONFIG_HOME/commitbill/` (~/.config/commitbill/)
    pub fn config_dir() -> PathBuf {
        xdg_config_home().join("commitbill")
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/commitbill/config.toml` (~/.config/commitbill/config.toml)
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Returns the data directory path (for the invoice store)
    ///
    /// `$XDG_DATA_HOME/commitbill/` (~/.local/share/commitbill/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("commitbill")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/commitbill/` (~/.local/state/commitbill/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("commitbill")
    }

    /// Returns the invoice store path
    ///
    /// `$XDG_DATA_HOME/commitbill/invoices.db`
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("invoices.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/commitbill/commitbill.log`
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("commitbill.log")
    }
}
