//! Application configuration for the due-diligence pipeline.
//!
//! User config lives at `~/.duediligence/duediligence.toml`.
//! CLI flags override config file values, which override defaults.
//! API keys are never stored in the file, only the names of the env vars
//! that hold them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DueDiligenceError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "duediligence.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".duediligence";

// ---------------------------------------------------------------------------
// Config structs (matching duediligence.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// External search service settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Language model settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Page fetch settings.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Video transcript settings.
    #[serde(default)]
    pub transcript: TranscriptConfig,

    /// Pipeline engine settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Standalone JSON server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Name of the env var holding the search API key.
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    /// Search endpoint (SerpApi-compatible JSON API).
    #[serde(default = "default_search_url")]
    pub base_url: String,

    /// Region tag sent with every query.
    #[serde(default = "default_region")]
    pub region: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_search_key_env(),
            base_url: default_search_url(),
            region: default_region(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_search_key_env() -> String {
    "SERPAPI_API_KEY".into()
}
fn default_search_url() -> String {
    "https://serpapi.com/search.json".into()
}
fn default_region() -> String {
    "india".into()
}
fn default_timeout() -> u64 {
    30
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Name of the env var holding the model API key.
    #[serde(default = "default_llm_key_env")]
    pub api_key_env: String,

    /// Base URL of an OpenAI-compatible API, including the version prefix.
    #[serde(default = "default_llm_url")]
    pub base_url: String,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_llm_key_env(),
            base_url: default_llm_url(),
            model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_llm_key_env() -> String {
    "NVIDIA_API_KEY".into()
}
fn default_llm_url() -> String {
    "https://integrate.api.nvidia.com/v1".into()
}
fn default_model() -> String {
    "meta/llama3-70b-instruct".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_llm_timeout() -> u64 {
    120
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum number of redirects followed per request.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Character cap on extracted page text.
    #[serde(default = "default_content_char_limit")]
    pub content_char_limit: usize,

    /// Allow fetching loopback/private targets.
    #[serde(default)]
    pub allow_private_targets: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_redirects: default_max_redirects(),
            content_char_limit: default_content_char_limit(),
            allow_private_targets: false,
        }
    }
}

fn default_max_redirects() -> usize {
    10
}
fn default_content_char_limit() -> usize {
    5000
}

/// `[transcript]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptConfig {
    /// Video site origin serving watch pages.
    #[serde(default = "default_video_origin")]
    pub base_url: String,

    /// Preferred caption languages, most preferred first.
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            base_url: default_video_origin(),
            languages: default_languages(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_video_origin() -> String {
    "https://www.youtube.com".into()
}
fn default_languages() -> Vec<String> {
    vec!["en".into()]
}

/// Stage scheduling strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One stage at a time, in graph order.
    #[default]
    Sequential,
    /// Stages with satisfied dependencies run concurrently, merged in graph order.
    Layered,
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Stage scheduling strategy.
    #[serde(default)]
    pub execution: ExecutionMode,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.duediligence/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DueDiligenceError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.duediligence/duediligence.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DueDiligenceError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        DueDiligenceError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DueDiligenceError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DueDiligenceError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DueDiligenceError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a non-empty API key from the named env var.
pub fn read_api_key(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(DueDiligenceError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Check that both the search and the model API keys are present.
pub fn validate_api_keys(config: &AppConfig) -> Result<()> {
    read_api_key(&config.search.api_key_env)?;
    read_api_key(&config.llm.api_key_env)?;
    Ok(())
}
