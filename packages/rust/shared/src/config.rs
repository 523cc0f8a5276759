//! Application configuration for stackpages.
//!
//! User config lives at `~/.stackpages/stackpages.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, StackPagesError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "stackpages.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".stackpages";

/// Content source whose markdown nodes carry the stack catalog.
pub const README_STACKS_SOURCE: &str = "readme-stacks";

// ---------------------------------------------------------------------------
// Config structs (matching stackpages.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// External metadata lookup services.
    #[serde(default)]
    pub lookups: LookupsConfig,

    /// Page generation settings.
    #[serde(default)]
    pub pages: PagesConfig,

    /// Content index location.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// `[lookups]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupsConfig {
    /// Base URL of the GitHub REST API.
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,

    /// Name of the env var holding the GitHub token (never store the token itself).
    #[serde(default = "default_github_token_env")]
    pub github_token_env: String,

    /// Base URL of the StackShare API.
    #[serde(default = "default_stackshare_api_url")]
    pub stackshare_api_url: String,

    /// Name of the env var holding the StackShare API key.
    #[serde(default = "default_stackshare_token_env")]
    pub stackshare_token_env: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Upper bound on tools enriched at once. Unset means unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
}

impl Default for LookupsConfig {
    fn default() -> Self {
        Self {
            github_api_url: default_github_api_url(),
            github_token_env: default_github_token_env(),
            stackshare_api_url: default_stackshare_api_url(),
            stackshare_token_env: default_stackshare_token_env(),
            timeout_secs: default_timeout_secs(),
            max_concurrency: None,
        }
    }
}

fn default_github_api_url() -> String {
    "https://api.github.com".into()
}
fn default_github_token_env() -> String {
    "GITHUB_TOKEN".into()
}
fn default_stackshare_api_url() -> String {
    "https://api.stackshare.io".into()
}
fn default_stackshare_token_env() -> String {
    "STACKSHARE_API_KEY".into()
}
fn default_timeout_secs() -> u64 {
    10
}

/// `[pages]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagesConfig {
    /// Source instance name whose markdown nodes get enriched stacks.
    #[serde(default = "default_source_name")]
    pub source_name: String,

    /// Page component every generated stack page is rendered with.
    #[serde(default = "default_component")]
    pub component: String,
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            source_name: default_source_name(),
            component: default_component(),
        }
    }
}

fn default_source_name() -> String {
    README_STACKS_SOURCE.into()
}
fn default_component() -> String {
    "src/components/pages/readme-stacks-page.js".into()
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the content index database.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    ".stackpages/content.db".into()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl LookupsConfig {
    /// Parse and validate the GitHub API base URL.
    pub fn github_api(&self) -> Result<Url> {
        parse_endpoint("lookups.github_api_url", &self.github_api_url)
    }

    /// Parse and validate the StackShare API base URL.
    pub fn stackshare_api(&self) -> Result<Url> {
        parse_endpoint("lookups.stackshare_api_url", &self.stackshare_api_url)
    }

    /// Read the GitHub token from the configured env var, if set and non-empty.
    pub fn github_token(&self) -> Option<String> {
        read_token(&self.github_token_env)
    }

    /// Read the StackShare API key from the configured env var, if set and non-empty.
    pub fn stackshare_token(&self) -> Option<String> {
        read_token(&self.stackshare_token_env)
    }
}

fn parse_endpoint(key: &str, value: &str) -> Result<Url> {
    let url = Url::parse(value)
        .map_err(|e| StackPagesError::config(format!("{key}: invalid URL '{value}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(StackPagesError::config(format!(
            "{key}: unsupported scheme '{other}'"
        ))),
    }
}

fn read_token(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Some(val),
        _ => None,
    }
}

/// Check the config for values that would only fail later.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    config.lookups.github_api()?;
    config.lookups.stackshare_api()?;
    if config.lookups.timeout_secs == 0 {
        return Err(StackPagesError::config("lookups.timeout_secs must be > 0"));
    }
    if config.lookups.max_concurrency == Some(0) {
        return Err(StackPagesError::config(
            "lookups.max_concurrency must be > 0 when set",
        ));
    }
    if config.pages.source_name.trim().is_empty() {
        return Err(StackPagesError::config("pages.source_name must not be empty"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.stackpages/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| StackPagesError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.stackpages/stackpages.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| StackPagesError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        StackPagesError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| StackPagesError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| StackPagesError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| StackPagesError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("github_api_url"));
        assert!(toml_str.contains("GITHUB_TOKEN"));
        assert!(toml_str.contains("readme-stacks"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.lookups.timeout_secs, 10);
        assert_eq!(parsed.pages.source_name, README_STACKS_SOURCE);
        assert!(parsed.lookups.max_concurrency.is_none());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[lookups]
max_concurrency = 4

[pages]
component = "src/templates/stack.js"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.lookups.max_concurrency, Some(4));
        assert_eq!(config.lookups.github_api_url, "https://api.github.com");
        assert_eq!(config.pages.component, "src/templates/stack.js");
        assert_eq!(config.pages.source_name, README_STACKS_SOURCE);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_bad_endpoint() {
        let mut config = AppConfig::default();
        config.lookups.stackshare_api_url = "ftp://stackshare.io".into();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));

        config.lookups.stackshare_api_url = "not a url".into();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_zero_concurrency() {
        let mut config = AppConfig::default();
        config.lookups.max_concurrency = Some(0);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn missing_token_env_reads_none() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.lookups.github_token_env = "SP_TEST_NONEXISTENT_TOKEN_12345".into();
        assert!(config.lookups.github_token().is_none());
    }
}
