use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub openrouter: OpenRouterConfig,
    #[serde(default)]
    pub topology: TopologyConfig,
}

/// On-disk locations of the sync pipeline's artifacts. Relative paths
/// resolve against the invocation directory, matching the convention that
/// the tool runs from the deployment directory.
#[derive(Debug, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_chat_config")]
    pub chat_config: PathBuf,
    #[serde(default = "default_models_file")]
    pub models_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenRouterConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Whether `:free` model variants are kept in the fetched list.
    #[serde(default)]
    pub include_free: bool,
    /// Provider allowlist (id prefix before `/`); empty means all providers.
    #[serde(default)]
    pub providers: Vec<String>,
}

/// Parameters that differ between deployment flavors of the service stack.
/// The compose file is rendered from a single source; these knobs replace
/// what used to be hand-maintained duplicate files.
#[derive(Debug, Deserialize)]
pub struct TopologyConfig {
    /// Host the chat API uses to reach the speech service: the container
    /// name on the compose network, or `localhost` for host-network setups.
    #[serde(default = "default_speech_host")]
    pub speech_host: String,
    #[serde(default)]
    pub rag_image: RagImage,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_speech_port")]
    pub speech_port: u16,
    #[serde(default = "default_client_http_port")]
    pub client_http_port: u16,
    #[serde(default = "default_client_https_port")]
    pub client_https_port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RagImage {
    #[default]
    Full,
    Lite,
}

impl RagImage {
    pub fn image_ref(self) -> &'static str {
        match self {
            Self::Full => "ghcr.io/danny-avila/librechat-rag-api-dev:latest",
            Self::Lite => "ghcr.io/danny-avila/librechat-rag-api-dev-lite:latest",
        }
    }
}

// Defaults
fn default_chat_config() -> PathBuf {
    "librechat.yaml".into()
}
fn default_models_file() -> PathBuf {
    "openrouter.txt".into()
}
fn default_api_url() -> String {
    "https://openrouter.ai/api/v1/models".into()
}
fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_speech_host() -> String {
    "speech".into()
}
fn default_api_port() -> u16 {
    3080
}
fn default_speech_port() -> u16 {
    8000
}
fn default_client_http_port() -> u16 {
    80
}
fn default_client_https_port() -> u16 {
    443
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            chat_config: default_chat_config(),
            models_file: default_models_file(),
        }
    }
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key_env: default_api_key_env(),
            include_free: false,
            providers: Vec::new(),
        }
    }
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            speech_host: default_speech_host(),
            rag_image: RagImage::default(),
            api_port: default_api_port(),
            speech_port: default_speech_port(),
            client_http_port: default_client_http_port(),
            client_https_port: default_client_https_port(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            openrouter: OpenRouterConfig::default(),
            topology: TopologyConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config {}: {e}", path.display())))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.topology.speech_host.is_empty() {
            return Err(Error::config("topology.speech_host must not be empty"));
        }
        if self.openrouter.api_url.is_empty() {
            return Err(Error::config("openrouter.api_url must not be empty"));
        }
        Ok(())
    }
}
