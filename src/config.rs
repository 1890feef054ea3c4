use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    server: ServerConfig,
    conversation: ConversationConfig,
    llm: LlmConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct ServerConfig {
    port: u16,
    static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            static_dir: "dist".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct ConversationConfig {
    api_key: Option<String>,
    persona_id: Option<String>,
    base_url: String,
    timeout_secs: u64,
    placeholder_on_failure: bool,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            persona_id: None,
            base_url: "https://tavusapi.com/v2".to_string(),
            timeout_secs: 10,
            placeholder_on_failure: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct LlmConfig {
    api_key: Option<String>,
    base_url: String,
    vision_model: String,
    recipe_model: String,
    timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            vision_model: "gpt-4o".to_string(),
            recipe_model: "gpt-4".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub static_dir: PathBuf,
    pub conversation_api_key: Option<String>,
    pub persona_id: Option<String>,
    pub conversation_base_url: String,
    pub conversation_timeout: u64,
    pub placeholder_on_failure: bool,
    pub llm_api_key: Option<String>,
    pub llm_base_url: String,
    pub vision_model: String,
    pub recipe_model: String,
    pub llm_timeout: u64,
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::from_toml(&content, |key| std::env::var(key).ok())
    }

    pub fn load() -> Result<Self> {
        let path = std::env::var("AIOLI_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        if std::path::Path::new(&path).exists() {
            Self::from_file(&path)
        } else {
            Self::from_parts(ConfigFile::default(), |key| std::env::var(key).ok())
        }
    }

    pub(crate) fn from_toml(content: &str, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config_file: ConfigFile =
            toml::from_str(content).context("Failed to parse config file")?;
        Self::from_parts(config_file, env)
    }

    fn from_parts(file: ConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let port = match env("PORT") {
            Some(port) => port
                .parse()
                .with_context(|| format!("Invalid PORT value: {}", port))?,
            None => file.server.port,
        };

        Ok(Self {
            port,
            static_dir: env("STATIC_DIR").unwrap_or(file.server.static_dir).into(),
            conversation_api_key: env("TAVUS_API_KEY")
                .or_else(|| env("VITE_TAVUS_API_KEY"))
                .or(file.conversation.api_key),
            persona_id: env("PERSONA_ID")
                .or_else(|| env("VITE_PERSONA_ID"))
                .or(file.conversation.persona_id),
            conversation_base_url: env("TAVUS_BASE_URL").unwrap_or(file.conversation.base_url),
            conversation_timeout: file.conversation.timeout_secs,
            placeholder_on_failure: file.conversation.placeholder_on_failure,
            llm_api_key: env("OPENAI_API_KEY").or(file.llm.api_key),
            llm_base_url: env("OPENAI_BASE_URL").unwrap_or(file.llm.base_url),
            vision_model: file.llm.vision_model,
            recipe_model: file.llm.recipe_model,
            llm_timeout: file.llm.timeout_secs,
        })
    }
}
