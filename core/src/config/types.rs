use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub invoker: InvokerConfig,

    #[serde(default = "default_models")]
    pub models: Vec<ModelConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            engine: EngineConfig::default(),
            invoker: InvokerConfig::default(),
            models: default_models(),
        }
    }
}

impl AppConfig {
    pub fn model(&self, id: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.id == id)
    }

    /// The model selected in `engine.model`.
    pub fn selected_model(&self) -> Option<&ModelConfig> {
        self.model(&self.engine.model)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.model.trim().is_empty() {
            return Err(ConfigError::Invalid("engine.model is empty".into()));
        }
        if !self.models.is_empty() && self.selected_model().is_none() {
            return Err(ConfigError::Invalid(format!(
                "engine.model '{}' is not in the model catalogue",
                self.engine.model
            )));
        }
        match &self.invoker {
            InvokerConfig::Http(http) if http.endpoint.trim().is_empty() => {
                Err(ConfigError::Invalid("invoker.endpoint is empty".into()))
            }
            InvokerConfig::Command(cmd) if cmd.program.trim().is_empty() => {
                Err(ConfigError::Invalid("invoker.program is empty".into()))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory`.
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "phaseforge_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Directory for log files. Defaults to `<data dir>/logs`.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_file() -> bool {
    false
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Parallel,
}

impl std::str::FromStr for ExecutionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "parallel" => Ok(Self::Parallel),
            other => Err(ConfigError::Invalid(format!("unknown execution mode '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Model id, looked up in `models`.
    #[serde(default = "default_engine_model")]
    pub model: String,

    /// Directory holding the phase prompt files.
    #[serde(default)]
    pub prompts_dir: Option<String>,

    /// Registry TOML file. The built-in registry is used when unset.
    #[serde(default)]
    pub registry: Option<String>,
}

fn default_engine_model() -> String {
    "gemini-2.5-flash".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            model: default_engine_model(),
            prompts_dir: None,
            registry: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum InvokerConfig {
    Http(HttpInvokerConfig),
    Command(CommandInvokerConfig),
    Echo,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        InvokerConfig::Http(HttpInvokerConfig::default())
    }
}

impl InvokerConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::Command(_) => "command",
            Self::Echo => "echo",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpInvokerConfig {
    #[serde(default = "default_http_endpoint")]
    pub endpoint: String,
}

fn default_http_endpoint() -> String {
    "http://localhost:3000/api/generate".to_string()
}

impl Default for HttpInvokerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_http_endpoint(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandInvokerConfig {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Overrides the model timeout when set.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    pub name: String,

    /// Backend model name. Defaults to `id`.
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default = "default_model_timeout_secs")]
    pub timeout_secs: u64,
}

impl ModelConfig {
    pub fn backend_model(&self) -> &str {
        self.model.as_deref().unwrap_or(&self.id)
    }
}

fn default_model_timeout_secs() -> u64 {
    600
}

fn model(id: &str, name: &str, backend: &str) -> ModelConfig {
    ModelConfig {
        id: id.to_string(),
        name: name.to_string(),
        model: Some(backend.to_string()),
        timeout_secs: default_model_timeout_secs(),
    }
}

pub fn default_models() -> Vec<ModelConfig> {
    vec![
        model("gemini-2.5-flash", "Gemini 2.5 Flash", "gemini-2.5-flash"),
        model("gemini-3-pro-preview", "Gemini 3", "gemini-3-pro-preview"),
        model(
            "qwen-3-235b-a22b-instruct",
            "Qwen 3 235B Instruct",
            "qwen-3-235b-a22b-instruct-2507",
        ),
        model("deepseek_chat_worker", "Deepseek Chat Worker", "deepseek-chat"),
        model("minimax-m2", "Minimax M2", "MiniMax-M2"),
    ]
}
