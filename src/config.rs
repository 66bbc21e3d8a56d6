//! Bot configuration: the rule table and everything the engine reads from it.
//!
//! The configuration is parsed once at startup (YAML via `serde_yaml`) and then
//! shared read-only behind an `Arc`. Nothing in the engine mutates it.
//!
//! ```yaml
//! variables:
//!   bot_name: Bot
//! streaming:
//!   chunk_delay_ms: 80
//! rules:
//!   - id: greet
//!     match: { endpoint: chat, contains: [hello] }
//!     respond: { text: "Hi {{bot_name}}" }
//! fallback:
//!   text: "This is a mock response to: '{{last_user_message}}'."
//! ```
//!
//! Field names mirror the YAML keys. Every section is optional; an empty
//! document is a valid (rule-less) configuration.

use crate::Endpoint;
use serde::de::IntoDeserializer;
use serde::de::value::StrDeserializer;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file when `--config` is not given.
pub const CONFIG_ENV: &str = "MOCK_SERVER_CONFIG";
/// Config file looked up in the working directory as a last resort.
pub const DEFAULT_CONFIG_PATH: &str = "bot.yaml";
/// Per-chunk streaming delay when neither the rule nor the config sets one.
pub const DEFAULT_CHUNK_DELAY_MS: u64 = 150;
pub const DEFAULT_PORT: u16 = 3117;
pub const DEFAULT_HISTORY_TURNS: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Where a loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Builtin,
}

// --- Configuration tree -------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub version: u32,
    pub server: ServerConfig,
    pub models: Vec<ModelConfig>,
    pub streaming: StreamingConfig,
    pub tools: ToolsConfig,
    pub variables: BTreeMap<String, String>,
    pub rules: Vec<Rule>,
    pub fallback: Respond,
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: Option<u16>,
    /// Allowed CORS origin; `*` (or unset) allows any.
    pub cors: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    #[serde(default = "default_owner")]
    pub owned_by: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    pub enabled: Option<bool>,
    pub chunk_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Tool names that rules may invoke. Empty enables every registered tool.
    pub enabled: Vec<String>,
    pub registry: BTreeMap<String, ToolDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Output item type of the call stub, e.g. `web_search_call`.
    pub call_type: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub message: Option<CannedMessage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CannedMessage {
    pub text: String,
    pub annotations: Vec<Annotation>,
}

/// A citation attached to message text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of turns (inputs and outputs) kept per response chain.
    pub max_turns: usize,
    /// Maximum number of stored responses; unset keeps every response.
    pub max_responses: Option<usize>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig { max_turns: DEFAULT_HISTORY_TURNS, max_responses: None }
    }
}

// --- Rules --------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    /// Diagnostic name only; never used for matching.
    pub id: String,
    pub r#match: Match,
    pub respond: Respond,
    pub stream_override: Option<StreamingConfig>,
    /// Keep evaluating after this rule matches so a later rule can override it.
    pub r#continue: bool,
    /// Chance in `[0, 1]` that a structurally matching rule fires.
    pub probability: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Match {
    /// Unset or `""` matches both surfaces.
    #[serde(deserialize_with = "endpoint_or_any")]
    pub endpoint: Option<Endpoint>,
    pub model: OneOrMany,
    pub role: Option<String>,
    pub contains: Vec<String>,
    pub regex: Option<String>,
}

/// A YAML scalar or sequence of strings (`model: gpt-4o` or `model: [a, b]`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OneOrManyRepr", into = "Vec<String>")]
pub struct OneOrMany(pub Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrManyRepr {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrManyRepr> for OneOrMany {
    fn from(repr: OneOrManyRepr) -> Self {
        match repr {
            OneOrManyRepr::One(single) => OneOrMany(vec![single]),
            OneOrManyRepr::Many(many) => OneOrMany(many),
        }
    }
}

impl From<OneOrMany> for Vec<String> {
    fn from(value: OneOrMany) -> Self {
        value.0
    }
}

/// What a rule (or the fallback) answers with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Respond {
    pub text: String,
    pub choose: Vec<WeightedText>,
    pub message: CannedMessage,
    /// Registry tools to invoke; their canned messages and citations are aggregated.
    pub use_tools: Vec<String>,
    /// Explicit call stubs appended after the `use_tools` ones.
    pub tools: Vec<ToolStub>,
    /// Synthetic failure; short-circuits every other field.
    pub error: Option<ErrorPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedText {
    #[serde(default)]
    pub weight: i64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolStub {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub status: u16,
    pub code: String,
    pub message: String,
}

fn default_owner() -> String {
    "openai".to_string()
}

fn default_status() -> String {
    "completed".to_string()
}

fn endpoint_or_any<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Endpoint>, D::Error> {
    let tag = Option::<String>::deserialize(deserializer)?;
    match tag.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(tag) => {
            let tag: StrDeserializer<'_, D::Error> = tag.into_deserializer();
            Endpoint::deserialize(tag).map(Some)
        }
    }
}

// --- Loading ------------------------------------------------------------------

impl BotConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document deserializes to `null`; treat it as "all defaults".
        if yaml.trim().is_empty() {
            return Ok(BotConfig::default());
        }
        serde_yaml::from_str(yaml)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_yaml_str(&raw).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    /// Load `path` (or [`DEFAULT_CONFIG_PATH`]); a missing file yields [`BotConfig::builtin`].
    ///
    /// Only a *missing* file falls back. A file that exists but cannot be read
    /// or parsed is an error.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<(Self, ConfigSource), ConfigError> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        match Self::load(&path) {
            Ok(config) => Ok((config, ConfigSource::File(path))),
            Err(ConfigError::Read { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                Ok((Self::builtin(), ConfigSource::Builtin))
            }
            Err(err) => Err(err),
        }
    }

    /// Global per-chunk delay.
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.streaming.chunk_delay_ms.unwrap_or(DEFAULT_CHUNK_DELAY_MS))
    }

    /// Delay for a matched rule: its override, else the global delay.
    pub fn rule_delay(&self, rule: &Rule) -> Duration {
        match rule.stream_override.as_ref().and_then(|s| s.chunk_delay_ms) {
            Some(ms) => Duration::from_millis(ms),
            None => self.chunk_delay(),
        }
    }

    pub fn streaming_enabled(&self) -> bool {
        self.streaming.enabled.unwrap_or(true)
    }

    pub fn port(&self) -> u16 {
        self.server.port.unwrap_or(DEFAULT_PORT)
    }

    /// Configured models, or the three stock ids when none are listed.
    pub fn models_or_default(&self) -> Vec<ModelConfig> {
        if !self.models.is_empty() {
            return self.models.clone();
        }
        ["gpt-4o", "gpt-4o-mini", "gpt-3.5-turbo"]
            .into_iter()
            .map(|id| ModelConfig { id: id.to_string(), owned_by: default_owner() })
            .collect()
    }

    /// The configuration served when no config file exists.
    pub fn builtin() -> Self {
        let rule = |id: &str, endpoint: Endpoint, contains: &[&str], respond: Respond| Rule {
            id: id.to_string(),
            r#match: Match {
                endpoint: Some(endpoint),
                contains: contains.iter().map(|s| s.to_string()).collect(),
                ..Match::default()
            },
            respond,
            ..Rule::default()
        };

        let mut registry = BTreeMap::new();
        registry.insert(
            "custom_demo".to_string(),
            ToolDefinition {
                call_type: "custom_demo_call".to_string(),
                status: default_status(),
                message: Some(CannedMessage {
                    text: "Custom tool ran with input: '{{input_text}}'".to_string(),
                    annotations: Vec::new(),
                }),
            },
        );

        BotConfig {
            version: 1,
            server: ServerConfig { port: Some(DEFAULT_PORT), cors: Some("*".to_string()) },
            models: Vec::new(),
            streaming: StreamingConfig { enabled: Some(true), chunk_delay_ms: Some(120) },
            tools: ToolsConfig {
                enabled: vec!["web_search".into(), "file_search".into(), "custom_demo".into()],
                registry,
            },
            variables: BTreeMap::from([("bot_name".to_string(), "Mock OpenAI".to_string())]),
            rules: vec![
                rule(
                    "greet",
                    Endpoint::Chat,
                    &["hello", "hi"],
                    Respond { text: "Hello! I'm {{bot_name}}. How can I help?".into(), ..Respond::default() },
                ),
                rule(
                    "jokes",
                    Endpoint::Chat,
                    &["joke"],
                    Respond {
                        choose: vec![
                            WeightedText {
                                weight: 1,
                                text: "Why don't scientists trust atoms? They make up everything!".into(),
                            },
                            WeightedText { weight: 1, text: "What do you call a fake noodle? An impasta!".into() },
                        ],
                        ..Respond::default()
                    },
                ),
                rule(
                    "chat_with_search",
                    Endpoint::Chat,
                    &["search", "latest"],
                    Respond {
                        use_tools: vec!["web_search".into()],
                        text: "Summary above. Let me know if you want more details.".into(),
                        ..Respond::default()
                    },
                ),
                rule(
                    "responses_web_search",
                    Endpoint::Responses,
                    &["news", "latest", "AI"],
                    Respond {
                        use_tools: vec!["web_search".into()],
                        message: CannedMessage {
                            text: "Here are the latest AI headlines with citations.".into(),
                            annotations: Vec::new(),
                        },
                        ..Respond::default()
                    },
                ),
                rule(
                    "responses_custom_tool",
                    Endpoint::Responses,
                    &["custom tool"],
                    Respond { use_tools: vec!["custom_demo".into()], ..Respond::default() },
                ),
            ],
            fallback: Respond {
                text: "This is a mock response to: '{{last_user_message}}'.".into(),
                ..Respond::default()
            },
            history: HistoryConfig::default(),
        }
    }
}
