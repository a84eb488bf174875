use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::types::FactKind;

/// Top-level configuration loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DedConfig {
    pub gateway: GatewayConfig,
    pub agent: AgentConfig,
    pub persona: PersonaConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

fn default_port() -> u16 {
    7200
}
fn default_bind() -> String {
    "127.0.0.1".into()
}

/// Generation parameters and the ordered candidate model list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Per-candidate request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Number of recent turns included in the prompt.
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
    #[serde(default = "default_stop")]
    pub stop: Vec<String>,
    /// Seed mixed into fallback-line selection.
    #[serde(default)]
    pub fallback_seed: u64,
    #[serde(default = "default_models")]
    pub models: Vec<ModelConfig>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            history_turns: default_history_turns(),
            stop: default_stop(),
            fallback_seed: 0,
            models: default_models(),
        }
    }
}

fn default_temperature() -> f32 {
    0.85
}
fn default_max_tokens() -> u32 {
    250
}
fn default_timeout_secs() -> u64 {
    15
}
fn default_history_turns() -> usize {
    3
}
fn default_stop() -> Vec<String> {
    vec!["\nUser:".into()]
}
fn default_models() -> Vec<ModelConfig> {
    vec![
        ModelConfig {
            id: "mistralai/mistral-7b-instruct:free".into(),
            provider: "openrouter".into(),
            base_url: None,
            api_key: None,
        },
        ModelConfig {
            id: "jamba-1.5".into(),
            provider: "ai21".into(),
            base_url: None,
            api_key: None,
        },
    ]
}

/// One candidate in the fallback list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    pub provider: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

/// Persona text, trigger words, templates and fact rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    #[serde(default = "default_persona_name")]
    pub name: String,
    /// Preamble template with `{mood}`, `{user_facts}`, `{knowledge}` and `{context}`.
    #[serde(default = "default_preamble")]
    pub preamble: String,
    /// When set, the preamble is read from this file and reloaded on change.
    pub preamble_path: Option<String>,
    #[serde(default = "default_happy_keywords")]
    pub happy_keywords: Vec<String>,
    #[serde(default = "default_angry_keywords")]
    pub angry_keywords: Vec<String>,
    /// Acknowledgement for a learned fact, with `{kind}` and `{value}`.
    #[serde(default = "default_ack_template")]
    pub ack_template: String,
    #[serde(default = "default_no_facts")]
    pub no_facts: String,
    #[serde(default = "default_no_history")]
    pub no_history: String,
    #[serde(default = "default_no_knowledge")]
    pub no_knowledge: String,
    #[serde(default = "default_fallback_replies")]
    pub fallback_replies: Vec<String>,
    /// Ordered extraction rules; empty means the built-in rules.
    #[serde(default)]
    pub fact_rules: Vec<FactRuleConfig>,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: default_persona_name(),
            preamble: default_preamble(),
            preamble_path: None,
            happy_keywords: default_happy_keywords(),
            angry_keywords: default_angry_keywords(),
            ack_template: default_ack_template(),
            no_facts: default_no_facts(),
            no_history: default_no_history(),
            no_knowledge: default_no_knowledge(),
            fallback_replies: default_fallback_replies(),
            fact_rules: Vec::new(),
        }
    }
}

fn default_persona_name() -> String {
    "Дед Коля".into()
}
fn default_preamble() -> String {
    "Ты — Дед Коля (67 лет). Характер:
- Матерый, саркастичный старик
- Чёрный юмор, грубоватый язык
- Любит: бухло, трактор, Люду, Федю
- Фразы: \"курва\", \"пьянь ходячая\", \"чек, коровы идут\"
- История: собрал трактор, ездит на Опеле Астре 96-го года

Текущее настроение: {mood}

Известное о собеседнике:
{user_facts}

Что знаешь по теме:
{knowledge}

Контекст диалога:
{context}"
        .into()
}
fn default_happy_keywords() -> Vec<String> {
    ["спасибо", "класс", "люблю", "хорош"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_angry_keywords() -> Vec<String> {
    ["дурак", "идиот", "ненавижу", "скучно"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_ack_template() -> String {
    "Окей, запомнил что твоё {kind} - {value}!".into()
}
fn default_no_facts() -> String {
    "Ничего не известно".into()
}
fn default_no_history() -> String {
    "История пуста".into()
}
fn default_no_knowledge() -> String {
    "Ничего по теме".into()
}
fn default_fallback_replies() -> Vec<String> {
    [
        "Чёрт, нейросеть глючит... Давай просто поболтаем?",
        "Эх, технологии сегодня не в духе... Как сам-то?",
        "Курва, сервера тупят! Ну расскажи, что у тебя нового?",
        "Ой, курва, что-то сломалось... Давай позже!",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactRuleConfig {
    pub kind: FactKind,
    /// Case-insensitive regex with a `value` capture group.
    pub pattern: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            database_url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    let dir = state_dir();
    format!("sqlite://{}", dir.join("dedkolya.db").display())
}

/// Providers the router knows how to call.
pub const PROVIDERS: [&str; 2] = ["openrouter", "ai21"];

/// Environment variable holding the API key for a provider.
pub fn api_key_env(provider: &str) -> Option<&'static str> {
    match provider {
        "openrouter" => Some("OPENROUTER_API_KEY"),
        "ai21" => Some("AI21_API_KEY"),
        _ => None,
    }
}

/// Load configuration from file or use defaults.
///
/// Search order:
/// 1. `DEDKOLYA_CONFIG` env var
/// 2. `~/.dedkolya/config.toml`
/// 3. Zero-config defaults (no file needed)
pub fn load() -> anyhow::Result<DedConfig> {
    load_from(&config_path())
}

/// Load configuration from `path`, falling back to defaults when it is absent.
pub fn load_from(path: &Path) -> anyhow::Result<DedConfig> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
        let mut config: DedConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("invalid config at {}: {e}", path.display()))?;

        resolve_api_keys(&mut config);
        validate(&config)?;

        info!("loaded config from {}", path.display());
        Ok(config)
    } else {
        info!("no config file found, using zero-config defaults");
        let mut config = DedConfig::default();
        resolve_api_keys(&mut config);
        Ok(config)
    }
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("DEDKOLYA_CONFIG") {
        return PathBuf::from(path);
    }
    state_dir().join("config.toml")
}

/// Directory holding the config, database and credentials.
pub fn state_dir() -> PathBuf {
    if let Ok(path) = std::env::var("DEDKOLYA_CONFIG") {
        if let Some(parent) = PathBuf::from(path).parent() {
            return parent.to_path_buf();
        }
    }
    crate::fs_util::home_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".dedkolya")
}

/// Fill missing API keys from environment variables, then the credential store.
pub fn resolve_api_keys(config: &mut DedConfig) {
    for model in &mut config.agent.models {
        if model.api_key.is_some() {
            continue;
        }
        model.api_key = api_key_env(&model.provider)
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.trim().is_empty())
            .or_else(|| crate::secrets::load_api_key(&model.provider));
    }
}

/// Validate the config and return clear error messages.
pub fn validate(config: &DedConfig) -> anyhow::Result<()> {
    let agent = &config.agent;

    if agent.max_tokens == 0 {
        anyhow::bail!("agent.max_tokens must be > 0");
    }
    if agent.timeout_secs == 0 {
        anyhow::bail!("agent.timeout_secs must be > 0");
    }
    if !(0.0..=2.0).contains(&agent.temperature) {
        anyhow::bail!("agent.temperature must be between 0.0 and 2.0");
    }

    for (i, model) in agent.models.iter().enumerate() {
        if model.id.trim().is_empty() {
            anyhow::bail!("agent.models[{i}].id must not be empty");
        }
        if !PROVIDERS.contains(&model.provider.as_str()) {
            anyhow::bail!(
                "agent.models[{i}]: invalid provider '{}': must be one of {:?}",
                model.provider,
                PROVIDERS
            );
        }
    }

    let persona = &config.persona;
    if persona.fallback_replies.iter().all(|r| r.trim().is_empty()) {
        anyhow::bail!("persona.fallback_replies must contain at least one non-empty line");
    }
    for (i, rule) in persona.fact_rules.iter().enumerate() {
        crate::memory::FactRule::new(rule.kind, &rule.pattern)
            .map_err(|e| anyhow::anyhow!("persona.fact_rules[{i}]: {e}"))?;
    }

    Ok(())
}
