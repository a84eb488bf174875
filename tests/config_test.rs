use dedkolya::config::{DedConfig, StorageBackend, load_from, validate};
use dedkolya::types::FactKind;

#[test]
fn default_config_has_sensible_values() {
    let config = DedConfig::default();
    assert_eq!(config.gateway.port, 7200);
    assert_eq!(config.gateway.bind, "127.0.0.1");
    assert_eq!(config.agent.max_tokens, 250);
    assert_eq!(config.agent.timeout_secs, 15);
    assert_eq!(config.agent.history_turns, 3);
    assert_eq!(config.agent.stop, vec!["\nUser:".to_string()]);
    assert_eq!(config.agent.models.len(), 2);
    assert_eq!(config.agent.models[0].provider, "openrouter");
    assert_eq!(config.agent.models[1].provider, "ai21");
    assert_eq!(config.persona.name, "Дед Коля");
    assert_eq!(config.persona.fallback_replies.len(), 4);
    assert!(config.persona.fact_rules.is_empty());
    assert_eq!(config.storage.backend, StorageBackend::Sqlite);
    assert!(config.storage.database_url.starts_with("sqlite://"));
}

#[test]
fn default_preamble_has_all_placeholders() {
    let preamble = DedConfig::default().persona.preamble;
    assert!(preamble.contains("{mood}"));
    assert!(preamble.contains("{user_facts}"));
    assert!(preamble.contains("{knowledge}"));
    assert!(preamble.contains("{context}"));
}

#[test]
fn valid_toml_parses_successfully() {
    let toml_str = r#"
[gateway]
port = 8080
bind = "0.0.0.0"

[agent]
temperature = 0.5
max_tokens = 120
fallback_seed = 42

[[agent.models]]
id = "model-a"
provider = "openrouter"
base_url = "http://localhost:9000/v1"
api_key = "sk-test"

[persona]
happy_keywords = ["ура"]
fallback_replies = ["Не сейчас."]

[[persona.fact_rules]]
kind = "city"
pattern = "(?i)город (?P<value>\\w+)"

[storage]
backend = "memory"
"#;

    let config: DedConfig = toml::from_str(toml_str).unwrap();
    assert_eq!(config.gateway.port, 8080);
    assert_eq!(config.agent.max_tokens, 120);
    assert_eq!(config.agent.fallback_seed, 42);
    assert_eq!(config.agent.models.len(), 1);
    assert_eq!(config.agent.models[0].id, "model-a");
    assert_eq!(
        config.agent.models[0].base_url.as_deref(),
        Some("http://localhost:9000/v1")
    );
    assert_eq!(config.persona.happy_keywords, vec!["ура".to_string()]);
    assert_eq!(config.persona.fact_rules.len(), 1);
    assert_eq!(config.persona.fact_rules[0].kind, FactKind::City);
    assert_eq!(config.storage.backend, StorageBackend::Memory);
    validate(&config).unwrap();
}

#[test]
fn partial_config_uses_defaults_for_missing_fields() {
    let config: DedConfig = toml::from_str("[agent]\nmax_tokens = 99\n").unwrap();
    assert_eq!(config.gateway.port, 7200);
    assert_eq!(config.agent.max_tokens, 99);
    assert_eq!(config.agent.timeout_secs, 15);
    assert_eq!(config.agent.models.len(), 2);
    assert_eq!(config.persona.angry_keywords.len(), 4);
}

#[test]
fn malformed_toml_returns_parse_error() {
    let result = toml::from_str::<DedConfig>("this is not valid toml {{{");
    assert!(result.is_err());
}

#[test]
fn validate_rejects_unknown_provider() {
    let toml_str = r#"
[[agent.models]]
id = "x"
provider = "deepmind"
"#;
    let config: DedConfig = toml::from_str(toml_str).unwrap();
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("invalid provider"), "{err}");
}

#[test]
fn validate_rejects_zero_limits_and_blank_pool() {
    let mut config = DedConfig::default();
    config.agent.max_tokens = 0;
    assert!(validate(&config).is_err());

    let mut config = DedConfig::default();
    config.agent.timeout_secs = 0;
    assert!(validate(&config).is_err());

    let mut config = DedConfig::default();
    config.persona.fallback_replies = vec!["  ".into()];
    assert!(validate(&config).is_err());
}

#[test]
fn validate_rejects_rule_without_value_group() {
    let toml_str = r#"
[[persona.fact_rules]]
kind = "name"
pattern = "меня зовут (\\w+)"
"#;
    let config: DedConfig = toml::from_str(toml_str).unwrap();
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("fact_rules[0]"), "{err}");
}

#[test]
fn load_from_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_from(&dir.path().join("nope.toml")).unwrap();
    assert_eq!(config.gateway.port, 7200);
    assert_eq!(config.agent.models.len(), 2);
}

#[test]
fn load_from_reads_and_validates_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[gateway]\nport = 9100\n\n[storage]\nbackend = \"memory\"\n",
    )
    .unwrap();

    let config = load_from(&path).unwrap();
    assert_eq!(config.gateway.port, 9100);
    assert_eq!(config.storage.backend, StorageBackend::Memory);
}

#[test]
fn load_from_rejects_invalid_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    std::fs::write(&path, "[agent]\nmax_tokens = 0\n").unwrap();
    assert!(load_from(&path).is_err());

    std::fs::write(&path, "not toml {{{").unwrap();
    let err = load_from(&path).unwrap_err().to_string();
    assert!(err.contains("invalid config"), "{err}");
}
