use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dedkolya::config::FactRuleConfig;
use dedkolya::memory::{FactExtractor, FactRule};
use dedkolya::store::{FactStore, MemoryStore, StoreError};
use dedkolya::types::{Fact, FactKind};

#[test]
fn recognises_each_default_kind() {
    let extractor = FactExtractor::default();
    let cases = [
        ("меня зовут Вася", FactKind::Name, "Вася"),
        ("Я из Твери", FactKind::City, "Твери"),
        ("мне 42 года", FactKind::Age, "42"),
        ("я работаю трактористом", FactKind::Job, "трактористом"),
        ("увлекаюсь рыбалкой, охотой", FactKind::Hobby, "рыбалкой, охотой"),
    ];

    for (text, kind, value) in cases {
        assert_eq!(
            extractor.find(text),
            Some((kind, value.to_string())),
            "input: {text}"
        );
    }
}

#[test]
fn first_matching_rule_wins() {
    // Both the name and the hobby rule match; name comes first.
    let extractor = FactExtractor::default();
    let found = extractor.find("люблю пиво, а меня зовут Коля");
    assert_eq!(found, Some((FactKind::Name, "Коля".to_string())));
}

#[test]
fn matching_is_case_insensitive() {
    let extractor = FactExtractor::default();
    assert_eq!(
        extractor.find("МЕНЯ ЗОВУТ ПЕТЯ"),
        Some((FactKind::Name, "ПЕТЯ".to_string()))
    );
}

#[test]
fn no_trigger_no_fact() {
    let extractor = FactExtractor::default();
    assert_eq!(extractor.find("спасибо, ты лучший"), None);
    assert_eq!(extractor.find("дурак"), None);
    assert_eq!(extractor.find(""), None);
}

#[test]
fn age_requires_unit() {
    let extractor = FactExtractor::default();
    assert_eq!(extractor.find("мне 42"), None);
}

#[test]
fn configured_rules_replace_defaults() {
    let rules = vec![FactRuleConfig {
        kind: FactKind::Hobby,
        pattern: r"(?i)обожаю\s+(?P<value>\w+)".into(),
    }];
    let extractor = FactExtractor::from_config(&rules).unwrap();
    assert_eq!(extractor.rules().len(), 1);
    assert_eq!(
        extractor.find("обожаю шахматы"),
        Some((FactKind::Hobby, "шахматы".to_string()))
    );
    assert_eq!(extractor.find("меня зовут Вася"), None);
}

#[test]
fn blank_capture_falls_through_to_next_rule() {
    let rules = vec![
        FactRule::new(FactKind::Name, r"(?i)имя:(?P<value>\s*)").unwrap(),
        FactRule::new(FactKind::Freeform, r"(?i)факт:\s*(?P<value>.+)").unwrap(),
    ];
    let extractor = FactExtractor::new(rules);
    assert_eq!(
        extractor.find("имя:   факт: люблю чай"),
        Some((FactKind::Freeform, "люблю чай".to_string()))
    );
}

#[tokio::test]
async fn extract_persists_the_fact() {
    let store = Arc::new(MemoryStore::new());
    let extractor = FactExtractor::default();

    let fact = extractor
        .extract(store.as_ref(), "u1", "меня зовут Вася")
        .await
        .expect("fact");
    assert_eq!(fact.kind, FactKind::Name);
    assert_eq!(fact.value, "Вася");

    let stored = store.list_facts("u1").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].value, "Вася");
}

struct BrokenStore;

#[async_trait]
impl FactStore for BrokenStore {
    async fn append_fact(
        &self,
        _user_id: &str,
        _kind: FactKind,
        _value: &str,
        _recorded_at: DateTime<Utc>,
    ) -> Result<Fact, StoreError> {
        Err(StoreError::Corrupt("disk on fire".into()))
    }

    async fn list_facts(&self, _user_id: &str) -> Result<Vec<Fact>, StoreError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn failed_write_is_reported_as_no_match() {
    let extractor = FactExtractor::default();
    let fact = extractor.extract(&BrokenStore, "u1", "меня зовут Вася").await;
    assert!(fact.is_none());
}
