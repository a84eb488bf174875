use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dedkolya::memory::{ContextAssembler, ContextLabels};
use dedkolya::persona::Persona;
use dedkolya::store::{FactStore, InteractionLog, KnowledgeBase, MemoryStore, StoreError};
use dedkolya::types::{Fact, FactKind, Interaction, Knowledge, Mood};

fn assembler(store: &Arc<MemoryStore>) -> ContextAssembler {
    ContextAssembler::new(store.clone(), store.clone(), ContextLabels::default())
        .with_knowledge(store.clone())
}

/// Every read fails as if the rows could not be decoded.
struct UnreadableStore;

#[async_trait]
impl FactStore for UnreadableStore {
    async fn append_fact(
        &self,
        _user_id: &str,
        _kind: FactKind,
        _value: &str,
        _recorded_at: DateTime<Utc>,
    ) -> Result<Fact, StoreError> {
        Err(StoreError::Corrupt("read only".into()))
    }

    async fn list_facts(&self, _user_id: &str) -> Result<Vec<Fact>, StoreError> {
        Err(StoreError::Corrupt("bad kind".into()))
    }
}

#[async_trait]
impl InteractionLog for UnreadableStore {
    async fn append_interaction(
        &self,
        _user_id: &str,
        _user_message: &str,
        _bot_response: &str,
        _mood: Mood,
        _occurred_at: DateTime<Utc>,
    ) -> Result<Interaction, StoreError> {
        Err(StoreError::Corrupt("read only".into()))
    }

    async fn list_recent_interactions(
        &self,
        _user_id: &str,
        _limit: usize,
    ) -> Result<Vec<Interaction>, StoreError> {
        Err(StoreError::Corrupt("bad mood".into()))
    }
}

#[async_trait]
impl KnowledgeBase for UnreadableStore {
    async fn add_knowledge(
        &self,
        _topic: &str,
        _fact: &str,
        _recorded_at: DateTime<Utc>,
    ) -> Result<Knowledge, StoreError> {
        Err(StoreError::Corrupt("read only".into()))
    }

    async fn related_knowledge(
        &self,
        _topic: &str,
        _limit: usize,
    ) -> Result<Vec<Knowledge>, StoreError> {
        Err(StoreError::Corrupt("bad timestamp".into()))
    }
}

#[tokio::test]
async fn empty_user_gets_placeholders() {
    let store = Arc::new(MemoryStore::new());
    let block = assembler(&store).assemble("nobody", 3).await;
    assert_eq!(block.facts, "Ничего не известно");
    assert_eq!(block.history, "История пуста");
    assert_eq!(block.knowledge, "Ничего по теме");
}

#[tokio::test]
async fn only_the_last_turns_are_kept_in_chronological_order() {
    let store = Arc::new(MemoryStore::new());
    let start = Utc::now();
    for i in 0..5 {
        store
            .append_interaction(
                "u",
                &format!("вопрос {i}"),
                &format!("ответ {i}"),
                Mood::Neutral,
                start + Duration::seconds(i),
            )
            .await
            .unwrap();
    }

    let block = assembler(&store).assemble("u", 2).await;
    assert_eq!(
        block.history,
        "User: вопрос 3\nДед Коля: ответ 3\nUser: вопрос 4\nДед Коля: ответ 4"
    );
}

#[tokio::test]
async fn zero_turns_means_no_history() {
    let store = Arc::new(MemoryStore::new());
    store
        .append_interaction("u", "a", "b", Mood::Happy, Utc::now())
        .await
        .unwrap();
    let block = assembler(&store).assemble("u", 0).await;
    assert_eq!(block.history, "История пуста");
}

#[tokio::test]
async fn facts_show_latest_value_per_kind() {
    let store = Arc::new(MemoryStore::new());
    let start = Utc::now();
    store
        .append_fact("u", FactKind::Hobby, "рыбалка", start)
        .await
        .unwrap();
    store
        .append_fact("u", FactKind::Name, "Вася", start + Duration::seconds(1))
        .await
        .unwrap();
    store
        .append_fact("u", FactKind::Name, "Василий", start + Duration::seconds(2))
        .await
        .unwrap();

    let block = assembler(&store).assemble("u", 3).await;
    assert_eq!(block.facts, "- имя: Василий\n- хобби: рыбалка");
}

#[tokio::test]
async fn system_prompt_embeds_mood_facts_and_history() {
    let store = Arc::new(MemoryStore::new());
    store
        .append_fact("u", FactKind::City, "Тверь", Utc::now())
        .await
        .unwrap();
    store
        .append_interaction("u", "как трактор?", "Заводится!", Mood::Drunk, Utc::now())
        .await
        .unwrap();

    let persona = Persona::default();
    let block = assembler(&store).assemble("u", 3).await;
    let prompt = persona.system_prompt(Mood::Angry, &block);

    assert!(prompt.contains("Текущее настроение: angry"));
    assert!(prompt.contains("- город: Тверь"));
    assert!(prompt.contains("User: как трактор?\nДед Коля: Заводится!"));
    assert!(!prompt.contains("{context}"));
}

#[tokio::test]
async fn unreadable_stores_degrade_to_placeholders() {
    let store = Arc::new(UnreadableStore);
    let assembler = ContextAssembler::new(store.clone(), store.clone(), ContextLabels::default())
        .with_knowledge(store);

    let block = assembler.assemble_turn("u", "расскажи про трактор", 3).await;
    assert_eq!(block.facts, "Ничего не известно");
    assert_eq!(block.history, "История пуста");
    assert_eq!(block.knowledge, "Ничего по теме");
}

#[tokio::test]
async fn turn_words_pull_related_notes() {
    let store = Arc::new(MemoryStore::new());
    let start = Utc::now();
    store
        .add_knowledge("Трактор", "Т-25 ездит на солярке", start)
        .await
        .unwrap();
    store
        .add_knowledge("рыбалка", "Клюёт на рассвете", start + Duration::seconds(1))
        .await
        .unwrap();

    let block = assembler(&store)
        .assemble_turn("u", "Расскажи про трактор", 3)
        .await;
    assert_eq!(block.knowledge, "- Трактор: Т-25 ездит на солярке");

    let unrelated = assembler(&store).assemble_turn("u", "как погода", 3).await;
    assert_eq!(unrelated.knowledge, "Ничего по теме");
}

#[tokio::test]
async fn related_notes_are_capped_at_three() {
    let store = Arc::new(MemoryStore::new());
    let start = Utc::now();
    for i in 0..5 {
        store
            .add_knowledge("трактор", &format!("заметка {i}"), start + Duration::seconds(i))
            .await
            .unwrap();
    }

    let block = assembler(&store)
        .assemble_turn("u", "трактор трактора", 3)
        .await;
    assert_eq!(
        block.knowledge,
        "- трактор: заметка 4\n- трактор: заметка 3\n- трактор: заметка 2"
    );
}
