pub mod extractor;

use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::store::{FactStore, InteractionLog, KnowledgeBase};
use crate::types::{Fact, FactKind, Knowledge};

pub use extractor::{FactExtractor, FactRule};

/// Fixed strings the assembler writes into the context block.
#[derive(Debug, Clone)]
pub struct ContextLabels {
    /// Name used for the persona's lines in the history section.
    pub speaker: String,
    pub no_facts: String,
    pub no_history: String,
    pub no_knowledge: String,
}

impl Default for ContextLabels {
    fn default() -> Self {
        Self {
            speaker: "Дед Коля".into(),
            no_facts: "Ничего не известно".into(),
            no_history: "История пуста".into(),
            no_knowledge: "Ничего по теме".into(),
        }
    }
}

/// Facts, topic notes and recent dialogue for one user, ready to drop into
/// the preamble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBlock {
    pub facts: String,
    pub knowledge: String,
    pub history: String,
}

/// Notes pulled into a single turn.
const KNOWLEDGE_LIMIT: usize = 3;

/// Minimum word length, in chars, looked up as a topic.
const MIN_TOPIC_WORD: usize = 4;

/// Builds the context block from the fact store, the interaction log and,
/// when attached, the knowledge base.
///
/// Layout:
/// 1. Facts section: `- label: value`, latest value per kind, canonical kind order
/// 2. Knowledge section: `- topic: fact` for notes whose topic contains a
///    word of the turn, at most three
/// 3. History section: the last `max_turns` turns in chronological order
///
/// Older turns are dropped, never summarised. Read failures degrade to the
/// placeholders.
pub struct ContextAssembler {
    facts: Arc<dyn FactStore>,
    log: Arc<dyn InteractionLog>,
    knowledge: Option<Arc<dyn KnowledgeBase>>,
    labels: ContextLabels,
}

impl ContextAssembler {
    pub fn new(
        facts: Arc<dyn FactStore>,
        log: Arc<dyn InteractionLog>,
        labels: ContextLabels,
    ) -> Self {
        Self {
            facts,
            log,
            knowledge: None,
            labels,
        }
    }

    /// Also look up topic notes for each turn.
    pub fn with_knowledge(mut self, knowledge: Arc<dyn KnowledgeBase>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    pub async fn assemble(&self, user_id: &str, max_turns: usize) -> ContextBlock {
        let facts = match self.facts.list_facts(user_id).await {
            Ok(facts) => facts,
            Err(e) => {
                warn!(user_id, "failed to read facts, continuing without: {e}");
                Vec::new()
            }
        };

        let history = if max_turns == 0 {
            Vec::new()
        } else {
            match self.log.list_recent_interactions(user_id, max_turns).await {
                Ok(history) => history,
                Err(e) => {
                    warn!(user_id, "failed to read history, continuing without: {e}");
                    Vec::new()
                }
            }
        };

        let facts_text = render_facts(&facts).unwrap_or_else(|| self.labels.no_facts.clone());

        let history_text = if history.is_empty() {
            self.labels.no_history.clone()
        } else {
            // Stored newest first; the prompt reads oldest first.
            history
                .iter()
                .rev()
                .flat_map(|turn| {
                    [
                        format!("User: {}", turn.user_message),
                        format!("{}: {}", self.labels.speaker, turn.bot_response),
                    ]
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        ContextBlock {
            facts: facts_text,
            knowledge: self.labels.no_knowledge.clone(),
            history: history_text,
        }
    }

    /// [`ContextAssembler::assemble`] plus the notes related to `text`.
    pub async fn assemble_turn(
        &self,
        user_id: &str,
        text: &str,
        max_turns: usize,
    ) -> ContextBlock {
        let mut block = self.assemble(user_id, max_turns).await;
        let notes = self.related_notes(text).await;
        if !notes.is_empty() {
            block.knowledge = render_knowledge(&notes);
        }
        block
    }

    async fn related_notes(&self, text: &str) -> Vec<Knowledge> {
        let Some(knowledge) = &self.knowledge else {
            return Vec::new();
        };

        let mut notes: Vec<Knowledge> = Vec::new();
        for word in topic_words(text) {
            if notes.len() >= KNOWLEDGE_LIMIT {
                break;
            }
            match knowledge.related_knowledge(&word, KNOWLEDGE_LIMIT).await {
                Ok(found) => {
                    for note in found {
                        let seen = notes
                            .iter()
                            .any(|n| n.topic == note.topic && n.fact == note.fact);
                        if !seen && notes.len() < KNOWLEDGE_LIMIT {
                            notes.push(note);
                        }
                    }
                }
                Err(e) => {
                    warn!(word = %word, "failed to read knowledge, continuing without: {e}");
                    return Vec::new();
                }
            }
        }
        notes
    }
}

/// Distinct lowercase words of the turn long enough to name a topic.
fn topic_words(text: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    for word in text.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
        if word.chars().count() >= MIN_TOPIC_WORD && !words.iter().any(|w| w == word) {
            words.push(word.to_string());
        }
    }
    words
}

fn render_knowledge(notes: &[Knowledge]) -> String {
    notes
        .iter()
        .map(|note| format!("- {}: {}", note.topic, note.fact))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Latest value per kind, one line each. `None` when there are no facts.
fn render_facts(facts: &[Fact]) -> Option<String> {
    let mut latest: HashMap<FactKind, &Fact> = HashMap::new();
    for fact in facts {
        match latest.get(&fact.kind) {
            Some(seen) if seen.recorded_at > fact.recorded_at => {}
            _ => {
                latest.insert(fact.kind, fact);
            }
        }
    }

    if latest.is_empty() {
        return None;
    }

    let lines: Vec<String> = FactKind::ALL
        .iter()
        .filter_map(|kind| latest.get(kind))
        .map(|fact| format!("- {}: {}", fact.kind.label(), fact.value))
        .collect();
    Some(lines.join("\n"))
}
