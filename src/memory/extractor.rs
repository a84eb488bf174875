use chrono::Utc;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::FactRuleConfig;
use crate::store::FactStore;
use crate::types::{Fact, FactKind};

/// Default rules, highest priority first. Each pattern exposes the learned
/// value as the `value` capture group.
const DEFAULT_RULES: [(FactKind, &str); 5] = [
    (
        FactKind::Name,
        r"(?i)\b(?:меня зовут|мо[её] имя|зовут меня)\s+(?P<value>[а-яё]+)",
    ),
    (
        FactKind::City,
        r"(?i)\b(?:я из|живу в|город)\s+(?P<value>[а-яё\s]+)",
    ),
    (
        FactKind::Age,
        r"(?i)\b(?:мне|исполнилось|возраст)\s+(?P<value>\d{1,2})\s+(?:года|лет)",
    ),
    (
        FactKind::Job,
        r"(?i)\b(?:я работаю|моя работа|профессия)\s+(?P<value>[а-яё\s]+)",
    ),
    (
        FactKind::Hobby,
        r"(?i)\b(?:мои хобби|увлекаюсь|люблю)\s+(?P<value>[а-яё\s,]+)",
    ),
];

/// One `(kind, matcher)` pair.
#[derive(Debug, Clone)]
pub struct FactRule {
    pub kind: FactKind,
    pattern: Regex,
}

impl FactRule {
    /// Compile a rule. The pattern must define a `value` capture group.
    pub fn new(kind: FactKind, pattern: &str) -> anyhow::Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| anyhow::anyhow!("invalid pattern for {kind} rule: {e}"))?;
        if !pattern.capture_names().any(|name| name == Some("value")) {
            anyhow::bail!("pattern for {kind} rule has no `value` capture group");
        }
        Ok(Self { kind, pattern })
    }

    /// Trimmed capture, or `None` when the rule does not match or the
    /// capture is blank.
    fn capture(&self, text: &str) -> Option<String> {
        let caps = self.pattern.captures(text)?;
        let value = caps.name("value")?.as_str().trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }
}

/// Recognises self-disclosures in user text. Rules are evaluated top-down and
/// the first one that matches wins.
#[derive(Debug, Clone)]
pub struct FactExtractor {
    rules: Vec<FactRule>,
}

impl Default for FactExtractor {
    fn default() -> Self {
        let rules = DEFAULT_RULES
            .iter()
            .map(|(kind, pattern)| FactRule {
                kind: *kind,
                pattern: Regex::new(pattern).expect("built-in fact pattern"),
            })
            .collect();
        Self { rules }
    }
}

impl FactExtractor {
    pub fn new(rules: Vec<FactRule>) -> Self {
        Self { rules }
    }

    /// Build from configured rules; an empty list means the built-in rules.
    pub fn from_config(rules: &[FactRuleConfig]) -> anyhow::Result<Self> {
        if rules.is_empty() {
            return Ok(Self::default());
        }
        let rules = rules
            .iter()
            .map(|r| FactRule::new(r.kind, &r.pattern))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[FactRule] {
        &self.rules
    }

    /// Find the first fact in `text` without persisting it.
    pub fn find(&self, text: &str) -> Option<(FactKind, String)> {
        self.rules
            .iter()
            .find_map(|rule| rule.capture(text).map(|value| (rule.kind, value)))
    }

    /// Find the first fact in `text` and append it to the store.
    ///
    /// A failed write is logged and reported as no match, so the turn falls
    /// through to generation instead of acknowledging an unsaved fact.
    pub async fn extract(&self, store: &dyn FactStore, user_id: &str, text: &str) -> Option<Fact> {
        let (kind, value) = self.find(text)?;
        debug!(user_id, kind = %kind, value = %value, "fact recognised");

        match store.append_fact(user_id, kind, &value, Utc::now()).await {
            Ok(fact) => Some(fact),
            Err(e) => {
                warn!(user_id, kind = %kind, "failed to store fact: {e}");
                None
            }
        }
    }
}
