pub mod fallback;
pub mod mood;
pub mod preamble;

use crate::config::PersonaConfig;
use crate::memory::{ContextBlock, ContextLabels};
use crate::types::{Fact, Mood};

pub use fallback::FallbackPicker;
pub use mood::MoodEngine;
pub use preamble::PreambleSource;

/// Everything that makes the bot sound like itself: preamble, trigger words,
/// acknowledgement template and fallback lines.
#[derive(Debug)]
pub struct Persona {
    name: String,
    preamble: PreambleSource,
    ack_template: String,
    labels: ContextLabels,
    mood: MoodEngine,
    fallback: FallbackPicker,
}

impl Default for Persona {
    fn default() -> Self {
        let config = PersonaConfig::default();
        let preamble = PreambleSource::Inline(config.preamble.clone());
        Self::build(&config, preamble, 0)
    }
}

impl Persona {
    pub fn from_config(config: &PersonaConfig, fallback_seed: u64) -> anyhow::Result<Self> {
        let preamble = match config.preamble_path.as_deref() {
            Some(path) => PreambleSource::file(path)?,
            None => PreambleSource::Inline(config.preamble.clone()),
        };

        Ok(Self::build(config, preamble, fallback_seed))
    }

    fn build(config: &PersonaConfig, preamble: PreambleSource, fallback_seed: u64) -> Self {
        Self {
            name: config.name.clone(),
            preamble,
            ack_template: config.ack_template.clone(),
            labels: ContextLabels {
                speaker: config.name.clone(),
                no_facts: config.no_facts.clone(),
                no_history: config.no_history.clone(),
                no_knowledge: config.no_knowledge.clone(),
            },
            mood: MoodEngine::new(&config.happy_keywords, &config.angry_keywords),
            fallback: FallbackPicker::new(config.fallback_replies.clone(), fallback_seed),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn labels(&self) -> &ContextLabels {
        &self.labels
    }

    pub fn mood_engine(&self) -> &MoodEngine {
        &self.mood
    }

    pub fn fallback(&self) -> &FallbackPicker {
        &self.fallback
    }

    /// Reply confirming a fact that was just learned.
    pub fn acknowledge(&self, fact: &Fact) -> String {
        render_template(
            &self.ack_template,
            &[("kind", fact.kind.label()), ("value", &fact.value)],
        )
    }

    /// Preamble with mood, facts, topic notes and history filled in.
    pub fn system_prompt(&self, mood: Mood, context: &ContextBlock) -> String {
        render_template(
            &self.preamble.template(),
            &[
                ("mood", mood.as_str()),
                ("user_facts", &context.facts),
                ("knowledge", &context.knowledge),
                ("context", &context.history),
            ],
        )
    }
}

/// Single-pass `{name}` substitution. Unknown placeholders are left as-is and
/// substituted values are never re-scanned.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let key = &after[..close];
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, close))
        });

        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_template_substitutes_known_keys_once() {
        let out = render_template(
            "{a} and {b} and {unknown}",
            &[("a", "{b}"), ("b", "two")],
        );
        assert_eq!(out, "{b} and two and {unknown}");
    }

    #[test]
    fn render_template_handles_unbalanced_braces() {
        assert_eq!(render_template("x { y", &[("y", "z")]), "x { y");
        assert_eq!(render_template("}{", &[]), "}{");
    }
}
