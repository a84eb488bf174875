use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Per-turn affect label. The current mood of a user is the mood of their
/// most recent interaction, `Neutral` if there is none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    #[default]
    Neutral,
    Happy,
    Angry,
    Sarcastic,
    Drunk,
}

impl Mood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Neutral => "neutral",
            Mood::Happy => "happy",
            Mood::Angry => "angry",
            Mood::Sarcastic => "sarcastic",
            Mood::Drunk => "drunk",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "neutral" => Ok(Mood::Neutral),
            "happy" => Ok(Mood::Happy),
            "angry" => Ok(Mood::Angry),
            "sarcastic" => Ok(Mood::Sarcastic),
            "drunk" => Ok(Mood::Drunk),
            other => Err(format!("unknown mood: {other}")),
        }
    }
}

/// What a fact says about the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactKind {
    Name,
    City,
    Age,
    Job,
    Hobby,
    Freeform,
}

impl FactKind {
    /// Canonical order used when listing facts in a prompt.
    pub const ALL: [FactKind; 6] = [
        FactKind::Name,
        FactKind::City,
        FactKind::Age,
        FactKind::Job,
        FactKind::Hobby,
        FactKind::Freeform,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FactKind::Name => "name",
            FactKind::City => "city",
            FactKind::Age => "age",
            FactKind::Job => "job",
            FactKind::Hobby => "hobby",
            FactKind::Freeform => "freeform",
        }
    }

    /// Label the persona uses when talking about this kind of fact.
    pub fn label(&self) -> &'static str {
        match self {
            FactKind::Name => "имя",
            FactKind::City => "город",
            FactKind::Age => "возраст",
            FactKind::Job => "работа",
            FactKind::Hobby => "хобби",
            FactKind::Freeform => "факт",
        }
    }
}

impl fmt::Display for FactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(FactKind::Name),
            "city" => Ok(FactKind::City),
            "age" => Ok(FactKind::Age),
            "job" => Ok(FactKind::Job),
            "hobby" => Ok(FactKind::Hobby),
            "freeform" => Ok(FactKind::Freeform),
            other => Err(format!("unknown fact kind: {other}")),
        }
    }
}

/// A user-attributed observation. Facts are append-only; consumers take the
/// most recent value per kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub user_id: String,
    pub kind: FactKind,
    pub value: String,
    pub recorded_at: DateTime<Utc>,
}

/// One completed turn of dialogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: String,
    pub occurred_at: DateTime<Utc>,
    pub user_message: String,
    pub bot_response: String,
    pub mood: Mood,
}

/// A general note taught to the persona under a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Knowledge {
    pub topic: String,
    pub fact: String,
    pub recorded_at: DateTime<Utc>,
}

/// How a reply was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    LearnedFact,
    Generated,
    Fallback,
}

impl fmt::Display for ReplySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReplySource::LearnedFact => "learned_fact",
            ReplySource::Generated => "generated",
            ReplySource::Fallback => "fallback",
        };
        f.write_str(s)
    }
}

/// Outcome of a single turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub reply: String,
    pub mood: Mood,
    pub source: ReplySource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
}

impl Reply {
    pub fn learned(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            mood: Mood::Neutral,
            source: ReplySource::LearnedFact,
            model_used: None,
        }
    }

    pub fn generated(reply: impl Into<String>, mood: Mood, model: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            mood,
            source: ReplySource::Generated,
            model_used: Some(model.into()),
        }
    }

    pub fn fallback(reply: impl Into<String>, mood: Mood) -> Self {
        Self {
            reply: reply.into(),
            mood,
            source: ReplySource::Fallback,
            model_used: None,
        }
    }
}
