use rand::Rng;

use crate::types::Mood;

/// Moods drawn when no trigger word is present.
const UNTRIGGERED: [Mood; 3] = [Mood::Neutral, Mood::Sarcastic, Mood::Drunk];

/// Derives the mood of a turn from trigger words in the user's text.
///
/// Happy keywords are checked before angry ones, so a message containing both
/// resolves to `Happy`. Without a trigger the mood is drawn uniformly from
/// neutral/sarcastic/drunk using the caller's random source.
#[derive(Debug, Clone)]
pub struct MoodEngine {
    happy: Vec<String>,
    angry: Vec<String>,
}

impl MoodEngine {
    pub fn new<S: AsRef<str>>(happy: &[S], angry: &[S]) -> Self {
        Self {
            happy: normalize(happy),
            angry: normalize(angry),
        }
    }

    pub fn determine<R: Rng + ?Sized>(&self, text: &str, rng: &mut R) -> Mood {
        let lower = text.to_lowercase();
        if self.happy.iter().any(|k| lower.contains(k.as_str())) {
            Mood::Happy
        } else if self.angry.iter().any(|k| lower.contains(k.as_str())) {
            Mood::Angry
        } else {
            UNTRIGGERED[rng.gen_range(0..UNTRIGGERED.len())]
        }
    }
}

fn normalize<S: AsRef<str>>(keywords: &[S]) -> Vec<String> {
    keywords
        .iter()
        .map(|k| k.as_ref().trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}
