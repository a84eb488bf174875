use sha2::{Digest, Sha256};

/// In-character lines used when no candidate model answers.
///
/// Selection is a pure function of the seed and the turn's input, so the same
/// failing turn always gets the same line.
#[derive(Debug, Clone)]
pub struct FallbackPicker {
    lines: Vec<String>,
    seed: u64,
}

impl FallbackPicker {
    /// Blank lines are dropped; an empty pool falls back to a single stock line.
    pub fn new(lines: Vec<String>, seed: u64) -> Self {
        let mut lines: Vec<String> = lines
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        if lines.is_empty() {
            lines.push("Курва, сервера тупят! Давай позже.".to_string());
        }
        Self { lines, seed }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn pick(&self, user_id: &str, text: &str) -> &str {
        let mut hasher = Sha256::new();
        hasher.update(self.seed.to_le_bytes());
        hasher.update(user_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        let digest = hasher.finalize();

        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let index = u64::from_le_bytes(head) % self.lines.len() as u64;
        &self.lines[index as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pool_still_has_a_line() {
        let picker = FallbackPicker::new(vec!["  ".into()], 0);
        assert_eq!(picker.lines().len(), 1);
        assert!(!picker.pick("u", "t").is_empty());
    }

    #[test]
    fn selection_spreads_across_the_pool() {
        let lines: Vec<String> = (0..4).map(|i| format!("line {i}")).collect();
        let picker = FallbackPicker::new(lines, 7);
        let picked: std::collections::HashSet<&str> = (0..200)
            .map(|i| picker.pick("user", &format!("message {i}")))
            .collect();
        assert!(picked.len() > 1, "200 inputs should not all map to one line");
    }
}
