use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use tracing::{info, warn};

/// A preamble template read from disk.
#[derive(Debug, Clone)]
pub struct PreambleFile {
    pub content: String,
    pub loaded_from: String,
    file_mtime: Option<SystemTime>,
}

impl PreambleFile {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read preamble file {path}: {e}"))?;
        if content.trim().is_empty() {
            anyhow::bail!("preamble file {path} is empty");
        }

        let file_mtime = modified(path);
        info!(path, bytes = content.len(), "loaded persona preamble");

        Ok(Self {
            content,
            loaded_from: path.to_string(),
            file_mtime,
        })
    }

    /// Re-read the file if its mtime moved forward. A failed reload keeps the
    /// previous content.
    fn refresh(&mut self) {
        let current = modified(&self.loaded_from);
        let changed = matches!((self.file_mtime, current), (Some(old), Some(new)) if new > old);
        if !changed {
            return;
        }

        match Self::load(&self.loaded_from) {
            Ok(fresh) => {
                info!(path = %self.loaded_from, "hot-reloaded persona preamble");
                *self = fresh;
            }
            Err(e) => {
                warn!(path = %self.loaded_from, "keeping previous preamble: {e}");
                self.file_mtime = current;
            }
        }
    }
}

fn modified(path: &str) -> Option<SystemTime> {
    Path::new(path).metadata().ok().and_then(|m| m.modified().ok())
}

/// Where the preamble template comes from.
#[derive(Debug)]
pub enum PreambleSource {
    Inline(String),
    File(Mutex<PreambleFile>),
}

impl PreambleSource {
    pub fn file(path: &str) -> anyhow::Result<Self> {
        Ok(Self::File(Mutex::new(PreambleFile::load(path)?)))
    }

    /// Current template text, reloading a file-backed preamble if it changed.
    pub fn template(&self) -> String {
        match self {
            PreambleSource::Inline(text) => text.clone(),
            PreambleSource::File(file) => {
                let mut file = file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                file.refresh();
                file.content.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preamble.txt");
        std::fs::write(&path, "  \n").unwrap();
        let err = PreambleSource::file(path.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("is empty"));
    }

    #[test]
    fn file_content_is_served() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preamble.txt");
        std::fs::write(&path, "Ты дед. {mood}").unwrap();
        let source = PreambleSource::file(path.to_str().unwrap()).unwrap();
        assert_eq!(source.template(), "Ты дед. {mood}");
    }
}
