use crate::config::{PROVIDERS, state_dir};
use crate::fs_util::{ensure_private_dir, restrict_file};
use std::path::{Path, PathBuf};

fn credentials_dir_for(state_dir: &Path) -> PathBuf {
    state_dir.join("credentials")
}

fn normalize_provider(provider: &str) -> anyhow::Result<String> {
    let provider = provider.trim().to_ascii_lowercase();
    if PROVIDERS.contains(&provider.as_str()) {
        Ok(provider)
    } else {
        anyhow::bail!("unsupported provider for key store: {provider}")
    }
}

fn key_file_path_for(state_dir: &Path, provider: &str) -> anyhow::Result<PathBuf> {
    let provider = normalize_provider(provider)?;
    Ok(credentials_dir_for(state_dir).join(format!("{provider}.key")))
}

pub fn write_key_to(state_dir: &Path, provider: &str, api_key: &str) -> anyhow::Result<PathBuf> {
    let api_key = api_key.trim();
    if api_key.is_empty() {
        anyhow::bail!("API key cannot be empty");
    }

    let path = key_file_path_for(state_dir, provider)?;
    ensure_private_dir(&credentials_dir_for(state_dir))?;
    std::fs::write(&path, api_key)
        .map_err(|e| anyhow::anyhow!("failed to write {}: {e}", path.display()))?;
    restrict_file(&path)?;
    Ok(path)
}

pub fn read_key_from(state_dir: &Path, provider: &str) -> Option<String> {
    let path = key_file_path_for(state_dir, provider).ok()?;
    let value = std::fs::read_to_string(path).ok()?;
    Some(value.trim().to_string()).filter(|v| !v.is_empty())
}

/// Store a provider API key in ~/.dedkolya/credentials/{provider}.key.
pub fn store_api_key(provider: &str, api_key: &str) -> anyhow::Result<PathBuf> {
    write_key_to(&state_dir(), provider, api_key)
}

/// Load a provider API key from ~/.dedkolya/credentials/{provider}.key.
pub fn load_api_key(provider: &str) -> Option<String> {
    read_key_from(&state_dir(), provider)
}

#[cfg(test)]
mod tests {
    use super::{read_key_from, write_key_to};

    #[test]
    fn writes_and_reads_provider_key() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = write_key_to(dir.path(), "openrouter", "sk-or-test\n").expect("write key");
        assert!(path.ends_with("credentials/openrouter.key"));
        let loaded = read_key_from(dir.path(), "OpenRouter");
        assert_eq!(loaded.as_deref(), Some("sk-or-test"));
    }

    #[cfg(unix)]
    #[test]
    fn key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("temp dir");
        let path = write_key_to(dir.path(), "ai21", "ai21-key").expect("write key");
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn blank_key_is_rejected_and_missing_key_reads_none() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = write_key_to(dir.path(), "ai21", "   ").expect_err("should fail");
        assert!(err.to_string().contains("cannot be empty"));
        assert!(read_key_from(dir.path(), "ai21").is_none());
    }

    #[test]
    fn rejects_unknown_provider() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = write_key_to(dir.path(), "bad/../../provider", "x").expect_err("should fail");
        assert!(err.to_string().contains("unsupported provider"));
    }
}
