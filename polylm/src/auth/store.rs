//! On-disk key-value store for per-user provider keys and base-URL overrides.
//! Written by the settings surface; this crate only reads it at the start of
//! each request. Saves are atomic (temp file + rename) under an exclusive
//! sibling lock file.

use crate::types::ProviderKind;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// The stored file shape: provider id -> API key, provider id -> base URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredCredentials {
    #[serde(default)]
    pub keys: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub base_urls: HashMap<String, String>,
}

#[derive(Clone)]
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location: ~/.polylm/config.json
    pub fn default_path() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(home.join(".polylm").join("config.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        // Sibling lock file; locking the config file itself would race the
        // atomic rename in save().
        self.path.with_extension("json.lock")
    }

    fn with_exclusive_lock<T>(&self, f: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = fs::set_permissions(parent, fs::Permissions::from_mode(0o700));
            }
        }

        let lock_file = fs::OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(self.lock_path())?;

        lock_file.lock_exclusive()?;
        let out = f();
        let _ = FileExt::unlock(&lock_file);
        out
    }

    fn load_unlocked(&self) -> anyhow::Result<StoredCredentials> {
        if !self.path.exists() {
            return Ok(StoredCredentials::default());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save_unlocked(&self, creds: &StoredCredentials) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(creds)?;
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600));
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Load the stored credentials; missing file reads as empty.
    pub fn load(&self) -> anyhow::Result<StoredCredentials> {
        self.with_exclusive_lock(|| self.load_unlocked())
    }

    pub fn save(&self, creds: &StoredCredentials) -> anyhow::Result<()> {
        self.with_exclusive_lock(|| self.save_unlocked(creds))
    }

    pub fn get_key(&self, provider: ProviderKind) -> anyhow::Result<Option<String>> {
        Ok(self.load()?.keys.get(provider.as_str()).cloned())
    }

    /// Store a key for a provider. An empty (after trim) key removes the entry.
    pub fn set_key(&self, provider: ProviderKind, key: &str) -> anyhow::Result<()> {
        self.with_exclusive_lock(|| {
            let mut creds = self.load_unlocked()?;
            let key = key.trim();
            if key.is_empty() {
                creds.keys.remove(provider.as_str());
            } else {
                creds.keys.insert(provider.as_str().to_string(), key.to_string());
            }
            self.save_unlocked(&creds)
        })
    }

    pub fn remove_key(&self, provider: ProviderKind) -> anyhow::Result<()> {
        self.with_exclusive_lock(|| {
            let mut creds = self.load_unlocked()?;
            creds.keys.remove(provider.as_str());
            self.save_unlocked(&creds)
        })
    }

    pub fn get_base_url(&self, provider: ProviderKind) -> anyhow::Result<Option<String>> {
        Ok(self.load()?.base_urls.get(provider.as_str()).cloned())
    }

    pub fn set_base_url(&self, provider: ProviderKind, url: Option<&str>) -> anyhow::Result<()> {
        self.with_exclusive_lock(|| {
            let mut creds = self.load_unlocked()?;
            match url.map(str::trim) {
                Some(u) if !u.is_empty() => {
                    creds
                        .base_urls
                        .insert(provider.as_str().to_string(), u.trim_end_matches('/').to_string());
                }
                _ => {
                    creds.base_urls.remove(provider.as_str());
                }
            }
            self.save_unlocked(&creds)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_store() -> (tempfile::TempDir, KeyStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        (dir, KeyStore::new(path))
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let (_dir, store) = tmp_store();
        let creds = store.load().unwrap();
        assert!(creds.keys.is_empty());
        assert!(creds.base_urls.is_empty());
    }

    #[test]
    fn set_and_get_key_round_trip() {
        let (_dir, store) = tmp_store();
        store.set_key(ProviderKind::OpenAi, "sk-test-123").unwrap();
        assert_eq!(
            store.get_key(ProviderKind::OpenAi).unwrap().as_deref(),
            Some("sk-test-123")
        );
        assert_eq!(store.get_key(ProviderKind::Google).unwrap(), None);
    }

    #[test]
    fn empty_key_removes_entry() {
        let (_dir, store) = tmp_store();
        store.set_key(ProviderKind::XAi, "xai-abc").unwrap();
        store.set_key(ProviderKind::XAi, "   ").unwrap();
        assert_eq!(store.get_key(ProviderKind::XAi).unwrap(), None);
    }

    #[test]
    fn base_url_is_trimmed_and_removable() {
        let (_dir, store) = tmp_store();
        store
            .set_base_url(ProviderKind::Moonshot, Some("https://proxy.example/v1/"))
            .unwrap();
        assert_eq!(
            store.get_base_url(ProviderKind::Moonshot).unwrap().as_deref(),
            Some("https://proxy.example/v1")
        );
        store.set_base_url(ProviderKind::Moonshot, None).unwrap();
        assert_eq!(store.get_base_url(ProviderKind::Moonshot).unwrap(), None);
    }
}
