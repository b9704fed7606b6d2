//! Credential resolution: per-user stored keys first, environment defaults
//! second. The core never writes credentials; each request reads an
//! idempotent snapshot.

pub mod store;

pub use store::{KeyStore, StoredCredentials};

use crate::types::ProviderKind;
use std::sync::Arc;

/// The credential material a request is dispatched with.
#[derive(Debug, Clone)]
pub struct ResolvedCredential {
    pub api_key: String,
    pub base_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// No key found anywhere for the provider. User-actionable, never retried.
    #[error("no API key configured for provider {0}")]
    Missing(ProviderKind),

    #[error("credential store error: {0}")]
    Store(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct CredentialResolver {
    store: KeyStore,
    env: Arc<dyn Fn(&str) -> Option<String> + Send + Sync>,
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl CredentialResolver {
    pub fn new(store: KeyStore) -> Self {
        Self::with_env_source(store, |name| std::env::var(name).ok())
    }

    /// Replace the process-environment lookup. Lets tests resolve against a
    /// pinned environment instead of whatever the host exports.
    pub fn with_env_source<F>(store: KeyStore, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            store,
            env: Arc::new(env),
        }
    }

    fn env_value(&self, name: &str) -> Option<String> {
        (self.env)(name).and_then(non_empty)
    }

    /// Resolve the API key and base URL for a provider. Key precedence:
    /// stored user key, then environment default; first non-empty wins.
    /// Base URL: stored override, env override (OpenAI-compatible providers
    /// only), then the hardcoded provider default.
    pub fn resolve(&self, provider: ProviderKind) -> Result<ResolvedCredential, CredentialError> {
        let api_key = self
            .store
            .get_key(provider)?
            .and_then(non_empty)
            .or_else(|| self.env_value(provider.api_key_env()))
            .ok_or(CredentialError::Missing(provider))?;

        let base_url = self
            .store
            .get_base_url(provider)?
            .and_then(non_empty)
            .or_else(|| provider.base_url_env().and_then(|name| self.env_value(name)))
            .unwrap_or_else(|| provider.default_base_url().to_string());

        Ok(ResolvedCredential {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    // Every test pins its environment through with_env_source; nothing here
    // reads or mutates the real process environment.

    fn resolver_with_env(
        env: &[(&str, &str)],
    ) -> (tempfile::TempDir, KeyStore, CredentialResolver) {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::new(dir.path().join("config.json"));
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let resolver =
            CredentialResolver::with_env_source(store.clone(), move |name| env.get(name).cloned());
        (dir, store, resolver)
    }

    #[test]
    fn stored_key_wins_over_environment() {
        let (_dir, store, resolver) = resolver_with_env(&[("MOONSHOT_API_KEY", "env-key")]);
        store.set_key(ProviderKind::Moonshot, "stored-key").unwrap();

        let cred = resolver.resolve(ProviderKind::Moonshot).unwrap();
        assert_eq!(cred.api_key, "stored-key");
    }

    #[test]
    fn falls_back_to_environment_key() {
        let (_dir, _store, resolver) = resolver_with_env(&[("XAI_API_KEY", "xai-env")]);

        let cred = resolver.resolve(ProviderKind::XAi).unwrap();
        assert_eq!(cred.api_key, "xai-env");
        assert_eq!(cred.base_url, "https://api.x.ai/v1");
    }

    #[test]
    fn missing_everywhere_is_an_error() {
        let (_dir, _store, resolver) = resolver_with_env(&[]);
        let err = resolver.resolve(ProviderKind::Anthropic).unwrap_err();
        assert!(matches!(err, CredentialError::Missing(ProviderKind::Anthropic)));
    }

    #[test]
    fn env_base_url_override_for_compatible_providers_only() {
        let (_dir, _store, resolver) = resolver_with_env(&[
            ("OPENAI_API_KEY", "sk-x"),
            ("OPENAI_BASE_URL", "https://relay.example/v1/"),
            ("GEMINI_API_KEY", "AIza-x"),
        ]);

        let cred = resolver.resolve(ProviderKind::OpenAi).unwrap();
        assert_eq!(cred.base_url, "https://relay.example/v1");

        // Google has no base-URL env override; the default always applies.
        let cred = resolver.resolve(ProviderKind::Google).unwrap();
        assert_eq!(cred.base_url, "https://generativelanguage.googleapis.com/v1beta");
    }

    #[test]
    fn stored_base_url_overrides_environment_and_default() {
        let (_dir, store, resolver) = resolver_with_env(&[
            ("OPENAI_API_KEY", "sk-x"),
            ("OPENAI_BASE_URL", "https://relay.example/v1"),
        ]);
        store
            .set_base_url(ProviderKind::OpenAi, Some("https://gateway.example/v1"))
            .unwrap();

        let cred = resolver.resolve(ProviderKind::OpenAi).unwrap();
        assert_eq!(cred.base_url, "https://gateway.example/v1");
    }
}
