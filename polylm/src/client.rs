//! The entry point: one call takes a query plus its conversational context
//! and returns the aggregated response, streaming progress through a callback.

use crate::aggregate;
use crate::auth::{CredentialError, CredentialResolver, KeyStore};
use crate::prompt;
use crate::providers::anthropic::AnthropicProvider;
use crate::providers::google::GoogleProvider;
use crate::providers::openai::OpenAiCompatibleProvider;
use crate::providers::{Provider, ProviderError, ProviderRequest};
use crate::types::{
    Attachment, ConversationTurn, FocusMode, ModelDescriptor, ProviderKind, RequestOptions,
    SearchResponse, UserProfile,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The wall-clock cap elapsed before the stream completed. Partial text
    /// already delivered through the progress callback stays with the caller.
    #[error("inference timed out after {0:?}")]
    Timeout(Duration),
}

pub struct InferenceClientBuilder {
    store: Option<KeyStore>,
    resolver: Option<CredentialResolver>,
    options: RequestOptions,
}

impl InferenceClientBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            resolver: None,
            options: RequestOptions::default(),
        }
    }

    /// Use a specific key store instead of the default location.
    pub fn key_store(mut self, store: KeyStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Use a fully constructed resolver, e.g. one with a pinned environment
    /// source. Takes precedence over `key_store`.
    pub fn credential_resolver(mut self, resolver: CredentialResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> InferenceClient {
        let resolver = self.resolver.unwrap_or_else(|| {
            CredentialResolver::new(self.store.unwrap_or_else(KeyStore::default_path))
        });

        let mut providers: HashMap<ProviderKind, Arc<dyn Provider>> = HashMap::new();
        providers.insert(ProviderKind::Google, Arc::new(GoogleProvider::new()));
        providers.insert(ProviderKind::Anthropic, Arc::new(AnthropicProvider::new()));
        // One adapter instance serves the whole chat-completions family.
        let openai_family: Arc<dyn Provider> = Arc::new(OpenAiCompatibleProvider::new());
        providers.insert(ProviderKind::OpenAi, Arc::clone(&openai_family));
        providers.insert(ProviderKind::XAi, Arc::clone(&openai_family));
        providers.insert(ProviderKind::Moonshot, openai_family);

        InferenceClient {
            providers,
            resolver,
            options: self.options,
        }
    }
}

impl Default for InferenceClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct InferenceClient {
    providers: HashMap<ProviderKind, Arc<dyn Provider>>,
    resolver: CredentialResolver,
    options: RequestOptions,
}

impl InferenceClient {
    pub fn builder() -> InferenceClientBuilder {
        InferenceClientBuilder::new()
    }

    /// Run one inference request end to end: resolve credentials, assemble
    /// the system instruction, dispatch to the model's adapter, and aggregate
    /// the stream. `on_progress` receives the cumulative text as it grows.
    /// At most one upstream request is issued; nothing is retried.
    #[allow(clippy::too_many_arguments)]
    pub async fn perform_inference<F>(
        &self,
        query: &str,
        history: &[ConversationTurn],
        attachments: Vec<Attachment>,
        model: &ModelDescriptor,
        profile: &UserProfile,
        focus: FocusMode,
        on_progress: F,
    ) -> Result<SearchResponse, InferenceError>
    where
        F: FnMut(&str),
    {
        let credential = self.resolver.resolve(model.provider)?;
        let system_instruction = prompt::build_system_instruction(model, profile, focus);

        let mut turn = ConversationTurn::user(query);
        turn.attachments = attachments;

        let provider = self
            .providers
            .get(&model.provider)
            .ok_or_else(|| {
                ProviderError::Other(format!("no adapter registered for {}", model.provider))
            })?;

        let stream = provider.run(ProviderRequest {
            model: model.clone(),
            system_instruction,
            history: history.to_vec(),
            turn,
            credential,
            options: self.options.clone(),
        });

        match self.options.timeout {
            Some(limit) => tokio::time::timeout(limit, aggregate::aggregate(stream, on_progress))
                .await
                .map_err(|_| InferenceError::Timeout(limit))?
                .map_err(InferenceError::from),
            None => aggregate::aggregate(stream, on_progress)
                .await
                .map_err(InferenceError::from),
        }
    }
}
