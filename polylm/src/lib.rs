pub mod aggregate;
pub mod auth;
pub mod client;
pub mod models;
pub mod prompt;
pub mod providers;
pub mod sse;
pub mod types;

// Re-exports for convenience
pub use aggregate::{EMPTY_RESULT_TEXT, aggregate};
pub use auth::{CredentialError, CredentialResolver, KeyStore, ResolvedCredential};
pub use client::{InferenceClient, InferenceClientBuilder, InferenceError};
pub use models::{default_models, find_model};
pub use prompt::build_system_instruction;
pub use providers::{DeltaStream, Provider, ProviderError, ProviderRequest};
pub use types::*;
