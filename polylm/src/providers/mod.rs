pub mod anthropic;
pub mod google;
pub mod openai;

use crate::auth::ResolvedCredential;
use crate::types::{ConversationTurn, Delta, ModelDescriptor, ProviderKind, RequestOptions};
use futures::stream::BoxStream;

/// The incremental output of one adapter invocation.
pub type DeltaStream = BoxStream<'static, Result<Delta, ProviderError>>;

/// A normalized conversation ready for dispatch. The in-flight turn is carried
/// separately from the history so adapters never double-count it.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub model: ModelDescriptor,
    pub system_instruction: String,
    pub history: Vec<ConversationTurn>,
    pub turn: ConversationTurn,
    pub credential: ResolvedCredential,
    pub options: RequestOptions,
}

/// Errors from provider dispatch. Malformed individual frames during
/// streaming are not errors; adapters skip and log them.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} returned HTTP {status}: {body}")]
    Http {
        provider: ProviderKind,
        status: u16,
        body: String,
    },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

/// One adapter per provider family. Implementations hold no per-request
/// state; dropping the returned stream aborts the in-flight HTTP request.
pub trait Provider: Send + Sync {
    fn run(&self, request: ProviderRequest) -> DeltaStream;
}

// ---------------------------------------------------------------------------
// Error-body sanitizing
// ---------------------------------------------------------------------------

const MAX_ERROR_BODY_CHARS: usize = 300;

/// Redact secret-looking tokens before an upstream error body is surfaced.
/// Covers the key prefixes of the providers this crate talks to.
fn scrub_secrets(input: &str) -> String {
    const PREFIXES: [&str; 3] = ["sk-", "xai-", "AIza"];

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    'outer: while let Some(c) = rest.chars().next() {
        for prefix in PREFIXES {
            if rest.starts_with(prefix) {
                let tail = &rest[prefix.len()..];
                let token_len: usize = tail
                    .chars()
                    .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
                    .map(char::len_utf8)
                    .sum();
                if token_len > 0 {
                    out.push_str("[REDACTED]");
                    rest = &tail[token_len..];
                    continue 'outer;
                }
            }
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}

/// Scrub secrets from an upstream error body and cap its length.
pub fn sanitize_error_body(input: &str) -> String {
    let scrubbed = scrub_secrets(input);
    if scrubbed.chars().count() <= MAX_ERROR_BODY_CHARS {
        return scrubbed;
    }
    let mut end = MAX_ERROR_BODY_CHARS;
    while end > 0 && !scrubbed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &scrubbed[..end])
}

/// Build a sanitized `ProviderError::Http` from a failed response.
pub(crate) fn http_error(provider: ProviderKind, status: u16, body: &str) -> ProviderError {
    ProviderError::Http {
        provider,
        status,
        body: sanitize_error_body(body),
    }
}
