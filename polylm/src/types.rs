use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// The provider families the adapter layer can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Google,
    OpenAi,
    XAi,
    Moonshot,
    Anthropic,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Google => "google",
            ProviderKind::OpenAi => "openai",
            ProviderKind::XAi => "xai",
            ProviderKind::Moonshot => "moonshot",
            ProviderKind::Anthropic => "anthropic",
        }
    }

    /// Environment variable holding the default API key for this provider.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::Google => "GEMINI_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::XAi => "XAI_API_KEY",
            ProviderKind::Moonshot => "MOONSHOT_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    /// Environment variable overriding the base URL, where the provider
    /// speaks a relocatable (OpenAI-compatible) API.
    pub fn base_url_env(&self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAi => Some("OPENAI_BASE_URL"),
            ProviderKind::XAi => Some("XAI_BASE_URL"),
            ProviderKind::Moonshot => Some("MOONSHOT_BASE_URL"),
            _ => None,
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Google => "https://generativelanguage.googleapis.com/v1beta",
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::XAi => "https://api.x.ai/v1",
            ProviderKind::Moonshot => "https://api.moonshot.ai/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com/v1",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// A file attached to a turn. `payload` is plain text when `is_text`,
/// base64-encoded bytes otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    pub payload: String,
    pub is_text: bool,
}

impl Attachment {
    pub fn text(name: impl Into<String>, mime_type: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            payload: body.into(),
            is_text: true,
        }
    }

    pub fn binary(name: impl Into<String>, mime_type: impl Into<String>, base64: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            payload: base64.into(),
            is_text: false,
        }
    }
}

/// One turn of a conversation. The sequence passed as history is in
/// chronological order and never contains the in-flight turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            attachments: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            attachments: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Models
// ---------------------------------------------------------------------------

/// A model known to the catalog. Selects both which adapter runs and which
/// upstream model name is sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Stable ID the caller selects models by (e.g. "gemini-flash").
    pub public_id: String,
    /// Human-friendly display name.
    pub display_name: String,
    /// Which provider family serves this model.
    pub provider: ProviderKind,
    /// Model name as sent upstream (e.g. "gemini-2.5-flash").
    pub internal_model_id: String,
    /// Whether the model accepts a thinking budget. Only the Google adapter
    /// honors this; others ignore it without error.
    pub supports_thinking: bool,
    /// Whether the model can return inline images. Google-only, as above.
    pub supports_image_generation: bool,
    /// Output cap. Required on the wire by Anthropic, advisory elsewhere.
    pub max_output_tokens: u64,
    /// Persona text prepended before the base system instruction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_prefix: Option<String>,
}

// ---------------------------------------------------------------------------
// Caller context
// ---------------------------------------------------------------------------

/// Per-user context consumed once per request to build the system
/// instruction. Never mutated by this crate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub response_style: String,
    /// Names of connected external data sources (simulated capability).
    #[serde(default)]
    pub integrations: Vec<String>,
}

/// Caller-selected directive biasing the system instruction toward a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusMode {
    #[default]
    All,
    Academic,
    Writing,
    Code,
    Social,
}

impl FocusMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FocusMode::All => "all",
            FocusMode::Academic => "academic",
            FocusMode::Writing => "writing",
            FocusMode::Code => "code",
            FocusMode::Social => "social",
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A web source a provider attached to ground its answer. Identity is `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
}

/// The final aggregated result of one inference request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub text: String,
    /// Deduplicated by URL, insertion order.
    pub sources: Vec<Source>,
    /// Generated images as data URIs, arrival order.
    pub images: Vec<String>,
}

/// One incremental unit of streamed provider output.
#[derive(Debug, Clone)]
pub enum Delta {
    /// Incremental text fragment.
    Text(String),
    /// A grounding citation.
    Source(Source),
    /// A generated image as a data URI.
    Image(String),
}

// ---------------------------------------------------------------------------
// Request options
// ---------------------------------------------------------------------------

/// Tuning knobs applied to every request issued through a client.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub temperature: Option<f64>,
    /// Token budget for extended reasoning, where the model supports it.
    pub thinking_budget: Option<u64>,
    /// Wall-clock cap for the whole request, including streaming.
    pub timeout: Option<Duration>,
}
