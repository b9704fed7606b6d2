//! Adapter for the Google Generative Language API (Gemini). The richest
//! capability surface: search-grounding citations, inline binary attachments
//! for an allow-listed MIME set, an optional thinking budget, and inline
//! image output reassembled into data URIs.

use super::{DeltaStream, Provider, ProviderError, ProviderRequest, http_error};
use crate::prompt;
use crate::sse;
use crate::types::{Attachment, ConversationTurn, Delta, ProviderKind, Role, Source};
use bytes::Bytes;
use futures::stream::Stream;
use futures::{StreamExt, pin_mut};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Binary MIME types passed as typed inline payloads. Anything else degrades
/// to a text placeholder naming the file and its type.
const INLINE_MIME_TYPES: [&str; 6] = [
    "image/png",
    "image/jpeg",
    "image/webp",
    "image/heic",
    "image/heif",
    "application/pdf",
];

fn can_inline(att: &Attachment) -> bool {
    INLINE_MIME_TYPES.contains(&att.mime_type.as_str())
}

pub struct GoogleProvider {
    client: Client,
}

impl GoogleProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for GoogleProvider {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDeclaration>>,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            inline_data: None,
        }
    }

    fn inline(mime_type: String, data: String) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData { mime_type, data }),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolDeclaration {
    google_search: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamChunk {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    thought: Option<bool>,
    inline_data: Option<InlineDataResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineDataResponse {
    mime_type: Option<String>,
    data: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    grounding_chunks: Option<Vec<GroundingChunk>>,
}

#[derive(Deserialize)]
struct GroundingChunk {
    web: Option<WebSource>,
}

#[derive(Deserialize)]
struct WebSource {
    uri: Option<String>,
    title: Option<String>,
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Text attachments are inlined as delimited text blocks like everywhere
/// else; allow-listed binaries become typed inline-data parts; anything else
/// becomes a placeholder part, never dropped.
fn parts_for_turn(turn: &ConversationTurn) -> Vec<Part> {
    let mut text = turn.content.clone();
    for att in &turn.attachments {
        if att.is_text {
            if !text.is_empty() {
                text.push_str("\n\n");
            }
            text.push_str(&prompt::attachment_block(att));
        }
    }

    let mut parts = Vec::new();
    if !text.is_empty() {
        parts.push(Part::text(text));
    }
    for att in &turn.attachments {
        if att.is_text {
            continue;
        }
        if can_inline(att) {
            parts.push(Part::inline(att.mime_type.clone(), att.payload.clone()));
        } else {
            parts.push(Part::text(prompt::binary_placeholder(att)));
        }
    }
    parts
}

fn build_request(request: &ProviderRequest) -> GenerateContentRequest {
    let mut contents: Vec<Content> = request
        .history
        .iter()
        .map(|turn| Content {
            role: match turn.role {
                Role::User => "user".into(),
                Role::Assistant => "model".into(),
            },
            parts: parts_for_turn(turn),
        })
        .collect();
    contents.push(Content {
        role: "user".into(),
        parts: parts_for_turn(&request.turn),
    });

    let system_instruction = if request.system_instruction.is_empty() {
        None
    } else {
        Some(SystemInstruction {
            parts: vec![Part::text(request.system_instruction.clone())],
        })
    };

    let thinking_config = if request.model.supports_thinking {
        request
            .options
            .thinking_budget
            .map(|thinking_budget| ThinkingConfig { thinking_budget })
    } else {
        None
    };

    let image_output = request.model.supports_image_generation;
    let generation_config = GenerationConfig {
        temperature: request.options.temperature,
        thinking_config,
        response_modalities: image_output.then(|| vec!["TEXT".into(), "IMAGE".into()]),
    };

    // Image models reject tool use; everything else gets search grounding.
    let tools = (!image_output).then(|| {
        vec![ToolDeclaration {
            google_search: json!({}),
        }]
    });

    GenerateContentRequest {
        contents,
        system_instruction,
        generation_config: Some(generation_config),
        tools,
    }
}

fn deltas_from_chunk(chunk: StreamChunk) -> Vec<Delta> {
    let mut deltas = Vec::new();
    for candidate in chunk.candidates.unwrap_or_default() {
        if let Some(parts) = candidate.content.and_then(|c| c.parts) {
            for part in parts {
                if part.thought.unwrap_or(false) {
                    continue;
                }
                if let Some(text) = part.text {
                    if !text.is_empty() {
                        deltas.push(Delta::Text(text));
                    }
                }
                if let Some(inline) = part.inline_data {
                    if let (Some(mime), Some(data)) = (inline.mime_type, inline.data) {
                        deltas.push(Delta::Image(format!("data:{mime};base64,{data}")));
                    }
                }
            }
        }
        if let Some(chunks) = candidate
            .grounding_metadata
            .and_then(|gm| gm.grounding_chunks)
        {
            for gc in chunks {
                if let Some(web) = gc.web {
                    if let Some(uri) = web.uri {
                        let title = web.title.unwrap_or_else(|| uri.clone());
                        deltas.push(Delta::Source(Source { title, url: uri }));
                    }
                }
            }
        }
    }
    deltas
}

fn decode_sse<S, E>(
    byte_stream: S,
    provider: ProviderKind,
) -> impl Stream<Item = Result<Delta, ProviderError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<ProviderError> + Send + 'static,
{
    async_stream::stream! {
        let frames = sse::frames(byte_stream);
        pin_mut!(frames);
        while let Some(frame) = frames.next().await {
            let frame = match frame {
                Ok(f) => f,
                Err(e) => {
                    yield Err(e.into());
                    return;
                }
            };
            if frame.data.is_empty() {
                continue;
            }
            match serde_json::from_str::<StreamChunk>(&frame.data) {
                Ok(chunk) => {
                    for delta in deltas_from_chunk(chunk) {
                        yield Ok(delta);
                    }
                }
                Err(e) => {
                    tracing::warn!(provider = %provider, error = %e, "skipping malformed stream frame");
                }
            }
        }
    }
}

impl Provider for GoogleProvider {
    fn run(&self, request: ProviderRequest) -> DeltaStream {
        let provider = request.model.provider;
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            request.credential.base_url, request.model.internal_model_id
        );
        let body = build_request(&request);
        let model_id = request.model.internal_model_id.clone();
        let api_key = request.credential.api_key;
        let client = self.client.clone();

        let s = async_stream::stream! {
            tracing::debug!(provider = %provider, model = %model_id, "dispatching generate-content request");
            let resp = match client
                .post(&url)
                .header("x-goog-api-key", &api_key)
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    yield Err(ProviderError::Network(e));
                    return;
                }
            };
            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                yield Err(http_error(provider, status.as_u16(), &text));
                return;
            }

            let deltas = decode_sse(resp.bytes_stream(), provider);
            pin_mut!(deltas);
            while let Some(delta) = deltas.next().await {
                yield delta;
            }
        };
        Box::pin(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ResolvedCredential;
    use crate::types::{ModelDescriptor, RequestOptions};

    fn model(thinking: bool, image: bool) -> ModelDescriptor {
        ModelDescriptor {
            public_id: "gemini".into(),
            display_name: "Gemini".into(),
            provider: ProviderKind::Google,
            internal_model_id: "gemini-2.5-flash".into(),
            supports_thinking: thinking,
            supports_image_generation: image,
            max_output_tokens: 8192,
            persona_prefix: None,
        }
    }

    fn request(model: ModelDescriptor) -> ProviderRequest {
        ProviderRequest {
            model,
            system_instruction: "sys".into(),
            history: vec![
                ConversationTurn::user("q1"),
                ConversationTurn::assistant("a1"),
            ],
            turn: ConversationTurn::user("q2"),
            credential: ResolvedCredential {
                api_key: "AIza-test".into(),
                base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            },
            options: RequestOptions::default(),
        }
    }

    #[test]
    fn contents_keep_history_order_and_append_new_turn() {
        let body = build_request(&request(model(false, false)));
        let roles: Vec<&str> = body.contents.iter().map(|c| c.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
        assert_eq!(
            body.contents.last().unwrap().parts[0].text.as_deref(),
            Some("q2")
        );
        let q2_count = body
            .contents
            .iter()
            .flat_map(|c| &c.parts)
            .filter(|p| p.text.as_deref() == Some("q2"))
            .count();
        assert_eq!(q2_count, 1);
    }

    #[test]
    fn search_grounding_enabled_except_for_image_models() {
        let body = build_request(&request(model(false, false)));
        assert!(body.tools.is_some());

        let body = build_request(&request(model(false, true)));
        assert!(body.tools.is_none());
        let config = body.generation_config.unwrap();
        assert_eq!(
            config.response_modalities,
            Some(vec!["TEXT".to_string(), "IMAGE".to_string()])
        );
    }

    #[test]
    fn thinking_budget_set_only_when_model_supports_it() {
        let mut req = request(model(true, false));
        req.options.thinking_budget = Some(8192);
        let body = build_request(&req);
        let config = body.generation_config.unwrap();
        assert_eq!(
            config.thinking_config.map(|t| t.thinking_budget),
            Some(8192)
        );

        let mut req = request(model(false, false));
        req.options.thinking_budget = Some(8192);
        let body = build_request(&req);
        assert!(body.generation_config.unwrap().thinking_config.is_none());
    }

    #[test]
    fn allow_listed_binary_becomes_inline_part() {
        let mut turn = ConversationTurn::user("look");
        turn.attachments
            .push(Attachment::binary("photo.png", "image/png", "iVBORw=="));
        let parts = parts_for_turn(&turn);
        assert_eq!(parts.len(), 2);
        let inline = parts[1].inline_data.as_ref().unwrap();
        assert_eq!(inline.mime_type, "image/png");
        assert_eq!(inline.data, "iVBORw==");
    }

    #[test]
    fn unsupported_binary_becomes_text_placeholder_not_dropped() {
        let mut turn = ConversationTurn::user("listen");
        turn.attachments
            .push(Attachment::binary("song.flac", "audio/flac", "Zmxh"));
        let parts = parts_for_turn(&turn);
        assert_eq!(parts.len(), 2);
        assert!(parts[1].inline_data.is_none());
        let placeholder = parts[1].text.as_deref().unwrap();
        assert!(placeholder.contains("song.flac"));
        assert!(placeholder.contains("audio/flac"));
    }

    #[test]
    fn chunk_text_and_citations_become_deltas() {
        let chunk: StreamChunk = serde_json::from_str(
            r#"{
                "candidates": [{
                    "content": {"parts": [{"text": "Answer"}]},
                    "groundingMetadata": {
                        "groundingChunks": [
                            {"web": {"uri": "https://example.com/a", "title": "A"}},
                            {"web": {"uri": "https://example.com/b"}}
                        ]
                    }
                }]
            }"#,
        )
        .unwrap();
        let deltas = deltas_from_chunk(chunk);
        assert_eq!(deltas.len(), 3);
        assert!(matches!(&deltas[0], Delta::Text(t) if t == "Answer"));
        assert!(
            matches!(&deltas[1], Delta::Source(s) if s.url == "https://example.com/a" && s.title == "A")
        );
        // A citation without a title falls back to its URL.
        assert!(
            matches!(&deltas[2], Delta::Source(s) if s.title == "https://example.com/b")
        );
    }

    #[test]
    fn inline_image_is_reassembled_into_data_uri() {
        let chunk: StreamChunk = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"inlineData":{"mimeType":"image/png","data":"QUJD"}}]}}]}"#,
        )
        .unwrap();
        let deltas = deltas_from_chunk(chunk);
        assert_eq!(deltas.len(), 1);
        assert!(matches!(&deltas[0], Delta::Image(uri) if uri == "data:image/png;base64,QUJD"));
    }

    #[test]
    fn thought_parts_are_not_surfaced_as_text() {
        let chunk: StreamChunk = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"internal","thought":true},{"text":"visible"}]}}]}"#,
        )
        .unwrap();
        let deltas = deltas_from_chunk(chunk);
        assert_eq!(deltas.len(), 1);
        assert!(matches!(&deltas[0], Delta::Text(t) if t == "visible"));
    }
}
