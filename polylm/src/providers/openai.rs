//! Adapter for the OpenAI-compatible chat-completions family: one
//! implementation serves OpenAI, xAI, and Moonshot, differing only in
//! resolved base URL and credentials. No native grounding or image output.

use super::{DeltaStream, Provider, ProviderError, ProviderRequest, http_error};
use crate::prompt;
use crate::sse;
use crate::types::{Delta, ProviderKind, Role};
use bytes::Bytes;
use futures::stream::Stream;
use futures::{StreamExt, pin_mut};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Terminal sentinel frame payload.
const DONE_SENTINEL: &str = "[DONE]";

pub struct OpenAiCompatibleProvider {
    client: Client,
}

impl OpenAiCompatibleProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for OpenAiCompatibleProvider {
    fn default() -> Self {
        Self::new()
    }
}

// ---- Wire types ----

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMsg>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMsg {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Option<Vec<StreamChoice>>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Option<DeltaContent>,
}

#[derive(Deserialize)]
struct DeltaContent {
    content: Option<String>,
}

/// Flattened system + history + new-turn message list. Attachments are
/// serialized into turn text; this family has no native multimodal input
/// in this design.
fn build_messages(request: &ProviderRequest) -> Vec<ChatMsg> {
    let mut msgs = Vec::new();
    if !request.system_instruction.is_empty() {
        msgs.push(ChatMsg {
            role: "system".into(),
            content: request.system_instruction.clone(),
        });
    }
    for turn in &request.history {
        msgs.push(ChatMsg {
            role: match turn.role {
                Role::User => "user".into(),
                Role::Assistant => "assistant".into(),
            },
            content: prompt::merge_attachments(turn),
        });
    }
    msgs.push(ChatMsg {
        role: "user".into(),
        content: prompt::merge_attachments(&request.turn),
    });
    msgs
}

fn decode_frame(data: &str) -> Result<Option<String>, serde_json::Error> {
    let chunk: StreamChunk = serde_json::from_str(data)?;
    Ok(chunk
        .choices
        .and_then(|mut c| c.drain(..).next())
        .and_then(|c| c.delta)
        .and_then(|d| d.content)
        .filter(|t| !t.is_empty()))
}

/// Decode a chat-completions SSE byte stream into deltas. Ends at the
/// `[DONE]` sentinel; malformed frames are skipped with a warning.
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
            if frame.data == DONE_SENTINEL {
                return;
            }
            match decode_frame(&frame.data) {
                Ok(Some(text)) => yield Ok(Delta::Text(text)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(provider = %provider, error = %e, "skipping malformed stream frame");
                }
            }
        }
    }
}

impl Provider for OpenAiCompatibleProvider {
    fn run(&self, request: ProviderRequest) -> DeltaStream {
        let provider = request.model.provider;
        let url = format!("{}/chat/completions", request.credential.base_url);
        let body = ChatRequest {
            model: request.model.internal_model_id.clone(),
            messages: build_messages(&request),
            temperature: request.options.temperature,
            stream: true,
        };
        let api_key = request.credential.api_key;
        let client = self.client.clone();

        let s = async_stream::stream! {
            tracing::debug!(provider = %provider, model = %body.model, "dispatching chat-completions request");
            let resp = match client
                .post(&url)
                .bearer_auth(&api_key)
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
