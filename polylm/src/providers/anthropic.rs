//! Adapter for the Anthropic Messages API. SSE frames carry a named event
//! type; only `content_block_delta` events carry text and `message_stop`
//! terminates the stream. The request must carry an explicit output-token
//! cap; this API has no unbounded default.

use super::{DeltaStream, Provider, ProviderError, ProviderRequest, http_error};
use crate::prompt;
use crate::sse;
use crate::types::{Delta, ProviderKind, Role};
use bytes::Bytes;
use futures::stream::Stream;
use futures::{StreamExt, pin_mut};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
}

impl AnthropicProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for AnthropicProvider {
    fn default() -> Self {
        Self::new()
    }
}

// ---- Wire types ----

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    stream: bool,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct StreamEventData {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    delta: Option<DeltaData>,
}

#[derive(Deserialize)]
struct DeltaData {
    #[serde(default)]
    text: Option<String>,
}

fn build_messages(request: &ProviderRequest) -> Vec<AnthropicMessage> {
    let mut msgs: Vec<AnthropicMessage> = request
        .history
        .iter()
        .map(|turn| AnthropicMessage {
            role: match turn.role {
                Role::User => "user".into(),
                Role::Assistant => "assistant".into(),
            },
            content: prompt::merge_attachments(turn),
        })
        .collect();
    msgs.push(AnthropicMessage {
        role: "user".into(),
        content: prompt::merge_attachments(&request.turn),
    });
    msgs
}

/// What one decoded frame contributes to the stream.
enum FrameOutcome {
    Text(String),
    Stop,
    Nothing,
}

fn decode_frame(data: &str) -> Result<FrameOutcome, serde_json::Error> {
    let evt: StreamEventData = serde_json::from_str(data)?;
    match evt.event_type.as_str() {
        "content_block_delta" => Ok(evt
            .delta
            .and_then(|d| d.text)
            .filter(|t| !t.is_empty())
            .map_or(FrameOutcome::Nothing, FrameOutcome::Text)),
        "message_stop" => Ok(FrameOutcome::Stop),
        // message_start, content_block_start/stop, message_delta, ping.
        _ => Ok(FrameOutcome::Nothing),
    }
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
            match decode_frame(&frame.data) {
                Ok(FrameOutcome::Text(text)) => yield Ok(Delta::Text(text)),
                Ok(FrameOutcome::Stop) => return,
                Ok(FrameOutcome::Nothing) => {}
                Err(e) => {
                    tracing::warn!(provider = %provider, error = %e, "skipping malformed stream frame");
                }
            }
        }
    }
}

impl Provider for AnthropicProvider {
    fn run(&self, request: ProviderRequest) -> DeltaStream {
        let provider = request.model.provider;
        let url = format!("{}/messages", request.credential.base_url);
        let body = MessagesRequest {
            model: request.model.internal_model_id.clone(),
            messages: build_messages(&request),
            max_tokens: request.model.max_output_tokens,
            system: if request.system_instruction.is_empty() {
                None
            } else {
                Some(request.system_instruction.clone())
            },
            temperature: request.options.temperature,
            stream: true,
        };
        let api_key = request.credential.api_key;
        let client = self.client.clone();

        let s = async_stream::stream! {
            tracing::debug!(provider = %provider, model = %body.model, "dispatching messages request");
            let resp = match client
                .post(&url)
                .header("x-api-key", &api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
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
