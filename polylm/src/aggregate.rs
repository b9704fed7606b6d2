//! Collects a delta stream into one final response, reporting cumulative
//! text to the caller as it grows.

use crate::providers::ProviderError;
use crate::types::{Delta, SearchResponse, Source};
use futures::stream::Stream;
use futures::{StreamExt, pin_mut};
use std::collections::HashSet;

/// Surfaced when a stream completes without producing any text or images.
pub const EMPTY_RESULT_TEXT: &str =
    "I could not generate a response for this request. Please try again.";

/// Drain a delta stream into a `SearchResponse`. `on_progress` receives the
/// cumulative text after each text delta, before the next one is pulled.
/// Sources are deduplicated by URL, first occurrence wins. A mid-stream error
/// aborts aggregation; partial text stays with the caller through the last
/// progress call.
pub async fn aggregate<S, F>(stream: S, mut on_progress: F) -> Result<SearchResponse, ProviderError>
where
    S: Stream<Item = Result<Delta, ProviderError>>,
    F: FnMut(&str),
{
    let mut text = String::new();
    let mut sources: Vec<Source> = Vec::new();
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut images: Vec<String> = Vec::new();

    pin_mut!(stream);
    while let Some(delta) = stream.next().await {
        match delta? {
            Delta::Text(fragment) => {
                text.push_str(&fragment);
                on_progress(&text);
            }
            Delta::Source(source) => {
                if seen_urls.insert(source.url.clone()) {
                    sources.push(source);
                }
            }
            Delta::Image(uri) => images.push(uri),
        }
    }

    if text.is_empty() && images.is_empty() {
        text = EMPTY_RESULT_TEXT.to_string();
    }

    Ok(SearchResponse {
        text,
        sources,
        images,
    })
}
