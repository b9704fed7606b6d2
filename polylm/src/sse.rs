//! Transport-level stream decoding shared by every adapter: chunk-boundary-safe
//! line splitting over a byte stream, plus SSE frame assembly on top of it.

use bytes::Bytes;
use futures::stream::Stream;
use futures::{StreamExt, pin_mut};

/// Buffers incoming bytes and yields only complete lines, retaining any
/// trailing partial line across pushes. Bytes are buffered raw and decoded
/// to UTF-8 only per complete line, so a line or a multi-byte character
/// split across two network reads is never dropped, duplicated, or mangled.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Next complete line, without its terminator. `None` until a newline
    /// arrives.
    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.buf.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
        while matches!(line.last(), Some(&(b'\n' | b'\r'))) {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Flush the final partial line at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            None
        } else {
            let rest = std::mem::take(&mut self.buf);
            Some(String::from_utf8_lossy(&rest).into_owned())
        }
    }
}

/// Turn a byte stream into a stream of complete lines.
pub fn lines<S, E>(byte_stream: S) -> impl Stream<Item = Result<String, E>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Send + 'static,
{
    async_stream::stream! {
        pin_mut!(byte_stream);
        let mut buf = LineBuffer::default();
        while let Some(chunk) = byte_stream.next().await {
            match chunk {
                Ok(bytes) => {
                    buf.push(&bytes);
                    while let Some(line) = buf.next_line() {
                        yield Ok(line);
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
        if let Some(rest) = buf.finish() {
            yield Ok(rest);
        }
    }
}

/// One Server-Sent-Events frame: an optional `event:` name and the joined
/// `data:` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Assemble SSE frames from a byte stream. Frames are dispatched on blank
/// lines; `:` comment lines (provider keep-alives) are ignored; a trailing
/// unterminated frame is flushed at end of stream.
pub fn frames<S, E>(byte_stream: S) -> impl Stream<Item = Result<SseFrame, E>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Send + 'static,
{
    async_stream::stream! {
        let line_stream = lines(byte_stream);
        pin_mut!(line_stream);
        let mut event: Option<String> = None;
        let mut data = String::new();
        while let Some(line) = line_stream.next().await {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            if line.is_empty() {
                if event.is_some() || !data.is_empty() {
                    yield Ok(SseFrame {
                        event: event.take(),
                        data: std::mem::take(&mut data),
                    });
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }
            if let Some(value) = line.strip_prefix("event:") {
                event = Some(value.trim_start().to_string());
            } else if let Some(value) = line.strip_prefix("data:") {
                if !data.is_empty() {
                    data.push('\n');
                }
                data.push_str(value.strip_prefix(' ').unwrap_or(value));
            }
        }
        if event.is_some() || !data.is_empty() {
            yield Ok(SseFrame { event, data });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::convert::Infallible;

    fn byte_chunks(chunks: &[&str]) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + use<> {
        let owned: Vec<Result<Bytes, Infallible>> = chunks
            .iter()
            .map(|c| Ok(Bytes::copy_from_slice(c.as_bytes())))
            .collect();
        stream::iter(owned)
    }

    fn raw_chunks(chunks: Vec<Vec<u8>>) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + use<> {
        let owned: Vec<Result<Bytes, Infallible>> =
            chunks.into_iter().map(|c| Ok(Bytes::from(c))).collect();
        stream::iter(owned)
    }

    async fn collect_lines(chunks: &[&str]) -> Vec<String> {
        lines(byte_chunks(chunks))
            .map(|r| r.unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn splits_lines_regardless_of_chunk_boundary() {
        let input = "a\nb\nc";
        for split in 0..=input.len() {
            let (left, right) = input.split_at(split);
            let got = collect_lines(&[left, right]).await;
            assert_eq!(got, vec!["a", "b", "c"], "split at {split}");
        }
    }

    #[tokio::test]
    async fn multibyte_chars_survive_arbitrary_splits() {
        let input = "café\nπ≈3\n".as_bytes();
        for split in 0..=input.len() {
            let (left, right) = input.split_at(split);
            let got: Vec<String> = lines(raw_chunks(vec![left.to_vec(), right.to_vec()]))
                .map(|r| r.unwrap())
                .collect()
                .await;
            assert_eq!(got, vec!["café", "π≈3"], "split at byte {split}");
        }
    }

    #[tokio::test]
    async fn retains_partial_line_across_reads() {
        let got = collect_lines(&["hel", "lo\nwor", "ld\n"]).await;
        assert_eq!(got, vec!["hello", "world"]);
    }

    #[tokio::test]
    async fn strips_crlf() {
        let got = collect_lines(&["a\r\nb\r\n"]).await;
        assert_eq!(got, vec!["a", "b"]);
    }

    #[test]
    fn line_buffer_flushes_trailing_partial() {
        let mut buf = LineBuffer::default();
        buf.push(b"no newline");
        assert_eq!(buf.next_line(), None);
        assert_eq!(buf.finish(), Some("no newline".to_string()));
        assert_eq!(buf.finish(), None);
    }

    #[tokio::test]
    async fn assembles_event_and_data_frames() {
        let frames: Vec<SseFrame> = frames(byte_chunks(&[
            "event: content_block_delta\ndata: {\"a\":1}\n\n",
            "data: plain\n\n",
        ]))
        .map(|r| r.unwrap())
        .collect()
        .await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event.as_deref(), Some("content_block_delta"));
        assert_eq!(frames[0].data, "{\"a\":1}");
        assert_eq!(frames[1].event, None);
        assert_eq!(frames[1].data, "plain");
    }

    #[tokio::test]
    async fn ignores_comment_keepalives_and_joins_multiline_data() {
        let frames: Vec<SseFrame> =
            frames(byte_chunks(&[": keep-alive\ndata: one\ndata: two\n\n"]))
                .map(|r| r.unwrap())
                .collect()
                .await;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "one\ntwo");
    }

    #[tokio::test]
    async fn flushes_unterminated_final_frame() {
        let frames: Vec<SseFrame> = frames(byte_chunks(&["data: tail"]))
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "tail");
    }
}
