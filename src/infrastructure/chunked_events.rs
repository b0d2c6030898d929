// Chunked render-event streaming: length-prefixed JSON frames, optionally Brotli-compressed
use crate::domain::dashboard::RenderEvent;
use async_compression::tokio::bufread::BrotliEncoder;
use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use axum::response::IntoResponse;
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::Stream;
use futures::StreamExt;
use tokio::io::AsyncReadExt;
use tokio::sync::broadcast;

pub const CONTENT_TYPE: &str = "application/x-weather-events";

/// Create a chunked streaming response from a stream of render events
pub async fn chunked_event_stream<S>(stream: S, compress: bool) -> Result<Response<Body>, StatusCode>
where
    S: Stream<Item = RenderEvent> + Send + 'static,
{
    let byte_stream = stream.then(move |event| async move { serialize_chunk(&event, compress).await });
    let body = Body::from_stream(byte_stream);

    // Chunks are compressed individually, so no Content-Encoding on the response
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, CONTENT_TYPE)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(body)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// One frame: 4-byte big-endian length, then the (possibly compressed) JSON event
pub async fn serialize_chunk(event: &RenderEvent, compress: bool) -> Result<Bytes, std::io::Error> {
    let json = serde_json::to_vec(event)?;

    let payload = if compress {
        let mut encoder = BrotliEncoder::new(std::io::Cursor::new(json));
        let mut compressed = Vec::new();
        encoder.read_to_end(&mut compressed).await?;
        compressed
    } else {
        json
    };

    let length = u32::try_from(payload.len())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let mut chunk = BytesMut::with_capacity(4 + payload.len());
    chunk.put_u32(length);
    chunk.put_slice(&payload);

    Ok(chunk.freeze())
}

/// Forward broadcast events until the service shuts down. A subscriber that
/// falls behind skips the missed events and keeps going.
pub async fn stream_from_receiver(
    mut rx: broadcast::Receiver<RenderEvent>,
    compress: bool,
) -> impl IntoResponse {
    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => yield event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "stream subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    match chunked_event_stream(stream, compress).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}
