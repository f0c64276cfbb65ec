// Chunked JSON streaming utilities for live monitor updates
use crate::application::monitor_service::MonitorUpdate;
use crate::infrastructure::http_response::brotli_compress;
use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use axum::response::IntoResponse;
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::Stream;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};

/// Create a chunked streaming response of length-prefixed JSON messages
pub fn chunked_json_stream<S, T>(stream: S, compress: bool) -> Result<Response<Body>, StatusCode>
where
    S: Stream<Item = T> + Send + 'static,
    T: Serialize + Send + 'static,
{
    let byte_stream = stream.then(move |msg| serialize_chunk(msg, compress));

    // Chunks are compressed individually, so no Content-Encoding on the response
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::TRANSFER_ENCODING, "chunked")
        .body(Body::from_stream(byte_stream))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// One chunk: 4-byte big-endian length, then the (optionally compressed) JSON payload
pub async fn serialize_chunk<T: Serialize>(msg: T, compress: bool) -> Result<Bytes, std::io::Error> {
    let json = serde_json::to_vec(&msg)?;
    let payload = if compress {
        brotli_compress(json).await?
    } else {
        json
    };

    let length = u32::try_from(payload.len())
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "chunk too large"))?;
    let mut chunk = BytesMut::with_capacity(4 + payload.len());
    chunk.put_u32(length);
    chunk.put_slice(&payload);

    Ok(chunk.freeze())
}

/// Stream updates from a broadcast subscription until the monitor stops
pub fn stream_from_updates(
    mut rx: broadcast::Receiver<MonitorUpdate>,
    compress: bool,
) -> impl IntoResponse {
    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(update) => yield update,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Update subscriber lagged, skipping messages");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    match chunked_json_stream(stream, compress) {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::monitor_service::ClearReason;

    #[tokio::test]
    async fn test_chunk_is_length_prefixed_json() {
        let update = MonitorUpdate::StoresCleared {
            reason: ClearReason::UserRequest,
        };
        let chunk = serialize_chunk(update, false).await.unwrap();

        let length = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as usize;
        assert_eq!(length, chunk.len() - 4);
        assert_eq!(
            &chunk[4..],
            br#"{"type":"stores_cleared","reason":"user_request"}"#
        );
    }

    fn assert_send<T: Send>(_: &T) {}

    // Owned payloads that are Send but not Sync must still stream
    #[tokio::test]
    async fn test_stream_of_send_only_messages() {
        let messages = vec![std::cell::Cell::new(1u32), std::cell::Cell::new(2u32)];
        let response = chunked_json_stream(futures::stream::iter(messages), true).unwrap();
        assert_send(&response);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let first = u32::from_be_bytes([body[0], body[1], body[2], body[3]]) as usize;
        assert!(body.len() > 4 + first + 4);
    }

    #[tokio::test]
    async fn test_stream_ends_when_sender_dropped() {
        let (tx, rx) = broadcast::channel(8);
        let response = stream_from_updates(rx, false).into_response();

        tx.send(MonitorUpdate::StreamReopened).unwrap();
        drop(tx);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let expected = br#"{"type":"stream_reopened"}"#;
        assert_eq!(&body[..4], &(expected.len() as u32).to_be_bytes());
        assert_eq!(&body[4..], expected);
    }
}
