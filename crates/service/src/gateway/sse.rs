use std::convert::Infallible;

use axum::body::Body;
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::response::Response;
use bytes::Bytes;
use futures_util::StreamExt;
use thinkrelay_core::event::NormalizedEvent;
use tokio_stream::wrappers::ReceiverStream;

/// Streams relay events to the client as `data: <json>\n\n` frames.
pub(crate) fn event_stream_response(events: ReceiverStream<NormalizedEvent>) -> Response {
    let frames =
        events.map(|event| Ok::<_, Infallible>(Bytes::from(event.to_sse_frame())));
    let mut response = Response::new(Body::from_stream(frames));
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    response
}
