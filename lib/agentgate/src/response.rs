//! Reading live response bodies.

use std::future::Future;

use agentgate_core::ByteStream;
use bytes::Bytes;
use futures_util::{TryStreamExt, future};
use http_body_util::{BodyExt, BodyStream};
use hyper::body::Incoming;

use crate::transport::map_body_error;
use crate::{CallContext, RawResponse, Result};

/// Body access for a [`RawResponse`] still attached to the network.
///
/// Returned by [`crate::Transport::send_raw`]; callers that bypass the
/// classification policy use it to buffer or stream the body themselves.
pub trait IncomingResponseExt: Sized {
    /// Read the whole body, bounded by `ctx`.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the read fails or `ctx` aborts it. The
    /// body is released either way.
    fn bytes(self, ctx: &CallContext) -> impl Future<Output = Result<RawResponse<Bytes>>> + Send;

    /// Hand the body over as a chunk stream. Trailers are skipped.
    fn into_stream(self) -> ByteStream;
}

impl IncomingResponseExt for RawResponse<Incoming> {
    fn bytes(self, ctx: &CallContext) -> impl Future<Output = Result<RawResponse<Bytes>>> + Send {
        async move {
            let (status, headers, body) = self.into_parts();
            let body = ctx
                .run(async move {
                    body.collect()
                        .await
                        .map(http_body_util::Collected::to_bytes)
                        .map_err(|err| map_body_error(&err))
                })
                .await?;
            Ok(RawResponse::new(status, headers, body))
        }
    }

    fn into_stream(self) -> ByteStream {
        let frames = BodyStream::new(self.into_body());
        let frames = TryStreamExt::map_err(frames, std::io::Error::other);
        let stream = frames.try_filter_map(|frame| future::ready(Ok(frame.into_data().ok())));
        Box::pin(stream)
    }
}
