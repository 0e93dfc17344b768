//! Transport stage: the HTTP exchange with the server.
//!
//! Bodies are streams so that multipart responses can be parsed as they arrive.

use bytes::Bytes;
use bytes::BytesMut;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use tower::BoxError;

pub type Body = BoxStream<'static, Result<Bytes, BoxError>>;
pub type Request = http::Request<Bytes>;
pub type Response = http::Response<Body>;
pub type BoxCloneService = tower::util::BoxCloneService<Request, Response, BoxError>;

/// Reads a whole body.
pub(crate) async fn collect(body: Body) -> Result<Bytes, BoxError> {
    let bytes = body
        .try_fold(BytesMut::new(), |mut bytes, chunk| async move {
            bytes.extend_from_slice(&chunk);
            Ok(bytes)
        })
        .await?;
    Ok(bytes.freeze())
}
