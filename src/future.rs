use crate::body::CompressionBody;
use crate::encoding::SCHEME;
use crate::pool::EncoderPool;
use http::{Response, header};
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::debug;

pin_project! {
    /// Future for compression service responses.
    pub struct ResponseFuture<F> {
        #[pin]
        inner: F,
        // Present only when the request accepted gzip.
        pool: Option<Arc<EncoderPool>>,
    }
}

impl<F> ResponseFuture<F> {
    pub(crate) fn new(inner: F, pool: Option<Arc<EncoderPool>>) -> Self {
        Self { inner, pool }
    }
}

impl<F, B, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<Response<B>, E>>,
{
    type Output = Result<Response<CompressionBody<B>>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        match this.inner.poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Ready(Ok(response)) => {
                let response = wrap_response(response, this.pool.take());
                Poll::Ready(Ok(response))
            }
        }
    }
}

/// Applies the owned header mutations and swaps in the body adapter.
///
/// `Vary: Accept-Encoding` is declared on every response, compressed or not,
/// so caching intermediaries key on the request header regardless of the
/// path this particular response took. All header edits happen here, before
/// the transport polls a single body byte, which is what keeps the
/// header-then-body ordering sound.
fn wrap_response<B>(
    response: Response<B>,
    pool: Option<Arc<EncoderPool>>,
) -> Response<CompressionBody<B>> {
    let (mut parts, body) = response.into_parts();

    append_vary_accept_encoding(&mut parts.headers);

    let body = if let Some(pool) = pool {
        debug!("compressing response body");

        parts.headers.insert(
            header::CONTENT_ENCODING,
            header::HeaderValue::from_static(SCHEME),
        );

        // The representation is about to change, so a declared length or
        // byte-range support no longer describes what goes on the wire.
        parts.headers.remove(header::CONTENT_LENGTH);
        parts.headers.remove(header::ACCEPT_RANGES);

        let encoder = pool.acquire();
        CompressionBody::compressed(body, encoder, pool)
    } else {
        CompressionBody::passthrough(body)
    };

    Response::from_parts(parts, body)
}

/// Appends Accept-Encoding to the Vary header unless already covered.
fn append_vary_accept_encoding(headers: &mut header::HeaderMap) {
    for vary in headers.get_all(header::VARY) {
        if let Ok(vary_str) = vary.to_str() {
            let covered = vary_str.split(',').any(|v| {
                let v = v.trim();
                v.eq_ignore_ascii_case("*") || v.eq_ignore_ascii_case("accept-encoding")
            });
            if covered {
                return;
            }
        }
    }

    headers.append(
        header::VARY,
        header::HeaderValue::from_static("accept-encoding"),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::CompressState;
    use flate2::Compression;

    fn test_pool() -> Arc<EncoderPool> {
        Arc::new(EncoderPool::new(Compression::default()))
    }

    fn make_response(body: &'static str) -> Response<&'static str> {
        Response::new(body)
    }

    fn make_response_with_headers<I>(body: &'static str, headers: I) -> Response<&'static str>
    where
        I: IntoIterator<Item = (&'static str, &'static str)>,
    {
        let mut response = Response::new(body);
        for (name, value) in headers {
            response
                .headers_mut()
                .insert(name, header::HeaderValue::from_static(value));
        }
        response
    }

    #[test]
    fn test_compress_when_pool_engaged() {
        let response = make_response("hello world");
        let wrapped = wrap_response(response, Some(test_pool()));

        match wrapped.body() {
            CompressionBody::Compressed { state, .. } => {
                assert_eq!(state.state(), CompressState::Streaming);
            }
            _ => panic!("Expected compressed body"),
        }

        assert_eq!(
            wrapped.headers().get(header::CONTENT_ENCODING).unwrap(),
            "gzip"
        );
    }

    #[test]
    fn test_passthrough_when_not_engaged() {
        let response = make_response("hello world");
        let wrapped = wrap_response(response, None);

        match wrapped.body() {
            CompressionBody::Passthrough { .. } => {}
            _ => panic!("Expected passthrough body"),
        }

        assert!(wrapped.headers().get(header::CONTENT_ENCODING).is_none());
    }

    #[test]
    fn test_prior_content_encoding_overwritten() {
        let response =
            make_response_with_headers("hello world", [("content-encoding", "identity")]);
        let wrapped = wrap_response(response, Some(test_pool()));

        assert_eq!(
            wrapped.headers().get(header::CONTENT_ENCODING).unwrap(),
            "gzip"
        );
    }

    #[test]
    fn test_content_length_removed_when_compressing() {
        let response = make_response_with_headers("hello world", [("content-length", "11")]);
        let wrapped = wrap_response(response, Some(test_pool()));

        assert!(wrapped.headers().get(header::CONTENT_LENGTH).is_none());
    }

    #[test]
    fn test_content_length_kept_on_passthrough() {
        let response = make_response_with_headers("hello world", [("content-length", "11")]);
        let wrapped = wrap_response(response, None);

        assert_eq!(wrapped.headers().get(header::CONTENT_LENGTH).unwrap(), "11");
    }

    #[test]
    fn test_accept_ranges_removed_when_compressing() {
        let response = make_response_with_headers("hello world", [("accept-ranges", "bytes")]);
        let wrapped = wrap_response(response, Some(test_pool()));

        assert!(wrapped.headers().get(header::ACCEPT_RANGES).is_none());
    }

    #[test]
    fn test_accept_ranges_kept_on_passthrough() {
        let response = make_response_with_headers("hello world", [("accept-ranges", "bytes")]);
        let wrapped = wrap_response(response, None);

        assert_eq!(
            wrapped.headers().get(header::ACCEPT_RANGES).unwrap(),
            "bytes"
        );
    }

    #[test]
    fn test_vary_added_when_compressing() {
        let response = make_response("hello world");
        let wrapped = wrap_response(response, Some(test_pool()));

        assert_eq!(
            wrapped.headers().get(header::VARY).unwrap(),
            "accept-encoding"
        );
    }

    #[test]
    fn test_vary_added_on_passthrough() {
        let response = make_response("hello world");
        let wrapped = wrap_response(response, None);

        assert_eq!(
            wrapped.headers().get(header::VARY).unwrap(),
            "accept-encoding"
        );
    }

    #[test]
    fn test_vary_appended_to_existing() {
        let response = make_response_with_headers("hello world", [("vary", "origin")]);
        let wrapped = wrap_response(response, Some(test_pool()));

        let vary_values: Vec<_> = wrapped
            .headers()
            .get_all(header::VARY)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(vary_values, vec!["origin", "accept-encoding"]);
    }

    #[test]
    fn test_vary_not_duplicated() {
        let response = make_response_with_headers("hello world", [("vary", "accept-encoding")]);
        let wrapped = wrap_response(response, None);

        assert_eq!(
            wrapped.headers().get(header::VARY).unwrap(),
            "accept-encoding"
        );
    }

    #[test]
    fn test_vary_star_not_modified() {
        let response = make_response_with_headers("hello world", [("vary", "*")]);
        let wrapped = wrap_response(response, None);

        assert_eq!(wrapped.headers().get(header::VARY).unwrap(), "*");
    }

    #[test]
    fn test_engaging_checks_out_an_encoder() {
        let pool = test_pool();
        pool.release(pool.acquire());
        assert_eq!(pool.idle_count(), 1);

        let wrapped = wrap_response(make_response("hello"), Some(Arc::clone(&pool)));
        assert_eq!(pool.idle_count(), 0);
        drop(wrapped);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_passthrough_never_touches_pool() {
        let pool = test_pool();
        let _wrapped = wrap_response(make_response("hello"), None);
        assert_eq!(pool.idle_count(), 0);
    }
}
