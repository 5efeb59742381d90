//! Transparent gzip response compression for Tower.
//!
//! This crate provides a Tower layer that gzip-compresses HTTP response
//! bodies when the client's `Accept-Encoding` header contains the `gzip`
//! token, and passes the response through untouched otherwise. The wrapped
//! service never learns which path was taken.
//!
//! # Example
//!
//! ```ignore
//! use http_gzip::CompressionLayer;
//! use tower::ServiceBuilder;
//!
//! let service = ServiceBuilder::new()
//!     .layer(CompressionLayer::new().level(4))
//!     .service(my_service);
//! ```
//!
//! # Negotiation
//!
//! Detection is deliberately simple: substring presence of `gzip` anywhere
//! in the `Accept-Encoding` value. Quality values are not parsed and no
//! other coding is considered.
//!
//! # Response Modifications
//!
//! - `Vary: Accept-Encoding` is appended to every response, compressed or
//!   not, unless an existing `Vary` entry already covers it
//! - When compression is engaged, `Content-Encoding: gzip` is set and the
//!   now-stale `Content-Length` and `Accept-Ranges` headers are removed
//!
//! # Encoder Reuse
//!
//! Initializing a deflate stream is the expensive part of serving a
//! compressed response, so encoders are pooled: each [`CompressionLayer`]
//! wraps its services around a dedicated [`EncoderPool`], and every
//! compressed response checks an encoder out for its lifetime and back in
//! when its body completes or is dropped.

#![deny(missing_docs)]

mod body;
mod encoder;
mod encoding;
mod future;
mod layer;
mod pool;
mod service;

pub use body::CompressionBody;
pub use encoder::GzipEncoder;
pub use encoding::SCHEME;
pub use future::ResponseFuture;
pub use layer::{CompressionLayer, DEFAULT_LEVEL};
pub use pool::EncoderPool;
pub use service::CompressionService;
