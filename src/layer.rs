use crate::pool::EncoderPool;
use crate::service::CompressionService;
use flate2::Compression;
use std::sync::Arc;
use tower::Layer;

/// Default compression level, used when none is configured and as the
/// fallback for out-of-range values.
pub const DEFAULT_LEVEL: u32 = 6;

// Valid deflate levels run from 0 (stored) to 9 (best compression).
const MAX_LEVEL: u32 = 9;

/// A Tower layer that gzip-compresses HTTP response bodies.
///
/// The compression level is the only configuration and is fixed at
/// construction. Each wrapped service gets its own [`EncoderPool`], so two
/// layers configured with different levels never share compressor state.
#[derive(Debug, Clone)]
pub struct CompressionLayer {
    level: Compression,
}

impl CompressionLayer {
    /// Creates a new compression layer at the default level.
    pub fn new() -> Self {
        Self {
            level: Compression::new(DEFAULT_LEVEL),
        }
    }

    /// Sets the compression level.
    ///
    /// Values above 9 are silently clamped to [`DEFAULT_LEVEL`] rather than
    /// rejected; level 0 is valid and produces stored (uncompressed) deflate
    /// blocks inside a well-formed gzip frame.
    pub fn level(mut self, level: u32) -> Self {
        let level = if level <= MAX_LEVEL {
            level
        } else {
            DEFAULT_LEVEL
        };
        self.level = Compression::new(level);
        self
    }
}

impl Default for CompressionLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for CompressionLayer {
    type Service = CompressionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        // A fresh pool per wrapped service keeps independently configured
        // middleware instances from contending on one idle set.
        CompressionService::new(inner, Arc::new(EncoderPool::new(self.level)))
    }
}
