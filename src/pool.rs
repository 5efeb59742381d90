use crate::encoder::GzipEncoder;
use flate2::Compression;
use std::fmt;
use std::sync::Mutex;
use tracing::trace;

/// An arena-style pool of idle [`GzipEncoder`] instances.
///
/// Initializing a deflate stream allocates sizeable internal buffers, so the
/// pool keeps finished encoders around for the next response instead of
/// constructing one per request. The pool is unbounded: [`acquire`]
/// constructs a fresh encoder whenever the idle set is empty, so a miss is
/// never an error. No guarantee is made about which idle instance is
/// returned.
///
/// Exclusive use per checkout is enforced by ownership: `acquire` hands out
/// the encoder by value, and it only re-enters the idle set through
/// [`release`].
///
/// [`acquire`]: Self::acquire
/// [`release`]: Self::release
pub struct EncoderPool {
    level: Compression,
    idle: Mutex<Vec<GzipEncoder>>,
}

impl EncoderPool {
    /// Creates an empty pool whose encoders compress at `level`.
    pub fn new(level: Compression) -> Self {
        Self {
            level,
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Returns the compression level shared by all pooled encoders.
    pub fn level(&self) -> Compression {
        self.level
    }

    /// Checks out an encoder, reset and ready for a new response.
    pub fn acquire(&self) -> GzipEncoder {
        let recycled = self.lock_idle().pop();
        match recycled {
            Some(mut encoder) => {
                encoder.reset();
                encoder
            }
            None => {
                trace!(level = self.level.level(), "pool empty, constructing encoder");
                GzipEncoder::new(self.level)
            }
        }
    }

    /// Checks an encoder back in after its response has completed.
    ///
    /// The encoder may be in any state; it is reset on the next checkout.
    pub fn release(&self, encoder: GzipEncoder) {
        self.lock_idle().push(encoder);
    }

    #[cfg(test)]
    pub(crate) fn idle_count(&self) -> usize {
        self.lock_idle().len()
    }

    fn lock_idle(&self) -> std::sync::MutexGuard<'_, Vec<GzipEncoder>> {
        // A poisoned idle set is still usable: every encoder is reset before
        // it is handed out again.
        self.idle.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for EncoderPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncoderPool")
            .field("level", &self.level)
            .field("idle", &self.lock_idle().len())
            .finish()
    }
}
