use flate2::{Compress, Compression, Crc, FlushCompress, Status};
use std::io;

// Output capacity reserved per deflate call.
const OUTPUT_CHUNK_SIZE: usize = 8 * 1024;

// Fixed gzip member header: magic bytes, deflate method, no flags, zero
// mtime, no extra flags, unknown OS.
const GZIP_HEADER: [u8; 10] = [
    0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff,
];

/// An incremental gzip compressor that can be reset and reused.
///
/// Wraps a raw deflate stream and adds the gzip member framing around it:
/// the fixed header before the first output byte and the CRC32/ISIZE trailer
/// on [`finish`](Self::finish). Unlike `flate2::write::GzEncoder`, it is not
/// bound to a sink and all state can be cleared with [`reset`](Self::reset),
/// which is what makes pooling instances across requests possible.
pub struct GzipEncoder {
    deflate: Compress,
    crc: Crc,
    header_written: bool,
    finished: bool,
}

impl GzipEncoder {
    /// Creates an encoder compressing at the given level.
    ///
    /// The level is fixed for the lifetime of the encoder; it survives
    /// [`reset`](Self::reset).
    pub fn new(level: Compression) -> Self {
        Self {
            deflate: Compress::new(level, false),
            crc: Crc::new(),
            header_written: false,
            finished: false,
        }
    }

    /// Compresses `input` in full, appending any produced bytes to `output`.
    ///
    /// The deflater buffers internally, so a call may append nothing at all;
    /// there is no byte-for-byte correspondence between input chunks and
    /// output chunks. Buffered data is only guaranteed to be emitted by
    /// [`finish`](Self::finish).
    pub fn encode(&mut self, mut input: &[u8], output: &mut Vec<u8>) -> io::Result<()> {
        debug_assert!(!self.finished);
        self.write_header(output);
        self.crc.update(input);

        while !input.is_empty() {
            output.reserve(OUTPUT_CHUNK_SIZE);
            let before = self.deflate.total_in();
            self.deflate
                .compress_vec(input, output, FlushCompress::None)
                .map_err(io::Error::other)?;
            let consumed = (self.deflate.total_in() - before) as usize;
            input = &input[consumed..];
        }
        Ok(())
    }

    /// Terminates the gzip member, appending the remaining compressed data
    /// and the CRC32/ISIZE trailer to `output`.
    ///
    /// Always produces a structurally valid member, even when no data was
    /// encoded: the result is then a well-formed empty gzip stream rather
    /// than zero bytes.
    pub fn finish(&mut self, output: &mut Vec<u8>) -> io::Result<()> {
        debug_assert!(!self.finished);
        self.write_header(output);

        loop {
            output.reserve(OUTPUT_CHUNK_SIZE);
            let status = self
                .deflate
                .compress_vec(&[], output, FlushCompress::Finish)
                .map_err(io::Error::other)?;
            if status == Status::StreamEnd {
                break;
            }
        }

        output.extend_from_slice(&self.crc.sum().to_le_bytes());
        output.extend_from_slice(&self.crc.amount().to_le_bytes());
        self.finished = true;
        Ok(())
    }

    /// Clears all stream state so the encoder can serve another response.
    pub fn reset(&mut self) {
        self.deflate.reset();
        self.crc.reset();
        self.header_written = false;
        self.finished = false;
    }

    fn write_header(&mut self, output: &mut Vec<u8>) {
        if !self.header_written {
            output.extend_from_slice(&GZIP_HEADER);
            self.header_written = true;
        }
    }
}
