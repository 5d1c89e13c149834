//! DEFLATE adapter with fixed buffer sizing.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use crate::{Error, Result};

/// Compression level selectable on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompressionLevel {
    Fastest,
    #[default]
    Normal,
    Best,
}

impl CompressionLevel {
    fn codec_level(self) -> Compression {
        match self {
            CompressionLevel::Fastest => Compression::fast(),
            CompressionLevel::Normal => Compression::default(),
            CompressionLevel::Best => Compression::best(),
        }
    }
}

/// Largest ratio of decompressed to compressed size DEFLATE can produce.
const MAX_EXPANSION: usize = 1032;

/// Worst-case output size reserved for compressing `len` bytes: `ceil(len * 1.1) + 12`.
pub fn compress_bound(len: usize) -> usize { len + len.div_ceil(10) + 12 }

/// Compresses `data` into a zlib stream.
///
/// The output buffer is allocated once with [`compress_bound`] bytes and
/// the codec must finish the stream inside it.
pub fn compress(data: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let mut output = Vec::with_capacity(compress_bound(data.len()));
    let mut codec = Compress::new(level.codec_level(), true);
    match codec.compress_vec(data, &mut output, FlushCompress::Finish) {
        Ok(Status::StreamEnd) => Ok(output),
        Ok(status) => Err(Error::Compression(format!(
            "stream not finished ({:?}) after {} of {} bytes",
            status,
            codec.total_in(),
            data.len()
        ))),
        Err(e) => Err(Error::Compression(e.to_string())),
    }
}

/// Decompresses a zlib stream that must expand to exactly `expected_len` bytes.
pub fn decompress(data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    if data.is_empty() {
        if expected_len == 0 {
            return Ok(Vec::new());
        }
        return Err(Error::Decompression(format!(
            "no compressed data for {} expected bytes",
            expected_len
        )));
    }
    // the stored size is untrusted, a valid stream can't exceed this
    let capacity = expected_len.min(data.len().saturating_mul(MAX_EXPANSION));
    let mut output = Vec::new();
    output
        .try_reserve_exact(capacity)
        .map_err(|e| Error::Decompression(format!("can't allocate {} bytes: {}", capacity, e)))?;
    let mut codec = Decompress::new(true);
    match codec.decompress_vec(data, &mut output, FlushDecompress::Finish) {
        Ok(Status::StreamEnd) if output.len() == expected_len => Ok(output),
        Ok(Status::StreamEnd) => Err(Error::Decompression(format!(
            "expected {} bytes, got {}",
            expected_len,
            output.len()
        ))),
        Ok(status) => Err(Error::Decompression(format!(
            "stream not finished ({:?}) after {} of {} expected bytes",
            status,
            output.len(),
            expected_len
        ))),
        Err(e) => Err(Error::Decompression(e.to_string())),
    }
}
