//! Gzip decompression for log batches

use flate2::read::GzDecoder;
use std::io::Read;
use tracing::debug;

/// Decompress gzip-compressed data
///
/// An error here means the stream is corrupt or not gzip at all; the
/// processor treats that class as transient and retries the fetch.
pub fn decompress_gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)?;
    debug!("Decompressed {} -> {} bytes", data.len(), decompressed.len());
    Ok(decompressed)
}
