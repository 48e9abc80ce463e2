//! Brotli decompression stage (C4): inflate the single compressed payload
//! and verify its length against what the table directory declared.

use brotli_decompressor::{BrotliResult, brotli_decode};

use crate::error::Woff2Error;

// Over ~14k real-world test fonts the largest compression ratio observed
// was ~20. A ratio above this suggests a corrupt or adversarial
// `total_sfnt_size`/declared-length field rather than legitimate content.
const MAX_PLAUSIBLE_COMPRESSION_RATIO: f32 = 100.0;

/// Decompresses `compressed` (exactly `total_compressed_size` bytes from
/// the input) and checks the result against `expected_length`, the sum of
/// each table's declared contribution to the decompressed blob.
pub fn decompress(compressed: &[u8], expected_length: usize) -> Result<Vec<u8>, Woff2Error> {
    let compression_ratio = expected_length as f32 / compressed.len().max(1) as f32;
    if compression_ratio > MAX_PLAUSIBLE_COMPRESSION_RATIO {
        tracing::warn!(compression_ratio, "implausible compression ratio");
        return Err(Woff2Error::Malformed("implausible compression ratio"));
    }

    let mut decompressed = Vec::with_capacity(expected_length);
    let info = brotli_decode(compressed, &mut decompressed);
    if !matches!(info.result, BrotliResult::ResultSuccess) {
        return Err(Woff2Error::Malformed("brotli decompression failed"));
    }
    if decompressed.len() != expected_length {
        return Err(Woff2Error::DecompressedSizeMismatch {
            expected: expected_length,
            actual: decompressed.len(),
        });
    }

    tracing::debug!(bytes = decompressed.len(), "brotli stage complete");
    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_implausible_compression_ratio() {
        let compressed = vec![0u8; 4];
        let err = decompress(&compressed, 10_000).unwrap_err();
        assert!(matches!(err, Woff2Error::Malformed(_)));
    }

    #[test]
    fn rejects_garbage_brotli_stream() {
        let compressed = vec![0xffu8; 16];
        let err = decompress(&compressed, 16).unwrap_err();
        assert!(matches!(
            err,
            Woff2Error::Malformed(_) | Woff2Error::DecompressedSizeMismatch { .. }
        ));
    }
}
