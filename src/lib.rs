//! Pure Rust WOFF2 font decoder.
//!
//! Decodes a WOFF2 byte buffer into an SFNT (TrueType/OpenType) font image:
//! parses the header and table directory, Brotli-decompresses the combined
//! table data, reconstructs the transformed `glyf`/`loca` tables, and
//! reassembles a standard sfnt. See `decode::decode` for the entry point.

pub mod brotli_stage;
pub mod decode;
pub mod error;
pub mod glyf;
pub mod header;
pub mod sfnt;
pub mod table_directory;
pub mod table_tags;

mod buf_ext;

pub use decode::{decode, decode_from_reader};
pub use error::Woff2Error;

/// Rounds `value` up to the nearest multiple of 4, saturating instead of
/// overflowing if `value` is already within 3 of `usize::MAX`.
pub(crate) fn round4(value: usize) -> usize {
    match value.checked_add(3) {
        Some(rounded) => rounded & !3,
        None => value,
    }
}
