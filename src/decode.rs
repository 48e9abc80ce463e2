//! Top-level driver (C8): sequences C2 → C3 → C4 → (C5/C6) → C7 and
//! surfaces errors. This module holds the crate's only two public
//! entry points.

use std::io::Read;

use bytes::Buf;

use crate::brotli_stage;
use crate::error::Woff2Error;
use crate::glyf;
use crate::header::Header;
use crate::sfnt::{self, SfntTable};
use crate::table_directory::TableDirectory;
use crate::table_tags::{GLYF_TAG, LOCA_TAG};

/// Decodes a complete WOFF2 byte region into an SFNT (TrueType/OpenType)
/// byte buffer.
pub fn decode(input: &[u8]) -> Result<Vec<u8>, Woff2Error> {
    let span = tracing::debug_span!("woff2_decode", input_len = input.len());
    let _enter = span.enter();

    let mut cursor = input;
    let header = Header::parse(&mut cursor, input.len())?;
    let table_directory = TableDirectory::parse(&mut cursor, header.num_tables as usize)?;

    let total_compressed_size = header.total_compressed_size as usize;
    if total_compressed_size > cursor.remaining() {
        return Err(Woff2Error::Truncated {
            offset: input.len() - cursor.remaining(),
        });
    }
    let compressed = &cursor.chunk()[..total_compressed_size];
    let decompressed = brotli_stage::decompress(
        compressed,
        table_directory.total_length_of_all_tables as usize,
    )?;

    // Slice out each table's raw (possibly transformed) bytes, tracking a
    // running offset into the decompressed blob.
    let mut raw_slices: Vec<&[u8]> = Vec::with_capacity(table_directory.entries.len());
    let mut offset: usize = 0;
    for entry in &table_directory.entries {
        let len = entry.woff_length() as usize;
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= decompressed.len())
            .ok_or(Woff2Error::SubStreamSizeMismatch)?;
        raw_slices.push(&decompressed[offset..end]);
        offset = end;
    }
    if offset != decompressed.len() {
        return Err(Woff2Error::SubStreamSizeMismatch);
    }

    // Reconstruct glyf/loca once, up front, regardless of where each
    // appears in directory order (spec section 4.8: loca may precede glyf).
    let glyf_entry = table_directory.find(GLYF_TAG);
    let reconstructed = match glyf_entry {
        Some(entry) if entry.is_transformed() => {
            let glyf_index = table_directory
                .entries
                .iter()
                .position(|e| e.tag == GLYF_TAG)
                .expect("glyf_entry came from this directory");
            Some(glyf::reconstruct(raw_slices[glyf_index])?)
        }
        _ => None,
    };

    let mut sfnt_tables = Vec::with_capacity(table_directory.entries.len());
    for (entry, raw) in table_directory.entries.iter().zip(raw_slices.iter()) {
        let data = if entry.tag == GLYF_TAG && entry.is_transformed() {
            reconstructed.as_ref().unwrap().glyf_table.clone()
        } else if entry.tag == LOCA_TAG && entry.is_transformed() {
            reconstructed.as_ref().unwrap().loca_table.clone()
        } else if entry.is_transformed() {
            return Err(Woff2Error::UnsupportedTransformation {
                tag: entry.tag.to_string(),
            });
        } else {
            raw.to_vec()
        };
        sfnt_tables.push(SfntTable { tag: entry.tag, data });
    }

    let output = sfnt::assemble(header.flavor, &sfnt_tables);
    tracing::debug!(output_len = output.len(), "decode complete");
    Ok(output)
}

/// Equivalent to [`decode`] for a seekable reader: the input is read fully
/// into an owned buffer before any parsing begins (no streaming decode).
pub fn decode_from_reader<R: Read>(mut reader: R) -> Result<Vec<u8>, Woff2Error> {
    let mut buf = Vec::new();
    reader
        .read_to_end(&mut buf)
        .map_err(|_| Woff2Error::Truncated { offset: 0 })?;
    decode(&buf)
}
