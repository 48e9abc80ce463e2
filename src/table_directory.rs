//! Table directory parsing (C3): per-table flag byte, tag, and the two
//! variable-length lengths, plus the glyf/loca coupling invariant.

use bytes::Buf;
use font_types::Tag;

use crate::buf_ext::BufExt;
use crate::error::{Woff2Error, u32_will_overflow};
use crate::table_tags::{GLYF_TAG, KNOWN_TAGS, LOCA_TAG};

/// A single table directory entry, in input order.
#[derive(Debug, Clone)]
pub struct TableDirectoryEntry {
    pub tag: Tag,
    pub transformation_version: u8,
    pub original_length: u32,
    /// Present iff this table carries a WOFF2 transform in the
    /// decompressed blob; see spec section 3's coupling rule for
    /// `glyf`/`loca`, where the polarity of this flag is inverted.
    pub transform_length: Option<u32>,
}

impl TableDirectoryEntry {
    pub fn parse(input: &mut impl Buf) -> Result<Self, Woff2Error> {
        let flag_byte = input.try_get_u8()?;
        let tag_bits = flag_byte & 0x3f;
        let transformation_version = (flag_byte >> 6) & 0x3;

        let tag = if tag_bits == 0x3f {
            input.try_get_tag()?
        } else {
            *KNOWN_TAGS
                .get(tag_bits as usize)
                .ok_or(Woff2Error::UnknownTag)?
        };

        let original_length = input.try_get_uint_base128()?;

        let is_glyf_or_loca = tag == GLYF_TAG || tag == LOCA_TAG;
        let has_transform_length = if is_glyf_or_loca {
            transformation_version == 0
        } else {
            transformation_version != 0
        };

        let transform_length = if has_transform_length {
            Some(input.try_get_uint_base128()?)
        } else {
            None
        };

        if tag == LOCA_TAG {
            if let Some(len) = transform_length {
                if len != 0 {
                    return Err(Woff2Error::Malformed(
                        "transformed loca must declare transform_length == 0",
                    ));
                }
            }
        }

        Ok(TableDirectoryEntry {
            tag,
            transformation_version,
            original_length,
            transform_length,
        })
    }

    /// `true` when this table's bytes in the decompressed blob are in a
    /// transformed (not directly-SFNT) form.
    pub fn is_transformed(&self) -> bool {
        self.transform_length.is_some()
    }

    /// Number of bytes this table contributes to the decompressed blob.
    pub fn woff_length(&self) -> u32 {
        self.transform_length.unwrap_or(self.original_length)
    }
}

/// The full table directory: all entries, in input order.
#[derive(Debug, Clone)]
pub struct TableDirectory {
    pub entries: Vec<TableDirectoryEntry>,
    pub total_length_of_all_tables: u64,
}

impl TableDirectory {
    pub fn parse(input: &mut impl Buf, num_tables: usize) -> Result<Self, Woff2Error> {
        let mut entries = Vec::with_capacity(num_tables);
        let mut total_length_of_all_tables: u64 = 0;
        for _ in 0..num_tables {
            let entry = TableDirectoryEntry::parse(input)?;
            total_length_of_all_tables += entry.woff_length() as u64;
            entries.push(entry);
        }

        let directory = TableDirectory {
            entries,
            total_length_of_all_tables,
        };
        directory.check_glyf_loca_coupling()?;

        tracing::debug!(
            num_tables,
            total_length_of_all_tables,
            "parsed table directory"
        );

        Ok(directory)
    }

    pub fn find(&self, tag: Tag) -> Option<&TableDirectoryEntry> {
        self.entries.iter().find(|entry| entry.tag == tag)
    }

    fn check_glyf_loca_coupling(&self) -> Result<(), Woff2Error> {
        let glyf = self.find(GLYF_TAG);
        let loca = self.find(LOCA_TAG);
        match (glyf, loca) {
            (Some(_), None) | (None, Some(_)) => {
                Err(Woff2Error::CouplingViolation("glyf and loca must both be present or both be absent"))
            }
            (Some(glyf), Some(loca)) => {
                if glyf.transformation_version != loca.transformation_version {
                    return Err(Woff2Error::CouplingViolation(
                        "glyf and loca transformation_version must match",
                    ));
                }
                // Guard against a pathological declared-length sum overflowing u32 math
                // elsewhere in the pipeline (C4's plausible-compression-ratio check).
                if u32_will_overflow(glyf.woff_length(), loca.woff_length()) {
                    return Err(Woff2Error::Malformed("glyf/loca combined length overflows"));
                }
                Ok(())
            }
            (None, None) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_bytes(flag: u8, explicit_tag: Option<&[u8; 4]>, orig_len: u8, xform_len: Option<u8>) -> Vec<u8> {
        let mut v = vec![flag];
        if let Some(tag) = explicit_tag {
            v.extend_from_slice(tag);
        }
        v.push(orig_len);
        if let Some(x) = xform_len {
            v.push(x);
        }
        v
    }

    #[test]
    fn parses_known_tag_entry() {
        // flag_byte = 0 -> tag_bits 0 (cmap), version 0 -> not glyf/loca, version==0 means no transform_length
        let bytes = entry_bytes(0x00, None, 10, None);
        let mut input = bytes.as_slice();
        let e = TableDirectoryEntry::parse(&mut input).unwrap();
        assert_eq!(e.tag, KNOWN_TAGS[0]);
        assert_eq!(e.original_length, 10);
        assert!(!e.is_transformed());
    }

    #[test]
    fn parses_explicit_tag_entry() {
        let bytes = entry_bytes(0x3f, Some(b"zzzz"), 4, None);
        let mut input = bytes.as_slice();
        let e = TableDirectoryEntry::parse(&mut input).unwrap();
        assert_eq!(e.tag, Tag::new(b"zzzz"));
    }

    #[test]
    fn known_tags_has_exactly_63_entries() {
        // tag_bits is 6 bits (0..=63); 0x3f (63) means "explicit tag follows", so every
        // non-explicit index in 0..=62 must resolve against KNOWN_TAGS for the `UnknownTag`
        // branch in `parse` to stay unreachable in practice.
        assert_eq!(KNOWN_TAGS.len(), 63);
    }

    #[test]
    fn lookup_index_out_of_range_yields_unknown_tag() {
        // `TableDirectoryEntry::parse` can never reach the `UnknownTag` branch while
        // KNOWN_TAGS has all 63 entries, so exercise the lookup-and-error logic directly
        // against a shrunk fixture table to confirm the branch itself is correct.
        let short_known_tags: [Tag; 2] = [Tag::new(b"cmap"), Tag::new(b"head")];
        let result = short_known_tags.get(5).copied().ok_or(Woff2Error::UnknownTag);
        assert!(matches!(result, Err(Woff2Error::UnknownTag)));
    }

    #[test]
    fn glyf_version_zero_is_transformed() {
        // flag_byte: version bits (6,7) = 00, tag_bits = 10 (glyf)
        let bytes = entry_bytes(10, None, 100, Some(50));
        let mut input = bytes.as_slice();
        let e = TableDirectoryEntry::parse(&mut input).unwrap();
        assert_eq!(e.tag, GLYF_TAG);
        assert!(e.is_transformed());
        assert_eq!(e.woff_length(), 50);
    }

    #[test]
    fn glyf_version_nonzero_is_not_transformed() {
        // version bits = 01 (0x40), tag_bits = 10 (glyf)
        let bytes = entry_bytes(0x40 | 10, None, 100, None);
        let mut input = bytes.as_slice();
        let e = TableDirectoryEntry::parse(&mut input).unwrap();
        assert!(!e.is_transformed());
        assert_eq!(e.woff_length(), 100);
    }

    #[test]
    fn rejects_one_sided_glyf_loca() {
        // Only a glyf entry, no loca.
        let bytes = entry_bytes(10, None, 100, Some(50));
        let mut input = bytes.as_slice();
        let directory = TableDirectory {
            entries: vec![TableDirectoryEntry::parse(&mut input).unwrap()],
            total_length_of_all_tables: 50,
        };
        assert!(matches!(
            directory.check_glyf_loca_coupling(),
            Err(Woff2Error::CouplingViolation(_))
        ));
    }
}
