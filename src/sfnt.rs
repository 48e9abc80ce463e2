//! SFNT assembler (C7): writes the 12-byte offset table and the per-table
//! directory, then appends each table's bytes 4-byte aligned.

use font_types::Tag;

use crate::round4;

/// One table ready to be written into the output SFNT, in the order it
/// should appear in the directory (input order, per spec section 4.7).
pub struct SfntTable {
    pub tag: Tag,
    pub data: Vec<u8>,
}

/// Assembles a complete SFNT byte buffer from `flavor` (echoed as
/// `sfnt_version`) and the ordered table list. Checksums are written as
/// zero; see `DESIGN.md` for why this crate does not compute them.
pub fn assemble(flavor: u32, tables: &[SfntTable]) -> Vec<u8> {
    let num_tables = tables.len() as u32;

    let mut search_range_units: u32 = 1; // in units of 16
    let mut entry_selector: u32 = 0;
    while search_range_units * 2 <= num_tables {
        search_range_units *= 2;
        entry_selector += 1;
    }
    let search_range = search_range_units * 16;
    let range_shift = num_tables * 16 - search_range;

    let header_size = 12 + tables.len() * 16;
    let body_size: usize = tables.iter().map(|t| round4(t.data.len())).sum();
    let mut out = Vec::with_capacity(header_size + body_size);
    out.resize(header_size, 0);

    out[0..4].copy_from_slice(&flavor.to_be_bytes());
    out[4..6].copy_from_slice(&(num_tables as u16).to_be_bytes());
    out[6..8].copy_from_slice(&(search_range as u16).to_be_bytes());
    out[8..10].copy_from_slice(&(entry_selector as u16).to_be_bytes());
    out[10..12].copy_from_slice(&(range_shift as u16).to_be_bytes());

    let mut data_offset = header_size;
    for (i, table) in tables.iter().enumerate() {
        let slot = 12 + i * 16;
        out[slot..slot + 4].copy_from_slice(&table.tag.to_be_bytes());
        out[slot + 4..slot + 8].copy_from_slice(&0u32.to_be_bytes()); // checksum
        out[slot + 8..slot + 12].copy_from_slice(&(data_offset as u32).to_be_bytes());
        out[slot + 12..slot + 16].copy_from_slice(&(table.data.len() as u32).to_be_bytes());

        out.extend_from_slice(&table.data);
        let padded = round4(out.len());
        out.resize(padded, 0);
        data_offset = padded;
    }

    tracing::debug!(num_tables, total_bytes = out.len(), "assembled SFNT");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_table_layout() {
        let tables = vec![SfntTable {
            tag: Tag::new(b"cmap"),
            data: vec![0, 0, 0, 4],
        }];
        let out = assemble(0x4f54544f, &tables);
        // offset table (12) + 1 directory entry (16) = 28
        assert_eq!(&out[0..4], &0x4f54544fu32.to_be_bytes());
        assert_eq!(u16::from_be_bytes([out[4], out[5]]), 1); // num_tables
        let dir_offset = u32::from_be_bytes([out[20], out[21], out[22], out[23]]);
        assert_eq!(dir_offset, 28);
        let dir_length = u32::from_be_bytes([out[24], out[25], out[26], out[27]]);
        assert_eq!(dir_length, 4);
        assert_eq!(&out[28..32], &[0, 0, 0, 4]);
    }

    #[test]
    fn tables_are_four_byte_aligned_and_padded() {
        let tables = vec![
            SfntTable { tag: Tag::new(b"cmap"), data: vec![1, 2, 3] },
            SfntTable { tag: Tag::new(b"head"), data: vec![4, 5] },
        ];
        let out = assemble(0x4f54544f, &tables);
        let first_slot = 12;
        let first_offset =
            u32::from_be_bytes([out[first_slot + 8], out[first_slot + 9], out[first_slot + 10], out[first_slot + 11]])
                as usize;
        assert_eq!(first_offset % 4, 0);
        let second_slot = 12 + 16;
        let second_offset = u32::from_be_bytes([
            out[second_slot + 8],
            out[second_slot + 9],
            out[second_slot + 10],
            out[second_slot + 11],
        ]) as usize;
        assert_eq!(second_offset % 4, 0);
    }

    #[test]
    fn search_range_matches_spec_formula() {
        // 5 tables: largest power of two <= 5 is 4; search_range = 4*16 = 64
        let tables: Vec<_> = (0..5)
            .map(|i| SfntTable { tag: Tag::new(&[b'a', b'a', b'a', b'a' + i]), data: vec![] })
            .collect();
        let out = assemble(0x4f54544f, &tables);
        let search_range = u16::from_be_bytes([out[6], out[7]]);
        let entry_selector = u16::from_be_bytes([out[8], out[9]]);
        let range_shift = u16::from_be_bytes([out[10], out[11]]);
        assert_eq!(search_range, 64);
        assert_eq!(entry_selector, 2);
        assert_eq!(range_shift, 5 * 16 - 64);
    }
}
