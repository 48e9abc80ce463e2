//! WOFF2 header parsing (C2): fixed 48-byte prefix of every WOFF2 file.

use bytes::Buf;

use crate::buf_ext::BufExt;
use crate::error::Woff2Error;

pub const WOFF2_SIGNATURE: u32 = 0x774f_4632; // "wOF2"
pub const TTC_FONT_FLAVOR: u32 = 0x7474_6366; // "ttcf"

pub const HEADER_SIZE: usize = 48;

/// The fixed 48-byte WOFF2 header.
#[derive(Debug, Clone)]
pub struct Header {
    pub flavor: u32,
    pub length: u32,
    pub num_tables: u16,
    pub total_sfnt_size: u32,
    pub total_compressed_size: u32,
    pub major_version: u16,
    pub minor_version: u16,
    pub meta_offset: u32,
    pub meta_length: u32,
    pub meta_orig_length: u32,
    pub priv_offset: u32,
    pub priv_length: u32,
}

impl Header {
    /// Parses the header from `input`, validating it against `total_len`
    /// (the full length of the original WOFF2 byte region).
    pub fn parse(input: &mut impl Buf, total_len: usize) -> Result<Self, Woff2Error> {
        if input.remaining() < HEADER_SIZE {
            return Err(Woff2Error::Truncated { offset: 0 });
        }

        let signature = input.try_get_u32()?;
        if signature != WOFF2_SIGNATURE {
            return Err(Woff2Error::BadSignature);
        }

        let flavor = input.try_get_u32()?;
        if flavor == TTC_FONT_FLAVOR {
            return Err(Woff2Error::UnsupportedCollection);
        }

        let length = input.try_get_u32()?;
        if length as usize > total_len {
            return Err(Woff2Error::InvalidLength {
                declared: length,
                actual: total_len,
            });
        }

        let num_tables = input.try_get_u16()?;
        if num_tables == 0 {
            return Err(Woff2Error::Malformed("num_tables is zero"));
        }
        let _reserved = input.try_get_u16()?;

        let total_sfnt_size = input.try_get_u32()?;
        let total_compressed_size = input.try_get_u32()?;
        let major_version = input.try_get_u16()?;
        let minor_version = input.try_get_u16()?;
        let meta_offset = input.try_get_u32()?;
        let meta_length = input.try_get_u32()?;
        let meta_orig_length = input.try_get_u32()?;
        let priv_offset = input.try_get_u32()?;
        let priv_length = input.try_get_u32()?;

        if (meta_length == 0 && meta_offset != 0) || (priv_length == 0 && priv_offset != 0) {
            return Err(Woff2Error::InconsistentBlockOffset);
        }

        tracing::debug!(
            flavor = format!("{flavor:#x}"),
            length,
            num_tables,
            "parsed WOFF2 header"
        );

        Ok(Header {
            flavor,
            length,
            num_tables,
            total_sfnt_size,
            total_compressed_size,
            major_version,
            minor_version,
            meta_offset,
            meta_length,
            meta_orig_length,
            priv_offset,
            priv_length,
        })
    }
}
