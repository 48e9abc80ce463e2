//! Buffer reading helpers: big-endian scalars, table tags, and the two
//! WOFF2 variable-length integer encodings (`UIntBase128`, `255UInt16`).
//!
//! Built on top of [`bytes::Buf`]'s own fallible `try_get_*` family; this
//! module only adds the WOFF2-specific encodings and a tag reader.

use bytes::Buf;
use font_types::Tag;

use crate::error::Woff2Error;

/// Based on section 6.1.1 of the MicroType Express draft spec.
const WORD_CODE: u8 = 253;
const ONE_MORE_BYTE_CODE_1: u8 = 255;
const ONE_MORE_BYTE_CODE_2: u8 = 254;
const LOWEST_U_CODE: u32 = 253;

pub trait BufExt: Buf {
    fn try_get_tag(&mut self) -> Result<Tag, Woff2Error> {
        let bytes = [
            self.try_get_u8()?,
            self.try_get_u8()?,
            self.try_get_u8()?,
            self.try_get_u8()?,
        ];
        Ok(Tag::new(&bytes))
    }

    /// `255UInt16`: a variable-length unsigned 16-bit integer with three
    /// escape codes (253, 254, 255).
    fn try_get_255_u16(&mut self) -> Result<u16, Woff2Error> {
        let code = self.try_get_u8()?;
        let value = match code {
            WORD_CODE => self.try_get_u16()? as u32,
            ONE_MORE_BYTE_CODE_1 => self.try_get_u8()? as u32 + LOWEST_U_CODE,
            ONE_MORE_BYTE_CODE_2 => self.try_get_u8()? as u32 + LOWEST_U_CODE * 2,
            other => other as u32,
        };
        Ok(value as u16)
    }

    /// `UIntBase128`: variable-length unsigned integer, up to 5 bytes, 7
    /// bits per byte, high bit is the continuation flag.
    fn try_get_uint_base128(&mut self) -> Result<u32, Woff2Error> {
        let mut result: u32 = 0;
        for i in 0..5 {
            let code = self.try_get_u8()?;
            // Leading zeros are invalid.
            if i == 0 && code == 0x80 {
                return Err(Woff2Error::MalformedVarInt { offset: 0 });
            }
            // If any of the top seven bits are set we're about to overflow.
            if (result & 0xfe000000) != 0 {
                return Err(Woff2Error::MalformedVarInt { offset: 0 });
            }
            result = (result << 7) | ((code & 0x7f) as u32);
            if (code & 0x80) == 0 {
                return Ok(result);
            }
        }
        Err(Woff2Error::MalformedVarInt { offset: 0 })
    }

    /// Copy exactly `n` bytes into `dst`, failing with `Truncated` if fewer remain.
    fn try_read_bytes_into(&mut self, n: usize, dst: &mut Vec<u8>) -> Result<(), Woff2Error> {
        if self.remaining() < n {
            return Err(Woff2Error::Truncated { offset: 0 });
        }
        let start = dst.len();
        dst.resize(start + n, 0);
        self.copy_to_slice(&mut dst[start..]);
        Ok(())
    }
}

impl<T: Buf + ?Sized> BufExt for T {}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    /// Test-only inverse of `try_get_255_u16`, used to round-trip values
    /// through the encoding under property testing.
    fn encode_255_u16(value: u16) -> Vec<u8> {
        let value = value as u32;
        if value < LOWEST_U_CODE {
            vec![value as u8]
        } else if value - LOWEST_U_CODE <= 255 {
            vec![ONE_MORE_BYTE_CODE_1, (value - LOWEST_U_CODE) as u8]
        } else if value - LOWEST_U_CODE * 2 <= 255 {
            vec![ONE_MORE_BYTE_CODE_2, (value - LOWEST_U_CODE * 2) as u8]
        } else {
            let mut v = vec![WORD_CODE];
            v.extend_from_slice(&(value as u16).to_be_bytes());
            v
        }
    }

    proptest! {
        #[test]
        fn roundtrip_255_u16(value in 0u32..=65535u32) {
            let encoded = encode_255_u16(value as u16);
            let mut buf = encoded.as_slice();
            prop_assert_eq!(buf.try_get_255_u16().unwrap(), value as u16);
        }

        #[test]
        fn base128_rejects_any_leading_zero_byte(rest in proptest::collection::vec(any::<u8>(), 0..4)) {
            let mut bytes = vec![0x80u8];
            bytes.extend(rest);
            let mut buf = bytes.as_slice();
            prop_assert!(buf.try_get_uint_base128().is_err());
        }
    }

    #[test]
    fn read_255_u16_plain() {
        let mut buf: &[u8] = &[10];
        assert_eq!(buf.try_get_255_u16().unwrap(), 10);
    }

    #[test]
    fn read_255_u16_word_code() {
        let mut buf: &[u8] = &[253, 0x01, 0x02];
        assert_eq!(buf.try_get_255_u16().unwrap(), 0x0102);
    }

    #[test]
    fn read_255_u16_one_more_byte_1() {
        let mut buf: &[u8] = &[255, 10];
        assert_eq!(buf.try_get_255_u16().unwrap(), 10 + 253);
    }

    #[test]
    fn read_255_u16_one_more_byte_2() {
        let mut buf: &[u8] = &[254, 10];
        assert_eq!(buf.try_get_255_u16().unwrap(), 10 + 506);
    }

    #[test]
    fn base128_single_byte() {
        let mut buf: &[u8] = &[0x01];
        assert_eq!(buf.try_get_uint_base128().unwrap(), 1);
    }

    #[test]
    fn base128_multi_byte() {
        // 0x3f 0xff 0x7f -> (0x3f<<14) | (0x7f<<7) | 0x7f
        let mut buf: &[u8] = &[0xbf, 0xff, 0x7f];
        let expected = (0x3fu32 << 14) | (0x7f << 7) | 0x7f;
        assert_eq!(buf.try_get_uint_base128().unwrap(), expected);
    }

    #[test]
    fn base128_rejects_leading_zero_byte() {
        let mut buf: &[u8] = &[0x80, 0x00];
        assert!(buf.try_get_uint_base128().is_err());
    }

    #[test]
    fn base128_rejects_unterminated() {
        let mut buf: &[u8] = &[0xff, 0xff, 0xff, 0xff, 0xff];
        assert!(buf.try_get_uint_base128().is_err());
    }

    #[test]
    fn base128_rejects_overflow() {
        let mut buf: &[u8] = &[0xff, 0xff, 0xff, 0xff, 0x7f];
        assert!(buf.try_get_uint_base128().is_err());
    }
}
