//! Sub-stream splitter (C5) and glyph reconstructor (C6): reverses the
//! WOFF2 transform on a `glyf` table, producing canonical TrueType glyph
//! records and the matching `loca` offsets.
//!
//! <https://www.w3.org/TR/WOFF2/#glyf_table_format>

use arrayvec::ArrayVec;
use bytes::{Buf, BufMut};

use crate::buf_ext::BufExt;
use crate::error::{Woff2Error, u32_will_overflow, usize_will_overflow};
use crate::glyf::triplet::{self, TRIPLET_TABLE};
use crate::round4;

#[derive(Clone, Copy)]
struct Point {
    x: i32,
    y: i32,
    on_curve: bool,
}

// Simple glyph point flags (TrueType `glyf` format).
const GLYF_ON_CURVE: u8 = 1 << 0;
const GLYF_X_SHORT: u8 = 1 << 1;
const GLYF_Y_SHORT: u8 = 1 << 2;
const GLYF_REPEAT: u8 = 1 << 3;
const GLYF_THIS_X_IS_SAME: u8 = 1 << 4;
const GLYF_THIS_Y_IS_SAME: u8 = 1 << 5;
const OVERLAP_SIMPLE: u8 = 1 << 6;

const NUM_SUB_STREAMS: usize = 7;
const FLAG_OVERLAP_SIMPLE_BITMAP: u16 = 1 << 0;
// 98% of Google Fonts have no glyph above 5k bytes; largest ever observed was ~72k.
const DEFAULT_GLYPH_BUF_SIZE: usize = 5120;

// Composite glyph component flags.
const FLAG_ARG_1_AND_2_ARE_WORDS: u16 = 1 << 0;
const FLAG_WE_HAVE_A_SCALE: u16 = 1 << 3;
const FLAG_MORE_COMPONENTS: u16 = 1 << 5;
const FLAG_WE_HAVE_AN_X_AND_Y_SCALE: u16 = 1 << 6;
const FLAG_WE_HAVE_A_TWO_BY_TWO: u16 = 1 << 7;
const FLAG_WE_HAVE_INSTRUCTIONS: u16 = 1 << 8;

pub struct GlyfAndLoca {
    pub num_glyphs: u16,
    pub index_format: u16,
    pub glyf_table: Vec<u8>,
    pub loca_table: Vec<u8>,
}

/// Reverses the WOFF2 `glyf` transform, given the raw (still transformed)
/// bytes of the `glyf` table as extracted from the decompressed blob.
pub fn reconstruct(data: &[u8]) -> Result<GlyfAndLoca, Woff2Error> {
    GlyfDecoder::new(data)?.transform()
}

struct GlyfDecoder<'a> {
    n_contour_stream: &'a [u8],
    n_points_stream: &'a [u8],
    flag_stream: &'a [u8],
    glyph_stream: &'a [u8],
    composite_stream: &'a [u8],
    bbox_bitmap: &'a [u8],
    bbox_stream: &'a [u8],
    instruction_stream: &'a [u8],
    overlap_bitmap: Option<&'a [u8]>,
    glyph_buf: Vec<u8>,

    num_glyphs: u16,
    index_format: u16,
}

impl<'a> GlyfDecoder<'a> {
    fn new(data: &'a [u8]) -> Result<Self, Woff2Error> {
        let mut input = data;
        let _reserved: u16 = input.try_get_u16()?;
        let flags: u16 = input.try_get_u16()?;
        let has_overlap_bitmap = (flags & FLAG_OVERLAP_SIMPLE_BITMAP) != 0;
        let num_glyphs = input.try_get_u16()?;
        let index_format = input.try_get_u16()?;

        let mut offset: usize = (2 + NUM_SUB_STREAMS) * 4;
        if offset > data.len() {
            return Err(Woff2Error::Truncated { offset: 0 });
        }

        let mut substreams: ArrayVec<&[u8], NUM_SUB_STREAMS> = ArrayVec::new();
        for _ in 0..NUM_SUB_STREAMS {
            let substream_size = input.try_get_u32()? as usize;
            if substream_size > data.len() - offset {
                return Err(Woff2Error::SubStreamSizeMismatch);
            }
            substreams.push(&data[offset..offset + substream_size]);
            offset += substream_size;
        }

        let bitmap_length: usize = ((num_glyphs as usize + 31) >> 5) << 2;
        if bitmap_length > substreams[5].len() {
            return Err(Woff2Error::SubStreamSizeMismatch);
        }

        let n_contour_stream = substreams[0];
        let n_points_stream = substreams[1];
        let flag_stream = substreams[2];
        let glyph_stream = substreams[3];
        let composite_stream = substreams[4];
        let (bbox_bitmap, bbox_stream) = substreams[5].split_at(bitmap_length);
        let instruction_stream = substreams[6];

        let mut overlap_bitmap: Option<&[u8]> = None;
        if has_overlap_bitmap {
            let overlap_bitmap_length = (num_glyphs as usize + 7) >> 3;
            if overlap_bitmap_length > data.len() - offset {
                return Err(Woff2Error::SubStreamSizeMismatch);
            }
            overlap_bitmap = Some(&data[offset..offset + overlap_bitmap_length]);
        }

        Ok(GlyfDecoder {
            n_contour_stream,
            n_points_stream,
            flag_stream,
            glyph_stream,
            composite_stream,
            bbox_bitmap,
            bbox_stream,
            instruction_stream,
            overlap_bitmap,
            glyph_buf: Vec::with_capacity(DEFAULT_GLYPH_BUF_SIZE),
            num_glyphs,
            index_format,
        })
    }

    fn transform(mut self) -> Result<GlyfAndLoca, Woff2Error> {
        let mut glyf_table: Vec<u8> = Vec::with_capacity(self.num_glyphs as usize * 12);
        let mut loca_values: Vec<u32> = Vec::with_capacity(self.num_glyphs as usize + 1);

        for i in 0..(self.num_glyphs as usize) {
            loca_values.push(glyf_table.len() as u32);

            let n_contours: i16 = self.n_contour_stream.try_get_i16()?;
            let glyph_has_bbox = (self.bbox_bitmap[i >> 3] & (0x80 >> (i & 7))) != 0;

            self.glyph_buf.clear();
            if n_contours < 0 {
                if !glyph_has_bbox {
                    return Err(Woff2Error::Malformed(
                        "composite glyph without an explicit bounding box",
                    ));
                }
                self.parse_composite_glyph()?;
            } else if n_contours > 0 {
                let has_overlap_bit = self
                    .overlap_bitmap
                    .is_some_and(|bitmap| (bitmap[i >> 3] & (0x80 >> (i & 7))) != 0);
                self.parse_simple_glyph(n_contours, glyph_has_bbox, has_overlap_bit)?;
            } else if glyph_has_bbox {
                return Err(Woff2Error::Malformed("empty glyph has a bounding box"));
            }

            glyf_table.extend_from_slice(&self.glyph_buf);
            let padded_len = round4(glyf_table.len());
            glyf_table.resize(padded_len, 0);
        }

        loca_values.push(glyf_table.len() as u32);
        let loca_table = generate_loca_table(&loca_values, self.index_format)?;

        tracing::debug!(
            num_glyphs = self.num_glyphs,
            glyf_bytes = glyf_table.len(),
            "reconstructed glyf/loca"
        );

        Ok(GlyfAndLoca {
            num_glyphs: self.num_glyphs,
            index_format: self.index_format,
            glyf_table,
            loca_table,
        })
    }

    fn parse_composite_glyph(&mut self) -> Result<(), Woff2Error> {
        let mut ro_composite_stream = self.composite_stream;
        let (composite_size, have_instructions) = size_of_composite(&mut ro_composite_stream)?;

        let instruction_size: u16 = if have_instructions {
            self.glyph_stream.try_get_255_u16()?
        } else {
            0
        };

        let size_needed = 12 + composite_size + instruction_size as usize;
        if size_needed > self.glyph_buf.capacity() {
            self.glyph_buf.reserve(size_needed - self.glyph_buf.capacity());
        }

        self.glyph_buf.put_i16(-1); // all composite glyphs have n_contours == -1
        self.bbox_stream.try_read_bytes_into(8, &mut self.glyph_buf)?;
        self.composite_stream
            .try_read_bytes_into(composite_size, &mut self.glyph_buf)?;

        if have_instructions {
            self.glyph_buf.put_u16(instruction_size);
            self.instruction_stream
                .try_read_bytes_into(instruction_size as usize, &mut self.glyph_buf)?;
        }

        Ok(())
    }

    fn parse_simple_glyph(
        &mut self,
        n_contours: i16,
        glyph_has_bbox: bool,
        has_overlap_bit: bool,
    ) -> Result<(), Woff2Error> {
        let n_contours = n_contours as usize;

        let mut n_points_per_contour: Vec<u16> = Vec::with_capacity(n_contours);
        let mut total_n_points: u32 = 0;
        for _ in 0..n_contours {
            let n_points_contour = self.n_points_stream.try_get_255_u16()?;
            n_points_per_contour.push(n_points_contour);
            if u32_will_overflow(total_n_points, n_points_contour as u32) {
                return Err(Woff2Error::Malformed("total point count overflow"));
            }
            total_n_points += n_points_contour as u32;
        }
        if total_n_points == 0 {
            return Err(Woff2Error::Malformed("simple glyph has zero points"));
        }
        if total_n_points as usize > self.flag_stream.len() {
            return Err(Woff2Error::Truncated { offset: 0 });
        }

        let points = decode_points(
            &self.flag_stream[..total_n_points as usize],
            &mut self.glyph_stream,
        )?;
        self.flag_stream = &self.flag_stream[total_n_points as usize..];

        let instruction_size: u16 = self.glyph_stream.try_get_255_u16()?;
        if total_n_points >= (1 << 27) || instruction_size as u32 >= (1 << 30) {
            return Err(Woff2Error::Malformed("simple glyph size exceeds limits"));
        }

        let size_needed =
            12 + 2 * n_contours + 5 * total_n_points as usize + instruction_size as usize;
        if size_needed > self.glyph_buf.capacity() {
            self.glyph_buf.reserve(size_needed - self.glyph_buf.capacity());
        }

        self.glyph_buf.put_i16(n_contours as i16);

        if glyph_has_bbox {
            self.bbox_stream.try_read_bytes_into(8, &mut self.glyph_buf)?;
        } else {
            write_bbox(&points, &mut self.glyph_buf);
        }

        let mut end_point: i32 = -1;
        for count in n_points_per_contour {
            end_point += count as i32;
            if end_point >= 65536 {
                return Err(Woff2Error::Malformed("endPtsOfContours overflow"));
            }
            self.glyph_buf.put_u16(end_point as u16);
        }

        self.glyph_buf.put_u16(instruction_size);
        self.instruction_stream
            .try_read_bytes_into(instruction_size as usize, &mut self.glyph_buf)?;

        write_glyph_points(&points, has_overlap_bit, &mut self.glyph_buf);

        Ok(())
    }
}

fn decode_points(flags: &[u8], data: &mut impl Buf) -> Result<Vec<Point>, Woff2Error> {
    let mut points = Vec::with_capacity(flags.len());
    let mut x: i32 = 0;
    let mut y: i32 = 0;
    for &flag_byte in flags {
        let on_curve = (flag_byte >> 7) == 0;
        let flag = flag_byte & 0x7f;
        let row = TRIPLET_TABLE[flag as usize];
        let n_data_bytes = row.byte_count as usize - 1;
        if data.remaining() < n_data_bytes {
            return Err(Woff2Error::Truncated { offset: 0 });
        }
        let mut coord_bytes: ArrayVec<u8, 4> = ArrayVec::new();
        for _ in 0..n_data_bytes {
            coord_bytes.push(data.get_u8());
        }
        let (dx, dy) = triplet::decode_point(flag, &coord_bytes);
        x = triplet::checked_add(x, dx)?;
        y = triplet::checked_add(y, dy)?;
        points.push(Point { x, y, on_curve });
    }
    Ok(points)
}

fn write_glyph_points(points: &[Point], has_overlap_bit: bool, dst: &mut impl BufMut) {
    // Tracks the flag byte of the run currently being accumulated; `None`
    // until the first point has been seen, so no byte is written before a
    // real flag exists to flush.
    let mut current_run: Option<u8> = None;
    let mut repeat_count: u8 = 0;
    let mut last_x: i32 = 0;
    let mut last_y: i32 = 0;

    let flag_for = |point: &Point, i: usize, last_x: i32, last_y: i32| -> u8 {
        let mut flag = 0u8;
        if point.on_curve {
            flag |= GLYF_ON_CURVE;
        }
        if has_overlap_bit && i == 0 {
            flag |= OVERLAP_SIMPLE;
        }
        let dx = point.x - last_x;
        if dx == 0 {
            flag |= GLYF_THIS_X_IS_SAME;
        } else if dx > -256 && dx < 256 {
            flag |= GLYF_X_SHORT | if dx > 0 { GLYF_THIS_X_IS_SAME } else { 0 };
        }
        let dy = point.y - last_y;
        if dy == 0 {
            flag |= GLYF_THIS_Y_IS_SAME;
        } else if dy > -256 && dy < 256 {
            flag |= GLYF_Y_SHORT | if dy > 0 { GLYF_THIS_Y_IS_SAME } else { 0 };
        }
        flag
    };

    for (i, point) in points.iter().enumerate() {
        let flag = flag_for(point, i, last_x, last_y);

        match current_run {
            Some(run_flag) if run_flag == flag && repeat_count < 255 => {
                repeat_count += 1;
            }
            Some(run_flag) => {
                if repeat_count > 0 {
                    dst.put_u8(run_flag | GLYF_REPEAT);
                    dst.put_u8(repeat_count);
                } else {
                    dst.put_u8(run_flag);
                }
                current_run = Some(flag);
                repeat_count = 0;
            }
            None => {
                current_run = Some(flag);
            }
        }

        last_x = point.x;
        last_y = point.y;
    }

    if let Some(run_flag) = current_run {
        if repeat_count > 0 {
            dst.put_u8(run_flag | GLYF_REPEAT);
            dst.put_u8(repeat_count);
        } else {
            dst.put_u8(run_flag);
        }
    }

    let mut last_x = 0;
    for point in points {
        let dx = point.x - last_x;
        if dx == 0 {
            // nothing to write; X_IS_SAME already encodes it
        } else if dx > -256 && dx < 256 {
            dst.put_u8(dx.unsigned_abs() as u8);
        } else {
            dst.put_i16(dx as i16);
        }
        last_x += dx;
    }

    let mut last_y = 0;
    for point in points {
        let dy = point.y - last_y;
        if dy == 0 {
            // nothing to write
        } else if dy > -256 && dy < 256 {
            dst.put_u8(dy.unsigned_abs() as u8);
        } else {
            dst.put_i16(dy as i16);
        }
        last_y += dy;
    }
}

fn write_bbox(points: &[Point], dst: &mut impl BufMut) {
    let mut x_min = 0i32;
    let mut y_min = 0i32;
    let mut x_max = 0i32;
    let mut y_max = 0i32;
    if let Some(first) = points.first() {
        x_min = first.x;
        x_max = first.x;
        y_min = first.y;
        y_max = first.y;
    }
    for point in points.iter().skip(1) {
        x_min = x_min.min(point.x);
        x_max = x_max.max(point.x);
        y_min = y_min.min(point.y);
        y_max = y_max.max(point.y);
    }
    dst.put_i16(x_min as i16);
    dst.put_i16(y_min as i16);
    dst.put_i16(x_max as i16);
    dst.put_i16(y_max as i16);
}

fn size_of_composite(composite_stream: &mut impl Buf) -> Result<(usize, bool), Woff2Error> {
    let mut bytes_read: usize = 0;
    let mut have_instructions = false;
    let mut flags: u16 = FLAG_MORE_COMPONENTS;
    while flags & FLAG_MORE_COMPONENTS != 0 {
        flags = composite_stream.try_get_u16()?;
        have_instructions |= (flags & FLAG_WE_HAVE_INSTRUCTIONS) != 0;

        let mut arg_size: usize = 2; // glyph index
        arg_size += if flags & FLAG_ARG_1_AND_2_ARE_WORDS != 0 { 4 } else { 2 };
        if flags & FLAG_WE_HAVE_A_SCALE != 0 {
            arg_size += 2;
        } else if flags & FLAG_WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            arg_size += 4;
        } else if flags & FLAG_WE_HAVE_A_TWO_BY_TWO != 0 {
            arg_size += 8;
        }

        if composite_stream.remaining() < arg_size {
            return Err(Woff2Error::Truncated { offset: 0 });
        }
        composite_stream.advance(arg_size);
        bytes_read += 2 + arg_size;
    }
    Ok((bytes_read, have_instructions))
}

/// Generates the `loca` table from glyph-start offsets (one entry per
/// glyph, plus a final entry equal to the total `glyf` size).
fn generate_loca_table(loca_values: &[u32], index_format: u16) -> Result<Vec<u8>, Woff2Error> {
    let loca_size = loca_values.len();
    let offset_size: usize = if index_format != 0 { 4 } else { 2 };
    if usize_will_overflow(loca_size * offset_size, 0) {
        return Err(Woff2Error::Malformed("loca table size overflow"));
    }

    let mut loca_content = Vec::with_capacity(loca_size * offset_size);
    if index_format != 0 {
        for &value in loca_values {
            loca_content.put_u32(value);
        }
    } else {
        for &value in loca_values {
            if value % 2 != 0 {
                return Err(Woff2Error::Malformed(
                    "glyf offset is odd but index_format requires 2-byte loca",
                ));
            }
            loca_content.put_u16((value >> 1) as u16);
        }
    }
    Ok(loca_content)
}
