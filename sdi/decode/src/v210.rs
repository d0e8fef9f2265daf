/*!
    10-bit 4:2:2 "v210" unpacking.

    Each little-endian 32-bit word carries three 10-bit components in bits
    0-9, 10-19 and 20-29. Four words (16 bytes) describe six pixels:

    ```text
    word 0: Cb0 Y0  Cr0
    word 1: Y1  Cb1 Y2
    word 2: Cr1 Y3  Cb2
    word 3: Y4  Cr2 Y5
    ```

    Rows are padded to a multiple of 128 bytes (48 pixels).
*/

use sdi_types::{PixelFormat, PlanarImage};

use crate::{DecodeError, FrameDecoder, RawVideo};

const PIXELS_PER_BLOCK: usize = 6;
const BYTES_PER_BLOCK: usize = 16;

/**
    Returns the smallest row stride, in bytes, a `width` pixel v210 row can
    have.
*/
pub const fn min_stride(width: u32) -> usize {
    (width as usize).div_ceil(48) * 128
}

/**
    Decoder for v210 buffers, producing [`PixelFormat::Yuv422p10`] images.
*/
#[derive(Clone, Copy, Debug, Default)]
pub struct V210Decoder;

impl V210Decoder {
    pub fn new() -> Self {
        Self
    }
}

impl FrameDecoder for V210Decoder {
    fn output_format(&self) -> PixelFormat {
        PixelFormat::Yuv422p10
    }

    fn decode(&self, raw: &RawVideo<'_>) -> Result<PlanarImage, DecodeError> {
        let (width, height) = (raw.width, raw.height);
        let min = check_layout(width, height, raw.stride)?;

        let needed = raw.stride * (height as usize - 1) + min;
        if raw.data.len() < needed {
            return Err(DecodeError::Truncated {
                len: raw.data.len(),
                needed,
            });
        }

        let mut image = PlanarImage::try_alloc(PixelFormat::Yuv422p10, width, height)?;
        let (luma, chroma) = image.planes.split_at_mut(1);
        let (cb, cr) = chroma.split_at_mut(1);

        for y in 0..height as usize {
            let start = y * raw.stride;
            unpack_row(
                &raw.data[start..start + min],
                width as usize,
                luma[0].row_mut(y),
                cb[0].row_mut(y),
                cr[0].row_mut(y),
            );
        }

        Ok(image)
    }
}

/**
    Pack a [`PixelFormat::Yuv422p10`] image into a v210 buffer with the given
    row stride. Padding bytes are zero.
*/
pub fn pack(image: &PlanarImage, stride: usize) -> Result<Vec<u8>, DecodeError> {
    if image.format != PixelFormat::Yuv422p10 {
        return Err(DecodeError::UnsupportedFormat(image.format));
    }
    check_layout(image.width, image.height, stride)?;

    let width = image.width as usize;
    let chroma_width = width.div_ceil(2);
    let mut out = vec![0u8; stride * image.height as usize];

    for (y, line) in out.chunks_exact_mut(stride).enumerate() {
        let luma = image.planes[0].row(y);
        let cb = image.planes[1].row(y);
        let cr = image.planes[2].row(y);

        let blocks = width.div_ceil(PIXELS_PER_BLOCK);
        for (block, bytes) in line.chunks_exact_mut(BYTES_PER_BLOCK).take(blocks).enumerate() {
            let x = block * PIXELS_PER_BLOCK;
            let c = block * 3;
            let l = |i: usize| component(luma, x + i, width);
            let b = |i: usize| component(cb, c + i, chroma_width);
            let r = |i: usize| component(cr, c + i, chroma_width);

            let words = [
                word(b(0), l(0), r(0)),
                word(l(1), b(1), l(2)),
                word(r(1), l(3), b(2)),
                word(l(4), r(2), l(5)),
            ];
            for (dst, w) in bytes.chunks_exact_mut(4).zip(words) {
                dst.copy_from_slice(&w.to_le_bytes());
            }
        }
    }

    Ok(out)
}

fn check_layout(width: u32, height: u32, stride: usize) -> Result<usize, DecodeError> {
    if width == 0 || height == 0 {
        return Err(DecodeError::InvalidDimensions { width, height });
    }
    let min = min_stride(width);
    if stride < min {
        return Err(DecodeError::StrideTooSmall { stride, min, width });
    }
    Ok(min)
}

fn unpack_row(line: &[u8], width: usize, luma: &mut [u16], cb: &mut [u16], cr: &mut [u16]) {
    let chroma_width = width.div_ceil(2);

    for (block, bytes) in line.chunks_exact(BYTES_PER_BLOCK).enumerate() {
        let x = block * PIXELS_PER_BLOCK;
        if x >= width {
            break;
        }
        let c = block * 3;

        let mut s = [0u16; 12];
        for (i, w) in bytes.chunks_exact(4).enumerate() {
            let w = u32::from_le_bytes([w[0], w[1], w[2], w[3]]);
            s[i * 3] = (w & 0x3ff) as u16;
            s[i * 3 + 1] = ((w >> 10) & 0x3ff) as u16;
            s[i * 3 + 2] = ((w >> 20) & 0x3ff) as u16;
        }

        let ys = [s[1], s[3], s[5], s[7], s[9], s[11]];
        for (i, v) in ys.into_iter().enumerate().take(width - x) {
            luma[x + i] = v;
        }

        let cbs = [s[0], s[4], s[8]];
        let crs = [s[2], s[6], s[10]];
        for i in 0..3usize.min(chroma_width - c) {
            cb[c + i] = cbs[i];
            cr[c + i] = crs[i];
        }
    }
}

fn component(row: &[u16], index: usize, limit: usize) -> u32 {
    if index < limit {
        (row[index] & 0x3ff) as u32
    } else {
        0
    }
}

fn word(a: u32, b: u32, c: u32) -> u32 {
    a | (b << 10) | (c << 20)
}
