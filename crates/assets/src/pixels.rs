//! Pixel layout conversion for texture upload.
//!
//! Decoders hand out texels as (A, R, G, B) with row 0 at the top. The render
//! backends expect (R, G, B, A) with row 0 at the bottom.

/// Errors from pixel conversion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PixelError {
    #[error("pixel buffer is {actual} bytes, expected {expected} for {width}x{height}")]
    LengthMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// Bytes per texel in both layouts.
pub const BYTES_PER_TEXEL: usize = 4;

fn check_len(pixels: &[u8], width: u32, height: u32) -> Result<usize, PixelError> {
    let expected = width as usize * height as usize * BYTES_PER_TEXEL;
    if pixels.len() != expected {
        return Err(PixelError::LengthMismatch {
            width,
            height,
            expected,
            actual: pixels.len(),
        });
    }
    Ok(width as usize * BYTES_PER_TEXEL)
}

/// Convert top-down ARGB texels to bottom-up RGBA texels.
///
/// `out[(height-1-y)*width + x]` receives the channels of `in[y*width + x]`.
pub fn argb_top_down_to_rgba_bottom_up(
    pixels: &[u8],
    width: u32,
    height: u32,
) -> Result<Vec<u8>, PixelError> {
    let row = check_len(pixels, width, height)?;
    let mut out = vec![0u8; pixels.len()];
    if row == 0 || pixels.is_empty() {
        return Ok(out);
    }

    for (y, src_row) in pixels.chunks_exact(row).enumerate() {
        let dst_start = (height as usize - 1 - y) * row;
        let dst_row = &mut out[dst_start..dst_start + row];
        for (src, dst) in src_row
            .chunks_exact(BYTES_PER_TEXEL)
            .zip(dst_row.chunks_exact_mut(BYTES_PER_TEXEL))
        {
            dst.copy_from_slice(&[src[1], src[2], src[3], src[0]]);
        }
    }

    Ok(out)
}

/// Inverse of [`argb_top_down_to_rgba_bottom_up`].
pub fn rgba_bottom_up_to_argb_top_down(
    pixels: &[u8],
    width: u32,
    height: u32,
) -> Result<Vec<u8>, PixelError> {
    let row = check_len(pixels, width, height)?;
    let mut out = vec![0u8; pixels.len()];
    if row == 0 || pixels.is_empty() {
        return Ok(out);
    }

    for (y, src_row) in pixels.chunks_exact(row).enumerate() {
        let dst_start = (height as usize - 1 - y) * row;
        let dst_row = &mut out[dst_start..dst_start + row];
        for (src, dst) in src_row
            .chunks_exact(BYTES_PER_TEXEL)
            .zip(dst_row.chunks_exact_mut(BYTES_PER_TEXEL))
        {
            dst.copy_from_slice(&[src[3], src[0], src[1], src[2]]);
        }
    }

    Ok(out)
}

/// Reorder top-down RGBA texels (as decoders usually produce) to top-down ARGB.
pub fn rgba_to_argb_in_place(pixels: &mut [u8]) {
    for texel in pixels.chunks_exact_mut(BYTES_PER_TEXEL) {
        texel.rotate_right(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2x2 image, texel (x, y) = A=0xA0+i, R=0x10+i, G=0x20+i, B=0x30+i with i = y*2+x.
    fn sample_argb() -> Vec<u8> {
        (0..4u8)
            .flat_map(|i| [0xA0 + i, 0x10 + i, 0x20 + i, 0x30 + i])
            .collect()
    }

    #[test]
    fn converts_channels_and_flips_rows() {
        let out = argb_top_down_to_rgba_bottom_up(&sample_argb(), 2, 2).unwrap();
        // Bottom row of the output is the top row of the input.
        assert_eq!(&out[8..12], &[0x10, 0x20, 0x30, 0xA0]);
        assert_eq!(&out[12..16], &[0x11, 0x21, 0x31, 0xA1]);
        assert_eq!(&out[0..4], &[0x12, 0x22, 0x32, 0xA2]);
        assert_eq!(&out[4..8], &[0x13, 0x23, 0x33, 0xA3]);
    }

    #[test]
    fn preserves_length() {
        let input = vec![7u8; 5 * 3 * 4];
        let out = argb_top_down_to_rgba_bottom_up(&input, 5, 3).unwrap();
        assert_eq!(out.len(), input.len());
    }

    #[test]
    fn inverse_restores_original() {
        let input: Vec<u8> = (0..(3 * 4 * 4)).map(|i| (i * 7 % 251) as u8).collect();
        let converted = argb_top_down_to_rgba_bottom_up(&input, 3, 4).unwrap();
        let restored = rgba_bottom_up_to_argb_top_down(&converted, 3, 4).unwrap();
        assert_eq!(restored, input);
    }

    #[test]
    fn single_row_only_reorders_channels() {
        let input = [1, 2, 3, 4, 5, 6, 7, 8];
        let out = argb_top_down_to_rgba_bottom_up(&input, 2, 1).unwrap();
        assert_eq!(out, vec![2, 3, 4, 1, 6, 7, 8, 5]);
    }

    #[test]
    fn empty_image_is_empty() {
        assert!(argb_top_down_to_rgba_bottom_up(&[], 0, 0).unwrap().is_empty());
        assert!(argb_top_down_to_rgba_bottom_up(&[], 4, 0).unwrap().is_empty());
    }

    #[test]
    fn wrong_length_is_reported() {
        let err = argb_top_down_to_rgba_bottom_up(&[0; 10], 2, 2).unwrap_err();
        assert_eq!(
            err,
            PixelError::LengthMismatch {
                width: 2,
                height: 2,
                expected: 16,
                actual: 10
            }
        );
    }

    #[test]
    fn rgba_to_argb_rotates_each_texel() {
        let mut px = [1, 2, 3, 4, 5, 6, 7, 8];
        rgba_to_argb_in_place(&mut px);
        assert_eq!(px, [4, 1, 2, 3, 8, 5, 6, 7]);
    }
}
