// Copyright (c) the jp2-decode authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Packing of decoded component planes into caller-facing pixel buffers.
//!
//! The layout is selected from the image itself, never by the caller:
//! three or more components pack as ARGB32, fewer pack as Gray16 when the
//! precision exceeds 8 bits and as Gray8 otherwise. Destination sizes are
//! validated before a single sample is written.

use crate::error::{Error, Result};
use crate::types::{DecodedImage, PixelBuffer, PixelLayout};

/// Fully opaque alpha used when the image has no fourth component.
const OPAQUE: u32 = 0xFF;

/// Selects the output layout for an image.
pub fn pixel_layout(image: &DecodedImage) -> PixelLayout {
    if image.components.len() >= 3 {
        PixelLayout::Argb32
    } else if image.components[0].precision > 8 {
        PixelLayout::Gray16
    } else {
        PixelLayout::Gray8
    }
}

/// Validates that the destination and every source plane used by the pack
/// hold exactly one sample per pixel of the reference grid.
fn check_sizes(image: &DecodedImage, planes: usize, actual: usize) -> Result<usize> {
    let expected = image.pixel_count();
    if actual != expected {
        return Err(Error::BufferSizeMismatch { expected, actual });
    }
    for comp in image.components.iter().take(planes) {
        if comp.data.len() != expected {
            return Err(Error::BufferSizeMismatch {
                expected,
                actual: comp.data.len(),
            });
        }
    }
    Ok(expected)
}

/// Packs components 0..=2 (plus component 3 as alpha when present) into
/// one `(a << 24) | (r << 16) | (g << 8) | b` word per pixel, each channel
/// truncated to 8 bits. `dst` must hold exactly `width * height` words.
pub fn pack_argb32(image: &DecodedImage, dst: &mut [u32]) -> Result<()> {
    let has_alpha = image.components.len() >= 4;
    let pixels = check_sizes(image, if has_alpha { 4 } else { 3 }, dst.len())?;

    let red = &image.components[0].data;
    let green = &image.components[1].data;
    let blue = &image.components[2].data;
    let alpha = has_alpha.then(|| &image.components[3].data);

    for i in 0..pixels {
        let a = alpha.map_or(OPAQUE, |plane| plane[i] as u8 as u32);
        let r = red[i] as u8 as u32;
        let g = green[i] as u8 as u32;
        let b = blue[i] as u8 as u32;
        dst[i] = (a << 24) | (r << 16) | (g << 8) | b;
    }
    Ok(())
}

/// Packs component 0 into one 16-bit word per pixel, truncating without
/// scaling. `dst` must hold exactly `width * height` words.
pub fn pack_gray16(image: &DecodedImage, dst: &mut [u16]) -> Result<()> {
    let pixels = check_sizes(image, 1, dst.len())?;
    let gray = &image.components[0].data;
    for i in 0..pixels {
        dst[i] = gray[i] as u16;
    }
    Ok(())
}

/// Packs component 0 into one byte per pixel, truncated to 8 bits.
/// `dst` must hold exactly `width * height` bytes.
pub fn pack_gray8(image: &DecodedImage, dst: &mut [u8]) -> Result<()> {
    let pixels = check_sizes(image, 1, dst.len())?;
    let gray = &image.components[0].data;
    for i in 0..pixels {
        dst[i] = gray[i] as u8;
    }
    Ok(())
}

/// Allocates an exact-size buffer for the image's layout and packs into it.
pub fn pack(image: &DecodedImage) -> Result<PixelBuffer> {
    let pixels = image.pixel_count();
    match pixel_layout(image) {
        PixelLayout::Argb32 => {
            let mut dst = vec![0u32; pixels];
            pack_argb32(image, &mut dst)?;
            Ok(PixelBuffer::Argb32(dst))
        }
        PixelLayout::Gray16 => {
            let mut dst = vec![0u16; pixels];
            pack_gray16(image, &mut dst)?;
            Ok(PixelBuffer::Gray16(dst))
        }
        PixelLayout::Gray8 => {
            let mut dst = vec![0u8; pixels];
            pack_gray8(image, &mut dst)?;
            Ok(PixelBuffer::Gray8(dst))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColorSpace, Component};

    fn component(width: u32, height: u32, precision: u32, data: Vec<i32>) -> Component {
        Component {
            width,
            height,
            precision,
            dx: 1,
            dy: 1,
            signed: false,
            data,
        }
    }

    fn rgb_image(width: u32, height: u32) -> DecodedImage {
        let n = (width * height) as usize;
        DecodedImage {
            components: vec![
                component(width, height, 8, (0..n as i32).collect()),
                component(width, height, 8, vec![0x20; n]),
                component(width, height, 8, vec![0x30; n]),
            ],
            color_space: ColorSpace::Srgb,
            icc_profile: None,
        }
    }

    #[test]
    fn three_components_pack_as_opaque_argb32() {
        let image = rgb_image(4, 3);
        let packed = pack(&image).unwrap();
        assert_eq!(packed.layout(), PixelLayout::Argb32);
        assert_eq!(packed.len(), 12);
        let PixelBuffer::Argb32(words) = packed else {
            unreachable!()
        };
        for (i, word) in words.iter().enumerate() {
            assert_eq!(word >> 24, 0xFF, "alpha must default to opaque");
            assert_eq!(*word & 0x00FF_FFFF, ((i as u32) << 16) | 0x2030);
        }
    }

    #[test]
    fn fourth_component_supplies_alpha_truncated_to_8_bits() {
        let mut image = rgb_image(2, 1);
        image
            .components
            .push(component(2, 1, 8, vec![0x180, 0x7F])); // 0x180 truncates to 0x80
        let mut dst = [0u32; 2];
        pack_argb32(&image, &mut dst).unwrap();
        assert_eq!(dst[0] >> 24, 0x80);
        assert_eq!(dst[1] >> 24, 0x7F);
    }

    #[test]
    fn high_precision_single_component_packs_as_gray16_losslessly() {
        let samples: Vec<i32> = vec![0, 1, 512, 767, 1023];
        let image = DecodedImage {
            components: vec![component(5, 1, 10, samples.clone())],
            color_space: ColorSpace::Gray,
            icc_profile: None,
        };
        assert_eq!(pixel_layout(&image), PixelLayout::Gray16);
        let PixelBuffer::Gray16(words) = pack(&image).unwrap() else {
            unreachable!()
        };
        let roundtrip: Vec<i32> = words.iter().map(|&w| w as i32).collect();
        assert_eq!(roundtrip, samples, "10-bit samples fit 16 bits unchanged");
    }

    #[test]
    fn low_precision_single_component_packs_as_gray8() {
        let image = DecodedImage {
            components: vec![component(2, 2, 8, vec![0, 127, 255, 300])],
            color_space: ColorSpace::Gray,
            icc_profile: None,
        };
        let PixelBuffer::Gray8(bytes) = pack(&image).unwrap() else {
            unreachable!()
        };
        assert_eq!(bytes, vec![0, 127, 255, 300u32 as u8]);
    }

    #[test]
    fn wrong_destination_size_is_rejected_before_any_write() {
        let image = rgb_image(3, 3);
        for wrong in [8usize, 10] {
            let mut dst = vec![0xDEAD_BEEFu32; wrong];
            let err = pack_argb32(&image, &mut dst).unwrap_err();
            assert!(matches!(
                err,
                Error::BufferSizeMismatch {
                    expected: 9,
                    actual
                } if actual == wrong
            ));
            assert!(dst.iter().all(|&w| w == 0xDEAD_BEEF), "no partial writes");
        }

        let mut short16 = vec![0u16; 8];
        assert!(matches!(
            pack_gray16(&rgb_gray(3, 3), &mut short16),
            Err(Error::BufferSizeMismatch { expected: 9, actual: 8 })
        ));
    }

    fn rgb_gray(width: u32, height: u32) -> DecodedImage {
        DecodedImage {
            components: vec![component(width, height, 12, vec![0; (width * height) as usize])],
            color_space: ColorSpace::Gray,
            icc_profile: None,
        }
    }

    #[test]
    fn undersized_source_plane_is_rejected() {
        let mut image = rgb_image(2, 2);
        image.components[1].data.truncate(3);
        let mut dst = [0u32; 4];
        assert!(matches!(
            pack_argb32(&image, &mut dst),
            Err(Error::BufferSizeMismatch { expected: 4, actual: 3 })
        ));
    }
}
