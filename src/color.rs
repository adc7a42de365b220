// Copyright (c) the jp2-decode authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Color-space normalization applied after decode.
//!
//! The engine's classification is unreliable for some producers, so the
//! pipeline first corrects the tag, then converts sYCC samples to RGB and
//! applies any embedded ICC profile.

use crate::types::{ColorSpace, Component, DecodedImage};

/// Normalizes a freshly decoded image in place: fixes the color-space tag,
/// converts sYCC to RGB, and applies (then removes) the embedded ICC
/// profile. Never fails; steps that cannot run log a warning and leave the
/// samples as decoded.
pub(crate) fn normalize(image: &mut DecodedImage) {
    classify(image);

    if image.color_space == ColorSpace::Sycc {
        sycc_to_rgb(image);
    }

    // The profile is consumed here on every path so it cannot be applied
    // twice or linger on the image.
    if let Some(profile) = image.icc_profile.take() {
        #[cfg(feature = "cms-lcms2")]
        crate::cms::apply_icc_profile(image, &profile);
        #[cfg(not(feature = "cms-lcms2"))]
        {
            let _ = profile;
            log::warn!("embedded icc profile ignored: built without cms-lcms2");
        }
    }
}

/// Corrects the engine's color-space tag.
///
/// A 3-component image with square reference sampling and subsampled
/// chroma is sYCC regardless of the tag; everything else the engine
/// numbers at or below GRAY (UNKNOWN, UNSPECIFIED, SRGB, GRAY) is treated
/// as grayscale, matching the decoder this pipeline replaced.
fn classify(image: &mut DecodedImage) {
    let comps = &image.components;
    if image.color_space != ColorSpace::Sycc
        && comps.len() == 3
        && comps[0].dx == comps[0].dy
        && comps[1].dx != 1
    {
        image.color_space = ColorSpace::Sycc;
    } else if image.color_space.is_gray_or_unspecified() {
        image.color_space = ColorSpace::Gray;
    }
}

/// Standard sYCC triplet conversion, chroma centered on `1 << (prec - 1)`
/// and channels clamped to `(1 << prec) - 1`.
fn convert_triplet(y: i32, cb: i32, cr: i32, offset: i32, upb: i32) -> (i32, i32, i32) {
    let cb = cb - offset;
    let cr = cr - offset;
    let r = y + (1.402 * cr as f32) as i32;
    let g = y - (0.344 * cb as f32 + 0.714 * cr as f32) as i32;
    let b = y + (1.772 * cb as f32) as i32;
    (r.clamp(0, upb), g.clamp(0, upb), b.clamp(0, upb))
}

/// Converts the planar sYCC components to RGB, preserving the planar
/// layout. 4:4:4 converts in place; 4:2:2 and 4:2:0 upsample the chroma
/// planes to full resolution first. Other sampling patterns are left
/// unconverted with a warning.
fn sycc_to_rgb(image: &mut DecodedImage) {
    if image.components.len() != 3 {
        log::warn!(
            "sycc image with {} components left unconverted",
            image.components.len()
        );
        return;
    }
    let prec = image.components[0].precision;
    if prec == 0 || prec > 31 {
        log::warn!("sycc image with precision {prec} left unconverted");
        return;
    }
    let offset = 1i32 << (prec - 1);
    let upb = (1i32 << prec) - 1;

    let sampling = (
        image.components[0].dx,
        image.components[0].dy,
        image.components[1].dx,
        image.components[1].dy,
        image.components[2].dx,
        image.components[2].dy,
    );
    let converted = match sampling {
        (1, 1, 1, 1, 1, 1) => sycc444_to_rgb(image, offset, upb),
        (1, 1, 2, 1, 2, 1) | (1, 1, 2, 2, 2, 2) => sycc_upsample_to_rgb(image, offset, upb),
        _ => {
            log::warn!("unsupported sycc sampling {sampling:?}, left unconverted");
            false
        }
    };
    if converted {
        image.color_space = ColorSpace::Srgb;
    }
}

fn sycc444_to_rgb(image: &mut DecodedImage, offset: i32, upb: i32) -> bool {
    let pixels = image.components[0].data.len();
    if image.components[1].data.len() != pixels || image.components[2].data.len() != pixels {
        log::warn!("sycc 4:4:4 planes differ in size, left unconverted");
        return false;
    }
    let (luma, chroma) = image.components.split_at_mut(1);
    let (cb_comp, cr_comp) = chroma.split_at_mut(1);
    let y = &mut luma[0].data;
    let cb = &mut cb_comp[0].data;
    let cr = &mut cr_comp[0].data;
    for i in 0..pixels {
        let (r, g, b) = convert_triplet(y[i], cb[i], cr[i], offset, upb);
        y[i] = r;
        cb[i] = g;
        cr[i] = b;
    }
    true
}

fn sycc_upsample_to_rgb(image: &mut DecodedImage, offset: i32, upb: i32) -> bool {
    let width = image.components[0].width as usize;
    let height = image.components[0].height as usize;
    let chroma_w = image.components[1].width as usize;
    let chroma_h = image.components[1].height as usize;
    let dx = image.components[1].dx as usize;
    let dy = image.components[1].dy as usize;

    if chroma_w == 0
        || chroma_h == 0
        || image.components[0].data.len() != width * height
        || image.components[1].data.len() != chroma_w * chroma_h
        || image.components[2].data.len() != chroma_w * chroma_h
        || image.components[2].width as usize != chroma_w
        || image.components[2].height as usize != chroma_h
    {
        log::warn!("sycc chroma planes inconsistent with geometry, left unconverted");
        return false;
    }

    let y = &image.components[0].data;
    let cb = &image.components[1].data;
    let cr = &image.components[2].data;
    let mut red = vec![0i32; width * height];
    let mut green = vec![0i32; width * height];
    let mut blue = vec![0i32; width * height];

    for row in 0..height {
        let chroma_row = (row / dy).min(chroma_h - 1);
        for col in 0..width {
            let chroma_col = (col / dx).min(chroma_w - 1);
            let i = row * width + col;
            let ci = chroma_row * chroma_w + chroma_col;
            let (r, g, b) = convert_triplet(y[i], cb[ci], cr[ci], offset, upb);
            red[i] = r;
            green[i] = g;
            blue[i] = b;
        }
    }

    let (ref_width, ref_height, ref_dx, ref_dy) = {
        let comp0 = &image.components[0];
        (comp0.width, comp0.height, comp0.dx, comp0.dy)
    };
    for (index, data) in [(1usize, green), (2usize, blue)] {
        let comp = &mut image.components[index];
        comp.width = ref_width;
        comp.height = ref_height;
        comp.dx = ref_dx;
        comp.dy = ref_dy;
        comp.data = data;
    }
    image.components[0].data = red;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(width: u32, height: u32, dx: u32, dy: u32, data: Vec<i32>) -> Component {
        Component {
            width,
            height,
            precision: 8,
            dx,
            dy,
            signed: false,
            data,
        }
    }

    fn image(components: Vec<Component>, color_space: ColorSpace) -> DecodedImage {
        DecodedImage {
            components,
            color_space,
            icc_profile: None,
        }
    }

    #[test]
    fn subsampled_three_component_image_is_reclassified_and_converted() {
        // 2x2 luma with a single shared chroma sample (4:2:0).
        let mut img = image(
            vec![
                component(2, 2, 1, 1, vec![100, 110, 120, 130]),
                component(1, 1, 2, 2, vec![128]),
                component(1, 1, 2, 2, vec![128]),
            ],
            ColorSpace::Unspecified,
        );
        normalize(&mut img);
        assert_eq!(img.color_space, ColorSpace::Srgb);
        // Neutral chroma: every channel equals the luma plane.
        assert_eq!(img.components[0].data, vec![100, 110, 120, 130]);
        assert_eq!(img.components[1].data, vec![100, 110, 120, 130]);
        assert_eq!(img.components[2].data, vec![100, 110, 120, 130]);
        // Chroma planes were promoted to full resolution.
        assert_eq!(img.components[1].width, 2);
        assert_eq!(img.components[1].dx, 1);
    }

    #[test]
    fn genuine_rgb_image_is_not_converted() {
        let planes = vec![
            component(2, 1, 1, 1, vec![10, 20]),
            component(2, 1, 1, 1, vec![30, 40]),
            component(2, 1, 1, 1, vec![50, 60]),
        ];
        let mut img = image(planes.clone(), ColorSpace::Srgb);
        normalize(&mut img);
        for (plane, original) in img.components.iter().zip(&planes) {
            assert_eq!(plane.data, original.data);
        }
    }

    #[test]
    fn tagged_sycc_444_converts_in_place() {
        let mut img = image(
            vec![
                component(1, 1, 1, 1, vec![100]),
                component(1, 1, 1, 1, vec![178]), // cb = +50
                component(1, 1, 1, 1, vec![128]), // cr = 0
            ],
            ColorSpace::Sycc,
        );
        normalize(&mut img);
        assert_eq!(img.color_space, ColorSpace::Srgb);
        assert_eq!(img.components[0].data, vec![100]); // r = y
        assert_eq!(img.components[1].data, vec![83]); // g = 100 - trunc(17.2)
        assert_eq!(img.components[2].data, vec![188]); // b = 100 + trunc(88.6)
    }

    #[test]
    fn conversion_clamps_to_the_sample_range() {
        let mut img = image(
            vec![
                component(1, 1, 1, 1, vec![250]),
                component(1, 1, 1, 1, vec![255]),
                component(1, 1, 1, 1, vec![255]),
            ],
            ColorSpace::Sycc,
        );
        normalize(&mut img);
        assert_eq!(img.components[0].data, vec![255]);
        assert_eq!(img.components[2].data, vec![255]);
        assert!(img.components[1].data[0] >= 0);
    }

    #[test]
    fn single_component_image_is_reclassified_gray() {
        let mut img = image(
            vec![component(2, 2, 1, 1, vec![1, 2, 3, 4])],
            ColorSpace::Unspecified,
        );
        normalize(&mut img);
        assert_eq!(img.color_space, ColorSpace::Gray);
        assert_eq!(img.components[0].data, vec![1, 2, 3, 4]);
    }

    #[test]
    fn icc_profile_is_always_consumed() {
        let mut img = image(
            vec![component(1, 1, 1, 1, vec![5])],
            ColorSpace::Gray,
        );
        // Not a parseable profile: application degrades to "ignored" but
        // the bytes are still dropped from the image.
        img.icc_profile = Some(vec![0u8; 16]);
        normalize(&mut img);
        assert!(img.icc_profile.is_none());
        assert_eq!(img.components[0].data, vec![5]);
    }

    #[test]
    fn unsupported_sampling_left_unconverted() {
        let mut img = image(
            vec![
                component(4, 4, 1, 1, vec![0; 16]),
                component(1, 1, 4, 4, vec![128]),
                component(1, 1, 4, 4, vec![128]),
            ],
            ColorSpace::Sycc,
        );
        normalize(&mut img);
        assert_eq!(img.color_space, ColorSpace::Sycc);
        assert_eq!(img.components[1].data, vec![128]);
    }
}
