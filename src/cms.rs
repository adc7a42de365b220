// Copyright (c) the jp2-decode authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! ICC profile application via Little CMS (lcms2).
//!
//! Compiled behind the `cms-lcms2` feature. Failures never propagate: an
//! unusable profile degrades to "profile ignored" with a warning, and the
//! decoded samples are left untouched.

#[cfg(feature = "cms-lcms2")]
mod lcms2_cms {
    use lcms2::{Intent, PixelFormat, Profile, Transform};

    use crate::types::{ColorSpace, DecodedImage};

    /// Applies an embedded ICC profile, converting the image to sRGB in
    /// place. Only 8-bit unsigned images with full-resolution planes are
    /// transformed; anything else is skipped with a warning.
    pub(crate) fn apply_icc_profile(image: &mut DecodedImage, icc: &[u8]) {
        if let Err(reason) = try_apply(image, icc) {
            log::warn!("icc profile ignored: {reason}");
        }
    }

    fn try_apply(image: &mut DecodedImage, icc: &[u8]) -> Result<(), String> {
        let profile =
            Profile::new_icc(icc).map_err(|e| format!("lcms2 failed to parse profile: {e}"))?;
        let intent = rendering_intent(icc);

        let pixels = image.pixel_count();
        let comp0 = &image.components[0];
        if comp0.precision > 8 {
            return Err(format!("{}-bit samples unsupported", comp0.precision));
        }
        for comp in &image.components {
            if comp.signed {
                return Err("signed samples unsupported".into());
            }
            if comp.data.len() != pixels {
                return Err("subsampled planes unsupported".into());
            }
        }

        if image.components.len() >= 3 {
            transform_rgb(image, &profile, intent, pixels)
        } else {
            transform_gray(image, &profile, intent, pixels)
        }
    }

    /// RGB -> sRGB, in place over the first three planes.
    fn transform_rgb(
        image: &mut DecodedImage,
        profile: &Profile,
        intent: Intent,
        pixels: usize,
    ) -> Result<(), String> {
        let srgb = Profile::new_srgb();
        let transform: Transform<[u8; 3], [u8; 3]> = Transform::new(
            profile,
            PixelFormat::RGB_8,
            &srgb,
            PixelFormat::RGB_8,
            intent,
        )
        .map_err(|e| format!("lcms2 failed to create transform: {e}"))?;

        let mut interleaved: Vec<[u8; 3]> = (0..pixels)
            .map(|i| {
                [
                    image.components[0].data[i] as u8,
                    image.components[1].data[i] as u8,
                    image.components[2].data[i] as u8,
                ]
            })
            .collect();
        transform.transform_in_place(&mut interleaved);

        for (i, rgb) in interleaved.iter().enumerate() {
            image.components[0].data[i] = rgb[0] as i32;
            image.components[1].data[i] = rgb[1] as i32;
            image.components[2].data[i] = rgb[2] as i32;
        }
        image.color_space = ColorSpace::Srgb;
        Ok(())
    }

    /// Gray -> sRGB, expanding the single plane to three.
    fn transform_gray(
        image: &mut DecodedImage,
        profile: &Profile,
        intent: Intent,
        pixels: usize,
    ) -> Result<(), String> {
        let srgb = Profile::new_srgb();
        let transform: Transform<u8, [u8; 3]> = Transform::new(
            profile,
            PixelFormat::GRAY_8,
            &srgb,
            PixelFormat::RGB_8,
            intent,
        )
        .map_err(|e| format!("lcms2 failed to create transform: {e}"))?;

        let src: Vec<u8> = image.components[0]
            .data
            .iter()
            .map(|&sample| sample as u8)
            .collect();
        let mut dst = vec![[0u8; 3]; pixels];
        transform.transform_pixels(&src, &mut dst);

        let mut green = image.components[0].clone();
        let mut blue = image.components[0].clone();
        for i in 0..pixels {
            image.components[0].data[i] = dst[i][0] as i32;
            green.data[i] = dst[i][1] as i32;
            blue.data[i] = dst[i][2] as i32;
        }
        image.components.truncate(1);
        image.components.push(green);
        image.components.push(blue);
        image.color_space = ColorSpace::Srgb;
        Ok(())
    }

    /// Extracts the rendering intent from the ICC header (big-endian u32
    /// at bytes 64-67).
    fn rendering_intent(icc: &[u8]) -> Intent {
        if icc.len() >= 68 {
            match u32::from_be_bytes([icc[64], icc[65], icc[66], icc[67]]) {
                0 => Intent::Perceptual,
                1 => Intent::RelativeColorimetric,
                2 => Intent::Saturation,
                3 => Intent::AbsoluteColorimetric,
                _ => Intent::RelativeColorimetric,
            }
        } else {
            Intent::Perceptual
        }
    }
}

#[cfg(feature = "cms-lcms2")]
pub(crate) use lcms2_cms::apply_icc_profile;
