// Copyright (c) the jp2-decode authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Image types shared across the decode pipeline.

/// Color space classification of a decoded image.
///
/// Discriminants mirror OpenJPEG's `OPJ_COLOR_SPACE` numbering
/// (UNKNOWN = -1, UNSPECIFIED = 0, SRGB = 1, GRAY = 2, SYCC = 3,
/// EYCC = 4, CMYK = 5); the grayscale reclassification heuristic in
/// `color` depends on that ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ColorSpace {
    /// The engine could not classify the image.
    Unknown = -1,
    /// The codestream carried no color specification.
    Unspecified = 0,
    /// Standard RGB.
    Srgb = 1,
    /// Single-luma grayscale.
    Gray = 2,
    /// Standard YCC (luma + subsampled chroma), needs conversion for display.
    Sycc = 3,
    /// Extended YCC.
    Eycc = 4,
    /// Four-component CMYK.
    Cmyk = 5,
}

impl ColorSpace {
    /// True for the classifications OpenJPEG numbers at or below `GRAY`.
    pub(crate) fn is_gray_or_unspecified(self) -> bool {
        (self as i32) <= ColorSpace::Gray as i32
    }
}

/// One color/luma/chroma channel of a decoded image.
#[derive(Debug, Clone)]
pub struct Component {
    /// Component width in samples.
    pub width: u32,
    /// Component height in samples.
    pub height: u32,
    /// Bits per sample.
    pub precision: u32,
    /// Horizontal subsampling factor relative to the reference grid.
    pub dx: u32,
    /// Vertical subsampling factor relative to the reference grid.
    pub dy: u32,
    /// Whether samples are signed.
    pub signed: bool,
    /// Row-major samples, `width * height` entries.
    pub data: Vec<i32>,
}

/// A decoded image copied out of the engine: planar component samples plus
/// whole-image color metadata.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    /// Component planes, component-major.
    pub components: Vec<Component>,
    /// Whole-image color space classification.
    pub color_space: ColorSpace,
    /// Embedded ICC profile bytes, if the codestream carried one. Consumed
    /// (and always removed) by color normalization.
    pub icc_profile: Option<Vec<u8>>,
}

impl DecodedImage {
    /// Geometry summary taken from component 0, for pre-sizing destination
    /// buffers before packing.
    pub fn descriptor(&self) -> ImageDescriptor {
        let comp0 = &self.components[0];
        ImageDescriptor {
            width: comp0.width,
            height: comp0.height,
            precision: comp0.precision,
            component_count: self.components.len() as u32,
        }
    }

    /// Pixel count of the reference grid (`width * height` of component 0).
    pub fn pixel_count(&self) -> usize {
        let comp0 = &self.components[0];
        comp0.width as usize * comp0.height as usize
    }
}

/// Lightweight geometry summary produced by header-only parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDescriptor {
    /// Width of component 0 in pixels.
    pub width: u32,
    /// Height of component 0 in pixels.
    pub height: u32,
    /// Bits per sample of component 0.
    pub precision: u32,
    /// Number of components in the codestream.
    pub component_count: u32,
}

/// The three fixed output layouts, selected from the image itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    /// One 32-bit word per pixel: `(a << 24) | (r << 16) | (g << 8) | b`.
    Argb32,
    /// One 16-bit word per pixel, raw component-0 sample.
    Gray16,
    /// One byte per pixel, raw component-0 sample.
    Gray8,
}

/// A packed output buffer; length always equals `width * height`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PixelBuffer {
    Argb32(Vec<u32>),
    Gray16(Vec<u16>),
    Gray8(Vec<u8>),
}

impl PixelBuffer {
    /// Number of pixels in the buffer.
    pub fn len(&self) -> usize {
        match self {
            PixelBuffer::Argb32(words) => words.len(),
            PixelBuffer::Gray16(words) => words.len(),
            PixelBuffer::Gray8(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Layout of the packed data.
    pub fn layout(&self) -> PixelLayout {
        match self {
            PixelBuffer::Argb32(_) => PixelLayout::Argb32,
            PixelBuffer::Gray16(_) => PixelLayout::Gray16,
            PixelBuffer::Gray8(_) => PixelLayout::Gray8,
        }
    }
}
