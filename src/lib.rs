// Copyright (c) the jp2-decode authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! jp2-decode - in-memory JPEG 2000 decoding on top of OpenJPEG.
//!
//! This crate feeds a byte buffer to the OpenJPEG decoding engine through
//! an in-memory stream, normalizes the color space of the decoded image,
//! and packs the component planes into one of three fixed pixel layouts
//! (ARGB32, Gray16 or Gray8). Header-only parsing is available for callers
//! that just need the image geometry.
//!
//! ```no_run
//! let bytes = std::fs::read("image.jp2").unwrap();
//! let descriptor = jp2_decode::parse_header(&bytes).unwrap();
//! println!("{}x{}", descriptor.width, descriptor.height);
//! let pixels = jp2_decode::decode_full(&bytes).unwrap();
//! assert_eq!(pixels.len(), descriptor.width as usize * descriptor.height as usize);
//! ```

mod cms;
mod color;
mod conversions;
mod decoder;
mod error;
mod stream;
mod types;

pub use conversions::{pack, pack_argb32, pack_gray8, pack_gray16, pixel_layout};
pub use decoder::{CodecFormat, DecodeOptions, Decoder};
pub use error::{Error, Result};
pub use types::*;

/// Parses only the codestream header and returns the image geometry.
pub fn parse_header(bytes: &[u8]) -> Result<ImageDescriptor> {
    Decoder::new().parse_header(bytes)
}

/// Decodes the whole codestream and packs it into a pixel buffer.
pub fn decode_full(bytes: &[u8]) -> Result<PixelBuffer> {
    Decoder::new().decode_full(bytes)
}
