// Copyright (c) the jp2-decode authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Decode orchestration around the OpenJPEG codec.
//!
//! The orchestrator owns three scoped resources per call: the in-memory
//! stream, the codec, and the raw engine image. Each is an RAII guard, so
//! every failure path releases everything acquired up to that point
//! exactly once, with no cleanup branch to forget.

use std::ffi::{CStr, c_char, c_void};
use std::mem::MaybeUninit;
use std::ptr;

use openjpeg_sys as sys;

use crate::color;
use crate::conversions;
use crate::error::{Error, Result};
use crate::stream::MemoryStream;
use crate::types::{ColorSpace, Component, DecodedImage, ImageDescriptor, PixelBuffer};

/// Codestream container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecFormat {
    /// Raw JPEG 2000 codestream (SOC marker first).
    J2k,
    /// JP2 container (signature box first).
    Jp2,
}

/// `jP  ` signature box that opens every JP2 container.
const JP2_SIGNATURE: [u8; 12] = [
    0x00, 0x00, 0x00, 0x0C, b'j', b'P', b' ', b' ', 0x0D, 0x0A, 0x87, 0x0A,
];
/// SOC marker followed by SIZ, the start of a raw codestream.
const J2K_SOC: [u8; 4] = [0xFF, 0x4F, 0xFF, 0x51];

impl CodecFormat {
    /// Sniffs the container format from the first bytes of the input.
    /// Unrecognized data falls back to JP2; the header read rejects it.
    pub fn detect(bytes: &[u8]) -> CodecFormat {
        if bytes.starts_with(&J2K_SOC) {
            CodecFormat::J2k
        } else {
            CodecFormat::Jp2
        }
    }

    /// True when the input starts with either recognized signature.
    pub fn matches_signature(bytes: &[u8]) -> bool {
        bytes.starts_with(&JP2_SIGNATURE) || bytes.starts_with(&J2K_SOC)
    }

    fn to_opj(self) -> sys::CODEC_FORMAT {
        match self {
            CodecFormat::J2k => sys::CODEC_FORMAT::OPJ_CODEC_J2K,
            CodecFormat::Jp2 => sys::CODEC_FORMAT::OPJ_CODEC_JP2,
        }
    }
}

/// Per-call decode configuration.
///
/// A fresh engine parameter block is built from this value on every call,
/// so no option state can leak between calls.
#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    /// Container format; `None` sniffs it from the input bytes.
    pub format: Option<CodecFormat>,
    /// Number of highest resolution levels to discard (0 = full size).
    pub reduce_factor: u32,
    /// Maximum number of quality layers to decode (0 = all).
    pub quality_layers: u32,
}

/// Scoped handle over the engine codec; dropped exactly once on any path.
struct Codec(*mut sys::opj_codec_t);

impl Codec {
    fn new(format: CodecFormat, options: &DecodeOptions) -> Result<Self> {
        let raw = unsafe { sys::opj_create_decompress(format.to_opj()) };
        if raw.is_null() {
            return Err(Error::DecoderSetupFailed);
        }
        let codec = Codec(raw);

        // Fresh default parameters per call.
        let mut params = unsafe {
            let mut uninit = MaybeUninit::<sys::opj_dparameters_t>::zeroed();
            sys::opj_set_default_decoder_parameters(uninit.as_mut_ptr());
            uninit.assume_init()
        };
        params.cp_reduce = options.reduce_factor;
        params.cp_layer = options.quality_layers;
        if unsafe { sys::opj_setup_decoder(codec.as_ptr(), &mut params) } == 0 {
            log::error!("decoder setup failed");
            return Err(Error::DecoderSetupFailed);
        }

        unsafe {
            sys::opj_set_info_handler(codec.as_ptr(), Some(forward_info), ptr::null_mut());
            sys::opj_set_warning_handler(codec.as_ptr(), Some(forward_warning), ptr::null_mut());
            sys::opj_set_error_handler(codec.as_ptr(), Some(forward_error), ptr::null_mut());
        }
        Ok(codec)
    }

    fn as_ptr(&self) -> *mut sys::opj_codec_t {
        self.0
    }
}

impl Drop for Codec {
    fn drop(&mut self) {
        unsafe { sys::opj_destroy_codec(self.0) };
    }
}

/// Scoped handle over the engine's `opj_image_t`; destroyed exactly once.
struct RawImage(*mut sys::opj_image_t);

impl RawImage {
    fn as_ptr(&self) -> *mut sys::opj_image_t {
        self.0
    }
}

impl Drop for RawImage {
    fn drop(&mut self) {
        unsafe { sys::opj_image_destroy(self.0) };
    }
}

unsafe extern "C" fn forward_info(msg: *const c_char, _client: *mut c_void) {
    if let Some(text) = message_text(msg) {
        log::info!("openjpeg: {text}");
    }
}

unsafe extern "C" fn forward_warning(msg: *const c_char, _client: *mut c_void) {
    if let Some(text) = message_text(msg) {
        log::warn!("openjpeg: {text}");
    }
}

unsafe extern "C" fn forward_error(msg: *const c_char, _client: *mut c_void) {
    if let Some(text) = message_text(msg) {
        log::error!("openjpeg: {text}");
    }
}

fn message_text(msg: *const c_char) -> Option<String> {
    if msg.is_null() {
        return None;
    }
    let text = unsafe { CStr::from_ptr(msg) }.to_string_lossy();
    let trimmed = text.trim_end();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Synchronous JPEG 2000 decoder over in-memory codestreams.
///
/// One call runs start to finish with no shared state; the input bytes are
/// borrowed only for the duration of the call.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    options: DecodeOptions,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: DecodeOptions) -> Self {
        Self { options }
    }

    fn format_for(&self, bytes: &[u8]) -> CodecFormat {
        self.options
            .format
            .unwrap_or_else(|| CodecFormat::detect(bytes))
    }

    /// Parses only the codestream main header and returns the geometry of
    /// component 0. All engine resources are released before returning.
    pub fn parse_header(&self, bytes: &[u8]) -> Result<ImageDescriptor> {
        let stream = MemoryStream::new(bytes)?;
        let codec = Codec::new(self.format_for(bytes), &self.options)?;
        let image = read_header(&codec, &stream)?;
        descriptor_of(&image)
        // stream, codec and image are dropped here in reverse order.
    }

    /// Decodes the whole codestream and normalizes its color space,
    /// returning the planar image for callers that pack into their own
    /// buffers.
    pub fn decode(&self, bytes: &[u8]) -> Result<DecodedImage> {
        let stream = MemoryStream::new(bytes)?;
        let codec = Codec::new(self.format_for(bytes), &self.options)?;
        let image = read_header(&codec, &stream)?;

        let decoded =
            unsafe { sys::opj_decode(codec.as_ptr(), stream.as_ptr(), image.as_ptr()) } != 0;
        // Always invoked so the codec flushes, but both calls must report
        // success independently.
        let finished = unsafe { sys::opj_end_decompress(codec.as_ptr(), stream.as_ptr()) } != 0;
        if !decoded || !finished {
            log::error!("codestream decode failed (decode: {decoded}, flush: {finished})");
            return Err(Error::DecodeFailed);
        }

        let mut owned = take_image(image)?;
        drop(codec);
        drop(stream);

        color::normalize(&mut owned);
        Ok(owned)
    }

    /// Decodes the whole codestream and packs it into the layout selected
    /// by the image: ARGB32, Gray16 or Gray8.
    pub fn decode_full(&self, bytes: &[u8]) -> Result<PixelBuffer> {
        let image = self.decode(bytes)?;
        conversions::pack(&image)
    }
}

fn read_header(codec: &Codec, stream: &MemoryStream<'_>) -> Result<RawImage> {
    let mut raw: *mut sys::opj_image_t = ptr::null_mut();
    let ok = unsafe { sys::opj_read_header(stream.as_ptr(), codec.as_ptr(), &mut raw) } != 0;
    if !ok || raw.is_null() {
        // The engine may allocate an image even when the header read fails.
        if !raw.is_null() {
            unsafe { sys::opj_image_destroy(raw) };
        }
        return Err(Error::HeaderReadFailed);
    }
    Ok(RawImage(raw))
}

fn descriptor_of(image: &RawImage) -> Result<ImageDescriptor> {
    let raw = unsafe { &*image.as_ptr() };
    if raw.numcomps == 0 || raw.comps.is_null() {
        return Err(Error::HeaderReadFailed);
    }
    let comp0 = unsafe { &*raw.comps };
    Ok(ImageDescriptor {
        width: comp0.w,
        height: comp0.h,
        precision: comp0.prec,
        component_count: raw.numcomps,
    })
}

/// Copies the engine image into owned planes; the raw image is destroyed
/// when the guard drops at the end of this function, success or not.
fn take_image(image: RawImage) -> Result<DecodedImage> {
    let raw = unsafe { &*image.as_ptr() };
    if raw.numcomps == 0 || raw.comps.is_null() {
        return Err(Error::DecodeFailed);
    }
    let raw_comps = unsafe { std::slice::from_raw_parts(raw.comps, raw.numcomps as usize) };

    let mut components = Vec::with_capacity(raw_comps.len());
    for comp in raw_comps {
        if comp.data.is_null() {
            return Err(Error::DecodeFailed);
        }
        let samples = comp.w as usize * comp.h as usize;
        let data = unsafe { std::slice::from_raw_parts(comp.data, samples) }.to_vec();
        components.push(Component {
            width: comp.w,
            height: comp.h,
            precision: comp.prec,
            dx: comp.dx,
            dy: comp.dy,
            signed: comp.sgnd != 0,
            data,
        });
    }

    let icc_profile = if raw.icc_profile_buf.is_null() || raw.icc_profile_len == 0 {
        None
    } else {
        let profile =
            unsafe { std::slice::from_raw_parts(raw.icc_profile_buf, raw.icc_profile_len as usize) };
        Some(profile.to_vec())
    };

    Ok(DecodedImage {
        components,
        color_space: color_space_from_opj(raw.color_space),
        icc_profile,
    })
}

fn color_space_from_opj(raw: sys::COLOR_SPACE) -> ColorSpace {
    match raw {
        sys::COLOR_SPACE::OPJ_CLRSPC_SRGB => ColorSpace::Srgb,
        sys::COLOR_SPACE::OPJ_CLRSPC_GRAY => ColorSpace::Gray,
        sys::COLOR_SPACE::OPJ_CLRSPC_SYCC => ColorSpace::Sycc,
        sys::COLOR_SPACE::OPJ_CLRSPC_EYCC => ColorSpace::Eycc,
        sys::COLOR_SPACE::OPJ_CLRSPC_CMYK => ColorSpace::Cmyk,
        sys::COLOR_SPACE::OPJ_CLRSPC_UNSPECIFIED => ColorSpace::Unspecified,
        _ => ColorSpace::Unknown,
    }
}

#[cfg(test)]
#[path = "decoder_tests.rs"]
mod tests;
