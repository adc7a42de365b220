// Copyright (c) the jp2-decode authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Error type shared across the decode pipeline.

use thiserror::Error;

/// Failures surfaced by the decode pipeline.
///
/// Every variant maps to exactly one failing stage; no partial output is
/// ever returned alongside an error, and all engine resources acquired
/// before the failure are released before the error is returned.
#[derive(Debug, Error)]
pub enum Error {
    /// The in-memory stream over the input bytes could not be created.
    #[error("could not create a stream over the input buffer")]
    StreamCreationFailed,
    /// The decoding engine could not be created or configured.
    #[error("decoder setup failed")]
    DecoderSetupFailed,
    /// The engine rejected the codestream main header.
    #[error("could not read the codestream header")]
    HeaderReadFailed,
    /// The engine failed to decode the codestream body.
    #[error("could not decode the codestream")]
    DecodeFailed,
    /// A destination buffer does not match the image's pixel count.
    #[error("destination holds {actual} samples but the image has {expected}")]
    BufferSizeMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
