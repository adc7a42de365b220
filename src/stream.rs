// Copyright (c) the jp2-decode authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! In-memory stream fed to the OpenJPEG engine.
//!
//! [`StreamCursor`] is the pure, bounds-checked cursor over a borrowed
//! byte buffer; [`MemoryStream`] wraps it in an `opj_stream_t` whose read,
//! skip and seek callbacks the engine pulls from during header parsing and
//! decoding.

use std::ffi::c_void;
use std::marker::PhantomData;

use openjpeg_sys as sys;

use crate::error::Error;

/// End-of-stream sentinel expected by the OpenJPEG read callback,
/// `(OPJ_SIZE_T)-1` in the C API.
const OPJ_EOF: usize = usize::MAX;

/// Cursor over a borrowed byte buffer.
///
/// Invariant: `0 <= pos <= data.len()` at all times. Read, skip and seek
/// never touch the buffer contents; write mutates the buffer in place.
/// Generic over ownership the way `std::io::Cursor` is, so the read-only
/// decode path borrows `&[u8]` while writers hold `&mut [u8]`.
pub(crate) struct StreamCursor<B> {
    data: B,
    pos: usize,
}

impl<B: AsRef<[u8]>> StreamCursor<B> {
    pub fn new(data: B) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn len(&self) -> usize {
        self.data.as_ref().len()
    }

    /// Copies up to `dst.len()` bytes from the current position into `dst`
    /// and advances. Returns the count copied, which may be short near the
    /// end of the buffer, or `None` once the cursor is at the end.
    pub fn read(&mut self, dst: &mut [u8]) -> Option<usize> {
        let data = self.data.as_ref();
        if self.pos >= data.len() {
            return None;
        }
        let count = dst.len().min(data.len() - self.pos);
        dst[..count].copy_from_slice(&data[self.pos..self.pos + count]);
        self.pos += count;
        Some(count)
    }

    /// Moves the cursor by `count` bytes (negative moves backwards).
    /// Overrunning either end clamps the cursor to that end and fails;
    /// the arithmetic saturates instead of wrapping.
    pub fn skip(&mut self, count: i64) -> Option<i64> {
        let len = self.len();
        let target = (self.pos as i64).saturating_add(count);
        if target < 0 {
            self.pos = 0;
            return None;
        }
        if target as u64 > len as u64 {
            self.pos = len;
            return None;
        }
        self.pos = target as usize;
        Some(count)
    }

    /// Moves the cursor to an absolute position. Past-the-end positions
    /// clamp the cursor to the end and fail.
    pub fn seek(&mut self, position: u64) -> bool {
        let len = self.len();
        if position > len as u64 {
            self.pos = len;
            return false;
        }
        self.pos = position as usize;
        true
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> StreamCursor<B> {
    /// Copies bytes from `src` into the buffer at the current position and
    /// advances; clamped at the end of the buffer like `read`. Returns the
    /// count written, or `None` once the cursor is at the end.
    pub fn write(&mut self, src: &[u8]) -> Option<usize> {
        let pos = self.pos;
        let data = self.data.as_mut();
        if pos >= data.len() {
            return None;
        }
        let count = src.len().min(data.len() - pos);
        data[pos..pos + count].copy_from_slice(&src[..count]);
        self.pos += count;
        Some(count)
    }
}

/// The callbacks erase the borrow lifetime; `MemoryStream` confines the
/// cursor to one decode call, so the bytes always outlive it.
type InputCursor = StreamCursor<&'static [u8]>;

/// An `opj_stream_t` pulling from a borrowed byte buffer.
///
/// The stream borrows the caller's bytes for the duration of one decode
/// call and never frees them; dropping the stream releases only the engine
/// stream object and the cursor.
pub(crate) struct MemoryStream<'a> {
    raw: *mut sys::opj_stream_t,
    // Owns the callback user data; the engine only borrows the pointer.
    _cursor: Box<InputCursor>,
    _bytes: PhantomData<&'a [u8]>,
}

impl<'a> MemoryStream<'a> {
    pub fn new(bytes: &'a [u8]) -> Result<Self, Error> {
        // Lifetime erased for the callback signatures; sound because the
        // cursor never outlives `self`, which never outlives `bytes`.
        let erased: &'static [u8] = unsafe { std::mem::transmute::<&'a [u8], &'static [u8]>(bytes) };
        let mut cursor = Box::new(StreamCursor::new(erased));

        let raw = unsafe { sys::opj_stream_create(sys::OPJ_J2K_STREAM_CHUNK_SIZE as usize, 1) };
        if raw.is_null() {
            return Err(Error::StreamCreationFailed);
        }
        unsafe {
            // No free callback: the Box above owns the cursor.
            sys::opj_stream_set_user_data(
                raw,
                &mut *cursor as *mut InputCursor as *mut c_void,
                None,
            );
            sys::opj_stream_set_user_data_length(raw, bytes.len() as u64);
            sys::opj_stream_set_read_function(raw, Some(read_callback));
            sys::opj_stream_set_skip_function(raw, Some(skip_callback));
            sys::opj_stream_set_seek_function(raw, Some(seek_callback));
        }
        Ok(Self {
            raw,
            _cursor: cursor,
            _bytes: PhantomData,
        })
    }

    pub fn as_ptr(&self) -> *mut sys::opj_stream_t {
        self.raw
    }
}

impl Drop for MemoryStream<'_> {
    fn drop(&mut self) {
        unsafe { sys::opj_stream_destroy(self.raw) };
    }
}

unsafe extern "C" fn read_callback(
    p_buffer: *mut c_void,
    p_nb_bytes: usize,
    p_user_data: *mut c_void,
) -> usize {
    let Some(cursor) = (unsafe { (p_user_data as *mut InputCursor).as_mut() }) else {
        return OPJ_EOF;
    };
    if p_buffer.is_null() || p_nb_bytes == 0 {
        return OPJ_EOF;
    }
    let dst = unsafe { std::slice::from_raw_parts_mut(p_buffer as *mut u8, p_nb_bytes) };
    cursor.read(dst).unwrap_or(OPJ_EOF)
}

unsafe extern "C" fn skip_callback(p_nb_bytes: i64, p_user_data: *mut c_void) -> i64 {
    let Some(cursor) = (unsafe { (p_user_data as *mut InputCursor).as_mut() }) else {
        return -1;
    };
    cursor.skip(p_nb_bytes).unwrap_or(-1)
}

unsafe extern "C" fn seek_callback(p_nb_bytes: i64, p_user_data: *mut c_void) -> i32 {
    let Some(cursor) = (unsafe { (p_user_data as *mut InputCursor).as_mut() }) else {
        return 0;
    };
    if p_nb_bytes < 0 {
        return 0;
    }
    cursor.seek(p_nb_bytes as u64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_at_end_returns_none_and_leaves_dst_untouched() {
        let data = [1u8, 2, 3];
        let mut cursor = StreamCursor::new(&data[..]);
        assert!(cursor.seek(3));
        let mut dst = [0xAAu8; 4];
        assert_eq!(cursor.read(&mut dst), None);
        assert_eq!(dst, [0xAA; 4]);
        assert_eq!(cursor.position(), 3);
    }

    #[test]
    fn read_clamps_to_remaining_bytes() {
        let data = [10u8, 11, 12, 13, 14];
        let mut cursor = StreamCursor::new(&data[..]);
        assert!(cursor.seek(3));
        let mut dst = [0u8; 8];
        assert_eq!(cursor.read(&mut dst), Some(2));
        assert_eq!(&dst[..2], &[13, 14]);
        assert_eq!(cursor.position(), 5);
    }

    #[test]
    fn repeated_reads_reconstruct_the_buffer() {
        let data: Vec<u8> = (0..=255).collect();
        let mut cursor = StreamCursor::new(data.as_slice());
        let mut rebuilt = Vec::new();
        let mut chunk = [0u8; 7];
        while let Some(count) = cursor.read(&mut chunk) {
            rebuilt.extend_from_slice(&chunk[..count]);
        }
        assert_eq!(rebuilt, data);
    }

    #[test]
    fn seek_within_bounds_succeeds() {
        let data = [0u8; 10];
        let mut cursor = StreamCursor::new(&data[..]);
        assert!(cursor.seek(10));
        assert_eq!(cursor.position(), 10);
        assert!(cursor.seek(0));
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn seek_past_end_clamps_and_fails() {
        let data = [0u8; 10];
        let mut cursor = StreamCursor::new(&data[..]);
        assert!(!cursor.seek(11));
        assert_eq!(cursor.position(), 10);
    }

    #[test]
    fn skip_past_end_clamps_and_fails() {
        let data = [0u8; 10];
        let mut cursor = StreamCursor::new(&data[..]);
        assert_eq!(cursor.skip(4), Some(4));
        assert_eq!(cursor.position(), 4);
        assert_eq!(cursor.skip(7), None);
        assert_eq!(cursor.position(), 10);
    }

    #[test]
    fn skip_backwards_and_underrun() {
        let data = [0u8; 10];
        let mut cursor = StreamCursor::new(&data[..]);
        assert!(cursor.seek(6));
        assert_eq!(cursor.skip(-4), Some(-4));
        assert_eq!(cursor.position(), 2);
        assert_eq!(cursor.skip(-3), None);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn skip_extreme_offsets_saturate() {
        let data = [0u8; 10];
        let mut cursor = StreamCursor::new(&data[..]);
        assert_eq!(cursor.skip(i64::MAX), None);
        assert_eq!(cursor.position(), 10);
        assert_eq!(cursor.skip(i64::MIN), None);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn write_copies_in_place_with_the_same_clamp() {
        let mut data = [0u8; 5];
        let mut cursor = StreamCursor::new(&mut data[..]);
        assert_eq!(cursor.write(&[1, 2, 3]), Some(3));
        assert_eq!(cursor.write(&[4, 5, 6]), Some(2));
        assert_eq!(cursor.write(&[7]), None);
        assert_eq!(data, [1, 2, 3, 4, 5]);
    }
}
