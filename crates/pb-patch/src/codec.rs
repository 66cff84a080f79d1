// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 PatchBoot Project

//! Built-in streaming delta codec
//!
//! A compact patch format for in-place updates, decoded with a fixed
//! caller-provided scratch buffer and no allocation.
//!
//! # Wire format
//!
//! ```text
//! "DPT1"                      magic, 4 bytes
//! op*                         operations until end of stream
//!
//! op  := 0x00 len:varint addr:varint    Copy `len` old-image bytes at `addr`
//!      | 0x01 len:varint byte*len       Insert `len` literal bytes
//! ```
//!
//! Lengths and addresses are LEB128 varints. Copy addresses are absolute
//! within the old image and must not point below the region already
//! replaced by emitted output; encoders that copy only from the current
//! output position forward satisfy this by construction.

use crate::decoder::{DeltaDecoder, PatchIo};
use crate::error::{PatchError, PatchResult};

/// Patch stream magic
pub const PATCH_MAGIC: [u8; 4] = *b"DPT1";

/// Copy operation tag
pub const OP_COPY: u8 = 0x00;

/// Insert operation tag
pub const OP_INSERT: u8 = 0x01;

/// Streaming decoder for the `DPT1` format
///
/// The scratch slice bounds how much data moves per step; any non-empty
/// slice works, a sector-sized one keeps the flash call count low.
pub struct StreamDecoder<'a> {
    scratch: &'a mut [u8],
}

impl<'a> StreamDecoder<'a> {
    /// Create a decoder around a scratch buffer
    #[must_use]
    pub fn new(scratch: &'a mut [u8]) -> Self {
        debug_assert!(!scratch.is_empty());
        Self { scratch }
    }
}

impl DeltaDecoder for StreamDecoder<'_> {
    fn apply<IO: PatchIo>(&mut self, io: &mut IO) -> PatchResult<()> {
        let mut magic = [0u8; 4];
        read_exact(io, &mut magic)?;
        if magic != PATCH_MAGIC {
            return Err(PatchError::DecoderFailed);
        }

        loop {
            let tag = match read_byte(io)? {
                Some(tag) => tag,
                None => return Ok(()),
            };
            let len = read_varint(io)?;

            match tag {
                OP_COPY => {
                    let addr = read_varint(io)?;
                    let mut done = 0u32;
                    while done < len {
                        let step = self.scratch.len().min((len - done) as usize);
                        let chunk = &mut self.scratch[..step];
                        io.read_old(addr + done, chunk)?;
                        io.write_new(chunk)?;
                        done += step as u32;
                    }
                }
                OP_INSERT => {
                    let mut done = 0u32;
                    while done < len {
                        let step = self.scratch.len().min((len - done) as usize);
                        read_exact(io, &mut self.scratch[..step])?;
                        io.write_new(&self.scratch[..step])?;
                        done += step as u32;
                    }
                }
                _ => return Err(PatchError::DecoderFailed),
            }
        }
    }
}

/// Read one byte, `None` at a clean end of stream
fn read_byte<IO: PatchIo>(io: &mut IO) -> PatchResult<Option<u8>> {
    let mut byte = [0u8; 1];
    match io.read_patch(&mut byte)? {
        0 => Ok(None),
        _ => Ok(Some(byte[0])),
    }
}

/// Fill `buf` completely; end of stream midway is a malformed patch
fn read_exact<IO: PatchIo>(io: &mut IO, buf: &mut [u8]) -> PatchResult<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = io.read_patch(&mut buf[filled..])?;
        if n == 0 {
            return Err(PatchError::DecoderFailed);
        }
        filled += n;
    }
    Ok(())
}

/// Decode a LEB128 varint, at most 5 bytes for a u32
fn read_varint<IO: PatchIo>(io: &mut IO) -> PatchResult<u32> {
    let mut value = 0u32;

    for shift in (0..35).step_by(7) {
        let byte = read_byte(io)?.ok_or(PatchError::DecoderFailed)?;
        let bits = (byte & 0x7F) as u32;
        // The fifth byte may only carry the remaining 4 bits of a u32.
        if shift == 28 && bits > 0x0F {
            return Err(PatchError::DecoderFailed);
        }
        value |= bits << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }

    Err(PatchError::DecoderFailed)
}
