// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 PatchBoot Project

//! Delta decoder contract
//!
//! A decoder turns `(old image, patch stream)` into the new image. It never
//! touches flash itself; all I/O goes through the three [`PatchIo`] methods
//! the session provides. FFI decoders with C-style callbacks bridge to
//! these traits with thin adapters.

use crate::error::PatchResult;

/// I/O surface a patch session offers to a delta decoder
pub trait PatchIo {
    /// Sequential read from the patch stream
    ///
    /// Fills up to `buf.len()` bytes and returns the number actually read;
    /// `0` signals end of stream. Short reads are not errors.
    fn read_patch(&mut self, buf: &mut [u8]) -> PatchResult<usize>;

    /// Random-access read of the old image
    ///
    /// `addr` is an absolute byte address within the old image. Decoders
    /// must only request addresses they have not yet produced replacements
    /// for; the session commits new bytes over consumed regions of the old
    /// image as it goes.
    fn read_old(&mut self, addr: u32, buf: &mut [u8]) -> PatchResult<()>;

    /// Strictly sequential append of decoded new-image bytes
    ///
    /// The byte total across all calls is the new image length.
    fn write_new(&mut self, data: &[u8]) -> PatchResult<()>;
}

/// A streaming delta decoder
pub trait DeltaDecoder {
    /// Decode one complete patch, driving `io` until the new image has been
    /// fully emitted
    ///
    /// I/O failures propagate unchanged; malformed patch input is reported
    /// as [`PatchError::DecoderFailed`](crate::PatchError::DecoderFailed).
    fn apply<IO: PatchIo>(&mut self, io: &mut IO) -> PatchResult<()>;
}
