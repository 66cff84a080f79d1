// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 PatchBoot Project

//! Commit buffers
//!
//! The session never writes decoded bytes straight onto the old partition;
//! they accumulate in a [`CommitBuffer`] and land on the partition in whole
//! buffer-fulls. Two media implement the same capability:
//!
//! - [`FlashSwapBuffer`]: a window of a dedicated swap partition. Survives
//!   large images with little RAM, at the cost of extra flash wear.
//! - [`RamBuffer`]: a caller-provided RAM block. No wear, but the block
//!   must hold at least one full sector of the target partition.
//!
//! The commit cycle itself (erase target, drain, advance) is driven by the
//! session; buffers only know how to accept bytes and move them.

use pb_hal::{FlashDevice, Partition};

use crate::error::{PatchError, PatchResult};

/// Bounded staging store for decoded new-image bytes
pub trait CommitBuffer<F: FlashDevice> {
    /// Total buffer capacity in bytes
    fn capacity(&self) -> u32;

    /// Bytes currently buffered
    fn fill(&self) -> u32;

    /// One-time setup before the first append
    fn prepare(&mut self, flash: &mut F) -> PatchResult<()>;

    /// Append `data`; the caller keeps `data.len() <= capacity - fill`
    fn append(&mut self, flash: &mut F, data: &[u8]) -> PatchResult<()>;

    /// Move the buffered bytes onto `dst` at `dst_offset` and reset to
    /// empty
    ///
    /// The destination range has already been erased by the caller.
    fn drain_to(&mut self, flash: &mut F, dst: &Partition, dst_offset: u32) -> PatchResult<()>;
}

/// Commit buffer backed by a swap partition window
///
/// The window spans `[base, partition end)`. Draining copies through a
/// caller-provided RAM scratch chunk and re-erases the window for the next
/// round.
pub struct FlashSwapBuffer<'a> {
    swap: Partition,
    base: u32,
    fill: u32,
    scratch: &'a mut [u8],
}

impl<'a> FlashSwapBuffer<'a> {
    /// Create a buffer over the swap partition window starting at `base`
    #[must_use]
    pub fn new(swap: Partition, base: u32, scratch: &'a mut [u8]) -> Self {
        debug_assert!(!scratch.is_empty());
        Self {
            swap,
            base,
            fill: 0,
            scratch,
        }
    }
}

impl<F: FlashDevice> CommitBuffer<F> for FlashSwapBuffer<'_> {
    fn capacity(&self) -> u32 {
        self.swap.len().saturating_sub(self.base)
    }

    fn fill(&self) -> u32 {
        self.fill
    }

    fn prepare(&mut self, flash: &mut F) -> PatchResult<()> {
        let capacity = CommitBuffer::<F>::capacity(self);
        self.swap
            .erase_covering(flash, self.base, capacity)
            .map_err(|_| PatchError::FlashErase)
    }

    fn append(&mut self, flash: &mut F, data: &[u8]) -> PatchResult<()> {
        self.swap
            .write(flash, self.base + self.fill, data)
            .map_err(|_| PatchError::FlashWrite)?;
        self.fill += data.len() as u32;
        Ok(())
    }

    fn drain_to(&mut self, flash: &mut F, dst: &Partition, dst_offset: u32) -> PatchResult<()> {
        let mut done = 0u32;
        while done < self.fill {
            let step = self.scratch.len().min((self.fill - done) as usize);
            let chunk = &mut self.scratch[..step];
            self.swap
                .read(flash, self.base + done, chunk)
                .map_err(|_| PatchError::FlashRead)?;
            dst.write(flash, dst_offset + done, chunk)
                .map_err(|_| PatchError::FlashWrite)?;
            done += step as u32;
        }

        // Make the window writable again for the next round.
        let capacity = CommitBuffer::<F>::capacity(self);
        self.swap
            .erase_covering(flash, self.base, capacity)
            .map_err(|_| PatchError::FlashErase)?;

        self.fill = 0;
        Ok(())
    }
}

/// Commit buffer backed by caller RAM
pub struct RamBuffer<'a> {
    buf: &'a mut [u8],
    fill: usize,
}

impl<'a> RamBuffer<'a> {
    /// Create a buffer over a RAM block
    ///
    /// The block must be at least one sector of the target partition's
    /// device, and a whole number of sectors; the session rejects it
    /// otherwise.
    #[must_use]
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, fill: 0 }
    }
}

impl<F: FlashDevice> CommitBuffer<F> for RamBuffer<'_> {
    fn capacity(&self) -> u32 {
        self.buf.len() as u32
    }

    fn fill(&self) -> u32 {
        self.fill as u32
    }

    fn prepare(&mut self, _flash: &mut F) -> PatchResult<()> {
        Ok(())
    }

    fn append(&mut self, _flash: &mut F, data: &[u8]) -> PatchResult<()> {
        self.buf[self.fill..self.fill + data.len()].copy_from_slice(data);
        self.fill += data.len();
        Ok(())
    }

    fn drain_to(&mut self, flash: &mut F, dst: &Partition, dst_offset: u32) -> PatchResult<()> {
        dst.write(flash, dst_offset, &self.buf[..self.fill])
            .map_err(|_| PatchError::FlashWrite)?;
        self.fill = 0;
        Ok(())
    }
}
