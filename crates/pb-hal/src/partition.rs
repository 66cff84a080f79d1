// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 PatchBoot Project

//! Named flash partitions
//!
//! A [`Partition`] is a cheap descriptor of a byte window into a flash
//! device; it does not own the device. Session code holds one `&mut` device
//! and any number of partition descriptors, which keeps interleaved access
//! to the patch, old and swap partitions borrow-friendly.

use pb_common::align::{align_down, align_up};

use crate::error::{FlashError, FlashResult};
use crate::flash::FlashDevice;

/// Maximum number of partitions in a table
pub const MAX_PARTITIONS: usize = 8;

/// A named byte window into a flash device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    name: &'static str,
    offset: u32,
    len: u32,
}

impl Partition {
    /// Create a partition descriptor
    ///
    /// `offset` should be sector aligned and `len` a whole number of
    /// sectors; [`Partition::erase_covering`] relies on it.
    #[must_use]
    pub const fn new(name: &'static str, offset: u32, len: u32) -> Self {
        Self { name, offset, len }
    }

    /// Partition name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Offset of the partition within its device
    #[must_use]
    pub const fn offset(&self) -> u32 {
        self.offset
    }

    /// Partition length in bytes
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.len
    }

    /// Whether the partition is zero-sized
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Translate a partition-relative span to a device offset
    fn resolve(&self, offset: u32, len: u32) -> FlashResult<u32> {
        let end = offset.checked_add(len).ok_or(FlashError::OutOfBounds)?;
        if end > self.len {
            return Err(FlashError::OutOfBounds);
        }
        Ok(self.offset + offset)
    }

    /// Read `buf.len()` bytes starting at the partition-relative `offset`
    pub fn read<F: FlashDevice>(
        &self,
        flash: &mut F,
        offset: u32,
        buf: &mut [u8],
    ) -> FlashResult<()> {
        let base = self.resolve(offset, buf.len() as u32)?;
        flash.read(base, buf)
    }

    /// Write `data` starting at the partition-relative `offset`
    pub fn write<F: FlashDevice>(
        &self,
        flash: &mut F,
        offset: u32,
        data: &[u8],
    ) -> FlashResult<()> {
        let base = self.resolve(offset, data.len() as u32)?;
        flash.write(base, data)
    }

    /// Erase a sector-aligned range starting at the partition-relative
    /// `offset`
    pub fn erase<F: FlashDevice>(&self, flash: &mut F, offset: u32, len: u32) -> FlashResult<()> {
        let base = self.resolve(offset, len)?;
        flash.erase(base, len)
    }

    /// Erase the whole sectors covering `[offset, offset + len)`
    ///
    /// The range is widened to sector boundaries before erasing, so callers
    /// may pass unaligned spans. Bytes inside the covering sectors but
    /// outside the requested span are erased along with it. Fails if the
    /// covering range runs past the partition end (only possible when the
    /// partition itself is not sector aligned).
    pub fn erase_covering<F: FlashDevice>(
        &self,
        flash: &mut F,
        offset: u32,
        len: u32,
    ) -> FlashResult<()> {
        if len == 0 {
            return Ok(());
        }
        let sector = flash.sector_size();
        let end = offset.checked_add(len).ok_or(FlashError::OutOfBounds)?;
        let start = align_down(offset, sector);
        let end = align_up(end, sector);
        let base = self.resolve(start, end - start)?;
        flash.erase(base, end - start)
    }
}

/// A fixed-capacity table of named partitions
pub struct PartitionTable {
    slots: heapless::Vec<Partition, MAX_PARTITIONS>,
}

impl PartitionTable {
    /// Create an empty table
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: heapless::Vec::new(),
        }
    }

    /// Register a partition
    ///
    /// Fails with [`FlashError::OutOfBounds`] when the table is full and
    /// keeps the first registration when a name is reused.
    pub fn register(&mut self, partition: Partition) -> FlashResult<()> {
        if self.find(partition.name()).is_some() {
            return Ok(());
        }
        self.slots
            .push(partition)
            .map_err(|_| FlashError::OutOfBounds)
    }

    /// Look a partition up by name
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Partition> {
        self.slots.iter().find(|p| p.name() == name)
    }

    /// Number of registered partitions
    #[must_use]
    pub fn count(&self) -> usize {
        self.slots.len()
    }
}

impl Default for PartitionTable {
    fn default() -> Self {
        Self::new()
    }
}
