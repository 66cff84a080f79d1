// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 PatchBoot Project

//! Patch session
//!
//! A [`PatchSession`] owns all in-flight state of one in-place update: the
//! patch window and its read cursor, the old partition, the commit buffer,
//! and the committed length. It implements [`PatchIo`], so the delta
//! decoder runs directly against it.
//!
//! Safety invariant maintained throughout: bytes of the old partition at
//! and beyond `committed_len` still hold the original old image, because
//! commits only ever land on the region the decoder has already consumed.
//! `read_old` asserts this in debug builds.

use pb_common::align::align_up;
use pb_common::{log_debug, log_error, log_info, log_warn, LogBuffer};
use pb_hal::{FlashDevice, Partition};

use crate::buffer::CommitBuffer;
use crate::decoder::{DeltaDecoder, PatchIo};
use crate::error::{PatchError, PatchResult};

const MODULE: &str = "patch";

/// Parameters of one in-place update
#[derive(Debug, Clone, Copy)]
pub struct PatchRequest {
    /// Partition holding the patch payload
    pub patch_part: Partition,
    /// Partition holding the old firmware, updated in place
    pub old_part: Partition,
    /// First byte of the patch payload within `patch_part`
    pub patch_offset: u32,
    /// Patch payload length
    pub patch_len: u32,
    /// Expected length of the new firmware image
    pub newer_len: u32,
}

/// State of one running patch session
pub struct PatchSession<'a, F: FlashDevice, B: CommitBuffer<F>> {
    flash: &'a mut F,
    log: &'a mut LogBuffer,
    patch_part: Partition,
    old_part: Partition,
    patch_base: u32,
    patch_len: u32,
    patch_pos: u32,
    newer_len: u32,
    write_pos: u32,
    committed: u32,
    buffer: B,
    last_percent: i32,
}

impl<'a, F: FlashDevice, B: CommitBuffer<F>> PatchSession<'a, F, B> {
    /// Set a session up and prepare its commit buffer
    ///
    /// The buffer capacity must be at least one sector of the backing
    /// device and a whole number of sectors, so that every intermediate
    /// commit erases whole sectors of the old partition.
    pub fn new(
        flash: &'a mut F,
        buffer: B,
        request: &PatchRequest,
        log: &'a mut LogBuffer,
    ) -> PatchResult<Self> {
        let sector = flash.sector_size();
        let capacity = buffer.capacity();
        if capacity < sector || capacity % sector != 0 {
            log_error!(
                log,
                MODULE,
                "Commit buffer of {} bytes unusable with {} byte sectors",
                capacity,
                sector
            );
            return Err(PatchError::BufferTooSmall);
        }

        let mut session = Self {
            flash,
            log,
            patch_part: request.patch_part,
            old_part: request.old_part,
            patch_base: request.patch_offset,
            patch_len: request.patch_len,
            patch_pos: 0,
            newer_len: request.newer_len,
            write_pos: 0,
            committed: 0,
            buffer,
            last_percent: -1,
        };

        session.buffer.prepare(&mut *session.flash)?;
        log_info!(
            session.log,
            MODULE,
            "Patching '{}' in place: {} patch bytes -> {} image bytes",
            session.old_part.name(),
            session.patch_len,
            session.newer_len
        );
        Ok(session)
    }

    /// Bytes of the new image already committed to the old partition
    #[must_use]
    pub fn committed_len(&self) -> u32 {
        self.committed
    }

    /// Bytes of the new image emitted by the decoder so far
    #[must_use]
    pub fn written_len(&self) -> u32 {
        self.write_pos
    }

    /// Current read position in the patch stream
    #[must_use]
    pub fn patch_read_pos(&self) -> u32 {
        self.patch_pos
    }

    /// Bytes waiting in the commit buffer
    #[must_use]
    pub fn buffered_len(&self) -> u32 {
        self.buffer.fill()
    }

    /// Move the buffered bytes onto the old partition
    fn commit(&mut self) -> PatchResult<()> {
        let fill = self.buffer.fill();
        if fill == 0 {
            return Ok(());
        }

        let old = self.old_part;
        log_info!(
            self.log,
            MODULE,
            "Committing {} bytes to '{}' at offset {}",
            fill,
            old.name(),
            self.committed
        );

        if old
            .erase_covering(&mut *self.flash, self.committed, fill)
            .is_err()
        {
            log_error!(
                self.log,
                MODULE,
                "Failed to erase '{}' at offset {}",
                old.name(),
                self.committed
            );
            return Err(PatchError::FlashErase);
        }

        self.buffer.drain_to(&mut *self.flash, &old, self.committed)?;

        self.committed += fill;
        log_debug!(
            self.log,
            MODULE,
            "Commit done, {} bytes total",
            self.committed
        );
        Ok(())
    }

    /// Emit a progress line when a new 5% bucket is reached
    fn report_progress(&mut self) {
        if self.newer_len == 0 {
            return;
        }
        let percent = ((u64::from(self.write_pos) * 100) / u64::from(self.newer_len)).min(100) as i32;
        if percent != self.last_percent && percent % 5 == 0 {
            log_info!(self.log, MODULE, "Buffering... {:>3}%", percent);
            self.last_percent = percent;
        }
    }

    /// Erase the partition tail not covered by the (shorter) new image
    ///
    /// Runs after the image is fully committed, so a failure here cannot
    /// corrupt it; it is reported as a warning only.
    fn erase_tail(&mut self) {
        let old = self.old_part;
        if self.newer_len >= old.len() {
            return;
        }

        let start = align_up(self.newer_len, self.flash.sector_size());
        if start >= old.len() {
            return;
        }

        log_info!(
            self.log,
            MODULE,
            "New image shorter than '{}', erasing tail from offset {}",
            old.name(),
            start
        );
        if old
            .erase_covering(&mut *self.flash, start, old.len() - start)
            .is_err()
        {
            log_warn!(
                self.log,
                MODULE,
                "Tail erase failed; the update itself is complete"
            );
        }
    }

    /// Flush the residue, erase the tail and verify the committed length
    ///
    /// The final flush is usually not sector aligned; it erases the whole
    /// sectors covering the residue. Bytes between the image end and the
    /// next sector boundary are unspecified until the tail erase has run.
    pub fn finalize(mut self) -> PatchResult<()> {
        self.commit()?;
        self.erase_tail();

        if self.committed != self.newer_len {
            log_error!(
                self.log,
                MODULE,
                "Patched {} bytes but expected {}",
                self.committed,
                self.newer_len
            );
            return Err(PatchError::LengthMismatch);
        }

        log_info!(
            self.log,
            MODULE,
            "Update successful, total size {} bytes",
            self.committed
        );
        Ok(())
    }
}

impl<F: FlashDevice, B: CommitBuffer<F>> PatchIo for PatchSession<'_, F, B> {
    fn read_patch(&mut self, buf: &mut [u8]) -> PatchResult<usize> {
        let remaining = self.patch_len - self.patch_pos;
        let count = (buf.len() as u32).min(remaining);
        if count == 0 {
            return Ok(0);
        }

        if self
            .patch_part
            .read(
                &mut *self.flash,
                self.patch_base + self.patch_pos,
                &mut buf[..count as usize],
            )
            .is_err()
        {
            log_error!(
                self.log,
                MODULE,
                "Failed to read patch data from '{}'",
                self.patch_part.name()
            );
            return Err(PatchError::FlashRead);
        }

        self.patch_pos += count;
        Ok(count as usize)
    }

    fn read_old(&mut self, addr: u32, buf: &mut [u8]) -> PatchResult<()> {
        // The decoder must never look back into the region already
        // committed; those bytes no longer hold the old image.
        debug_assert!(
            addr >= self.committed,
            "old-image read at {} below committed length {}",
            addr,
            self.committed
        );

        self.old_part
            .read(&mut *self.flash, addr, buf)
            .map_err(|_| PatchError::FlashRead)
    }

    fn write_new(&mut self, data: &[u8]) -> PatchResult<()> {
        let mut rest = data;
        while !rest.is_empty() {
            let free = (self.buffer.capacity() - self.buffer.fill()) as usize;
            if free < rest.len() {
                // Top the buffer up, then make room with a commit.
                if free > 0 {
                    self.buffer.append(&mut *self.flash, &rest[..free])?;
                    rest = &rest[free..];
                }
                self.commit()?;
            } else {
                self.buffer.append(&mut *self.flash, rest)?;
                rest = &[];
            }
        }

        self.write_pos += data.len() as u32;
        self.report_progress();
        Ok(())
    }
}

/// Apply a delta patch to `request.old_part` in place
///
/// The single entry point of the core. Runs `decoder` once against a fresh
/// session and finalizes it. On success the old partition holds the first
/// `newer_len` bytes of the new image, with the tail erased; on failure the
/// partition may be partially rewritten (see
/// [`Error::leaves_partition_dirty`](pb_common::Error::leaves_partition_dirty)).
pub fn release_patch<F, B, D>(
    flash: &mut F,
    decoder: &mut D,
    buffer: B,
    request: &PatchRequest,
    log: &mut LogBuffer,
) -> PatchResult<()>
where
    F: FlashDevice,
    B: CommitBuffer<F>,
    D: DeltaDecoder,
{
    let mut session = PatchSession::new(flash, buffer, request, &mut *log)?;

    match decoder.apply(&mut session) {
        Ok(()) => session.finalize(),
        Err(e) => {
            drop(session);
            log_error!(log, MODULE, "Update failed: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::RamBuffer;
    use pb_hal::sim::SimFlash;

    const SECTOR: u32 = 4096;

    fn fixture() -> (SimFlash, PatchRequest) {
        let mut flash = SimFlash::new(12, SECTOR);
        let old = Partition::new("app", 0, 8 * SECTOR);
        let patch = Partition::new("patch", 8 * SECTOR, 4 * SECTOR);

        // Seed a recognizable old image.
        let image: [u8; 2 * SECTOR as usize] = core::array::from_fn(|i| (i % 251) as u8);
        flash.write(0, &image).unwrap();

        let request = PatchRequest {
            patch_part: patch,
            old_part: old,
            patch_offset: 0,
            patch_len: 0,
            newer_len: 2 * SECTOR,
        };
        (flash, request)
    }

    #[test]
    fn test_rejects_undersized_buffer() {
        let (mut flash, request) = fixture();
        let mut log = LogBuffer::new();
        let mut small = [0u8; 128];

        let result = PatchSession::new(
            &mut flash,
            RamBuffer::new(&mut small),
            &request,
            &mut log,
        );
        assert!(matches!(result, Err(PatchError::BufferTooSmall)));
    }

    #[test]
    fn test_rejects_unaligned_buffer() {
        let (mut flash, request) = fixture();
        let mut log = LogBuffer::new();
        let mut odd = [0u8; SECTOR as usize + 100];

        let result = PatchSession::new(
            &mut flash,
            RamBuffer::new(&mut odd),
            &request,
            &mut log,
        );
        assert!(matches!(result, Err(PatchError::BufferTooSmall)));
    }

    #[test]
    fn test_write_new_commits_on_fill() {
        let (mut flash, request) = fixture();
        let mut log = LogBuffer::new();
        let mut block = [0u8; SECTOR as usize];

        let mut session = PatchSession::new(
            &mut flash,
            RamBuffer::new(&mut block),
            &request,
            &mut log,
        )
        .unwrap();

        // Half a sector stays buffered.
        session.write_new(&[0xAB; (SECTOR / 2) as usize]).unwrap();
        assert_eq!(session.committed_len(), 0);
        assert_eq!(session.buffered_len(), SECTOR / 2);

        // Crossing the capacity commits exactly one buffer-full.
        session.write_new(&[0xCD; SECTOR as usize]).unwrap();
        assert_eq!(session.committed_len(), SECTOR);
        assert_eq!(session.buffered_len(), SECTOR / 2);
        assert_eq!(session.written_len(), SECTOR + SECTOR / 2);
    }

    #[test]
    fn test_read_patch_clamps_and_signals_eof() {
        let (mut flash, mut request) = fixture();
        let mut log = LogBuffer::new();
        let mut block = [0u8; SECTOR as usize];

        let payload = [0x77u8; 100];
        request
            .patch_part
            .write(&mut flash, 0, &payload)
            .unwrap();
        request.patch_len = payload.len() as u32;

        let mut session = PatchSession::new(
            &mut flash,
            RamBuffer::new(&mut block),
            &request,
            &mut log,
        )
        .unwrap();

        let mut buf = [0u8; 64];
        assert_eq!(session.read_patch(&mut buf).unwrap(), 64);
        assert_eq!(session.read_patch(&mut buf).unwrap(), 36);
        assert_eq!(session.read_patch(&mut buf).unwrap(), 0);
        assert_eq!(session.patch_read_pos(), 100);
    }

    #[test]
    fn test_progress_buckets() {
        let (mut flash, request) = fixture();
        let mut log = LogBuffer::new();
        let mut block = [0u8; SECTOR as usize];

        let mut session = PatchSession::new(
            &mut flash,
            RamBuffer::new(&mut block),
            &request,
            &mut log,
        )
        .unwrap();

        // Eight writes of an eighth of the image each.
        for _ in 0..8 {
            session.write_new(&[0u8; (SECTOR / 4) as usize]).unwrap();
        }
        session.finalize().unwrap();

        let mut percents = heapless::Vec::<i32, 32>::new();
        for entry in log.iter() {
            if let Some(rest) = entry.message.as_str().strip_prefix("Buffering...") {
                let value = rest.trim().trim_end_matches('%').trim().parse().unwrap();
                percents.push(value).unwrap();
            }
        }

        // Strictly increasing 5%-aligned buckets.
        for pair in percents.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        for p in &percents {
            assert_eq!(p % 5, 0);
        }
        assert_eq!(percents.last(), Some(&100));
    }
}
