// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 PatchBoot Project

//! Shared test support: the host-side patch encoder, RBL packaging and a
//! simulated flash fixture. The encoder is the counterpart of the shipped
//! decoder and stays in test land, like the packaging tool it mirrors.

use pb_common::crc::crc32;
use pb_hal::sim::SimFlash;
use pb_hal::Partition;
use pb_patch::codec::{OP_COPY, OP_INSERT, PATCH_MAGIC};
use pb_patch::{PackageHeader, PatchRequest};

pub const SECTOR: u32 = 4096;

/// Builder for `DPT1` patch streams
pub struct PatchBuilder {
    bytes: Vec<u8>,
}

impl PatchBuilder {
    pub fn new() -> Self {
        Self {
            bytes: PATCH_MAGIC.to_vec(),
        }
    }

    pub fn copy(mut self, addr: u32, len: u32) -> Self {
        self.bytes.push(OP_COPY);
        push_varint(&mut self.bytes, len);
        push_varint(&mut self.bytes, addr);
        self
    }

    pub fn insert(mut self, data: &[u8]) -> Self {
        self.bytes.push(OP_INSERT);
        push_varint(&mut self.bytes, data.len() as u32);
        self.bytes.extend_from_slice(data);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}

fn push_varint(out: &mut Vec<u8>, mut value: u32) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
}

/// Encode `old -> new` with same-offset block comparison: unchanged blocks
/// become Copy ops, changed ones literal Inserts. Copies never reference
/// below the current output position, which is what the in-place engine
/// requires of a well-formed patch.
pub fn diff(old: &[u8], new: &[u8], block: usize) -> Vec<u8> {
    let mut builder = PatchBuilder::new();
    let mut literals: Vec<u8> = Vec::new();
    let mut pos = 0usize;

    while pos < new.len() {
        let len = block.min(new.len() - pos);
        let unchanged = pos + len <= old.len() && old[pos..pos + len] == new[pos..pos + len];
        if unchanged {
            if !literals.is_empty() {
                builder = builder.insert(&literals);
                literals.clear();
            }
            builder = builder.copy(pos as u32, len as u32);
        } else {
            literals.extend_from_slice(&new[pos..pos + len]);
        }
        pos += len;
    }
    if !literals.is_empty() {
        builder = builder.insert(&literals);
    }
    builder.build()
}

/// Wrap a patch body in an RBL container
pub fn package(body: &[u8], new_image: &[u8]) -> Vec<u8> {
    let header = PackageHeader::new(
        "app",
        "v1.04",
        1_760_000_000,
        crc32(body),
        body.len() as u32,
        crc32(new_image),
        new_image.len() as u32,
    );

    let mut bytes = header.to_bytes().to_vec();
    bytes.extend_from_slice(body);
    bytes
}

/// One simulated flash with the standard three-partition layout
pub struct Fixture {
    pub flash: SimFlash,
    pub old: Partition,
    pub swap: Partition,
    pub patch: Partition,
}

impl Fixture {
    /// Lay `old`, `swap` and `patch` partitions out back to back
    pub fn new(old_sectors: u32, swap_sectors: u32, patch_sectors: u32) -> Self {
        let total = old_sectors + swap_sectors + patch_sectors;
        let flash = SimFlash::new(total as usize, SECTOR);

        let old = Partition::new("app", 0, old_sectors * SECTOR);
        let swap = Partition::new("swap", old.len(), swap_sectors * SECTOR);
        let patch = Partition::new("patch", old.len() + swap.len(), patch_sectors * SECTOR);
        Self {
            flash,
            old,
            swap,
            patch,
        }
    }

    /// Preload the old firmware image at the start of the old partition
    pub fn load_old(&mut self, image: &[u8]) {
        self.old.write(&mut self.flash, 0, image).unwrap();
    }

    /// Store raw patch bytes and build the matching request
    pub fn stage_patch(&mut self, bytes: &[u8], newer_len: u32) -> PatchRequest {
        if !bytes.is_empty() {
            self.patch.write(&mut self.flash, 0, bytes).unwrap();
        }
        PatchRequest {
            patch_part: self.patch,
            old_part: self.old,
            patch_offset: 0,
            patch_len: bytes.len() as u32,
            newer_len,
        }
    }

    /// Store a packaged update (header + body) in the patch partition
    pub fn stage_package(&mut self, bytes: &[u8]) {
        self.patch.write(&mut self.flash, 0, bytes).unwrap();
    }

    /// Old-partition contents for comparisons
    pub fn old_contents(&self) -> &[u8] {
        self.flash.contents(self.old.offset(), self.old.len())
    }
}

/// A deterministic pseudo-random firmware image
pub fn image(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2654435761).wrapping_add(1);
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1664525).wrapping_add(1013904223);
            (state >> 24) as u8
        })
        .collect()
}

/// Extract the progress percents reported into `log`, in order
pub fn progress_percents(log: &pb_common::LogBuffer) -> Vec<i32> {
    log.iter()
        .filter_map(|entry| {
            entry
                .message
                .as_str()
                .strip_prefix("Buffering...")
                .map(|rest| rest.trim().trim_end_matches('%').trim().parse().unwrap())
        })
        .collect()
}
