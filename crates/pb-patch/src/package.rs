// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 PatchBoot Project

//! Update package container
//!
//! Patches travel inside an `RBL` container: a 96-byte little-endian header
//! carrying the patch algorithm, the patch body size and CRC, and the size
//! and CRC of the firmware the patch produces. The header is CRC-protected
//! itself.
//!
//! [`apply_package`] is the download-to-flash-to-running-image pipeline:
//! validate the container, run the in-place patch session, then check the
//! produced image against the CRC the packager recorded.

use pb_common::crc::{crc32, Crc32};
use pb_common::{log_error, log_info, LogBuffer, PatchConfig};
use pb_hal::{FlashDevice, Partition};

use crate::buffer::CommitBuffer;
use crate::decoder::DeltaDecoder;
use crate::error::{PatchError, PatchResult};
use crate::session::{release_patch, PatchRequest};

const MODULE: &str = "package";

/// Package magic, first four header bytes
pub const PACKAGE_MAGIC: [u8; 4] = *b"RBL\0";

/// `algo` value: body is a delta patch stream
pub const ALGO_DELTA_PATCH: u16 = 4 << 8;

/// `algo2` value: CRC32 integrity checks
pub const ALGO2_CRC32: u16 = 1;

/// Span of the header covered by `header_crc`
const HEADER_CRC_SPAN: usize = 92;

/// Chunk size for streamed partition CRC computation
const CRC_CHUNK: usize = 256;

/// Update package header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageHeader {
    /// Patch/compression algorithm identifier
    pub algo: u16,
    /// Integrity algorithm identifier
    pub algo2: u16,
    /// Packaging timestamp (Unix seconds)
    pub timestamp: u32,
    /// Target partition name, NUL padded
    pub part_name: [u8; 16],
    /// Firmware version string, NUL padded
    pub fw_version: [u8; 24],
    /// Product code string, NUL padded
    pub product_code: [u8; 24],
    /// CRC32 of the patch body
    pub body_crc: u32,
    /// CRC32 of the produced firmware image
    pub raw_crc: u32,
    /// Length of the produced firmware image
    pub raw_size: u32,
    /// Length of the patch body
    pub body_size: u32,
    /// CRC32 of the preceding header bytes
    pub header_crc: u32,
}

impl PackageHeader {
    /// Serialized header size
    pub const SIZE: usize = 96;

    /// Create a header for a patch body producing `raw_size` image bytes
    ///
    /// The header CRC is filled in by [`PackageHeader::to_bytes`].
    #[must_use]
    pub fn new(
        part_name: &str,
        fw_version: &str,
        timestamp: u32,
        body_crc: u32,
        body_size: u32,
        raw_crc: u32,
        raw_size: u32,
    ) -> Self {
        Self {
            algo: ALGO_DELTA_PATCH,
            algo2: ALGO2_CRC32,
            timestamp,
            part_name: padded(part_name.as_bytes()),
            fw_version: padded(fw_version.as_bytes()),
            product_code: [0; 24],
            body_crc,
            raw_crc,
            raw_size,
            body_size,
            header_crc: 0,
        }
    }

    /// Parse a header, checking magic and header CRC
    pub fn from_bytes(bytes: &[u8]) -> PatchResult<Self> {
        let header = Self::parse(bytes)?;
        if header.header_crc != crc32(&bytes[..HEADER_CRC_SPAN]) {
            return Err(PatchError::PackageCrcMismatch);
        }
        Ok(header)
    }

    /// Parse a header, checking the magic only
    fn parse(bytes: &[u8]) -> PatchResult<Self> {
        if bytes.len() < Self::SIZE || bytes[..4] != PACKAGE_MAGIC {
            return Err(PatchError::PackageInvalid);
        }

        Ok(Self {
            algo: le16(bytes, 4),
            algo2: le16(bytes, 6),
            timestamp: le32(bytes, 8),
            part_name: section(bytes, 12),
            fw_version: section(bytes, 28),
            product_code: section(bytes, 52),
            body_crc: le32(bytes, 76),
            raw_crc: le32(bytes, 80),
            raw_size: le32(bytes, 84),
            body_size: le32(bytes, 88),
            header_crc: le32(bytes, 92),
        })
    }

    /// Serialize the header, computing the trailing header CRC
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[..4].copy_from_slice(&PACKAGE_MAGIC);
        bytes[4..6].copy_from_slice(&self.algo.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.algo2.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.timestamp.to_le_bytes());
        bytes[12..28].copy_from_slice(&self.part_name);
        bytes[28..52].copy_from_slice(&self.fw_version);
        bytes[52..76].copy_from_slice(&self.product_code);
        bytes[76..80].copy_from_slice(&self.body_crc.to_le_bytes());
        bytes[80..84].copy_from_slice(&self.raw_crc.to_le_bytes());
        bytes[84..88].copy_from_slice(&self.raw_size.to_le_bytes());
        bytes[88..92].copy_from_slice(&self.body_size.to_le_bytes());

        let header_crc = crc32(&bytes[..HEADER_CRC_SPAN]);
        bytes[92..].copy_from_slice(&header_crc.to_le_bytes());
        bytes
    }

    /// Target partition name as a string
    #[must_use]
    pub fn part_name_str(&self) -> &str {
        str_field(&self.part_name)
    }

    /// Firmware version as a string
    #[must_use]
    pub fn fw_version_str(&self) -> &str {
        str_field(&self.fw_version)
    }
}

fn le16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn le32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn section<const N: usize>(bytes: &[u8], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[at..at + N]);
    out
}

fn padded<const N: usize>(value: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    let n = value.len().min(N);
    out[..n].copy_from_slice(&value[..n]);
    out
}

fn str_field(field: &[u8]) -> &str {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    core::str::from_utf8(&field[..end]).unwrap_or("")
}

/// Read and validate the package header at the start of `patch_part`
pub fn read_header<F: FlashDevice>(
    flash: &mut F,
    patch_part: &Partition,
) -> PatchResult<PackageHeader> {
    let mut bytes = [0u8; PackageHeader::SIZE];
    patch_part
        .read(flash, 0, &mut bytes)
        .map_err(|_| PatchError::FlashRead)?;
    PackageHeader::from_bytes(&bytes)
}

/// Streamed CRC32 over a partition span
pub fn partition_crc32<F: FlashDevice>(
    flash: &mut F,
    part: &Partition,
    offset: u32,
    len: u32,
) -> PatchResult<u32> {
    let mut crc = Crc32::new();
    let mut chunk = [0u8; CRC_CHUNK];
    let mut done = 0u32;

    while done < len {
        let step = CRC_CHUNK.min((len - done) as usize);
        part.read(flash, offset + done, &mut chunk[..step])
            .map_err(|_| PatchError::FlashRead)?;
        crc.update(&chunk[..step]);
        done += step as u32;
    }
    Ok(crc.finalize())
}

/// Apply a packaged update to `old_part` in place
///
/// Validates the container per `config`, runs the patch session against the
/// body, then verifies the CRC of the produced image. Image verification
/// failure surfaces after the partition has already been rewritten.
pub fn apply_package<F, B, D>(
    flash: &mut F,
    decoder: &mut D,
    buffer: B,
    patch_part: Partition,
    old_part: Partition,
    config: &PatchConfig,
    log: &mut LogBuffer,
) -> PatchResult<()>
where
    F: FlashDevice,
    B: CommitBuffer<F>,
    D: DeltaDecoder,
{
    let mut bytes = [0u8; PackageHeader::SIZE];
    patch_part
        .read(flash, 0, &mut bytes)
        .map_err(|_| PatchError::FlashRead)?;

    let parsed = if config.verify_header_crc {
        PackageHeader::from_bytes(&bytes)
    } else {
        PackageHeader::parse(&bytes)
    };
    let header = match parsed {
        Ok(header) => header,
        Err(e) => {
            log_error!(log, MODULE, "Rejected update package: {}", e);
            return Err(e);
        }
    };

    if header.algo != ALGO_DELTA_PATCH {
        log_error!(log, MODULE, "Unsupported package algo {:#06x}", header.algo);
        return Err(PatchError::PackageInvalid);
    }

    let body_space = patch_part.len().saturating_sub(PackageHeader::SIZE as u32);
    if header.body_size == 0 || header.body_size > body_space {
        log_error!(
            log,
            MODULE,
            "Package body of {} bytes does not fit '{}'",
            header.body_size,
            patch_part.name()
        );
        return Err(PatchError::PackageInvalid);
    }

    log_info!(
        log,
        MODULE,
        "Update package {}: {} patch bytes -> {} image bytes",
        header.fw_version_str(),
        header.body_size,
        header.raw_size
    );

    if config.verify_body_crc {
        let crc = partition_crc32(flash, &patch_part, PackageHeader::SIZE as u32, header.body_size)?;
        if crc != header.body_crc {
            log_error!(log, MODULE, "Patch body CRC mismatch");
            return Err(PatchError::PackageCrcMismatch);
        }
    }

    let request = PatchRequest {
        patch_part,
        old_part,
        patch_offset: PackageHeader::SIZE as u32,
        patch_len: header.body_size,
        newer_len: header.raw_size,
    };
    release_patch(flash, decoder, buffer, &request, log)?;

    if config.verify_image_crc {
        let crc = partition_crc32(flash, &old_part, 0, header.raw_size)?;
        if crc != header.raw_crc {
            log_error!(log, MODULE, "Produced image CRC mismatch");
            return Err(PatchError::ImageCrcMismatch);
        }
        log_info!(log, MODULE, "Produced image CRC verified");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pb_hal::sim::SimFlash;

    fn sample_header() -> PackageHeader {
        PackageHeader::new("app", "v1.04", 1_760_000_000, 0x1234_5678, 300, 0x9ABC_DEF0, 70000)
    }

    #[test]
    fn test_header_round_trip() {
        let bytes = sample_header().to_bytes();
        let parsed = PackageHeader::from_bytes(&bytes).unwrap();

        assert_eq!(parsed.algo, ALGO_DELTA_PATCH);
        assert_eq!(parsed.algo2, ALGO2_CRC32);
        assert_eq!(parsed.part_name_str(), "app");
        assert_eq!(parsed.fw_version_str(), "v1.04");
        assert_eq!(parsed.body_size, 300);
        assert_eq!(parsed.raw_size, 70000);
        assert_eq!(parsed.header_crc, crc32(&bytes[..HEADER_CRC_SPAN]));
    }

    #[test]
    fn test_header_bad_magic_rejected() {
        let mut bytes = sample_header().to_bytes();
        bytes[0] = b'X';
        assert_eq!(
            PackageHeader::from_bytes(&bytes),
            Err(PatchError::PackageInvalid)
        );
    }

    #[test]
    fn test_header_bad_crc_rejected() {
        let mut bytes = sample_header().to_bytes();
        bytes[30] ^= 0xFF;
        assert_eq!(
            PackageHeader::from_bytes(&bytes),
            Err(PatchError::PackageCrcMismatch)
        );
    }

    #[test]
    fn test_header_too_short_rejected() {
        assert_eq!(
            PackageHeader::from_bytes(&[0u8; 40]),
            Err(PatchError::PackageInvalid)
        );
    }

    #[test]
    fn test_partition_crc32_streams() {
        let mut flash = SimFlash::new(2, 4096);
        let part = Partition::new("patch", 0, 4096);
        let data: [u8; 1000] = core::array::from_fn(|i| (i * 7) as u8);
        part.write(&mut flash, 0, &data).unwrap();

        let streamed = partition_crc32(&mut flash, &part, 0, 1000).unwrap();
        assert_eq!(streamed, crc32(&data));
    }

    #[test]
    fn test_read_header_from_flash() {
        let mut flash = SimFlash::new(2, 4096);
        let part = Partition::new("patch", 0, 8192);
        part.write(&mut flash, 0, &sample_header().to_bytes()).unwrap();

        let header = read_header(&mut flash, &part).unwrap();
        assert_eq!(header, sample_header_with_crc());
    }

    fn sample_header_with_crc() -> PackageHeader {
        let bytes = sample_header().to_bytes();
        PackageHeader::from_bytes(&bytes).unwrap()
    }
}
