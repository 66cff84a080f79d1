// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 PatchBoot Project

//! Patch engine error types

use core::fmt;

/// Patch engine error type
///
/// [`release_patch`](crate::release_patch) reports the session errors;
/// the package variants are produced by
/// [`apply_package`](crate::apply_package) around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchError {
    /// The configured swap partition is not in the partition table
    SwapPartitionMissing,
    /// Commit buffer smaller than a flash sector, or not a sector multiple
    BufferTooSmall,
    /// A flash read failed during the session
    FlashRead,
    /// A flash erase failed during the session
    FlashErase,
    /// A flash write failed during the session
    FlashWrite,
    /// The delta decoder rejected the patch data
    DecoderFailed,
    /// Committed bytes did not match the expected new image length
    LengthMismatch,
    /// Update package header malformed or wrong magic
    PackageInvalid,
    /// Update package header or body CRC mismatch
    PackageCrcMismatch,
    /// CRC of the produced image does not match the package header
    ImageCrcMismatch,
}

impl PatchError {
    /// Get error code
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::SwapPartitionMissing => 0x0201,
            Self::BufferTooSmall => 0x0202,
            Self::FlashRead => 0x0203,
            Self::FlashErase => 0x0204,
            Self::FlashWrite => 0x0205,
            Self::DecoderFailed => 0x0206,
            Self::LengthMismatch => 0x0207,
            Self::PackageInvalid => 0x0301,
            Self::PackageCrcMismatch => 0x0302,
            Self::ImageCrcMismatch => 0x0303,
        }
    }

    /// Get error description
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::SwapPartitionMissing => "swap partition missing",
            Self::BufferTooSmall => "commit buffer too small",
            Self::FlashRead => "flash read failed",
            Self::FlashErase => "flash erase failed",
            Self::FlashWrite => "flash write failed",
            Self::DecoderFailed => "delta decoder failed",
            Self::LengthMismatch => "new image length mismatch",
            Self::PackageInvalid => "update package invalid",
            Self::PackageCrcMismatch => "update package CRC mismatch",
            Self::ImageCrcMismatch => "produced image CRC mismatch",
        }
    }
}

impl fmt::Display for PatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:04X}] {}", self.code(), self.description())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PatchError {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "[0x{:04X}] {}", self.code(), self.description());
    }
}

impl From<PatchError> for pb_common::Error {
    fn from(e: PatchError) -> Self {
        match e {
            PatchError::SwapPartitionMissing => Self::SwapPartitionMissing,
            PatchError::BufferTooSmall => Self::BufferTooSmall,
            PatchError::FlashRead => Self::FlashReadFailed,
            PatchError::FlashErase => Self::FlashEraseFailed,
            PatchError::FlashWrite => Self::FlashWriteFailed,
            PatchError::DecoderFailed => Self::DecoderFailed,
            PatchError::LengthMismatch => Self::LengthMismatch,
            PatchError::PackageInvalid => Self::PackageInvalid,
            PatchError::PackageCrcMismatch => Self::PackageCrcMismatch,
            PatchError::ImageCrcMismatch => Self::ImageCrcMismatch,
        }
    }
}

/// Patch engine result type
pub type PatchResult<T> = Result<T, PatchError>;
