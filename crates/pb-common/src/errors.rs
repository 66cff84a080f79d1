// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 PatchBoot Project

//! Error types for PatchBoot
//!
//! This module defines the unified error type used throughout the update
//! core. All errors are no_std compatible and carry no heap allocation.

use core::fmt;

/// Result type alias for PatchBoot operations
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for PatchBoot
///
/// This enum represents all failures the bootloader and update core can
/// report. The per-crate error enums (`FlashError`, `PatchError`) convert
/// into this type at the crate boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Flash Errors (0x01xx)
    // =========================================================================
    /// Flash operation failed at the device level
    FlashIoFailed,
    /// Flash access outside the device or partition bounds
    FlashOutOfBounds,
    /// Flash erase range not sector aligned
    FlashNotAligned,
    /// Flash write targeted a location that is not in the erased state
    FlashNotErased,
    /// Named partition not present in the partition table
    PartitionNotFound,

    // =========================================================================
    // Patch Errors (0x02xx)
    // =========================================================================
    /// Swap partition required by the flash-swap strategy is missing
    SwapPartitionMissing,
    /// Commit buffer smaller than a flash sector, or not a sector multiple
    BufferTooSmall,
    /// Flash read failed during a patch session
    FlashReadFailed,
    /// Flash erase failed during a patch session
    FlashEraseFailed,
    /// Flash write failed during a patch session
    FlashWriteFailed,
    /// Delta decoder reported failure or malformed patch data
    DecoderFailed,
    /// Committed length did not match the expected new image length
    LengthMismatch,

    // =========================================================================
    // Package Errors (0x03xx)
    // =========================================================================
    /// Update package header is malformed or has the wrong magic
    PackageInvalid,
    /// Package header or body CRC mismatch
    PackageCrcMismatch,
    /// CRC of the produced image does not match the package header
    ImageCrcMismatch,

    // =========================================================================
    // Boot Errors (0x04xx)
    // =========================================================================
    /// Application vector table failed validation
    NoBootableImage,

    // =========================================================================
    // General Errors (0xFFxx)
    // =========================================================================
    /// Invalid parameter provided
    InvalidParameter,
    /// Operation not supported on this platform
    Unsupported,
    /// Internal error (should not occur)
    InternalError,
}

impl Error {
    /// Get the error code for this error
    ///
    /// Error codes are organized by category:
    /// - 0x01xx: Flash errors
    /// - 0x02xx: Patch session errors
    /// - 0x03xx: Update package errors
    /// - 0x04xx: Boot errors
    /// - 0xFFxx: General errors
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            // Flash errors (0x01xx)
            Self::FlashIoFailed => 0x0101,
            Self::FlashOutOfBounds => 0x0102,
            Self::FlashNotAligned => 0x0103,
            Self::FlashNotErased => 0x0104,
            Self::PartitionNotFound => 0x0105,

            // Patch errors (0x02xx)
            Self::SwapPartitionMissing => 0x0201,
            Self::BufferTooSmall => 0x0202,
            Self::FlashReadFailed => 0x0203,
            Self::FlashEraseFailed => 0x0204,
            Self::FlashWriteFailed => 0x0205,
            Self::DecoderFailed => 0x0206,
            Self::LengthMismatch => 0x0207,

            // Package errors (0x03xx)
            Self::PackageInvalid => 0x0301,
            Self::PackageCrcMismatch => 0x0302,
            Self::ImageCrcMismatch => 0x0303,

            // Boot errors (0x04xx)
            Self::NoBootableImage => 0x0401,

            // General errors (0xFFxx)
            Self::InvalidParameter => 0xFF01,
            Self::Unsupported => 0xFF02,
            Self::InternalError => 0xFFFF,
        }
    }

    /// Check whether this failure can leave the target partition partially
    /// overwritten.
    ///
    /// Configuration errors are raised before the session touches flash;
    /// everything else surfaces mid-session, after which the old image is no
    /// longer intact and the caller must decide between recovery and reset.
    #[must_use]
    pub const fn leaves_partition_dirty(&self) -> bool {
        matches!(
            self,
            Self::FlashIoFailed
                | Self::FlashReadFailed
                | Self::FlashEraseFailed
                | Self::FlashWriteFailed
                | Self::DecoderFailed
                | Self::LengthMismatch
                | Self::ImageCrcMismatch
        )
    }

    /// Get a short description of the error
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::FlashIoFailed => "flash I/O failed",
            Self::FlashOutOfBounds => "flash access out of bounds",
            Self::FlashNotAligned => "flash erase not sector aligned",
            Self::FlashNotErased => "flash write target not erased",
            Self::PartitionNotFound => "partition not found",
            Self::SwapPartitionMissing => "swap partition missing",
            Self::BufferTooSmall => "commit buffer too small",
            Self::FlashReadFailed => "flash read failed",
            Self::FlashEraseFailed => "flash erase failed",
            Self::FlashWriteFailed => "flash write failed",
            Self::DecoderFailed => "delta decoder failed",
            Self::LengthMismatch => "new image length mismatch",
            Self::PackageInvalid => "update package invalid",
            Self::PackageCrcMismatch => "update package CRC mismatch",
            Self::ImageCrcMismatch => "produced image CRC mismatch",
            Self::NoBootableImage => "no bootable application image",
            Self::InvalidParameter => "invalid parameter",
            Self::Unsupported => "operation not supported",
            Self::InternalError => "internal error",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:04X}] {}", self.code(), self.description())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "[0x{:04X}] {}", self.code(), self.description());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_categories() {
        assert_eq!(Error::FlashIoFailed.code() >> 8, 0x01);
        assert_eq!(Error::LengthMismatch.code() >> 8, 0x02);
        assert_eq!(Error::PackageInvalid.code() >> 8, 0x03);
        assert_eq!(Error::NoBootableImage.code() >> 8, 0x04);
        assert_eq!(Error::InternalError.code(), 0xFFFF);
    }

    #[test]
    fn test_dirty_classification() {
        // Raised before the session starts: old image untouched.
        assert!(!Error::SwapPartitionMissing.leaves_partition_dirty());
        assert!(!Error::BufferTooSmall.leaves_partition_dirty());
        assert!(!Error::PackageInvalid.leaves_partition_dirty());

        // Raised mid-session: the old partition may be partially rewritten.
        assert!(Error::FlashWriteFailed.leaves_partition_dirty());
        assert!(Error::DecoderFailed.leaves_partition_dirty());
        assert!(Error::LengthMismatch.leaves_partition_dirty());
    }
}
