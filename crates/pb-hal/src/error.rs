// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 PatchBoot Project

//! Flash layer error types

use core::fmt;

/// Flash layer error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    /// Access outside the device or partition bounds
    OutOfBounds,
    /// Erase range not aligned to the sector size
    NotAligned,
    /// Write targeted a location that is not in the erased state
    NotErased,
    /// Device-level I/O failure
    Io,
}

impl FlashError {
    /// Get error code
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::OutOfBounds => 0x0102,
            Self::NotAligned => 0x0103,
            Self::NotErased => 0x0104,
            Self::Io => 0x0101,
        }
    }

    /// Get error description
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::OutOfBounds => "access out of bounds",
            Self::NotAligned => "erase range not sector aligned",
            Self::NotErased => "write target not erased",
            Self::Io => "device I/O failure",
        }
    }
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:04X}] {}", self.code(), self.description())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for FlashError {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "[0x{:04X}] {}", self.code(), self.description());
    }
}

impl From<FlashError> for pb_common::Error {
    fn from(e: FlashError) -> Self {
        match e {
            FlashError::OutOfBounds => Self::FlashOutOfBounds,
            FlashError::NotAligned => Self::FlashNotAligned,
            FlashError::NotErased => Self::FlashNotErased,
            FlashError::Io => Self::FlashIoFailed,
        }
    }
}

/// Flash layer result type
pub type FlashResult<T> = Result<T, FlashError>;
