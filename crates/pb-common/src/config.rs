// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 PatchBoot Project

//! Compile-time configuration for PatchBoot
//!
//! All configuration is fixed at build time; the bootloader accepts no
//! runtime configuration changes.

/// Patch engine configuration
///
/// Buffer sizing rules: the commit buffer (swap window or RAM block) must be
/// at least one flash sector and a whole multiple of the sector size, so
/// that every intermediate commit erases whole sectors on the target
/// partition.
#[derive(Debug, Clone, Copy)]
pub struct PatchConfig {
    /// Name of the swap partition used by the flash-swap strategy
    pub swap_partition: &'static str,
    /// First usable byte within the swap partition
    pub swap_offset: u32,
    /// Chunk size for flash-to-flash copies during commits
    pub copy_chunk: usize,
    /// Commit buffer size for the RAM strategy
    pub ram_buffer: usize,
    /// Verify the package header CRC before starting a session
    pub verify_header_crc: bool,
    /// Verify the patch body CRC before starting a session
    pub verify_body_crc: bool,
    /// Verify the CRC of the produced image after a successful patch
    pub verify_image_crc: bool,
}

impl PatchConfig {
    /// Default patch configuration
    pub const DEFAULT: Self = Self {
        swap_partition: "swap",
        swap_offset: 0,
        copy_chunk: 4096,
        ram_buffer: 4096,
        verify_header_crc: true,
        verify_body_crc: true,
        verify_image_crc: true,
    };
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Memory layout of the target platform
///
/// Used by the boot-stage jumper to decide whether a vector table is
/// plausible before transferring control.
#[derive(Debug, Clone, Copy)]
pub struct MemoryLayout {
    /// Flash base address
    pub flash_base: u32,
    /// Flash size in bytes
    pub flash_size: u32,
    /// RAM base address
    pub ram_base: u32,
    /// RAM size in bytes
    pub ram_size: u32,
    /// Bootloader region size at the start of flash
    pub bootloader_size: u32,
}

impl MemoryLayout {
    /// STM32F4 memory layout
    pub const STM32F4: Self = Self {
        flash_base: 0x0800_0000,
        flash_size: 1024 * 1024,
        ram_base: 0x2000_0000,
        ram_size: 192 * 1024,
        bootloader_size: 64 * 1024,
    };

    /// AT32F403A memory layout
    pub const AT32F403A: Self = Self {
        flash_base: 0x0800_0000,
        flash_size: 1024 * 1024,
        ram_base: 0x2000_0000,
        ram_size: 96 * 1024,
        bootloader_size: 48 * 1024,
    };

    /// Get the application base address (first byte after the bootloader)
    #[must_use]
    pub const fn app_base(&self) -> u32 {
        self.flash_base + self.bootloader_size
    }

    /// Check whether an address lies in the application flash region
    #[must_use]
    pub const fn contains_app_flash(&self, address: u32) -> bool {
        address >= self.app_base() && address < self.flash_base + self.flash_size
    }

    /// Check whether an address lies in RAM
    #[must_use]
    pub const fn contains_ram(&self, address: u32) -> bool {
        address >= self.ram_base && address < self.ram_base + self.ram_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_base_follows_bootloader() {
        let layout = MemoryLayout::STM32F4;
        assert_eq!(layout.app_base(), 0x0801_0000);
        assert!(!layout.contains_app_flash(layout.flash_base));
        assert!(layout.contains_app_flash(layout.app_base()));
        assert!(!layout.contains_app_flash(layout.flash_base + layout.flash_size));
    }

    #[test]
    fn test_ram_bounds() {
        let layout = MemoryLayout::AT32F403A;
        assert!(layout.contains_ram(0x2000_0000));
        assert!(layout.contains_ram(0x2001_7FFF));
        assert!(!layout.contains_ram(0x2001_8000));
        assert!(!layout.contains_ram(0x1FFF_FFFF));
    }
}
