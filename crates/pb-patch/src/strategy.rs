// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 PatchBoot Project

//! Compile-time buffer strategy selection
//!
//! [`release_patch_default`] is the firmware-facing entry point: it picks
//! the commit buffer from the build configuration, so call sites carry no
//! strategy knowledge. The `storage` slice doubles as the flash-to-flash
//! copy scratch (flash-swap) or as the commit buffer itself (ram-buffer).
//!
//! Both buffer types stay available through
//! [`release_patch`](crate::release_patch) regardless of the selected
//! feature.

use cfg_if::cfg_if;
use pb_common::{log_info, LogBuffer, PatchConfig};
use pb_hal::{FlashDevice, PartitionTable};

use crate::decoder::DeltaDecoder;
use crate::error::PatchResult;
use crate::session::{release_patch, PatchRequest};

const MODULE: &str = "patch";

cfg_if! {
    if #[cfg(feature = "flash-swap")] {
        use pb_common::log_error;

        use crate::buffer::FlashSwapBuffer;
        use crate::error::PatchError;

        /// Apply a patch using the buffer strategy selected at build time
        ///
        /// Flash-swap build: the swap partition named in `config` is looked
        /// up in `partitions` and `storage` serves as the copy scratch.
        pub fn release_patch_default<F, D>(
            flash: &mut F,
            partitions: &PartitionTable,
            decoder: &mut D,
            storage: &mut [u8],
            request: &PatchRequest,
            config: &PatchConfig,
            log: &mut LogBuffer,
        ) -> PatchResult<()>
        where
            F: FlashDevice,
            D: DeltaDecoder,
        {
            let swap = match partitions.find(config.swap_partition) {
                Some(swap) => *swap,
                None => {
                    log_error!(
                        log,
                        MODULE,
                        "Swap partition '{}' not found",
                        config.swap_partition
                    );
                    return Err(PatchError::SwapPartitionMissing);
                }
            };

            log_info!(
                log,
                MODULE,
                "Using flash swap strategy via '{}'",
                swap.name()
            );
            let chunk = config.copy_chunk.min(storage.len());
            let buffer = FlashSwapBuffer::new(swap, config.swap_offset, &mut storage[..chunk]);
            release_patch(flash, decoder, buffer, request, log)
        }
    } else if #[cfg(feature = "ram-buffer")] {
        use crate::buffer::RamBuffer;

        /// Apply a patch using the buffer strategy selected at build time
        ///
        /// RAM build: `storage` is the commit buffer; it must span at least
        /// one sector of the target device and a whole number of sectors.
        pub fn release_patch_default<F, D>(
            flash: &mut F,
            _partitions: &PartitionTable,
            decoder: &mut D,
            storage: &mut [u8],
            request: &PatchRequest,
            config: &PatchConfig,
            log: &mut LogBuffer,
        ) -> PatchResult<()>
        where
            F: FlashDevice,
            D: DeltaDecoder,
        {
            let len = config.ram_buffer.min(storage.len());
            log_info!(log, MODULE, "Using RAM buffer strategy, {} bytes", len);
            let buffer = RamBuffer::new(&mut storage[..len]);
            release_patch(flash, decoder, buffer, request, log)
        }
    }
}
