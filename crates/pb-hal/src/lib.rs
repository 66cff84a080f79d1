// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 PatchBoot Project

//! Flash abstraction layer for PatchBoot
//!
//! The update core talks to flash through two layers:
//!
//! 1. [`FlashDevice`]: one physical NOR device with a uniform erase-sector
//!    size. Reads are byte-granular; writes require a previously erased
//!    target; erases cover whole sectors.
//! 2. [`Partition`]: a named, bounds-checked window into a device. All
//!    patch-engine I/O goes through partitions.
//!
//! The `sim` feature adds a host-side simulated device with fault injection
//! for exercising failure paths in tests.

#![cfg_attr(not(any(feature = "std", test)), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod flash;
pub mod partition;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use error::{FlashError, FlashResult};
pub use flash::FlashDevice;
pub use partition::{Partition, PartitionTable, MAX_PARTITIONS};
