// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 PatchBoot Project

//! PatchBoot application hand-off
//!
//! The last stage of the bootloader: validate the application's vector
//! table and transfer control to it. Runs after any pending in-place update
//! has completed, so the partition either holds the freshly patched image
//! or the old one.
//!
//! # Features
//!
//! - `stm32f4` (default) / `at32f403a`: target family, selecting the clock
//!   controller whose peripheral reset lines are pulsed before the jump.
//!   Exactly one must be enabled.

#![no_std]
#![warn(missing_docs)]

#[cfg(all(feature = "stm32f4", feature = "at32f403a"))]
compile_error!("select exactly one target family: `stm32f4` or `at32f403a`");

#[cfg(not(any(feature = "stm32f4", feature = "at32f403a")))]
compile_error!("no target family selected: enable `stm32f4` or `at32f403a`");

pub mod jump;

pub use jump::{boot_application, validate_application, VectorTable};
