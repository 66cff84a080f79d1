// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 PatchBoot Project

//! PatchBoot in-place differential update engine
//!
//! Applies a binary delta to the resident application partition **in
//! place**: the old firmware is read while the new firmware is written over
//! it. A bounded commit buffer decouples the two, so no byte of the old
//! image is destroyed before the delta decoder is done reading it.
//!
//! # How a session runs
//!
//! 1. The decoder pulls patch bytes as a stream ([`PatchIo::read_patch`])
//!    and old-image bytes by address ([`PatchIo::read_old`]).
//! 2. Decoded new-image bytes ([`PatchIo::write_new`]) accumulate in the
//!    commit buffer - a swap partition ([`FlashSwapBuffer`]) or a RAM block
//!    ([`RamBuffer`]).
//! 3. Whenever the buffer fills, its contents are committed: the consumed
//!    region of the old partition is erased and the buffered bytes take its
//!    place.
//! 4. After the decoder finishes, the residue is flushed, the partition
//!    tail beyond the new image is erased, and the committed length is
//!    checked against the expected image size.
//!
//! Because commits only ever overwrite old-image bytes the decoder has
//! already consumed, a session that fails midway leaves the partition
//! partially rewritten - recovering from that is the caller's policy.
//!
//! # Features
//!
//! - `flash-swap` (default): [`release_patch_default`] buffers through a
//!   named swap partition.
//! - `ram-buffer`: [`release_patch_default`] buffers through caller RAM.
//!
//! Exactly one strategy feature must be enabled.

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

#[cfg(all(feature = "flash-swap", feature = "ram-buffer"))]
compile_error!("select exactly one buffer strategy: `flash-swap` or `ram-buffer`");

#[cfg(not(any(feature = "flash-swap", feature = "ram-buffer")))]
compile_error!("no buffer strategy selected: enable `flash-swap` or `ram-buffer`");

pub mod buffer;
pub mod codec;
pub mod decoder;
pub mod error;
pub mod package;
pub mod session;
pub mod strategy;

pub use buffer::{CommitBuffer, FlashSwapBuffer, RamBuffer};
pub use codec::StreamDecoder;
pub use decoder::{DeltaDecoder, PatchIo};
pub use error::{PatchError, PatchResult};
pub use package::{apply_package, PackageHeader};
pub use session::{release_patch, PatchRequest, PatchSession};
pub use strategy::release_patch_default;
