// SPDX-License-Identifier: Apache-2.0
// Copyright 2025-2026 PatchBoot Project

//! Jump to the application
//!
//! Cortex-M hand-off sequence: read the application's initial stack pointer
//! and reset vector from the base of its vector table, sanity-check both
//! against the platform memory map, disable interrupts, pulse the clock
//! controller's peripheral reset lines, clear NVIC and SysTick state, load
//! MSP and branch. Validation failures return to the caller so it can fall
//! into recovery instead of jumping into erased flash.

use core::ptr;

use pb_common::{log_error, log_info, Error, LogBuffer, MemoryLayout};

const MODULE: &str = "boot";

// Cortex-M system control registers used to quiesce the core before the
// jump. NVIC ICER/ICPR are arrays of 8 words covering 240 interrupt lines.
#[cfg(target_arch = "arm")]
const NVIC_ICER: u32 = 0xE000_E180;
#[cfg(target_arch = "arm")]
const NVIC_ICPR: u32 = 0xE000_E280;
#[cfg(target_arch = "arm")]
const SYST_CSR: u32 = 0xE000_E010;
#[cfg(target_arch = "arm")]
const SYST_RVR: u32 = 0xE000_E014;
#[cfg(target_arch = "arm")]
const SYST_CVR: u32 = 0xE000_E018;

// Peripheral reset registers of the clock controller, per target family.
// Every AHB/APB reset line is pulsed before the jump so the application
// inherits power-on peripheral state.
#[cfg(all(target_arch = "arm", feature = "at32f403a"))]
const CRM_APB2RST: u32 = 0x4002_100C;
#[cfg(all(target_arch = "arm", feature = "at32f403a"))]
const CRM_APB1RST: u32 = 0x4002_1010;
#[cfg(all(target_arch = "arm", feature = "at32f403a"))]
const CRM_AHBRST: u32 = 0x4002_1028;

#[cfg(all(target_arch = "arm", feature = "stm32f4"))]
const RCC_AHB1RSTR: u32 = 0x4002_3810;
#[cfg(all(target_arch = "arm", feature = "stm32f4"))]
const RCC_AHB2RSTR: u32 = 0x4002_3814;
#[cfg(all(target_arch = "arm", feature = "stm32f4"))]
const RCC_AHB3RSTR: u32 = 0x4002_3818;
#[cfg(all(target_arch = "arm", feature = "stm32f4"))]
const RCC_APB1RSTR: u32 = 0x4002_3820;
#[cfg(all(target_arch = "arm", feature = "stm32f4"))]
const RCC_APB2RSTR: u32 = 0x4002_3824;

/// The two words at the base of a Cortex-M vector table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorTable {
    /// Initial main stack pointer
    pub initial_sp: u32,
    /// Reset handler address (Thumb bit set)
    pub reset_vector: u32,
}

impl VectorTable {
    /// Read the vector table head at `base`
    ///
    /// # Safety
    ///
    /// `base` must point at readable, memory-mapped flash holding at least
    /// eight bytes.
    #[must_use]
    pub unsafe fn read_from(base: u32) -> Self {
        // Volatile: the table lives in flash that this bootloader rewrites.
        Self {
            initial_sp: ptr::read_volatile(base as *const u32),
            reset_vector: ptr::read_volatile((base + 4) as *const u32),
        }
    }

    /// Check the table against the platform memory map
    ///
    /// The stack pointer must land in RAM and the reset handler in the
    /// application flash region. Erased flash (all 0xFF words) fails both.
    #[must_use]
    pub fn plausible(&self, layout: &MemoryLayout) -> bool {
        layout.contains_ram(self.initial_sp) && layout.contains_app_flash(self.reset_vector & !1)
    }
}

/// Validate an application image head, logging the outcome
pub fn validate_application(
    vectors: &VectorTable,
    layout: &MemoryLayout,
    log: &mut LogBuffer,
) -> Result<(), Error> {
    if !vectors.plausible(layout) {
        log_error!(
            log,
            MODULE,
            "No legitimate application: sp={:#010x} pc={:#010x}",
            vectors.initial_sp,
            vectors.reset_vector
        );
        return Err(Error::NoBootableImage);
    }
    Ok(())
}

/// Validate the application at `base` and transfer control to it
///
/// On success this function does not return. It returns an error when the
/// vector table fails validation, or unconditionally on targets where the
/// hand-off is not implemented (host builds).
pub fn boot_application(
    base: u32,
    layout: &MemoryLayout,
    log: &mut LogBuffer,
) -> Result<(), Error> {
    // SAFETY: `base` designates the application partition in memory-mapped
    // flash; the caller selected it from the platform layout.
    let vectors = unsafe { VectorTable::read_from(base) };
    validate_application(&vectors, layout, log)?;

    log_info!(log, MODULE, "Jumping to application at {:#010x}", base);

    #[cfg(target_arch = "arm")]
    {
        quiesce();
        // SAFETY: vectors were validated against the memory map and the
        // core is quiesced; this is the standard Cortex-M hand-off.
        unsafe { jump(&vectors) }
    }

    #[cfg(not(target_arch = "arm"))]
    {
        let _ = vectors;
        Err(Error::Unsupported)
    }
}

/// Disable interrupt and peripheral state the application does not expect
/// to inherit
#[cfg(target_arch = "arm")]
fn quiesce() {
    // SAFETY: disabling interrupts first keeps a late IRQ from observing
    // the half-reset state below.
    unsafe {
        core::arch::asm!("cpsid i", options(nomem, nostack, preserves_flags));
    }

    reset_peripherals();

    // SAFETY: writes to architecturally defined Cortex-M registers, always
    // accessible in the privileged bootloader context.
    unsafe {
        for i in 0..8u32 {
            ptr::write_volatile((NVIC_ICER + i * 4) as *mut u32, 0xFFFF_FFFF);
            ptr::write_volatile((NVIC_ICPR + i * 4) as *mut u32, 0xFFFF_FFFF);
        }

        ptr::write_volatile(SYST_CSR as *mut u32, 0);
        ptr::write_volatile(SYST_RVR as *mut u32, 0);
        ptr::write_volatile(SYST_CVR as *mut u32, 0);
    }
}

/// Force every AHB/APB peripheral through reset
///
/// The bootloader's clock and peripheral configuration must not leak into
/// the application; after the pulse the hardware is back at its power-on
/// defaults, clocks gated off included.
#[cfg(target_arch = "arm")]
fn reset_peripherals() {
    #[cfg(feature = "at32f403a")]
    // SAFETY: CRM reset registers are writable in the privileged bootloader
    // context; interrupts are disabled, so no handler can touch a
    // peripheral while its reset line is held.
    unsafe {
        pulse_reset(CRM_AHBRST);
        pulse_reset(CRM_APB1RST);
        pulse_reset(CRM_APB2RST);
    }

    #[cfg(feature = "stm32f4")]
    // SAFETY: as above for the RCC reset registers.
    unsafe {
        pulse_reset(RCC_AHB1RSTR);
        pulse_reset(RCC_AHB2RSTR);
        pulse_reset(RCC_AHB3RSTR);
        pulse_reset(RCC_APB1RSTR);
        pulse_reset(RCC_APB2RSTR);
    }
}

/// Assert and release every reset line in one clock-controller register
///
/// # Safety
///
/// `register` must be a peripheral reset register of the clock controller
/// and no peripheral behind it may be in use.
#[cfg(target_arch = "arm")]
unsafe fn pulse_reset(register: u32) {
    ptr::write_volatile(register as *mut u32, 0xFFFF_FFFF);
    ptr::write_volatile(register as *mut u32, 0x0000_0000);
}

/// Load the application stack pointer and branch to its reset handler
///
/// # Safety
///
/// The vector table must have been validated and the core quiesced.
#[cfg(target_arch = "arm")]
unsafe fn jump(vectors: &VectorTable) -> ! {
    core::arch::asm!(
        "msr msp, {sp}",
        "isb",
        "bx {pc}",
        sp = in(reg) vectors.initial_sp,
        pc = in(reg) vectors.reset_vector,
        options(noreturn),
    );
}
