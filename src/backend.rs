// SPDX-License-Identifier: MIT OR Apache-2.0

//! Abstraction over the register access backend (Hardware Abstraction Layer
//! (HAL)).
//!
//! Main exports:
//! - [`Backend`]
//! - [`MmioBackend`]

use crate::error::InvalidAddressError;
use crate::registers::offsets;
use core::ptr::{read_volatile, write_volatile};

/// Memory-mapped I/O (MMIO) address of a USART register block.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Hash)]
pub struct MmioAddress(pub(crate) *mut u32);

impl MmioAddress {
    /// Returns the address of the register at `offset`.
    fn add_offset(self, offset: u8) -> Self {
        // SAFETY: We ensure on a higher level that the base address is valid
        // and that this will not wrap.
        let address = unsafe { self.0.byte_add(offset as usize) };
        Self(address)
    }
}

fn assert_offset(offset: u8) {
    assert!(
        (offset as usize) < offsets::MAX && offset % 4 == 0,
        "the offset should be a word aligned register offset: {offset:#x}, expected: < {:#x}",
        offsets::MAX
    );
}

/// Abstraction over the register access of a USART peripheral.
///
/// This acts as Hardware Abstraction Layer (HAL). Besides [`MmioBackend`],
/// implementations may model the register file in software, e.g., for
/// simulation.
pub trait Backend {
    /// Reads the 32-bit register at the specified offset.
    ///
    /// This needs a mutable reference as reads can have side effects on the
    /// device, depending on the register (e.g., reading [`RDR`] clears RXNE).
    ///
    /// # Arguments
    ///
    /// - `offset`: Offset regarding the base address, see [`offsets`].
    ///
    /// # Safety
    ///
    /// Callers must ensure that the register is valid and safe to read.
    ///
    /// [`RDR`]: offsets::RDR
    unsafe fn read_register(&mut self, offset: u8) -> u32;

    /// Writes the 32-bit register at the specified offset.
    ///
    /// Writes can have side effects on the device, depending on the register.
    ///
    /// # Arguments
    ///
    /// - `offset`: Offset regarding the base address, see [`offsets`].
    ///
    /// # Safety
    ///
    /// Callers must ensure that the register is valid and safe to write.
    unsafe fn write_register(&mut self, offset: u8, value: u32);
}

/// MMIO-mapped USART register block.
#[derive(Debug)]
pub struct MmioBackend(pub(crate) MmioAddress /* base address, non-null */);

// SAFETY: The register block is exclusively owned, see `MmioBackend::new`.
unsafe impl Send for MmioBackend {}

impl MmioBackend {
    /// Creates a new backend for the register block at `base_address`.
    ///
    /// # Safety
    ///
    /// Callers must ensure that the address points to a USART register block
    /// that is not accessed by anyone else.
    pub unsafe fn new(base_address: *mut u32) -> Result<Self, InvalidAddressError> {
        if base_address.is_null() {
            return Err(InvalidAddressError(MmioAddress(base_address)));
        }
        if !base_address.is_aligned() {
            return Err(InvalidAddressError(MmioAddress(base_address)));
        }
        if (base_address as usize).checked_add(offsets::MAX).is_none() {
            return Err(InvalidAddressError(MmioAddress(base_address)));
        }
        Ok(Self(MmioAddress(base_address)))
    }
}

impl Backend for MmioBackend {
    unsafe fn read_register(&mut self, offset: u8) -> u32 {
        assert_offset(offset);
        let address = self.0.add_offset(offset);

        // SAFETY: The caller ensured that the MMIO address is safe to use.
        unsafe { read_volatile(address.0) }
    }

    unsafe fn write_register(&mut self, offset: u8, value: u32) {
        assert_offset(offset);
        let address = self.0.add_offset(offset);
        // SAFETY: The caller ensured that the MMIO address is safe to use.
        unsafe { write_volatile(address.0, value) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mmio_rejects_invalid_addresses() {
        // SAFETY: The addresses are rejected before they are dereferenced.
        unsafe {
            assert!(MmioBackend::new(core::ptr::null_mut()).is_err());
            assert!(MmioBackend::new(0x4000_4402 as *mut u32).is_err());
            assert!(MmioBackend::new((usize::MAX - 3) as *mut u32).is_err());
        }
    }

    #[test]
    fn test_mmio_accesses_memory() {
        let mut block = [0_u32; offsets::MAX / 4];
        // SAFETY: `block` is a valid, exclusively borrowed register block.
        let mut backend = unsafe { MmioBackend::new(block.as_mut_ptr()).unwrap() };

        // SAFETY: The offsets are valid for `block`.
        unsafe {
            backend.write_register(offsets::TDR as u8, 0x42);
            assert_eq!(backend.read_register(offsets::TDR as u8), 0x42);
            assert_eq!(backend.read_register(offsets::CR1 as u8), 0);
        }
        drop(backend);
        assert_eq!(block[offsets::TDR / 4], 0x42);
    }

    #[test]
    #[should_panic]
    fn test_unaligned_offset_panics() {
        let mut block = [0_u32; offsets::MAX / 4];
        // SAFETY: `block` is a valid, exclusively borrowed register block.
        let mut backend = unsafe { MmioBackend::new(block.as_mut_ptr()).unwrap() };
        // SAFETY: Panics before the access.
        unsafe {
            backend.read_register(1);
        }
    }
}
