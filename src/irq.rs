// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interface to the interrupt controller (e.g., the Cortex-M NVIC).
//!
//! The engine never routes interrupts itself: it assigns the caller's
//! [`Vector`] to the instance's [`IrqLine`] and the controller does the rest.

use crate::config::Priority;
use core::fmt::{self, Debug, Formatter};

/// An interrupt line (IRQ number) of the interrupt controller.
///
/// One line may be shared by two adjacent instances, e.g., USART4 and USART5
/// on STM32L0 parts.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IrqLine(pub u16);

/// An interrupt handler entry, as written into the vector table.
#[derive(Copy, Clone)]
pub struct Vector(pub extern "C" fn());

impl Vector {
    /// Returns the address of the handler.
    #[must_use]
    pub fn address(self) -> usize {
        self.0 as usize
    }
}

impl Debug for Vector {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Vector({:#x})", self.address())
    }
}

/// The operations the engine needs from the interrupt controller, per line.
pub trait InterruptController {
    /// Clears a pending interrupt on `line`.
    fn clear_pending(&mut self, line: IrqLine);

    /// Disables `line`.
    fn disable(&mut self, line: IrqLine);

    /// Enables `line`.
    fn enable(&mut self, line: IrqLine);

    /// Sets the priority of `line`.
    fn set_priority(&mut self, line: IrqLine, priority: Priority);

    /// Makes `vector` the handler of `line`.
    fn set_vector(&mut self, line: IrqLine, vector: Vector);
}
