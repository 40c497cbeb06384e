// SPDX-License-Identifier: MIT OR Apache-2.0

//! The interface between the transfer engine and a serial peripheral.
//!
//! [`Peripheral`] is everything [`SerialAsync`] needs from the hardware: the
//! status flags, the interrupt source enables, the data register and the
//! peripheral's own interrupt-driven transfer-state machine. [`Usart`] is the
//! implementation for STM32 USART register blocks.
//!
//! [`SerialAsync`]: crate::SerialAsync
//! [`Usart`]: crate::Usart

use crate::error::BusyError;
use bitflags::bitflags;
use core::ptr::NonNull;

/// A transfer direction. Both directions operate independently (full duplex).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Transmission.
    Tx,
    /// Reception.
    Rx,
}

/// The transfer-state reported by the peripheral.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HwState {
    /// No transfer in any direction.
    #[default]
    Ready,
    /// A transmission is ongoing.
    BusyTx,
    /// A reception is ongoing.
    BusyRx,
    /// Both directions are busy.
    BusyTxRx,
}

impl HwState {
    /// Returns whether `direction` is busy.
    #[must_use]
    pub const fn is_busy(self, direction: Direction) -> bool {
        matches!(
            (self, direction),
            (Self::BusyTx | Self::BusyTxRx, Direction::Tx)
                | (Self::BusyRx | Self::BusyTxRx, Direction::Rx)
        )
    }

    /// Returns the state with `direction` marked busy.
    #[must_use]
    pub const fn with(self, direction: Direction) -> Self {
        match (self, direction) {
            (Self::Ready | Self::BusyTx, Direction::Tx) => Self::BusyTx,
            (Self::Ready | Self::BusyRx, Direction::Rx) => Self::BusyRx,
            _ => Self::BusyTxRx,
        }
    }

    /// Returns the state with `direction` marked idle.
    ///
    /// If both directions were busy, the other one stays busy. A state in
    /// which `direction` was not busy is returned unchanged.
    #[must_use]
    pub const fn without(self, direction: Direction) -> Self {
        match (self, direction) {
            (Self::BusyTxRx, Direction::Tx) => Self::BusyRx,
            (Self::BusyTxRx, Direction::Rx) => Self::BusyTx,
            (Self::BusyTx, Direction::Tx) | (Self::BusyRx, Direction::Rx) => Self::Ready,
            (state, _) => state,
        }
    }
}

bitflags! {
    /// Hardware status flags of a serial peripheral.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct Status: u8 {
        /// The transmit data register is empty.
        const TX_EMPTY = 1 << 0;
        /// The transmission of the last frame is complete.
        const TX_COMPLETE = 1 << 1;
        /// The receive data register holds a character.
        const RX_NOT_EMPTY = 1 << 2;
        /// Parity error.
        const PARITY_ERROR = 1 << 3;
        /// Framing error.
        const FRAMING_ERROR = 1 << 4;
        /// Noise error.
        const NOISE_ERROR = 1 << 5;
        /// Overrun error.
        const OVERRUN_ERROR = 1 << 6;
    }
}

bitflags! {
    /// Interrupt sources of a serial peripheral.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct Sources: u8 {
        /// Transmit data register empty.
        const TX_EMPTY = 1 << 0;
        /// Transmission complete.
        const TX_COMPLETE = 1 << 1;
        /// Receive data register not empty (also raised on overrun).
        const RX_NOT_EMPTY = 1 << 2;
        /// Parity error.
        const PARITY = 1 << 3;
        /// Framing, noise and overrun errors.
        const ERROR = 1 << 4;
    }
}

/// Access to a serial peripheral as needed by [`SerialAsync`].
///
/// Besides register access, implementations own the element-by-element
/// transfer machinery: [`Peripheral::begin_transmit`] and
/// [`Peripheral::begin_receive`] arm it, [`Peripheral::service`] moves data
/// from within the interrupt handler and updates [`Peripheral::state`] when a
/// direction finishes.
///
/// [`SerialAsync`]: crate::SerialAsync
pub trait Peripheral {
    /// Reads the current status flags.
    fn status(&mut self) -> Status;

    /// Returns the currently enabled interrupt sources.
    fn sources(&mut self) -> Sources;

    /// Enables the given interrupt sources, leaving others untouched.
    fn enable_sources(&mut self, sources: Sources);

    /// Disables the given interrupt sources, leaving others untouched.
    fn disable_sources(&mut self, sources: Sources);

    /// Acknowledges the given status flags.
    ///
    /// Flags that can only be cleared as a side effect of data register
    /// accesses are ignored.
    fn clear(&mut self, flags: Status);

    /// Reads the data register.
    ///
    /// This has side effects: it pops the received character and clears
    /// [`Status::RX_NOT_EMPTY`].
    fn read_data(&mut self) -> u8;

    /// Writes the data register.
    fn write_data(&mut self, byte: u8);

    /// Returns the transfer-state.
    fn state(&self) -> HwState;

    /// Overrides the transfer-state.
    fn set_state(&mut self, state: HwState);

    /// Returns the length of the current (or last) reception.
    fn rx_transfer_size(&self) -> usize;

    /// Returns how many elements of the current reception are outstanding.
    fn rx_remaining(&self) -> usize;

    /// Returns how many elements of the current transmission are outstanding.
    fn tx_remaining(&self) -> usize;

    /// Sets the outstanding transmit count to zero.
    fn reset_tx_count(&mut self);

    /// Sets the outstanding receive count to zero.
    fn reset_rx_count(&mut self);

    /// Starts an interrupt-driven transmission of `len` bytes at `data`.
    ///
    /// Enables the transmit data register empty interrupt source.
    ///
    /// # Safety
    ///
    /// `data` must be valid for reads of `len` bytes until the transmission
    /// has finished or was aborted.
    unsafe fn begin_transmit(&mut self, data: NonNull<u8>, len: usize) -> Result<(), BusyError>;

    /// Starts an interrupt-driven reception of `len` bytes into `buffer`.
    ///
    /// Enables the receive, parity and error interrupt sources.
    ///
    /// # Safety
    ///
    /// `buffer` must be valid for writes of `len` bytes until the reception
    /// has finished or was aborted, and must not be accessed by anyone else
    /// meanwhile.
    unsafe fn begin_receive(&mut self, buffer: NonNull<u8>, len: usize) -> Result<(), BusyError>;

    /// Performs the transfer work of one interrupt occurrence.
    fn service(&mut self);

    /// Requests a break condition on the transmit line.
    fn send_break(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hw_state_transitions() {
        let state = HwState::Ready.with(Direction::Tx);
        assert_eq!(state, HwState::BusyTx);
        let state = state.with(Direction::Rx);
        assert_eq!(state, HwState::BusyTxRx);
        assert!(state.is_busy(Direction::Tx));
        assert!(state.is_busy(Direction::Rx));

        assert_eq!(state.without(Direction::Tx), HwState::BusyRx);
        assert_eq!(state.without(Direction::Rx), HwState::BusyTx);
        assert_eq!(HwState::BusyRx.without(Direction::Rx), HwState::Ready);
        assert_eq!(HwState::BusyTx.without(Direction::Tx), HwState::Ready);
    }

    #[test]
    fn test_without_keeps_other_direction() {
        assert_eq!(HwState::BusyTx.without(Direction::Rx), HwState::BusyTx);
        assert_eq!(HwState::BusyRx.without(Direction::Tx), HwState::BusyRx);
        assert_eq!(HwState::Ready.without(Direction::Rx), HwState::Ready);
        assert!(!HwState::BusyRx.is_busy(Direction::Tx));
        assert!(!HwState::Ready.is_busy(Direction::Rx));
    }
}
