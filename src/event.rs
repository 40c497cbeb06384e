// SPDX-License-Identifier: MIT OR Apache-2.0

//! Logical transfer events and the small enums passed alongside them.

use bitflags::bitflags;
use core::error::Error;
use core::fmt::{self, Display, Formatter};

bitflags! {
    /// Logical events of an asynchronous transfer.
    ///
    /// Used twice: as the per-instance *event interest mask* requested by the
    /// start calls, and as the result of [`SerialAsync::dispatch`], which only
    /// ever contains events that are also in the interest mask.
    ///
    /// [`SerialAsync::dispatch`]: crate::SerialAsync::dispatch
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct Event: u32 {
        /// The last element of a transmission left the shift register.
        const TX_COMPLETE = 1 << 0;
        /// The receive buffer has been filled.
        const RX_COMPLETE = 1 << 8;
        /// The configured match character has been received. The reception is
        /// terminated early.
        const RX_CHARACTER_MATCH = 1 << 9;
        /// A received element had a parity error.
        const RX_PARITY_ERROR = 1 << 10;
        /// A received element had a framing error.
        const RX_FRAMING_ERROR = 1 << 11;
        /// An element was received while the previous one was not yet read.
        const RX_OVERRUN_ERROR = 1 << 12;

        /// All events of the transmit class.
        const TX_ALL = Self::TX_COMPLETE.bits();
        /// All events of the receive class.
        const RX_ALL = Self::RX_COMPLETE.bits()
            | Self::RX_CHARACTER_MATCH.bits()
            | Self::RX_PARITY_ERROR.bits()
            | Self::RX_FRAMING_ERROR.bits()
            | Self::RX_OVERRUN_ERROR.bits();
        /// All error events.
        const RX_ERRORS = Self::RX_PARITY_ERROR.bits()
            | Self::RX_FRAMING_ERROR.bits()
            | Self::RX_OVERRUN_ERROR.bits();
    }
}

/// Line errors detected by the receiver.
///
/// As these are status conditions, they can be converted to [`Event`]s, via
/// [`TryFrom`]. [`LineError::Noise`] has no event counterpart: it is always
/// cleared silently.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineError {
    /// Parity check error.
    Parity,
    /// Framing error: de-synchronization, excessive noise or a break
    /// character.
    Framing,
    /// Noise detected on a received frame.
    Noise,
    /// A character was received while the data register still held the
    /// previous one.
    Overrun,
}

/// The error type returned when a [`LineError`] has no [`Event`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NoEventError(pub LineError);

impl Display for NoEventError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "line error {:?} is never reported as event", self.0)
    }
}

impl Error for NoEventError {}

impl TryFrom<LineError> for Event {
    type Error = NoEventError;

    fn try_from(error: LineError) -> Result<Self, Self::Error> {
        Ok(match error {
            LineError::Parity => Self::RX_PARITY_ERROR,
            LineError::Framing => Self::RX_FRAMING_ERROR,
            LineError::Overrun => Self::RX_OVERRUN_ERROR,
            LineError::Noise => return Err(NoEventError(error)),
        })
    }
}

/// The interrupt kinds of the character-by-character interrupt mode.
///
/// See [`SerialAsync::set_irq`].
///
/// [`SerialAsync::set_irq`]: crate::SerialAsync::set_irq
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerialIrq {
    /// A character has been received and can be read.
    Rx,
    /// The transmit data register is empty and can be written.
    Tx,
}

/// A suggestion on how to use DMA for a transfer.
///
/// Accepted by the start calls for API compatibility. DMA is not implemented
/// and every hint is treated as [`DmaUsage::Never`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaUsage {
    /// Don't use DMA.
    #[default]
    Never,
    /// Use DMA if a channel is available.
    Opportunistic,
    /// Always use DMA.
    Always,
    /// Allocate a channel only for the duration of the transfer.
    Temporary,
    /// A channel has already been allocated.
    Allocated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes_are_disjoint() {
        assert!(Event::TX_ALL.intersection(Event::RX_ALL).is_empty());
        assert!(Event::RX_ALL.contains(Event::RX_ERRORS));
        assert_eq!(Event::TX_ALL | Event::RX_ALL, Event::all());
    }

    #[test]
    fn test_line_error_to_event() {
        assert_eq!(
            Event::try_from(LineError::Parity),
            Ok(Event::RX_PARITY_ERROR)
        );
        assert_eq!(
            Event::try_from(LineError::Framing),
            Ok(Event::RX_FRAMING_ERROR)
        );
        assert_eq!(
            Event::try_from(LineError::Overrun),
            Ok(Event::RX_OVERRUN_ERROR)
        );
        assert_eq!(
            Event::try_from(LineError::Noise),
            Err(NoEventError(LineError::Noise))
        );
    }
}
