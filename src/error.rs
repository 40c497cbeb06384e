// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors that can happen when setting up a [`SerialAsync`] or its
//! peripherals.
//!
//! Note that transfer-level problems (line errors, contention) are never
//! reported through these types: line errors surface as [`Event`]s from the
//! dispatcher and contention is answered by silently rejecting the request.
//!
//! [`Event`]: crate::Event

use crate::backend::MmioAddress;
use crate::config::Priority;
use core::error::Error;
use core::fmt::Display;

#[cfg(doc)]
use crate::SerialAsync;

/// The specified address is invalid because it is either null, unaligned or
/// doesn't offer [`offsets::MAX`] subsequent addresses.
///
/// [`offsets::MAX`]: crate::registers::offsets::MAX
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InvalidAddressError(pub(crate) MmioAddress);

impl Display for InvalidAddressError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "invalid register block address: {:x?}", self.0)
    }
}

impl Error for InvalidAddressError {}

/// Errors that can happen when a [`Config`] is validated.
///
/// [`Config`]: crate::Config
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Transmit and receive use the same interrupt priority.
    ///
    /// The priorities must differ so that neither direction can be starved by
    /// the other.
    SamePriority(Priority),
    /// The priority does not fit into the implemented priority bits of the
    /// interrupt controller.
    PriorityOutOfRange {
        /// The rejected priority.
        priority: Priority,
        /// The number of levels the interrupt controller implements.
        levels: u8,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::SamePriority(priority) => {
                write!(
                    f,
                    "transmit and receive must use different priorities, both are {}",
                    priority.level()
                )
            }
            Self::PriorityOutOfRange { priority, levels } => {
                write!(
                    f,
                    "priority {} exceeds the {levels} implemented levels",
                    priority.level()
                )
            }
        }
    }
}

impl Error for ConfigError {}

/// The peripheral refused to start a transfer because the requested
/// direction is still busy.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusyError;

impl Display for BusyError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "the transfer direction is busy")
    }
}

impl Error for BusyError {}
