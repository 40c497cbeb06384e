// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for [`SerialAsync`].
//!
//! [`SerialAsync`]: crate::SerialAsync

use crate::error::ConfigError;

/// Interrupt priority of a transfer direction.
///
/// Lower values are more urgent, as usual for ARM interrupt controllers. The
/// value is passed as-is to [`InterruptController::set_priority`].
///
/// [`InterruptController::set_priority`]: crate::InterruptController::set_priority
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Priority(u8);

impl Priority {
    /// Default level for interrupt-driven reception.
    ///
    /// Reception is more urgent than transmission: an unserviced receive
    /// register overruns, an unserviced transmit register only idles the line.
    pub const RECEIVE: Self = Self(0);

    /// Default level for interrupt-driven transmission.
    pub const TRANSMIT: Self = Self(1);

    /// Creates a priority from a raw level.
    #[must_use]
    pub const fn new(level: u8) -> Self {
        Self(level)
    }

    /// Returns the raw level.
    #[must_use]
    pub const fn level(self) -> u8 {
        self.0
    }
}

/// Configuration for [`SerialAsync`].
///
/// [`SerialAsync`]: crate::SerialAsync
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Priority of the interrupt line while a transmission is started.
    pub tx_priority: Priority,
    /// Priority of the interrupt line while a reception is started.
    pub rx_priority: Priority,
    /// The number of priority levels the interrupt controller implements.
    ///
    /// Cortex-M0+ parts implement four.
    pub priority_levels: u8,
}

impl Config {
    /// Checks that the priorities differ and fit into the implemented
    /// priority levels.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tx_priority == self.rx_priority {
            return Err(ConfigError::SamePriority(self.tx_priority));
        }
        for priority in [self.tx_priority, self.rx_priority] {
            if priority.level() >= self.priority_levels {
                return Err(ConfigError::PriorityOutOfRange {
                    priority,
                    levels: self.priority_levels,
                });
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tx_priority: Priority::TRANSMIT,
            rx_priority: Priority::RECEIVE,
            priority_levels: 4,
        }
    }
}
