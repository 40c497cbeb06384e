// SPDX-License-Identifier: MIT OR Apache-2.0

//! # usart_async
//!
//! Interrupt-driven, non-blocking transfers for STM32-class USART
//! peripherals (e.g., STM32L0).
//!
//! A caller hands a byte buffer to [`SerialAsync::start_transmit`] or
//! [`SerialAsync::start_receive`] together with the events it is interested
//! in and returns immediately. The peripheral interrupt then moves the data,
//! and the interrupt handler registered by the caller calls
//! [`SerialAsync::dispatch`] to learn what happened: a completed
//! transmission, a filled receive buffer, a matched character or a line
//! error. Ongoing transfers can be aborted at any time.
//!
//! Besides whole-buffer transfers, a character-by-character interrupt mode is
//! available via [`SerialAsync::set_irq`] and [`SerialAsync::handle_irq`].
//!
//! ## Features
//!
//! - ✅ Full-duplex: transmit and receive operate independently
//! - ✅ Early termination of a reception on a match character
//! - ✅ `no_std`-compatible and allocation-free
//! - ✅ Hardware access behind traits ([`Backend`], [`Peripheral`],
//!   [`InterruptController`]), with [`MmioBackend`] for real hardware
//! - ✅ Optional logging via `defmt` (feature `defmt`)
//!
//! ## Focus, Scope & Limitations
//!
//! Clock, pin, baud rate and frame format configuration of the peripheral are
//! out of scope, as are blocking single-byte I/O and DMA. The DMA usage hint
//! of the start calls is accepted but ignored. Only 8-bit elements are
//! supported.
//!
//! ## Example
//!
//! ```rust,ignore
//! # use usart_async::*;
//! static SERIAL: Shared<SerialAsync<Usart<MmioBackend>, Nvic, 1>> = Shared::new();
//!
//! // SAFETY: USART2 is not used by anyone else.
//! let usart = unsafe { Usart::new_mmio(0x4000_4400 as *mut u32) }.unwrap();
//! let channels = [Channel::new(usart, IrqLine(28))];
//! SERIAL.init(SerialAsync::new(Nvic, Config::default(), channels).unwrap());
//! ```

#![no_std]
#![deny(
    clippy::all,
    clippy::cargo,
    clippy::nursery,
    clippy::must_use_candidate,
    clippy::missing_safety_doc,
    clippy::undocumented_unsafe_blocks
)]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![deny(rustdoc::all)]

#[cfg(test)]
extern crate std;

// This must go first so that the logging macros are visible to all modules.
#[macro_use]
mod fmt;

pub mod registers;

mod backend;
mod config;
mod engine;
mod error;
mod event;
mod irq;
mod peripheral;
mod shared;
#[cfg(test)]
mod sim;
mod transfer;
mod usart;

pub use crate::backend::{Backend, MmioAddress, MmioBackend};
pub use crate::config::{Config, Priority};
pub use crate::engine::{Channel, InstanceId, IrqHandler, SerialAsync};
pub use crate::error::*;
pub use crate::event::{DmaUsage, Event, LineError, NoEventError, SerialIrq};
pub use crate::irq::{InterruptController, IrqLine, Vector};
pub use crate::peripheral::{Direction, HwState, Peripheral, Sources, Status};
pub use crate::shared::Shared;
pub use crate::transfer::DirectionState;
pub use crate::usart::Usart;
