// SPDX-License-Identifier: MIT OR Apache-2.0

//! Software models of a USART register block and of the interrupt controller
//! for host tests.

use crate::backend::Backend;
use crate::config::Priority;
use crate::irq::{InterruptController, IrqLine, Vector};
use crate::registers::{offsets, ICR, ISR, RQR};
use std::vec::Vec;

/// A USART register file with the side effects the driver relies on.
///
/// The line itself is driven by the test: [`SimBackend::receive`] puts a
/// character on the wire, [`SimBackend::shift_out`] finishes sending the
/// last written one.
#[derive(Debug)]
pub(crate) struct SimBackend {
    cr1: u32,
    cr2: u32,
    cr3: u32,
    isr: ISR,
    rdr: u8,
    sent: Vec<u8>,
    breaks: usize,
    flushes: usize,
    rdr_reads: usize,
}

impl SimBackend {
    /// Idle line, empty transmitter.
    pub(crate) fn new() -> Self {
        Self {
            cr1: 0,
            cr2: 0,
            cr3: 0,
            isr: ISR::TXE | ISR::TC,
            rdr: 0,
            sent: Vec::new(),
            breaks: 0,
            flushes: 0,
            rdr_reads: 0,
        }
    }

    /// Sets status flags, e.g., line errors.
    pub(crate) fn raise(&mut self, flags: ISR) {
        self.isr |= flags;
    }

    /// A character arrives. If the previous one was not read yet, it is kept
    /// and an overrun is flagged instead.
    pub(crate) fn receive(&mut self, byte: u8) {
        if self.isr.contains(ISR::RXNE) {
            self.isr |= ISR::ORE;
        } else {
            self.rdr = byte;
            self.isr |= ISR::RXNE;
        }
    }

    /// The last written character left the shift register.
    pub(crate) fn shift_out(&mut self) {
        self.isr |= ISR::TXE | ISR::TC;
    }

    pub(crate) fn sent(&self) -> &[u8] {
        &self.sent
    }

    pub(crate) const fn breaks(&self) -> usize {
        self.breaks
    }

    pub(crate) const fn flushes(&self) -> usize {
        self.flushes
    }

    pub(crate) const fn rdr_reads(&self) -> usize {
        self.rdr_reads
    }
}

impl Backend for SimBackend {
    unsafe fn read_register(&mut self, offset: u8) -> u32 {
        match offset as usize {
            offsets::CR1 => self.cr1,
            offsets::CR2 => self.cr2,
            offsets::CR3 => self.cr3,
            offsets::ISR => self.isr.bits(),
            offsets::RDR => {
                self.rdr_reads += 1;
                self.isr.remove(ISR::RXNE);
                u32::from(self.rdr)
            }
            _ => 0,
        }
    }

    unsafe fn write_register(&mut self, offset: u8, value: u32) {
        match offset as usize {
            offsets::CR1 => self.cr1 = value,
            offsets::CR2 => self.cr2 = value,
            offsets::CR3 => self.cr3 = value,
            offsets::ICR => {
                let cleared = ICR::from_bits_truncate(value).cleared_status();
                self.isr.remove(cleared);
            }
            offsets::RQR => {
                let request = RQR::from_bits_truncate(value);
                if request.contains(RQR::SBKRQ) {
                    self.breaks += 1;
                }
                if request.contains(RQR::RXFRQ) {
                    self.flushes += 1;
                    self.isr.remove(ISR::RXNE);
                }
            }
            offsets::TDR => {
                self.sent.push((value & 0xff) as u8);
                self.isr.remove(ISR::TXE | ISR::TC);
            }
            _ => {}
        }
    }
}

/// A call made on [`SimController`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    ClearPending(IrqLine),
    Disable(IrqLine),
    Enable(IrqLine),
    SetPriority(IrqLine, Priority),
    SetVector(IrqLine, usize),
}

/// Interrupt controller that records every call.
#[derive(Debug, Default)]
pub(crate) struct SimController {
    calls: Vec<Call>,
}

impl SimController {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub(crate) fn forget(&mut self) {
        self.calls.clear();
    }

    /// Replays the calls to tell whether `line` ended up enabled.
    pub(crate) fn is_enabled(&self, line: IrqLine) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|call| match *call {
                Call::Enable(l) if l == line => Some(true),
                Call::Disable(l) if l == line => Some(false),
                _ => None,
            })
            .unwrap_or(false)
    }

    /// The last priority set for `line`.
    pub(crate) fn priority(&self, line: IrqLine) -> Option<Priority> {
        self.calls.iter().rev().find_map(|call| match *call {
            Call::SetPriority(l, priority) if l == line => Some(priority),
            _ => None,
        })
    }

    /// The address of the last vector set for `line`.
    pub(crate) fn vector(&self, line: IrqLine) -> Option<usize> {
        self.calls.iter().rev().find_map(|call| match *call {
            Call::SetVector(l, address) if l == line => Some(address),
            _ => None,
        })
    }
}

impl InterruptController for SimController {
    fn clear_pending(&mut self, line: IrqLine) {
        self.calls.push(Call::ClearPending(line));
    }

    fn disable(&mut self, line: IrqLine) {
        self.calls.push(Call::Disable(line));
    }

    fn enable(&mut self, line: IrqLine) {
        self.calls.push(Call::Enable(line));
    }

    fn set_priority(&mut self, line: IrqLine, priority: Priority) {
        self.calls.push(Call::SetPriority(line, priority));
    }

    fn set_vector(&mut self, line: IrqLine, vector: Vector) {
        self.calls.push(Call::SetVector(line, vector.address()));
    }
}
