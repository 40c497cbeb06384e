// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Register Offsets and Register Bits.
//!
//! Models the raw low-level details of the USART peripheral found on
//! STM32L0-class microcontrollers as of the [reference manual] (RM0377,
//! chapter "USART registers"), and avoids too opinionated abstractions.
//!
//! Only the registers and bits used by interrupt-driven transfers are typed.
//!
//! [reference manual]: https://www.st.com/resource/en/reference_manual/rm0377-ultralowpower-stm32l0x1-advanced-armbased-32bit-mcus-stmicroelectronics.pdf

use bitflags::bitflags;

/// Provides the register offset from the base address.
///
/// All registers are 32 bits wide and word aligned.
pub mod offsets {
    /// The size of the register block in bytes.
    ///
    /// Valid offsets are therefore strictly smaller than this value.
    pub const MAX: usize = 0x2C;

    /// Control Register 1 (CR1).
    pub const CR1: usize = 0x00;

    /// Control Register 2 (CR2).
    pub const CR2: usize = 0x04;

    /// Control Register 3 (CR3).
    pub const CR3: usize = 0x08;

    /// Baud Rate Register (BRR).
    pub const BRR: usize = 0x0C;

    /// Guard Time and Prescaler Register (GTPR).
    pub const GTPR: usize = 0x10;

    /// Receiver Timeout Register (RTOR).
    pub const RTOR: usize = 0x14;

    /// Request Register (RQR).
    ///
    /// This register is **write-only**.
    pub const RQR: usize = 0x18;

    /// Interrupt and Status Register (ISR).
    ///
    /// This register is **read-only**.
    pub const ISR: usize = 0x1C;

    /// Interrupt flag Clear Register (ICR).
    ///
    /// This register is **write-only**. Writing a one clears the matching
    /// flag in [`ISR`].
    pub const ICR: usize = 0x20;

    /// Receive Data Register (RDR).
    ///
    /// Reading this register clears the RXNE flag.
    pub const RDR: usize = 0x24;

    /// Transmit Data Register (TDR).
    ///
    /// Writing this register clears the TXE flag.
    pub const TDR: usize = 0x28;
}

/// Typing of the data registers (RDR / TDR).
///
/// Only the lower eight bits are used in 8-bit word mode.
pub type DATA = u8;

bitflags! {
    /// Typing of Control Register 1 (CR1).
    ///
    /// Holds the enable bits of the peripheral, the transmitter, the receiver
    /// and of most interrupt sources.
    ///
    /// This is a **read/write** register.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct CR1: u32 {
        /// USART enable.
        const UE = 1 << 0;
        /// USART enable in Stop mode.
        const UESM = 1 << 1;
        /// Receiver enable.
        const RE = 1 << 2;
        /// Transmitter enable.
        const TE = 1 << 3;
        /// IDLE interrupt enable.
        const IDLEIE = 1 << 4;
        /// RXNE interrupt enable.
        ///
        /// An interrupt is generated whenever ORE or RXNE is set.
        const RXNEIE = 1 << 5;
        /// Transmission complete interrupt enable.
        const TCIE = 1 << 6;
        /// TXE interrupt enable.
        const TXEIE = 1 << 7;
        /// Parity error interrupt enable.
        const PEIE = 1 << 8;
        /// Parity selection (odd if set).
        const PS = 1 << 9;
        /// Parity control enable.
        const PCE = 1 << 10;
        /// Receiver wakeup method.
        const WAKE = 1 << 11;
        /// Word length bit 0.
        const M0 = 1 << 12;
        /// Mute mode enable.
        const MME = 1 << 13;
        /// Character match interrupt enable.
        const CMIE = 1 << 14;
        /// Oversampling mode (by 8 if set).
        const OVER8 = 1 << 15;
        /// Word length bit 1.
        const M1 = 1 << 28;
    }
}

bitflags! {
    /// Typing of Control Register 3 (CR3).
    ///
    /// Only the bits relevant for interrupt handling are typed, the others
    /// are retained as-is.
    ///
    /// This is a **read/write** register.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct CR3: u32 {
        /// Error interrupt enable.
        ///
        /// Generates an interrupt on framing, overrun or noise errors.
        const EIE = 1 << 0;
        /// DMA enable receiver.
        const DMAR = 1 << 6;
        /// DMA enable transmitter.
        const DMAT = 1 << 7;
        /// RTS enable.
        const RTSE = 1 << 8;
        /// CTS enable.
        const CTSE = 1 << 9;
        /// Overrun disable.
        const OVRDIS = 1 << 12;

        const _ = !0;
    }
}

bitflags! {
    /// Typing of the Interrupt and Status Register (ISR).
    ///
    /// This is a **read-only** register.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct ISR: u32 {
        /// Parity error.
        ///
        /// Set by hardware when a parity error occurs in reception mode.
        const PE = 1 << 0;
        /// Framing error.
        ///
        /// Set by hardware on a de-synchronization, excessive noise or a break
        /// character.
        const FE = 1 << 1;
        /// Start bit noise detection flag.
        const NF = 1 << 2;
        /// Overrun error.
        ///
        /// Set by hardware when a character is received while RXNE is still
        /// set.
        const ORE = 1 << 3;
        /// Idle line detected.
        const IDLE = 1 << 4;
        /// Read data register not empty.
        const RXNE = 1 << 5;
        /// Transmission complete.
        const TC = 1 << 6;
        /// Transmit data register empty.
        const TXE = 1 << 7;
        /// LIN break detection flag.
        const LBDF = 1 << 8;
        /// CTS interrupt flag.
        const CTSIF = 1 << 9;
        /// CTS flag.
        const CTS = 1 << 10;
        /// Receiver timeout.
        const RTOF = 1 << 11;
        /// Busy flag: communication on the RX line is ongoing.
        const BUSY = 1 << 16;
        /// Character match flag.
        const CMF = 1 << 17;
        /// Send break flag.
        const SBKF = 1 << 18;

        const _ = !0;
    }
}

bitflags! {
    /// Typing of the Interrupt flag Clear Register (ICR).
    ///
    /// This is a **write-only** register.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct ICR: u32 {
        /// Parity error clear flag.
        const PECF = 1 << 0;
        /// Framing error clear flag.
        const FECF = 1 << 1;
        /// Noise detected clear flag.
        const NCF = 1 << 2;
        /// Overrun error clear flag.
        const ORECF = 1 << 3;
        /// Idle line detected clear flag.
        const IDLECF = 1 << 4;
        /// Transmission complete clear flag.
        const TCCF = 1 << 6;
        /// LIN break detection clear flag.
        const LBDCF = 1 << 8;
        /// CTS clear flag.
        const CTSCF = 1 << 9;
        /// Receiver timeout clear flag.
        const RTOCF = 1 << 11;
        /// Character match clear flag.
        const CMCF = 1 << 17;
    }
}

impl ICR {
    /// Returns the [`ISR`] bits that are cleared by writing `self`.
    ///
    /// Every clear flag sits on the same bit position as its status flag.
    #[must_use]
    pub const fn cleared_status(self) -> ISR {
        ISR::from_bits_retain(self.bits())
    }
}

bitflags! {
    /// Typing of the Request Register (RQR).
    ///
    /// This is a **write-only** register.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct RQR: u32 {
        /// Auto baud rate request.
        const ABRRQ = 1 << 0;
        /// Send break request.
        ///
        /// A break character is sent as soon as the transmit machine is
        /// available.
        const SBKRQ = 1 << 1;
        /// Mute mode request.
        const MMRQ = 1 << 2;
        /// Receive data flush request.
        ///
        /// Clears RXNE without reading RDR.
        const RXFRQ = 1 << 3;
        /// Transmit data flush request.
        const TXFRQ = 1 << 4;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icr_maps_onto_isr() {
        assert_eq!(ICR::PECF.cleared_status(), ISR::PE);
        assert_eq!(ICR::FECF.cleared_status(), ISR::FE);
        assert_eq!(ICR::NCF.cleared_status(), ISR::NF);
        assert_eq!(ICR::ORECF.cleared_status(), ISR::ORE);
        assert_eq!(ICR::TCCF.cleared_status(), ISR::TC);
        assert_eq!(ICR::CMCF.cleared_status(), ISR::CMF);
        assert_eq!(
            (ICR::PECF | ICR::FECF | ICR::ORECF).cleared_status(),
            ISR::PE | ISR::FE | ISR::ORE
        );
    }

    #[test]
    fn test_offsets_in_range() {
        for offset in [
            offsets::CR1,
            offsets::CR3,
            offsets::RQR,
            offsets::ISR,
            offsets::ICR,
            offsets::RDR,
            offsets::TDR,
        ] {
            assert!(offset < offsets::MAX);
            assert_eq!(offset % 4, 0);
        }
    }

    #[test]
    fn test_cr3_retains_unknown_bits() {
        let cr3 = CR3::from_bits_truncate(0x8000_0001);
        assert!(cr3.contains(CR3::EIE));
        assert_eq!(cr3.bits(), 0x8000_0001);
    }
}
