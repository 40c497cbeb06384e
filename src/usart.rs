// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`Peripheral`] implementation for STM32 USART register blocks.

use crate::backend::{Backend, MmioBackend};
use crate::error::{BusyError, InvalidAddressError};
use crate::peripheral::{Direction, HwState, Peripheral, Sources, Status};
use crate::registers::{offsets, CR1, CR3, DATA, ICR, ISR, RQR};
use core::ptr::NonNull;

/// Progress of one interrupt-driven transfer direction.
#[derive(Debug, Default)]
struct Xfer {
    buffer: Option<NonNull<u8>>,
    size: usize,
    /// Outstanding elements.
    count: usize,
}

impl Xfer {
    /// Index of the next element to move.
    const fn position(&self) -> usize {
        self.size - self.count
    }
}

/// A USART peripheral driven element by element from its interrupt.
///
/// This type only covers transfers. Clock, pin, baud rate and frame format
/// setup happen elsewhere; [`Usart::enable`] merely switches on the
/// peripheral, the transmitter and the receiver.
///
/// All reads and writes involving device registers operate on the underlying
/// hardware via the [`Backend`].
#[derive(Debug)]
pub struct Usart<B: Backend> {
    backend: B,
    state: HwState,
    tx: Xfer,
    rx: Xfer,
}

// SAFETY: The buffer pointers are only dereferenced while servicing a
// transfer, and `begin_transmit`/`begin_receive` oblige the caller to keep the
// buffers valid and untouched until then, regardless of the context.
unsafe impl<B: Backend + Send> Send for Usart<B> {}

impl Usart<MmioBackend> {
    /// Creates a new [`Usart`] backed by MMIO.
    ///
    /// # Safety
    ///
    /// Callers must ensure that the address points to a USART register block
    /// that is not accessed by anyone else.
    pub unsafe fn new_mmio(base_address: *mut u32) -> Result<Self, InvalidAddressError> {
        // SAFETY: Forwarded to the caller.
        let backend = unsafe { MmioBackend::new(base_address)? };
        Ok(Self::new(backend))
    }
}

impl<B: Backend> Usart<B> {
    /// Creates a new [`Usart`] on top of an arbitrary [`Backend`].
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: HwState::Ready,
            tx: Xfer::default(),
            rx: Xfer::default(),
        }
    }

    /// Returns a reference to the underlying [`Backend`].
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns a mutable reference to the underlying [`Backend`].
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Enables the peripheral, the transmitter and the receiver.
    pub fn enable(&mut self) {
        let cr1 = self.cr1() | CR1::UE | CR1::TE | CR1::RE;
        self.write_cr1(cr1);
    }

    /* ----- Typed Register Access ------------------------------------------ */

    /// Fetches the current value from [`ISR`].
    pub fn isr(&mut self) -> ISR {
        // SAFETY: We operate on valid register addresses.
        let val = unsafe { self.backend.read_register(offsets::ISR as u8) };
        ISR::from_bits_retain(val)
    }

    /// Fetches the current value from [`CR1`].
    pub fn cr1(&mut self) -> CR1 {
        // SAFETY: We operate on valid register addresses.
        let val = unsafe { self.backend.read_register(offsets::CR1 as u8) };
        CR1::from_bits_retain(val)
    }

    /// Fetches the current value from [`CR3`].
    pub fn cr3(&mut self) -> CR3 {
        // SAFETY: We operate on valid register addresses.
        let val = unsafe { self.backend.read_register(offsets::CR3 as u8) };
        CR3::from_bits_retain(val)
    }

    fn write_cr1(&mut self, cr1: CR1) {
        // SAFETY: We operate on valid register addresses.
        unsafe { self.backend.write_register(offsets::CR1 as u8, cr1.bits()) }
    }

    fn write_cr3(&mut self, cr3: CR3) {
        // SAFETY: We operate on valid register addresses.
        unsafe { self.backend.write_register(offsets::CR3 as u8, cr3.bits()) }
    }

    fn write_icr(&mut self, icr: ICR) {
        // SAFETY: We operate on valid register addresses.
        unsafe { self.backend.write_register(offsets::ICR as u8, icr.bits()) }
    }

    fn write_rqr(&mut self, rqr: RQR) {
        // SAFETY: We operate on valid register addresses.
        unsafe { self.backend.write_register(offsets::RQR as u8, rqr.bits()) }
    }

    /// Sets or clears the enable bits of `sources` in CR1 and CR3.
    fn configure_sources(&mut self, sources: Sources, enable: bool) {
        let mut cr1_bits = CR1::empty();
        if sources.contains(Sources::TX_EMPTY) {
            cr1_bits |= CR1::TXEIE;
        }
        if sources.contains(Sources::TX_COMPLETE) {
            cr1_bits |= CR1::TCIE;
        }
        if sources.contains(Sources::RX_NOT_EMPTY) {
            cr1_bits |= CR1::RXNEIE;
        }
        if sources.contains(Sources::PARITY) {
            cr1_bits |= CR1::PEIE;
        }
        if !cr1_bits.is_empty() {
            let mut cr1 = self.cr1();
            cr1.set(cr1_bits, enable);
            self.write_cr1(cr1);
        }

        if sources.contains(Sources::ERROR) {
            let mut cr3 = self.cr3();
            cr3.set(CR3::EIE, enable);
            self.write_cr3(cr3);
        }
    }

    /* ----- Transfer Machinery --------------------------------------------- */

    /// Moves one received character into the reception buffer.
    fn receive_element(&mut self) {
        if !self.state.is_busy(Direction::Rx) || self.rx.count == 0 {
            // Nobody waits for this character: drop it.
            self.write_rqr(RQR::RXFRQ);
            return;
        }

        let byte = self.read_data();
        if let Some(buffer) = self.rx.buffer {
            // SAFETY: The caller of `begin_receive` guaranteed the buffer is
            // valid for `size` bytes and `position() < size` as `count > 0`.
            unsafe { buffer.add(self.rx.position()).write(byte) };
        }
        self.rx.count -= 1;

        if self.rx.count == 0 {
            self.disable_sources(Sources::RX_NOT_EMPTY | Sources::PARITY | Sources::ERROR);
            self.rx.buffer = None;
            self.state = self.state.without(Direction::Rx);
        }
    }

    /// Feeds the next element into the transmit data register.
    fn transmit_element(&mut self) {
        if !self.state.is_busy(Direction::Tx) {
            return;
        }

        if self.tx.count == 0 {
            // Everything is in the shift register: wait for the last frame.
            self.disable_sources(Sources::TX_EMPTY);
            self.enable_sources(Sources::TX_COMPLETE);
            return;
        }

        if let Some(data) = self.tx.buffer {
            // SAFETY: The caller of `begin_transmit` guaranteed the data is
            // valid for `size` bytes and `position() < size` as `count > 0`.
            let byte = unsafe { data.add(self.tx.position()).read() };
            self.write_data(byte);
        }
        self.tx.count -= 1;
    }

    /// Finishes a transmission once the last frame left the line.
    fn end_transmit(&mut self) {
        self.disable_sources(Sources::TX_COMPLETE);
        self.tx.buffer = None;
        self.state = self.state.without(Direction::Tx);
        self.clear(Status::TX_COMPLETE);
    }
}

impl<B: Backend> Peripheral for Usart<B> {
    fn status(&mut self) -> Status {
        let isr = self.isr();
        let mut status = Status::empty();
        status.set(Status::TX_EMPTY, isr.contains(ISR::TXE));
        status.set(Status::TX_COMPLETE, isr.contains(ISR::TC));
        status.set(Status::RX_NOT_EMPTY, isr.contains(ISR::RXNE));
        status.set(Status::PARITY_ERROR, isr.contains(ISR::PE));
        status.set(Status::FRAMING_ERROR, isr.contains(ISR::FE));
        status.set(Status::NOISE_ERROR, isr.contains(ISR::NF));
        status.set(Status::OVERRUN_ERROR, isr.contains(ISR::ORE));
        status
    }

    fn sources(&mut self) -> Sources {
        let cr1 = self.cr1();
        let cr3 = self.cr3();
        let mut sources = Sources::empty();
        sources.set(Sources::TX_EMPTY, cr1.contains(CR1::TXEIE));
        sources.set(Sources::TX_COMPLETE, cr1.contains(CR1::TCIE));
        sources.set(Sources::RX_NOT_EMPTY, cr1.contains(CR1::RXNEIE));
        sources.set(Sources::PARITY, cr1.contains(CR1::PEIE));
        sources.set(Sources::ERROR, cr3.contains(CR3::EIE));
        sources
    }

    fn enable_sources(&mut self, sources: Sources) {
        self.configure_sources(sources, true);
    }

    fn disable_sources(&mut self, sources: Sources) {
        self.configure_sources(sources, false);
    }

    fn clear(&mut self, flags: Status) {
        let mut icr = ICR::empty();
        icr.set(ICR::TCCF, flags.contains(Status::TX_COMPLETE));
        icr.set(ICR::PECF, flags.contains(Status::PARITY_ERROR));
        icr.set(ICR::FECF, flags.contains(Status::FRAMING_ERROR));
        icr.set(ICR::NCF, flags.contains(Status::NOISE_ERROR));
        icr.set(ICR::ORECF, flags.contains(Status::OVERRUN_ERROR));
        if !icr.is_empty() {
            self.write_icr(icr);
        }
    }

    fn read_data(&mut self) -> DATA {
        // SAFETY: We operate on valid register addresses.
        let val = unsafe { self.backend.read_register(offsets::RDR as u8) };
        (val & 0xff) as DATA
    }

    fn write_data(&mut self, byte: DATA) {
        // SAFETY: We operate on valid register addresses.
        unsafe { self.backend.write_register(offsets::TDR as u8, u32::from(byte)) }
    }

    fn state(&self) -> HwState {
        self.state
    }

    fn set_state(&mut self, state: HwState) {
        self.state = state;
    }

    fn rx_transfer_size(&self) -> usize {
        self.rx.size
    }

    fn rx_remaining(&self) -> usize {
        self.rx.count
    }

    fn tx_remaining(&self) -> usize {
        self.tx.count
    }

    fn reset_tx_count(&mut self) {
        self.tx.count = 0;
    }

    fn reset_rx_count(&mut self) {
        self.rx.count = 0;
    }

    unsafe fn begin_transmit(&mut self, data: NonNull<u8>, len: usize) -> Result<(), BusyError> {
        if self.state.is_busy(Direction::Tx) {
            return Err(BusyError);
        }
        self.tx = Xfer {
            buffer: Some(data),
            size: len,
            count: len,
        };
        self.state = self.state.with(Direction::Tx);
        self.enable_sources(Sources::TX_EMPTY);
        Ok(())
    }

    unsafe fn begin_receive(&mut self, buffer: NonNull<u8>, len: usize) -> Result<(), BusyError> {
        if self.state.is_busy(Direction::Rx) {
            return Err(BusyError);
        }
        self.rx = Xfer {
            buffer: Some(buffer),
            size: len,
            count: len,
        };
        self.state = self.state.with(Direction::Rx);
        self.enable_sources(Sources::PARITY | Sources::ERROR | Sources::RX_NOT_EMPTY);
        Ok(())
    }

    fn service(&mut self) {
        let isr = self.isr();
        let cr1 = self.cr1();

        if isr.contains(ISR::RXNE) && cr1.contains(CR1::RXNEIE) {
            self.receive_element();
        }
        if isr.contains(ISR::TXE) && cr1.contains(CR1::TXEIE) {
            self.transmit_element();
        }
        if isr.contains(ISR::TC) && cr1.contains(CR1::TCIE) {
            self.end_transmit();
        }
    }

    fn send_break(&mut self) {
        self.write_rqr(RQR::SBKRQ);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimBackend;

    fn usart() -> Usart<SimBackend> {
        let mut usart = Usart::new(SimBackend::new());
        usart.enable();
        usart
    }

    #[test]
    fn test_enable() {
        let mut usart = usart();
        assert!(usart.cr1().contains(CR1::UE | CR1::TE | CR1::RE));
        assert_eq!(usart.sources(), Sources::empty());
    }

    #[test]
    fn test_sources_map_to_registers() {
        let mut usart = usart();
        usart.enable_sources(Sources::all());
        assert!(usart
            .cr1()
            .contains(CR1::TXEIE | CR1::TCIE | CR1::RXNEIE | CR1::PEIE));
        assert!(usart.cr3().contains(CR3::EIE));
        assert_eq!(usart.sources(), Sources::all());

        usart.disable_sources(Sources::TX_EMPTY | Sources::ERROR);
        assert_eq!(
            usart.sources(),
            Sources::TX_COMPLETE | Sources::RX_NOT_EMPTY | Sources::PARITY
        );
        assert!(usart.cr1().contains(CR1::UE));
    }

    #[test]
    fn test_clear_writes_icr() {
        let mut usart = usart();
        usart.backend_mut().raise(ISR::PE | ISR::FE | ISR::NF | ISR::ORE);
        assert_eq!(
            usart.status(),
            Status::PARITY_ERROR
                | Status::FRAMING_ERROR
                | Status::NOISE_ERROR
                | Status::OVERRUN_ERROR
                | Status::TX_EMPTY
                | Status::TX_COMPLETE
        );
        usart.clear(Status::PARITY_ERROR | Status::NOISE_ERROR);
        assert_eq!(usart.isr() & (ISR::PE | ISR::FE | ISR::NF | ISR::ORE), ISR::FE | ISR::ORE);
    }

    #[test]
    fn test_transmit() {
        let mut usart = usart();
        let data = *b"abc";
        // SAFETY: `data` outlives the transmission.
        unsafe {
            usart
                .begin_transmit(NonNull::from(&data).cast(), data.len())
                .unwrap();
        }
        assert_eq!(usart.state(), HwState::BusyTx);
        assert!(usart.sources().contains(Sources::TX_EMPTY));

        // SAFETY: Same buffer, still alive.
        let again = unsafe { usart.begin_transmit(NonNull::from(&data).cast(), data.len()) };
        assert_eq!(again, Err(BusyError));

        for _ in 0..data.len() {
            usart.service();
            usart.backend_mut().shift_out();
        }
        assert_eq!(usart.backend().sent(), b"abc");
        assert_eq!(usart.tx_remaining(), 0);
        assert_eq!(usart.state(), HwState::BusyTx);

        // TXE after the last element switches over to TC.
        usart.service();
        assert_eq!(usart.sources(), Sources::TX_COMPLETE);

        usart.service();
        assert_eq!(usart.state(), HwState::Ready);
        assert_eq!(usart.sources(), Sources::empty());
        assert!(!usart.isr().contains(ISR::TC));
    }

    #[test]
    fn test_receive() {
        let mut usart = usart();
        let mut buffer = [0_u8; 4];
        // SAFETY: `buffer` outlives the reception and is not touched meanwhile.
        unsafe {
            usart
                .begin_receive(NonNull::from(&mut buffer).cast(), buffer.len())
                .unwrap();
        }
        assert_eq!(usart.state(), HwState::BusyRx);
        assert_eq!(
            usart.sources(),
            Sources::RX_NOT_EMPTY | Sources::PARITY | Sources::ERROR
        );

        for (i, byte) in b"wxyz".iter().enumerate() {
            usart.backend_mut().receive(*byte);
            usart.service();
            assert_eq!(usart.rx_remaining(), 3 - i);
            assert_eq!(usart.rx_transfer_size(), 4);
        }
        assert_eq!(usart.state(), HwState::Ready);
        assert_eq!(usart.sources(), Sources::empty());
        assert_eq!(&buffer, b"wxyz");
    }

    #[test]
    fn test_unexpected_character_is_flushed() {
        let mut usart = usart();
        usart.enable_sources(Sources::RX_NOT_EMPTY);
        usart.backend_mut().receive(0x55);
        usart.service();
        assert!(!usart.isr().contains(ISR::RXNE));
        assert_eq!(usart.backend().flushes(), 1);
    }

    #[test]
    fn test_full_duplex_state() {
        let mut usart = usart();
        let data = [1_u8];
        let mut buffer = [0_u8; 1];
        // SAFETY: Both buffers outlive the transfers.
        unsafe {
            usart.begin_transmit(NonNull::from(&data).cast(), 1).unwrap();
            usart
                .begin_receive(NonNull::from(&mut buffer).cast(), 1)
                .unwrap();
        }
        assert_eq!(usart.state(), HwState::BusyTxRx);

        usart.backend_mut().receive(9);
        usart.service();
        assert_eq!(usart.state(), HwState::BusyTx);
        assert_eq!(buffer, [9]);
    }

    #[test]
    fn test_send_break() {
        let mut usart = usart();
        usart.send_break();
        assert_eq!(usart.backend().breaks(), 1);
    }
}
