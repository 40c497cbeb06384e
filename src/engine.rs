// SPDX-License-Identifier: MIT OR Apache-2.0

//! The asynchronous transfer engine and its interrupt dispatcher.

use crate::config::Config;
use crate::error::ConfigError;
use crate::event::{DmaUsage, Event, LineError, SerialIrq};
use crate::irq::{InterruptController, IrqLine, Vector};
use crate::peripheral::{Direction, Peripheral, Sources, Status};
use crate::transfer::{DirectionState, Transfer};
use core::ptr::NonNull;

/// Identifies one peripheral instance: the index of its [`Channel`] in the
/// engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InstanceId(pub usize);

/// Handler of the character-by-character interrupt mode.
///
/// Called with the context registered via [`SerialAsync::set_irq_handler`],
/// the interrupt kind and the peripheral, so that the handler can read or
/// write the data register.
pub type IrqHandler<P> = fn(usize, SerialIrq, &mut P);

/// Everything the engine keeps per peripheral instance.
#[derive(Debug)]
pub struct Channel<P> {
    peripheral: P,
    line: IrqLine,
    /// Event interest mask.
    events: Event,
    tx: Transfer,
    rx: Transfer,
    vector: Option<Vector>,
    irq_handler: Option<(IrqHandler<P>, usize)>,
}

// SAFETY: The buffer pointers are only dereferenced by the owner of the
// channel, and the start calls oblige the caller to keep the buffers valid
// and untouched while a transfer is active, independent of the thread or
// interrupt context the channel lives in.
unsafe impl<P: Send> Send for Channel<P> {}

impl<P: Peripheral> Channel<P> {
    /// Creates the channel of a peripheral whose interrupt is wired to
    /// `line`.
    pub fn new(peripheral: P, line: IrqLine) -> Self {
        Self {
            peripheral,
            line,
            events: Event::empty(),
            tx: Transfer::default(),
            rx: Transfer::default(),
            vector: None,
            irq_handler: None,
        }
    }

    /// Returns the interrupt line of the instance.
    pub const fn line(&self) -> IrqLine {
        self.line
    }

    fn transfer_mut(&mut self, direction: Direction) -> &mut Transfer {
        match direction {
            Direction::Tx => &mut self.tx,
            Direction::Rx => &mut self.rx,
        }
    }

    /// Marks an active direction idle once the peripheral stopped reporting
    /// it busy.
    fn sync(&mut self, direction: Direction) {
        let busy = self.peripheral.state().is_busy(direction);
        let transfer = self.transfer_mut(direction);
        if transfer.state == DirectionState::Active && !busy {
            transfer.finish();
        }
    }

    fn abort_transmit(&mut self) {
        if self.tx.state == DirectionState::Active {
            self.tx.state = DirectionState::Aborting;
        }
        self.peripheral
            .disable_sources(Sources::TX_COMPLETE | Sources::TX_EMPTY);
        self.peripheral.clear(Status::TX_COMPLETE);
        self.peripheral.reset_tx_count();
        let state = self.peripheral.state().without(Direction::Tx);
        self.peripheral.set_state(state);
        self.tx.finish();
    }

    fn abort_receive(&mut self) {
        if self.rx.state == DirectionState::Active {
            self.rx.state = DirectionState::Aborting;
        }
        self.peripheral
            .disable_sources(Sources::RX_NOT_EMPTY | Sources::PARITY | Sources::ERROR);
        self.peripheral
            .clear(Status::PARITY_ERROR | Status::FRAMING_ERROR | Status::OVERRUN_ERROR);
        // Reading the data register is what clears a pending RXNE.
        let _ = self.peripheral.read_data();
        self.peripheral.reset_rx_count();
        let state = self.peripheral.state().without(Direction::Rx);
        self.peripheral.set_state(state);
        self.rx.finish();
    }
}

/// Non-blocking, interrupt-driven transfers on up to `N` serial peripherals.
///
/// The engine owns one [`Channel`] per instance in a fixed array, indexed by
/// [`InstanceId`]. Transfers are started with [`SerialAsync::start_transmit`]
/// and [`SerialAsync::start_receive`], which register the caller's buffer and
/// event interest mask and arm the interrupt. The handler registered as
/// vector calls [`SerialAsync::dispatch`], which returns the events that
/// occurred.
///
/// Using an instance that does not exist is a programming error and panics.
///
/// # Example
///
/// ```rust,ignore
/// # use usart_async::*;
/// static SERIAL: Shared<SerialAsync<Usart<MmioBackend>, Nvic, 1>> = Shared::new();
/// static MESSAGE: [u8; 5] = *b"hello";
///
/// extern "C" fn usart1_handler() {
///     SERIAL.with(|serial| {
///         let events = serial.dispatch(InstanceId(0));
///         if events.contains(Event::TX_COMPLETE) {
///             // ...
///         }
///     });
/// }
///
/// SERIAL.with(|serial| unsafe {
///     serial.start_transmit(
///         InstanceId(0),
///         &MESSAGE,
///         8,
///         Vector(usart1_handler),
///         Event::TX_COMPLETE,
///         DmaUsage::Never,
///     )
/// });
/// ```
#[derive(Debug)]
pub struct SerialAsync<P, C, const N: usize> {
    controller: C,
    config: Config,
    channels: [Channel<P>; N],
}

impl<P: Peripheral, C: InterruptController, const N: usize> SerialAsync<P, C, N> {
    /// Creates the engine for `channels` after validating `config`.
    pub fn new(
        controller: C,
        config: Config,
        channels: [Channel<P>; N],
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            controller,
            config,
            channels,
        })
    }

    /// Returns the active configuration.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Returns a reference to the interrupt controller.
    pub const fn controller(&self) -> &C {
        &self.controller
    }

    /// Returns a reference to the peripheral of instance `id`.
    pub fn peripheral(&self, id: InstanceId) -> &P {
        &self.channel(id).peripheral
    }

    /// Returns a mutable reference to the peripheral of instance `id`.
    ///
    /// Changing interrupt enables or the transfer-state behind the engine's
    /// back voids every guarantee about events.
    pub fn peripheral_mut(&mut self, id: InstanceId) -> &mut P {
        &mut self.channel_mut(id).peripheral
    }

    fn channel(&self, id: InstanceId) -> &Channel<P> {
        assert!(id.0 < N, "device not present: instance {} of {}", id.0, N);
        &self.channels[id.0]
    }

    fn channel_mut(&mut self, id: InstanceId) -> &mut Channel<P> {
        assert!(id.0 < N, "device not present: instance {} of {}", id.0, N);
        &mut self.channels[id.0]
    }

    /// Borrows a channel and the interrupt controller at the same time.
    fn parts(&mut self, id: InstanceId) -> (&mut Channel<P>, &mut C) {
        assert!(id.0 < N, "device not present: instance {} of {}", id.0, N);
        (&mut self.channels[id.0], &mut self.controller)
    }

    /// Reconfigures the interrupt line: clear pending, priority, vector,
    /// enable. The line must already be disabled.
    fn arm_line(&mut self, id: InstanceId, direction: Direction, vector: Vector) {
        let priority = match direction {
            Direction::Tx => self.config.tx_priority,
            Direction::Rx => self.config.rx_priority,
        };
        let (channel, controller) = self.parts(id);
        channel.vector = Some(vector);
        controller.clear_pending(channel.line);
        controller.set_priority(channel.line, priority);
        controller.set_vector(channel.line, vector);
        controller.enable(channel.line);
    }

    /* ----- Asynchronous Transfers ----------------------------------------- */

    /// Starts an interrupt-driven transmission of `tx`.
    ///
    /// Returns the number of accepted elements: `tx.len()`, or 0 if `tx` is
    /// empty or a transmission is already active on the instance. In the
    /// latter case the active transfer is left untouched.
    ///
    /// The transmit class of the event interest mask is replaced by the
    /// transmit events in `events`. `hint` is ignored.
    ///
    /// # Panics
    ///
    /// If `width` is not 8 or the instance does not exist.
    ///
    /// # Safety
    ///
    /// `tx` must stay valid and must not be modified until the transmission
    /// is no longer active ([`Self::transmit_active`]).
    pub unsafe fn start_transmit(
        &mut self,
        id: InstanceId,
        tx: &[u8],
        width: u8,
        handler: Vector,
        events: Event,
        hint: DmaUsage,
    ) -> usize {
        assert_eq!(width, 8, "only 8-bit elements are supported");
        let _ = hint;

        if tx.is_empty() {
            return 0;
        }
        let (channel, controller) = self.parts(id);
        channel.sync(Direction::Tx);
        if channel.tx.state != DirectionState::Idle
            || channel.peripheral.state().is_busy(Direction::Tx)
        {
            debug!("instance {}: transmission already active", id.0);
            return 0;
        }

        controller.disable(channel.line);
        let data = NonNull::from(tx).cast::<u8>();
        channel.tx.begin(data, tx.len());
        channel.events = channel.events.difference(Event::TX_ALL) | (events & Event::TX_ALL);
        self.arm_line(id, Direction::Tx, handler);

        let channel = self.channel_mut(id);
        // SAFETY: The caller keeps `tx` valid until the transmission ends.
        if unsafe { channel.peripheral.begin_transmit(data, tx.len()) }.is_err() {
            channel.tx.finish();
            return 0;
        }
        debug!("instance {}: transmitting {} elements", id.0, tx.len());
        tx.len()
    }

    /// Starts an interrupt-driven reception into `rx`.
    ///
    /// Does nothing if `rx` is empty or a reception is already active on the
    /// instance; the active transfer, its events and its match character are
    /// left untouched then.
    ///
    /// The receive class of the event interest mask is replaced by the
    /// receive events in `events`. With `char_match`, the reception ends as
    /// soon as that byte arrives, reported as [`Event::RX_CHARACTER_MATCH`]
    /// if requested. `hint` is ignored.
    ///
    /// # Panics
    ///
    /// If `width` is not 8 or the instance does not exist.
    ///
    /// # Safety
    ///
    /// `rx` must stay valid and must neither be read nor written until the
    /// reception is no longer active ([`Self::receive_active`]).
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn start_receive(
        &mut self,
        id: InstanceId,
        rx: &mut [u8],
        width: u8,
        handler: Vector,
        events: Event,
        char_match: Option<u8>,
        hint: DmaUsage,
    ) {
        assert_eq!(width, 8, "only 8-bit elements are supported");
        let _ = hint;

        if rx.is_empty() {
            return;
        }
        let (channel, controller) = self.parts(id);
        channel.sync(Direction::Rx);
        if channel.rx.state != DirectionState::Idle
            || channel.peripheral.state().is_busy(Direction::Rx)
        {
            debug!("instance {}: reception already active", id.0);
            return;
        }

        controller.disable(channel.line);
        let length = rx.len();
        let buffer = NonNull::from(rx).cast::<u8>();
        channel.rx.char_match = char_match;
        channel.events = channel.events.difference(Event::RX_ALL) | (events & Event::RX_ALL);
        channel.rx.begin(buffer, length);
        self.arm_line(id, Direction::Rx, handler);

        let channel = self.channel_mut(id);
        // SAFETY: The caller keeps `rx` valid and untouched until the
        // reception ends.
        if unsafe { channel.peripheral.begin_receive(buffer, length) }.is_err() {
            channel.rx.finish();
            return;
        }
        debug!("instance {}: receiving {} elements", id.0, length);
    }

    /// Aborts the transmission of instance `id`.
    ///
    /// Disables the transmit interrupt sources before any state is touched.
    /// No event is reported. Calling this without an active transmission has
    /// no effect.
    pub fn abort_transmit(&mut self, id: InstanceId) {
        self.channel_mut(id).abort_transmit();
        debug!("instance {}: transmission aborted", id.0);
    }

    /// Aborts the reception of instance `id`.
    ///
    /// Disables the receive and error interrupt sources before any state is
    /// touched, clears pending errors and the data register. No event is
    /// reported. Calling this without an active reception has no effect.
    pub fn abort_receive(&mut self, id: InstanceId) {
        self.channel_mut(id).abort_receive();
        debug!("instance {}: reception aborted", id.0);
    }

    /// Returns whether the peripheral reports an ongoing transmission.
    pub fn transmit_active(&self, id: InstanceId) -> bool {
        self.channel(id).peripheral.state().is_busy(Direction::Tx)
    }

    /// Returns whether the peripheral reports an ongoing reception.
    pub fn receive_active(&self, id: InstanceId) -> bool {
        self.channel(id).peripheral.state().is_busy(Direction::Rx)
    }

    /// Returns how many elements of the current (or last) transmission have
    /// been handed to the peripheral.
    pub fn transmitted(&self, id: InstanceId) -> usize {
        self.channel(id).tx.descriptor.offset()
    }

    /// Returns how many elements of the current (or last) reception have been
    /// received. After a character match, this is the index of the match.
    pub fn received(&self, id: InstanceId) -> usize {
        self.channel(id).rx.descriptor.offset()
    }

    /// Returns the match character of the current (or last) reception.
    pub fn char_match(&self, id: InstanceId) -> Option<u8> {
        self.channel(id).rx.char_match
    }

    /// Returns the event interest mask of instance `id`.
    pub fn events(&self, id: InstanceId) -> Event {
        self.channel(id).events
    }

    /// Returns the lifecycle state of one direction of instance `id`.
    pub fn direction_state(&self, id: InstanceId, direction: Direction) -> DirectionState {
        let channel = self.channel(id);
        match direction {
            Direction::Tx => channel.tx.state,
            Direction::Rx => channel.rx.state,
        }
    }

    /// Returns the vector registered by the last accepted start call.
    pub fn vector(&self, id: InstanceId) -> Option<Vector> {
        self.channel(id).vector
    }

    /// Services one interrupt occurrence of instance `id` and returns the
    /// events of interest that occurred.
    ///
    /// Line errors are acknowledged at the peripheral in any case. If a
    /// parity, framing or overrun error is reported, the occurrence ends
    /// there: neither completion nor character match are evaluated for it.
    ///
    /// A reception counts as complete once no element is outstanding and at
    /// least `length - 1` elements were counted.
    ///
    /// A character match terminates the reception: the received count is
    /// truncated to the index of the match and the reception is aborted.
    pub fn dispatch(&mut self, id: InstanceId) -> Event {
        let channel = self.channel_mut(id);
        let interest = channel.events;
        let mut fired = Event::empty();

        let status = channel.peripheral.status();
        let sources = channel.peripheral.sources();

        if status.contains(Status::TX_COMPLETE) && sources.contains(Sources::TX_COMPLETE) {
            fired |= Event::TX_COMPLETE & interest;
        }

        for (flag, error) in [
            (Status::PARITY_ERROR, LineError::Parity),
            (Status::FRAMING_ERROR, LineError::Framing),
            (Status::NOISE_ERROR, LineError::Noise),
            (Status::OVERRUN_ERROR, LineError::Overrun),
        ] {
            if status.contains(flag) {
                channel.peripheral.clear(flag);
                warn!("instance {}: line error {}", id.0, error);
                if let Ok(event) = Event::try_from(error) {
                    fired |= event & interest;
                }
            }
        }

        channel.peripheral.service();

        if channel.tx.descriptor.is_registered() {
            let length = channel.tx.descriptor.length();
            let remaining = channel.peripheral.tx_remaining();
            channel.tx.descriptor.set_offset(length.saturating_sub(remaining));
        }

        if fired.intersects(Event::RX_ERRORS) {
            channel.sync(Direction::Tx);
            channel.sync(Direction::Rx);
            trace!("instance {}: events {:#x}", id.0, fired.bits());
            return fired;
        }

        if channel.rx.descriptor.is_registered() {
            let size = channel.peripheral.rx_transfer_size();
            let remaining = channel.peripheral.rx_remaining();
            if size != 0 {
                channel.rx.descriptor.set_offset(size.saturating_sub(remaining));
            }
            let offset = channel.rx.descriptor.offset();
            let boundary_reached = channel
                .rx
                .descriptor
                .length()
                .checked_sub(1)
                .is_some_and(|last| offset >= last);
            if remaining == 0 && boundary_reached {
                fired |= Event::RX_COMPLETE & interest;
            }
        }

        if interest.contains(Event::RX_CHARACTER_MATCH) {
            if let Some(char_match) = channel.rx.char_match {
                // SAFETY: The caller of `start_receive` keeps the buffer valid,
                // and nothing writes it while this interrupt runs.
                let matched = unsafe { channel.rx.descriptor.processed() }
                    .and_then(|received| received.iter().position(|&byte| byte == char_match));
                if let Some(index) = matched {
                    channel.rx.descriptor.set_offset(index);
                    fired |= Event::RX_CHARACTER_MATCH;
                    channel.abort_receive();
                }
            }
        }

        channel.sync(Direction::Tx);
        channel.sync(Direction::Rx);
        trace!("instance {}: events {:#x}", id.0, fired.bits());
        fired
    }

    /* ----- Character Interrupt Mode --------------------------------------- */

    /// Registers the handler of the character-by-character interrupt mode of
    /// instance `id`, see [`Self::handle_irq`].
    pub fn set_irq_handler(&mut self, id: InstanceId, handler: IrqHandler<P>, context: usize) {
        self.channel_mut(id).irq_handler = Some((handler, context));
    }

    /// Enables or disables the interrupt for each received character
    /// ([`SerialIrq::Rx`]) or for each free transmit slot
    /// ([`SerialIrq::Tx`]).
    ///
    /// Enabling also routes the interrupt line to `vector`. When disabling,
    /// the line itself is only disabled if no instance on it has a character
    /// interrupt left.
    pub fn set_irq(&mut self, id: InstanceId, irq: SerialIrq, vector: Vector, enable: bool) {
        let source = match irq {
            SerialIrq::Rx => Sources::RX_NOT_EMPTY,
            SerialIrq::Tx => Sources::TX_EMPTY,
        };
        let (channel, controller) = self.parts(id);
        let line = channel.line;

        if enable {
            channel.peripheral.enable_sources(source);
            channel.vector = Some(vector);
            controller.set_vector(line, vector);
            controller.enable(line);
            return;
        }

        channel.peripheral.disable_sources(source);
        let line_in_use = self.channels.iter_mut().any(|channel| {
            channel.line == line
                && channel
                    .peripheral
                    .sources()
                    .intersects(Sources::RX_NOT_EMPTY | Sources::TX_EMPTY)
        });
        if !line_in_use {
            self.controller.disable(line);
        }
    }

    /// Services one interrupt occurrence in character interrupt mode.
    ///
    /// Calls the registered handler with [`SerialIrq::Tx`] if the transmit
    /// data register is empty and with [`SerialIrq::Rx`] if a character was
    /// received, each only if the matching interrupt is enabled. A pending
    /// overrun is acknowledged. Without a registered handler nothing happens.
    pub fn handle_irq(&mut self, id: InstanceId) {
        let channel = self.channel_mut(id);
        let Some((handler, context)) = channel.irq_handler else {
            return;
        };

        let status = channel.peripheral.status();
        let sources = channel.peripheral.sources();
        if status.contains(Status::TX_EMPTY) && sources.contains(Sources::TX_EMPTY) {
            handler(context, SerialIrq::Tx, &mut channel.peripheral);
        }
        if status.contains(Status::RX_NOT_EMPTY) && sources.contains(Sources::RX_NOT_EMPTY) {
            handler(context, SerialIrq::Rx, &mut channel.peripheral);
        }
        if status.contains(Status::OVERRUN_ERROR) && sources.contains(Sources::ERROR) {
            channel.peripheral.clear(Status::OVERRUN_ERROR);
        }
    }

    /* ----- Miscellaneous -------------------------------------------------- */

    /// Resets the outstanding element counts of both directions.
    pub fn clear(&mut self, id: InstanceId) {
        let peripheral = &mut self.channel_mut(id).peripheral;
        peripheral.reset_tx_count();
        peripheral.reset_rx_count();
    }

    /// Requests a break condition on the transmit line of instance `id`.
    pub fn send_break(&mut self, id: InstanceId) {
        self.channel_mut(id).peripheral.send_break();
    }
}
