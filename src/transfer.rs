// SPDX-License-Identifier: MIT OR Apache-2.0

//! Software-side bookkeeping of one transfer direction.

use core::ptr::NonNull;

/// Lifecycle of one transfer direction of an instance.
///
/// `Idle → Active` happens in the start calls, `Active → Idle` in the
/// dispatcher once the peripheral reports the direction is no longer busy,
/// and `Active → Aborting → Idle` in the abort calls. A direction is only
/// `Aborting` after its interrupt sources have been disabled.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DirectionState {
    /// No transfer registered.
    #[default]
    Idle,
    /// A transfer is registered and the peripheral is moving data.
    Active,
    /// A transfer is being torn down.
    Aborting,
}

/// A caller-owned buffer registered for a transfer.
///
/// The descriptor never owns the memory. The buffer reference is dropped when
/// the transfer ends; the offset stays readable until the next registration.
#[derive(Debug, Default)]
pub(crate) struct Descriptor {
    buffer: Option<NonNull<u8>>,
    length: usize,
    offset: usize,
}

impl Descriptor {
    /// Registers a new buffer and resets the offset.
    pub(crate) fn register(&mut self, buffer: NonNull<u8>, length: usize) {
        *self = Self {
            buffer: Some(buffer),
            length,
            offset: 0,
        };
    }

    /// Drops the buffer reference.
    pub(crate) fn retire(&mut self) {
        self.buffer = None;
    }

    pub(crate) const fn is_registered(&self) -> bool {
        self.buffer.is_some()
    }

    pub(crate) const fn length(&self) -> usize {
        self.length
    }

    pub(crate) const fn offset(&self) -> usize {
        self.offset
    }

    pub(crate) fn set_offset(&mut self, offset: usize) {
        debug_assert!(offset <= self.length, "offset {offset} beyond length {}", self.length);
        self.offset = offset.min(self.length);
    }

    /// Returns the elements before the current offset.
    ///
    /// # Safety
    ///
    /// The registered buffer must still be valid for reads of `length` bytes
    /// and must not be written while the returned slice lives.
    pub(crate) unsafe fn processed(&self) -> Option<&[u8]> {
        self.buffer.map(|buffer| {
            // SAFETY: Guaranteed by the caller; `offset <= length`.
            unsafe { core::slice::from_raw_parts(buffer.as_ptr(), self.offset) }
        })
    }
}

/// One direction of an instance: its lifecycle and its buffer.
#[derive(Debug, Default)]
pub(crate) struct Transfer {
    pub(crate) state: DirectionState,
    pub(crate) descriptor: Descriptor,
    /// Terminates a reception early. Kept after the transfer ends.
    pub(crate) char_match: Option<u8>,
}

impl Transfer {
    /// Registers `buffer` and marks the direction active.
    pub(crate) fn begin(&mut self, buffer: NonNull<u8>, length: usize) {
        debug_assert_eq!(self.state, DirectionState::Idle);
        self.descriptor.register(buffer, length);
        self.state = DirectionState::Active;
    }

    /// Drops the buffer and marks the direction idle.
    pub(crate) fn finish(&mut self) {
        self.descriptor.retire();
        self.state = DirectionState::Idle;
    }
}
