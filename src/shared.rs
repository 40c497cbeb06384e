// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sharing a value between thread mode and interrupt handlers.

use core::cell::RefCell;
use core::fmt::{self, Debug, Formatter};
use critical_section::Mutex;

/// A lazily initialized value, accessible from any context inside a critical
/// section.
///
/// This is the intended home of a [`SerialAsync`]: the application starts
/// transfers from thread mode while the interrupt handlers call
/// [`SerialAsync::dispatch`], both through [`Shared::with`].
///
/// [`SerialAsync`]: crate::SerialAsync
/// [`SerialAsync::dispatch`]: crate::SerialAsync::dispatch
pub struct Shared<T>(Mutex<RefCell<Option<T>>>);

impl<T> Shared<T> {
    /// Creates an empty cell, usable in a `static`.
    #[must_use]
    pub const fn new() -> Self {
        Self(Mutex::new(RefCell::new(None)))
    }

    /// Stores `value` and returns the previous one, if any.
    pub fn init(&self, value: T) -> Option<T> {
        critical_section::with(|cs| self.0.borrow_ref_mut(cs).replace(value))
    }

    /// Runs `f` on the value within a critical section.
    ///
    /// Returns `None` without calling `f` if the cell is empty.
    ///
    /// # Panics
    ///
    /// If called again from within `f`.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        critical_section::with(|cs| self.0.borrow_ref_mut(cs).as_mut().map(f))
    }

    /// Removes the value.
    pub fn take(&self) -> Option<T> {
        critical_section::with(|cs| self.0.borrow_ref_mut(cs).take())
    }
}

impl<T> Default for Shared<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Debug for Shared<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared").finish_non_exhaustive()
    }
}
