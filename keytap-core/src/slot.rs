//! Single-assignment result slot for the winning assertion.

use std::sync::OnceLock;

use crate::signal::CancelSignal;

/// First-writer-wins cell.
///
/// A value is recorded before the paired [`CancelSignal`] is set, and only the
/// writer that recorded it sets the signal, so a set signal always has a value
/// behind it.
#[derive(Debug)]
pub struct ResultSlot<T> {
    cell: OnceLock<T>,
}

impl<T> ResultSlot<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    /// Try to record `value` and, on success, set `signal`.
    ///
    /// Returns `false` and drops `value` if another writer got there first.
    pub fn claim(&self, value: T, signal: &CancelSignal) -> bool {
        if self.cell.set(value).is_err() {
            return false;
        }
        signal.set();
        true
    }

    pub fn is_filled(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Consume the slot once every writer is done with it.
    pub fn into_inner(self) -> Option<T> {
        self.cell.into_inner()
    }
}

impl<T> Default for ResultSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
