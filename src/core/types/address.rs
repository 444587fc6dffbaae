//! Remote address wrapper

use serde::{Deserialize, Serialize};
use std::fmt;

/// An address inside some process's address space.
///
/// Stored as `u64` so that a 32-bit layout and a 64-bit layout decode into
/// the same type.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Address(pub u64);

impl Address {
    /// Creates a new address
    pub const fn new(value: u64) -> Self {
        Address(value)
    }

    /// Creates a null address (0x0)
    pub const fn null() -> Self {
        Address(0)
    }

    /// Checks if the address is null
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Adds a byte offset, returning `None` on overflow
    pub fn checked_add(&self, offset: u64) -> Option<Self> {
        self.0.checked_add(offset).map(Address)
    }

    /// Returns the raw value
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the value as a host `usize`, if it fits
    pub fn to_usize(&self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl From<u64> for Address {
    fn from(value: u64) -> Self {
        Address(value)
    }
}

impl From<usize> for Address {
    fn from(value: usize) -> Self {
        Address(value as u64)
    }
}
