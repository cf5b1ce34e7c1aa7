//! Opaque handle implementation
//!
//! Handles pair a slot index with the uniqueness token the slot carried when
//! the handle was minted. They never own what they point at.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Token value marking a free slot or an explicitly invalid handle.
pub const INVALID_TOKEN: u64 = u64::MAX;

/// Global counter for generating uniqueness tokens.
///
/// Shared by every table so a handle minted by one table is very unlikely to
/// validate against another table that happens to use the same index.
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Generate a fresh, never-invalid token.
pub(crate) fn next_token() -> u64 {
    let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
    if token == INVALID_TOKEN {
        NEXT_TOKEN.fetch_add(1, Ordering::Relaxed)
    } else {
        token
    }
}

/// A weak, copyable reference into a [`SlotTable`](super::SlotTable).
///
/// A handle is live only while its token matches the token currently stored
/// in its slot. Once the slot is recycled every handle minted for it becomes
/// stale, and lookups through it return `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    /// Index of the slot in the owning table
    index: u32,
    /// Token the slot carried when this handle was created
    token: u64,
}

impl Handle {
    /// A handle that never validates against any table.
    pub const INVALID: Self = Self {
        index: u32::MAX,
        token: INVALID_TOKEN,
    };

    pub(crate) const fn from_parts(index: u32, token: u64) -> Self {
        Self { index, token }
    }

    /// Slot index this handle points at.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Uniqueness token captured at creation.
    #[must_use]
    pub const fn token(self) -> u64 {
        self.token
    }

    /// Whether this is the explicit invalid handle.
    ///
    /// A handle that is not invalid may still be stale; only the owning table
    /// can tell.
    #[must_use]
    pub const fn is_invalid(self) -> bool {
        self.token == INVALID_TOKEN
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            write!(f, "Handle(invalid)")
        } else {
            write!(f, "Handle({}:{})", self.index, self.token)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_invalid() {
        let handle = Handle::default();
        assert!(handle.is_invalid());
        assert_eq!(handle, Handle::INVALID);
    }

    #[test]
    fn test_tokens_are_unique_and_valid() {
        let a = next_token();
        let b = next_token();
        assert_ne!(a, b);
        assert_ne!(a, INVALID_TOKEN);
        assert_ne!(b, INVALID_TOKEN);
    }

    #[test]
    fn test_handle_equality_needs_token() {
        let a = Handle::from_parts(3, 10);
        let b = Handle::from_parts(3, 11);
        assert_ne!(a, b);
        assert_eq!(a, Handle::from_parts(3, 10));
    }

    #[test]
    fn test_display() {
        assert_eq!(Handle::from_parts(2, 7).to_string(), "Handle(2:7)");
        assert_eq!(Handle::INVALID.to_string(), "Handle(invalid)");
    }
}
