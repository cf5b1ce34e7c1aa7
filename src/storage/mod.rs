//! Handle and slot storage
//!
//! Provides the weak-reference machinery used throughout the crate:
//! - Copyable handles carrying a slot index and a uniqueness token
//! - Slot tables that detect stale handles after a slot is recycled

mod handle;
mod table;

pub use handle::{Handle, INVALID_TOKEN};
pub use table::{SlotTable, SlotTableError};
