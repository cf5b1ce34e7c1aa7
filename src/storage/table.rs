//! Slot table with stale-handle detection
//!
//! A table of recyclable slots, each guarded by a uniqueness token. It backs
//! the resource registry, the in-flight listener records and per-resource
//! sub-collections such as audio instances.
//!
//! # Example
//!
//! ```ignore
//! let mut table: SlotTable<&str> = SlotTable::with_max_capacity(2);
//!
//! let first = table.allocate("first")?;
//! assert!(table.validate(first));
//!
//! table.recycle(first);
//! assert!(!table.validate(first));
//!
//! // The freed index is reused, but the old handle stays stale
//! let second = table.allocate("second")?;
//! assert_eq!(first.index(), second.index());
//! assert!(table.get(first).is_none());
//! ```

use std::fmt;

use super::handle::{Handle, INVALID_TOKEN, next_token};

// ============================================================================
// Slot
// ============================================================================

/// Internal slot state.
///
/// `token == INVALID_TOKEN` marks the slot free; the payload is always `None`
/// in that case.
#[derive(Debug)]
struct Slot<T> {
    token: u64,
    payload: Option<T>,
}

impl<T> Slot<T> {
    const fn is_free(&self) -> bool {
        self.token == INVALID_TOKEN
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Failure outcomes of slot allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotTableError {
    /// The table has a fixed maximum and every slot is occupied.
    Full {
        /// The configured maximum
        capacity: usize,
    },
}

impl fmt::Display for SlotTableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full { capacity } => {
                write!(f, "Slot table is full (capacity {capacity})")
            }
        }
    }
}

impl std::error::Error for SlotTableError {}

// ============================================================================
// Slot Table
// ============================================================================

/// An indexable store of recyclable records.
///
/// Allocation always reuses the lowest free index before appending, so slot
/// indices are deterministic for a given sequence of operations.
///
/// | Operation  | Time Complexity |
/// |------------|-----------------|
/// | `allocate` | O(n) scan       |
/// | `recycle`  | O(1)            |
/// | `validate` | O(1)            |
/// | `get`      | O(1)            |
#[derive(Debug)]
pub struct SlotTable<T> {
    /// Storage for all slots (free or occupied)
    slots: Vec<Slot<T>>,
    /// Fixed upper bound on the slot count, `None` when growable
    max_capacity: Option<usize>,
    /// Number of occupied slots
    occupied: usize,
}

impl<T> SlotTable<T> {
    /// Create a growable table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            max_capacity: None,
            occupied: 0,
        }
    }

    /// Create a table that never holds more than `capacity` slots.
    #[must_use]
    pub fn with_max_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            max_capacity: Some(capacity),
            occupied: 0,
        }
    }

    /// Create a table from an optional fixed capacity.
    #[must_use]
    pub fn with_optional_capacity(capacity: Option<usize>) -> Self {
        match capacity {
            Some(capacity) => Self::with_max_capacity(capacity),
            None => Self::new(),
        }
    }

    /// Store `payload` in the lowest free slot, appending one if none is free.
    ///
    /// The slot receives a fresh token, so handles to any previous occupant
    /// of the same index stop validating.
    ///
    /// # Errors
    ///
    /// Returns [`SlotTableError::Full`] when the table is at its fixed
    /// capacity. The table is left untouched in that case.
    pub fn allocate(&mut self, payload: T) -> Result<Handle, SlotTableError> {
        let index = match self.slots.iter().position(Slot::is_free) {
            Some(index) => index,
            None => {
                if let Some(capacity) = self.max_capacity
                    && self.slots.len() >= capacity
                {
                    return Err(SlotTableError::Full { capacity });
                }
                self.slots.push(Slot {
                    token: INVALID_TOKEN,
                    payload: None,
                });
                self.slots.len() - 1
            }
        };

        let slot = &mut self.slots[index];
        slot.token = next_token();
        slot.payload = Some(payload);
        self.occupied += 1;

        Ok(Handle::from_parts(index as u32, slot.token))
    }

    /// Wrap the current token of an occupied slot into a handle.
    ///
    /// Returns `None` when the index is out of bounds or the slot is free.
    #[must_use]
    pub fn create_handle(&self, index: u32) -> Option<Handle> {
        self.slots
            .get(index as usize)
            .filter(|slot| !slot.is_free())
            .map(|slot| Handle::from_parts(index, slot.token))
    }

    /// Check whether `handle` still refers to the slot's current occupant.
    #[must_use]
    #[inline]
    pub fn validate(&self, handle: Handle) -> bool {
        !handle.is_invalid()
            && self
                .slots
                .get(handle.index() as usize)
                .is_some_and(|slot| slot.token == handle.token())
    }

    /// Free the slot `handle` points at and return its payload.
    ///
    /// Returns `None` for stale or invalid handles; recycling twice is
    /// therefore harmless.
    pub fn recycle(&mut self, handle: Handle) -> Option<T> {
        if !self.validate(handle) {
            return None;
        }

        let slot = &mut self.slots[handle.index() as usize];
        slot.token = INVALID_TOKEN;
        self.occupied -= 1;
        slot.payload.take()
    }

    /// Get the payload behind a live handle.
    #[must_use]
    #[inline]
    pub fn get(&self, handle: Handle) -> Option<&T> {
        if !self.validate(handle) {
            return None;
        }
        self.slots[handle.index() as usize].payload.as_ref()
    }

    /// Get the payload behind a live handle mutably.
    #[inline]
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        if !self.validate(handle) {
            return None;
        }
        self.slots[handle.index() as usize].payload.as_mut()
    }

    /// Number of slots, free and occupied.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    #[must_use]
    #[inline]
    pub const fn occupied(&self) -> usize {
        self.occupied
    }

    /// Whether no slot is occupied.
    #[must_use]
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    /// The fixed capacity, if any.
    #[must_use]
    pub const fn max_capacity(&self) -> Option<usize> {
        self.max_capacity
    }

    /// Whether another allocation would fail.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.max_capacity
            .is_some_and(|capacity| self.occupied >= capacity)
    }

    /// Iterate over occupied slots with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.payload
                .as_ref()
                .map(|payload| (Handle::from_parts(index as u32, slot.token), payload))
        })
    }

    /// Iterate mutably over occupied slots with their handles.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| {
                let token = slot.token;
                slot.payload
                    .as_mut()
                    .map(|payload| (Handle::from_parts(index as u32, token), payload))
            })
    }

    /// Handles of all occupied slots, in index order.
    #[must_use]
    pub fn handles(&self) -> Vec<Handle> {
        self.iter().map(|(handle, _)| handle).collect()
    }

    /// Free every slot. Outstanding handles all become stale.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.token = INVALID_TOKEN;
            slot.payload = None;
        }
        self.occupied = 0;
    }
}

impl<T> Default for SlotTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
