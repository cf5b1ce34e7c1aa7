//! Resource system errors

use std::fmt;

use crate::assets::AssetError;
use crate::storage::SlotTableError;

use super::resource::{ResourceState, ResourceType};

/// Errors that can occur while requesting, loading or releasing resources.
///
/// Configuration errors (`HandlerAlreadyRegistered`, `NoHandler`,
/// `CapacityExhausted`) are expected to halt the calling subsystem's
/// initialisation. Request-shape errors (`InvalidRequest`) are returned before
/// any state is created. Stale handles are never an error; lookups through
/// them return `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceError {
    /// A handler is already registered for this type
    HandlerAlreadyRegistered(ResourceType),
    /// No handler is registered for this type
    NoHandler(ResourceType),
    /// A fixed-capacity table is full; raise the configured capacity
    CapacityExhausted {
        /// Which table ran out of room
        table: &'static str,
        /// The configured capacity
        capacity: usize,
    },
    /// The request does not have the shape the handler requires
    InvalidRequest(String),
    /// The handle does not refer to a live record
    InvalidHandle,
    /// A state change the lifecycle does not allow
    IllegalTransition {
        /// State before the attempted change
        from: ResourceState,
        /// Requested state
        to: ResourceState,
    },
    /// An underlying asset could not be loaded
    AssetLoadFailed(String),
    /// Asset contents could not be parsed into the resource
    Parse(String),
    /// IO error reading a file
    Io(String),
    /// Configuration could not be loaded
    Config(String),
}

impl ResourceError {
    pub(crate) fn capacity(table: &'static str, error: SlotTableError) -> Self {
        match error {
            SlotTableError::Full { capacity } => Self::CapacityExhausted { table, capacity },
        }
    }
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HandlerAlreadyRegistered(ty) => {
                write!(f, "A handler is already registered for {ty}")
            }
            Self::NoHandler(ty) => write!(f, "No handler registered for {ty}"),
            Self::CapacityExhausted { table, capacity } => write!(
                f,
                "The {table} table is full (capacity {capacity}); raise the configured capacity"
            ),
            Self::InvalidRequest(e) => write!(f, "Invalid request: {e}"),
            Self::InvalidHandle => write!(f, "Handle does not refer to a live resource"),
            Self::IllegalTransition { from, to } => {
                write!(f, "Illegal state transition {from:?} -> {to:?}")
            }
            Self::AssetLoadFailed(e) => write!(f, "Asset load failed: {e}"),
            Self::Parse(e) => write!(f, "Parse error: {e}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Config(e) => write!(f, "Config error: {e}"),
        }
    }
}

impl std::error::Error for ResourceError {}

impl From<AssetError> for ResourceError {
    fn from(error: AssetError) -> Self {
        Self::AssetLoadFailed(error.to_string())
    }
}
