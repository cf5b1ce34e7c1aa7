//! Asset pipeline boundary
//!
//! The lower-level service that fetches and decodes one named asset at a
//! time. Resource handlers are its callers.
//!
//! # Contract
//!
//! - Every submitted [`AssetRequest`] produces exactly one
//!   [`AssetEvent::Completed`], successful or not.
//! - Events are only handed out through `poll_events` /
//!   `drain_synchronous`, which the registry calls from its owning thread.
//!   A pipeline that decodes on worker threads must queue results until then.
//! - Completions of synchronous requests are available from
//!   `drain_synchronous` as soon as `request_asset` returns.

use std::fmt;

use crate::storage::Handle;

use super::data::AssetData;
use super::descriptor::AssetDescriptor;

/// Opaque routing ticket carried by a request and echoed in its completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetContext {
    /// The in-flight listener record waiting for this asset
    pub listener: Handle,
    /// Position of the asset in the original request
    pub position: usize,
}

/// Identifies a change subscription created for a watched asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(pub u32);

/// Decoder options passed through with a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportParams {
    /// Flip images vertically while decoding
    pub flip_y: bool,
}

/// One asset fetch
#[derive(Debug, Clone)]
pub struct AssetRequest {
    pub descriptor: AssetDescriptor,
    /// Complete before `request_asset` returns
    pub synchronous: bool,
    pub params: ImportParams,
    pub context: AssetContext,
}

/// Outcome of one request
#[derive(Debug, Clone)]
pub struct AssetCompletion {
    pub context: AssetContext,
    pub descriptor: AssetDescriptor,
    pub result: Result<AssetData, AssetError>,
    /// Present when the descriptor asked to be watched and the load succeeded
    pub watch_id: Option<WatchId>,
}

/// Something the pipeline wants the registry to know about
#[derive(Debug, Clone)]
pub enum AssetEvent {
    /// A requested asset finished loading
    Completed(AssetCompletion),
    /// A watched asset changed on its backing store
    Changed {
        watch_id: WatchId,
        descriptor: AssetDescriptor,
        data: AssetData,
    },
}

/// The asset fetching service a registry drives.
pub trait AssetPipeline {
    /// Submit one asset fetch.
    fn request_asset(&mut self, request: AssetRequest);

    /// Move every ready event into `events`.
    fn poll_events(&mut self, events: &mut Vec<AssetEvent>);

    /// Move only completions of synchronous requests into `events`.
    fn drain_synchronous(&mut self, events: &mut Vec<AssetEvent>);

    /// Drop one reference to a loaded asset.
    fn release_asset(&mut self, asset_name: &str, package_name: &str);

    /// Stop reporting changes for a watch.
    fn unwatch(&mut self, watch_id: WatchId);

    /// Package used for descriptors that do not name one.
    fn default_package(&self) -> &str;
}

/// Errors that can occur while fetching an asset
#[derive(Debug, Clone, PartialEq)]
pub enum AssetError {
    /// No asset with this name exists
    NotFound(String),
    /// IO error reading the asset
    IoError(String),
    /// Error decoding the asset
    DecodeError(String),
    /// The stored asset is not of the requested kind
    KindMismatch(String),
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(e) => write!(f, "Asset not found: {e}"),
            Self::IoError(e) => write!(f, "IO error: {e}"),
            Self::DecodeError(e) => write!(f, "Decode error: {e}"),
            Self::KindMismatch(e) => write!(f, "Kind mismatch: {e}"),
        }
    }
}

impl std::error::Error for AssetError {}
