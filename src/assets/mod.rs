//! Asset pipeline boundary
//!
//! Provides the lower-level fetch-and-decode service resources are built from:
//! - Descriptors naming one asset in a package
//! - Decoded payloads (text, bytes, RGBA8 images, meshes, PCM audio)
//! - The `AssetPipeline` trait the registry drives
//! - An in-memory pipeline and a threaded filesystem pipeline

mod data;
mod descriptor;
mod file;
mod memory;
mod pipeline;

pub use data::{AssetData, AudioData, ImageData, MeshData, Vertex};
pub use descriptor::{AssetDescriptor, AssetKind};
pub use file::FileAssetPipeline;
pub use memory::MemoryAssetPipeline;
pub use pipeline::{
    AssetCompletion, AssetContext, AssetError, AssetEvent, AssetPipeline, AssetRequest,
    ImportParams, WatchId,
};
