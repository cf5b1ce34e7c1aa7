//! Resource lifecycle and handle validation for a game engine
//!
//! This crate provides:
//! - Copyable handles and slot tables that detect stale references
//! - A resource registry with per-type handlers and reference counting
//! - Fan-in of asynchronous asset loads, in any completion order
//! - In-memory and filesystem asset pipelines
//! - An audio mixer that only holds weak instance handles

pub mod assets;
pub mod audio;
pub mod core;
pub mod resources;
pub mod storage;

// Re-exports for convenience
pub use glam;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::assets::{
        AssetData, AssetDescriptor, AssetKind, AssetPipeline, FileAssetPipeline, MemoryAssetPipeline,
    };
    pub use crate::audio::Mixer;
    pub use crate::core::RegistryConfig;
    pub use crate::resources::handlers::{AudioHandle, create_audio_instance};
    pub use crate::resources::{
        RequestInfo, Resource, ResourceError, ResourceHandler, ResourceParams, ResourceRegistry,
        ResourceState, ResourceType, TextureDimension,
    };
    pub use crate::storage::{Handle, SlotTable};
    pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
}
