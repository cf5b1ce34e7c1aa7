//! Built-in resource handlers
//!
//! One handler per built-in [`ResourceType`]:
//! - Text, binary and shader sources (hot reloadable)
//! - 2D, array and cube textures assembled from images
//! - Materials and bitmap fonts that pull in textures as dependencies
//! - Static meshes merged from several parts
//! - Audio clips with per-clip instance tables
//! - Scenes that can be unloaded and reloaded in place
//! - System fonts and heightmap terrain

mod audio;
mod binary;
mod font;
mod material;
mod scene;
mod shader;
mod static_mesh;
mod terrain;
mod text;
mod texture;

use std::slice;

pub use audio::{AudioClip, AudioHandle, AudioHandler, AudioInstance, create_audio_instance};
pub use binary::{Binary, BinaryHandler};
pub use font::{BitmapFont, BitmapFontConfig, BitmapFontHandler, Glyph, SystemFont, SystemFontHandler};
pub use material::{Material, MaterialConfig, MaterialHandler, MaterialUniform};
pub use scene::{Attachment, NodeTransform, Scene, SceneConfig, SceneHandler, SceneNode};
pub use shader::{Shader, ShaderHandler, ShaderStage};
pub use static_mesh::{StaticMesh, StaticMeshHandler};
pub use terrain::{HeightmapTerrain, HeightmapTerrainHandler};
pub use text::{Text, TextHandler};
pub use texture::{Texture, TextureHandler};

use crate::assets::{AssetDescriptor, AssetKind};
use crate::core::RegistryConfig;

use super::error::ResourceError;
use super::handler::{HandlerContext, ResourceHandler};
use super::request::{RequestInfo, ResourceParams};
use super::resource::{Resource, ResourceState, ResourceType};

/// A handler for every built-in resource type
pub(crate) fn builtin(config: &RegistryConfig) -> Vec<(ResourceType, Box<dyn ResourceHandler>)> {
    let mut handlers: Vec<(ResourceType, Box<dyn ResourceHandler>)> = Vec::new();
    handlers.push((ResourceType::Text, Box::new(TextHandler)));
    handlers.push((ResourceType::Binary, Box::new(BinaryHandler)));
    handlers.push((ResourceType::Shader, Box::new(ShaderHandler)));
    handlers.push((ResourceType::Texture, Box::new(TextureHandler)));
    handlers.push((ResourceType::Material, Box::new(MaterialHandler)));
    handlers.push((ResourceType::StaticMesh, Box::new(StaticMeshHandler)));
    handlers.push((
        ResourceType::Audio,
        Box::new(AudioHandler::new(config.max_audio_instances)),
    ));
    handlers.push((ResourceType::Scene, Box::new(SceneHandler)));
    handlers.push((ResourceType::BitmapFont, Box::new(BitmapFontHandler)));
    handlers.push((ResourceType::SystemFont, Box::new(SystemFontHandler)));
    handlers.push((
        ResourceType::HeightmapTerrain,
        Box::new(HeightmapTerrainHandler),
    ));
    handlers
}

/// Asset kind a resource of this type is built from by default
#[must_use]
pub fn default_asset_kind(resource_type: ResourceType) -> AssetKind {
    match resource_type {
        ResourceType::Texture | ResourceType::HeightmapTerrain => AssetKind::Image,
        ResourceType::StaticMesh => AssetKind::StaticMesh,
        ResourceType::Audio => AssetKind::Audio,
        ResourceType::Binary | ResourceType::SystemFont => AssetKind::Binary,
        ResourceType::Text
        | ResourceType::Shader
        | ResourceType::Material
        | ResourceType::Scene
        | ResourceType::BitmapFont
        | ResourceType::Custom(_) => AssetKind::Text,
    }
}

/// Request a resource whose single asset shares its name
pub(crate) fn named_asset_request(name: &str, resource_type: ResourceType) -> RequestInfo {
    RequestInfo::new().with_asset(AssetDescriptor::new(name, default_asset_kind(resource_type)))
}

/// Where a single-source resource gets its data
pub(crate) enum Source<'a> {
    Inline(&'a str),
    Asset(&'a AssetDescriptor),
}

/// Accept either inline source text or exactly one asset of `kind`.
pub(crate) fn single_source<'a>(
    resource: &Resource,
    info: &'a RequestInfo,
    kind: AssetKind,
) -> Result<Source<'a>, ResourceError> {
    match (info.source_text.as_deref(), info.assets.as_slice()) {
        (Some(source), []) => Ok(Source::Inline(source)),
        (None, [descriptor]) => {
            expect_kind(descriptor, kind)?;
            Ok(Source::Asset(descriptor))
        }
        (Some(_), _) => Err(ResourceError::InvalidRequest(format!(
            "'{}' gives both inline source and assets",
            resource.name()
        ))),
        (None, assets) => Err(ResourceError::InvalidRequest(format!(
            "'{}' needs inline source or exactly one asset, got {}",
            resource.name(),
            assets.len()
        ))),
    }
}

/// Accept exactly one asset of `kind`.
pub(crate) fn single_asset<'a>(
    resource: &Resource,
    info: &'a RequestInfo,
    kind: AssetKind,
) -> Result<&'a AssetDescriptor, ResourceError> {
    match info.assets.as_slice() {
        [descriptor] => {
            expect_kind(descriptor, kind)?;
            Ok(descriptor)
        }
        assets => Err(ResourceError::InvalidRequest(format!(
            "'{}' needs exactly one {kind:?} asset, got {}",
            resource.name(),
            assets.len()
        ))),
    }
}

pub(crate) fn expect_kind(descriptor: &AssetDescriptor, kind: AssetKind) -> Result<(), ResourceError> {
    if descriptor.kind == kind {
        Ok(())
    } else {
        Err(ResourceError::InvalidRequest(format!(
            "{descriptor} must be a {kind:?} asset"
        )))
    }
}

/// Issue the request for one asset.
pub(crate) fn begin_single(
    ctx: &mut HandlerContext<'_>,
    resource: &mut Resource,
    info: &RequestInfo,
    descriptor: &AssetDescriptor,
    synchronous: bool,
) -> Result<(), ResourceError> {
    ctx.begin_fan_in(
        resource,
        slice::from_ref(descriptor),
        synchronous,
        info.import_params,
        info.params.clone(),
    )?;
    Ok(())
}

/// Commit a payload built without any asset requests.
pub(crate) fn commit<T: 'static>(resource: &mut Resource, payload: T) -> Result<(), ResourceError> {
    resource.transition(ResourceState::Loading)?;
    resource.set_payload(payload);
    resource.mark_loaded()
}

/// Error for a fan-in that produced nothing usable
pub(crate) fn nothing_loaded(resource: &Resource) -> ResourceError {
    ResourceError::AssetLoadFailed(format!("no usable asset for '{}'", resource.name()))
}

/// Reject parameters meant for another type
pub(crate) fn unexpected_params(resource: &Resource, params: &ResourceParams) -> ResourceError {
    ResourceError::InvalidRequest(format!(
        "{params:?} does not apply to {} '{}'",
        resource.resource_type(),
        resource.name()
    ))
}
