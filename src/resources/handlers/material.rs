//! Material resources
//!
//! A material is described in RON. Each texture map it names is requested as
//! a texture dependency, so releasing the material releases its maps.
//!
//! ```ron
//! (
//!     color: (0.8, 0.2, 0.2),
//!     specular: 0.5,
//!     shininess: 32.0,
//!     diffuse_map: Some("brick.png"),
//! )
//! ```

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::assets::{AssetData, AssetKind};
use crate::resources::error::ResourceError;
use crate::resources::handler::{HandlerContext, ResourceHandler};
use crate::resources::listener::FanIn;
use crate::resources::request::RequestInfo;
use crate::resources::resource::{Resource, ResourceType};

use super::{Source, begin_single, commit, named_asset_request, nothing_loaded, single_source};

/// Material properties as written in a material file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialConfig {
    /// Base color (RGB)
    pub color: [f32; 3],
    /// Specular reflectivity (0.0 - 1.0)
    pub specular: f32,
    /// Shininess exponent
    pub shininess: f32,
    /// Texture asset for the base color
    pub diffuse_map: Option<String>,
    /// Texture asset for normals
    pub normal_map: Option<String>,
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            color: [0.8, 0.8, 0.8],
            specular: 0.5,
            shininess: 32.0,
            diffuse_map: None,
            normal_map: None,
        }
    }
}

impl MaterialConfig {
    /// Parse a material from RON
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Parse`] if the source is not a valid material
    pub fn from_ron_str(source: &str) -> Result<Self, ResourceError> {
        ron::from_str(source).map_err(|e| ResourceError::Parse(e.to_string()))
    }
}

/// Material properties laid out for a uniform buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialUniform {
    /// Base color (RGB)
    pub color: [f32; 3],
    /// Padding for alignment
    _padding1: f32,
    pub specular: f32,
    pub shininess: f32,
    /// 1.0 when a diffuse map is bound
    pub use_texture: f32,
    /// Padding for alignment
    _padding2: f32,
}

/// A loaded material
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub color: Vec3,
    pub specular: f32,
    pub shininess: f32,
    /// Texture resource names, also present as dependencies
    pub diffuse_map: Option<String>,
    pub normal_map: Option<String>,
}

impl Material {
    /// Uniform block for this material
    #[must_use]
    pub fn uniform(&self) -> MaterialUniform {
        MaterialUniform {
            color: self.color.into(),
            _padding1: 0.0,
            specular: self.specular,
            shininess: self.shininess,
            use_texture: if self.diffuse_map.is_some() { 1.0 } else { 0.0 },
            _padding2: 0.0,
        }
    }

    /// Texture maps the material references
    pub fn texture_maps(&self) -> impl Iterator<Item = &str> {
        self.diffuse_map
            .iter()
            .chain(self.normal_map.iter())
            .map(String::as_str)
    }
}

impl From<MaterialConfig> for Material {
    fn from(config: MaterialConfig) -> Self {
        Self {
            color: Vec3::from_array(config.color),
            specular: config.specular.clamp(0.0, 1.0),
            shininess: config.shininess.max(1.0),
            diffuse_map: config.diffuse_map,
            normal_map: config.normal_map,
        }
    }
}

/// Parse, commit, and queue the texture maps
fn build(ctx: &mut HandlerContext<'_>, resource: &mut Resource, source: &str, loading: bool) -> Result<(), ResourceError> {
    let material = Material::from(MaterialConfig::from_ron_str(source)?);
    for map in material.texture_maps() {
        ctx.request_dependency(map, ResourceType::Texture, named_asset_request(map, ResourceType::Texture));
    }

    if loading {
        resource.set_payload(material);
        resource.mark_loaded()
    } else {
        commit(resource, material)
    }
}

/// Loads [`Material`]s from inline RON or one text asset.
#[derive(Debug, Default)]
pub struct MaterialHandler;

impl ResourceHandler for MaterialHandler {
    fn request(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        resource: &mut Resource,
        info: &RequestInfo,
    ) -> Result<(), ResourceError> {
        match single_source(resource, info, AssetKind::Text)? {
            Source::Inline(source) => build(ctx, resource, source, false),
            Source::Asset(descriptor) => begin_single(ctx, resource, info, descriptor, info.synchronous),
        }
    }

    fn finalize(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        resource: &mut Resource,
        fan_in: FanIn,
    ) -> Result<(), ResourceError> {
        let source = fan_in
            .into_first()
            .and_then(AssetData::into_text)
            .ok_or_else(|| nothing_loaded(resource))?;
        build(ctx, resource, &source, true)
    }
}
