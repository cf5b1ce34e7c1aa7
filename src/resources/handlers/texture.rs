//! Texture resources
//!
//! Builds 2D, array and cube textures from decoded RGBA8 images. Layers are
//! stored back to back in request order. Every layer must match the
//! dimensions of the first image that loaded; mismatched or failed layers are
//! left out with a warning rather than failing the texture.

use crate::assets::{AssetData, AssetKind, ImageData};
use crate::resources::error::ResourceError;
use crate::resources::handler::{HandlerContext, ResourceHandler};
use crate::resources::listener::FanIn;
use crate::resources::request::{RequestInfo, ResourceParams, TextureDimension};
use crate::resources::resource::Resource;

use super::{expect_kind, nothing_loaded, unexpected_params};

/// Faces in a cube texture
pub const CUBE_FACES: usize = 6;

/// CPU copy of a texture, ready for upload
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub dimension: TextureDimension,
    /// Request position each layer was built from
    pub layer_sources: Vec<usize>,
    /// RGBA8 layers, back to back
    pub pixels: Vec<u8>,
}

impl Texture {
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.layer_sources.len()
    }

    /// Bytes in one layer
    #[must_use]
    pub fn layer_size(&self) -> usize {
        self.width as usize * self.height as usize * ImageData::CHANNELS
    }

    /// Pixels of one layer
    #[must_use]
    pub fn layer(&self, index: usize) -> Option<&[u8]> {
        let size = self.layer_size();
        self.pixels.get(index * size..(index + 1) * size)
    }

    /// Merge images in request order, skipping those whose size differs
    /// from the first one or whose pixel buffer does not match their size.
    fn merge(
        name: &str,
        dimension: TextureDimension,
        images: impl IntoIterator<Item = (usize, ImageData)>,
    ) -> Option<Self> {
        let mut texture: Option<Self> = None;

        for (position, image) in images {
            if image.pixels.len() != image.byte_len() {
                log::warn!(
                    "Texture '{name}': layer {position} has {} bytes, expected {} for {}x{}; skipping it",
                    image.pixels.len(),
                    image.byte_len(),
                    image.width,
                    image.height
                );
                continue;
            }
            if texture.is_none() {
                texture = Some(Self {
                    width: image.width,
                    height: image.height,
                    dimension,
                    layer_sources: vec![position],
                    pixels: image.pixels,
                });
                continue;
            }
            let Some(merged) = texture.as_mut() else {
                continue;
            };

            if (image.width, image.height) != (merged.width, merged.height) {
                log::warn!(
                    "Texture '{name}': layer {position} is {}x{}, expected {}x{}; skipping it",
                    image.width,
                    image.height,
                    merged.width,
                    merged.height
                );
                continue;
            }
            merged.layer_sources.push(position);
            merged.pixels.extend_from_slice(&image.pixels);
        }

        texture
    }
}

fn dimension_of(resource: &Resource, params: &ResourceParams) -> Result<TextureDimension, ResourceError> {
    match params {
        ResourceParams::None => Ok(TextureDimension::D2),
        ResourceParams::Texture(dimension) => Ok(*dimension),
        other => Err(unexpected_params(resource, other)),
    }
}

/// Loads [`Texture`]s.
///
/// | Dimension | Assets          |
/// |-----------|-----------------|
/// | `D2`      | exactly 1 image |
/// | `Array`   | 1 or more       |
/// | `Cube`    | exactly 6       |
#[derive(Debug, Default)]
pub struct TextureHandler;

impl ResourceHandler for TextureHandler {
    fn request(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        resource: &mut Resource,
        info: &RequestInfo,
    ) -> Result<(), ResourceError> {
        let dimension = dimension_of(resource, &info.params)?;
        let count = info.assets.len();
        let valid = match dimension {
            TextureDimension::D2 => count == 1,
            TextureDimension::Array => count >= 1,
            TextureDimension::Cube => count == CUBE_FACES,
        };
        if !valid {
            return Err(ResourceError::InvalidRequest(format!(
                "{dimension:?} texture '{}' cannot be built from {count} asset(s)",
                resource.name()
            )));
        }
        for descriptor in &info.assets {
            expect_kind(descriptor, AssetKind::Image)?;
        }

        ctx.begin_fan_in(
            resource,
            &info.assets,
            info.synchronous,
            info.import_params,
            ResourceParams::Texture(dimension),
        )?;
        Ok(())
    }

    fn finalize(
        &mut self,
        _ctx: &mut HandlerContext<'_>,
        resource: &mut Resource,
        fan_in: FanIn,
    ) -> Result<(), ResourceError> {
        let dimension = dimension_of(resource, &fan_in.params)?;
        let images = fan_in
            .into_successes()
            .into_iter()
            .filter_map(|(position, data)| AssetData::into_image(data).map(|image| (position, image)));

        let texture =
            Texture::merge(resource.name(), dimension, images).ok_or_else(|| nothing_loaded(resource))?;

        if dimension == TextureDimension::Cube && texture.layer_count() != CUBE_FACES {
            log::warn!(
                "Cube texture '{}' has only {} of {CUBE_FACES} faces",
                resource.name(),
                texture.layer_count()
            );
        }

        resource.set_payload(texture);
        resource.mark_loaded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetDescriptor, MemoryAssetPipeline};
    use crate::core::RegistryConfig;
    use crate::resources::{ResourceRegistry, ResourceState, ResourceType};

    #[test]
    fn test_merge_keeps_request_order() {
        let images = vec![
            (0, ImageData::solid(2, 2, [1; 4])),
            (1, ImageData::solid(1, 1, [9; 4])),
            (2, ImageData::solid(2, 2, [3; 4])),
        ];

        let texture = Texture::merge("t", TextureDimension::Array, images).unwrap();
        assert_eq!(texture.layer_sources, vec![0, 2]);
        assert_eq!(texture.layer(1), Some(&[3u8; 16][..]));
        assert!(texture.layer(2).is_none());
    }

    #[test]
    fn test_merge_skips_short_pixel_buffers() {
        let mut short = ImageData::solid(2, 2, [5; 4]);
        short.pixels.truncate(10);
        let images = vec![
            (0, short),
            (1, ImageData::solid(2, 2, [1; 4])),
            (2, ImageData::solid(2, 2, [2; 4])),
        ];

        let texture = Texture::merge("t", TextureDimension::Array, images).unwrap();
        assert_eq!(texture.layer_sources, vec![1, 2]);
        assert_eq!(texture.pixels.len(), 2 * texture.layer_size());
        assert_eq!(texture.layer(1), Some(&[2u8; 16][..]));
    }

    #[test]
    fn test_cube_needs_six_faces() {
        let faces = ["px", "nx", "py", "ny", "pz", "nz"];
        let mut pipeline = MemoryAssetPipeline::default();
        for (i, face) in faces.iter().enumerate() {
            pipeline.insert(*face, AssetData::Image(ImageData::solid(8, 8, [i as u8; 4])));
        }
        let mut registry =
            ResourceRegistry::with_builtin_handlers(RegistryConfig::default(), pipeline).unwrap();

        let five = RequestInfo::new()
            .with_assets(faces[..5].iter().map(|f| AssetDescriptor::new(*f, AssetKind::Image)))
            .with_params(ResourceParams::Texture(TextureDimension::Cube));
        assert!(registry.request("sky", ResourceType::Texture, five).is_err());

        let six = RequestInfo::new()
            .with_assets(faces.iter().map(|f| AssetDescriptor::new(*f, AssetKind::Image)))
            .with_params(ResourceParams::Texture(TextureDimension::Cube));
        let handle = registry.request("sky", ResourceType::Texture, six).unwrap();
        registry.update();

        assert_eq!(registry.state(handle), Some(ResourceState::Loaded));
        let texture = registry.payload::<Texture>(handle).unwrap();
        assert_eq!(texture.dimension, TextureDimension::Cube);
        assert_eq!(texture.layer_count(), 6);
        assert_eq!(texture.layer(5).unwrap()[0], 5);
    }

    #[test]
    fn test_rejects_non_image_assets_and_foreign_params() {
        let mut registry = ResourceRegistry::with_builtin_handlers(
            RegistryConfig::default(),
            MemoryAssetPipeline::default(),
        )
        .unwrap();

        let text = RequestInfo::new().with_asset(AssetDescriptor::new("a", AssetKind::Text));
        assert!(registry.request("a", ResourceType::Texture, text).is_err());

        let terrain = RequestInfo::new()
            .with_asset(AssetDescriptor::new("a", AssetKind::Image))
            .with_params(ResourceParams::Terrain { height_scale: 1.0 });
        assert!(registry.request("a", ResourceType::Texture, terrain).is_err());
        assert_eq!(registry.resource_count(), 0);
    }
}
