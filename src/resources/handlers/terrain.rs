//! Heightmap terrain resources

use glam::Vec3;

use crate::assets::{AssetData, AssetKind, ImageData};
use crate::resources::error::ResourceError;
use crate::resources::handler::{HandlerContext, ResourceHandler};
use crate::resources::listener::FanIn;
use crate::resources::request::{RequestInfo, ResourceParams};
use crate::resources::resource::Resource;

use super::{begin_single, nothing_loaded, single_asset, unexpected_params};

/// Height grid sampled from the first channel of an image
#[derive(Debug, Clone, PartialEq)]
pub struct HeightmapTerrain {
    pub width: u32,
    pub depth: u32,
    /// Row-major heights, `width * depth` entries
    pub heights: Vec<f32>,
}

impl HeightmapTerrain {
    #[must_use]
    pub fn from_image(image: &ImageData, height_scale: f32) -> Self {
        let heights = image
            .pixels
            .chunks_exact(ImageData::CHANNELS)
            .map(|pixel| f32::from(pixel[0]) / 255.0 * height_scale)
            .collect();
        Self {
            width: image.width,
            depth: image.height,
            heights,
        }
    }

    /// Height at a grid point
    #[must_use]
    pub fn height_at(&self, x: u32, z: u32) -> Option<f32> {
        if x >= self.width || z >= self.depth {
            return None;
        }
        self.heights.get(z as usize * self.width as usize + x as usize).copied()
    }

    /// Approximate normal at a grid point, from central differences
    #[must_use]
    pub fn normal_at(&self, x: u32, z: u32) -> Option<Vec3> {
        let center = self.height_at(x, z)?;
        let sample = |x: Option<u32>, z: Option<u32>| {
            x.zip(z).and_then(|(x, z)| self.height_at(x, z)).unwrap_or(center)
        };
        let left = sample(x.checked_sub(1), Some(z));
        let right = sample(x.checked_add(1), Some(z));
        let back = sample(Some(x), z.checked_sub(1));
        let front = sample(Some(x), z.checked_add(1));
        Some(Vec3::new(left - right, 2.0, back - front).normalize())
    }

    #[must_use]
    pub fn max_height(&self) -> f32 {
        self.heights.iter().copied().fold(0.0, f32::max)
    }
}

fn height_scale(resource: &Resource, params: &ResourceParams) -> Result<f32, ResourceError> {
    match params {
        ResourceParams::None => Ok(1.0),
        ResourceParams::Terrain { height_scale } => Ok(*height_scale),
        other => Err(unexpected_params(resource, other)),
    }
}

/// Loads [`HeightmapTerrain`] from one image asset.
#[derive(Debug, Default)]
pub struct HeightmapTerrainHandler;

impl ResourceHandler for HeightmapTerrainHandler {
    fn request(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        resource: &mut Resource,
        info: &RequestInfo,
    ) -> Result<(), ResourceError> {
        height_scale(resource, &info.params)?;
        let descriptor = single_asset(resource, info, AssetKind::Image)?;
        begin_single(ctx, resource, info, descriptor, info.synchronous)
    }

    fn finalize(
        &mut self,
        _ctx: &mut HandlerContext<'_>,
        resource: &mut Resource,
        fan_in: FanIn,
    ) -> Result<(), ResourceError> {
        let scale = height_scale(resource, &fan_in.params)?;
        let image = fan_in
            .into_first()
            .and_then(AssetData::into_image)
            .ok_or_else(|| nothing_loaded(resource))?;

        let terrain = HeightmapTerrain::from_image(&image, scale);
        log::debug!(
            "Terrain '{}': {}x{}, peak {:.2}",
            resource.name(),
            terrain.width,
            terrain.depth,
            terrain.max_height()
        );
        resource.set_payload(terrain);
        resource.mark_loaded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetDescriptor, MemoryAssetPipeline};
    use crate::core::RegistryConfig;
    use crate::resources::{ResourceRegistry, ResourceState, ResourceType};

    fn ramp() -> ImageData {
        let mut image = ImageData::solid(2, 2, [0, 0, 0, 255]);
        image.pixels[4] = 255;
        image.pixels[12] = 51;
        image
    }

    #[test]
    fn test_heights_from_first_channel() {
        let terrain = HeightmapTerrain::from_image(&ramp(), 10.0);

        assert_eq!(terrain.height_at(0, 0), Some(0.0));
        assert_eq!(terrain.height_at(1, 0), Some(10.0));
        assert_eq!(terrain.height_at(1, 1), Some(2.0));
        assert!(terrain.height_at(2, 0).is_none());
        assert_eq!(terrain.max_height(), 10.0);
    }

    #[test]
    fn test_height_lookup_on_wide_grid() {
        // Row offsets past u32::MAX must not wrap
        let terrain = HeightmapTerrain {
            width: 70_000,
            depth: 70_000,
            heights: vec![1.0; 4],
        };
        assert_eq!(terrain.height_at(3, 0), Some(1.0));
        assert_eq!(terrain.height_at(0, 69_999), None);
    }

    #[test]
    fn test_flat_terrain_normal_points_up() {
        let terrain = HeightmapTerrain::from_image(&ImageData::solid(3, 3, [128; 4]), 4.0);
        assert_eq!(terrain.normal_at(1, 1), Some(Vec3::Y));
    }

    #[test]
    fn test_terrain_request_uses_height_scale() {
        let mut pipeline = MemoryAssetPipeline::default();
        pipeline.insert("island.png", AssetData::Image(ramp()));
        let mut registry =
            ResourceRegistry::with_builtin_handlers(RegistryConfig::default(), pipeline).unwrap();

        let info = RequestInfo::new()
            .with_asset(AssetDescriptor::new("island.png", AssetKind::Image))
            .with_params(ResourceParams::Terrain { height_scale: 5.0 });
        let handle = registry.request("island", ResourceType::HeightmapTerrain, info).unwrap();
        assert_eq!(registry.state(handle), Some(ResourceState::Loading));

        registry.update();
        let terrain = registry.payload::<HeightmapTerrain>(handle).unwrap();
        assert_eq!(terrain.height_at(1, 0), Some(5.0));
    }
}
