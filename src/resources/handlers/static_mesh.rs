//! Static mesh resources
//!
//! A static mesh is merged from one or more mesh assets. Each part's indices
//! are re-based onto the merged vertex buffer; parts that failed to load or
//! index past their own vertices are left out.

use std::ops::Range;

use glam::Vec3;

use crate::assets::{AssetData, AssetKind, MeshData, Vertex};
use crate::resources::error::ResourceError;
use crate::resources::handler::{HandlerContext, ResourceHandler};
use crate::resources::listener::FanIn;
use crate::resources::request::RequestInfo;
use crate::resources::resource::Resource;

use super::{expect_kind, nothing_loaded};

/// Merged geometry
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StaticMesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    /// Index range of each merged part, in request order
    pub parts: Vec<Range<u32>>,
    pub min: Vec3,
    pub max: Vec3,
}

impl StaticMesh {
    /// Append one part, re-basing its indices.
    ///
    /// Returns `false` and leaves the mesh unchanged if an index is out of
    /// range for the part.
    pub fn append(&mut self, part: &MeshData) -> bool {
        let count = part.vertices.len() as u32;
        if part.indices.iter().any(|&index| index >= count) {
            return false;
        }

        let base = self.vertices.len() as u32;
        let start = self.indices.len() as u32;
        self.vertices.extend_from_slice(&part.vertices);
        self.indices.extend(part.indices.iter().map(|&index| index + base));
        self.parts.push(start..self.indices.len() as u32);
        self.update_bounds();
        true
    }

    fn update_bounds(&mut self) {
        let mut positions = self.vertices.iter().map(|v| Vec3::from_array(v.position));
        let Some(first) = positions.next() else {
            return;
        };
        let (min, max) = positions.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        self.min = min;
        self.max = max;
    }

    /// Number of triangles
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Vertex buffer contents
    #[must_use]
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Index buffer contents
    #[must_use]
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

/// Loads [`StaticMesh`]es from one or more mesh assets.
#[derive(Debug, Default)]
pub struct StaticMeshHandler;

impl ResourceHandler for StaticMeshHandler {
    fn request(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        resource: &mut Resource,
        info: &RequestInfo,
    ) -> Result<(), ResourceError> {
        for descriptor in &info.assets {
            expect_kind(descriptor, AssetKind::StaticMesh)?;
        }
        ctx.begin_fan_in(
            resource,
            &info.assets,
            info.synchronous,
            info.import_params,
            info.params.clone(),
        )?;
        Ok(())
    }

    fn finalize(
        &mut self,
        _ctx: &mut HandlerContext<'_>,
        resource: &mut Resource,
        fan_in: FanIn,
    ) -> Result<(), ResourceError> {
        let mut mesh = StaticMesh::default();

        for (position, data) in fan_in.into_successes() {
            let Some(part) = AssetData::into_mesh(data) else {
                continue;
            };
            if !mesh.append(&part) {
                log::warn!(
                    "Mesh '{}': part {position} has indices past its {} vertices; skipping it",
                    resource.name(),
                    part.vertices.len()
                );
            }
        }

        if mesh.parts.is_empty() {
            return Err(nothing_loaded(resource));
        }
        log::debug!(
            "Mesh '{}': {} parts, {} triangles",
            resource.name(),
            mesh.parts.len(),
            mesh.triangle_count()
        );
        resource.set_payload(mesh);
        resource.mark_loaded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetDescriptor, MemoryAssetPipeline};
    use crate::core::RegistryConfig;
    use crate::resources::{ResourceRegistry, ResourceState, ResourceType};

    fn triangle(offset: f32) -> MeshData {
        let normal = [0.0, 0.0, 1.0];
        MeshData {
            vertices: vec![
                Vertex::new([offset, 0.0, 0.0], normal, [0.0, 0.0]),
                Vertex::new([offset + 1.0, 0.0, 0.0], normal, [1.0, 0.0]),
                Vertex::new([offset, 1.0, 0.0], normal, [0.0, 1.0]),
            ],
            indices: vec![0, 1, 2],
        }
    }

    #[test]
    fn test_append_rebases_indices() {
        let mut mesh = StaticMesh::default();
        assert!(mesh.append(&triangle(0.0)));
        assert!(mesh.append(&triangle(5.0)));

        assert_eq!(mesh.indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(mesh.parts, vec![0..3, 3..6]);
        assert_eq!(mesh.min, Vec3::ZERO);
        assert_eq!(mesh.max, Vec3::new(6.0, 1.0, 0.0));
        assert_eq!(mesh.vertex_bytes().len(), 6 * std::mem::size_of::<Vertex>());
    }

    #[test]
    fn test_append_rejects_bad_indices() {
        let mut mesh = StaticMesh::default();
        let mut broken = triangle(0.0);
        broken.indices = vec![0, 1, 3];

        assert!(!mesh.append(&broken));
        assert!(mesh.vertices.is_empty());
    }

    #[test]
    fn test_failed_part_is_excluded() {
        let mut pipeline = MemoryAssetPipeline::default();
        pipeline.insert("hull", AssetData::StaticMesh(triangle(0.0)));
        pipeline.insert("turret", AssetData::StaticMesh(triangle(2.0)));
        let mut registry =
            ResourceRegistry::with_builtin_handlers(RegistryConfig::default(), pipeline).unwrap();

        let info = RequestInfo::new().with_assets(
            ["hull", "wheels", "turret"].map(|name| AssetDescriptor::new(name, AssetKind::StaticMesh)),
        );
        let handle = registry.request("tank", ResourceType::StaticMesh, info).unwrap();
        registry.update();

        assert_eq!(registry.state(handle), Some(ResourceState::Loaded));
        let mesh = registry.payload::<StaticMesh>(handle).unwrap();
        assert_eq!(mesh.parts.len(), 2);
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.vertices[3].position, [2.0, 0.0, 0.0]);
    }
}
