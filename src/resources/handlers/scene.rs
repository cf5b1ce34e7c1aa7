//! Scene resources
//!
//! Supports loading scenes written in RON (Rusty Object Notation). A scene is
//! a flat list of nodes with optional parents; every attachment on a node is
//! requested as a dependency and released with the scene. Scenes can be
//! unloaded and later reloaded in place.

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::assets::{AssetData, AssetDescriptor, AssetKind};
use crate::resources::error::ResourceError;
use crate::resources::handler::{HandlerContext, ResourceHandler};
use crate::resources::listener::FanIn;
use crate::resources::request::RequestInfo;
use crate::resources::resource::{Resource, ResourceType};

use super::{Source, begin_single, commit, named_asset_request, nothing_loaded, single_source};

/// Local transform of a node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeTransform {
    pub position: [f32; 3],
    /// Rotation quaternion (x, y, z, w)
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 3],
        }
    }
}

impl NodeTransform {
    /// Local matrix
    #[must_use]
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::from_array(self.scale),
            Quat::from_array(self.rotation).normalize(),
            Vec3::from_array(self.position),
        )
    }
}

/// A resource a node uses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub resource_type: ResourceType,
    /// Resource name
    pub name: String,
    /// Assets to build the resource from. When empty, one asset with the
    /// resource's name is used.
    #[serde(default)]
    pub assets: Vec<AssetDescriptor>,
}

impl Attachment {
    fn request_info(&self) -> RequestInfo {
        if self.assets.is_empty() {
            named_asset_request(&self.name, self.resource_type)
        } else {
            RequestInfo::new().with_assets(self.assets.iter().cloned())
        }
    }
}

/// A node in the scene
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneNode {
    pub name: String,
    pub transform: NodeTransform,
    /// Index of the parent node (if any)
    pub parent: Option<usize>,
    pub attachments: Vec<Attachment>,
}

/// A scene as written in a scene file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub name: String,
    /// Scene version for compatibility
    pub version: u32,
    pub nodes: Vec<SceneNode>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            name: "Untitled".to_string(),
            version: 1,
            nodes: Vec::new(),
        }
    }
}

impl SceneConfig {
    /// Parse and validate a scene from RON
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Parse`] if the source cannot be parsed or a
    /// parent link points outside the node list or forms a cycle
    pub fn from_ron_str(source: &str) -> Result<Self, ResourceError> {
        let config: Self = ron::from_str(source).map_err(|e| ResourceError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty RON
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Parse`] if serialization fails
    pub fn to_ron(&self) -> Result<String, ResourceError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ResourceError::Parse(e.to_string()))
    }

    fn validate(&self) -> Result<(), ResourceError> {
        let count = self.nodes.len();
        for (index, node) in self.nodes.iter().enumerate() {
            let mut parent = node.parent;
            let mut depth = 0;
            while let Some(next) = parent {
                if next >= count {
                    return Err(ResourceError::Parse(format!(
                        "node {index} ('{}') has parent {next}, but the scene has {count} nodes",
                        node.name
                    )));
                }
                depth += 1;
                if depth > count {
                    return Err(ResourceError::Parse(format!(
                        "node {index} ('{}') is part of a parent cycle",
                        node.name
                    )));
                }
                parent = self.nodes[next].parent;
            }
        }
        Ok(())
    }

    /// Every attachment in node order
    pub fn attachments(&self) -> impl Iterator<Item = &Attachment> {
        self.nodes.iter().flat_map(|node| node.attachments.iter())
    }
}

/// A loaded scene
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub config: SceneConfig,
}

impl Scene {
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.config.nodes.len()
    }

    /// Index of the first node with this name
    #[must_use]
    pub fn find_node(&self, name: &str) -> Option<usize> {
        self.config.nodes.iter().position(|node| node.name == name)
    }

    /// World matrix of a node, composed through its parents
    #[must_use]
    pub fn world_transform(&self, index: usize) -> Option<Mat4> {
        let node = self.config.nodes.get(index)?;
        let mut matrix = node.transform.matrix();
        let mut parent = node.parent;
        while let Some(next) = parent {
            let node = self.config.nodes.get(next)?;
            matrix = node.transform.matrix() * matrix;
            parent = node.parent;
        }
        Some(matrix)
    }
}

/// Parse, queue attachments and commit
fn build(
    ctx: &mut HandlerContext<'_>,
    resource: &mut Resource,
    source: &str,
    loading: bool,
) -> Result<(), ResourceError> {
    let config = SceneConfig::from_ron_str(source)?;
    for attachment in config.attachments() {
        ctx.request_dependency(&attachment.name, attachment.resource_type, attachment.request_info());
    }
    log::info!(
        "Scene '{}': {} nodes, {} attachments",
        resource.name(),
        config.nodes.len(),
        config.attachments().count()
    );

    let scene = Scene { config };
    if loading {
        resource.set_payload(scene);
        resource.mark_loaded()
    } else {
        commit(resource, scene)
    }
}

/// Loads [`Scene`]s from inline RON or one text asset.
#[derive(Debug, Default)]
pub struct SceneHandler;

impl ResourceHandler for SceneHandler {
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

    fn supports_unload(&self) -> bool {
        true
    }
}
