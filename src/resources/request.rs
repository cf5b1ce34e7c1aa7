//! Resource request descriptions

use std::fmt;

use smallvec::SmallVec;

use crate::assets::{AssetDescriptor, ImportParams};
use crate::storage::Handle;

use super::resource::{Resource, Tags};

/// Called once with the resource after it first reaches `Loaded`.
pub type ResourceCallback = Box<dyn FnOnce(Handle, &Resource)>;

/// Texture layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureDimension {
    /// One image
    #[default]
    D2,
    /// One or more layers in request order
    Array,
    /// Exactly six faces
    Cube,
}

/// Type-specific request parameters
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResourceParams {
    #[default]
    None,
    Texture(TextureDimension),
    Terrain {
        /// World height of a full-intensity pixel
        height_scale: f32,
    },
    SystemFont {
        /// Face name within the font file
        face: String,
    },
}

/// Everything about a request except the callback.
///
/// Kept on the resource so it can be loaded again after an unload.
#[derive(Debug, Clone, Default)]
pub struct RequestTemplate {
    pub assets: SmallVec<[AssetDescriptor; 6]>,
    pub source_text: Option<String>,
    pub synchronous: bool,
    pub import_params: ImportParams,
    pub params: ResourceParams,
    pub tags: Tags,
}

/// Describes how to build a resource.
///
/// # Example
///
/// ```ignore
/// let info = RequestInfo::new()
///     .with_asset(AssetDescriptor::new("sky_px", AssetKind::Image))
///     .with_params(ResourceParams::Texture(TextureDimension::D2))
///     .on_loaded(|handle, resource| println!("{} ready", resource.name()));
/// ```
#[derive(Default)]
pub struct RequestInfo {
    /// Underlying assets, in the order the handler consumes them
    pub assets: SmallVec<[AssetDescriptor; 6]>,
    /// Inline source used instead of an asset by text-based handlers
    pub source_text: Option<String>,
    /// Load every asset before `request` returns
    pub synchronous: bool,
    pub import_params: ImportParams,
    pub params: ResourceParams,
    pub tags: Tags,
    pub on_loaded: Option<ResourceCallback>,
}

impl RequestInfo {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_asset(mut self, descriptor: AssetDescriptor) -> Self {
        self.assets.push(descriptor);
        self
    }

    #[must_use]
    pub fn with_assets(mut self, descriptors: impl IntoIterator<Item = AssetDescriptor>) -> Self {
        self.assets.extend(descriptors);
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source_text = Some(source.into());
        self
    }

    #[must_use]
    pub fn synchronous(mut self) -> Self {
        self.synchronous = true;
        self
    }

    #[must_use]
    pub fn with_import_params(mut self, import_params: ImportParams) -> Self {
        self.import_params = import_params;
        self
    }

    #[must_use]
    pub fn with_params(mut self, params: ResourceParams) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn on_loaded(mut self, callback: impl FnOnce(Handle, &Resource) + 'static) -> Self {
        self.on_loaded = Some(Box::new(callback));
        self
    }

    /// Copy of the request without its callback
    #[must_use]
    pub fn template(&self) -> RequestTemplate {
        RequestTemplate {
            assets: self.assets.clone(),
            source_text: self.source_text.clone(),
            synchronous: self.synchronous,
            import_params: self.import_params,
            params: self.params.clone(),
            tags: self.tags.clone(),
        }
    }
}

impl From<RequestTemplate> for RequestInfo {
    fn from(template: RequestTemplate) -> Self {
        Self {
            assets: template.assets,
            source_text: template.source_text,
            synchronous: template.synchronous,
            import_params: template.import_params,
            params: template.params,
            tags: template.tags,
            on_loaded: None,
        }
    }
}

impl fmt::Debug for RequestInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestInfo")
            .field("assets", &self.assets)
            .field("source_text", &self.source_text.as_ref().map(String::len))
            .field("synchronous", &self.synchronous)
            .field("import_params", &self.import_params)
            .field("params", &self.params)
            .field("tags", &self.tags)
            .field("on_loaded", &self.on_loaded.is_some())
            .finish()
    }
}
