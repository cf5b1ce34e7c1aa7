//! Font resources
//!
//! Bitmap fonts are described in RON: a glyph table plus the name of the
//! page texture, which is requested as a dependency. System fonts keep the
//! raw font file bytes and the face name for a rasterizer to use later.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::assets::{AssetData, AssetKind};
use crate::resources::error::ResourceError;
use crate::resources::handler::{HandlerContext, ResourceHandler};
use crate::resources::listener::FanIn;
use crate::resources::request::{RequestInfo, ResourceParams};
use crate::resources::resource::{Resource, ResourceType};

use super::{begin_single, named_asset_request, nothing_loaded, single_asset, unexpected_params};

/// One glyph on the page texture
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Glyph {
    pub character: char,
    /// Pixel rectangle on the page
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Horizontal pen advance
    pub advance: f32,
    /// Offset from the pen position to the glyph's top left
    #[serde(default)]
    pub offset: [f32; 2],
}

/// A bitmap font as written in a font file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitmapFontConfig {
    /// Texture asset holding every glyph
    pub page: String,
    pub line_height: f32,
    pub glyphs: Vec<Glyph>,
}

impl BitmapFontConfig {
    /// Parse a font from RON
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Parse`] if the source is not a valid font
    pub fn from_ron_str(source: &str) -> Result<Self, ResourceError> {
        ron::from_str(source).map_err(|e| ResourceError::Parse(e.to_string()))
    }
}

/// A loaded bitmap font
#[derive(Debug, Clone, PartialEq)]
pub struct BitmapFont {
    /// Page texture resource name, also present as a dependency
    pub page: String,
    pub line_height: f32,
    glyphs: FxHashMap<char, Glyph>,
}

impl BitmapFont {
    #[must_use]
    pub fn glyph(&self, character: char) -> Option<&Glyph> {
        self.glyphs.get(&character)
    }

    #[must_use]
    pub fn glyph_count(&self) -> usize {
        self.glyphs.len()
    }

    /// Width of the widest line of `text`. Characters without a glyph are
    /// skipped.
    #[must_use]
    pub fn measure(&self, text: &str) -> f32 {
        text.lines()
            .map(|line| line.chars().filter_map(|c| self.glyph(c)).map(|g| g.advance).sum::<f32>())
            .fold(0.0, f32::max)
    }
}

impl From<BitmapFontConfig> for BitmapFont {
    fn from(config: BitmapFontConfig) -> Self {
        Self {
            page: config.page,
            line_height: config.line_height,
            glyphs: config.glyphs.into_iter().map(|g| (g.character, g)).collect(),
        }
    }
}

/// Loads [`BitmapFont`]s from one text asset, synchronously.
#[derive(Debug, Default)]
pub struct BitmapFontHandler;

impl ResourceHandler for BitmapFontHandler {
    fn request(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        resource: &mut Resource,
        info: &RequestInfo,
    ) -> Result<(), ResourceError> {
        let descriptor = single_asset(resource, info, AssetKind::Text)?;
        begin_single(ctx, resource, info, descriptor, true)
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
        let font = BitmapFont::from(BitmapFontConfig::from_ron_str(&source)?);

        ctx.request_dependency(
            &font.page,
            ResourceType::Texture,
            named_asset_request(&font.page, ResourceType::Texture),
        );
        log::debug!("Font '{}': {} glyphs", resource.name(), font.glyph_count());
        resource.set_payload(font);
        resource.mark_loaded()
    }
}

/// A font file to be rasterized on demand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemFont {
    pub face: String,
    pub bytes: Vec<u8>,
}

fn face_of(resource: &Resource, params: &ResourceParams) -> Result<String, ResourceError> {
    match params {
        ResourceParams::SystemFont { face } if !face.is_empty() => Ok(face.clone()),
        ResourceParams::SystemFont { .. } => Err(ResourceError::InvalidRequest(format!(
            "system font '{}' names no face",
            resource.name()
        ))),
        other => Err(unexpected_params(resource, other)),
    }
}

/// Loads [`SystemFont`]s from one binary asset plus a face name given as
/// [`ResourceParams::SystemFont`], synchronously.
#[derive(Debug, Default)]
pub struct SystemFontHandler;

impl ResourceHandler for SystemFontHandler {
    fn request(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        resource: &mut Resource,
        info: &RequestInfo,
    ) -> Result<(), ResourceError> {
        face_of(resource, &info.params)?;
        let descriptor = single_asset(resource, info, AssetKind::Binary)?;
        begin_single(ctx, resource, info, descriptor, true)
    }

    fn finalize(
        &mut self,
        _ctx: &mut HandlerContext<'_>,
        resource: &mut Resource,
        fan_in: FanIn,
    ) -> Result<(), ResourceError> {
        let face = face_of(resource, &fan_in.params)?;
        let bytes = fan_in
            .into_first()
            .and_then(AssetData::into_binary)
            .ok_or_else(|| nothing_loaded(resource))?;
        resource.set_payload(SystemFont { face, bytes });
        resource.mark_loaded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetDescriptor, ImageData, MemoryAssetPipeline};
    use crate::core::RegistryConfig;
    use crate::resources::{ResourceRegistry, ResourceState};

    const MONO: &str = r#"(
        page: "mono.png",
        line_height: 16.0,
        glyphs: [
            (character: 'a', x: 0, y: 0, width: 8, height: 16, advance: 8.0),
            (character: 'b', x: 8, y: 0, width: 8, height: 16, advance: 9.0),
        ],
    )"#;

    fn registry() -> ResourceRegistry<MemoryAssetPipeline> {
        let mut pipeline = MemoryAssetPipeline::default();
        pipeline.insert("mono.ron", AssetData::Text(MONO.into()));
        pipeline.insert("mono.png", AssetData::Image(ImageData::solid(16, 16, [255; 4])));
        pipeline.insert("sans.ttf", AssetData::Binary(vec![0, 1, 0, 0]));
        ResourceRegistry::with_builtin_handlers(RegistryConfig::default(), pipeline).unwrap()
    }

    #[test]
    fn test_measure_uses_widest_line() {
        let font = BitmapFont::from(BitmapFontConfig::from_ron_str(MONO).unwrap());
        assert_eq!(font.measure("ab"), 17.0);
        assert_eq!(font.measure("a\nbb?"), 18.0);
        assert_eq!(font.measure(""), 0.0);
        assert_eq!(font.glyph('b').unwrap().x, 8);
    }

    #[test]
    fn test_bitmap_font_loads_synchronously_with_page() {
        let mut registry = registry();
        let info = RequestInfo::new().with_asset(AssetDescriptor::new("mono.ron", AssetKind::Text));
        let handle = registry.request("mono", ResourceType::BitmapFont, info).unwrap();

        assert_eq!(registry.state(handle), Some(ResourceState::Loaded));
        let page = registry.get(handle).unwrap().dependencies()[0];
        assert_eq!(registry.find("mono.png", ResourceType::Texture), Some(page));

        registry.update();
        assert_eq!(registry.state(page), Some(ResourceState::Loaded));
    }

    #[test]
    fn test_system_font_needs_face() {
        let mut registry = registry();
        let bytes = || RequestInfo::new().with_asset(AssetDescriptor::new("sans.ttf", AssetKind::Binary));

        assert!(registry.request("sans", ResourceType::SystemFont, bytes()).is_err());

        let info = bytes().with_params(ResourceParams::SystemFont {
            face: "Sans Regular".into(),
        });
        let handle = registry.request("sans", ResourceType::SystemFont, info).unwrap();
        let font = registry.payload::<SystemFont>(handle).unwrap();
        assert_eq!(font.face, "Sans Regular");
        assert_eq!(font.bytes.len(), 4);
    }
}
