//! Shader source resources
//!
//! A shader is text whose first non-empty line names its pipeline stage:
//!
//! ```text
//! #stage fragment
//! @fragment fn main() -> @location(0) vec4<f32> { ... }
//! ```

use std::str::FromStr;

use crate::assets::{AssetData, AssetKind, WatchId};
use crate::resources::error::ResourceError;
use crate::resources::handler::{HandlerContext, ResourceHandler, reload_payload};
use crate::resources::listener::FanIn;
use crate::resources::request::RequestInfo;
use crate::resources::resource::Resource;

use super::{Source, begin_single, commit, nothing_loaded, single_source};

const STAGE_DIRECTIVE: &str = "#stage";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

impl FromStr for ShaderStage {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vertex" => Ok(Self::Vertex),
            "fragment" => Ok(Self::Fragment),
            "compute" => Ok(Self::Compute),
            other => Err(ResourceError::Parse(format!("unknown shader stage '{other}'"))),
        }
    }
}

/// Shader source with its stage header stripped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shader {
    pub stage: ShaderStage,
    pub source: String,
}

impl Shader {
    /// Parse a `#stage` header and the source after it.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Parse`] if the header is missing or names an
    /// unknown stage.
    pub fn parse(text: &str) -> Result<Self, ResourceError> {
        let mut lines = text.lines();
        let header = lines
            .by_ref()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| ResourceError::Parse("empty shader".into()))?;

        let stage = header
            .trim()
            .strip_prefix(STAGE_DIRECTIVE)
            .ok_or_else(|| ResourceError::Parse(format!("expected '{STAGE_DIRECTIVE}' header")))?
            .trim()
            .parse()?;

        Ok(Self {
            stage,
            source: lines.collect::<Vec<_>>().join("\n"),
        })
    }
}

/// Loads [`Shader`]s from inline source or one text asset, honouring the
/// request's `synchronous` flag.
#[derive(Debug, Default)]
pub struct ShaderHandler;

impl ResourceHandler for ShaderHandler {
    fn request(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        resource: &mut Resource,
        info: &RequestInfo,
    ) -> Result<(), ResourceError> {
        match single_source(resource, info, AssetKind::Text)? {
            Source::Inline(source) => commit(resource, Shader::parse(source)?),
            Source::Asset(descriptor) => {
                begin_single(ctx, resource, info, descriptor, info.synchronous)
            }
        }
    }

    fn finalize(
        &mut self,
        _ctx: &mut HandlerContext<'_>,
        resource: &mut Resource,
        fan_in: FanIn,
    ) -> Result<(), ResourceError> {
        let text = fan_in
            .into_first()
            .and_then(AssetData::into_text)
            .ok_or_else(|| nothing_loaded(resource))?;
        resource.set_payload(Shader::parse(&text)?);
        resource.mark_loaded()
    }

    fn handle_hot_reload(&mut self, resource: &mut Resource, data: &AssetData, _watch_id: WatchId) -> bool {
        let name = resource.name().to_string();
        reload_payload(
            resource,
            |data| {
                let text = data.as_text()?;
                Shader::parse(text)
                    .map_err(|e| log::warn!("Keeping previous '{name}': {e}"))
                    .ok()
            },
            data,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetDescriptor, MemoryAssetPipeline};
    use crate::core::RegistryConfig;
    use crate::resources::{ResourceRegistry, ResourceState, ResourceType};

    #[test]
    fn test_parse_header() {
        let shader = Shader::parse("\n#stage fragment\nfn main() {}\n").unwrap();
        assert_eq!(shader.stage, ShaderStage::Fragment);
        assert_eq!(shader.source, "fn main() {}");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(Shader::parse(""), Err(ResourceError::Parse(_))));
        assert!(matches!(Shader::parse("fn main() {}"), Err(ResourceError::Parse(_))));
        assert!(matches!(Shader::parse("#stage geometry"), Err(ResourceError::Parse(_))));
    }

    #[test]
    fn test_bad_hot_reload_keeps_previous_source() {
        let mut pipeline = MemoryAssetPipeline::default();
        pipeline.insert("lit.wgsl", AssetData::Text("#stage vertex\nv1".into()));
        let mut registry =
            ResourceRegistry::with_builtin_handlers(RegistryConfig::default(), pipeline).unwrap();

        let info = RequestInfo::new()
            .with_asset(AssetDescriptor::new("lit.wgsl", AssetKind::Text).watched());
        let handle = registry.request("lit", ResourceType::Shader, info).unwrap();
        registry.update();
        assert_eq!(registry.generation(handle), Some(1));

        registry
            .pipeline_mut()
            .update("lit.wgsl", AssetData::Text("no header".into()));
        registry.update();
        assert_eq!(registry.generation(handle), Some(1));
        assert_eq!(registry.state(handle), Some(ResourceState::Loaded));

        registry
            .pipeline_mut()
            .update("lit.wgsl", AssetData::Text("#stage vertex\nv2".into()));
        registry.update();
        assert_eq!(registry.generation(handle), Some(2));
        assert_eq!(
            registry.payload::<Shader>(handle).map(|s| s.source.as_str()),
            Some("v2")
        );
    }
}
