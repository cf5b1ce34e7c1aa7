//! Text resources

use crate::assets::{AssetData, AssetKind, WatchId};
use crate::resources::error::ResourceError;
use crate::resources::handler::{HandlerContext, ResourceHandler, reload_payload};
use crate::resources::listener::FanIn;
use crate::resources::request::RequestInfo;
use crate::resources::resource::Resource;

use super::{Source, begin_single, commit, nothing_loaded, single_source};

/// A loaded UTF-8 document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
    pub content: String,
}

/// Loads [`Text`] from inline source or one text asset. The asset is always
/// read synchronously.
#[derive(Debug, Default)]
pub struct TextHandler;

impl ResourceHandler for TextHandler {
    fn request(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        resource: &mut Resource,
        info: &RequestInfo,
    ) -> Result<(), ResourceError> {
        match single_source(resource, info, AssetKind::Text)? {
            Source::Inline(source) => commit(
                resource,
                Text {
                    content: source.to_string(),
                },
            ),
            Source::Asset(descriptor) => begin_single(ctx, resource, info, descriptor, true),
        }
    }

    fn finalize(
        &mut self,
        _ctx: &mut HandlerContext<'_>,
        resource: &mut Resource,
        fan_in: FanIn,
    ) -> Result<(), ResourceError> {
        let content = fan_in
            .into_first()
            .and_then(AssetData::into_text)
            .ok_or_else(|| nothing_loaded(resource))?;
        resource.set_payload(Text { content });
        resource.mark_loaded()
    }

    fn handle_hot_reload(&mut self, resource: &mut Resource, data: &AssetData, _watch_id: WatchId) -> bool {
        reload_payload(
            resource,
            |data| {
                data.as_text().map(|content| Text {
                    content: content.to_string(),
                })
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
    fn test_inline_source_loads_immediately() {
        let mut registry =
            ResourceRegistry::with_builtin_handlers(RegistryConfig::default(), MemoryAssetPipeline::default())
                .unwrap();

        let handle = registry
            .request("motd", ResourceType::Text, RequestInfo::new().with_source("welcome"))
            .unwrap();

        assert_eq!(registry.state(handle), Some(ResourceState::Loaded));
        assert_eq!(registry.generation(handle), Some(1));
        assert_eq!(registry.pipeline().requests_submitted(), 0);
    }

    #[test]
    fn test_rejects_source_and_asset_together() {
        let mut registry =
            ResourceRegistry::with_builtin_handlers(RegistryConfig::default(), MemoryAssetPipeline::default())
                .unwrap();

        let info = RequestInfo::new()
            .with_source("inline")
            .with_asset(AssetDescriptor::new("motd.txt", AssetKind::Text));
        let result = registry.request("motd", ResourceType::Text, info);

        assert!(matches!(result, Err(ResourceError::InvalidRequest(_))));
    }

    #[test]
    fn test_asset_is_loaded_synchronously() {
        let mut pipeline = MemoryAssetPipeline::default();
        pipeline.set_auto_complete(false);
        pipeline.insert("motd.txt", AssetData::Text("from disk".into()));
        let mut registry =
            ResourceRegistry::with_builtin_handlers(RegistryConfig::default(), pipeline).unwrap();

        let info = RequestInfo::new().with_asset(AssetDescriptor::new("motd.txt", AssetKind::Text));
        let handle = registry.request("motd", ResourceType::Text, info).unwrap();

        assert_eq!(
            registry.payload::<Text>(handle),
            Some(&Text {
                content: "from disk".into()
            })
        );
    }
}
