//! Binary blob resources

use crate::assets::{AssetData, AssetKind, WatchId};
use crate::resources::error::ResourceError;
use crate::resources::handler::{HandlerContext, ResourceHandler, reload_payload};
use crate::resources::listener::FanIn;
use crate::resources::request::RequestInfo;
use crate::resources::resource::Resource;

use super::{begin_single, nothing_loaded, single_asset};

/// Raw bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binary {
    pub bytes: Vec<u8>,
}

/// Loads [`Binary`] from exactly one binary asset, synchronously.
#[derive(Debug, Default)]
pub struct BinaryHandler;

impl ResourceHandler for BinaryHandler {
    fn request(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        resource: &mut Resource,
        info: &RequestInfo,
    ) -> Result<(), ResourceError> {
        let descriptor = single_asset(resource, info, AssetKind::Binary)?;
        begin_single(ctx, resource, info, descriptor, true)
    }

    fn finalize(
        &mut self,
        _ctx: &mut HandlerContext<'_>,
        resource: &mut Resource,
        fan_in: FanIn,
    ) -> Result<(), ResourceError> {
        let bytes = fan_in
            .into_first()
            .and_then(AssetData::into_binary)
            .ok_or_else(|| nothing_loaded(resource))?;
        log::debug!("'{}' holds {} bytes", resource.name(), bytes.len());
        resource.set_payload(Binary { bytes });
        resource.mark_loaded()
    }

    fn handle_hot_reload(&mut self, resource: &mut Resource, data: &AssetData, _watch_id: WatchId) -> bool {
        reload_payload(
            resource,
            |data| data.as_binary().map(|bytes| Binary { bytes: bytes.to_vec() }),
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

    fn registry() -> ResourceRegistry<MemoryAssetPipeline> {
        let mut pipeline = MemoryAssetPipeline::default();
        pipeline.insert("save.dat", AssetData::Binary(vec![7, 7, 7]));
        ResourceRegistry::with_builtin_handlers(RegistryConfig::default(), pipeline).unwrap()
    }

    #[test]
    fn test_loads_before_request_returns() {
        let mut registry = registry();
        let info = RequestInfo::new().with_asset(AssetDescriptor::new("save.dat", AssetKind::Binary));
        let handle = registry.request("save", ResourceType::Binary, info).unwrap();

        assert_eq!(registry.state(handle), Some(ResourceState::Loaded));
        assert_eq!(
            registry.payload::<Binary>(handle).map(|b| b.bytes.as_slice()),
            Some(&[7, 7, 7][..])
        );
    }

    #[test]
    fn test_requires_exactly_one_binary_asset() {
        let mut registry = registry();

        let none = registry.request("save", ResourceType::Binary, RequestInfo::new());
        assert!(matches!(none, Err(ResourceError::InvalidRequest(_))));

        let wrong_kind = RequestInfo::new().with_asset(AssetDescriptor::new("save.dat", AssetKind::Text));
        let result = registry.request("save", ResourceType::Binary, wrong_kind);
        assert!(matches!(result, Err(ResourceError::InvalidRequest(_))));
    }

    #[test]
    fn test_missing_asset_stays_loading() {
        let mut registry = registry();
        let info = RequestInfo::new().with_asset(AssetDescriptor::new("lost.dat", AssetKind::Binary));
        let handle = registry.request("lost", ResourceType::Binary, info).unwrap();

        assert_eq!(registry.state(handle), Some(ResourceState::Loading));
        assert!(registry.payload::<Binary>(handle).is_none());
    }
}
