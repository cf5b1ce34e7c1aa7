//! Handler contract
//!
//! One [`ResourceHandler`] per resource type implements how that type is
//! requested, finalized from its assets, released and hot reloaded. The
//! registry owns the handlers and calls them with a [`HandlerContext`] that
//! gives access to the asset pipeline and the listener table.

use crate::assets::{
    AssetContext, AssetData, AssetDescriptor, AssetPipeline, AssetRequest, ImportParams, WatchId,
};
use crate::core::RegistryConfig;
use crate::storage::{Handle, SlotTable};

use super::error::ResourceError;
use super::listener::{FanIn, Listener};
use super::request::{RequestInfo, ResourceParams};
use super::resource::{Resource, ResourceState, ResourceType};

/// A resource the registry should request on behalf of another one.
#[derive(Debug)]
pub struct DependencyRequest {
    pub name: String,
    pub resource_type: ResourceType,
    pub info: RequestInfo,
}

/// Services available to a handler while it runs.
pub struct HandlerContext<'a> {
    pipeline: &'a mut dyn AssetPipeline,
    listeners: &'a mut SlotTable<Listener>,
    config: &'a RegistryConfig,
    handle: Handle,
    dependencies: Vec<DependencyRequest>,
}

impl<'a> HandlerContext<'a> {
    pub(crate) fn new(
        pipeline: &'a mut dyn AssetPipeline,
        listeners: &'a mut SlotTable<Listener>,
        config: &'a RegistryConfig,
        handle: Handle,
    ) -> Self {
        Self {
            pipeline,
            listeners,
            config,
            handle,
            dependencies: Vec::new(),
        }
    }

    /// Handle of the resource being worked on
    #[must_use]
    pub const fn handle(&self) -> Handle {
        self.handle
    }

    #[must_use]
    pub const fn config(&self) -> &RegistryConfig {
        self.config
    }

    /// Request every asset in `descriptors` and move the resource to
    /// `Loading`.
    ///
    /// Each request carries a ticket naming the new listener and the asset's
    /// position, so completions may arrive in any order. Once all have
    /// arrived the registry calls the handler's `finalize` exactly once.
    ///
    /// # Errors
    ///
    /// Fails without side effects when `descriptors` is empty, the resource
    /// cannot start loading from its current state, or the listener table
    /// is full.
    pub fn begin_fan_in(
        &mut self,
        resource: &mut Resource,
        descriptors: &[AssetDescriptor],
        synchronous: bool,
        import_params: ImportParams,
        params: ResourceParams,
    ) -> Result<Handle, ResourceError> {
        if descriptors.is_empty() {
            return Err(ResourceError::InvalidRequest(format!(
                "'{}' names no assets",
                resource.name()
            )));
        }
        if !resource.state().can_transition_to(ResourceState::Loading) {
            return Err(ResourceError::IllegalTransition {
                from: resource.state(),
                to: ResourceState::Loading,
            });
        }

        let listener = self
            .listeners
            .allocate(Listener::new(self.handle, descriptors, params))
            .map_err(|e| ResourceError::capacity("in-flight request", e))?;
        resource.transition(ResourceState::Loading)?;
        resource.listener = listener;

        log::debug!(
            "Resource '{}' waiting on {} asset(s)",
            resource.name(),
            descriptors.len()
        );

        for (position, descriptor) in descriptors.iter().enumerate() {
            self.pipeline.request_asset(AssetRequest {
                descriptor: descriptor.clone(),
                synchronous,
                params: import_params,
                context: AssetContext { listener, position },
            });
        }

        Ok(listener)
    }

    /// Queue another resource to be requested once this handler returns.
    ///
    /// The resulting handle is stored in the resource's dependency list and
    /// released together with it.
    pub fn request_dependency(
        &mut self,
        name: impl Into<String>,
        resource_type: ResourceType,
        info: RequestInfo,
    ) {
        self.dependencies.push(DependencyRequest {
            name: name.into(),
            resource_type,
            info,
        });
    }

    pub(crate) fn into_dependencies(self) -> Vec<DependencyRequest> {
        self.dependencies
    }
}

/// Per-type resource behaviour.
///
/// Handlers never unwind; every failure is returned as an error, which the
/// registry logs.
pub trait ResourceHandler {
    /// Start building `resource` from `info`.
    ///
    /// Validate the request shape first and return
    /// [`ResourceError::InvalidRequest`] before touching any state. Then
    /// either load synchronously (`Loading` then [`Resource::mark_loaded`])
    /// or call [`HandlerContext::begin_fan_in`].
    fn request(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        resource: &mut Resource,
        info: &RequestInfo,
    ) -> Result<(), ResourceError>;

    /// Build the payload once every requested asset has reported.
    ///
    /// Failed assets are present as errors in `fan_in`. Returning an error
    /// leaves the resource in `Loading`.
    fn finalize(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        resource: &mut Resource,
        fan_in: FanIn,
    ) -> Result<(), ResourceError> {
        let _ = (ctx, fan_in);
        Err(ResourceError::InvalidRequest(format!(
            "{} resources do not load from assets",
            resource.resource_type()
        )))
    }

    /// Free everything the payload owns. Must cope with a resource that
    /// never finished loading.
    fn release(&mut self, resource: &mut Resource) {
        resource.clear_payload();
    }

    /// Replace the payload after a watched asset changed.
    ///
    /// Returns `true` if the resource was reloaded.
    fn handle_hot_reload(
        &mut self,
        resource: &mut Resource,
        data: &AssetData,
        watch_id: WatchId,
    ) -> bool {
        let _ = (resource, data, watch_id);
        false
    }

    /// Whether resources of this type can be unloaded and reloaded in place
    fn supports_unload(&self) -> bool {
        false
    }

    /// Drop the loaded contents while keeping the record, between
    /// `Unloading` and `Unloaded`.
    fn unload(&mut self, resource: &mut Resource) {
        resource.clear_payload();
    }
}

/// Swap in a new payload produced by a hot reload and bump the generation.
///
/// Shared by the handlers whose assets can be watched.
pub(crate) fn reload_payload<T: 'static>(
    resource: &mut Resource,
    build: impl FnOnce(&AssetData) -> Option<T>,
    data: &AssetData,
) -> bool {
    if resource.state() != ResourceState::Loaded {
        log::debug!(
            "Ignoring change for '{}' while {:?}",
            resource.name(),
            resource.state()
        );
        return false;
    }
    let Some(payload) = build(data) else {
        log::warn!(
            "Changed {:?} asset for '{}' was not applied",
            data.kind(),
            resource.name()
        );
        return false;
    };

    if resource.transition(ResourceState::Loading).is_err() {
        return false;
    }
    resource.set_payload(payload);
    resource.mark_loaded().is_ok()
}
