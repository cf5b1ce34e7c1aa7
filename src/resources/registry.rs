//! Resource registry
//!
//! Owns every resource record, the handler for each resource type and the
//! in-flight fan-in records. It is driven from a single thread: callers
//! request and release resources, and call [`ResourceRegistry::update`] once
//! per frame to route asset completions back to their resources.
//!
//! # Example
//!
//! ```ignore
//! let mut registry = ResourceRegistry::with_builtin_handlers(config, pipeline)?;
//!
//! let brick = registry.request(
//!     "brick",
//!     ResourceType::Texture,
//!     RequestInfo::new().with_asset(AssetDescriptor::new("brick.png", AssetKind::Image)),
//! )?;
//!
//! loop {
//!     registry.update();
//!     if let Some(texture) = registry.payload::<Texture>(brick) {
//!         // upload when the generation changes
//!     }
//! }
//! ```

use std::mem;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::assets::{AssetCompletion, AssetData, AssetDescriptor, AssetEvent, AssetPipeline, WatchId};
use crate::core::RegistryConfig;
use crate::storage::{Handle, SlotTable};

use super::error::ResourceError;
use super::handler::{DependencyRequest, HandlerContext, ResourceHandler};
use super::handlers;
use super::listener::Listener;
use super::request::{RequestInfo, ResourceCallback};
use super::resource::{Resource, ResourceState, ResourceType};

/// Central store of resources, generic over the asset pipeline that feeds it.
pub struct ResourceRegistry<P: AssetPipeline> {
    config: RegistryConfig,
    pipeline: P,
    resources: SlotTable<Resource>,
    listeners: SlotTable<Listener>,
    handlers: FxHashMap<ResourceType, Box<dyn ResourceHandler>>,
    /// Live resources by type and name
    names: FxHashMap<ResourceType, FxHashMap<Arc<str>, Handle>>,
    /// Resource owning each watch
    watches: FxHashMap<WatchId, Handle>,
    /// Parents whose dependencies are being requested, innermost last
    attaching: Vec<Handle>,
}

impl<P: AssetPipeline> ResourceRegistry<P> {
    /// Create a registry with no handlers registered.
    #[must_use]
    pub fn new(config: RegistryConfig, pipeline: P) -> Self {
        log::info!(
            "Resource registry created (max resources: {:?}, max in-flight: {:?})",
            config.max_resources,
            config.max_in_flight_requests
        );
        Self {
            resources: SlotTable::with_optional_capacity(config.max_resources),
            listeners: SlotTable::with_optional_capacity(config.max_in_flight_requests),
            config,
            pipeline,
            handlers: FxHashMap::default(),
            names: FxHashMap::default(),
            watches: FxHashMap::default(),
            attaching: Vec::new(),
        }
    }

    /// Create a registry with a handler for every built-in resource type.
    ///
    /// # Errors
    ///
    /// Only fails if a built-in type were registered twice.
    pub fn with_builtin_handlers(config: RegistryConfig, pipeline: P) -> Result<Self, ResourceError> {
        let mut registry = Self::new(config, pipeline);
        for (resource_type, handler) in handlers::builtin(&registry.config) {
            registry.insert_handler(resource_type, handler)?;
        }
        Ok(registry)
    }

    /// Register the handler for `resource_type`.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::HandlerAlreadyRegistered`] if the type already
    /// has one; the existing handler is kept.
    pub fn register_handler(
        &mut self,
        resource_type: ResourceType,
        handler: impl ResourceHandler + 'static,
    ) -> Result<(), ResourceError> {
        self.insert_handler(resource_type, Box::new(handler))
    }

    fn insert_handler(
        &mut self,
        resource_type: ResourceType,
        handler: Box<dyn ResourceHandler>,
    ) -> Result<(), ResourceError> {
        if self.handlers.contains_key(&resource_type) {
            let error = ResourceError::HandlerAlreadyRegistered(resource_type);
            log::error!("{error}");
            return Err(error);
        }
        log::debug!("Registered handler for {resource_type}");
        self.handlers.insert(resource_type, handler);
        Ok(())
    }

    #[must_use]
    pub fn has_handler(&self, resource_type: ResourceType) -> bool {
        self.handlers.contains_key(&resource_type)
    }

    /// Request a resource by name.
    ///
    /// If a live resource of the same type and name exists its reference
    /// count is incremented and its handle returned; `info`'s callback then
    /// fires immediately if it is loaded, or once it loads. Otherwise a new
    /// record is created and handed to the type's handler. Synchronous assets
    /// are loaded before this returns.
    ///
    /// Every successful call must be matched by one [`release`](Self::release).
    ///
    /// # Errors
    ///
    /// - [`ResourceError::NoHandler`] when the type has no handler
    /// - [`ResourceError::CapacityExhausted`] when the resource or in-flight
    ///   table is full
    /// - [`ResourceError::InvalidRequest`] when the handler rejects `info`
    ///
    /// No record is left behind on error.
    pub fn request(
        &mut self,
        name: &str,
        resource_type: ResourceType,
        mut info: RequestInfo,
    ) -> Result<Handle, ResourceError> {
        if let Some(existing) = self.find(name, resource_type) {
            self.add_reference(existing, info.on_loaded.take());
            return Ok(existing);
        }

        if !self.has_handler(resource_type) {
            let error = ResourceError::NoHandler(resource_type);
            log::error!("Cannot request '{name}': {error}");
            return Err(error);
        }

        let name: Arc<str> = Arc::from(name);
        let mut resource = Resource::new(Arc::clone(&name), resource_type);
        resource.tags = info.tags.clone();
        resource.template = Some(info.template());
        resource.callbacks.extend(info.on_loaded.take());

        let handle = self.resources.allocate(resource).map_err(|e| {
            let error = ResourceError::capacity("resource", e);
            log::error!("Cannot request '{name}': {error}");
            error
        })?;

        let dependencies = match self.dispatch_request(handle, &info) {
            Ok(dependencies) => dependencies,
            Err(error) => {
                log::error!("Request for {resource_type} '{name}' rejected: {error}");
                self.discard(handle);
                return Err(error);
            }
        };

        log::debug!("Requested {resource_type} '{name}' as {handle}");
        self.names
            .entry(resource_type)
            .or_default()
            .insert(name, handle);

        self.drain_synchronous();
        self.attach_dependencies(handle, dependencies);
        self.fire_callbacks(handle);
        Ok(handle)
    }

    /// Drop one reference to a resource.
    ///
    /// When the last reference goes the handler frees the payload, the
    /// resource's assets and dependencies are released, and the slot is
    /// recycled so every handle to it becomes stale.
    ///
    /// Returns `false` for a stale or invalid handle.
    pub fn release(&mut self, handle: Handle) -> bool {
        let Some(resource) = self.resources.get_mut(handle) else {
            log::debug!("Release of stale handle {handle} ignored");
            return false;
        };

        resource.reference_count = resource.reference_count.saturating_sub(1);
        if resource.reference_count == 0 {
            self.destroy(handle);
        }
        true
    }

    /// Pump the asset pipeline: route every ready completion and change
    /// notification. Returns the number of events processed.
    pub fn update(&mut self) -> usize {
        let mut events = Vec::new();
        self.pipeline.poll_events(&mut events);
        self.process_events(events)
    }

    /// Drop a loaded resource's contents while keeping its record and handle.
    ///
    /// Moves `Loaded -> Unloading -> Unloaded` and releases the resource's
    /// assets and dependencies. Only types whose handler supports it (scenes)
    /// can be unloaded.
    ///
    /// # Errors
    ///
    /// Fails for stale handles, unsupported types, or resources not `Loaded`.
    pub fn unload(&mut self, handle: Handle) -> Result<(), ResourceError> {
        let Some(resource) = self.resources.get_mut(handle) else {
            return Err(ResourceError::InvalidHandle);
        };
        let resource_type = resource.resource_type;
        let Some(handler) = self.handlers.get_mut(&resource_type) else {
            return Err(ResourceError::NoHandler(resource_type));
        };
        if !handler.supports_unload() {
            return Err(ResourceError::InvalidRequest(format!(
                "{resource_type} resources cannot be unloaded"
            )));
        }

        resource.transition(ResourceState::Unloading)?;
        handler.unload(resource);
        let watches = mem::take(&mut resource.watches);
        let sources = mem::take(&mut resource.sources);
        let dependencies = mem::take(&mut resource.dependencies);
        resource.transition(ResourceState::Unloaded)?;
        log::info!("Unloaded {resource_type} '{}'", resource.name);

        self.drop_asset_references(&watches, &sources);
        for dependency in dependencies {
            self.release(dependency);
        }
        Ok(())
    }

    /// Load an unloaded resource again from its original request.
    ///
    /// # Errors
    ///
    /// Fails for stale handles, resources that are not `Unloaded`, or if the
    /// handler rejects the request.
    pub fn reload(&mut self, handle: Handle) -> Result<(), ResourceError> {
        let Some(resource) = self.resources.get(handle) else {
            return Err(ResourceError::InvalidHandle);
        };
        if resource.state != ResourceState::Unloaded {
            return Err(ResourceError::IllegalTransition {
                from: resource.state,
                to: ResourceState::Loading,
            });
        }

        let info = RequestInfo::from(resource.template.clone().unwrap_or_default());
        let dependencies = self.dispatch_request(handle, &info).inspect_err(|e| {
            log::error!("Reload of {handle} failed: {e}");
        })?;

        self.drain_synchronous();
        self.attach_dependencies(handle, dependencies);
        self.fire_callbacks(handle);
        Ok(())
    }

    /// The resource behind a live handle
    #[must_use]
    pub fn get(&self, handle: Handle) -> Option<&Resource> {
        self.resources.get(handle)
    }

    /// The resource behind a live handle, mutably
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut Resource> {
        self.resources.get_mut(handle)
    }

    /// Type-specific payload of a live resource
    #[must_use]
    pub fn payload<T: 'static>(&self, handle: Handle) -> Option<&T> {
        self.resources.get(handle)?.payload()
    }

    #[must_use]
    pub fn validate(&self, handle: Handle) -> bool {
        self.resources.validate(handle)
    }

    /// Handle of the live resource with this type and name
    #[must_use]
    pub fn find(&self, name: &str, resource_type: ResourceType) -> Option<Handle> {
        self.names.get(&resource_type)?.get(name).copied()
    }

    #[must_use]
    pub fn state(&self, handle: Handle) -> Option<ResourceState> {
        self.resources.get(handle).map(Resource::state)
    }

    #[must_use]
    pub fn generation(&self, handle: Handle) -> Option<u32> {
        self.resources.get(handle).map(Resource::generation)
    }

    /// Iterate over every live resource
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &Resource)> {
        self.resources.iter()
    }

    /// Number of live resources
    #[must_use]
    pub const fn resource_count(&self) -> usize {
        self.resources.occupied()
    }

    /// Number of fan-ins still waiting for assets
    #[must_use]
    pub const fn in_flight_count(&self) -> usize {
        self.listeners.occupied()
    }

    #[must_use]
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    #[must_use]
    pub const fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut P {
        &mut self.pipeline
    }

    fn add_reference(&mut self, handle: Handle, callback: Option<ResourceCallback>) {
        let Some(resource) = self.resources.get_mut(handle) else {
            return;
        };
        resource.reference_count += 1;
        log::trace!(
            "'{}' now has {} references",
            resource.name,
            resource.reference_count
        );

        let Some(callback) = callback else {
            return;
        };
        match resource.state {
            ResourceState::Loaded => callback(handle, resource),
            ResourceState::Loading => resource.callbacks.push(callback),
            state => log::warn!(
                "'{}' is {state:?}; its load callback will not fire",
                resource.name
            ),
        }
    }

    fn dispatch_request(
        &mut self,
        handle: Handle,
        info: &RequestInfo,
    ) -> Result<Vec<DependencyRequest>, ResourceError> {
        let Some(resource) = self.resources.get_mut(handle) else {
            return Err(ResourceError::InvalidHandle);
        };
        let Some(handler) = self.handlers.get_mut(&resource.resource_type) else {
            return Err(ResourceError::NoHandler(resource.resource_type));
        };

        let mut ctx =
            HandlerContext::new(&mut self.pipeline, &mut self.listeners, &self.config, handle);
        handler.request(&mut ctx, resource, info)?;
        Ok(ctx.into_dependencies())
    }

    /// Remove a record whose request was rejected
    fn discard(&mut self, handle: Handle) {
        if let Some(resource) = self.resources.recycle(handle) {
            self.listeners.recycle(resource.listener);
        }
    }

    fn destroy(&mut self, handle: Handle) {
        let Some(resource) = self.resources.get_mut(handle) else {
            return;
        };
        if let Some(handler) = self.handlers.get_mut(&resource.resource_type) {
            handler.release(resource);
        }
        let Some(resource) = self.resources.recycle(handle) else {
            return;
        };

        if self.listeners.recycle(resource.listener).is_some() {
            log::debug!("'{}' released while loading", resource.name);
        }
        self.drop_asset_references(&resource.watches, &resource.sources);
        self.unindex(resource.resource_type, &resource.name, handle);
        log::info!("Released {} '{}'", resource.resource_type, resource.name);

        for dependency in resource.dependencies {
            self.release(dependency);
        }
    }

    fn drop_asset_references(&mut self, watches: &[WatchId], sources: &[AssetDescriptor]) {
        for watch_id in watches {
            self.watches.remove(watch_id);
            self.pipeline.unwatch(*watch_id);
        }
        for source in sources {
            self.pipeline
                .release_asset(&source.asset_name, &source.package_name);
        }
    }

    fn drain_synchronous(&mut self) {
        let mut events = Vec::new();
        self.pipeline.drain_synchronous(&mut events);
        self.process_events(events);
    }

    fn process_events(&mut self, events: Vec<AssetEvent>) -> usize {
        let count = events.len();
        for event in events {
            match event {
                AssetEvent::Completed(completion) => self.route_completion(completion),
                AssetEvent::Changed {
                    watch_id,
                    descriptor,
                    data,
                } => self.route_change(watch_id, &descriptor, &data),
            }
        }
        count
    }

    fn route_completion(&mut self, completion: AssetCompletion) {
        let AssetCompletion {
            context,
            descriptor,
            result,
            watch_id,
        } = completion;

        let Some(listener) = self.listeners.get_mut(context.listener) else {
            log::debug!("Dropping completion of {descriptor}: its request is gone");
            if result.is_ok() {
                self.pipeline
                    .release_asset(&descriptor.asset_name, &descriptor.package_name);
            }
            if let Some(watch_id) = watch_id {
                self.pipeline.unwatch(watch_id);
            }
            return;
        };

        log::trace!("Asset {descriptor} arrived at position {}", context.position);
        listener.store(context.position, result, watch_id);
        if !listener.is_complete() {
            return;
        }
        if let Some(listener) = self.listeners.recycle(context.listener) {
            self.finish_fan_in(listener);
        }
    }

    fn finish_fan_in(&mut self, listener: Listener) {
        let handle = listener.resource;
        let watches: SmallVec<[WatchId; 2]> = listener.watches().iter().copied().collect();
        let fan_in = listener.into_fan_in();

        let Some(resource) = self.resources.get_mut(handle) else {
            let sources: Vec<AssetDescriptor> = fan_in.loaded_descriptors().cloned().collect();
            self.drop_asset_references(&watches, &sources);
            return;
        };

        resource.listener = Handle::INVALID;
        resource.sources.extend(fan_in.loaded_descriptors().cloned());
        for watch_id in watches {
            resource.watches.push(watch_id);
            self.watches.insert(watch_id, handle);
        }

        let Some(handler) = self.handlers.get_mut(&resource.resource_type) else {
            return;
        };
        let mut ctx =
            HandlerContext::new(&mut self.pipeline, &mut self.listeners, &self.config, handle);
        let result = handler.finalize(&mut ctx, resource, fan_in);
        let dependencies = ctx.into_dependencies();

        match result {
            Ok(()) => {
                log::info!(
                    "Loaded {} '{}' (generation {})",
                    resource.resource_type,
                    resource.name,
                    resource.generation
                );
                self.attach_dependencies(handle, dependencies);
                self.fire_callbacks(handle);
            }
            Err(error) => {
                log::error!("{} '{}' failed to load: {error}", resource.resource_type, resource.name);
                resource.callbacks.clear();
                let (resource_type, name) = (resource.resource_type, Arc::clone(&resource.name));
                // Later requests for the name start over instead of joining a dead record
                self.unindex(resource_type, &name, handle);
            }
        }
    }

    fn unindex(&mut self, resource_type: ResourceType, name: &str, handle: Handle) {
        if let Some(names) = self.names.get_mut(&resource_type)
            && names.get(name) == Some(&handle)
        {
            names.remove(name);
        }
    }

    /// Whether `target` is reachable from `from` through dependency links
    fn depends_on(&self, from: Handle, target: Handle) -> bool {
        let mut visited = FxHashSet::default();
        let mut stack = vec![from];
        while let Some(handle) = stack.pop() {
            if handle == target {
                return true;
            }
            if !visited.insert(handle) {
                continue;
            }
            if let Some(resource) = self.resources.get(handle) {
                stack.extend(resource.dependencies.iter().copied());
            }
        }
        false
    }

    fn route_change(&mut self, watch_id: WatchId, descriptor: &AssetDescriptor, data: &AssetData) {
        let Some(&handle) = self.watches.get(&watch_id) else {
            self.pipeline.unwatch(watch_id);
            return;
        };
        let Some(resource) = self.resources.get_mut(handle) else {
            self.watches.remove(&watch_id);
            self.pipeline.unwatch(watch_id);
            return;
        };
        let Some(handler) = self.handlers.get_mut(&resource.resource_type) else {
            return;
        };

        if handler.handle_hot_reload(resource, data, watch_id) {
            log::info!(
                "Hot reloaded '{}' from {descriptor} (generation {})",
                resource.name,
                resource.generation
            );
        } else {
            log::debug!("Change to {descriptor} not applied to '{}'", resource.name);
        }
    }

    fn attach_dependencies(&mut self, parent: Handle, dependencies: Vec<DependencyRequest>) {
        if dependencies.is_empty() {
            return;
        }
        self.attaching.push(parent);
        for DependencyRequest {
            name,
            resource_type,
            info,
        } in dependencies
        {
            let child = match self.request(&name, resource_type, info) {
                Ok(child) => child,
                Err(error) => {
                    log::error!("Dependency {resource_type} '{name}' of {parent} failed: {error}");
                    continue;
                }
            };
            // A parent that ends up holding itself would never be released
            if self.attaching.contains(&child) || self.depends_on(child, parent) {
                log::warn!("Dependency {resource_type} '{name}' of {parent} is cyclic; not attached");
                self.release(child);
                continue;
            }
            match self.resources.get_mut(parent) {
                Some(resource) => resource.dependencies.push(child),
                None => {
                    self.release(child);
                }
            }
        }
        self.attaching.pop();
    }

    fn fire_callbacks(&mut self, handle: Handle) {
        let Some(resource) = self.resources.get_mut(handle) else {
            return;
        };
        if !resource.is_loaded() || resource.callbacks.is_empty() {
            return;
        }
        for callback in mem::take(&mut resource.callbacks) {
            callback(handle, resource);
        }
    }
}
