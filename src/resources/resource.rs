//! Resource base record
//!
//! Every resource type shares this record. Type-specific data lives in the
//! payload, which callers reach through a checked downcast.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::assets::{AssetDescriptor, WatchId};
use crate::storage::Handle;

use super::error::ResourceError;
use super::request::{RequestTemplate, ResourceCallback};

/// Generation of a resource that has never been loaded.
pub const INVALID_GENERATION: u32 = 0;

/// First id available to user-defined resource types.
pub const FIRST_CUSTOM_TYPE: u32 = 128;

/// Free-form labels attached to a resource at request time.
pub type Tags = SmallVec<[String; 2]>;

/// Kind of resource, selecting the handler that loads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Text,
    Binary,
    Texture,
    Material,
    StaticMesh,
    Shader,
    Audio,
    Scene,
    BitmapFont,
    SystemFont,
    HeightmapTerrain,
    /// User-defined type, id `>= 128`
    Custom(u32),
}

impl ResourceType {
    /// Every built-in type
    pub const BUILTIN: [Self; 11] = [
        Self::Text,
        Self::Binary,
        Self::Texture,
        Self::Material,
        Self::StaticMesh,
        Self::Shader,
        Self::Audio,
        Self::Scene,
        Self::BitmapFont,
        Self::SystemFont,
        Self::HeightmapTerrain,
    ];

    /// Create a user-defined type.
    ///
    /// # Errors
    ///
    /// Ids below 128 are reserved for built-in types.
    pub fn custom(id: u32) -> Result<Self, ResourceError> {
        if id < FIRST_CUSTOM_TYPE {
            return Err(ResourceError::InvalidRequest(format!(
                "custom resource type id {id} is reserved (must be >= {FIRST_CUSTOM_TYPE})"
            )));
        }
        Ok(Self::Custom(id))
    }

    /// Numeric id: built-ins below 128, custom types at or above
    #[must_use]
    pub const fn id(self) -> u32 {
        match self {
            Self::Text => 0,
            Self::Binary => 1,
            Self::Texture => 2,
            Self::Material => 3,
            Self::StaticMesh => 4,
            Self::Shader => 5,
            Self::Audio => 6,
            Self::Scene => 7,
            Self::BitmapFont => 8,
            Self::SystemFont => 9,
            Self::HeightmapTerrain => 10,
            Self::Custom(id) => id,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(id) => write!(f, "Custom({id})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Lifecycle state of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceState {
    #[default]
    Uninitialized,
    Initialized,
    Loading,
    /// Safe to consume
    Loaded,
    Unloading,
    Unloaded,
}

impl ResourceState {
    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// ```text
    /// Uninitialized -> Initialized | Loading
    /// Initialized   -> Loading
    /// Loading       -> Loaded
    /// Loaded        -> Loading (reload) | Unloading
    /// Unloading     -> Unloaded
    /// Unloaded      -> Loading
    /// ```
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Uninitialized, Self::Initialized | Self::Loading)
                | (Self::Initialized, Self::Loading)
                | (Self::Loading, Self::Loaded)
                | (Self::Loaded, Self::Loading | Self::Unloading)
                | (Self::Unloading, Self::Unloaded)
                | (Self::Unloaded, Self::Loading)
        )
    }
}

/// A resource record owned by the registry.
///
/// Handles into the registry are weak; the record itself is only reachable
/// through [`ResourceRegistry::get`](super::ResourceRegistry::get) and friends.
pub struct Resource {
    pub(crate) name: Arc<str>,
    pub(crate) resource_type: ResourceType,
    pub(crate) state: ResourceState,
    pub(crate) generation: u32,
    pub(crate) tags: Tags,
    pub(crate) reference_count: u32,
    /// Resources requested on this one's behalf, released with it
    pub(crate) dependencies: SmallVec<[Handle; 4]>,
    /// Watches registered for this resource's assets
    pub(crate) watches: SmallVec<[WatchId; 2]>,
    /// In-flight fan-in, `Handle::INVALID` when none
    pub(crate) listener: Handle,
    /// Assets successfully loaded for the current payload
    pub(crate) sources: Vec<AssetDescriptor>,
    /// Copy of the request, used to reload
    pub(crate) template: Option<RequestTemplate>,
    /// Callers waiting for the resource to load
    pub(crate) callbacks: Vec<ResourceCallback>,
    payload: Option<Box<dyn Any>>,
}

impl Resource {
    pub(crate) fn new(name: Arc<str>, resource_type: ResourceType) -> Self {
        Self {
            name,
            resource_type,
            state: ResourceState::Uninitialized,
            generation: INVALID_GENERATION,
            tags: Tags::new(),
            reference_count: 1,
            dependencies: SmallVec::new(),
            watches: SmallVec::new(),
            listener: Handle::INVALID,
            sources: Vec::new(),
            template: None,
            callbacks: Vec::new(),
            payload: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    #[must_use]
    pub const fn state(&self) -> ResourceState {
        self.state
    }

    /// Bumped every time a new payload is committed
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Number of outstanding `request` calls not yet matched by `release`
    #[must_use]
    pub const fn reference_count(&self) -> u32 {
        self.reference_count
    }

    /// Handles of resources loaded on this one's behalf
    #[must_use]
    pub fn dependencies(&self) -> &[Handle] {
        &self.dependencies
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.state == ResourceState::Loaded
    }

    /// Whether a fan-in is still waiting for assets
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        !self.listener.is_invalid()
    }

    /// Move to `next` if the lifecycle allows it.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::IllegalTransition`] and leaves the state
    /// unchanged otherwise.
    pub fn transition(&mut self, next: ResourceState) -> Result<(), ResourceError> {
        if !self.state.can_transition_to(next) {
            log::error!(
                "Resource '{}' cannot move from {:?} to {:?}",
                self.name,
                self.state,
                next
            );
            return Err(ResourceError::IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        log::trace!("Resource '{}': {:?} -> {:?}", self.name, self.state, next);
        self.state = next;
        Ok(())
    }

    /// Commit a freshly produced payload: move to `Loaded` and bump the
    /// generation.
    ///
    /// # Errors
    ///
    /// Fails if the resource is not `Loading`.
    pub fn mark_loaded(&mut self) -> Result<(), ResourceError> {
        self.transition(ResourceState::Loaded)?;
        self.generation += 1;
        Ok(())
    }

    /// Type-specific data, if it is a `T`
    #[must_use]
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.as_deref()?.downcast_ref()
    }

    /// Type-specific data, mutably, if it is a `T`
    pub fn payload_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.payload.as_deref_mut()?.downcast_mut()
    }

    pub fn set_payload<T: Any>(&mut self, payload: T) {
        self.payload = Some(Box::new(payload));
    }

    /// Drop the payload, returning whether there was one
    pub fn clear_payload(&mut self) -> bool {
        self.payload.take().is_some()
    }

    #[must_use]
    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name)
            .field("resource_type", &self.resource_type)
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("reference_count", &self.reference_count)
            .field("dependencies", &self.dependencies)
            .field("callbacks", &self.callbacks.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource() -> Resource {
        Resource::new(Arc::from("brick"), ResourceType::Texture)
    }

    #[test]
    fn test_new_resource_defaults() {
        let r = resource();
        assert_eq!(r.state(), ResourceState::Uninitialized);
        assert_eq!(r.generation(), INVALID_GENERATION);
        assert_eq!(r.reference_count(), 1);
        assert!(!r.is_in_flight());
    }

    #[test]
    fn test_legal_lifecycle() {
        let mut r = resource();
        r.transition(ResourceState::Loading).unwrap();
        r.mark_loaded().unwrap();
        assert_eq!(r.generation(), 1);

        // Hot reload
        r.transition(ResourceState::Loading).unwrap();
        r.mark_loaded().unwrap();
        assert_eq!(r.generation(), 2);

        r.transition(ResourceState::Unloading).unwrap();
        r.transition(ResourceState::Unloaded).unwrap();
        r.transition(ResourceState::Loading).unwrap();
    }

    #[test]
    fn test_loaded_never_returns_to_uninitialized() {
        let mut r = resource();
        r.transition(ResourceState::Loading).unwrap();
        r.mark_loaded().unwrap();

        let result = r.transition(ResourceState::Uninitialized);
        assert_eq!(
            result,
            Err(ResourceError::IllegalTransition {
                from: ResourceState::Loaded,
                to: ResourceState::Uninitialized,
            })
        );
        assert_eq!(r.state(), ResourceState::Loaded);
    }

    #[test]
    fn test_mark_loaded_requires_loading() {
        let mut r = resource();
        assert!(r.mark_loaded().is_err());
        assert_eq!(r.generation(), INVALID_GENERATION);
    }

    #[test]
    fn test_payload_downcast() {
        let mut r = resource();
        assert!(r.payload::<String>().is_none());

        r.set_payload(String::from("pixels"));
        assert_eq!(r.payload::<String>().map(String::as_str), Some("pixels"));
        assert!(r.payload::<Vec<u8>>().is_none());

        r.payload_mut::<String>().unwrap().push('!');
        assert_eq!(r.payload::<String>().unwrap(), "pixels!");
        assert!(r.clear_payload());
        assert!(!r.has_payload());
    }

    #[test]
    fn test_custom_type_ids() {
        assert!(ResourceType::custom(12).is_err());
        assert_eq!(ResourceType::custom(200).unwrap().id(), 200);
        assert!(ResourceType::BUILTIN.iter().all(|ty| ty.id() < FIRST_CUSTOM_TYPE));
        assert_eq!(ResourceType::Texture.to_string(), "Texture");
    }
}
