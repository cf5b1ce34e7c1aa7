//! Resource lifecycle
//!
//! Resources are the typed, engine-facing objects built from one or more
//! assets. This module provides:
//! - The [`ResourceRegistry`] that owns every resource record
//! - The [`ResourceHandler`] contract implemented once per resource type
//! - Fan-in of asynchronous asset completions through [`Listener`]s
//! - Built-in handlers in [`handlers`]

mod error;
mod handler;
pub mod handlers;
mod listener;
mod registry;
mod request;
mod resource;

pub use error::ResourceError;
pub use handler::{DependencyRequest, HandlerContext, ResourceHandler};
pub use listener::{FanIn, Listener};
pub use registry::ResourceRegistry;
pub use request::{RequestInfo, RequestTemplate, ResourceCallback, ResourceParams, TextureDimension};
pub use resource::{FIRST_CUSTOM_TYPE, INVALID_GENERATION, Resource, ResourceState, ResourceType, Tags};
