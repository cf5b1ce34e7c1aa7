//! In-memory asset pipeline
//!
//! Serves assets from a name-keyed store. Asynchronous requests wait in an
//! in-flight queue until they are completed, either automatically on
//! `poll_events` or one at a time through [`MemoryAssetPipeline::complete`],
//! which lets callers deliver completions in any order.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use super::data::AssetData;
use super::descriptor::AssetDescriptor;
use super::pipeline::{
    AssetCompletion, AssetError, AssetEvent, AssetPipeline, AssetRequest, WatchId,
};

/// Store key: (package, asset name)
type AssetKey = (String, String);

/// Pipeline backed by assets inserted at runtime
#[derive(Debug)]
pub struct MemoryAssetPipeline {
    /// Package used for descriptors without one
    default_package: String,
    /// Stored assets
    assets: FxHashMap<AssetKey, AssetData>,
    /// Outstanding asynchronous requests, oldest first
    in_flight: VecDeque<AssetRequest>,
    /// Completions of synchronous requests
    synchronous_ready: Vec<AssetEvent>,
    /// Completions and change notifications ready for delivery
    ready: Vec<AssetEvent>,
    /// Complete every in-flight request on `poll_events`
    auto_complete: bool,
    /// Active watches
    watches: FxHashMap<WatchId, AssetKey>,
    next_watch_id: u32,
    /// Outstanding references per loaded asset
    references: FxHashMap<AssetKey, u32>,
    /// Total requests ever submitted
    requests_submitted: usize,
}

impl MemoryAssetPipeline {
    /// Create an empty pipeline that completes requests on every poll
    #[must_use]
    pub fn new(default_package: impl Into<String>) -> Self {
        Self {
            default_package: default_package.into(),
            assets: FxHashMap::default(),
            in_flight: VecDeque::new(),
            synchronous_ready: Vec::new(),
            ready: Vec::new(),
            auto_complete: true,
            watches: FxHashMap::default(),
            next_watch_id: 0,
            references: FxHashMap::default(),
            requests_submitted: 0,
        }
    }

    /// Choose whether `poll_events` completes in-flight requests by itself
    pub fn set_auto_complete(&mut self, auto_complete: bool) {
        self.auto_complete = auto_complete;
    }

    /// Store an asset in the default package
    pub fn insert(&mut self, asset_name: impl Into<String>, data: AssetData) {
        let package = self.default_package.clone();
        self.insert_in(package, asset_name, data);
    }

    /// Store an asset in a named package
    pub fn insert_in(
        &mut self,
        package_name: impl Into<String>,
        asset_name: impl Into<String>,
        data: AssetData,
    ) {
        self.assets
            .insert((package_name.into(), asset_name.into()), data);
    }

    /// Replace an asset and notify every watch on it.
    ///
    /// Returns the number of change notifications queued.
    pub fn update(&mut self, asset_name: &str, data: AssetData) -> usize {
        let key = (self.default_package.clone(), asset_name.to_string());
        let mut watch_ids: Vec<WatchId> = self
            .watches
            .iter()
            .filter(|(_, watched)| **watched == key)
            .map(|(id, _)| *id)
            .collect();
        watch_ids.sort_unstable();

        for watch_id in &watch_ids {
            let descriptor = AssetDescriptor::new(asset_name, data.kind())
                .in_package(key.0.clone())
                .watched();
            self.ready.push(AssetEvent::Changed {
                watch_id: *watch_id,
                descriptor,
                data: data.clone(),
            });
        }

        self.assets.insert(key, data);
        watch_ids.len()
    }

    /// Complete the oldest in-flight request for `asset_name`.
    ///
    /// Returns `false` if no such request is waiting.
    pub fn complete(&mut self, asset_name: &str) -> bool {
        let Some(position) = self
            .in_flight
            .iter()
            .position(|request| request.descriptor.asset_name == asset_name)
        else {
            return false;
        };

        if let Some(request) = self.in_flight.remove(position) {
            let event = self.resolve(request);
            self.ready.push(event);
        }
        true
    }

    /// Complete every in-flight request in submission order
    pub fn complete_all(&mut self) {
        while let Some(request) = self.in_flight.pop_front() {
            let event = self.resolve(request);
            self.ready.push(event);
        }
    }

    /// Number of asynchronous requests still waiting
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Total requests ever submitted
    #[must_use]
    pub const fn requests_submitted(&self) -> usize {
        self.requests_submitted
    }

    /// Outstanding references to an asset in the default package
    #[must_use]
    pub fn reference_count(&self, asset_name: &str) -> u32 {
        let key = (self.default_package.clone(), asset_name.to_string());
        self.references.get(&key).copied().unwrap_or(0)
    }

    /// Number of active watches
    #[must_use]
    pub fn watch_count(&self) -> usize {
        self.watches.len()
    }

    fn resolve(&mut self, request: AssetRequest) -> AssetEvent {
        let key = (
            request.descriptor.package_or(&self.default_package).to_string(),
            request.descriptor.asset_name.clone(),
        );

        let result = match self.assets.get(&key) {
            None => Err(AssetError::NotFound(request.descriptor.to_string())),
            Some(data) if data.kind() != request.descriptor.kind => {
                Err(AssetError::KindMismatch(format!(
                    "{} is stored as {:?}",
                    request.descriptor,
                    data.kind()
                )))
            }
            Some(data) => Ok(data.clone()),
        };

        let mut watch_id = None;
        if result.is_ok() {
            *self.references.entry(key.clone()).or_insert(0) += 1;
            if request.descriptor.watch {
                let id = WatchId(self.next_watch_id);
                self.next_watch_id += 1;
                self.watches.insert(id, key);
                watch_id = Some(id);
            }
        }

        AssetEvent::Completed(AssetCompletion {
            context: request.context,
            descriptor: request.descriptor,
            result,
            watch_id,
        })
    }
}

impl Default for MemoryAssetPipeline {
    fn default() -> Self {
        Self::new("runtime")
    }
}

impl AssetPipeline for MemoryAssetPipeline {
    fn request_asset(&mut self, request: AssetRequest) {
        self.requests_submitted += 1;
        log::trace!("Asset requested: {}", request.descriptor);

        if request.synchronous {
            let event = self.resolve(request);
            self.synchronous_ready.push(event);
        } else {
            self.in_flight.push_back(request);
        }
    }

    fn poll_events(&mut self, events: &mut Vec<AssetEvent>) {
        if self.auto_complete {
            self.complete_all();
        }
        events.append(&mut self.synchronous_ready);
        events.append(&mut self.ready);
    }

    fn drain_synchronous(&mut self, events: &mut Vec<AssetEvent>) {
        events.append(&mut self.synchronous_ready);
    }

    fn release_asset(&mut self, asset_name: &str, package_name: &str) {
        let package = if package_name.is_empty() {
            self.default_package.as_str()
        } else {
            package_name
        };
        let key = (package.to_string(), asset_name.to_string());

        if let Some(count) = self.references.get_mut(&key) {
            *count -= 1;
            if *count == 0 {
                self.references.remove(&key);
            }
        }
    }

    fn unwatch(&mut self, watch_id: WatchId) {
        self.watches.remove(&watch_id);
    }

    fn default_package(&self) -> &str {
        &self.default_package
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetContext, AssetKind, ImportParams};
    use crate::storage::Handle;

    fn request(name: &str, kind: AssetKind, synchronous: bool, position: usize) -> AssetRequest {
        AssetRequest {
            descriptor: AssetDescriptor::new(name, kind),
            synchronous,
            params: ImportParams::default(),
            context: AssetContext {
                listener: Handle::INVALID,
                position,
            },
        }
    }

    fn completion(event: &AssetEvent) -> &AssetCompletion {
        match event {
            AssetEvent::Completed(completion) => completion,
            AssetEvent::Changed { .. } => panic!("expected a completion"),
        }
    }

    #[test]
    fn test_synchronous_request_is_ready_immediately() {
        let mut pipeline = MemoryAssetPipeline::default();
        pipeline.insert("readme", AssetData::Text("hi".into()));

        pipeline.request_asset(request("readme", AssetKind::Text, true, 0));

        let mut events = Vec::new();
        pipeline.drain_synchronous(&mut events);
        assert_eq!(events.len(), 1);
        assert_eq!(
            completion(&events[0]).result,
            Ok(AssetData::Text("hi".into()))
        );
    }

    #[test]
    fn test_async_request_waits_for_poll() {
        let mut pipeline = MemoryAssetPipeline::default();
        pipeline.insert("readme", AssetData::Text("hi".into()));

        pipeline.request_asset(request("readme", AssetKind::Text, false, 0));

        let mut events = Vec::new();
        pipeline.drain_synchronous(&mut events);
        assert!(events.is_empty());
        assert_eq!(pipeline.in_flight_count(), 1);

        pipeline.poll_events(&mut events);
        assert_eq!(events.len(), 1);
        assert_eq!(pipeline.in_flight_count(), 0);
    }

    #[test]
    fn test_manual_completion_order() {
        let mut pipeline = MemoryAssetPipeline::default();
        pipeline.set_auto_complete(false);
        pipeline.insert("a", AssetData::Binary(vec![1]));
        pipeline.insert("b", AssetData::Binary(vec![2]));

        pipeline.request_asset(request("a", AssetKind::Binary, false, 0));
        pipeline.request_asset(request("b", AssetKind::Binary, false, 1));

        let mut events = Vec::new();
        pipeline.poll_events(&mut events);
        assert!(events.is_empty(), "Nothing completes without auto-complete");

        assert!(pipeline.complete("b"));
        assert!(pipeline.complete("a"));
        assert!(!pipeline.complete("a"));

        pipeline.poll_events(&mut events);
        let positions: Vec<usize> = events
            .iter()
            .map(|event| completion(event).context.position)
            .collect();
        assert_eq!(positions, vec![1, 0]);
    }

    #[test]
    fn test_missing_and_mismatched_assets_fail() {
        let mut pipeline = MemoryAssetPipeline::default();
        pipeline.insert("image", AssetData::Text("not an image".into()));

        pipeline.request_asset(request("missing", AssetKind::Text, true, 0));
        pipeline.request_asset(request("image", AssetKind::Image, true, 1));

        let mut events = Vec::new();
        pipeline.drain_synchronous(&mut events);
        assert!(matches!(
            completion(&events[0]).result,
            Err(AssetError::NotFound(_))
        ));
        assert!(matches!(
            completion(&events[1]).result,
            Err(AssetError::KindMismatch(_))
        ));
    }

    #[test]
    fn test_watch_and_update() {
        let mut pipeline = MemoryAssetPipeline::default();
        pipeline.insert("shader", AssetData::Text("v1".into()));

        let mut watched = request("shader", AssetKind::Text, true, 0);
        watched.descriptor = watched.descriptor.watched();
        pipeline.request_asset(watched);

        let mut events = Vec::new();
        pipeline.drain_synchronous(&mut events);
        let watch_id = completion(&events[0]).watch_id.unwrap();

        assert_eq!(pipeline.update("shader", AssetData::Text("v2".into())), 1);
        events.clear();
        pipeline.poll_events(&mut events);
        assert!(matches!(
            &events[0],
            AssetEvent::Changed { watch_id: id, data: AssetData::Text(text), .. }
                if *id == watch_id && text == "v2"
        ));

        pipeline.unwatch(watch_id);
        assert_eq!(pipeline.update("shader", AssetData::Text("v3".into())), 0);
    }

    #[test]
    fn test_release_decrements_references() {
        let mut pipeline = MemoryAssetPipeline::default();
        pipeline.insert("blob", AssetData::Binary(vec![0; 4]));

        pipeline.request_asset(request("blob", AssetKind::Binary, true, 0));
        pipeline.request_asset(request("blob", AssetKind::Binary, true, 0));
        assert_eq!(pipeline.reference_count("blob"), 2);

        pipeline.release_asset("blob", "");
        assert_eq!(pipeline.reference_count("blob"), 1);
        pipeline.release_asset("blob", "runtime");
        assert_eq!(pipeline.reference_count("blob"), 0);
    }
}
