//! In-flight fan-in records
//!
//! A [`Listener`] collects the results of every asset one resource request
//! issued. It lives in the registry's listener table from the moment the
//! requests go out until the last result arrives, then turns into a
//! [`FanIn`] handed to the handler's finalize step.

use smallvec::SmallVec;

use crate::assets::{AssetData, AssetDescriptor, AssetError, WatchId};
use crate::storage::Handle;

use super::request::ResourceParams;

/// Partial results of one multi-asset request
#[derive(Debug)]
pub struct Listener {
    /// Resource being built
    pub(crate) resource: Handle,
    descriptors: SmallVec<[AssetDescriptor; 6]>,
    params: ResourceParams,
    /// One entry per descriptor, filled as completions arrive
    results: Vec<Option<Result<AssetData, AssetError>>>,
    loaded_count: usize,
    watches: SmallVec<[WatchId; 2]>,
}

impl Listener {
    pub(crate) fn new(
        resource: Handle,
        descriptors: &[AssetDescriptor],
        params: ResourceParams,
    ) -> Self {
        Self {
            resource,
            descriptors: descriptors.iter().cloned().collect(),
            params,
            results: descriptors.iter().map(|_| None).collect(),
            loaded_count: 0,
            watches: SmallVec::new(),
        }
    }

    /// Record the result for `position`.
    ///
    /// A second result for the same position, or one out of range, is ignored
    /// so `loaded_count` never exceeds the asset count.
    pub(crate) fn store(
        &mut self,
        position: usize,
        result: Result<AssetData, AssetError>,
        watch_id: Option<WatchId>,
    ) {
        let Some(slot) = self.results.get_mut(position) else {
            log::warn!("Completion for unknown asset position {position} ignored");
            return;
        };
        if slot.is_some() {
            log::warn!("Duplicate completion for asset position {position} ignored");
            return;
        }

        if let Err(e) = &result {
            log::error!("Asset {} failed to load: {e}", self.descriptors[position]);
        }
        *slot = Some(result);
        self.loaded_count += 1;
        self.watches.extend(watch_id);
    }

    /// Completions received so far, failures included
    #[must_use]
    pub const fn loaded_count(&self) -> usize {
        self.loaded_count
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.loaded_count == self.results.len()
    }

    /// Watches created for this request's assets
    pub(crate) fn watches(&self) -> &[WatchId] {
        &self.watches
    }

    pub(crate) fn into_fan_in(self) -> FanIn {
        let results = self
            .results
            .into_iter()
            .map(|result| {
                result.unwrap_or_else(|| Err(AssetError::NotFound("no completion received".into())))
            })
            .collect();

        FanIn {
            descriptors: self.descriptors,
            params: self.params,
            results,
        }
    }
}

/// All results of a finished fan-in, in request order
#[derive(Debug)]
pub struct FanIn {
    pub descriptors: SmallVec<[AssetDescriptor; 6]>,
    pub params: ResourceParams,
    pub results: Vec<Result<AssetData, AssetError>>,
}

impl FanIn {
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.results.iter().filter(|result| result.is_err()).count()
    }

    /// Descriptors of the assets that loaded
    pub fn loaded_descriptors(&self) -> impl Iterator<Item = &AssetDescriptor> {
        self.descriptors
            .iter()
            .zip(&self.results)
            .filter(|(_, result)| result.is_ok())
            .map(|(descriptor, _)| descriptor)
    }

    /// Successful assets with their request positions, in request order
    #[must_use]
    pub fn into_successes(self) -> Vec<(usize, AssetData)> {
        self.results
            .into_iter()
            .enumerate()
            .filter_map(|(position, result)| result.ok().map(|data| (position, data)))
            .collect()
    }

    /// The first successful asset, if any
    #[must_use]
    pub fn into_first(self) -> Option<AssetData> {
        self.results.into_iter().find_map(Result::ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetKind;

    fn listener(count: usize) -> Listener {
        let descriptors: Vec<AssetDescriptor> = (0..count)
            .map(|i| AssetDescriptor::new(format!("asset{i}"), AssetKind::Binary))
            .collect();
        Listener::new(Handle::INVALID, &descriptors, ResourceParams::None)
    }

    #[test]
    fn test_completes_after_every_position() {
        let mut l = listener(3);
        l.store(2, Ok(AssetData::Binary(vec![2])), None);
        l.store(0, Err(AssetError::NotFound("asset0".into())), None);
        assert!(!l.is_complete());

        l.store(1, Ok(AssetData::Binary(vec![1])), Some(WatchId(4)));
        assert!(l.is_complete());
        assert_eq!(l.watches(), &[WatchId(4)]);

        let fan_in = l.into_fan_in();
        assert_eq!(fan_in.failure_count(), 1);
        assert_eq!(fan_in.loaded_descriptors().count(), 2);

        let successes = fan_in.into_successes();
        assert_eq!(
            successes,
            vec![
                (1, AssetData::Binary(vec![1])),
                (2, AssetData::Binary(vec![2]))
            ]
        );
    }

    #[test]
    fn test_duplicate_and_out_of_range_ignored() {
        let mut l = listener(2);
        l.store(0, Ok(AssetData::Binary(vec![])), None);
        l.store(0, Ok(AssetData::Binary(vec![])), None);
        l.store(7, Ok(AssetData::Binary(vec![])), None);

        assert_eq!(l.loaded_count(), 1);
        assert_eq!(l.total(), 2);
        assert!(!l.is_complete());
    }
}
