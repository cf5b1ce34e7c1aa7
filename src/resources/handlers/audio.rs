//! Audio clip resources
//!
//! A clip owns its decoded samples and a fixed-capacity table of playback
//! instances. Instances are addressed by an [`AudioHandle`], which pairs the
//! clip's resource handle with the instance handle so either level going
//! away is detected.

use crate::assets::{AssetData, AssetKind, AudioData, AssetPipeline};
use crate::resources::error::ResourceError;
use crate::resources::handler::{HandlerContext, ResourceHandler};
use crate::resources::listener::FanIn;
use crate::resources::registry::ResourceRegistry;
use crate::resources::request::RequestInfo;
use crate::resources::resource::Resource;
use crate::storage::{Handle, SlotTable};

use super::{begin_single, nothing_loaded, single_asset};

/// Weak reference to one playback instance of a clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AudioHandle {
    /// The clip resource
    pub resource: Handle,
    /// The instance within the clip
    pub instance: Handle,
}

/// Playback state of one instance
#[derive(Debug, Clone, PartialEq)]
pub struct AudioInstance {
    /// Next frame to play
    pub cursor: usize,
    /// Volume (0.0 - 1.0)
    pub volume: f32,
    pub looping: bool,
    pub playing: bool,
}

impl Default for AudioInstance {
    fn default() -> Self {
        Self {
            cursor: 0,
            volume: 1.0,
            looping: false,
            playing: false,
        }
    }
}

/// A loaded sound
#[derive(Debug)]
pub struct AudioClip {
    pub data: AudioData,
    instances: SlotTable<AudioInstance>,
}

impl AudioClip {
    #[must_use]
    pub fn new(data: AudioData, max_instances: usize) -> Self {
        Self {
            data,
            instances: SlotTable::with_max_capacity(max_instances),
        }
    }

    /// Length in seconds
    #[must_use]
    pub fn duration_secs(&self) -> f32 {
        if self.data.sample_rate == 0 {
            return 0.0;
        }
        self.data.frame_count() as f32 / self.data.sample_rate as f32
    }

    /// Start tracking a new playback instance.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::CapacityExhausted`] when every instance slot
    /// is in use.
    pub fn create_instance(&mut self) -> Result<Handle, ResourceError> {
        self.instances
            .allocate(AudioInstance::default())
            .map_err(|e| ResourceError::capacity("audio instance", e))
    }

    /// Stop tracking an instance. Returns `false` if it was already gone.
    pub fn destroy_instance(&mut self, instance: Handle) -> bool {
        self.instances.recycle(instance).is_some()
    }

    #[must_use]
    pub fn instance(&self, instance: Handle) -> Option<&AudioInstance> {
        self.instances.get(instance)
    }

    pub fn instance_mut(&mut self, instance: Handle) -> Option<&mut AudioInstance> {
        self.instances.get_mut(instance)
    }

    #[must_use]
    pub const fn instance_count(&self) -> usize {
        self.instances.occupied()
    }

    /// Add the next frames of `instance` into interleaved stereo `out`,
    /// scaled by the instance volume and `gain`, and advance its cursor.
    ///
    /// Returns `None` for a stale instance, otherwise whether it is still
    /// playing afterwards.
    pub fn mix_into(&mut self, instance: Handle, gain: f32, out: &mut [f32]) -> Option<bool> {
        let state = self.instances.get_mut(instance)?;
        let channels = usize::from(self.data.channels.max(1));
        let frame_count = self.data.frame_count();
        if frame_count == 0 {
            state.playing = false;
        }
        if !state.playing {
            return Some(false);
        }

        let volume = state.volume * gain;
        for frame in out.chunks_exact_mut(2) {
            if state.cursor >= frame_count {
                if !state.looping {
                    state.playing = false;
                    state.cursor = 0;
                    break;
                }
                state.cursor = 0;
            }
            let start = state.cursor * channels;
            let left = self.data.samples[start];
            let right = if channels > 1 { self.data.samples[start + 1] } else { left };
            frame[0] += left * volume;
            frame[1] += right * volume;
            state.cursor += 1;
        }
        Some(state.playing)
    }
}

/// Create a playback instance of a loaded clip.
///
/// # Errors
///
/// Fails if `resource` is stale, is not a loaded clip, or the clip has no
/// free instance slots.
pub fn create_audio_instance<P: AssetPipeline>(
    registry: &mut ResourceRegistry<P>,
    resource: Handle,
) -> Result<AudioHandle, ResourceError> {
    let clip = registry
        .get_mut(resource)
        .ok_or(ResourceError::InvalidHandle)?
        .payload_mut::<AudioClip>()
        .ok_or_else(|| ResourceError::InvalidRequest(format!("{resource} is not a loaded audio clip")))?;

    let instance = clip.create_instance()?;
    Ok(AudioHandle { resource, instance })
}

/// Loads [`AudioClip`]s from one audio asset.
#[derive(Debug)]
pub struct AudioHandler {
    max_instances: usize,
}

impl AudioHandler {
    /// Create a handler whose clips hold at most `max_instances` instances
    #[must_use]
    pub const fn new(max_instances: usize) -> Self {
        Self { max_instances }
    }
}

impl ResourceHandler for AudioHandler {
    fn request(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        resource: &mut Resource,
        info: &RequestInfo,
    ) -> Result<(), ResourceError> {
        let descriptor = single_asset(resource, info, AssetKind::Audio)?;
        begin_single(ctx, resource, info, descriptor, info.synchronous)
    }

    fn finalize(
        &mut self,
        _ctx: &mut HandlerContext<'_>,
        resource: &mut Resource,
        fan_in: FanIn,
    ) -> Result<(), ResourceError> {
        let data = fan_in
            .into_first()
            .and_then(AssetData::into_audio)
            .ok_or_else(|| nothing_loaded(resource))?;
        let clip = AudioClip::new(data, self.max_instances);
        log::debug!("Audio '{}': {:.2}s", resource.name(), clip.duration_secs());
        resource.set_payload(clip);
        resource.mark_loaded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetDescriptor, MemoryAssetPipeline};
    use crate::core::RegistryConfig;
    use crate::resources::ResourceType;

    fn clip() -> AudioData {
        AudioData {
            channels: 2,
            sample_rate: 4,
            samples: vec![0.0; 16],
        }
    }

    #[test]
    fn test_instance_table_capacity() {
        let mut clip = AudioClip::new(clip(), 2);
        assert_eq!(clip.duration_secs(), 2.0);

        let a = clip.create_instance().unwrap();
        let _b = clip.create_instance().unwrap();
        assert!(matches!(
            clip.create_instance(),
            Err(ResourceError::CapacityExhausted { capacity: 2, .. })
        ));

        assert!(clip.destroy_instance(a));
        assert!(clip.instance(a).is_none());
        assert!(clip.create_instance().is_ok());
    }

    #[test]
    fn test_instances_go_stale_with_the_clip() {
        let mut pipeline = MemoryAssetPipeline::default();
        pipeline.insert("boom.wav", AssetData::Audio(clip()));
        let config = RegistryConfig::default().with_max_audio_instances(1);
        let mut registry = ResourceRegistry::with_builtin_handlers(config, pipeline).unwrap();

        let info = RequestInfo::new().with_asset(AssetDescriptor::new("boom.wav", AssetKind::Audio));
        let boom = registry.request("boom", ResourceType::Audio, info).unwrap();
        assert!(create_audio_instance(&mut registry, boom).is_err(), "Not loaded yet");

        registry.update();
        let handle = create_audio_instance(&mut registry, boom).unwrap();
        assert!(create_audio_instance(&mut registry, boom).is_err(), "Capacity 1");

        registry.release(boom);
        assert!(registry.payload::<AudioClip>(handle.resource).is_none());
        assert!(matches!(
            create_audio_instance(&mut registry, boom),
            Err(ResourceError::InvalidHandle)
        ));
    }
}
