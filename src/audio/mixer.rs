//! Channel mixer for audio instances
//!
//! Channels hold [`AudioHandle`]s, never the clips themselves. Before every
//! access both the clip resource and the instance are validated; a channel
//! whose handle went stale is unbound without complaint.

use crate::assets::AssetPipeline;
use crate::resources::ResourceRegistry;
use crate::resources::handlers::{AudioClip, AudioHandle, AudioInstance};

/// Mixes playing audio instances into an interleaved stereo buffer
#[derive(Debug, Clone)]
pub struct Mixer {
    channels: Vec<Option<AudioHandle>>,
    /// Master volume
    master_volume: f32,
    /// Whether audio is muted
    muted: bool,
}

/// Clip behind a handle, if both levels are still live
fn clip_mut<P: AssetPipeline>(
    registry: &mut ResourceRegistry<P>,
    handle: AudioHandle,
) -> Option<&mut AudioClip> {
    let clip = registry.get_mut(handle.resource)?.payload_mut::<AudioClip>()?;
    clip.instance(handle.instance)?;
    Some(clip)
}

impl Mixer {
    /// Create a mixer with a fixed number of channels
    #[must_use]
    pub fn new(channel_count: usize) -> Self {
        Self {
            channels: vec![None; channel_count],
            master_volume: 1.0,
            muted: false,
        }
    }

    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Handle bound to a channel
    #[must_use]
    pub fn bound(&self, channel: usize) -> Option<AudioHandle> {
        self.channels.get(channel).copied().flatten()
    }

    /// Run `f` on the instance bound to `channel`, unbinding it if stale
    fn with_instance<P: AssetPipeline, R>(
        &mut self,
        registry: &mut ResourceRegistry<P>,
        channel: usize,
        f: impl FnOnce(&mut AudioInstance) -> R,
    ) -> Option<R> {
        let slot = self.channels.get_mut(channel)?;
        let handle = (*slot)?;
        let Some(instance) =
            clip_mut(registry, handle).and_then(|clip| clip.instance_mut(handle.instance))
        else {
            log::trace!("Channel {channel}: unbinding stale {handle:?}");
            *slot = None;
            return None;
        };
        Some(f(instance))
    }

    /// Bind an instance to a channel and start it from the beginning.
    ///
    /// Returns `false` for an unknown channel or a stale handle.
    pub fn play<P: AssetPipeline>(
        &mut self,
        registry: &mut ResourceRegistry<P>,
        channel: usize,
        handle: AudioHandle,
    ) -> bool {
        let Some(slot) = self.channels.get_mut(channel) else {
            return false;
        };
        let Some(instance) =
            clip_mut(registry, handle).and_then(|clip| clip.instance_mut(handle.instance))
        else {
            return false;
        };
        instance.cursor = 0;
        instance.playing = true;
        *slot = Some(handle);
        true
    }

    /// Pause a channel, keeping its position
    pub fn pause<P: AssetPipeline>(&mut self, registry: &mut ResourceRegistry<P>, channel: usize) -> bool {
        self.with_instance(registry, channel, |instance| instance.playing = false)
            .is_some()
    }

    /// Resume a paused channel
    pub fn resume<P: AssetPipeline>(&mut self, registry: &mut ResourceRegistry<P>, channel: usize) -> bool {
        self.with_instance(registry, channel, |instance| instance.playing = true)
            .is_some()
    }

    /// Stop a channel and unbind it
    pub fn stop<P: AssetPipeline>(&mut self, registry: &mut ResourceRegistry<P>, channel: usize) -> bool {
        let stopped = self
            .with_instance(registry, channel, |instance| {
                instance.playing = false;
                instance.cursor = 0;
            })
            .is_some();
        if let Some(slot) = self.channels.get_mut(channel) {
            *slot = None;
        }
        stopped
    }

    /// Stop every channel
    pub fn stop_all<P: AssetPipeline>(&mut self, registry: &mut ResourceRegistry<P>) {
        for channel in 0..self.channels.len() {
            self.stop(registry, channel);
        }
    }

    /// Set the volume of the instance on a channel
    pub fn set_volume<P: AssetPipeline>(
        &mut self,
        registry: &mut ResourceRegistry<P>,
        channel: usize,
        volume: f32,
    ) -> bool {
        self.with_instance(registry, channel, |instance| instance.volume = volume.max(0.0))
            .is_some()
    }

    /// Set the looping flag of the instance on a channel
    pub fn set_looping<P: AssetPipeline>(
        &mut self,
        registry: &mut ResourceRegistry<P>,
        channel: usize,
        looping: bool,
    ) -> bool {
        self.with_instance(registry, channel, |instance| instance.looping = looping)
            .is_some()
    }

    /// Whether the instance on a channel is playing
    pub fn is_playing<P: AssetPipeline>(&mut self, registry: &mut ResourceRegistry<P>, channel: usize) -> bool {
        self.with_instance(registry, channel, |instance| instance.playing)
            .unwrap_or(false)
    }

    /// Set the master volume (affects all channels)
    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume.max(0.0);
    }

    #[must_use]
    pub const fn master_volume(&self) -> f32 {
        self.master_volume
    }

    pub fn mute(&mut self) {
        self.muted = true;
    }

    pub fn unmute(&mut self) {
        self.muted = false;
    }

    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
    }

    #[must_use]
    pub const fn is_muted(&self) -> bool {
        self.muted
    }

    /// Unbind every channel whose handle went stale. Returns how many were
    /// unbound.
    pub fn cleanup_stale<P: AssetPipeline>(&mut self, registry: &mut ResourceRegistry<P>) -> usize {
        let mut unbound = 0;
        for slot in &mut self.channels {
            if let Some(handle) = *slot
                && clip_mut(registry, handle).is_none()
            {
                *slot = None;
                unbound += 1;
            }
        }
        unbound
    }

    /// Mix `frames` stereo frames from every playing channel into `out`.
    ///
    /// `out` is cleared first. Stale channels are unbound and contribute
    /// silence.
    pub fn mix<P: AssetPipeline>(
        &mut self,
        registry: &mut ResourceRegistry<P>,
        frames: usize,
        out: &mut Vec<f32>,
    ) {
        out.clear();
        out.resize(frames * 2, 0.0);
        let gain = if self.muted { 0.0 } else { self.master_volume };

        for slot in &mut self.channels {
            let Some(handle) = *slot else {
                continue;
            };
            let mixed = clip_mut(registry, handle)
                .and_then(|clip| clip.mix_into(handle.instance, gain, out));
            if mixed.is_none() {
                *slot = None;
            }
        }
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new(8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetData, AssetDescriptor, AssetKind, AudioData, MemoryAssetPipeline};
    use crate::core::RegistryConfig;
    use crate::resources::handlers::create_audio_instance;
    use crate::resources::{RequestInfo, ResourceType};
    use crate::storage::Handle;

    fn registry_with_clip() -> (ResourceRegistry<MemoryAssetPipeline>, Handle) {
        let mut pipeline = MemoryAssetPipeline::default();
        pipeline.insert(
            "beep.wav",
            AssetData::Audio(AudioData {
                channels: 1,
                sample_rate: 8,
                samples: vec![0.5, 0.25, 1.0],
            }),
        );
        let mut registry =
            ResourceRegistry::with_builtin_handlers(RegistryConfig::default(), pipeline).unwrap();
        let info = RequestInfo::new().with_asset(AssetDescriptor::new("beep.wav", AssetKind::Audio));
        let clip = registry.request("beep", ResourceType::Audio, info).unwrap();
        registry.update();
        (registry, clip)
    }

    #[test]
    fn test_mix_plays_to_the_end() {
        let (mut registry, clip) = registry_with_clip();
        let handle = create_audio_instance(&mut registry, clip).unwrap();
        let mut mixer = Mixer::new(2);
        assert!(mixer.play(&mut registry, 0, handle));

        let mut out = Vec::new();
        mixer.mix(&mut registry, 4, &mut out);
        assert_eq!(out, vec![0.5, 0.5, 0.25, 0.25, 1.0, 1.0, 0.0, 0.0]);
        assert!(!mixer.is_playing(&mut registry, 0));
    }

    #[test]
    fn test_mute_and_master_volume() {
        let (mut registry, clip) = registry_with_clip();
        let handle = create_audio_instance(&mut registry, clip).unwrap();
        let mut mixer = Mixer::default();
        mixer.play(&mut registry, 3, handle);
        mixer.set_looping(&mut registry, 3, true);
        mixer.set_master_volume(0.5);

        let mut out = Vec::new();
        mixer.mix(&mut registry, 1, &mut out);
        assert_eq!(out, vec![0.25, 0.25]);

        mixer.toggle_mute();
        assert!(mixer.is_muted());
        mixer.mix(&mut registry, 1, &mut out);
        assert_eq!(out, vec![0.0, 0.0]);
        assert!(mixer.is_playing(&mut registry, 3));
    }

    #[test]
    fn test_stale_handles_are_silent() {
        let (mut registry, clip) = registry_with_clip();
        let first = create_audio_instance(&mut registry, clip).unwrap();
        let second = create_audio_instance(&mut registry, clip).unwrap();
        let mut mixer = Mixer::new(2);
        mixer.play(&mut registry, 0, first);
        mixer.play(&mut registry, 1, second);

        // Instance level goes stale
        registry
            .get_mut(clip)
            .and_then(|r| r.payload_mut::<AudioClip>())
            .unwrap()
            .destroy_instance(first.instance);
        assert!(!mixer.pause(&mut registry, 0));
        assert_eq!(mixer.bound(0), None);

        // Resource level goes stale
        registry.release(clip);
        let mut out = Vec::new();
        mixer.mix(&mut registry, 2, &mut out);
        assert_eq!(out, vec![0.0; 4]);
        assert_eq!(mixer.bound(1), None);
        assert!(!mixer.play(&mut registry, 0, second));
        assert_eq!(mixer.cleanup_stale(&mut registry), 0);
    }
}
