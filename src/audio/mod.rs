//! Audio playback on top of audio resources
//!
//! The mixer only ever stores weak [`AudioHandle`](crate::resources::handlers::AudioHandle)s,
//! so clips can be released while channels still point at them.

mod mixer;

pub use mixer::Mixer;
