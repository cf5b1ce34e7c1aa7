//! Decoded asset payloads
//!
//! What a pipeline hands back for each descriptor. Parsing the on-disk
//! formats is the pipeline's job; handlers only ever see these types.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use super::descriptor::AssetKind;

/// Decoded RGBA8 image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 rows
    pub pixels: Vec<u8>,
}

impl ImageData {
    /// Bytes per pixel of every decoded image
    pub const CHANNELS: usize = 4;

    /// Create an image filled with one colour
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * Self::CHANNELS)
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Size of the pixel buffer in bytes
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * Self::CHANNELS
    }
}

/// Vertex with position, normal, and UV coordinates
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    /// Create a new vertex
    pub const fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// Static mesh geometry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

/// Decoded PCM audio, interleaved
#[derive(Debug, Clone, PartialEq)]
pub struct AudioData {
    pub channels: u16,
    pub sample_rate: u32,
    /// Interleaved samples in `[-1.0, 1.0]`
    pub samples: Vec<f32>,
}

impl AudioData {
    /// Number of sample frames
    #[must_use]
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }
}

/// A decoded asset
#[derive(Debug, Clone, PartialEq)]
pub enum AssetData {
    Text(String),
    Binary(Vec<u8>),
    Image(ImageData),
    StaticMesh(MeshData),
    Audio(AudioData),
}

impl AssetData {
    /// The kind of asset this payload decodes
    #[must_use]
    pub const fn kind(&self) -> AssetKind {
        match self {
            Self::Text(_) => AssetKind::Text,
            Self::Binary(_) => AssetKind::Binary,
            Self::Image(_) => AssetKind::Image,
            Self::StaticMesh(_) => AssetKind::StaticMesh,
            Self::Audio(_) => AssetKind::Audio,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_image(&self) -> Option<&ImageData> {
        match self {
            Self::Image(image) => Some(image),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn into_binary(self) -> Option<Vec<u8>> {
        match self {
            Self::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn into_image(self) -> Option<ImageData> {
        match self {
            Self::Image(image) => Some(image),
            _ => None,
        }
    }

    pub fn into_mesh(self) -> Option<MeshData> {
        match self {
            Self::StaticMesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn into_audio(self) -> Option<AudioData> {
        match self {
            Self::Audio(audio) => Some(audio),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_image() {
        let image = ImageData::solid(2, 3, [1, 2, 3, 4]);
        assert_eq!(image.pixels.len(), image.byte_len());
        assert_eq!(&image.pixels[..8], &[1, 2, 3, 4, 1, 2, 3, 4]);
    }

    #[test]
    fn test_kind_and_accessors() {
        let data = AssetData::Text("hello".into());
        assert_eq!(data.kind(), AssetKind::Text);
        assert_eq!(data.as_text(), Some("hello"));
        assert!(data.as_binary().is_none());
        assert!(data.into_image().is_none());
    }

    #[test]
    fn test_audio_frame_count() {
        let audio = AudioData {
            channels: 2,
            sample_rate: 44_100,
            samples: vec![0.0; 10],
        };
        assert_eq!(audio.frame_count(), 5);
    }
}
