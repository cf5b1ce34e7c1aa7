//! Asset descriptors
//!
//! The minimal addressing unit handed to an asset pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What an asset decodes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    /// UTF-8 text
    Text,
    /// Raw bytes
    Binary,
    /// Decoded RGBA8 image
    Image,
    /// Static mesh geometry
    StaticMesh,
    /// Decoded PCM audio
    Audio,
}

/// Names one underlying asset a resource needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetDescriptor {
    /// Asset name within its package
    pub asset_name: String,
    /// Package the asset lives in (empty for the pipeline's default)
    #[serde(default)]
    pub package_name: String,
    /// How the asset should be decoded
    pub kind: AssetKind,
    /// Ask the pipeline to report later changes to this asset
    #[serde(default)]
    pub watch: bool,
}

impl AssetDescriptor {
    /// Create a descriptor in the default package
    pub fn new(asset_name: impl Into<String>, kind: AssetKind) -> Self {
        Self {
            asset_name: asset_name.into(),
            package_name: String::new(),
            kind,
            watch: false,
        }
    }

    /// Set the package
    pub fn in_package(mut self, package_name: impl Into<String>) -> Self {
        self.package_name = package_name.into();
        self
    }

    /// Request change notifications for this asset
    pub fn watched(mut self) -> Self {
        self.watch = true;
        self
    }

    /// Package name, falling back to `default` when none was given
    #[must_use]
    pub fn package_or<'a>(&'a self, default: &'a str) -> &'a str {
        if self.package_name.is_empty() {
            default
        } else {
            &self.package_name
        }
    }
}

impl fmt::Display for AssetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.package_name.is_empty() {
            write!(f, "{} ({:?})", self.asset_name, self.kind)
        } else {
            write!(f, "{}/{} ({:?})", self.package_name, self.asset_name, self.kind)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let descriptor = AssetDescriptor::new("brick", AssetKind::Image)
            .in_package("level1")
            .watched();

        assert_eq!(descriptor.asset_name, "brick");
        assert_eq!(descriptor.package_or("runtime"), "level1");
        assert!(descriptor.watch);
        assert_eq!(descriptor.to_string(), "level1/brick (Image)");
    }

    #[test]
    fn test_default_package() {
        let descriptor = AssetDescriptor::new("notes", AssetKind::Text);
        assert_eq!(descriptor.package_or("runtime"), "runtime");
    }
}
