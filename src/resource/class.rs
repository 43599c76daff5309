//! Resource classes and size estimation

use serde::{Deserialize, Serialize};

/// Category of GPU-bound resource used for per-class budget accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceClass {
    Geometry,
    Texture,
    Material,
    Mesh,
    Scene,
    Audio,
}

impl ResourceClass {
    /// Every class, in bucket order
    pub const ALL: [ResourceClass; 6] = [
        ResourceClass::Geometry,
        ResourceClass::Texture,
        ResourceClass::Material,
        ResourceClass::Mesh,
        ResourceClass::Scene,
        ResourceClass::Audio,
    ];

    /// Position of this class in [`ALL`](Self::ALL)
    pub const fn index(self) -> usize {
        match self {
            ResourceClass::Geometry => 0,
            ResourceClass::Texture => 1,
            ResourceClass::Material => 2,
            ResourceClass::Mesh => 3,
            ResourceClass::Scene => 4,
            ResourceClass::Audio => 5,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ResourceClass::Geometry => "geometry",
            ResourceClass::Texture => "texture",
            ResourceClass::Material => "material",
            ResourceClass::Mesh => "mesh",
            ResourceClass::Scene => "scene",
            ResourceClass::Audio => "audio",
        }
    }
}

impl std::fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed estimates for resources whose size can't be measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeEstimates {
    /// Texture width assumed when unknown
    pub default_texture_width: u32,
    /// Texture height assumed when unknown
    pub default_texture_height: u32,
    /// Bytes per texel
    pub bytes_per_texel: u64,
    pub material_bytes: u64,
    pub mesh_bytes: u64,
    pub scene_bytes: u64,
}

impl Default for SizeEstimates {
    fn default() -> Self {
        Self {
            default_texture_width: 512,
            default_texture_height: 512,
            bytes_per_texel: 4,
            material_bytes: 1024,
            mesh_bytes: 512,
            scene_bytes: 256,
        }
    }
}

/// What the tracker knows about a resource when it is registered.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceInfo {
    /// Vertex attribute buffers plus an optional index buffer
    Geometry {
        attribute_bytes: Vec<u64>,
        index_bytes: Option<u64>,
    },
    /// Image with optional known dimensions
    Texture {
        width: Option<u32>,
        height: Option<u32>,
    },
    Material,
    Mesh,
    Scene,
    /// Decoded audio buffer
    Audio { byte_length: u64 },
    /// Size already known by the caller (e.g. a fetched payload)
    Measured { class: ResourceClass, bytes: u64 },
}

impl ResourceInfo {
    /// Texture of known size
    pub fn texture(width: u32, height: u32) -> Self {
        Self::Texture {
            width: Some(width),
            height: Some(height),
        }
    }

    /// Bucket this resource is charged to
    pub fn class(&self) -> ResourceClass {
        match self {
            ResourceInfo::Geometry { .. } => ResourceClass::Geometry,
            ResourceInfo::Texture { .. } => ResourceClass::Texture,
            ResourceInfo::Material => ResourceClass::Material,
            ResourceInfo::Mesh => ResourceClass::Mesh,
            ResourceInfo::Scene => ResourceClass::Scene,
            ResourceInfo::Audio { .. } => ResourceClass::Audio,
            ResourceInfo::Measured { class, .. } => *class,
        }
    }

    /// Estimated resident size in bytes
    pub fn estimated_bytes(&self, estimates: &SizeEstimates) -> u64 {
        match self {
            ResourceInfo::Geometry { attribute_bytes, index_bytes } => attribute_bytes
                .iter()
                .fold(index_bytes.unwrap_or(0), |acc, &b| acc.saturating_add(b)),
            ResourceInfo::Texture { width, height } => {
                let w = width.unwrap_or(estimates.default_texture_width) as u64;
                let h = height.unwrap_or(estimates.default_texture_height) as u64;
                w.saturating_mul(h).saturating_mul(estimates.bytes_per_texel)
            }
            ResourceInfo::Material => estimates.material_bytes,
            ResourceInfo::Mesh => estimates.mesh_bytes,
            ResourceInfo::Scene => estimates.scene_bytes,
            ResourceInfo::Audio { byte_length } => *byte_length,
            ResourceInfo::Measured { bytes, .. } => *bytes,
        }
    }
}
