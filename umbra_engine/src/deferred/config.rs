/// Deferred renderer configuration

use std::time::Duration;

/// What the composition pass writes to the presentation target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugDisplay {
    /// Lit scene with shadows
    #[default]
    Composite,
    /// World-space position attachment
    Position,
    /// Normal attachment
    Normal,
    /// Albedo attachment
    Albedo,
    /// Shadow map depth as seen from the light
    ShadowMap,
}

impl DebugDisplay {
    /// Value the composition shader switches on
    pub fn as_u32(&self) -> u32 {
        match self {
            DebugDisplay::Composite => 0,
            DebugDisplay::Position => 1,
            DebugDisplay::Normal => 2,
            DebugDisplay::Albedo => 3,
            DebugDisplay::ShadowMap => 4,
        }
    }
}

/// Deferred renderer configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredConfig {
    /// Width and height of the shadow map, independent of the surface
    pub shadow_map_size: u32,
    /// Array layers of the shadow map
    pub shadow_map_layers: u32,
    /// Instance records one frame may stream
    pub max_instances_per_frame: u32,
    /// Size of the bindless texture array
    pub max_textures: u32,
    /// Constant depth bias of the shadow pipeline
    pub depth_bias_constant: f32,
    /// Slope-scaled depth bias of the shadow pipeline
    pub depth_bias_slope: f32,
    /// How long a fence wait may block before the device is considered lost
    pub fence_timeout: Duration,
    /// Depth the shadow map is cleared to
    pub shadow_clear_depth: f32,
    pub debug_display: DebugDisplay,
    /// When false the shadow pass only clears the shadow map
    pub enable_shadows: bool,
}

impl Default for DeferredConfig {
    fn default() -> Self {
        Self {
            shadow_map_size: 2048,
            shadow_map_layers: 1,
            max_instances_per_frame: 4096,
            max_textures: 1024,
            depth_bias_constant: 1.25,
            depth_bias_slope: 1.75,
            fence_timeout: Duration::from_secs(5),
            shadow_clear_depth: 1.0,
            debug_display: DebugDisplay::Composite,
            enable_shadows: true,
        }
    }
}
