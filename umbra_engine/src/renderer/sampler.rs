/// Sampler presets
///
/// Samplers are never created directly: bindings name a preset and the
/// backend resolves (and caches) the matching GPU sampler.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerType {
    /// Linear filtering, repeat addressing (material textures)
    LinearRepeat,
    /// Linear filtering, clamp-to-edge (G-buffer reads)
    LinearClamp,
    /// Nearest filtering, repeat addressing
    NearestRepeat,
    /// Nearest filtering, clamp-to-edge
    NearestClamp,
    /// Linear filtering, clamp-to-border opaque white (shadow map reads)
    Shadow,
}
