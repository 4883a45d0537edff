/// Camera and light providers
///
/// The deferred pipeline computes no view math. It reads matrices from
/// whatever implements these traits. `StaticCamera` and `DirectionalLight`
/// are passive containers for callers that already have the values.

use glam::{Mat4, Vec3, Vec4};

pub trait CameraView {
    fn projection(&self) -> Mat4;
    fn view(&self) -> Mat4;
    /// World-space eye position
    fn position(&self) -> Vec3;
}

pub trait LightSource {
    fn position(&self) -> Vec3;
    /// Point the light is aimed at
    fn look_at(&self) -> Vec3;
    /// RGB color, alpha is the intensity
    fn color(&self) -> Vec4;
    /// World to light clip space, used to render and sample the shadow map
    fn light_space_matrix(&self) -> Mat4;
}

/// Camera whose matrices are set by the caller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticCamera {
    pub projection: Mat4,
    pub view: Mat4,
    pub position: Vec3,
}

impl CameraView for StaticCamera {
    fn projection(&self) -> Mat4 {
        self.projection
    }

    fn view(&self) -> Mat4 {
        self.view
    }

    fn position(&self) -> Vec3 {
        self.position
    }
}

/// Directional light with an explicit shadow projection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub position: Vec3,
    pub target: Vec3,
    pub color: Vec4,
    /// Projection of the shadow map (usually orthographic)
    pub projection: Mat4,
}

impl LightSource for DirectionalLight {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn look_at(&self) -> Vec3 {
        self.target
    }

    fn color(&self) -> Vec4 {
        self.color
    }

    fn light_space_matrix(&self) -> Mat4 {
        self.projection * Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }
}
