/// Framebuffer trait and descriptor

use std::sync::Arc;
use crate::renderer::{RenderPass, Texture};

/// Physical framebuffer object binding attachments to a render pass
pub trait Framebuffer: Send + Sync {
    /// Width in pixels
    fn width(&self) -> u32;

    /// Height in pixels
    fn height(&self) -> u32;
}

/// Descriptor for creating a framebuffer
pub struct FramebufferDesc<'a> {
    /// Render pass the framebuffer must be compatible with
    pub render_pass: &'a Arc<dyn RenderPass>,
    /// Color attachments, in render pass order
    pub color_attachments: Vec<Arc<dyn Texture>>,
    /// Optional depth/stencil attachment
    pub depth_attachment: Option<Arc<dyn Texture>>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Number of layers
    pub layers: u32,
}
