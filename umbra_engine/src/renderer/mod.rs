/// Renderer module - backend-agnostic GPU object traits and descriptors

pub mod renderer;
pub mod texture;
pub mod buffer;
pub mod shader;
pub mod sampler;
pub mod render_pass;
pub mod framebuffer;
pub mod binding_group;
pub mod pipeline;
pub mod command_list;
pub mod sync;

#[cfg(test)]
pub mod mock_renderer;

pub use renderer::*;
pub use texture::*;
pub use buffer::*;
pub use shader::*;
pub use sampler::*;
pub use render_pass::*;
pub use framebuffer::*;
pub use binding_group::*;
pub use pipeline::*;
pub use command_list::*;
pub use sync::*;
