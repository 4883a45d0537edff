/// Deferred pipeline: targets, bindings, pipelines and pass recording

pub mod config;
pub mod format;
pub mod framebuffer;
pub mod binder;
pub mod uniforms;
pub mod shaders;
pub mod pipelines;
pub mod sequencer;
pub mod deferred_renderer;

pub use config::*;
pub use format::*;
pub use framebuffer::*;
pub use binder::*;
pub use uniforms::*;
pub use shaders::*;
pub use pipelines::*;
pub use sequencer::*;
pub use deferred_renderer::*;
