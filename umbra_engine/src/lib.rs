/*!
# Umbra Engine

Backend-agnostic core of the Umbra deferred renderer.

The crate defines the `Renderer` strategy trait and the GPU object traits a
backend implements (Vulkan lives in `umbra_renderer_vulkan`), and builds the
deferred pipeline on top of them:

- **Attachment & framebuffer manager**: G-buffer and shadow map targets with
  their render passes (`deferred::framebuffer`, `deferred::format`)
- **Streaming ring buffer**: fence-guarded per-frame instance data (`streaming`)
- **Resource binder**: the fixed binding layout and its binding group (`deferred::binder`)
- **Pipeline builder**: shadow, geometry and composition pipelines (`deferred::pipelines`)
- **Pass sequencer**: shadow, geometry and composition recording (`deferred::sequencer`)

`DeferredRenderer` owns all of them and is what a frame driver talks to.
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod renderer;
pub mod streaming;
pub mod scene;
pub mod deferred;

// Main umbra namespace module
pub mod umbra {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine (logging facade)
    pub use crate::engine::Engine;

    // Renderer factory trait
    pub use crate::renderer::Renderer;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Render sub-module with all rendering types
    pub mod render {
        pub use crate::renderer::*;
    }

    // Streaming sub-module
    pub mod streaming {
        pub use crate::streaming::*;
    }

    // Scene input sub-module
    pub mod scene {
        pub use crate::scene::*;
    }

    // Deferred pipeline sub-module
    pub mod deferred {
        pub use crate::deferred::*;
    }
}

// Re-export math library at crate root
pub use glam;
