//! Scene inputs consumed by the deferred pipeline
//!
//! The pipeline does not own a scene graph. Callers hand in ready GPU
//! buffers (`SceneBuffers`), the per-frame instance list
//! (`PerInstanceRecord`) and camera/light providers (`CameraView`,
//! `LightSource`).

mod instance;
mod draw_list;
mod scene_buffers;
mod view;

pub use instance::{PerInstanceRecord, instance_bytes};
pub use draw_list::{DrawList, IndirectDrawCommand, MeshRange, MeshVertex};
pub use scene_buffers::SceneBuffers;
pub use view::{CameraView, LightSource, StaticCamera, DirectionalLight};
