/// Streaming module - CPU to GPU per-frame data without write-after-read hazards

pub mod fence_wait;
pub mod lock_manager;
pub mod ring_buffer;

pub use fence_wait::*;
pub use lock_manager::*;
pub use ring_buffer::*;
