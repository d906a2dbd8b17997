// src/painter/mod.rs
//! Drawing core: operations, the queue that carries them, and the loop that
//! applies them to a double-buffered canvas.
//!
//! - `Operation`: a mutation of a `Texture` that says whether to publish
//! - `MessageQueue`: blocking FIFO feeding the loop's worker thread
//! - `Loop`: owns the two textures, serializes every apply, publishes frames
//!
//! The loop depends on the graphics backend only through two traits:
//! `Screen` allocates textures and `Receiver` consumes published frames.

pub mod event_loop;
pub mod headless;
pub mod ops;
pub mod queue;
pub mod texture;

#[cfg(test)]
mod tests;

pub use event_loop::{Loop, LoopError, LoopState};
pub use headless::{FrameRecorder, HeadlessScreen, RecordedFrame};
pub use ops::{DrawOp, Operation};
pub use queue::MessageQueue;
pub use texture::{Background, Point, Rect, Scene, Size, Texture, TextureId, CANVAS_SIZE};

use anyhow::Result;

/// Buffer provider implemented by the graphics backend.
pub trait Screen {
    /// Allocates a blank texture of the given size.
    fn new_texture(&self, size: Size) -> Result<Texture>;
}

/// Frame consumer implemented by the graphics backend.
///
/// Called from whichever thread performed the publishing apply, while the
/// loop's buffers are locked. The texture is only borrowed; implementations
/// that keep the frame must copy it.
pub trait Receiver: Send + Sync {
    fn update(&self, frame: &Texture);
}
