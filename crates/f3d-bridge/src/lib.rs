//! Translation layer between a Fast3D/F3DEX2-style display list stream and
//! a constrained single-pass fixed-function rasterizer.
//!
//! The interpreter walks 64-bit command words out of a byte-addressable
//! source memory, tracks the render state the commands describe, and
//! reproduces the source pipeline's behavior on target hardware that cannot
//! express it natively: per-polygon (not per-vertex) alpha, an
//! un-disableable depth test, one fog configuration per frame, and a small
//! texture memory serviced by a FIFO eviction policy.
//!
//! The target hardware sits behind the [`target::Rasterizer`] trait; frame
//! pacing behind [`target::VideoSync`]; 2D overlay sprites behind
//! [`target::Overlay`]. Everything else is this crate.

pub mod context;
pub mod frame;
pub mod gbi;
pub mod interp;
pub mod matrix;
mod mem;
pub mod rect;
pub mod state;
pub mod target;
pub mod texture;
pub mod vertex;

#[cfg(test)]
pub(crate) mod testutil;

pub use context::Context;
pub use frame::FrameController;
pub use target::{Overlay, Rasterizer, Sprite, VideoSync};
