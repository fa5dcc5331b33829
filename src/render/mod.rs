//! Rendering: cameras, frame buffers, the ambient-occlusion renderer, and
//! picking.

pub mod camera;
pub mod framebuffer;
pub mod pick;
pub mod renderer;
mod trace;
