//! # Frame Buffers
//!
//! A frame buffer owns the packed color image plus optional accumulation
//! and depth channels. Rows are stored bottom-first: the first `width * 4`
//! bytes of the mapped color channel are the *bottom* image row, matching
//! the usual OpenGL texture upload orientation.
//!
//! ## Accumulation
//!
//! With the accumulation channel enabled, every render pass is blended
//! into a running per-pixel average kept in full `f32` precision; the
//! packed color image is re-derived from the average after each pass.
//! [`FrameBuffer::reset_accumulation`] restarts the average. Rendering a
//! *changed* scene without a reset is legal but almost always a mistake,
//! so it logs a warning while continuing to blend.

use bytemuck::cast_slice;
use cgmath::Vector4;

use crate::error::{Error, Result};

/// Packed color encoding of the mapped image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameBufferFormat {
    /// Linear 8-bit RGBA.
    Rgba8,
    /// 8-bit RGBA with sRGB-encoded color components.
    Srgba,
}

/// Which optional channels the buffer allocates.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelLayout {
    /// Keep a full-precision running average across render passes.
    pub accum: bool,
    /// Record per-pixel hit distance.
    pub depth: bool,
}

/// Render target; see the module docs for layout and accumulation rules.
#[derive(Debug)]
pub struct FrameBuffer {
    width: usize,
    height: usize,
    format: FrameBufferFormat,
    channels: ChannelLayout,
    color: Vec<[u8; 4]>,
    accum: Vec<Vector4<f32>>,
    depth: Vec<f32>,
    accum_frames: u32,
    scene_stamp: Option<u64>,
}

impl FrameBuffer {
    pub fn new(
        width: usize,
        height: usize,
        format: FrameBufferFormat,
        channels: ChannelLayout,
    ) -> Result<FrameBuffer> {
        if width == 0 || height == 0 {
            return Err(Error::Initialization(format!(
                "framebuffer size {width}x{height} must be positive"
            )));
        }
        let pixels = width
            .checked_mul(height)
            .filter(|&n| n.checked_mul(16).is_some())
            .ok_or(Error::ResourceExhausted { bytes: usize::MAX })?;

        Ok(FrameBuffer {
            width,
            height,
            format,
            channels,
            color: vec![[0; 4]; pixels],
            accum: if channels.accum {
                vec![Vector4::new(0.0, 0.0, 0.0, 0.0); pixels]
            } else {
                Vec::new()
            },
            depth: if channels.depth {
                vec![f32::INFINITY; pixels]
            } else {
                Vec::new()
            },
            accum_frames: 0,
            scene_stamp: None,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn format(&self) -> FrameBufferFormat {
        self.format
    }

    /// Number of render passes blended into the current image.
    pub fn accumulation_count(&self) -> u32 {
        self.accum_frames
    }

    /// Restart progressive accumulation from an empty average.
    pub fn reset_accumulation(&mut self) {
        self.accum_frames = 0;
        self.scene_stamp = None;
        for texel in &mut self.accum {
            *texel = Vector4::new(0.0, 0.0, 0.0, 0.0);
        }
        for d in &mut self.depth {
            *d = f32::INFINITY;
        }
    }

    /// Packed color bytes, bottom row first, `width * 4` bytes per row.
    /// The borrow is the map/unmap contract: the buffer cannot be rendered
    /// into while mapped.
    pub fn map_color(&self) -> &[u8] {
        cast_slice(&self.color)
    }

    /// Per-pixel hit distance, same row order as the color channel, or
    /// `None` when the depth channel was not requested.
    pub fn map_depth(&self) -> Option<&[f32]> {
        self.channels.depth.then_some(self.depth.as_slice())
    }

    /// Blends one render pass into the buffer. `samples` and `depth` are
    /// in storage order (bottom row first), one entry per pixel.
    pub(crate) fn merge_pass(&mut self, samples: &[Vector4<f32>], depth: &[f32], stamp: u64) {
        debug_assert_eq!(samples.len(), self.width * self.height);

        if let Some(previous) = self.scene_stamp {
            if previous != stamp && self.accum_frames > 0 {
                log::warn!(
                    "scene changed mid-accumulation ({} frames kept); \
                     call reset_accumulation to start a fresh average",
                    self.accum_frames
                );
            }
        }
        self.scene_stamp = Some(stamp);

        if self.channels.accum {
            let n = self.accum_frames as f32;
            let keep = n / (n + 1.0);
            let add = 1.0 / (n + 1.0);
            for (texel, sample) in self.accum.iter_mut().zip(samples) {
                *texel = *texel * keep + *sample * add;
            }
            let format = self.format;
            for (packed, average) in self.color.iter_mut().zip(&self.accum) {
                *packed = pack_rgba(*average, format);
            }
        } else {
            for (texel, sample) in self.color.iter_mut().zip(samples) {
                *texel = pack_rgba(*sample, self.format);
            }
        }

        if self.channels.depth {
            self.depth.copy_from_slice(depth);
        }
        self.accum_frames += 1;
    }
}

fn pack_rgba(value: Vector4<f32>, format: FrameBufferFormat) -> [u8; 4] {
    let encode = |c: f32| -> u8 {
        let c = c.clamp(0.0, 1.0);
        let c = match format {
            FrameBufferFormat::Rgba8 => c,
            FrameBufferFormat::Srgba => linear_to_srgb(c),
        };
        (c * 255.0 + 0.5) as u8
    };
    [
        encode(value.x),
        encode(value.y),
        encode(value.z),
        (value.w.clamp(0.0, 1.0) * 255.0 + 0.5) as u8,
    ]
}

fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.0031308 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}
