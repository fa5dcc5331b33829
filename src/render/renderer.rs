//! # Ambient Occlusion Renderer
//!
//! The "ao" renderer shades surfaces with ambient light attenuated by
//! cosine-weighted occlusion rays, marches volumes through their transfer
//! functions, and composites the result over a background color.
//!
//! ## Determinism
//!
//! Each pixel of each pass derives its RNG seed from `(pass, x, y)` alone,
//! so repeating a render sequence reproduces the image bit for bit:
//! rendering N passes and then M more gives exactly the same buffer as
//! N + M passes in one sitting, and resetting accumulation replays the
//! same sequence from pass zero. Pass zero samples the pixel center, so a
//! single un-accumulated frame is jitter-free.

use std::time::Instant;

use cgmath::{Vector4, Zero};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::error::Result;
use crate::render::camera::Camera;
use crate::render::framebuffer::FrameBuffer;
use crate::render::trace;
use crate::scene::object::{Handle, ObjectCore, SceneObject};
use crate::scene::params::{ParamSet, ParamSpec, ParamType, Schema};
use crate::scene::world::World;

const AO_SCHEMA: Schema = Schema {
    kind: "ao",
    params: &[
        ParamSpec::optional("aoSamples", ParamType::Int),
        ParamSpec::optional("aoDistance", ParamType::Float),
        ParamSpec::optional("backgroundColor", ParamType::Vec4f),
    ],
};

#[derive(Clone, Copy)]
pub(crate) struct RendererState {
    pub(crate) ao_samples: u32,
    pub(crate) ao_distance: f32,
    pub(crate) background: Vector4<f32>,
}

/// Renders committed worlds into frame buffers.
pub struct Renderer {
    core: ObjectCore,
    state: Option<RendererState>,
}

impl Renderer {
    /// Creates an (uncommitted) ambient-occlusion renderer.
    pub fn ambient_occlusion() -> Handle<Renderer> {
        Handle::new(Renderer {
            core: ObjectCore::new(&AO_SCHEMA),
            state: None,
        })
    }

    pub(crate) fn state(&self) -> Result<RendererState> {
        self.state.ok_or(crate::error::Error::UncommittedState {
            kind: self.core.kind(),
        })
    }
}

impl SceneObject for Renderer {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn rebuild(&mut self, params: &ParamSet) -> Result<()> {
        self.state = Some(RendererState {
            ao_samples: params.int("aoSamples").unwrap_or(1).max(0) as u32,
            ao_distance: params.float("aoDistance").unwrap_or(1e20),
            background: params.vec4f("backgroundColor").unwrap_or_else(Vector4::zero),
        });
        Ok(())
    }
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E3779B97F4A7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Seed for the pixel's RNG, a pure function of the pass index and the
/// pixel coordinate. This is what makes accumulation replayable.
fn pixel_seed(pass: u32, x: usize, y: usize) -> u64 {
    let mut h = splitmix64(pass as u64);
    h = splitmix64(h ^ x as u64);
    splitmix64(h ^ ((y as u64) << 32))
}

/// Renders one pass of `world` through `camera` into `framebuffer`,
/// blending it into the accumulation average when that channel exists.
///
/// Everything is validated before any pixel work: an error from an
/// uncommitted or dirty object leaves the frame buffer untouched.
pub fn render_frame(
    framebuffer: &mut FrameBuffer,
    renderer: &Handle<Renderer>,
    camera: &Handle<Camera>,
    world: &Handle<World>,
) -> Result<()> {
    let renderer_state = {
        let guard = renderer.read();
        guard.core().ensure_clean()?;
        guard.state()?
    };
    let camera_state = {
        let guard = camera.read();
        guard.core().ensure_clean()?;
        guard.state()?
    };
    let scene = world.prepare()?;

    let width = framebuffer.width();
    let height = framebuffer.height();
    let pass = framebuffer.accumulation_count();
    let start = Instant::now();

    let mut samples = vec![Vector4::new(0.0, 0.0, 0.0, 0.0); width * height];
    let mut depth = vec![f32::INFINITY; width * height];

    // Rows are in storage order (bottom first); the camera's v axis runs
    // top-down, hence the flip.
    samples
        .par_chunks_mut(width)
        .zip(depth.par_chunks_mut(width))
        .enumerate()
        .for_each(|(row, (sample_row, depth_row))| {
            let image_row = height - 1 - row;
            for x in 0..width {
                let mut rng = StdRng::seed_from_u64(pixel_seed(pass, x, image_row));
                let (jx, jy) = if pass == 0 {
                    (0.5, 0.5)
                } else {
                    (rng.random::<f32>(), rng.random::<f32>())
                };
                let u = (x as f32 + jx) / width as f32;
                let v = (image_row as f32 + jy) / height as f32;
                let ray = camera_state.ray_through(u, v);
                let (color, t) = trace::shade(&scene, &renderer_state, &ray, &mut rng);
                sample_row[x] = color;
                depth_row[x] = t;
            }
        });

    framebuffer.merge_pass(&samples, &depth, scene.fingerprint);
    log::debug!(
        "rendered pass {} ({}x{}) in {:.1?}",
        pass,
        width,
        height,
        start.elapsed()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Data, DataType};
    use crate::error::Error;
    use crate::render::framebuffer::{ChannelLayout, FrameBufferFormat};
    use crate::scene::group::Group;
    use crate::scene::instance::Instance;
    use crate::scene::model::VolumetricModel;
    use crate::scene::transfer_function::TransferFunction;
    use crate::scene::volume::Volume;
    use cgmath::{Vector2, Vector3};

    fn red_box_world() -> Handle<World> {
        // Constant-density unit volume mapped to opaque red.
        let volume = Volume::structured_regular();
        volume
            .set(
                "data",
                Data::from_slice_3d(DataType::Float, [2, 2, 2], &[1.0f32; 8]).unwrap(),
            )
            .unwrap();
        volume.commit().unwrap();

        let tf = TransferFunction::piecewise_linear();
        tf.set(
            "color",
            Data::from_slice(DataType::Vec3f, &[[1.0f32, 0.0, 0.0]]).unwrap(),
        )
        .unwrap();
        tf.set("opacity", Data::from_slice(DataType::Float, &[1.0f32]).unwrap())
            .unwrap();
        tf.set("valueRange", Vector2::new(0.0, 1.0)).unwrap();
        tf.commit().unwrap();

        let model = VolumetricModel::new(&volume);
        model.set("transferFunction", &tf).unwrap();
        model.commit().unwrap();
        let group = Group::new();
        group.set("volume", vec![model]).unwrap();
        group.commit().unwrap();
        let instance = Instance::new(&group);
        instance.commit().unwrap();
        let world = World::new();
        world.set("instance", vec![instance]).unwrap();
        world.commit().unwrap();
        world
    }

    fn front_camera() -> Handle<Camera> {
        let camera = Camera::perspective();
        camera.set("position", Vector3::new(0.5, 0.5, -2.0)).unwrap();
        camera.set("direction", Vector3::new(0.0, 0.0, 1.0)).unwrap();
        camera.commit().unwrap();
        camera
    }

    fn accum_buffer(size: usize) -> FrameBuffer {
        FrameBuffer::new(
            size,
            size,
            FrameBufferFormat::Rgba8,
            ChannelLayout {
                accum: true,
                depth: true,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_opaque_volume_fills_center_pixel() {
        let world = red_box_world();
        let camera = front_camera();
        let renderer = Renderer::ambient_occlusion();
        renderer.commit().unwrap();

        let mut fb = accum_buffer(8);
        render_frame(&mut fb, &renderer, &camera, &world).unwrap();

        let mapped = fb.map_color();
        let center = (4 * 8 + 4) * 4;
        assert!(mapped[center] > 200, "red channel should dominate");
        assert_eq!(mapped[center + 1], 0);
        assert_eq!(mapped[center + 2], 0);
        assert_eq!(mapped[center + 3], 255);

        let depth = fb.map_depth().unwrap();
        assert!(depth[4 * 8 + 4].is_finite());
        // Corner rays miss the box entirely.
        assert_eq!(depth[0], f32::INFINITY);
    }

    #[test]
    fn test_transfer_function_selects_visible_densities() {
        // Density ramps 0 → 1 along x; only high densities are opaque.
        let volume = Volume::structured_regular();
        volume
            .set(
                "data",
                Data::from_slice_3d(
                    DataType::Float,
                    [2, 2, 2],
                    &[0.0f32, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0],
                )
                .unwrap(),
            )
            .unwrap();
        volume.commit().unwrap();

        let tf = TransferFunction::piecewise_linear();
        tf.set(
            "color",
            Data::from_slice(DataType::Vec3f, &[[1.0f32, 0.0, 0.0]]).unwrap(),
        )
        .unwrap();
        tf.set(
            "opacity",
            Data::from_slice(DataType::Float, &[0.0f32, 0.0, 1.0]).unwrap(),
        )
        .unwrap();
        tf.commit().unwrap();

        let model = VolumetricModel::new(&volume);
        model.set("transferFunction", &tf).unwrap();
        model.commit().unwrap();
        let group = Group::new();
        group.set("volume", vec![model]).unwrap();
        group.commit().unwrap();
        let instance = Instance::new(&group);
        instance.commit().unwrap();
        let world = World::new();
        world.set("instance", vec![instance]).unwrap();
        world.commit().unwrap();

        let camera = front_camera();
        let renderer = Renderer::ambient_occlusion();
        renderer.commit().unwrap();
        let mut fb = accum_buffer(8);
        render_frame(&mut fb, &renderer, &camera, &world).unwrap();

        // +x lands on the image left when looking down +z, so the dense
        // half of the ramp shows up left of center and the thin half
        // stays transparent.
        let mapped = fb.map_color();
        let alpha = |x: usize| mapped[(4 * 8 + x) * 4 + 3];
        assert!(alpha(3) > 20, "dense side should be visible");
        assert_eq!(alpha(4), 0, "thin side should stay transparent");
    }

    #[test]
    fn test_empty_world_renders_background() {
        let world = World::new();
        world.commit().unwrap();
        let camera = front_camera();
        let renderer = Renderer::ambient_occlusion();
        renderer
            .set("backgroundColor", Vector4::new(0.0, 1.0, 0.0, 1.0))
            .unwrap();
        renderer.commit().unwrap();

        let mut fb = accum_buffer(4);
        render_frame(&mut fb, &renderer, &camera, &world).unwrap();
        for pixel in fb.map_color().chunks_exact(4) {
            assert_eq!(pixel, &[0, 255, 0, 255]);
        }
    }

    #[test]
    fn test_uncommitted_renderer_leaves_buffer_untouched() {
        let world = red_box_world();
        let camera = front_camera();
        let renderer = Renderer::ambient_occlusion();

        let mut fb = accum_buffer(4);
        let err = render_frame(&mut fb, &renderer, &camera, &world).unwrap_err();
        assert!(matches!(err, Error::UncommittedState { kind: "ao" }));
        assert_eq!(fb.accumulation_count(), 0);
        assert!(fb.map_color().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_staged_camera_fails_render() {
        let world = red_box_world();
        let camera = front_camera();
        camera.set("fovy", 30.0f32).unwrap();
        let renderer = Renderer::ambient_occlusion();
        renderer.commit().unwrap();

        let mut fb = accum_buffer(4);
        let err = render_frame(&mut fb, &renderer, &camera, &world).unwrap_err();
        assert!(matches!(err, Error::UncommittedState { kind: "perspective" }));
    }

    #[test]
    fn test_accumulation_is_replayable() {
        let world = red_box_world();
        let camera = front_camera();
        let renderer = Renderer::ambient_occlusion();
        renderer.commit().unwrap();

        let mut a = accum_buffer(8);
        let mut b = accum_buffer(8);
        for _ in 0..3 {
            render_frame(&mut a, &renderer, &camera, &world).unwrap();
        }
        for _ in 0..3 {
            render_frame(&mut b, &renderer, &camera, &world).unwrap();
        }
        assert_eq!(a.map_color(), b.map_color());
    }

    #[test]
    fn test_reset_replays_from_pass_zero() {
        let world = red_box_world();
        let camera = front_camera();
        let renderer = Renderer::ambient_occlusion();
        renderer.commit().unwrap();

        let mut reference = accum_buffer(8);
        render_frame(&mut reference, &renderer, &camera, &world).unwrap();
        render_frame(&mut reference, &renderer, &camera, &world).unwrap();

        let mut fb = accum_buffer(8);
        render_frame(&mut fb, &renderer, &camera, &world).unwrap();
        fb.reset_accumulation();
        render_frame(&mut fb, &renderer, &camera, &world).unwrap();
        render_frame(&mut fb, &renderer, &camera, &world).unwrap();

        assert_eq!(fb.accumulation_count(), 2);
        assert_eq!(fb.map_color(), reference.map_color());
    }
}
