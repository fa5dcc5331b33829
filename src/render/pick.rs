//! # Picking
//!
//! Maps a screen position back to the scene object visible there: the
//! nearest surface triangle, or the first point where a volume becomes
//! visible under its transfer function. Picking traces the same rays as
//! rendering, so what you see is what you pick.
//!
//! Screen coordinates follow the pick convention: `(0, 0)` is the
//! bottom-left corner of the image, matching the frame buffer's
//! bottom-row-first layout rather than the camera's top-down v axis.

use cgmath::Point3;

use crate::error::Result;
use crate::render::camera::Camera;
use crate::render::framebuffer::FrameBuffer;
use crate::render::renderer::Renderer;
use crate::render::trace;
use crate::scene::instance::Instance;
use crate::scene::model::{GeometricModel, VolumetricModel};
use crate::scene::object::{Handle, SceneObject};
use crate::scene::world::World;

/// The model a pick landed on.
pub enum PickedModel {
    Geometric(Handle<GeometricModel>),
    Volumetric(Handle<VolumetricModel>),
}

/// A successful pick.
pub struct PickResult {
    pub instance: Handle<Instance>,
    pub model: PickedModel,
    /// Triangle index for surfaces; zero for volumes.
    pub prim_id: u32,
    pub world_position: Point3<f32>,
}

/// Picks through the pixel containing screen position `(u, v)`, both in
/// `[0, 1]` with `(0, 0)` the bottom-left corner. Returns `Ok(None)` when
/// the ray escapes the scene.
pub fn pick(
    framebuffer: &FrameBuffer,
    renderer: &Handle<Renderer>,
    camera: &Handle<Camera>,
    world: &Handle<World>,
    u: f32,
    v: f32,
) -> Result<Option<PickResult>> {
    {
        let guard = renderer.read();
        guard.core().ensure_clean()?;
        guard.state()?;
    }
    let camera_state = {
        let guard = camera.read();
        guard.core().ensure_clean()?;
        guard.state()?
    };
    let scene = world.prepare()?;

    // Snap to the center of the addressed pixel, the same ray pass zero of
    // a render traces there.
    let width = framebuffer.width() as f32;
    let height = framebuffer.height() as f32;
    let px = (u.clamp(0.0, 1.0) * width).min(width - 1.0).floor();
    let py = (v.clamp(0.0, 1.0) * height).min(height - 1.0).floor();
    let ray = camera_state.ray_through(
        (px + 0.5) / width,
        // Flip to the camera's top-down axis.
        1.0 - (py + 0.5) / height,
    );

    let surface_hit = trace::nearest_surface_hit(&scene, &ray, f32::INFINITY);

    // First visible volume sample, if any volume shows up sooner.
    let mut volume_hit: Option<(f32, usize)> = None;
    for (index, pv) in scene.volumes.iter().enumerate() {
        if let Some((t_near, t_far)) = pv.world_bounds.intersect_ray(&ray) {
            let (_, first) = trace::march_volume(pv, &ray, t_near, t_far);
            if let Some(t) = first {
                if volume_hit.map_or(true, |(best, _)| t < best) {
                    volume_hit = Some((t, index));
                }
            }
        }
    }

    let surface_t = surface_hit.as_ref().map_or(f32::INFINITY, |hit| hit.t);
    let result = match volume_hit {
        Some((t, index)) if t < surface_t => {
            let pv = &scene.volumes[index];
            Some(PickResult {
                instance: pv.instance.clone(),
                model: PickedModel::Volumetric(pv.model.clone()),
                prim_id: 0,
                world_position: ray.point_at(t),
            })
        }
        _ => surface_hit.map(|hit| {
            let surface = &scene.surfaces[hit.surface_index];
            PickResult {
                instance: surface.instance.clone(),
                model: PickedModel::Geometric(surface.model.clone()),
                prim_id: hit.prim as u32,
                world_position: ray.point_at(hit.t),
            }
        }),
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Data, DataType};
    use crate::render::framebuffer::{ChannelLayout, FrameBufferFormat};
    use crate::scene::geometry::Geometry;
    use crate::scene::group::Group;
    use crate::scene::model::GeometricModel;
    use cgmath::Vector3;

    fn quad_world() -> (Handle<World>, Handle<GeometricModel>, Handle<Instance>) {
        // Unit quad in the z = 3 plane, split along the 0-3 diagonal.
        let vertices: [[f32; 3]; 4] = [
            [-1.0, -1.0, 3.0],
            [-1.0, 1.0, 3.0],
            [1.0, -1.0, 3.0],
            [1.0, 1.0, 3.0],
        ];
        let indices: [[u32; 3]; 2] = [[0, 1, 2], [1, 2, 3]];
        let mesh = Geometry::mesh();
        mesh.set(
            "vertex.position",
            Data::from_slice(DataType::Vec3f, &vertices).unwrap(),
        )
        .unwrap();
        mesh.set("index", Data::from_slice(DataType::Vec3ui, &indices).unwrap())
            .unwrap();
        mesh.commit().unwrap();

        let model = GeometricModel::new(&mesh);
        model.commit().unwrap();
        let group = Group::new();
        group.set("geometry", vec![model.clone()]).unwrap();
        group.commit().unwrap();
        let instance = Instance::new(&group);
        instance.commit().unwrap();
        let world = World::new();
        world.set("instance", vec![instance.clone()]).unwrap();
        world.commit().unwrap();
        (world, model, instance)
    }

    fn setup() -> (Handle<Renderer>, Handle<Camera>, FrameBuffer) {
        let renderer = Renderer::ambient_occlusion();
        renderer.commit().unwrap();
        let camera = Camera::perspective();
        camera.set("position", Vector3::new(0.0, 0.0, 0.0)).unwrap();
        camera.set("direction", Vector3::new(0.0, 0.0, 1.0)).unwrap();
        camera.commit().unwrap();
        let fb = FrameBuffer::new(
            64,
            64,
            FrameBufferFormat::Rgba8,
            ChannelLayout::default(),
        )
        .unwrap();
        (renderer, camera, fb)
    }

    #[test]
    fn test_center_pick_hits_quad() {
        let (world, model, instance) = quad_world();
        let (renderer, camera, fb) = setup();

        let result = pick(&fb, &renderer, &camera, &world, 0.5, 0.5)
            .unwrap()
            .expect("center of the quad should be picked");
        assert!(result.instance.same(&instance));
        match &result.model {
            PickedModel::Geometric(picked) => assert!(picked.same(&model)),
            PickedModel::Volumetric(_) => panic!("picked a volume in a surface-only world"),
        }
        // The center sits on the shared diagonal; either triangle is a
        // correct answer.
        assert!(result.prim_id < 2);
        assert!((result.world_position.z - 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_miss_returns_none() {
        let (world, _model, _instance) = quad_world();
        let (renderer, camera, fb) = setup();
        // The quad subtends well under the full field of view.
        assert!(pick(&fb, &renderer, &camera, &world, 0.02, 0.02)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_pick_v_axis_is_bottom_up() {
        // Lower half of the image only.
        let vertices: [[f32; 3]; 3] = [[-2.0, -2.0, 3.0], [2.0, -2.0, 3.0], [0.0, -0.2, 3.0]];
        let mesh = Geometry::mesh();
        mesh.set(
            "vertex.position",
            Data::from_slice(DataType::Vec3f, &vertices).unwrap(),
        )
        .unwrap();
        mesh.set(
            "index",
            Data::from_slice(DataType::Vec3ui, &[[0u32, 1, 2]]).unwrap(),
        )
        .unwrap();
        mesh.commit().unwrap();
        let model = GeometricModel::new(&mesh);
        model.commit().unwrap();
        let group = Group::new();
        group.set("geometry", vec![model]).unwrap();
        group.commit().unwrap();
        let instance = Instance::new(&group);
        instance.commit().unwrap();
        let world = World::new();
        world.set("instance", vec![instance]).unwrap();
        world.commit().unwrap();

        let (renderer, camera, fb) = setup();
        assert!(pick(&fb, &renderer, &camera, &world, 0.5, 0.2)
            .unwrap()
            .is_some());
        assert!(pick(&fb, &renderer, &camera, &world, 0.5, 0.8)
            .unwrap()
            .is_none());
    }
}
