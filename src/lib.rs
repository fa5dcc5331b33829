//! # Cairn
//!
//! A retained-mode scene-graph renderer with explicit commit semantics.
//! Applications build a graph of reference-counted objects — geometries,
//! volumes, models, instances, lights, a world — set parameters on them,
//! and publish each object with [`commit`](Handle::commit). Rendering
//! reads only committed state, so a scene can be edited freely between
//! frames without tearing.
//!
//! ## Quick start
//!
//! ```no_run
//! use cairn::{
//!     Camera, ChannelLayout, Data, DataType, FrameBuffer, FrameBufferFormat,
//!     GeometricModel, Geometry, Group, Instance, Renderer, World,
//! };
//! use cgmath::Vector3;
//!
//! # fn main() -> cairn::Result<()> {
//! cairn::init(&cairn::InitOptions::default())?;
//!
//! let mesh = Geometry::mesh();
//! mesh.set(
//!     "vertex.position",
//!     Data::from_slice(DataType::Vec3f, &[[0.0f32, 0.0, 3.0], [1.0, 0.0, 3.0], [0.0, 1.0, 3.0]])?,
//! )?;
//! mesh.set("index", Data::from_slice(DataType::Vec3ui, &[[0u32, 1, 2]])?)?;
//! mesh.commit()?;
//!
//! let model = GeometricModel::new(&mesh);
//! model.commit()?;
//! let group = Group::new();
//! group.set("geometry", vec![model])?;
//! group.commit()?;
//! let instance = Instance::new(&group);
//! instance.commit()?;
//! let world = World::new();
//! world.set("instance", vec![instance])?;
//! world.commit()?;
//!
//! let camera = Camera::perspective();
//! camera.set("position", Vector3::new(0.0, 0.0, 0.0))?;
//! camera.set("direction", Vector3::new(0.0, 0.0, 1.0))?;
//! camera.commit()?;
//!
//! let renderer = Renderer::ambient_occlusion();
//! renderer.commit()?;
//!
//! let mut framebuffer = FrameBuffer::new(
//!     256,
//!     256,
//!     FrameBufferFormat::Srgba,
//!     ChannelLayout { accum: true, depth: false },
//! )?;
//! cairn::render_frame(&mut framebuffer, &renderer, &camera, &world)?;
//! let pixels = framebuffer.map_color();
//! # let _ = pixels;
//! # Ok(())
//! # }
//! ```
//!
//! ## Orientation conventions
//!
//! Camera screen coordinates put `(0, 0)` at the top-left; frame buffer
//! rows are stored bottom-first; picking puts `(0, 0)` at the bottom-left.
//! See the respective module docs.

pub mod common;
pub mod data;
pub mod error;
pub mod render;
pub mod scene;

pub use common::{Aabb, Ray};
pub use data::{Data, DataType};
pub use error::{Error, Result};
pub use render::camera::Camera;
pub use render::framebuffer::{ChannelLayout, FrameBuffer, FrameBufferFormat};
pub use render::pick::{pick, PickResult, PickedModel};
pub use render::renderer::{render_frame, Renderer};
pub use scene::geometry::Geometry;
pub use scene::group::Group;
pub use scene::instance::Instance;
pub use scene::light::Light;
pub use scene::material::Material;
pub use scene::model::{GeometricModel, VolumetricModel};
pub use scene::object::Handle;
pub use scene::transfer_function::TransferFunction;
pub use scene::volume::Volume;
pub use scene::world::World;

/// Library initialization options.
#[derive(Debug, Default)]
pub struct InitOptions {
    /// Worker threads for rendering. `None` uses one per logical core.
    pub num_threads: Option<usize>,
}

/// Initializes logging and the render thread pool. Optional — rendering
/// works without it — but a sized thread pool can only be installed before
/// the first render. Safe to call more than once; later calls cannot
/// resize the pool.
pub fn init(options: &InitOptions) -> Result<()> {
    // A host application may already have a logger; that is not an error.
    let _ = env_logger::try_init();

    if let Some(threads) = options.num_threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(|err| Error::Initialization(err.to_string()))?;
    }
    log::info!(
        "cairn {} initialized ({} render threads)",
        env!("CARGO_PKG_VERSION"),
        rayon::current_num_threads()
    );
    Ok(())
}
