//! # World
//!
//! The world is the root of the scene graph: a list of instances and a
//! list of lights. Rendering and picking never walk the graph of handles
//! directly; they work from a [`PreparedScene`], a flattened snapshot the
//! world builds lazily and caches.
//!
//! ## Cache validity
//!
//! Every committed object carries a generation counter. A prepared scene
//! records a fingerprint over the `(identity, generation)` pairs of every
//! object reachable from the world, so recommitting *any* of them — a
//! transfer function three levels down included — invalidates the cache
//! and the next render rebuilds. Objects with staged-but-uncommitted
//! parameters fail the walk with [`Error::UncommittedState`] instead of
//! rendering stale values.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use cgmath::{Matrix, Matrix3, Matrix4, SquareMatrix, Vector3, Vector4};

use crate::common::Aabb;
use crate::error::{Error, Result};
use crate::scene::geometry::MeshState;
use crate::scene::instance::Instance;
use crate::scene::light::Light;
use crate::scene::model::{GeometricModel, VolumetricModel};
use crate::scene::object::{Handle, ObjectCore, SceneObject};
use crate::scene::params::{ParamSet, ParamSpec, ParamType, Schema};
use crate::scene::transfer_function::TransferFunctionState;
use crate::scene::volume::VolumeState;

const WORLD_SCHEMA: Schema = Schema {
    kind: "world",
    params: &[
        ParamSpec::optional("instance", ParamType::InstanceList),
        ParamSpec::optional("light", ParamType::LightList),
    ],
};

#[derive(Clone, Default)]
struct WorldState {
    instances: Vec<Handle<Instance>>,
    lights: Vec<Handle<Light>>,
}

/// One surface flattened out of the graph: mesh snapshot, resolved base
/// color, and the instance transform with its derived matrices.
#[derive(Debug)]
pub(crate) struct PreparedSurface {
    pub(crate) instance: Handle<Instance>,
    pub(crate) model: Handle<GeometricModel>,
    pub(crate) mesh: MeshState,
    pub(crate) base_color: Vector4<f32>,
    pub(crate) transform: Matrix4<f32>,
    pub(crate) inverse: Matrix4<f32>,
    /// Inverse-transpose of the linear part, for transforming normals.
    pub(crate) normal_matrix: Matrix3<f32>,
    pub(crate) world_bounds: Aabb,
}

/// One volume flattened out of the graph.
#[derive(Debug)]
pub(crate) struct PreparedVolume {
    pub(crate) instance: Handle<Instance>,
    pub(crate) model: Handle<VolumetricModel>,
    pub(crate) volume: VolumeState,
    pub(crate) transfer_function: TransferFunctionState,
    pub(crate) sampling_rate: f32,
    pub(crate) transform: Matrix4<f32>,
    pub(crate) inverse: Matrix4<f32>,
    pub(crate) world_bounds: Aabb,
}

/// Flattened, immutable snapshot of a committed world.
#[derive(Debug)]
pub(crate) struct PreparedScene {
    pub(crate) surfaces: Vec<PreparedSurface>,
    pub(crate) volumes: Vec<PreparedVolume>,
    /// Summed radiance of all ambient lights; white when the world has no
    /// lights at all.
    pub(crate) ambient: Vector3<f32>,
    pub(crate) bounds: Aabb,
    pub(crate) fingerprint: u64,
}

/// Root scene container.
pub struct World {
    core: ObjectCore,
    state: Option<WorldState>,
    cache: Option<Arc<PreparedScene>>,
}

impl World {
    pub fn new() -> Handle<World> {
        Handle::new(World {
            core: ObjectCore::new(&WORLD_SCHEMA),
            state: None,
            cache: None,
        })
    }

    fn state(&self) -> Result<&WorldState> {
        self.state.as_ref().ok_or(Error::UncommittedState {
            kind: self.core.kind(),
        })
    }

    /// Walks every reachable object, checking it is committed and clean,
    /// and folds `(identity, generation)` pairs into a fingerprint.
    fn fingerprint(&self) -> Result<u64> {
        let mut hasher = DefaultHasher::new();
        let mut visit = |token: usize, generation: u64| {
            token.hash(&mut hasher);
            generation.hash(&mut hasher);
        };

        self.core.ensure_clean()?;
        visit(self as *const World as usize, self.core.generation());

        let state = self.state()?;
        for light in &state.lights {
            let guard = light.read();
            guard.core().ensure_clean()?;
            visit(light.token(), guard.core().generation());
        }
        for instance in &state.instances {
            let inst_guard = instance.read();
            inst_guard.core().ensure_clean()?;
            visit(instance.token(), inst_guard.core().generation());

            let group = inst_guard.state()?.group.clone();
            let group_guard = group.read();
            group_guard.core().ensure_clean()?;
            visit(group.token(), group_guard.core().generation());
            let group_state = group_guard.state()?;

            for model in &group_state.geometric {
                let model_guard = model.read();
                model_guard.core().ensure_clean()?;
                visit(model.token(), model_guard.core().generation());
                let model_state = model_guard.state()?;

                let geometry = &model_state.geometry;
                let geo_guard = geometry.read();
                geo_guard.core().ensure_clean()?;
                visit(geometry.token(), geo_guard.core().generation());

                if let Some(material) = &model_state.material {
                    let mat_guard = material.read();
                    mat_guard.core().ensure_clean()?;
                    visit(material.token(), mat_guard.core().generation());
                }
            }
            for model in &group_state.volumetric {
                let model_guard = model.read();
                model_guard.core().ensure_clean()?;
                visit(model.token(), model_guard.core().generation());
                let model_state = model_guard.state()?;

                let volume = &model_state.volume;
                let vol_guard = volume.read();
                vol_guard.core().ensure_clean()?;
                visit(volume.token(), vol_guard.core().generation());

                let tf = &model_state.transfer_function;
                let tf_guard = tf.read();
                tf_guard.core().ensure_clean()?;
                visit(tf.token(), tf_guard.core().generation());
            }
        }
        Ok(hasher.finish())
    }

    fn build_prepared(&self, fingerprint: u64) -> Result<PreparedScene> {
        let state = self.state()?;
        let mut surfaces = Vec::new();
        let mut volumes = Vec::new();
        let mut bounds = Aabb::empty();

        for instance in &state.instances {
            let inst_guard = instance.read();
            let inst_state = inst_guard.state()?;
            let transform = inst_state.transform;
            let Some(inverse) = transform.invert() else {
                log::warn!("skipping instance with singular transform");
                continue;
            };
            let linear = Matrix3::from_cols(
                transform.x.truncate(),
                transform.y.truncate(),
                transform.z.truncate(),
            );
            let normal_matrix = linear
                .invert()
                .map(|inv| inv.transpose())
                .unwrap_or_else(Matrix3::identity);

            let group = inst_state.group.clone();
            let group_guard = group.read();
            let group_state = group_guard.state()?;

            for model in &group_state.geometric {
                let model_guard = model.read();
                let model_state = model_guard.state()?;
                let mesh = model_state.geometry.read().state()?.clone();
                let base_color = match &model_state.material {
                    Some(material) => material.read().state()?.base_color,
                    None => Vector4::new(0.8, 0.8, 0.8, 1.0),
                };
                let world_bounds = mesh.bounds.transformed(&transform);
                bounds = bounds.union(&world_bounds);
                surfaces.push(PreparedSurface {
                    instance: instance.clone(),
                    model: model.clone(),
                    mesh,
                    base_color,
                    transform,
                    inverse,
                    normal_matrix,
                    world_bounds,
                });
            }
            for model in &group_state.volumetric {
                let model_guard = model.read();
                let model_state = model_guard.state()?;
                let volume = model_state.volume.read().state()?.clone();
                let transfer_function =
                    model_state.transfer_function.read().state()?.clone();
                let world_bounds = volume.bounds.transformed(&transform);
                bounds = bounds.union(&world_bounds);
                volumes.push(PreparedVolume {
                    instance: instance.clone(),
                    model: model.clone(),
                    volume,
                    transfer_function,
                    sampling_rate: model_state.sampling_rate,
                    transform,
                    inverse,
                    world_bounds,
                });
            }
        }

        let ambient = if state.lights.is_empty() {
            Vector3::new(1.0, 1.0, 1.0)
        } else {
            let mut sum = Vector3::new(0.0, 0.0, 0.0);
            for light in &state.lights {
                sum += light.read().state()?.radiance();
            }
            sum
        };

        log::debug!(
            "prepared scene: {} surfaces, {} volumes, bounds {:?}..{:?}",
            surfaces.len(),
            volumes.len(),
            bounds.lower,
            bounds.upper
        );
        Ok(PreparedScene {
            surfaces,
            volumes,
            ambient,
            bounds,
            fingerprint,
        })
    }
}

impl Handle<World> {
    /// World-space bounds of everything reachable from the world. Empty
    /// bounds (lower > upper) mean an empty world.
    pub fn bounds(&self) -> Result<Aabb> {
        Ok(self.prepare()?.bounds)
    }

    /// Returns the cached flattened scene, rebuilding it when any
    /// reachable object was recommitted since the last build.
    pub(crate) fn prepare(&self) -> Result<Arc<PreparedScene>> {
        let fingerprint = {
            let guard = self.read();
            let fingerprint = guard.fingerprint()?;
            if let Some(cache) = &guard.cache {
                if cache.fingerprint == fingerprint {
                    return Ok(Arc::clone(cache));
                }
            }
            fingerprint
        };

        let prepared = Arc::new(self.read().build_prepared(fingerprint)?);
        self.write().cache = Some(Arc::clone(&prepared));
        Ok(prepared)
    }
}

impl SceneObject for World {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn rebuild(&mut self, params: &ParamSet) -> Result<()> {
        self.state = Some(WorldState {
            instances: params.instances("instance").to_vec(),
            lights: params.lights("light").to_vec(),
        });
        self.cache = None;
        Ok(())
    }
}
