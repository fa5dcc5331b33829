//! Surface materials. The "obj" material carries a diffuse base color and
//! opacity; a geometric model falls back to it when the mesh has no
//! per-vertex colors.

use cgmath::{Vector3, Vector4};

use crate::error::Result;
use crate::scene::object::{Handle, ObjectCore, SceneObject};
use crate::scene::params::{ParamSet, ParamSpec, ParamType, Schema};

const OBJ_SCHEMA: Schema = Schema {
    kind: "obj",
    params: &[
        ParamSpec::optional("kd", ParamType::Vec3f),
        ParamSpec::optional("d", ParamType::Float),
    ],
};

#[derive(Clone, Copy)]
pub(crate) struct MaterialState {
    pub(crate) base_color: Vector4<f32>,
}

pub struct Material {
    core: ObjectCore,
    state: Option<MaterialState>,
}

impl Material {
    /// Creates an OBJ-style material. `kd` is the diffuse color, `d` the
    /// opacity, both with the usual defaults.
    pub fn obj() -> Handle<Material> {
        Handle::new(Material {
            core: ObjectCore::new(&OBJ_SCHEMA),
            state: None,
        })
    }

    pub(crate) fn state(&self) -> Result<&MaterialState> {
        self.state
            .as_ref()
            .ok_or(crate::error::Error::UncommittedState {
                kind: self.core.kind(),
            })
    }
}

impl SceneObject for Material {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn rebuild(&mut self, params: &ParamSet) -> Result<()> {
        let kd = params.vec3f("kd").unwrap_or(Vector3::new(0.8, 0.8, 0.8));
        let d = params.float("d").unwrap_or(1.0).clamp(0.0, 1.0);
        self.state = Some(MaterialState {
            base_color: Vector4::new(kd.x, kd.y, kd.z, d),
        });
        Ok(())
    }
}
