//! Light kinds. Only the ambient light exists for now; it feeds the
//! ambient-occlusion renderer's constant illumination term.

use cgmath::Vector3;

use crate::error::Result;
use crate::scene::object::{Handle, ObjectCore, SceneObject};
use crate::scene::params::{ParamSet, ParamSpec, ParamType, Schema};

const AMBIENT_SCHEMA: Schema = Schema {
    kind: "ambient",
    params: &[
        ParamSpec::optional("color", ParamType::Vec3f),
        ParamSpec::optional("intensity", ParamType::Float),
    ],
};

#[derive(Clone, Copy)]
pub(crate) struct LightState {
    color: Vector3<f32>,
    intensity: f32,
}

impl LightState {
    pub(crate) fn radiance(&self) -> Vector3<f32> {
        self.color * self.intensity
    }
}

/// A light source placed into a [`World`](crate::scene::world::World).
pub struct Light {
    core: ObjectCore,
    state: Option<LightState>,
}

impl Light {
    /// Creates an ambient light: uniform radiance from every direction.
    pub fn ambient() -> Handle<Light> {
        Handle::new(Light {
            core: ObjectCore::new(&AMBIENT_SCHEMA),
            state: None,
        })
    }

    pub(crate) fn state(&self) -> Result<&LightState> {
        debug_assert!(
            self.core.is_committed(),
            "light parameters read before commit"
        );
        self.state
            .as_ref()
            .ok_or(crate::error::Error::UncommittedState {
                kind: self.core.kind(),
            })
    }
}

impl SceneObject for Light {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn rebuild(&mut self, params: &ParamSet) -> Result<()> {
        self.state = Some(LightState {
            color: params.vec3f("color").unwrap_or(Vector3::new(1.0, 1.0, 1.0)),
            intensity: params.float("intensity").unwrap_or(1.0),
        });
        Ok(())
    }
}
