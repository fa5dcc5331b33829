//! # Perspective Camera
//!
//! The "perspective" kind commits to a precomputed ray basis: the
//! direction through the top-left image corner plus the per-pixel deltas
//! along the image axes. Generating a primary ray is then two
//! multiply-adds, which matters in the per-pixel loop.
//!
//! Screen coordinates are normalized: `(0, 0)` is the top-left corner of
//! the image, `(1, 1)` the bottom-right.

use cgmath::{InnerSpace, Point3, Vector3};

use crate::common::Ray;
use crate::error::{Error, Result};
use crate::scene::object::{Handle, ObjectCore, SceneObject};
use crate::scene::params::{ParamSet, ParamSpec, ParamType, Schema};

const PERSPECTIVE_SCHEMA: Schema = Schema {
    kind: "perspective",
    params: &[
        ParamSpec::required("position", ParamType::Vec3f),
        ParamSpec::required("direction", ParamType::Vec3f),
        ParamSpec::optional("up", ParamType::Vec3f),
        ParamSpec::optional("aspect", ParamType::Float),
        ParamSpec::optional("fovy", ParamType::Float),
    ],
};

/// Committed ray basis: `dir_00` points through the top-left corner,
/// `du`/`dv` step one full image width/height.
#[derive(Clone, Copy)]
pub(crate) struct CameraState {
    position: Point3<f32>,
    dir_00: Vector3<f32>,
    du: Vector3<f32>,
    dv: Vector3<f32>,
}

impl CameraState {
    fn build(kind: &'static str, params: &ParamSet) -> Result<CameraState> {
        let position = params.vec3f("position").expect("validated required param");
        let direction = params.vec3f("direction").expect("validated required param");
        let up = params.vec3f("up").unwrap_or(Vector3::new(0.0, 1.0, 0.0));
        let aspect = params.float("aspect").unwrap_or(1.0);
        let fovy = params.float("fovy").unwrap_or(60.0);

        if direction.magnitude2() == 0.0 {
            return Err(Error::TypeMismatch {
                kind,
                name: "direction".to_string(),
                expected: "non-zero vector".to_string(),
                actual: "zero vector".to_string(),
            });
        }
        let forward = direction.normalize();
        let right = forward.cross(up);
        if right.magnitude2() < 1e-12 {
            return Err(Error::TypeMismatch {
                kind,
                name: "up".to_string(),
                expected: "vector independent of direction".to_string(),
                actual: "vector parallel to direction".to_string(),
            });
        }
        let right = right.normalize();
        let image_up = right.cross(forward);

        // Image plane at unit distance along `forward`.
        let height = 2.0 * (fovy.to_radians() * 0.5).tan();
        let width = height * aspect;
        let du = right * width;
        let dv = -image_up * height;
        let dir_00 = forward - du * 0.5 - dv * 0.5;

        Ok(CameraState {
            position: Point3::new(position.x, position.y, position.z),
            dir_00,
            du,
            dv,
        })
    }

    /// Primary ray through normalized screen point `(u, v)`, `v = 0` at
    /// the image top.
    pub(crate) fn ray_through(&self, u: f32, v: f32) -> Ray {
        Ray::new(self.position, self.dir_00 + self.du * u + self.dv * v)
    }
}

/// Viewpoint for rendering and picking.
pub struct Camera {
    core: ObjectCore,
    state: Option<CameraState>,
}

impl Camera {
    /// Creates an (uncommitted) perspective camera.
    pub fn perspective() -> Handle<Camera> {
        Handle::new(Camera {
            core: ObjectCore::new(&PERSPECTIVE_SCHEMA),
            state: None,
        })
    }

    pub(crate) fn state(&self) -> Result<CameraState> {
        self.state.ok_or(Error::UncommittedState {
            kind: self.core.kind(),
        })
    }
}

impl SceneObject for Camera {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn rebuild(&mut self, params: &ParamSet) -> Result<()> {
        self.state = Some(CameraState::build(self.core.kind(), params)?);
        Ok(())
    }
}
