//! # Models
//!
//! A model pairs raw shape data with its appearance: a geometric model
//! binds a geometry to a material, a volumetric model binds a volume to a
//! transfer function and a sampling rate. Model state holds *handles* to
//! its children, so recommitting a child (say, swapping a transfer
//! function's control points) is picked up by the next render without
//! recommitting the model.

use crate::error::{Error, Result};
use crate::scene::geometry::Geometry;
use crate::scene::material::Material;
use crate::scene::object::{Handle, ObjectCore, SceneObject};
use crate::scene::params::{ParamSet, ParamSpec, ParamType, Schema};
use crate::scene::transfer_function::TransferFunction;
use crate::scene::volume::Volume;

const GEOMETRIC_SCHEMA: Schema = Schema {
    kind: "geometric model",
    params: &[
        ParamSpec::required("geometry", ParamType::Geometry),
        ParamSpec::optional("material", ParamType::Material),
    ],
};

const VOLUMETRIC_SCHEMA: Schema = Schema {
    kind: "volumetric model",
    params: &[
        ParamSpec::required("volume", ParamType::Volume),
        ParamSpec::required("transferFunction", ParamType::TransferFunction),
        ParamSpec::optional("samplingRate", ParamType::Float),
    ],
};

// Sampling rates at or below this would make the marching step unbounded.
const MIN_SAMPLING_RATE: f32 = 1e-3;

#[derive(Clone)]
pub(crate) struct GeometricModelState {
    pub(crate) geometry: Handle<Geometry>,
    pub(crate) material: Option<Handle<Material>>,
}

/// A renderable surface: geometry plus appearance.
pub struct GeometricModel {
    core: ObjectCore,
    state: Option<GeometricModelState>,
}

impl GeometricModel {
    /// Creates a model over `geometry`. The handle is staged, so the model
    /// still needs a commit.
    pub fn new(geometry: &Handle<Geometry>) -> Handle<GeometricModel> {
        let model = Handle::new(GeometricModel {
            core: ObjectCore::new(&GEOMETRIC_SCHEMA),
            state: None,
        });
        model
            .set("geometry", geometry)
            .expect("schema accepts geometry");
        model
    }

    pub(crate) fn state(&self) -> Result<&GeometricModelState> {
        self.state.as_ref().ok_or(Error::UncommittedState {
            kind: self.core.kind(),
        })
    }
}

impl SceneObject for GeometricModel {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn rebuild(&mut self, params: &ParamSet) -> Result<()> {
        self.state = Some(GeometricModelState {
            geometry: params
                .geometry("geometry")
                .expect("validated required param")
                .clone(),
            material: params.material("material").cloned(),
        });
        Ok(())
    }
}

#[derive(Clone)]
pub(crate) struct VolumetricModelState {
    pub(crate) volume: Handle<Volume>,
    pub(crate) transfer_function: Handle<TransferFunction>,
    pub(crate) sampling_rate: f32,
}

/// A renderable volume: voxel field plus transfer function.
pub struct VolumetricModel {
    core: ObjectCore,
    state: Option<VolumetricModelState>,
}

impl VolumetricModel {
    /// Creates a model over `volume`. A `transferFunction` must be set
    /// before the model commits.
    pub fn new(volume: &Handle<Volume>) -> Handle<VolumetricModel> {
        let model = Handle::new(VolumetricModel {
            core: ObjectCore::new(&VOLUMETRIC_SCHEMA),
            state: None,
        });
        model.set("volume", volume).expect("schema accepts volume");
        model
    }

    pub(crate) fn state(&self) -> Result<&VolumetricModelState> {
        self.state.as_ref().ok_or(Error::UncommittedState {
            kind: self.core.kind(),
        })
    }
}

impl SceneObject for VolumetricModel {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn rebuild(&mut self, params: &ParamSet) -> Result<()> {
        let rate = params.float("samplingRate").unwrap_or(1.0);
        self.state = Some(VolumetricModelState {
            volume: params
                .volume("volume")
                .expect("validated required param")
                .clone(),
            transfer_function: params
                .transfer_function("transferFunction")
                .expect("validated required param")
                .clone(),
            sampling_rate: rate.max(MIN_SAMPLING_RATE),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Data, DataType};
    use cgmath::Vector2;

    fn committed_mesh() -> Handle<Geometry> {
        let mesh = Geometry::mesh();
        mesh.set(
            "vertex.position",
            Data::from_slice(DataType::Vec3f, &[[0.0f32, 0.0, 0.0]; 3]).unwrap(),
        )
        .unwrap();
        mesh.set(
            "index",
            Data::from_slice(DataType::Vec3ui, &[[0u32, 1, 2]]).unwrap(),
        )
        .unwrap();
        mesh.commit().unwrap();
        mesh
    }

    #[test]
    fn test_geometric_model_tracks_child_handle() {
        let mesh = committed_mesh();
        let model = GeometricModel::new(&mesh);
        model.commit().unwrap();
        assert!(model.read().state().unwrap().geometry.same(&mesh));
        assert!(model.read().state().unwrap().material.is_none());
    }

    #[test]
    fn test_volumetric_model_requires_transfer_function() {
        let volume = Volume::structured_regular();
        volume
            .set(
                "data",
                Data::from_slice_3d(DataType::Float, [2, 2, 2], &[0.0f32; 8]).unwrap(),
            )
            .unwrap();
        volume.commit().unwrap();

        let model = VolumetricModel::new(&volume);
        let err = model.commit().unwrap_err();
        match err {
            Error::MissingRequiredParameter { name, .. } => {
                assert_eq!(name, "transferFunction")
            }
            other => panic!("expected MissingRequiredParameter, got {other:?}"),
        }

        let tf = TransferFunction::piecewise_linear();
        tf.set("color", Data::from_slice(DataType::Vec3f, &[[1.0f32; 3]]).unwrap())
            .unwrap();
        tf.set("opacity", Data::from_slice(DataType::Float, &[1.0f32]).unwrap())
            .unwrap();
        tf.set("valueRange", Vector2::new(0.0, 1.0)).unwrap();
        tf.commit().unwrap();

        model.set("transferFunction", &tf).unwrap();
        model.commit().unwrap();
        assert_eq!(model.read().state().unwrap().sampling_rate, 1.0);
    }

    #[test]
    fn test_sampling_rate_floor() {
        let volume = Volume::structured_regular();
        volume
            .set(
                "data",
                Data::from_slice_3d(DataType::Float, [2, 2, 2], &[0.0f32; 8]).unwrap(),
            )
            .unwrap();
        volume.commit().unwrap();
        let tf = TransferFunction::piecewise_linear();
        tf.set("color", Data::from_slice(DataType::Vec3f, &[[1.0f32; 3]]).unwrap())
            .unwrap();
        tf.set("opacity", Data::from_slice(DataType::Float, &[1.0f32]).unwrap())
            .unwrap();
        tf.commit().unwrap();

        let model = VolumetricModel::new(&volume);
        model.set("transferFunction", &tf).unwrap();
        model.set("samplingRate", 0.0f32).unwrap();
        model.commit().unwrap();
        assert_eq!(model.read().state().unwrap().sampling_rate, MIN_SAMPLING_RATE);
    }
}
