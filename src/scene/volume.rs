//! # Structured Regular Volumes
//!
//! The "structuredRegular" kind places a 3-D scalar grid into object space:
//! voxel `(x, y, z)` sits at `gridOrigin + gridSpacing * (x, y, z)`, and
//! the field between voxel centers is reconstructed by trilinear
//! interpolation. The grid data is a [`Data`](crate::data::Data) buffer, so
//! a volume can sample a caller-owned file mapping in place.

use cgmath::{ElementWise, Point3, Vector3};

use crate::common::Aabb;
use crate::data::{Data, DataType};
use crate::error::{Error, Result};
use crate::scene::object::{Handle, ObjectCore, SceneObject};
use crate::scene::params::{ParamSet, ParamSpec, ParamType, Schema};

const STRUCTURED_REGULAR_SCHEMA: Schema = Schema {
    kind: "structuredRegular",
    params: &[
        ParamSpec::required("data", ParamType::Data),
        ParamSpec::optional("gridOrigin", ParamType::Vec3f),
        ParamSpec::optional("gridSpacing", ParamType::Vec3f),
    ],
};

/// Published voxel grid. Holds a reference to the voxel buffer, never a
/// copy.
#[derive(Debug, Clone)]
pub(crate) struct VolumeState {
    data: Data,
    dims: [usize; 3],
    origin: Vector3<f32>,
    spacing: Vector3<f32>,
    pub(crate) bounds: Aabb,
}

impl VolumeState {
    fn build(kind: &'static str, params: &ParamSet) -> Result<VolumeState> {
        let data = params.data("data").expect("validated required param");
        if !data.data_type().is_scalar() {
            return Err(Error::TypeMismatch {
                kind,
                name: "data".to_string(),
                expected: "scalar data".to_string(),
                actual: format!("{} data", data.data_type()),
            });
        }
        let dims = data.extents();
        let origin = params
            .vec3f("gridOrigin")
            .unwrap_or(Vector3::new(0.0, 0.0, 0.0));
        let spacing = params
            .vec3f("gridSpacing")
            .unwrap_or(Vector3::new(1.0, 1.0, 1.0));

        // The field is defined on voxel centers; the last center is at
        // origin + spacing * (dims - 1).
        let extent = Vector3::new(
            spacing.x * (dims[0] - 1) as f32,
            spacing.y * (dims[1] - 1) as f32,
            spacing.z * (dims[2] - 1) as f32,
        );
        let lower = Point3::new(origin.x, origin.y, origin.z);
        let bounds = Aabb {
            lower,
            upper: lower + extent,
        };

        Ok(VolumeState {
            data: data.clone(),
            dims,
            origin,
            spacing,
            bounds,
        })
    }

    /// Smallest voxel spacing, the natural base step for ray marching.
    pub(crate) fn min_spacing(&self) -> f32 {
        self.spacing.x.min(self.spacing.y).min(self.spacing.z)
    }

    /// Trilinearly interpolated field value at an object-space point.
    /// Points outside the grid sample to zero.
    pub(crate) fn sample_object(&self, p: Point3<f32>) -> f32 {
        let g = (p - Point3::new(self.origin.x, self.origin.y, self.origin.z))
            .div_element_wise(self.spacing);
        if g.x < 0.0
            || g.y < 0.0
            || g.z < 0.0
            || g.x > (self.dims[0] - 1) as f32
            || g.y > (self.dims[1] - 1) as f32
            || g.z > (self.dims[2] - 1) as f32
        {
            return 0.0;
        }

        // Single-voxel extents collapse the interpolation along that axis.
        let lo = |g: f32, dim: usize| (g as usize).min(dim.saturating_sub(2));
        let x0 = lo(g.x, self.dims[0]);
        let y0 = lo(g.y, self.dims[1]);
        let z0 = lo(g.z, self.dims[2]);
        let x1 = (x0 + 1).min(self.dims[0] - 1);
        let y1 = (y0 + 1).min(self.dims[1] - 1);
        let z1 = (z0 + 1).min(self.dims[2] - 1);
        let fx = g.x - x0 as f32;
        let fy = g.y - y0 as f32;
        let fz = g.z - z0 as f32;

        let c000 = self.data.scalar_at_3d(x0, y0, z0);
        let c100 = self.data.scalar_at_3d(x1, y0, z0);
        let c010 = self.data.scalar_at_3d(x0, y1, z0);
        let c110 = self.data.scalar_at_3d(x1, y1, z0);
        let c001 = self.data.scalar_at_3d(x0, y0, z1);
        let c101 = self.data.scalar_at_3d(x1, y0, z1);
        let c011 = self.data.scalar_at_3d(x0, y1, z1);
        let c111 = self.data.scalar_at_3d(x1, y1, z1);

        let c00 = c000 * (1.0 - fx) + c100 * fx;
        let c10 = c010 * (1.0 - fx) + c110 * fx;
        let c01 = c001 * (1.0 - fx) + c101 * fx;
        let c11 = c011 * (1.0 - fx) + c111 * fx;
        let c0 = c00 * (1.0 - fy) + c10 * fy;
        let c1 = c01 * (1.0 - fy) + c11 * fy;
        c0 * (1.0 - fz) + c1 * fz
    }
}

/// A scalar field sampled over a region of space.
pub struct Volume {
    core: ObjectCore,
    state: Option<VolumeState>,
}

impl Volume {
    /// Creates an (uncommitted) structured regular volume.
    pub fn structured_regular() -> Handle<Volume> {
        Handle::new(Volume {
            core: ObjectCore::new(&STRUCTURED_REGULAR_SCHEMA),
            state: None,
        })
    }

    pub(crate) fn state(&self) -> Result<&VolumeState> {
        self.state.as_ref().ok_or(Error::UncommittedState {
            kind: self.core.kind(),
        })
    }
}

impl SceneObject for Volume {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn rebuild(&mut self, params: &ParamSet) -> Result<()> {
        self.state = Some(VolumeState::build(self.core.kind(), params)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_volume() -> Handle<Volume> {
        // 2x2x2 grid: value equals the x grid coordinate.
        let voxels: [f32; 8] = [0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0];
        let volume = Volume::structured_regular();
        volume
            .set(
                "data",
                Data::from_slice_3d(DataType::Float, [2, 2, 2], &voxels).unwrap(),
            )
            .unwrap();
        volume.commit().unwrap();
        volume
    }

    #[test]
    fn test_bounds_span_voxel_centers() {
        let voxels = vec![0u8; 3 * 4 * 5];
        let volume = Volume::structured_regular();
        volume
            .set(
                "data",
                Data::from_slice_3d(DataType::UChar, [3, 4, 5], &voxels).unwrap(),
            )
            .unwrap();
        volume.set("gridOrigin", Vector3::new(-1.0, -1.0, 2.0)).unwrap();
        volume.set("gridSpacing", Vector3::new(0.5, 1.0, 2.0)).unwrap();
        volume.commit().unwrap();

        let guard = volume.read();
        let bounds = &guard.state().unwrap().bounds;
        assert_eq!(bounds.lower, Point3::new(-1.0, -1.0, 2.0));
        assert_eq!(bounds.upper, Point3::new(0.0, 2.0, 10.0));
    }

    #[test]
    fn test_trilinear_ramp() {
        let volume = ramp_volume();
        let guard = volume.read();
        let state = guard.state().unwrap();
        assert_eq!(state.sample_object(Point3::new(0.0, 0.5, 0.5)), 0.0);
        assert_eq!(state.sample_object(Point3::new(1.0, 0.5, 0.5)), 1.0);
        assert!((state.sample_object(Point3::new(0.25, 0.5, 0.5)) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_outside_samples_to_zero() {
        let volume = ramp_volume();
        let guard = volume.read();
        let state = guard.state().unwrap();
        assert_eq!(state.sample_object(Point3::new(-0.1, 0.5, 0.5)), 0.0);
        assert_eq!(state.sample_object(Point3::new(0.5, 0.5, 1.1)), 0.0);
    }

    #[test]
    fn test_vector_voxels_rejected() {
        let volume = Volume::structured_regular();
        volume
            .set(
                "data",
                Data::from_slice_3d(
                    DataType::Vec3f,
                    [2, 2, 2],
                    &[[0.0f32, 0.0, 0.0]; 8],
                )
                .unwrap(),
            )
            .unwrap();
        let err = volume.commit().unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_single_plane_grid_samples_in_plane() {
        let volume = Volume::structured_regular();
        volume
            .set(
                "data",
                Data::from_slice_3d(DataType::Float, [2, 2, 1], &[1.0f32, 2.0, 3.0, 4.0])
                    .unwrap(),
            )
            .unwrap();
        volume.commit().unwrap();
        let guard = volume.read();
        let state = guard.state().unwrap();
        assert_eq!(state.sample_object(Point3::new(0.0, 0.0, 0.0)), 1.0);
        assert_eq!(state.sample_object(Point3::new(1.0, 1.0, 0.0)), 4.0);
        // The degenerate axis still rejects points off the plane.
        assert_eq!(state.sample_object(Point3::new(0.5, 0.5, 0.5)), 0.0);
    }
}
