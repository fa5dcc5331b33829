//! # Transfer Functions
//!
//! A transfer function maps a scalar volume sample to a color and an
//! opacity. The "piecewiseLinear" kind owns an ordered color sequence and
//! an ordered opacity sequence, each spread evenly over an explicit
//! `[min, max]` value domain: sample `i` of a sequence of length `N` sits
//! at `min + i * (max - min) / (N - 1)`.
//!
//! The lookup is deterministic — the same scalar always maps to the same
//! color — which accumulation depends on: samples from different passes
//! must agree on what a given density looks like.

use cgmath::{Vector2, Vector3, Vector4};

use crate::data::DataType;
use crate::error::{Error, Result};
use crate::scene::object::{Handle, ObjectCore, SceneObject};
use crate::scene::params::{ParamSet, ParamSpec, ParamType, Schema};

const PIECEWISE_LINEAR_SCHEMA: Schema = Schema {
    kind: "piecewiseLinear",
    params: &[
        ParamSpec::required("color", ParamType::Data),
        ParamSpec::required("opacity", ParamType::Data),
        ParamSpec::optional("valueRange", ParamType::Vec2f),
    ],
};

/// Published control points. The sequences are copied out of their buffers
/// at commit; they are small and the ray marcher reads them per sample.
#[derive(Debug, Clone)]
pub(crate) struct TransferFunctionState {
    colors: Vec<Vector3<f32>>,
    opacities: Vec<f32>,
    range: Vector2<f32>,
}

impl TransferFunctionState {
    /// Maps a scalar to (RGB, opacity). Clamps to the domain; a degenerate
    /// `max == min` domain returns the first sample for every input.
    pub(crate) fn lookup(&self, sample: f32) -> Vector4<f32> {
        let (lo, hi) = (self.range.x, self.range.y);
        let t = if hi > lo {
            ((sample - lo) / (hi - lo)).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let rgb = lerp_vec3(&self.colors, t);
        let alpha = lerp_scalar(&self.opacities, t);
        Vector4::new(rgb.x, rgb.y, rgb.z, alpha)
    }
}

fn lerp_scalar(samples: &[f32], t: f32) -> f32 {
    if samples.len() == 1 {
        return samples[0];
    }
    let u = t * (samples.len() - 1) as f32;
    let i = (u as usize).min(samples.len() - 2);
    let frac = u - i as f32;
    samples[i] * (1.0 - frac) + samples[i + 1] * frac
}

fn lerp_vec3(samples: &[Vector3<f32>], t: f32) -> Vector3<f32> {
    if samples.len() == 1 {
        return samples[0];
    }
    let u = t * (samples.len() - 1) as f32;
    let i = (u as usize).min(samples.len() - 2);
    let frac = u - i as f32;
    samples[i] * (1.0 - frac) + samples[i + 1] * frac
}

/// Piecewise-linear scalar → color+opacity mapping.
pub struct TransferFunction {
    core: ObjectCore,
    state: Option<TransferFunctionState>,
}

impl TransferFunction {
    pub fn piecewise_linear() -> Handle<TransferFunction> {
        Handle::new(TransferFunction {
            core: ObjectCore::new(&PIECEWISE_LINEAR_SCHEMA),
            state: None,
        })
    }

    pub(crate) fn state(&self) -> Result<&TransferFunctionState> {
        self.state.as_ref().ok_or(Error::UncommittedState {
            kind: self.core.kind(),
        })
    }
}

impl Handle<TransferFunction> {
    /// Committed lookup, exposed for callers that want to inspect the
    /// mapping the renderer will apply.
    pub fn lookup(&self, sample: f32) -> Result<Vector4<f32>> {
        let guard = self.read();
        Ok(guard.state()?.lookup(sample))
    }
}

impl SceneObject for TransferFunction {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn rebuild(&mut self, params: &ParamSet) -> Result<()> {
        let kind = self.core.kind();

        let color_data = params.data("color").expect("validated required param");
        if color_data.data_type() != DataType::Vec3f {
            return Err(Error::TypeMismatch {
                kind,
                name: "color".to_string(),
                expected: "vec3f data".to_string(),
                actual: format!("{} data", color_data.data_type()),
            });
        }
        let opacity_data = params.data("opacity").expect("validated required param");
        if opacity_data.data_type() != DataType::Float {
            return Err(Error::TypeMismatch {
                kind,
                name: "opacity".to_string(),
                expected: "float data".to_string(),
                actual: format!("{} data", opacity_data.data_type()),
            });
        }

        let colors: Vec<Vector3<f32>> = (0..color_data.element_count())
            .map(|i| color_data.vec3f_at(i))
            .collect();
        let opacities: Vec<f32> = (0..opacity_data.element_count())
            .map(|i| opacity_data.scalar_at(i))
            .collect();

        self.state = Some(TransferFunctionState {
            colors,
            opacities,
            range: params.vec2f("valueRange").unwrap_or(Vector2::new(0.0, 1.0)),
        });
        Ok(())
    }
}
