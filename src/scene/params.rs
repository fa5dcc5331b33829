//! Parameter schemas and staged parameter storage.
//!
//! Every scene object kind declares a [`Schema`]: the parameter names it
//! understands, their types, and which of them are required at commit.
//! Values are a closed tagged union ([`ParamValue`]) over primitives, data
//! buffers, and typed object handles, so a staging call can be checked
//! against the schema synchronously.

use std::collections::HashMap;
use std::fmt;

use cgmath::{Matrix4, Vector2, Vector3, Vector4};

use crate::data::Data;
use crate::scene::geometry::Geometry;
use crate::scene::group::Group;
use crate::scene::instance::Instance;
use crate::scene::light::Light;
use crate::scene::material::Material;
use crate::scene::model::{GeometricModel, VolumetricModel};
use crate::scene::object::Handle;
use crate::scene::transfer_function::TransferFunction;
use crate::scene::volume::Volume;

/// Declared type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Bool,
    Int,
    Float,
    Vec2f,
    Vec3f,
    Vec4f,
    Transform,
    Data,
    Geometry,
    Volume,
    Group,
    Material,
    TransferFunction,
    GeometricModelList,
    VolumetricModelList,
    InstanceList,
    LightList,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::Bool => "bool",
            ParamType::Int => "int",
            ParamType::Float => "float",
            ParamType::Vec2f => "vec2f",
            ParamType::Vec3f => "vec3f",
            ParamType::Vec4f => "vec4f",
            ParamType::Transform => "transform",
            ParamType::Data => "data",
            ParamType::Geometry => "geometry",
            ParamType::Volume => "volume",
            ParamType::Group => "group",
            ParamType::Material => "material",
            ParamType::TransferFunction => "transfer function",
            ParamType::GeometricModelList => "geometric model list",
            ParamType::VolumetricModelList => "volumetric model list",
            ParamType::InstanceList => "instance list",
            ParamType::LightList => "light list",
        };
        f.write_str(name)
    }
}

/// A staged parameter value.
#[derive(Clone)]
pub enum ParamValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec2f(Vector2<f32>),
    Vec3f(Vector3<f32>),
    Vec4f(Vector4<f32>),
    Transform(Matrix4<f32>),
    Data(Data),
    Geometry(Handle<Geometry>),
    Volume(Handle<Volume>),
    Group(Handle<Group>),
    Material(Handle<Material>),
    TransferFunction(Handle<TransferFunction>),
    GeometricModels(Vec<Handle<GeometricModel>>),
    VolumetricModels(Vec<Handle<VolumetricModel>>),
    Instances(Vec<Handle<Instance>>),
    Lights(Vec<Handle<Light>>),
}

impl ParamValue {
    pub fn param_type(&self) -> ParamType {
        match self {
            ParamValue::Bool(_) => ParamType::Bool,
            ParamValue::Int(_) => ParamType::Int,
            ParamValue::Float(_) => ParamType::Float,
            ParamValue::Vec2f(_) => ParamType::Vec2f,
            ParamValue::Vec3f(_) => ParamType::Vec3f,
            ParamValue::Vec4f(_) => ParamType::Vec4f,
            ParamValue::Transform(_) => ParamType::Transform,
            ParamValue::Data(_) => ParamType::Data,
            ParamValue::Geometry(_) => ParamType::Geometry,
            ParamValue::Volume(_) => ParamType::Volume,
            ParamValue::Group(_) => ParamType::Group,
            ParamValue::Material(_) => ParamType::Material,
            ParamValue::TransferFunction(_) => ParamType::TransferFunction,
            ParamValue::GeometricModels(_) => ParamType::GeometricModelList,
            ParamValue::VolumetricModels(_) => ParamType::VolumetricModelList,
            ParamValue::Instances(_) => ParamType::InstanceList,
            ParamValue::Lights(_) => ParamType::LightList,
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}
impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v)
    }
}
impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        ParamValue::Float(v)
    }
}
impl From<Vector2<f32>> for ParamValue {
    fn from(v: Vector2<f32>) -> Self {
        ParamValue::Vec2f(v)
    }
}
impl From<Vector3<f32>> for ParamValue {
    fn from(v: Vector3<f32>) -> Self {
        ParamValue::Vec3f(v)
    }
}
impl From<Vector4<f32>> for ParamValue {
    fn from(v: Vector4<f32>) -> Self {
        ParamValue::Vec4f(v)
    }
}
impl From<Matrix4<f32>> for ParamValue {
    fn from(v: Matrix4<f32>) -> Self {
        ParamValue::Transform(v)
    }
}
impl From<Data> for ParamValue {
    fn from(v: Data) -> Self {
        ParamValue::Data(v)
    }
}
impl From<&Data> for ParamValue {
    fn from(v: &Data) -> Self {
        ParamValue::Data(v.clone())
    }
}

macro_rules! handle_param_value {
    ($object:ty, $single:ident) => {
        impl From<Handle<$object>> for ParamValue {
            fn from(v: Handle<$object>) -> Self {
                ParamValue::$single(v)
            }
        }
        impl From<&Handle<$object>> for ParamValue {
            fn from(v: &Handle<$object>) -> Self {
                ParamValue::$single(v.clone())
            }
        }
    };
    ($object:ty, $single:ident, $list:ident) => {
        handle_param_value!($object, $single);
        impl From<Vec<Handle<$object>>> for ParamValue {
            fn from(v: Vec<Handle<$object>>) -> Self {
                ParamValue::$list(v)
            }
        }
        impl From<&[Handle<$object>]> for ParamValue {
            fn from(v: &[Handle<$object>]) -> Self {
                ParamValue::$list(v.to_vec())
            }
        }
    };
}

handle_param_value!(Geometry, Geometry);
handle_param_value!(Volume, Volume);
handle_param_value!(Group, Group);
handle_param_value!(Material, Material);
handle_param_value!(TransferFunction, TransferFunction);

impl From<Vec<Handle<GeometricModel>>> for ParamValue {
    fn from(v: Vec<Handle<GeometricModel>>) -> Self {
        ParamValue::GeometricModels(v)
    }
}
impl From<Vec<Handle<VolumetricModel>>> for ParamValue {
    fn from(v: Vec<Handle<VolumetricModel>>) -> Self {
        ParamValue::VolumetricModels(v)
    }
}
impl From<Vec<Handle<Instance>>> for ParamValue {
    fn from(v: Vec<Handle<Instance>>) -> Self {
        ParamValue::Instances(v)
    }
}
impl From<Vec<Handle<Light>>> for ParamValue {
    fn from(v: Vec<Handle<Light>>) -> Self {
        ParamValue::Lights(v)
    }
}

/// One declared parameter of a kind.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub ty: ParamType,
    pub required: bool,
}

impl ParamSpec {
    pub const fn required(name: &'static str, ty: ParamType) -> Self {
        Self {
            name,
            ty,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, ty: ParamType) -> Self {
        Self {
            name,
            ty,
            required: false,
        }
    }
}

/// The parameter vocabulary of an object kind.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub kind: &'static str,
    pub params: &'static [ParamSpec],
}

impl Schema {
    pub fn lookup(&self, name: &str) -> Option<&'static ParamSpec> {
        self.params.iter().find(|spec| spec.name == name)
    }
}

/// A name → value mapping, used for both the staged and the published side
/// of an object.
#[derive(Clone, Default)]
pub struct ParamSet {
    values: HashMap<String, ParamValue>,
}

impl ParamSet {
    pub fn insert(&mut self, name: &str, value: ParamValue) {
        self.values.insert(name.to_string(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Overlay every entry of `other` onto this set.
    pub fn merge_from(&mut self, other: &ParamSet) {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), value.clone());
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn float(&self, name: &str) -> Option<f32> {
        match self.values.get(name) {
            Some(ParamValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i32> {
        match self.values.get(name) {
            Some(ParamValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn vec2f(&self, name: &str) -> Option<Vector2<f32>> {
        match self.values.get(name) {
            Some(ParamValue::Vec2f(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn vec3f(&self, name: &str) -> Option<Vector3<f32>> {
        match self.values.get(name) {
            Some(ParamValue::Vec3f(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn vec4f(&self, name: &str) -> Option<Vector4<f32>> {
        match self.values.get(name) {
            Some(ParamValue::Vec4f(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn transform(&self, name: &str) -> Option<Matrix4<f32>> {
        match self.values.get(name) {
            Some(ParamValue::Transform(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn data(&self, name: &str) -> Option<&Data> {
        match self.values.get(name) {
            Some(ParamValue::Data(v)) => Some(v),
            _ => None,
        }
    }

    pub fn geometry(&self, name: &str) -> Option<&Handle<Geometry>> {
        match self.values.get(name) {
            Some(ParamValue::Geometry(v)) => Some(v),
            _ => None,
        }
    }

    pub fn volume(&self, name: &str) -> Option<&Handle<Volume>> {
        match self.values.get(name) {
            Some(ParamValue::Volume(v)) => Some(v),
            _ => None,
        }
    }

    pub fn group(&self, name: &str) -> Option<&Handle<Group>> {
        match self.values.get(name) {
            Some(ParamValue::Group(v)) => Some(v),
            _ => None,
        }
    }

    pub fn material(&self, name: &str) -> Option<&Handle<Material>> {
        match self.values.get(name) {
            Some(ParamValue::Material(v)) => Some(v),
            _ => None,
        }
    }

    pub fn transfer_function(&self, name: &str) -> Option<&Handle<TransferFunction>> {
        match self.values.get(name) {
            Some(ParamValue::TransferFunction(v)) => Some(v),
            _ => None,
        }
    }

    pub fn geometric_models(&self, name: &str) -> &[Handle<GeometricModel>] {
        match self.values.get(name) {
            Some(ParamValue::GeometricModels(v)) => v,
            _ => &[],
        }
    }

    pub fn volumetric_models(&self, name: &str) -> &[Handle<VolumetricModel>] {
        match self.values.get(name) {
            Some(ParamValue::VolumetricModels(v)) => v,
            _ => &[],
        }
    }

    pub fn instances(&self, name: &str) -> &[Handle<Instance>] {
        match self.values.get(name) {
            Some(ParamValue::Instances(v)) => v,
            _ => &[],
        }
    }

    pub fn lights(&self, name: &str) -> &[Handle<Light>] {
        match self.values.get(name) {
            Some(ParamValue::Lights(v)) => v,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SCHEMA: Schema = Schema {
        kind: "test",
        params: &[
            ParamSpec::required("radius", ParamType::Float),
            ParamSpec::optional("color", ParamType::Vec3f),
        ],
    };

    #[test]
    fn test_schema_lookup() {
        assert!(TEST_SCHEMA.lookup("radius").is_some());
        assert!(TEST_SCHEMA.lookup("radiu").is_none());
        assert_eq!(TEST_SCHEMA.lookup("color").unwrap().ty, ParamType::Vec3f);
    }

    #[test]
    fn test_merge_overlays() {
        let mut committed = ParamSet::default();
        committed.insert("radius", ParamValue::Float(1.0));
        committed.insert("color", ParamValue::Vec3f(Vector3::new(1.0, 0.0, 0.0)));

        let mut staged = ParamSet::default();
        staged.insert("radius", ParamValue::Float(2.0));

        committed.merge_from(&staged);
        assert_eq!(committed.float("radius"), Some(2.0));
        assert_eq!(committed.vec3f("color"), Some(Vector3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_typed_getter_rejects_other_types() {
        let mut set = ParamSet::default();
        set.insert("radius", ParamValue::Float(1.0));
        assert_eq!(set.int("radius"), None);
        assert_eq!(set.float("radius"), Some(1.0));
    }
}
