//! # Triangle Mesh Geometry
//!
//! The "mesh" kind binds a vertex position buffer, a triangle index buffer,
//! and an optional per-vertex color buffer. Commit validates the buffer
//! element types and every index against the vertex count, so the renderer
//! can walk triangles without bounds checks.

use cgmath::{Vector3, Vector4};

use crate::common::Aabb;
use crate::data::{Data, DataType};
use crate::error::{Error, Result};
use crate::scene::material::Material;
use crate::scene::object::{Handle, ObjectCore, SceneObject};
use crate::scene::params::{ParamSet, ParamSpec, ParamType, Schema};

const MESH_SCHEMA: Schema = Schema {
    kind: "mesh",
    params: &[
        ParamSpec::required("vertex.position", ParamType::Data),
        ParamSpec::required("index", ParamType::Data),
        ParamSpec::optional("vertex.color", ParamType::Data),
    ],
};

/// Published mesh snapshot. Holds buffer references, never copies of the
/// vertex data.
#[derive(Debug, Clone)]
pub(crate) struct MeshState {
    positions: Data,
    indices: Data,
    colors: Option<Data>,
    pub(crate) bounds: Aabb,
}

impl MeshState {
    fn build(kind: &'static str, params: &ParamSet) -> Result<MeshState> {
        let positions = expect_data(kind, params, "vertex.position", DataType::Vec3f)?;
        let indices = expect_data(kind, params, "index", DataType::Vec3ui)?;

        let vertex_count = positions.element_count();
        for prim in 0..indices.element_count() {
            for index in indices.vec3u_at(prim) {
                if index as usize >= vertex_count {
                    return Err(Error::IndexOutOfRange {
                        index,
                        count: vertex_count,
                    });
                }
            }
        }

        let colors = match params.data("vertex.color") {
            Some(_) => {
                let colors = expect_data(kind, params, "vertex.color", DataType::Vec4f)?;
                if colors.element_count() != vertex_count {
                    return Err(Error::InvalidBufferShape {
                        expected: vertex_count,
                        actual: colors.element_count(),
                    });
                }
                Some(colors)
            }
            None => None,
        };

        let mut bounds = Aabb::empty();
        for i in 0..vertex_count {
            let p = positions.vec3f_at(i);
            bounds.extend(cgmath::Point3::new(p.x, p.y, p.z));
        }

        Ok(MeshState {
            positions,
            indices,
            colors,
            bounds,
        })
    }

    pub(crate) fn vertex_count(&self) -> usize {
        self.positions.element_count()
    }

    pub(crate) fn triangle_count(&self) -> usize {
        self.indices.element_count()
    }

    pub(crate) fn position(&self, i: u32) -> Vector3<f32> {
        self.positions.vec3f_at(i as usize)
    }

    pub(crate) fn triangle(&self, prim: usize) -> [u32; 3] {
        self.indices.vec3u_at(prim)
    }

    pub(crate) fn has_colors(&self) -> bool {
        self.colors.is_some()
    }

    pub(crate) fn color(&self, i: u32) -> Vector4<f32> {
        match &self.colors {
            Some(colors) => colors.vec4f_at(i as usize),
            None => Vector4::new(1.0, 1.0, 1.0, 1.0),
        }
    }
}

fn expect_data(
    kind: &'static str,
    params: &ParamSet,
    name: &'static str,
    ty: DataType,
) -> Result<Data> {
    // Presence of required buffers was validated by the commit machinery;
    // here we check the *element* type of the bound buffer.
    let data = params
        .data(name)
        .ok_or(Error::MissingRequiredParameter { kind, name })?;
    if data.data_type() != ty {
        return Err(Error::TypeMismatch {
            kind,
            name: name.to_string(),
            expected: format!("{ty} data"),
            actual: format!("{} data", data.data_type()),
        });
    }
    Ok(data.clone())
}

/// A surface described by typed data buffers.
pub struct Geometry {
    core: ObjectCore,
    state: Option<MeshState>,
}

impl Geometry {
    /// Creates an (uncommitted) triangle mesh.
    pub fn mesh() -> Handle<Geometry> {
        Handle::new(Geometry {
            core: ObjectCore::new(&MESH_SCHEMA),
            state: None,
        })
    }

    /// Loads the first model of an OBJ file into a mesh, staging position
    /// and index buffers, and derives a material from the model's MTL
    /// diffuse color when one exists.
    ///
    /// Both returned handles are uncommitted so the caller can adjust
    /// parameters before publishing.
    pub fn load_obj(path: &str) -> Result<(Handle<Geometry>, Handle<Material>)> {
        let (models, materials) = tobj::load_obj(
            path,
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
        )?;

        let model = models.first().ok_or(tobj::LoadError::InvalidObjectName)?;
        let obj_mesh = &model.mesh;

        let positions: Vec<[f32; 3]> = obj_mesh
            .positions
            .chunks_exact(3)
            .map(|p| [p[0], p[1], p[2]])
            .collect();
        let triangles: Vec<[u32; 3]> = obj_mesh
            .indices
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
            .collect();

        let mesh = Geometry::mesh();
        mesh.set(
            "vertex.position",
            Data::from_slice(DataType::Vec3f, &positions)?,
        )?;
        mesh.set("index", Data::from_slice(DataType::Vec3ui, &triangles)?)?;

        let material = Material::obj();
        if let Ok(mtls) = materials {
            if let Some(mtl) = obj_mesh.material_id.and_then(|id| mtls.get(id)) {
                let diffuse = mtl.diffuse.unwrap_or([0.8, 0.8, 0.8]);
                material.set("kd", Vector3::new(diffuse[0], diffuse[1], diffuse[2]))?;
                material.set("d", mtl.dissolve.unwrap_or(1.0))?;
            }
        }

        log::debug!(
            "loaded OBJ '{}': {} vertices, {} triangles",
            path,
            positions.len(),
            triangles.len()
        );
        Ok((mesh, material))
    }

    pub(crate) fn state(&self) -> Result<&MeshState> {
        self.state.as_ref().ok_or(Error::UncommittedState {
            kind: self.core.kind(),
        })
    }
}

impl SceneObject for Geometry {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn rebuild(&mut self, params: &ParamSet) -> Result<()> {
        self.state = Some(MeshState::build(self.core.kind(), params)?);
        Ok(())
    }
}
