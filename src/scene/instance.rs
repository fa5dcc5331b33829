//! Instances place a group into world space under an affine transform.
//! Several instances may share one group; each carries its own transform.

use cgmath::{Matrix4, SquareMatrix};

use crate::error::{Error, Result};
use crate::scene::group::Group;
use crate::scene::object::{Handle, ObjectCore, SceneObject};
use crate::scene::params::{ParamSet, ParamSpec, ParamType, Schema};

const INSTANCE_SCHEMA: Schema = Schema {
    kind: "instance",
    params: &[
        ParamSpec::required("group", ParamType::Group),
        ParamSpec::optional("transform", ParamType::Transform),
    ],
};

#[derive(Clone)]
pub(crate) struct InstanceState {
    pub(crate) group: Handle<Group>,
    pub(crate) transform: Matrix4<f32>,
}

/// A placement of a [`Group`] in the world.
pub struct Instance {
    core: ObjectCore,
    state: Option<InstanceState>,
}

impl Instance {
    /// Creates an instance of `group` with the identity transform. The
    /// handle is staged, so the instance still needs a commit.
    pub fn new(group: &Handle<Group>) -> Handle<Instance> {
        let instance = Handle::new(Instance {
            core: ObjectCore::new(&INSTANCE_SCHEMA),
            state: None,
        });
        instance.set("group", group).expect("schema accepts group");
        instance
    }

    pub(crate) fn state(&self) -> Result<&InstanceState> {
        self.state.as_ref().ok_or(Error::UncommittedState {
            kind: self.core.kind(),
        })
    }
}

impl SceneObject for Instance {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn rebuild(&mut self, params: &ParamSet) -> Result<()> {
        self.state = Some(InstanceState {
            group: params
                .group("group")
                .expect("validated required param")
                .clone(),
            transform: params.transform("transform").unwrap_or_else(Matrix4::identity),
        });
        Ok(())
    }
}
