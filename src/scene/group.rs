//! Groups collect geometric and volumetric models into one instancing
//! unit. An empty group is legal; it simply contributes nothing.

use crate::error::{Error, Result};
use crate::scene::model::{GeometricModel, VolumetricModel};
use crate::scene::object::{Handle, ObjectCore, SceneObject};
use crate::scene::params::{ParamSet, ParamSpec, ParamType, Schema};

const GROUP_SCHEMA: Schema = Schema {
    kind: "group",
    params: &[
        ParamSpec::optional("geometry", ParamType::GeometricModelList),
        ParamSpec::optional("volume", ParamType::VolumetricModelList),
    ],
};

#[derive(Clone, Default)]
pub(crate) struct GroupState {
    pub(crate) geometric: Vec<Handle<GeometricModel>>,
    pub(crate) volumetric: Vec<Handle<VolumetricModel>>,
}

/// A collection of models shared by any number of instances.
pub struct Group {
    core: ObjectCore,
    state: Option<GroupState>,
}

impl Group {
    pub fn new() -> Handle<Group> {
        Handle::new(Group {
            core: ObjectCore::new(&GROUP_SCHEMA),
            state: None,
        })
    }

    pub(crate) fn state(&self) -> Result<&GroupState> {
        self.state.as_ref().ok_or(Error::UncommittedState {
            kind: self.core.kind(),
        })
    }
}

impl SceneObject for Group {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn rebuild(&mut self, params: &ParamSet) -> Result<()> {
        self.state = Some(GroupState {
            geometric: params.geometric_models("geometry").to_vec(),
            volumetric: params.volumetric_models("volume").to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_group_commits() {
        let group = Group::new();
        group.commit().unwrap();
        let guard = group.read();
        let state = guard.state().unwrap();
        assert!(state.geometric.is_empty());
        assert!(state.volumetric.is_empty());
    }
}
