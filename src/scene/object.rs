//! # Scene Object Lifecycle
//!
//! Every object kind follows the same lifecycle: create → set parameters →
//! commit → use → release. Parameters staged with [`Handle::set`] are
//! invisible to renders until [`Handle::commit`] publishes them; commit is
//! the only synchronization point between mutation and use.
//!
//! ## How it works
//!
//! [`ObjectCore`] keeps two maps per object: the *staged* parameters and
//! the *committed* (published) ones. Commit merges them, validates the
//! kind's required set, lets the kind rebuild its published state from the
//! merged view, and only then swaps the maps and bumps the generation
//! counter. Any failure along the way leaves the committed side untouched,
//! with the staged values still in place for a corrected retry.
//!
//! [`Handle`] is the opaque reference-counted handle the public API trades
//! in: an `Arc` around a lock. Cloning retains, dropping releases; the last
//! drop frees exclusively owned sub-resources while shared data buffers
//! only lose one `Arc` reference. Readers (render, pick, bounds queries)
//! take the read side of the lock, commit takes the write side, so a
//! concurrent reader can never observe a half-updated object.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Error, Result};
use crate::scene::params::{ParamSet, ParamValue, Schema};

/// Staged/committed parameter storage shared by every object kind.
pub struct ObjectCore {
    schema: &'static Schema,
    staged: ParamSet,
    committed: ParamSet,
    generation: u64,
}

impl ObjectCore {
    pub(crate) fn new(schema: &'static Schema) -> Self {
        Self {
            schema,
            staged: ParamSet::default(),
            committed: ParamSet::default(),
            generation: 0,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        self.schema.kind
    }

    /// Stage a value, checking name and type against the schema.
    pub(crate) fn stage(&mut self, name: &str, value: ParamValue) -> Result<()> {
        let spec = self
            .schema
            .lookup(name)
            .ok_or_else(|| Error::UnknownParameter {
                kind: self.schema.kind,
                name: name.to_string(),
            })?;
        let actual = value.param_type();
        if actual != spec.ty {
            return Err(Error::TypeMismatch {
                kind: self.schema.kind,
                name: name.to_string(),
                expected: spec.ty.to_string(),
                actual: actual.to_string(),
            });
        }
        self.staged.insert(name, value);
        Ok(())
    }

    /// Committed ∪ staged view, with the required set validated in schema
    /// order so the first missing parameter is the one named.
    pub(crate) fn merged(&self) -> Result<ParamSet> {
        let mut merged = self.committed.clone();
        merged.merge_from(&self.staged);
        for spec in self.schema.params {
            if spec.required && !merged.contains(spec.name) {
                return Err(Error::MissingRequiredParameter {
                    kind: self.schema.kind,
                    name: spec.name,
                });
            }
        }
        Ok(merged)
    }

    /// Atomically publish a merged set produced by [`ObjectCore::merged`].
    pub(crate) fn publish(&mut self, merged: ParamSet) {
        self.committed = merged;
        self.staged.clear();
        self.generation += 1;
    }

    /// Generation 0 means the object was never committed.
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn is_committed(&self) -> bool {
        self.generation > 0
    }

    pub(crate) fn has_staged(&self) -> bool {
        !self.staged.is_empty()
    }

    /// Committed and nothing staged since. Renders refuse dirty graphs
    /// rather than silently using stale parameters.
    pub(crate) fn ensure_clean(&self) -> Result<()> {
        if !self.is_committed() || self.has_staged() {
            return Err(Error::UncommittedState {
                kind: self.schema.kind,
            });
        }
        Ok(())
    }
}

/// Implemented by every object kind; drives the shared commit flow.
pub trait SceneObject: Send + Sync {
    fn core(&self) -> &ObjectCore;
    fn core_mut(&mut self) -> &mut ObjectCore;

    /// Validate the merged parameters and rebuild the published state.
    /// Must leave the previous state intact on error.
    fn rebuild(&mut self, params: &ParamSet) -> Result<()>;
}

/// Opaque reference-counted handle to a scene object.
///
/// Clone to retain, drop to release. See the module docs for the locking
/// discipline.
pub struct Handle<T>(Arc<RwLock<T>>);

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Handle(Arc::clone(&self.0))
    }
}

impl<T> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Handle").field(&Arc::as_ptr(&self.0)).finish()
    }
}

impl<T: SceneObject> Handle<T> {
    pub(crate) fn new(object: T) -> Self {
        Handle(Arc::new(RwLock::new(object)))
    }

    /// Stage a parameter. Fails fast with [`Error::UnknownParameter`] or
    /// [`Error::TypeMismatch`]; the staged value is invisible to renders
    /// until the next [`Handle::commit`].
    pub fn set(&self, name: &str, value: impl Into<ParamValue>) -> Result<()> {
        self.write().core_mut().stage(name, value.into())
    }

    /// Validate staged parameters and atomically publish them.
    pub fn commit(&self) -> Result<()> {
        let mut object = self.write();
        let merged = object.core().merged()?;
        object.rebuild(&merged)?;
        object.core_mut().publish(merged);
        log::debug!(
            "committed {} (generation {})",
            object.core().kind(),
            object.core().generation()
        );
        Ok(())
    }

    /// Kind tag, e.g. `"mesh"` or `"structuredRegular"`.
    pub fn kind(&self) -> &'static str {
        self.read().core().kind()
    }

    /// Whether the object has been committed at least once.
    pub fn is_committed(&self) -> bool {
        self.read().core().is_committed()
    }

    /// Identity comparison between handles.
    pub fn same(&self, other: &Handle<T>) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Stable identity token, used with the generation counter to
    /// fingerprint a committed scene graph.
    pub(crate) fn token(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, T> {
        self.0.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.0
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::light::Light;
    use cgmath::Vector3;

    #[test]
    fn test_unknown_parameter_rejected() {
        let light = Light::ambient();
        let err = light.set("colour", Vector3::new(1.0, 1.0, 1.0)).unwrap_err();
        assert!(matches!(err, Error::UnknownParameter { .. }));
    }

    #[test]
    fn test_type_mismatch_rejected_at_set() {
        let light = Light::ambient();
        let err = light.set("intensity", Vector3::new(1.0, 0.0, 0.0)).unwrap_err();
        match err {
            Error::TypeMismatch { name, .. } => assert_eq!(name, "intensity"),
            other => panic!("expected TypeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_type_mismatch_leaves_committed_params_intact() {
        let light = Light::ambient();
        light.set("intensity", 2.0f32).unwrap();
        light.commit().unwrap();

        assert!(light.set("intensity", true).is_err());
        // The failed set stages nothing; the object is still clean.
        assert!(light.read().core().ensure_clean().is_ok());
        assert_eq!(light.read().state().unwrap().radiance(), Vector3::new(2.0, 2.0, 2.0));
    }

    #[test]
    fn test_staged_values_invisible_until_commit() {
        let light = Light::ambient();
        light.set("intensity", 2.0f32).unwrap();
        light.commit().unwrap();

        light.set("intensity", 5.0f32).unwrap();
        assert_eq!(light.read().state().unwrap().radiance(), Vector3::new(2.0, 2.0, 2.0));
        assert!(light.read().core().ensure_clean().is_err());

        light.commit().unwrap();
        assert_eq!(light.read().state().unwrap().radiance(), Vector3::new(5.0, 5.0, 5.0));
    }

    #[test]
    fn test_commit_bumps_generation() {
        let light = Light::ambient();
        assert!(!light.is_committed());
        light.commit().unwrap();
        assert!(light.is_committed());
        assert_eq!(light.read().core().generation(), 1);
        light.commit().unwrap();
        assert_eq!(light.read().core().generation(), 2);
    }

    #[test]
    fn test_handle_identity() {
        let a = Light::ambient();
        let b = Light::ambient();
        let a2 = a.clone();
        assert!(a.same(&a2));
        assert!(!a.same(&b));
    }
}
