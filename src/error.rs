//! Error types shared across the crate.
//!
//! Construction, parameter, and commit errors are reported synchronously at
//! the call that caused them and leave the object in its last committed
//! state. A failed render leaves the framebuffer contents and accumulation
//! counter untouched.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A staged value (or a bound data buffer's element type) disagrees with
    /// the type the parameter declares.
    #[error("{kind}: parameter `{name}` expects {expected}, got {actual}")]
    TypeMismatch {
        kind: &'static str,
        name: String,
        expected: String,
        actual: String,
    },

    /// The object's kind does not declare a parameter with this name.
    #[error("{kind}: unknown parameter `{name}`")]
    UnknownParameter { kind: &'static str, name: String },

    /// Commit validation found a required parameter that was never set.
    #[error("{kind}: missing required parameter `{name}`")]
    MissingRequiredParameter {
        kind: &'static str,
        name: &'static str,
    },

    /// An index buffer entry points past the end of the vertex buffer.
    #[error("index {index} out of range for {count} vertices")]
    IndexOutOfRange { index: u32, count: usize },

    /// A render or query reached an object that was never committed, or that
    /// has staged parameters newer than its last commit.
    #[error("{kind} has uncommitted changes; call commit() first")]
    UncommittedState { kind: &'static str },

    /// The backing memory is too small for the declared element type,
    /// extents, and strides.
    #[error("buffer size mismatch: shape needs {expected}, buffer provides {actual}")]
    InvalidBufferShape { expected: usize, actual: usize },

    /// An allocation was refused rather than silently truncated.
    #[error("allocation of {bytes} bytes refused")]
    ResourceExhausted { bytes: usize },

    /// Engine setup failed (thread pool, framebuffer creation).
    #[error("initialization failed: {0}")]
    Initialization(String),

    /// OBJ import failed.
    #[error("failed to load OBJ: {0}")]
    ObjLoad(#[from] tobj::LoadError),
}
