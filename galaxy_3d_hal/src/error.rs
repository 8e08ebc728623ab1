//! Error types for the Galaxy3D HAL
//!
//! This module defines the error types used by the binding subsystem:
//! signature authoring, pipeline layout resolution, binding and backend errors.

use std::fmt;

/// Result type for Galaxy3D HAL operations
pub type Result<T> = std::result::Result<T, Error>;

/// Galaxy3D HAL errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backend-specific error (Vulkan, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (texture, buffer, sampler, etc.)
    InvalidResource(String),

    /// Initialization failed (device, backend objects)
    InitializationFailed(String),

    /// Malformed signature description (unsorted resources, bad array size, duplicates...)
    InvalidLayout(String),

    /// A shader references a resource that no signature of the pipeline declares
    BindingNotFound {
        shader: String,
        resource: String,
    },

    /// A shader declares a resource differently from the signature that owns it
    IncompatibleResourceDeclaration {
        shader: String,
        resource: String,
        signature: String,
        reason: String,
    },

    /// A resource shared between stages is not declared identically everywhere
    ResourceMergeConflict {
        pipeline: String,
        resource: String,
        property: String,
    },

    /// No compatible pipeline is active for the committed binding set
    IncompletePipelineBinding(String),

    /// Operation not valid in the current recorder state
    InvalidOperation(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::InvalidLayout(msg) => write!(f, "Invalid layout: {}", msg),
            Error::BindingNotFound { shader, resource } => write!(
                f,
                "Shader '{}' contains resource '{}' that is not present in any pipeline resource signature",
                shader, resource
            ),
            Error::IncompatibleResourceDeclaration { shader, resource, signature, reason } => write!(
                f,
                "Resource '{}' in shader '{}' is incompatible with its declaration in signature '{}': {}",
                resource, shader, signature, reason
            ),
            Error::ResourceMergeConflict { pipeline, resource, property } => write!(
                f,
                "Shader variable '{}' is shared between multiple shaders in pipeline '{}', but its {} varies",
                resource, pipeline, property
            ),
            Error::IncompletePipelineBinding(msg) => write!(f, "Incomplete pipeline binding: {}", msg),
            Error::InvalidOperation(msg) => write!(f, "Invalid operation: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
