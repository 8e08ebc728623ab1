/*!
# Galaxy 3D HAL

Backend-agnostic resource binding and state tracking for the Galaxy 3D engine.

Shaders declare resources; applications group them into resource signatures,
bind GPU objects into signature-shaped caches, and record commands that
automatically transition resources into the states those commands need.
Backends (Vulkan, mock...) implement the `GraphicsDevice` and `CommandSink`
traits and translate the results into native objects.

## Architecture

- **ResourceSignature**: named, typed resource slots with a precomputed cache layout
- **ShaderResources**: resources a compiled shader stage references (SPIR-V reflection)
- **ShaderResourceBinding**: one bindable instance of a signature
- **PipelineLayout**: signatures of a pipeline, resolved against its shaders
- **PipelineState**: reflected stages, layout and backend pipeline
- **DeviceContext**: command recorder with automatic state transitions
- **StateTracker**: per-context barrier decisions
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod config;
pub mod binding;
pub mod state;
pub mod graphics_device;
pub mod context;

// Main galaxy3d namespace module
pub mod galaxy3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Logging facade
    pub use crate::engine::Engine;

    pub use crate::config::Config;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Signatures, reflection, caches and layouts
    pub mod binding {
        pub use crate::binding::*;
    }

    // Resource states and the state tracker
    pub mod state {
        pub use crate::state::*;
    }

    // Backend traits and GPU object types
    pub mod device {
        pub use crate::graphics_device::*;
    }

    // Pipelines and the command recorder
    pub mod context {
        pub use crate::context::*;
    }
}
