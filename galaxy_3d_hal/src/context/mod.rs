/// Pipeline states and the command recorder

pub mod commands;
pub mod pipeline_state;
pub mod device_context;

pub use commands::{DrawAttribs, DrawIndexedAttribs};
pub use pipeline_state::{PipelineState, PipelineStateDesc, ShaderStageDesc};
pub use device_context::{required_state, DeviceContext, MAX_RENDER_TARGETS};
