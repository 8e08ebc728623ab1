/// Resource state tracking

pub mod resource_state;
pub mod state_tracker;

pub use resource_state::*;
pub use state_tracker::*;
