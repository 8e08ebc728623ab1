/// Resource state tracker
///
/// Decides, per resource access, whether a barrier is emitted, the recorded
/// state is verified, or nothing happens. One tracker lives in each device
/// context; the states themselves live in the resources' `StateCell`s and are
/// shared by every context.
///
/// `Transition` reads and writes the cell, so it must not race with any other
/// access to the same resource. `Verify` only reads. Resources used from
/// several contexts at once should be released to `UNKNOWN` and transitioned
/// explicitly with `transition_resource_states`.

use crate::error::Result;
use crate::graphics_device::{BarrierKind, CommandSink, ResourceRef, StateBarrier};
use super::ResourceState;

/// How a command treats the states of the resources it uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransitionMode {
    /// Neither read nor write states; the caller guarantees correctness
    #[default]
    None,
    /// Check the recorded state (validation builds only), never write it
    Verify,
    /// Emit a barrier when needed and record the new state
    Transition,
}

/// What the tracker did for one access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Mode was `None`
    Skipped,
    /// State is `UNKNOWN`: externally managed
    Untracked,
    /// Already in the required state
    NotRequired,
    Transitioned {
        from: ResourceState,
        to: ResourceState,
    },
    /// UAV -> UAV, ordering barrier only
    UavBarrier,
    Verified,
    VerificationFailed {
        current: ResourceState,
        required: ResourceState,
    },
    /// `Verify` with validation disabled
    Unchecked,
}

/// Explicit state transition request
#[derive(Debug, Clone)]
pub struct StateTransitionDesc {
    pub resource: ResourceRef,
    /// State to transition from; the recorded state when None
    pub old_state: Option<ResourceState>,
    pub new_state: ResourceState,
    /// Record `new_state` in the resource after the barrier
    pub update_state: bool,
}

impl StateTransitionDesc {
    pub fn new(resource: ResourceRef, new_state: ResourceState) -> Self {
        Self {
            resource,
            old_state: None,
            new_state,
            update_state: true,
        }
    }

    pub fn with_old_state(mut self, old_state: ResourceState) -> Self {
        self.old_state = Some(old_state);
        self
    }

    pub fn without_state_update(mut self) -> Self {
        self.update_state = false;
        self
    }
}

#[derive(Debug, Default)]
pub struct StateTracker {
    validation: bool,
    barrier_count: u64,
    verification_failures: u64,
}

impl StateTracker {
    pub fn new(validation: bool) -> Self {
        Self {
            validation,
            barrier_count: 0,
            verification_failures: 0,
        }
    }

    /// Barriers emitted so far
    pub fn barrier_count(&self) -> u64 {
        self.barrier_count
    }

    /// `Verify` requests that found a wrong state
    pub fn verification_failures(&self) -> u64 {
        self.verification_failures
    }

    /// Bring `resource` into `required` for `operation` according to `mode`
    pub fn transition(
        &mut self,
        resource: &ResourceRef,
        required: ResourceState,
        mode: TransitionMode,
        operation: &str,
        sink: &mut dyn CommandSink,
    ) -> Result<TransitionOutcome> {
        match mode {
            TransitionMode::None => Ok(TransitionOutcome::Skipped),
            TransitionMode::Verify => Ok(self.verify(resource, required, operation)),
            TransitionMode::Transition => {
                let current = resource.state().get();
                if current.is_unknown() {
                    return Ok(TransitionOutcome::Untracked);
                }

                if current == ResourceState::UNORDERED_ACCESS && required == ResourceState::UNORDERED_ACCESS {
                    self.emit(sink, resource, current, required, BarrierKind::UnorderedAccess)?;
                    return Ok(TransitionOutcome::UavBarrier);
                }

                if current.satisfies(required) {
                    return Ok(TransitionOutcome::NotRequired);
                }

                self.emit(sink, resource, current, required, BarrierKind::Transition)?;
                resource.state().set(required);
                Ok(TransitionOutcome::Transitioned { from: current, to: required })
            }
        }
    }

    /// Check the recorded state without changing it
    pub fn verify(&mut self, resource: &ResourceRef, required: ResourceState, operation: &str) -> TransitionOutcome {
        if !self.validation {
            return TransitionOutcome::Unchecked;
        }
        let current = resource.state().get();
        if current.is_unknown() {
            return TransitionOutcome::Untracked;
        }
        if current.satisfies(required) {
            return TransitionOutcome::Verified;
        }

        self.verification_failures += 1;
        crate::engine_error!("galaxy3d::StateTracker",
            "{}: resource '{}' is in state {:?}, but {:?} is required. Use TRANSITION mode or transition the resource explicitly",
            operation, resource.name(), current, required);
        TransitionOutcome::VerificationFailed { current, required }
    }

    /// Emit explicit barriers
    ///
    /// Every referenced resource's state is read, whatever its tracking mode.
    /// Invalid requests are logged and skipped.
    pub fn transition_resource_states(
        &mut self,
        transitions: &[StateTransitionDesc],
        sink: &mut dyn CommandSink,
    ) -> Result<()> {
        for desc in transitions {
            let current = desc.resource.state().get();

            if desc.new_state.is_unknown() {
                crate::engine_error!("galaxy3d::StateTracker",
                    "New state of resource '{}' must not be UNKNOWN", desc.resource.name());
                continue;
            }

            let old_state = match desc.old_state {
                Some(old_state) => {
                    if self.validation && !current.is_unknown() && old_state != current {
                        crate::engine_warn!("galaxy3d::StateTracker",
                            "Old state {:?} of resource '{}' does not match its recorded state {:?}",
                            old_state, desc.resource.name(), current);
                    }
                    old_state
                }
                None if current.is_unknown() => {
                    crate::engine_error!("galaxy3d::StateTracker",
                        "The state of resource '{}' is unknown and no old state was given", desc.resource.name());
                    continue;
                }
                None => current,
            };

            if old_state == ResourceState::UNORDERED_ACCESS && desc.new_state == ResourceState::UNORDERED_ACCESS {
                self.emit(sink, &desc.resource, old_state, desc.new_state, BarrierKind::UnorderedAccess)?;
            } else if old_state != desc.new_state {
                self.emit(sink, &desc.resource, old_state, desc.new_state, BarrierKind::Transition)?;
            }

            if desc.update_state {
                desc.resource.state().set(desc.new_state);
            }
        }
        Ok(())
    }

    fn emit(
        &mut self,
        sink: &mut dyn CommandSink,
        resource: &ResourceRef,
        old_state: ResourceState,
        new_state: ResourceState,
        kind: BarrierKind,
    ) -> Result<()> {
        self.barrier_count += 1;
        sink.resource_barrier(&StateBarrier {
            resource: resource.clone(),
            old_state,
            new_state,
            kind,
        })
    }
}

#[cfg(test)]
#[path = "state_tracker_tests.rs"]
mod tests;
