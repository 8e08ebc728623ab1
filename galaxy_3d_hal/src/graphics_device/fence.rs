/// CPU-visible timeline fence
///
/// A fence carries a monotonically increasing value. Recorders enqueue a
/// signal; the device sets the value once every command recorded before the
/// signal has executed. Waiters block until the value is reached.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

#[derive(Debug)]
pub struct Fence {
    name: String,
    value: Mutex<u64>,
    reached: Condvar,
}

impl Fence {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Mutex::new(0),
            reached: Condvar::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last value signaled
    pub fn completed_value(&self) -> u64 {
        match self.value.lock() {
            Ok(value) => *value,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Advance the fence to `value`. Values lower than the current one are ignored.
    pub fn signal(&self, value: u64) {
        let mut current = match self.value.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if value < *current {
            crate::engine_warn!(
                "galaxy3d::Fence",
                "Fence '{}' signaled with {} which is lower than its completed value {}",
                self.name, value, *current
            );
            return;
        }
        *current = value;
        self.reached.notify_all();
    }

    /// Block until the fence reaches `value`
    pub fn wait(&self, value: u64) {
        let mut current = match self.value.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        while *current < value {
            current = match self.reached.wait(current) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    /// Non-blocking variant: returns false immediately if `value` is not reached yet,
    /// or after `timeout` when one is given
    pub fn wait_timeout(&self, value: u64, timeout: Option<Duration>) -> bool {
        let current = match self.value.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(timeout) = timeout else {
            return *current >= value;
        };
        match self.reached.wait_timeout_while(current, timeout, |current| *current < value) {
            Ok((current, _)) => *current >= value,
            Err(poisoned) => *poisoned.into_inner().0 >= value,
        }
    }
}

#[cfg(test)]
#[path = "fence_tests.rs"]
mod tests;
