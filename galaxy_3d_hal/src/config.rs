//! Device-level configuration

/// Configuration shared by every object created from a device
#[derive(Debug, Clone)]
pub struct Config {
    /// Enable validation (unbound resources, state verification, soft limits).
    /// Has no effect in release builds: validation code is compiled out.
    pub enable_validation: bool,

    /// Number of binding-set caches allocated at once by a signature's cache pool.
    /// Values <= 1 disable pooling (one allocation per instance).
    pub allocation_granularity: u32,

    /// Application name (used in backend object debug names)
    pub app_name: String,
}

impl Config {
    /// True when validation checks should run
    #[inline]
    pub fn validation_enabled(&self) -> bool {
        cfg!(debug_assertions) && self.enable_validation
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_validation: cfg!(debug_assertions),
            allocation_granularity: 1,
            app_name: String::from("Galaxy3D Application"),
        }
    }
}
