//! Process-environment access as an explicit capability.
//!
//! The key provider and validation entry points read and write environment
//! variables through [`EnvAccess`] instead of touching `std::env` directly,
//! so tests and embedding hosts can substitute a deterministic in-memory
//! environment.

use std::collections::HashMap;
use std::sync::Mutex;

/// Read/write access to environment variables.
pub trait EnvAccess: Send + Sync {
    /// Read a variable, returning `None` when unset or blank.
    fn var(&self, name: &str) -> Option<String>;

    /// Set a variable so later reads (and, for the real environment, any
    /// subprocess spawned afterwards) observe it.
    fn set_var(&self, name: &str, value: &str);
}

/// The real process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvAccess for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        match std::env::var(name) {
            Ok(value) if !value.trim().is_empty() => Some(value),
            _ => None,
        }
    }

    fn set_var(&self, name: &str, value: &str) {
        std::env::set_var(name, value);
    }
}

/// In-memory environment, isolated from the process.
#[derive(Debug, Default)]
pub struct MemoryEnv {
    vars: Mutex<HashMap<String, String>>,
}

impl MemoryEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style seeding of an initial variable.
    pub fn with_var(self, name: &str, value: &str) -> Self {
        self.set_var(name, value);
        self
    }
}

impl EnvAccess for MemoryEnv {
    fn var(&self, name: &str) -> Option<String> {
        let vars = self.vars.lock().expect("env lock poisoned");
        vars.get(name)
            .filter(|value| !value.trim().is_empty())
            .cloned()
    }

    fn set_var(&self, name: &str, value: &str) {
        let mut vars = self.vars.lock().expect("env lock poisoned");
        vars.insert(name.to_string(), value.to_string());
    }
}
