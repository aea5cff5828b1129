//! Project metadata as reported by the project service

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::link::Link;

/// Project attribute naming the runner kind the project runs on
pub const ATTR_RUNNER_NAME: &str = "runner.name";

/// Project attribute naming the builder for the project
pub const ATTR_BUILDER_NAME: &str = "builder.name";

/// Describes a project: its attributes and the operations available on it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    #[serde(default)]
    pub name: String,

    /// Multi-valued project attributes
    #[serde(default)]
    pub attributes: HashMap<String, Vec<String>>,

    #[serde(default)]
    pub links: Vec<Link>,
}

impl ProjectDescriptor {
    /// Returns the first value of an attribute, if any
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Returns all values of an attribute
    pub fn attribute_values(&self, name: &str) -> &[String] {
        self.attributes.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Attribute holding the debug mode for a given runner
pub fn runner_debug_mode_attribute(runner: &str) -> String {
    format!("runner.{}.debug_mode", runner)
}

/// Attribute holding the memory size (MB) for a given runner
pub fn runner_memory_size_attribute(runner: &str) -> String {
    format!("runner.{}.mem_size", runner)
}

/// Attribute holding `key=value` options for a given runner
pub fn runner_options_attribute(runner: &str) -> String {
    format!("runner.{}.options", runner)
}
