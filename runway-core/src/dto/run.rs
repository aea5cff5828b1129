//! Run options DTO

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::build::BuildOptions;
use crate::domain::request::DebugMode;

/// Options supplied by the caller when asking to run a project
///
/// Every field is optional; missing values are taken from the project's
/// attributes or from the queue configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunOptions {
    pub runner_name: Option<String>,

    /// Memory for the application in megabytes
    pub memory_size: Option<u32>,

    #[serde(default)]
    pub options: HashMap<String, Option<String>>,

    pub debug_mode: Option<DebugMode>,

    /// Build the project before running it
    pub build_options: Option<BuildOptions>,
}
