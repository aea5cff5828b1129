//! Run request assembly
//!
//! Merges the caller's run options with the project's attributes. Values set
//! by the caller always win; attributes only fill what is missing.

use runway_core::domain::project::{
    ATTR_BUILDER_NAME, ATTR_RUNNER_NAME, ProjectDescriptor, runner_debug_mode_attribute,
    runner_memory_size_attribute, runner_options_attribute,
};
use runway_core::domain::request::{DebugMode, RunRequest};
use runway_core::dto::run::RunOptions;
use std::collections::HashMap;

use crate::error::{QueueError, Result};

/// Builds the run request for a project
///
/// The returned request has no id and no lifetime yet; the queue assigns
/// both when it admits the request.
///
/// # Errors
/// `Configuration` when no runner name can be resolved or the project's
/// memory size attribute is not a number.
pub fn build_run_request(
    workspace: &str,
    project: &str,
    descriptor: &ProjectDescriptor,
    options: Option<&RunOptions>,
    default_memory_size: u32,
) -> Result<RunRequest> {
    let runner = options
        .and_then(|o| o.runner_name.as_deref())
        .filter(|name| !name.is_empty())
        .or_else(|| descriptor.attribute(ATTR_RUNNER_NAME))
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            QueueError::Configuration(format!(
                "Name of runner is not specified, be sure property of project {} is set",
                ATTR_RUNNER_NAME
            ))
        })?
        .to_string();

    let debug_mode = options
        .and_then(|o| o.debug_mode.clone())
        .or_else(|| {
            descriptor
                .attribute(&runner_debug_mode_attribute(&runner))
                .map(DebugMode::new)
        });

    let memory_size = match options.and_then(|o| o.memory_size).filter(|size| *size > 0) {
        Some(size) => size,
        None => memory_from_attributes(descriptor, &runner)?.unwrap_or(default_memory_size),
    };

    let mut run_options = options.map(|o| o.options.clone()).unwrap_or_default();
    merge_attribute_options(
        &mut run_options,
        descriptor.attribute_values(&runner_options_attribute(&runner)),
    );

    Ok(RunRequest {
        id: 0,
        workspace: workspace.to_string(),
        project: project.to_string(),
        runner,
        options: run_options,
        memory_size,
        debug_mode,
        deployment_sources_url: None,
        lifetime: 0,
    })
}

/// Whether the project must be built before it can run
pub fn needs_build(options: Option<&RunOptions>, descriptor: &ProjectDescriptor) -> bool {
    let requested = options
        .and_then(|o| o.build_options.as_ref())
        .is_some_and(|b| b.builder_name.is_some());
    requested || descriptor.attributes.contains_key(ATTR_BUILDER_NAME)
}

fn memory_from_attributes(descriptor: &ProjectDescriptor, runner: &str) -> Result<Option<u32>> {
    let attribute = runner_memory_size_attribute(runner);
    match descriptor.attribute(&attribute) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<u32>()
            .map(|size| Some(size).filter(|size| *size > 0))
            .map_err(|_| {
                QueueError::Configuration(format!(
                    "Invalid value '{}' of project property {}",
                    value, attribute
                ))
            }),
    }
}

/// Adds `key=value` entries whose key is not set yet; a bare key has no value
fn merge_attribute_options(options: &mut HashMap<String, Option<String>>, entries: &[String]) {
    for entry in entries {
        let (key, value) = match entry.split_once('=') {
            Some((key, value)) => (key, Some(value.to_string())),
            None => (entry.as_str(), None),
        };
        if key.is_empty() {
            continue;
        }
        options.entry(key.to_string()).or_insert(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runway_core::domain::build::BuildOptions;

    fn descriptor(attributes: &[(&str, &[&str])]) -> ProjectDescriptor {
        ProjectDescriptor {
            name: "app".to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
                .collect(),
            links: vec![],
        }
    }

    #[test]
    fn test_runner_from_project_attributes() {
        let project = descriptor(&[
            ("runner.name", &["node"]),
            ("runner.node.mem_size", &["512"]),
            ("runner.node.debug_mode", &["suspend"]),
        ]);

        let request = build_run_request("ws", "/app", &project, None, 256).unwrap();
        assert_eq!(request.runner, "node");
        assert_eq!(request.memory_size, 512);
        assert_eq!(request.debug_mode, Some(DebugMode::new("suspend")));
        assert_eq!(request.workspace, "ws");
        assert_eq!(request.project, "/app");
    }

    #[test]
    fn test_caller_values_win_over_attributes() {
        let project = descriptor(&[
            ("runner.name", &["node"]),
            ("runner.java.mem_size", &["1024"]),
            ("runner.java.options", &["port=8080", "verbose"]),
        ]);
        let mut options = RunOptions {
            runner_name: Some("java".to_string()),
            memory_size: Some(2048),
            ..Default::default()
        };
        options
            .options
            .insert("port".to_string(), Some("9000".to_string()));

        let request = build_run_request("ws", "/app", &project, Some(&options), 256).unwrap();
        assert_eq!(request.runner, "java");
        assert_eq!(request.memory_size, 2048);
        assert_eq!(request.options.get("port"), Some(&Some("9000".to_string())));
        assert_eq!(request.options.get("verbose"), Some(&None));
    }

    #[test]
    fn test_first_attribute_option_wins() {
        let project = descriptor(&[
            ("runner.name", &["node"]),
            ("runner.node.options", &["env=dev", "env=prod", "url=http://a/?x=1"]),
        ]);

        let request = build_run_request("ws", "/app", &project, None, 256).unwrap();
        assert_eq!(request.options.get("env"), Some(&Some("dev".to_string())));
        assert_eq!(
            request.options.get("url"),
            Some(&Some("http://a/?x=1".to_string()))
        );
    }

    #[test]
    fn test_default_memory_when_unset() {
        let project = descriptor(&[("runner.name", &["node"])]);
        let request = build_run_request("ws", "/app", &project, None, 256).unwrap();
        assert_eq!(request.memory_size, 256);
    }

    #[test]
    fn test_missing_runner_is_configuration_error() {
        let project = descriptor(&[("runner.name", &[])]);
        let err = build_run_request("ws", "/app", &project, None, 256).unwrap_err();
        assert!(matches!(err, QueueError::Configuration(_)));
    }

    #[test]
    fn test_invalid_memory_attribute_is_configuration_error() {
        let project = descriptor(&[("runner.name", &["node"]), ("runner.node.mem_size", &["lots"])]);
        let err = build_run_request("ws", "/app", &project, None, 256).unwrap_err();
        assert!(matches!(err, QueueError::Configuration(msg) if msg.contains("lots")));
    }

    #[test]
    fn test_needs_build() {
        let plain = descriptor(&[("runner.name", &["node"])]);
        assert!(!needs_build(None, &plain));

        let with_builder = descriptor(&[("builder.name", &["maven"])]);
        assert!(needs_build(None, &with_builder));

        let options = RunOptions {
            build_options: Some(BuildOptions {
                builder_name: Some("maven".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(needs_build(Some(&options), &plain));
    }

    #[test]
    fn test_builder_attribute_without_value_still_needs_build() {
        let empty_builder = descriptor(&[("runner.name", &["node"]), ("builder.name", &[])]);
        assert!(needs_build(None, &empty_builder));
    }
}
