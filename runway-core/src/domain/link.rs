//! Hypermedia links
//!
//! Remote services describe the follow-up operations on a resource as a list of
//! links. Callers look a link up by its relation and issue the request it names.

use serde::{Deserialize, Serialize};

/// Relation of the builder service link that starts a new build
pub const LINK_REL_BUILD: &str = "build";

/// Relation of the build task link that returns the current build status
pub const LINK_REL_GET_STATUS: &str = "get status";

/// Relation of the build task link that cancels the build
pub const LINK_REL_CANCEL: &str = "cancel";

/// Relation of the build task link that downloads the build artifact
pub const LINK_REL_DOWNLOAD_RESULT: &str = "download result";

/// Relation of the build task link that shows the build log
pub const LINK_REL_VIEW_LOG: &str = "view build log";

/// Relation of the project link that exports the sources as a zip archive
pub const LINK_REL_EXPORT_ZIP: &str = "zipball sources";

/// A link to a related remote operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,

    /// HTTP method to use when following the link
    #[serde(default = "default_method")]
    pub method: String,

    /// Media type produced by the target
    #[serde(default)]
    pub produces: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl Link {
    pub fn new(rel: impl Into<String>, href: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            rel: rel.into(),
            href: href.into(),
            method: method.into(),
            produces: None,
        }
    }
}

/// Finds the first link with the given relation
pub fn find_link<'a>(links: &'a [Link], rel: &str) -> Option<&'a Link> {
    links.iter().find(|link| link.rel == rel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_link_returns_first_match() {
        let links = vec![
            Link::new(LINK_REL_GET_STATUS, "http://b/status/1", "GET"),
            Link::new(LINK_REL_CANCEL, "http://b/cancel/1", "POST"),
            Link::new(LINK_REL_CANCEL, "http://b/cancel/other", "POST"),
        ];

        let cancel = find_link(&links, LINK_REL_CANCEL).unwrap();
        assert_eq!(cancel.href, "http://b/cancel/1");
        assert!(find_link(&links, LINK_REL_VIEW_LOG).is_none());
    }

    #[test]
    fn test_link_method_defaults_to_get() {
        let link: Link = serde_json::from_str(r#"{"rel":"get status","href":"http://b/s"}"#).unwrap();
        assert_eq!(link.method, "GET");
        assert_eq!(link.produces, None);
    }
}
