//! Permission taxonomy mapping between the two systems.
//!
//! The server grants a three-tier vocabulary under per-scope prefixes
//! (`PROJECT_*`, `REPO_*`); the cloud takes `read`/`write`/`admin`. The
//! lookup is finite and an unknown level maps to `None` — callers skip the
//! grant with a warning. Schema drift between server versions makes
//! unknown levels an expected occurrence, not a bug.

use serde::{Deserialize, Serialize};

/// Permission level in the cloud vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudPermission {
    Read,
    Write,
    Admin,
}

impl CloudPermission {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloudPermission::Read => "read",
            CloudPermission::Write => "write",
            CloudPermission::Admin => "admin",
        }
    }
}

impl std::fmt::Display for CloudPermission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a project-scoped server permission level.
pub fn map_project_permission(level: &str) -> Option<CloudPermission> {
    match level {
        "PROJECT_READ" => Some(CloudPermission::Read),
        "PROJECT_WRITE" => Some(CloudPermission::Write),
        "PROJECT_ADMIN" => Some(CloudPermission::Admin),
        _ => None,
    }
}

/// Map a repository-scoped server permission level.
pub fn map_repo_permission(level: &str) -> Option<CloudPermission> {
    match level {
        "REPO_READ" => Some(CloudPermission::Read),
        "REPO_WRITE" => Some(CloudPermission::Write),
        "REPO_ADMIN" => Some(CloudPermission::Admin),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_repo_levels_map() {
        assert_eq!(map_repo_permission("REPO_ADMIN"), Some(CloudPermission::Admin));
        assert_eq!(map_repo_permission("REPO_WRITE"), Some(CloudPermission::Write));
        assert_eq!(map_repo_permission("REPO_READ"), Some(CloudPermission::Read));
    }

    #[test]
    fn known_project_levels_map() {
        assert_eq!(
            map_project_permission("PROJECT_ADMIN"),
            Some(CloudPermission::Admin)
        );
        assert_eq!(
            map_project_permission("PROJECT_READ"),
            Some(CloudPermission::Read)
        );
    }

    #[test]
    fn unknown_levels_yield_none_not_error() {
        assert_eq!(map_repo_permission("UNKNOWN_LEVEL"), None);
        assert_eq!(map_project_permission("REPO_WRITE"), None);
        assert_eq!(map_repo_permission(""), None);
    }

    #[test]
    fn wire_form_is_lowercase() {
        assert_eq!(CloudPermission::Admin.as_str(), "admin");
        assert_eq!(
            serde_json::to_value(CloudPermission::Write).unwrap(),
            serde_json::json!("write")
        );
    }
}
