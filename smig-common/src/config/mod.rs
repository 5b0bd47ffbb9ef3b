//! Configuration for a migration run.
//!
//! Everything lives in one TOML file handed to the CLI; the parsed
//! [`MigrationConfig`] value is passed explicitly into every component
//! constructor. No component reads ambient global state.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{MigrateError, Result};

/// Top-level migration configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationConfig {
    pub server: ServerConfig,
    pub cloud: CloudConfig,
    #[serde(default)]
    pub migration: RunConfig,
    #[serde(default)]
    pub branch_policy: BranchPolicyConfig,
}

/// Connection settings for the on-prem Bitbucket Server instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL, e.g. `http://bitbucket.internal:7990`.
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Host (and port) as it appears inside clone URLs, used by the
    /// reference rewriter, e.g. `bitbucket.internal:7990`.
    pub domain: String,
}

/// Credentials and workspace for Bitbucket Cloud.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Workspace ID the estate migrates into.
    pub workspace: String,
    pub username: String,
    /// App password / API token.
    pub token: String,
    /// REST endpoint, overridable to point at a local stub in tests.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            workspace: String::new(),
            username: String::new(),
            token: String::new(),
            api_base_url: default_api_base_url(),
        }
    }
}

/// Run-level knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Directory holding CSV interchange files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Directory the repositories are cloned into, relative to `data_dir`
    /// unless absolute.
    #[serde(default = "default_repository_dir")]
    pub repository_dir: PathBuf,
    /// Branch pushed to the cloud remote after clone and after rewriting.
    #[serde(default = "default_push_branch")]
    pub push_branch: String,
    /// Whether to push at all (disable for a local dry pass).
    #[serde(default = "default_true")]
    pub push: bool,
    /// Whether to mirror LFS objects alongside regular history.
    #[serde(default = "default_true")]
    pub sync_lfs: bool,
    /// Cloud project that receives migrated personal repositories.
    #[serde(default = "default_personal_project")]
    pub personal_project_key: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            repository_dir: default_repository_dir(),
            push_branch: default_push_branch(),
            push: true,
            sync_lfs: true,
            personal_project_key: default_personal_project(),
        }
    }
}

/// Branching model and branch restrictions applied to matched repositories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchPolicyConfig {
    /// Use the repository main branch as the development branch.
    #[serde(default = "default_true")]
    pub development_use_mainbranch: bool,
    /// Whether a production branch is enabled.
    #[serde(default)]
    pub production_enabled: bool,
    /// Branch type prefixes enabled in the branching model.
    #[serde(default = "default_branch_types")]
    pub branch_types: Vec<BranchType>,
    /// Branch restrictions created per repository.
    #[serde(default = "default_restrictions")]
    pub restrictions: Vec<BranchRestriction>,
}

impl Default for BranchPolicyConfig {
    fn default() -> Self {
        Self {
            development_use_mainbranch: true,
            production_enabled: false,
            branch_types: default_branch_types(),
            restrictions: default_restrictions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchType {
    pub kind: String,
    pub prefix: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// One branch restriction, e.g. `kind = "force", pattern = "*"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchRestriction {
    pub kind: String,
    pub pattern: String,
}

impl MigrationConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            MigrateError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: MigrationConfig = toml::from_str(&raw)
            .map_err(|e| MigrateError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.server.base_url.is_empty() {
            missing.push("server.base_url");
        }
        if self.server.domain.is_empty() {
            missing.push("server.domain");
        }
        if self.cloud.workspace.is_empty() {
            missing.push("cloud.workspace");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(MigrateError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )))
        }
    }

    /// Directory the working copies live in.
    pub fn repository_root(&self) -> PathBuf {
        if self.migration.repository_dir.is_absolute() {
            self.migration.repository_dir.clone()
        } else {
            self.migration.data_dir.join(&self.migration.repository_dir)
        }
    }

    /// Path of an interchange file under the data directory.
    pub fn data_file(&self, name: &str) -> PathBuf {
        self.migration.data_dir.join(name)
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_repository_dir() -> PathBuf {
    PathBuf::from("repositories")
}

fn default_push_branch() -> String {
    "master".to_string()
}

fn default_personal_project() -> String {
    "PERSONAL".to_string()
}

fn default_true() -> bool {
    true
}

fn default_api_base_url() -> String {
    "https://api.bitbucket.org".to_string()
}

fn default_branch_types() -> Vec<BranchType> {
    ["bugfix", "feature", "hotfix", "release"]
        .into_iter()
        .map(|kind| BranchType {
            kind: kind.to_string(),
            prefix: format!("{kind}/"),
            enabled: true,
        })
        .collect()
}

fn default_restrictions() -> Vec<BranchRestriction> {
    vec![
        BranchRestriction {
            kind: "require_tasks_to_be_completed".to_string(),
            pattern: "develop".to_string(),
        },
        BranchRestriction {
            kind: "force".to_string(),
            pattern: "*".to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_parses_with_defaults() {
        let raw = r#"
            [server]
            base_url = "http://localhost:7990"
            username = "admin"
            password = "admin"
            domain = "localhost:7990"

            [cloud]
            workspace = "acme"
            username = "bot"
            token = "app-password"
        "#;
        let config: MigrationConfig = toml::from_str(raw).unwrap();
        config.validate().unwrap();
        assert_eq!(config.cloud.api_base_url, "https://api.bitbucket.org");
        assert_eq!(config.migration.push_branch, "master");
        assert!(config.migration.sync_lfs);
        assert_eq!(config.branch_policy.branch_types.len(), 4);
        assert_eq!(config.branch_policy.restrictions.len(), 2);
        assert_eq!(
            config.repository_root(),
            PathBuf::from("./repositories")
        );
    }

    #[test]
    fn validate_reports_all_missing_fields() {
        let config = MigrationConfig::default();
        let err = config.validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("server.base_url"));
        assert!(msg.contains("cloud.workspace"));
    }

    #[test]
    fn absolute_repository_dir_wins_over_data_dir() {
        let mut config = MigrationConfig::default();
        config.migration.data_dir = PathBuf::from("/data");
        config.migration.repository_dir = PathBuf::from("/mnt/repos");
        assert_eq!(config.repository_root(), PathBuf::from("/mnt/repos"));
    }
}
