//! Typed records for both inventories and the reconciled views.
//!
//! Raw JSON from either API is parsed into these structs exactly once, at
//! the fetch boundary; everything downstream works with named fields. The
//! same structs double as CSV rows for the interchange files, so their
//! serde names are the stable on-disk column names.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One repository as reported by Bitbucket Server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerRepo {
    pub id: u64,
    pub slug: String,
    pub name: String,
    #[serde(rename = "scmId")]
    pub scm_id: String,
    pub project_key: String,
    /// HTTP clone URL; absent when the instance disables HTTP cloning.
    #[serde(default)]
    pub https: String,
    /// SSH clone URL; absent when the instance disables SSH cloning.
    #[serde(default)]
    pub ssh: String,
}

/// One repository as reported by Bitbucket Cloud.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudRepo {
    pub uuid: String,
    pub slug: String,
    pub name: String,
    pub scm: String,
    #[serde(default)]
    pub https: String,
    #[serde(default)]
    pub ssh: String,
}

/// One user account on Bitbucket Server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerUser {
    pub id: u64,
    pub slug: String,
    pub display_name: String,
    #[serde(default)]
    pub email_address: String,
}

/// One workspace member on Bitbucket Cloud.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudMember {
    pub account_id: String,
    pub uuid: String,
    pub nickname: String,
    pub display_name: String,
}

/// Merged repository correspondence row (`merged_repositories.csv`).
///
/// `source`/`target` are the HTTP clone URLs of whichever sides exist; a
/// row with `matched == false` is diagnostic only and must never drive a
/// write to the side it lacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedRepo {
    pub name: String,
    #[serde(rename = "project")]
    pub project_key: String,
    #[serde(rename = "match", with = "crate::interchange::yes_no")]
    pub matched: bool,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub target: String,
}

/// Merged user correspondence row (`bitbucket_users_match.csv`).
///
/// Fields from the side that did not report the user stay empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserMatch {
    pub server_slug: String,
    pub server_id: String,
    #[serde(rename = "server_displayName")]
    pub server_display_name: String,
    #[serde(rename = "server_emailAddress")]
    pub server_email_address: String,
    pub cloud_uuid: String,
    pub cloud_account_id: String,
    pub cloud_nickname: String,
    pub cloud_display_name: String,
}

impl UserMatch {
    /// True only when both systems reported this user.
    pub fn matched(&self) -> bool {
        !self.server_slug.is_empty() && !self.cloud_uuid.is_empty()
    }
}

/// One group-membership row (`group-membership.csv`, exported from the
/// server database by the operator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMembership {
    pub user_name: String,
    pub display_name: String,
    pub group_name: String,
}

/// One personal-repository row (`personal-repos.csv`, exported from the
/// server database by the operator). The `User` column carries the
/// tilde-prefixed personal project key, e.g. `~jdoe`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalRepo {
    #[serde(rename = "User")]
    pub user: String,
    #[serde(rename = "Repository Slug")]
    pub slug: String,
    #[serde(rename = "Repository Descr", default)]
    pub description: String,
}

/// The principal a permission grant applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// Server-side user, identified by display name (the join key into the
    /// user correspondence).
    User { display_name: String },
    /// Server-side group, identified by name.
    Group { name: String },
}

/// One permission grant as reported by the server, before taxonomy mapping.
#[derive(Debug, Clone)]
pub struct PermissionGrant {
    pub principal: Principal,
    /// Raw server-side level, e.g. `PROJECT_WRITE` or `REPO_ADMIN`.
    pub permission: String,
}

/// One default-reviewer condition on a server repository.
#[derive(Debug, Clone)]
pub struct ReviewerCondition {
    pub reviewers: Vec<ServerReviewer>,
}

/// A reviewer referenced by a condition.
#[derive(Debug, Clone)]
pub struct ServerReviewer {
    pub id: u64,
    pub display_name: String,
}

/// Everything needed to drive one git mirror synchronization.
#[derive(Debug, Clone)]
pub struct RepositoryMigrationUnit {
    pub name: String,
    pub project_key: String,
    /// Clone URL on the server side (credentials injected at use).
    pub source_url: String,
    /// Clone URL on the cloud side.
    pub target_url: String,
    /// Working copy location; persists across runs as the re-run cache.
    pub local_path: PathBuf,
}

/// Details of one personal repository fetched from the server.
#[derive(Debug, Clone)]
pub struct PersonalRepoDetails {
    pub owner_display_name: String,
    pub clone_https: String,
}
