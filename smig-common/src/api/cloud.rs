//! Bitbucket Cloud REST client.
//!
//! Listing endpoints page with an opaque `next` URL followed until absent.
//! Write endpoints return an [`ApplyOutcome`]: a conflict on create means
//! the target is already in the desired state and counts as success.

use std::collections::HashMap;

use serde_json::{Value, json};
use tracing::debug;

use crate::config::CloudConfig;
use crate::errors::{ApplyOutcome, Result};
use crate::permissions::CloudPermission;
use crate::types::{CloudMember, CloudRepo};

use super::{ApiResponse, HttpTransport, status_error};

const PAGE_LEN: u32 = 100;

pub struct CloudApi {
    transport: HttpTransport,
    workspace: String,
    api_root: String,
}

impl CloudApi {
    pub fn new(config: &CloudConfig) -> Self {
        Self {
            transport: HttpTransport::new(&config.username, &config.token),
            workspace: config.workspace.clone(),
            api_root: config.api_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Follow the `next` cursor until the listing is exhausted.
    ///
    /// A non-success page terminates the fetch for this listing with the
    /// in-memory partial discarded; interchange files are only ever written
    /// from a complete listing, so a failed fetch leaves any previous file
    /// intact and a re-run fetches from the start.
    fn get_paged(&self, first_url: String) -> Result<Vec<Value>> {
        let mut url = Some(first_url);
        let mut records = Vec::new();
        while let Some(current) = url {
            let response = self.transport.get(&current)?;
            if !response.ok() {
                return Err(status_error(&current, &response));
            }
            let page = response.json()?;
            let (values, next) = parse_cloud_page(&page);
            debug!(url = %current, count = values.len(), "fetched cloud page");
            records.extend(values);
            url = next;
        }
        Ok(records)
    }

    /// Workspace repository inventory.
    pub fn list_repos(&self) -> Result<Vec<CloudRepo>> {
        let root = &self.api_root;
        let url = format!(
            "{root}/2.0/repositories/{}?pagelen={PAGE_LEN}",
            self.workspace
        );
        let values = self.get_paged(url)?;
        Ok(values.iter().filter_map(parse_cloud_repo).collect())
    }

    /// Workspace members.
    pub fn list_members(&self) -> Result<Vec<CloudMember>> {
        let root = &self.api_root;
        let url = format!(
            "{root}/2.0/workspaces/{}/members?pagelen={PAGE_LEN}",
            self.workspace
        );
        let values = self.get_paged(url)?;
        Ok(values.iter().filter_map(parse_cloud_member).collect())
    }

    /// Create a private repository under a project. On success the HTTP
    /// clone URL of the new repository is returned alongside the outcome.
    pub fn create_repo(
        &self,
        slug: &str,
        project_key: &str,
    ) -> Result<(ApplyOutcome, Option<String>)> {
        let root = &self.api_root;
        let url = format!("{root}/2.0/repositories/{}/{slug}", self.workspace);
        let payload = json!({
            "scm": "git",
            "is_private": true,
            "project": {"key": project_key},
        });
        let response = self.transport.post_json(&url, &payload)?;
        let outcome = classify(&response);
        let clone_https = if response.ok() {
            response
                .json()
                .ok()
                .and_then(|v| clone_link(&v, "https"))
        } else {
            None
        };
        Ok((outcome, clone_https))
    }

    /// Set a user's permission on a project.
    pub fn set_project_user_permission(
        &self,
        project_key: &str,
        uuid: &str,
        permission: CloudPermission,
    ) -> Result<ApplyOutcome> {
        let root = &self.api_root;
        let url = format!(
            "{root}/2.0/workspaces/{}/projects/{project_key}/permissions-config/users/{uuid}",
            self.workspace
        );
        let response = self
            .transport
            .put_json(&url, &json!({"permission": permission.as_str()}))?;
        Ok(classify(&response))
    }

    /// Set a group's permission on a project.
    pub fn set_project_group_permission(
        &self,
        project_key: &str,
        group_slug: &str,
        permission: CloudPermission,
    ) -> Result<ApplyOutcome> {
        let root = &self.api_root;
        let url = format!(
            "{root}/2.0/workspaces/{}/projects/{project_key}/permissions-config/groups/{group_slug}",
            self.workspace
        );
        let response = self
            .transport
            .put_json(&url, &json!({"permission": permission.as_str()}))?;
        Ok(classify(&response))
    }

    /// Set a user's permission on a repository.
    pub fn set_repo_user_permission(
        &self,
        repo_slug: &str,
        uuid: &str,
        permission: CloudPermission,
    ) -> Result<ApplyOutcome> {
        let root = &self.api_root;
        let url = format!(
            "{root}/2.0/repositories/{}/{repo_slug}/permissions-config/users/{uuid}",
            self.workspace
        );
        let response = self
            .transport
            .put_json(&url, &json!({"permission": permission.as_str()}))?;
        Ok(classify(&response))
    }

    /// Set a group's permission on a repository.
    pub fn set_repo_group_permission(
        &self,
        repo_slug: &str,
        group_slug: &str,
        permission: CloudPermission,
    ) -> Result<ApplyOutcome> {
        let root = &self.api_root;
        let url = format!(
            "{root}/2.0/repositories/{}/{repo_slug}/permissions-config/groups/{group_slug}",
            self.workspace
        );
        let response = self
            .transport
            .put_json(&url, &json!({"permission": permission.as_str()}))?;
        Ok(classify(&response))
    }

    /// Create a workspace group.
    pub fn create_group(&self, name: &str) -> Result<ApplyOutcome> {
        let root = &self.api_root;
        let url = format!("{root}/1.0/groups/{}", self.workspace);
        let response = self.transport.post_form(&url, &[("name", name)])?;
        Ok(classify(&response))
    }

    /// Group name → slug for every group in the workspace.
    pub fn group_slugs(&self) -> Result<HashMap<String, String>> {
        let root = &self.api_root;
        let url = format!("{root}/1.0/groups/{}/", self.workspace);
        let response = self.transport.get(&url)?;
        if !response.ok() {
            return Err(status_error(&url, &response));
        }
        let value: Value = response.json()?;
        let mut slugs = HashMap::new();
        if let Some(groups) = value.as_array() {
            for group in groups {
                if let (Some(name), Some(slug)) = (group["name"].as_str(), group["slug"].as_str())
                {
                    slugs.insert(name.to_string(), slug.to_string());
                }
            }
        }
        Ok(slugs)
    }

    /// Add a member to a group.
    pub fn add_group_member(&self, group_slug: &str, uuid: &str) -> Result<ApplyOutcome> {
        let root = &self.api_root;
        let url = format!(
            "{root}/1.0/groups/{}/{group_slug}/members/{uuid}/",
            self.workspace
        );
        let response = self.transport.put_empty(&url)?;
        Ok(classify(&response))
    }

    /// Replace a repository's branching-model settings.
    pub fn set_branching_model(&self, repo_slug: &str, settings: &Value) -> Result<ApplyOutcome> {
        let root = &self.api_root;
        let url = format!(
            "{root}/2.0/repositories/{}/{repo_slug}/branching-model/settings",
            self.workspace
        );
        let response = self.transport.put_json(&url, settings)?;
        Ok(classify(&response))
    }

    /// Add one branch restriction to a repository.
    pub fn add_branch_restriction(
        &self,
        repo_slug: &str,
        restriction: &Value,
    ) -> Result<ApplyOutcome> {
        let root = &self.api_root;
        let url = format!(
            "{root}/2.0/repositories/{}/{repo_slug}/branch-restrictions",
            self.workspace
        );
        let response = self.transport.post_json(&url, restriction)?;
        Ok(classify(&response))
    }

    /// Add a default reviewer to a repository.
    pub fn add_default_reviewer(&self, repo_slug: &str, uuid: &str) -> Result<ApplyOutcome> {
        let root = &self.api_root;
        let url = format!(
            "{root}/2.0/repositories/{}/{repo_slug}/default-reviewers/{uuid}",
            self.workspace
        );
        let response = self.transport.put_empty(&url)?;
        Ok(classify(&response))
    }
}

/// Classify a write response. A 409, or a 400 whose body mentions prior
/// existence, is the recognizable conflict shape of an idempotent re-run.
fn classify(response: &ApiResponse) -> ApplyOutcome {
    if response.ok() {
        return ApplyOutcome::Created;
    }
    let already = response.status == 409
        || (response.status == 400 && response.body.to_lowercase().contains("already exists"));
    if already {
        ApplyOutcome::AlreadyExists
    } else {
        ApplyOutcome::Failed(format!("HTTP {}: {}", response.status, response.body))
    }
}

/// Extract one page's records and the next-page URL, if any.
pub fn parse_cloud_page(page: &Value) -> (Vec<Value>, Option<String>) {
    let values = page["values"].as_array().cloned().unwrap_or_default();
    let next = page["next"].as_str().map(str::to_string);
    (values, next)
}

fn parse_cloud_repo(value: &Value) -> Option<CloudRepo> {
    Some(CloudRepo {
        uuid: value["uuid"].as_str()?.to_string(),
        slug: value["slug"].as_str()?.to_string(),
        name: value["name"].as_str()?.to_string(),
        scm: value["scm"].as_str().unwrap_or("git").to_string(),
        https: clone_link(value, "https").unwrap_or_default(),
        ssh: clone_link(value, "ssh").unwrap_or_default(),
    })
}

fn parse_cloud_member(value: &Value) -> Option<CloudMember> {
    let user = &value["user"];
    Some(CloudMember {
        account_id: user["account_id"].as_str()?.to_string(),
        uuid: user["uuid"].as_str()?.to_string(),
        nickname: user["nickname"].as_str().unwrap_or_default().to_string(),
        display_name: user["display_name"].as_str()?.to_string(),
    })
}

fn clone_link(value: &Value, name: &str) -> Option<String> {
    value["links"]["clone"]
        .as_array()?
        .iter()
        .find(|link| link["name"].as_str() == Some(name))
        .and_then(|link| link["href"].as_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cursor_page_yields_next_url() {
        let page = json!({
            "values": [{"slug": "a"}],
            "next": "https://api.bitbucket.org/2.0/repositories/ws?page=2"
        });
        let (values, next) = parse_cloud_page(&page);
        assert_eq!(values.len(), 1);
        assert!(next.unwrap().ends_with("page=2"));
    }

    #[test]
    fn final_page_has_no_cursor() {
        let page = json!({"values": []});
        let (values, next) = parse_cloud_page(&page);
        assert!(values.is_empty());
        assert_eq!(next, None);
    }

    #[test]
    fn repo_parse_reads_named_clone_links() {
        let value = json!({
            "uuid": "{r1}",
            "slug": "svc-a",
            "name": "svc-a",
            "scm": "git",
            "links": {"clone": [
                {"name": "https", "href": "https://bitbucket.org/ws/svc-a.git"},
                {"name": "ssh", "href": "git@bitbucket.org:ws/svc-a.git"}
            ]}
        });
        let repo = parse_cloud_repo(&value).unwrap();
        assert_eq!(repo.https, "https://bitbucket.org/ws/svc-a.git");
        assert_eq!(repo.ssh, "git@bitbucket.org:ws/svc-a.git");
    }

    #[test]
    fn member_parse_reads_nested_user() {
        let value = json!({"user": {
            "account_id": "557058:abc",
            "uuid": "{u1}",
            "nickname": "jdoe",
            "display_name": "John Doe"
        }});
        let member = parse_cloud_member(&value).unwrap();
        assert_eq!(member.uuid, "{u1}");
        assert_eq!(member.display_name, "John Doe");
    }

    #[test]
    fn conflict_statuses_classify_as_already_exists() {
        let created = ApiResponse { status: 201, body: String::new() };
        assert_eq!(classify(&created), ApplyOutcome::Created);

        let conflict = ApiResponse { status: 409, body: "conflict".to_string() };
        assert_eq!(classify(&conflict), ApplyOutcome::AlreadyExists);

        let duplicate = ApiResponse {
            status: 400,
            body: "Repository with this Slug and Owner already exists.".to_string(),
        };
        assert_eq!(classify(&duplicate), ApplyOutcome::AlreadyExists);

        let denied = ApiResponse { status: 403, body: "forbidden".to_string() };
        assert!(matches!(classify(&denied), ApplyOutcome::Failed(_)));
    }
}
