//! Bitbucket Server (on-prem) REST client.
//!
//! Listing endpoints page with the `start`/`limit`/`isLastPage` idiom; the
//! loop follows `nextPageStart` until the server flags the last page. Page
//! payload parsing is split out as pure functions so pagination behavior is
//! testable without a live server.

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::errors::Result;
use crate::types::{
    PermissionGrant, PersonalRepoDetails, Principal, ReviewerCondition, ServerRepo,
    ServerReviewer, ServerUser,
};

use super::{HttpTransport, status_error};

const PROJECT_PAGE_LIMIT: u64 = 100;
const REPO_PAGE_LIMIT: u64 = 1000;
const USER_PAGE_LIMIT: u64 = 100;

pub struct ServerApi {
    transport: HttpTransport,
    base_url: String,
}

impl ServerApi {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            transport: HttpTransport::new(&config.username, &config.password),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch every page of a listing endpoint. A non-success response on
    /// any page terminates the fetch for this resource; records from
    /// completed pages are never partially mixed with a failed page. The
    /// in-memory partial is discarded with the error: interchange files
    /// are only ever written from a complete listing, so a failed fetch
    /// leaves any previous file intact and a re-run fetches from the
    /// start.
    fn get_paged(&self, path: &str, limit: u64) -> Result<Vec<Value>> {
        let mut start = 0;
        let mut records = Vec::new();
        loop {
            let url = format!("{}{path}?start={start}&limit={limit}", self.base_url);
            let response = self.transport.get(&url)?;
            if !response.ok() {
                return Err(status_error(&url, &response));
            }
            let page = response.json()?;
            let (values, next) = parse_server_page(&page, start, limit);
            debug!(path, start, count = values.len(), "fetched server page");
            records.extend(values);
            match next {
                Some(next_start) => start = next_start,
                None => break,
            }
        }
        Ok(records)
    }

    /// All project keys visible to the migration account.
    pub fn list_projects(&self) -> Result<Vec<String>> {
        let values = self.get_paged("/rest/api/1.0/projects", PROJECT_PAGE_LIMIT)?;
        Ok(values
            .iter()
            .filter_map(|p| p["key"].as_str().map(str::to_string))
            .collect())
    }

    /// Full repository inventory across all projects.
    ///
    /// A failure listing one project's repositories skips that project and
    /// continues; repositories already collected are kept.
    pub fn list_repos(&self) -> Result<Vec<ServerRepo>> {
        let mut repos = Vec::new();
        for project_key in self.list_projects()? {
            match self.list_project_repos(&project_key) {
                Ok(mut page) => repos.append(&mut page),
                Err(e) => {
                    warn!(project = %project_key, error = %e, "skipping project repository listing");
                }
            }
        }
        Ok(repos)
    }

    fn list_project_repos(&self, project_key: &str) -> Result<Vec<ServerRepo>> {
        let path = format!("/rest/api/1.0/projects/{project_key}/repos");
        let values = self.get_paged(&path, REPO_PAGE_LIMIT)?;
        Ok(values
            .iter()
            .filter_map(|v| parse_server_repo(v, project_key))
            .collect())
    }

    /// Full user inventory.
    pub fn list_users(&self) -> Result<Vec<ServerUser>> {
        let values = self.get_paged("/rest/api/latest/users", USER_PAGE_LIMIT)?;
        Ok(values.iter().filter_map(parse_server_user).collect())
    }

    /// Details of a single repository, used for personal-repo transfer.
    pub fn get_repo(&self, project_key: &str, slug: &str) -> Result<PersonalRepoDetails> {
        let url = format!(
            "{}/rest/api/1.0/projects/{project_key}/repos/{slug}",
            self.base_url
        );
        let response = self.transport.get(&url)?;
        if !response.ok() {
            return Err(status_error(&url, &response));
        }
        let value = response.json()?;
        let (https, _ssh) = parse_clone_links(&value);
        Ok(PersonalRepoDetails {
            owner_display_name: value["project"]["owner"]["displayName"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
            clone_https: https,
        })
    }

    /// Project-level permission grants for users.
    pub fn project_user_permissions(&self, project_key: &str) -> Result<Vec<PermissionGrant>> {
        let path = format!("/rest/api/1.0/projects/{project_key}/permissions/users");
        let values = self.get_paged(&path, USER_PAGE_LIMIT)?;
        Ok(values.iter().filter_map(parse_user_grant).collect())
    }

    /// Project-level permission grants for groups.
    pub fn project_group_permissions(&self, project_key: &str) -> Result<Vec<PermissionGrant>> {
        let path = format!("/rest/api/1.0/projects/{project_key}/permissions/groups");
        let values = self.get_paged(&path, USER_PAGE_LIMIT)?;
        Ok(values.iter().filter_map(parse_group_grant).collect())
    }

    /// Repository-level permission grants for users.
    pub fn repo_user_permissions(
        &self,
        project_key: &str,
        slug: &str,
    ) -> Result<Vec<PermissionGrant>> {
        let path = format!("/rest/api/1.0/projects/{project_key}/repos/{slug}/permissions/users");
        let values = self.get_paged(&path, USER_PAGE_LIMIT)?;
        Ok(values.iter().filter_map(parse_user_grant).collect())
    }

    /// Repository-level permission grants for groups.
    pub fn repo_group_permissions(
        &self,
        project_key: &str,
        slug: &str,
    ) -> Result<Vec<PermissionGrant>> {
        let path = format!("/rest/api/1.0/projects/{project_key}/repos/{slug}/permissions/groups");
        let values = self.get_paged(&path, USER_PAGE_LIMIT)?;
        Ok(values.iter().filter_map(parse_group_grant).collect())
    }

    /// Default-reviewer conditions configured on a repository.
    pub fn reviewer_conditions(
        &self,
        project_key: &str,
        slug: &str,
    ) -> Result<Vec<ReviewerCondition>> {
        let url = format!(
            "{}/rest/default-reviewers/latest/projects/{project_key}/repos/{slug}/conditions",
            self.base_url
        );
        let response = self.transport.get(&url)?;
        if !response.ok() {
            return Err(status_error(&url, &response));
        }
        let value: Value = response.json()?;
        let conditions = value
            .as_array()
            .map(|conditions| conditions.iter().map(parse_reviewer_condition).collect())
            .unwrap_or_default();
        Ok(conditions)
    }
}

/// Extract one page's records and the next start offset, if any.
pub fn parse_server_page(page: &Value, start: u64, limit: u64) -> (Vec<Value>, Option<u64>) {
    let values = page["values"].as_array().cloned().unwrap_or_default();
    let is_last = page["isLastPage"].as_bool().unwrap_or(true);
    let next = if is_last {
        None
    } else {
        Some(page["nextPageStart"].as_u64().unwrap_or(start + limit))
    };
    (values, next)
}

fn parse_server_repo(value: &Value, project_key: &str) -> Option<ServerRepo> {
    let (https, ssh) = parse_clone_links(value);
    if https.is_empty() && ssh.is_empty() {
        return None;
    }
    Some(ServerRepo {
        id: value["id"].as_u64()?,
        slug: value["slug"].as_str()?.to_string(),
        name: value["name"].as_str()?.to_string(),
        scm_id: value["scmId"].as_str().unwrap_or("git").to_string(),
        project_key: project_key.to_string(),
        https,
        ssh,
    })
}

fn parse_server_user(value: &Value) -> Option<ServerUser> {
    Some(ServerUser {
        id: value["id"].as_u64()?,
        slug: value["slug"].as_str()?.to_string(),
        display_name: value["displayName"].as_str()?.to_string(),
        email_address: value["emailAddress"].as_str().unwrap_or_default().to_string(),
    })
}

/// Pick the `http` and `ssh` clone links out of a repository payload.
fn parse_clone_links(value: &Value) -> (String, String) {
    let mut https = String::new();
    let mut ssh = String::new();
    if let Some(links) = value["links"]["clone"].as_array() {
        for link in links {
            let href = link["href"].as_str().unwrap_or_default();
            match link["name"].as_str() {
                Some("http") => https = href.to_string(),
                Some("ssh") => ssh = href.to_string(),
                _ => {}
            }
        }
    }
    (https, ssh)
}

fn parse_user_grant(value: &Value) -> Option<PermissionGrant> {
    Some(PermissionGrant {
        principal: Principal::User {
            display_name: value["user"]["displayName"].as_str()?.to_string(),
        },
        permission: value["permission"].as_str()?.to_string(),
    })
}

fn parse_group_grant(value: &Value) -> Option<PermissionGrant> {
    Some(PermissionGrant {
        principal: Principal::Group {
            name: value["group"]["name"].as_str()?.to_string(),
        },
        permission: value["permission"].as_str()?.to_string(),
    })
}

fn parse_reviewer_condition(value: &Value) -> ReviewerCondition {
    let reviewers = value["reviewers"]
        .as_array()
        .map(|reviewers| {
            reviewers
                .iter()
                .filter_map(|r| {
                    Some(ServerReviewer {
                        id: r["id"].as_u64()?,
                        display_name: r["displayName"].as_str()?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    ReviewerCondition { reviewers }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn last_page_stops_iteration() {
        let page = json!({"values": [{"id": 1}], "isLastPage": true});
        let (values, next) = parse_server_page(&page, 0, 100);
        assert_eq!(values.len(), 1);
        assert_eq!(next, None);
    }

    #[test]
    fn continuation_prefers_next_page_start() {
        let page = json!({"values": [], "isLastPage": false, "nextPageStart": 37});
        let (_, next) = parse_server_page(&page, 0, 100);
        assert_eq!(next, Some(37));
    }

    #[test]
    fn continuation_falls_back_to_start_plus_limit() {
        let page = json!({"values": [{}, {}], "isLastPage": false});
        let (_, next) = parse_server_page(&page, 100, 100);
        assert_eq!(next, Some(200));
    }

    #[test]
    fn empty_listing_is_not_an_error() {
        let page = json!({"values": [], "isLastPage": true});
        let (values, next) = parse_server_page(&page, 0, 100);
        assert!(values.is_empty());
        assert_eq!(next, None);
    }

    #[test]
    fn repo_parse_splits_clone_links_by_name() {
        let value = json!({
            "id": 42,
            "slug": "svc-a",
            "name": "svc-a",
            "scmId": "git",
            "links": {"clone": [
                {"name": "ssh", "href": "ssh://git@host:7999/prj/svc-a.git"},
                {"name": "http", "href": "http://host:7990/scm/prj/svc-a.git"}
            ]}
        });
        let repo = parse_server_repo(&value, "PRJ").unwrap();
        assert_eq!(repo.https, "http://host:7990/scm/prj/svc-a.git");
        assert_eq!(repo.ssh, "ssh://git@host:7999/prj/svc-a.git");
        assert_eq!(repo.project_key, "PRJ");
    }

    #[test]
    fn repo_without_clone_links_is_dropped() {
        let value = json!({"id": 1, "slug": "x", "name": "x", "links": {"clone": []}});
        assert!(parse_server_repo(&value, "PRJ").is_none());
    }

    #[test]
    fn grants_parse_user_and_group_shapes() {
        let user = json!({"user": {"displayName": "John Doe"}, "permission": "PROJECT_WRITE"});
        let grant = parse_user_grant(&user).unwrap();
        assert_eq!(grant.permission, "PROJECT_WRITE");
        assert!(matches!(grant.principal, Principal::User { .. }));

        let group = json!({"group": {"name": "devs"}, "permission": "REPO_READ"});
        let grant = parse_group_grant(&group).unwrap();
        assert!(matches!(grant.principal, Principal::Group { ref name } if name == "devs"));
    }

    #[test]
    fn reviewer_condition_collects_reviewers() {
        let value = json!({"reviewers": [
            {"id": 7, "displayName": "John Doe"},
            {"id": 9, "displayName": "Jane Roe"}
        ]});
        let condition = parse_reviewer_condition(&value);
        assert_eq!(condition.reviewers.len(), 2);
        assert_eq!(condition.reviewers[0].id, 7);
    }
}
