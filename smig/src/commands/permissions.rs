//! Permission transfer stage: project-level grants first, then
//! repository-level grants, users and groups at each scope. Levels map
//! through the finite taxonomy; unknown levels and principals without a
//! cloud counterpart are skipped with a warning, never an error. One
//! project's or repository's failure never stops the stage.

use std::collections::{BTreeSet, HashMap};

use anyhow::Result;
use smig_common::MigrationConfig;
use smig_common::api::{CloudApi, ServerApi};
use smig_common::interchange::{self, SERVER_REPOS_CSV, USER_MATCH_CSV};
use smig_common::normalize::match_key;
use smig_common::permissions::{CloudPermission, map_project_permission, map_repo_permission};
use smig_common::types::{PermissionGrant, Principal, ServerRepo, UserMatch};
use tracing::{info, warn};

use super::{RunSummary, uuid_by_display_name};

/// Where a grant is applied on the cloud side.
enum Scope<'a> {
    Project(&'a str),
    Repo(&'a str),
}

pub fn run(config: &MigrationConfig) -> Result<()> {
    let server = ServerApi::new(&config.server);
    let cloud = CloudApi::new(&config.cloud);

    let users: Vec<UserMatch> = interchange::read_rows(&config.data_file(USER_MATCH_CSV))?;
    let uuid_by_name = uuid_by_display_name(&users);
    // Without the group listing every group grant is skipped with a
    // warning; user grants still go through.
    let group_slugs = match cloud.group_slugs() {
        Ok(slugs) => slugs,
        Err(e) => {
            warn!(error = %e, "group listing unavailable, group grants will be skipped");
            HashMap::new()
        }
    };
    let repos: Vec<ServerRepo> = interchange::read_rows(&config.data_file(SERVER_REPOS_CSV))?;

    let mut summary = RunSummary::new("transfer-permissions");

    info!("replaying project-level permissions");
    let projects: BTreeSet<&str> = repos.iter().map(|r| r.project_key.as_str()).collect();
    for project in projects {
        let grants = match list_project_grants(&server, project) {
            Ok(grants) => grants,
            Err(e) => {
                warn!(project, error = %e, "listing project permissions failed, skipping project");
                summary.fail();
                continue;
            }
        };
        for grant in &grants {
            if let Err(e) = apply_grant(
                &cloud,
                Scope::Project(project),
                grant,
                map_project_permission(&grant.permission),
                &uuid_by_name,
                &group_slugs,
                &mut summary,
            ) {
                warn!(project, error = %e, "applying project grant failed");
                summary.fail();
            }
        }
        info!(project, "project permissions processed");
    }

    info!("replaying repository-level permissions");
    for repo in &repos {
        let grants = match list_repo_grants(&server, repo) {
            Ok(grants) => grants,
            Err(e) => {
                warn!(repo = %repo.slug, error = %e, "listing repository permissions failed, skipping repository");
                summary.fail();
                continue;
            }
        };
        for grant in &grants {
            if let Err(e) = apply_grant(
                &cloud,
                Scope::Repo(&repo.slug),
                grant,
                map_repo_permission(&grant.permission),
                &uuid_by_name,
                &group_slugs,
                &mut summary,
            ) {
                warn!(repo = %repo.slug, error = %e, "applying repository grant failed");
                summary.fail();
            }
        }
        info!(repo = %repo.slug, "repository permissions processed");
    }

    summary.log();
    Ok(())
}

fn list_project_grants(
    server: &ServerApi,
    project: &str,
) -> smig_common::Result<Vec<PermissionGrant>> {
    let mut grants = server.project_user_permissions(project)?;
    grants.extend(server.project_group_permissions(project)?);
    Ok(grants)
}

fn list_repo_grants(
    server: &ServerApi,
    repo: &ServerRepo,
) -> smig_common::Result<Vec<PermissionGrant>> {
    let mut grants = server.repo_user_permissions(&repo.project_key, &repo.slug)?;
    grants.extend(server.repo_group_permissions(&repo.project_key, &repo.slug)?);
    Ok(grants)
}

fn apply_grant(
    cloud: &CloudApi,
    scope: Scope<'_>,
    grant: &PermissionGrant,
    mapped: Option<CloudPermission>,
    uuid_by_name: &HashMap<String, String>,
    group_slugs: &HashMap<String, String>,
    summary: &mut RunSummary,
) -> Result<()> {
    let Some(permission) = mapped else {
        warn!(level = %grant.permission, "no mapping for permission level, skipping grant");
        summary.skip();
        return Ok(());
    };

    let outcome = match &grant.principal {
        Principal::User { display_name } => {
            let Some(uuid) = uuid_by_name.get(&match_key(display_name)) else {
                warn!(user = %display_name, "no cloud account for user, skipping grant");
                summary.skip();
                return Ok(());
            };
            match scope {
                Scope::Project(key) => cloud.set_project_user_permission(key, uuid, permission)?,
                Scope::Repo(slug) => cloud.set_repo_user_permission(slug, uuid, permission)?,
            }
        }
        Principal::Group { name } => {
            let Some(slug) = group_slugs.get(name) else {
                warn!(group = %name, "no cloud group slug, skipping grant");
                summary.skip();
                return Ok(());
            };
            match scope {
                Scope::Project(key) => cloud.set_project_group_permission(key, slug, permission)?,
                Scope::Repo(slug_) => cloud.set_repo_group_permission(slug_, slug, permission)?,
            }
        }
    };
    summary.record(&outcome);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use smig_common::interchange::write_rows;

    fn server_repo(slug: &str, project: &str) -> ServerRepo {
        ServerRepo {
            id: 1,
            slug: slug.to_string(),
            name: slug.to_string(),
            scm_id: "git".to_string(),
            project_key: project.to_string(),
            https: format!("http://127.0.0.1:1/scm/{project}/{slug}.git"),
            ssh: String::new(),
        }
    }

    #[test]
    fn unreachable_endpoints_never_abort_the_stage() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = MigrationConfig::default();
        // Nothing listens on port 1, so every listing call fails; each
        // failure must be contained at its project or repository.
        config.server.base_url = "http://127.0.0.1:1".to_string();
        config.cloud.workspace = "acme".to_string();
        config.cloud.api_base_url = "http://127.0.0.1:1".to_string();
        config.migration.data_dir = dir.path().to_path_buf();

        let users = vec![UserMatch {
            server_display_name: "John Doe".to_string(),
            cloud_uuid: "{u1}".to_string(),
            ..Default::default()
        }];
        write_rows(&config.data_file(USER_MATCH_CSV), &users).unwrap();
        let repos = vec![server_repo("svc-a", "PRJ"), server_repo("svc-b", "OPS")];
        write_rows(&config.data_file(SERVER_REPOS_CSV), &repos).unwrap();

        run(&config).unwrap();
    }
}
