//! Personal repository transfer stage.
//!
//! Per exported row: fetch the server repository, resolve the owner's
//! cloud account through the user correspondence, create the cloud
//! repository as `{owner}-{slug}` under the personal project, grant the
//! owner admin, and mirror content (and LFS). A repository that already
//! exists on the cloud side is still mirrored, so an interrupted run
//! finishes on re-invocation.

use anyhow::Result;
use smig_common::MigrationConfig;
use smig_common::api::{CloudApi, ServerApi};
use smig_common::errors::ApplyOutcome;
use smig_common::git::{MirrorSync, SyncOptions};
use smig_common::interchange::{self, PERSONAL_REPOS_CSV, USER_MATCH_CSV};
use smig_common::normalize::match_key;
use smig_common::permissions::CloudPermission;
use smig_common::types::{PersonalRepo, RepositoryMigrationUnit, UserMatch};
use tracing::{error, info, warn};

use super::{RunSummary, uuid_by_display_name};

pub fn run(config: &MigrationConfig) -> Result<()> {
    let server = ServerApi::new(&config.server);
    let cloud = CloudApi::new(&config.cloud);

    let users: Vec<UserMatch> = interchange::read_rows(&config.data_file(USER_MATCH_CSV))?;
    let uuid_by_name = uuid_by_display_name(&users);
    let rows: Vec<PersonalRepo> =
        interchange::read_rows(&config.data_file(PERSONAL_REPOS_CSV))?;

    let sync = MirrorSync::new(
        &config.server.username,
        &config.server.password,
        SyncOptions {
            push: config.migration.push,
            sync_lfs: config.migration.sync_lfs,
            branch: config.migration.push_branch.clone(),
        },
    );
    let root = config.repository_root();
    let project_key = &config.migration.personal_project_key;

    let mut summary = RunSummary::new("transfer-personal-repos");
    for row in &rows {
        info!(user = %row.user, repo = %row.slug, "processing personal repository");

        // The personal project key is the tilde-prefixed username.
        let details = match server.get_repo(&row.user, &row.slug) {
            Ok(details) => details,
            Err(e) => {
                error!(user = %row.user, repo = %row.slug, error = %e, "cannot fetch repository details");
                summary.fail();
                continue;
            }
        };

        let Some(uuid) = uuid_by_name.get(&match_key(&details.owner_display_name)) else {
            warn!(
                owner = %details.owner_display_name,
                repo = %row.slug,
                "owner has no cloud account, skipping"
            );
            summary.skip();
            continue;
        };

        let owner = row.user.trim_start_matches('~');
        let new_name = format!("{owner}-{}", row.slug);
        let (outcome, clone_https) = cloud.create_repo(&new_name, project_key)?;
        info!(repo = %new_name, %outcome, "cloud repository");
        match &outcome {
            ApplyOutcome::Failed(_) => {
                summary.record(&outcome);
                continue;
            }
            _ => summary.record(&outcome),
        }

        let grant = cloud.set_repo_user_permission(&new_name, uuid, CloudPermission::Admin)?;
        info!(repo = %new_name, owner = %details.owner_display_name, %grant, "owner admin grant");

        // A pre-existing repository still gets mirrored; construct the
        // clone URL when the create response did not supply one.
        let target_url = clone_https.unwrap_or_else(|| {
            format!(
                "https://bitbucket.org/{}/{new_name}.git",
                config.cloud.workspace
            )
        });
        let unit = RepositoryMigrationUnit {
            name: new_name.clone(),
            project_key: project_key.clone(),
            source_url: details.clone_https.clone(),
            target_url,
            local_path: root.join(&new_name),
        };
        if let Err(e) = sync.sync(&unit) {
            error!(repo = %new_name, error = %e, "mirror sync failed");
            summary.fail();
        }
    }
    summary.log();
    Ok(())
}
