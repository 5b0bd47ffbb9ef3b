//! Reviewer copy stage: read the default-reviewer conditions of every
//! server repository and add the corresponding cloud users as default
//! reviewers, resolved through the user correspondence.

use anyhow::Result;
use smig_common::MigrationConfig;
use smig_common::api::{CloudApi, ServerApi};
use smig_common::interchange::{self, SERVER_REPOS_CSV, USER_MATCH_CSV};
use smig_common::types::{ServerRepo, UserMatch};
use tracing::{info, warn};

use super::{RunSummary, rows_by_server_id};

pub fn run(config: &MigrationConfig) -> Result<()> {
    let server = ServerApi::new(&config.server);
    let cloud = CloudApi::new(&config.cloud);

    let users: Vec<UserMatch> = interchange::read_rows(&config.data_file(USER_MATCH_CSV))?;
    let by_server_id = rows_by_server_id(&users);
    let repos: Vec<ServerRepo> = interchange::read_rows(&config.data_file(SERVER_REPOS_CSV))?;

    let mut summary = RunSummary::new("sync-reviewers");
    for repo in &repos {
        info!(project = %repo.project_key, repo = %repo.slug, "copying default reviewers");
        let conditions = match server.reviewer_conditions(&repo.project_key, &repo.slug) {
            Ok(conditions) => conditions,
            Err(e) => {
                warn!(repo = %repo.slug, error = %e, "cannot fetch reviewer conditions, skipping");
                summary.fail();
                continue;
            }
        };

        for condition in &conditions {
            for reviewer in &condition.reviewers {
                let Some(row) = by_server_id.get(&reviewer.id.to_string()) else {
                    warn!(
                        reviewer = %reviewer.display_name,
                        repo = %repo.slug,
                        "reviewer missing from user correspondence, skipping"
                    );
                    summary.skip();
                    continue;
                };
                if row.cloud_uuid.is_empty() {
                    warn!(
                        reviewer = %reviewer.display_name,
                        repo = %repo.slug,
                        "reviewer has no cloud account, skipping"
                    );
                    summary.skip();
                    continue;
                }
                let outcome = cloud.add_default_reviewer(&repo.slug, &row.cloud_uuid)?;
                info!(reviewer = %reviewer.display_name, repo = %repo.slug, %outcome, "default reviewer");
                summary.record(&outcome);
            }
        }
    }
    summary.log();
    Ok(())
}
