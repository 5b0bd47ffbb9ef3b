//! Content mirroring stage: one git mirror synchronization per matched
//! repository in the merged correspondence. One repository's failure never
//! stops the batch; re-running the stage finishes whatever is left.

use anyhow::Result;
use smig_common::{ApplyOutcome, MigrationConfig};
use smig_common::git::{MirrorSync, SyncOptions};
use smig_common::interchange::{self, MERGED_REPOS_CSV};
use smig_common::types::{MergedRepo, RepositoryMigrationUnit};
use tracing::{error, info, warn};

use super::RunSummary;

pub fn run(config: &MigrationConfig) -> Result<()> {
    let merged: Vec<MergedRepo> =
        interchange::read_rows(&config.data_file(MERGED_REPOS_CSV))?;
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

    let mut summary = RunSummary::new("mirror");
    for repo in &merged {
        // Unmatched rows must not drive a write to the side they lack.
        if !repo.matched || repo.source.is_empty() || repo.target.is_empty() {
            warn!(repo = %repo.name, "no counterpart on both sides, skipping");
            summary.skip();
            continue;
        }
        info!(repo = %repo.name, "mirroring repository");
        let unit = RepositoryMigrationUnit {
            name: repo.name.clone(),
            project_key: repo.project_key.clone(),
            source_url: repo.source.clone(),
            target_url: repo.target.clone(),
            local_path: root.join(&repo.name),
        };
        match sync.sync(&unit) {
            Ok(()) => summary.record(&ApplyOutcome::Created),
            Err(e) => {
                error!(repo = %repo.name, error = %e, "mirror sync failed");
                summary.fail();
            }
        }
    }
    summary.log();
    Ok(())
}
