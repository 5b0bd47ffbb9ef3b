//! Reference rewriting stage: update clone URLs inside every matched
//! repository's working tree, then commit and push trees that changed.
//! Rewriting an already-rewritten tree is a no-op.

use anyhow::Result;
use smig_common::{ApplyOutcome, MigrationConfig};
use smig_common::interchange::{self, MERGED_REPOS_CSV};
use smig_common::rewrite::{commit_and_push, default_rules, rewrite_tree};
use smig_common::types::MergedRepo;
use tracing::{error, info, warn};

use super::RunSummary;

pub fn run(config: &MigrationConfig) -> Result<()> {
    let rules = default_rules(&config.server.domain, &config.cloud.workspace)?;
    let merged: Vec<MergedRepo> =
        interchange::read_rows(&config.data_file(MERGED_REPOS_CSV))?;
    let root = config.repository_root();

    let mut summary = RunSummary::new("rewrite-refs");
    for repo in &merged {
        // Unmatched rows must not drive a write to the side they lack,
        // even when a working copy happens to exist on disk.
        if !repo.matched {
            warn!(repo = %repo.name, "no counterpart on both sides, skipping");
            summary.skip();
            continue;
        }
        let tree = root.join(&repo.name);
        if !tree.is_dir() {
            warn!(repo = %repo.name, "no working copy on disk, skipping");
            summary.skip();
            continue;
        }
        info!(repo = %repo.name, "rewriting references");
        match rewrite_tree(&tree, &rules) {
            Ok(changed) => {
                info!(repo = %repo.name, changed = changed.len(), "tree walk complete");
            }
            Err(e) => {
                error!(repo = %repo.name, error = %e, "tree walk failed");
                summary.fail();
                continue;
            }
        }
        match commit_and_push(&tree, &config.migration.push_branch, config.migration.push) {
            Ok(true) => {
                info!(repo = %repo.name, "changes committed");
                summary.record(&ApplyOutcome::Created);
            }
            Ok(false) => {
                info!(repo = %repo.name, "nothing to commit");
                summary.record(&ApplyOutcome::AlreadyExists);
            }
            Err(e) => {
                error!(repo = %repo.name, error = %e, "commit failed");
                summary.fail();
            }
        }
    }
    summary.log();
    Ok(())
}
