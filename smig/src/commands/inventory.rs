//! Repository inventory stage: fetch both sides, write the two inventory
//! CSVs, then write the merged correspondence used by every later stage.

use anyhow::{Context, Result};
use smig_common::MigrationConfig;
use smig_common::api::{CloudApi, ServerApi};
use smig_common::interchange::{
    self, CLOUD_REPOS_CSV, MERGED_REPOS_CSV, SERVER_REPOS_CSV,
};
use smig_common::reconcile::reconcile_repos;
use tracing::info;

pub fn run(config: &MigrationConfig) -> Result<()> {
    let cloud = CloudApi::new(&config.cloud);
    let server = ServerApi::new(&config.server);

    info!("fetching cloud repository inventory");
    let cloud_repos = cloud
        .list_repos()
        .context("fetching cloud repositories")?;
    interchange::write_rows(&config.data_file(CLOUD_REPOS_CSV), &cloud_repos)?;
    info!(count = cloud_repos.len(), file = CLOUD_REPOS_CSV, "wrote cloud inventory");

    info!("fetching server repository inventory");
    let server_repos = server
        .list_repos()
        .context("fetching server repositories")?;
    interchange::write_rows(&config.data_file(SERVER_REPOS_CSV), &server_repos)?;
    info!(count = server_repos.len(), file = SERVER_REPOS_CSV, "wrote server inventory");

    let merged = reconcile_repos(&server_repos, &cloud_repos);
    let matched = merged.iter().filter(|r| r.matched).count();
    let unmatched: Vec<&str> = merged
        .iter()
        .filter(|r| !r.matched)
        .map(|r| r.name.as_str())
        .collect();
    if !unmatched.is_empty() {
        info!(count = unmatched.len(), names = ?unmatched, "unmatched repositories");
    }
    interchange::write_rows(&config.data_file(MERGED_REPOS_CSV), &merged)?;
    info!(
        total = merged.len(),
        matched,
        file = MERGED_REPOS_CSV,
        "wrote merged correspondence"
    );
    Ok(())
}
