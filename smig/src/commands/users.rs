//! User export stage: fetch members from both sides, reconcile on the
//! normalized display name, fold rows that share a server slug or cloud
//! nickname, and persist the correspondence CSV.

use anyhow::{Context, Result};
use smig_common::MigrationConfig;
use smig_common::api::{CloudApi, ServerApi};
use smig_common::interchange::{self, USER_MATCH_CSV};
use smig_common::reconcile::{merge_user_rows, reconcile_users};
use tracing::info;

pub fn run(config: &MigrationConfig) -> Result<()> {
    let cloud = CloudApi::new(&config.cloud);
    let server = ServerApi::new(&config.server);

    info!("fetching cloud workspace members");
    let members = cloud.list_members().context("fetching cloud members")?;
    info!(count = members.len(), "cloud members fetched");

    info!("fetching server users");
    let users = server.list_users().context("fetching server users")?;
    info!(count = users.len(), "server users fetched");

    let rows = merge_user_rows(reconcile_users(&users, &members));
    let matched = rows.iter().filter(|r| r.matched()).count();
    info!(
        total = rows.len(),
        matched,
        unmatched = rows.len() - matched,
        "user reconciliation complete"
    );

    let path = config.data_file(USER_MATCH_CSV);
    interchange::write_rows(&path, &rows)?;
    info!(file = USER_MATCH_CSV, "wrote user correspondence");
    Ok(())
}
