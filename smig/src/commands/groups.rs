//! Group transfer stages: create workspace groups from the membership
//! export, then add members once the groups exist.

use std::collections::BTreeSet;

use anyhow::Result;
use smig_common::MigrationConfig;
use smig_common::api::CloudApi;
use smig_common::interchange::{self, GROUP_MEMBERSHIP_CSV, USER_MATCH_CSV};
use smig_common::normalize::match_key;
use smig_common::types::{GroupMembership, UserMatch};
use tracing::{info, warn};

use super::{RunSummary, uuid_by_display_name};

/// Create every distinct group named in the membership export.
pub fn transfer_groups(config: &MigrationConfig) -> Result<()> {
    let cloud = CloudApi::new(&config.cloud);
    let memberships: Vec<GroupMembership> =
        interchange::read_rows(&config.data_file(GROUP_MEMBERSHIP_CSV))?;

    let groups: BTreeSet<&str> = memberships.iter().map(|m| m.group_name.as_str()).collect();
    info!(count = groups.len(), "creating workspace groups");

    let mut summary = RunSummary::new("transfer-groups");
    for group in groups {
        let outcome = cloud.create_group(group)?;
        info!(group, %outcome, "group");
        summary.record(&outcome);
    }
    summary.log();
    Ok(())
}

/// Add each membership row's user to its group, resolving the group slug
/// from the cloud listing and the user UUID from the correspondence.
pub fn add_memberships(config: &MigrationConfig) -> Result<()> {
    let cloud = CloudApi::new(&config.cloud);
    let slugs = cloud.group_slugs()?;
    info!(count = slugs.len(), "fetched workspace group slugs");

    let users: Vec<UserMatch> = interchange::read_rows(&config.data_file(USER_MATCH_CSV))?;
    let uuid_by_name = uuid_by_display_name(&users);
    let memberships: Vec<GroupMembership> =
        interchange::read_rows(&config.data_file(GROUP_MEMBERSHIP_CSV))?;

    let mut summary = RunSummary::new("add-memberships");
    for membership in &memberships {
        let slug = slugs.get(&membership.group_name);
        let uuid = uuid_by_name.get(&match_key(&membership.display_name));
        let (Some(slug), Some(uuid)) = (slug, uuid) else {
            warn!(
                user = %membership.display_name,
                group = %membership.group_name,
                "missing group slug or cloud account, skipping"
            );
            summary.skip();
            continue;
        };
        let outcome = cloud.add_group_member(slug, uuid)?;
        info!(user = %membership.display_name, group = %slug, %outcome, "membership");
        summary.record(&outcome);
    }
    summary.log();
    Ok(())
}
