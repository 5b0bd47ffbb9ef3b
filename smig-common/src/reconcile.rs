//! Joining the two inventories into reconciled views.
//!
//! Users join on the normalized display name ([`crate::normalize::match_key`])
//! because the two systems format names differently. Repositories join on
//! exact name equality — slugs and names are already canonical on both
//! sides. Output preserves insertion order of first appearance; nothing
//! downstream relies on that order.
//!
//! Entities present on only one side are retained with the other side's
//! fields empty and reported as unmatched, never silently dropped. A
//! `matched == false` entry must not drive writes to the side it lacks.

use std::collections::HashMap;

use tracing::warn;

use crate::normalize::match_key;
use crate::types::{CloudMember, CloudRepo, MergedRepo, ServerRepo, ServerUser, UserMatch};

/// Join workspace members and server users on the normalized display name.
///
/// When two distinct display names normalize onto the same key the later
/// record overwrites the earlier one field-by-field; the collision is
/// logged loudly because it means two real people merged into one row.
pub fn reconcile_users(server: &[ServerUser], cloud: &[CloudMember]) -> Vec<UserMatch> {
    let mut rows: Vec<UserMatch> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for member in cloud {
        let key = match_key(&member.display_name);
        let slot = slot_for(&mut rows, &mut index, &key);
        let row = &mut rows[slot];
        if !row.cloud_display_name.is_empty() && row.cloud_display_name != member.display_name {
            warn!(
                %key,
                existing = %row.cloud_display_name,
                incoming = %member.display_name,
                "match-key collision between distinct cloud members"
            );
        }
        row.cloud_account_id = member.account_id.clone();
        row.cloud_uuid = member.uuid.clone();
        row.cloud_nickname = member.nickname.clone();
        row.cloud_display_name = member.display_name.clone();
    }

    for user in server {
        let key = match_key(&user.display_name);
        let slot = slot_for(&mut rows, &mut index, &key);
        let row = &mut rows[slot];
        if !row.server_display_name.is_empty() && row.server_display_name != user.display_name {
            warn!(
                %key,
                existing = %row.server_display_name,
                incoming = %user.display_name,
                "match-key collision between distinct server users"
            );
        }
        row.server_id = user.id.to_string();
        row.server_slug = user.slug.clone();
        row.server_display_name = user.display_name.clone();
        row.server_email_address = user.email_address.clone();
    }

    rows
}

fn slot_for(
    rows: &mut Vec<UserMatch>,
    index: &mut HashMap<String, usize>,
    key: &str,
) -> usize {
    if let Some(&slot) = index.get(key) {
        return slot;
    }
    rows.push(UserMatch::default());
    let slot = rows.len() - 1;
    index.insert(key.to_string(), slot);
    slot
}

/// Second merge pass over correspondence rows: rows sharing a server slug
/// or, failing that, a cloud nickname are folded together, preferring the
/// most recently observed non-empty value per field. Catches users whose
/// display names differ across systems but who are the same account.
pub fn merge_user_rows(rows: Vec<UserMatch>) -> Vec<UserMatch> {
    let mut merged: Vec<UserMatch> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let key = if !row.server_slug.is_empty() {
            row.server_slug.clone()
        } else {
            row.cloud_nickname.clone()
        };
        match index.get(&key) {
            Some(&slot) => {
                let dst = &mut merged[slot];
                merge_field(&mut dst.server_slug, &row.server_slug);
                merge_field(&mut dst.server_id, &row.server_id);
                merge_field(&mut dst.server_display_name, &row.server_display_name);
                merge_field(&mut dst.server_email_address, &row.server_email_address);
                merge_field(&mut dst.cloud_uuid, &row.cloud_uuid);
                merge_field(&mut dst.cloud_account_id, &row.cloud_account_id);
                merge_field(&mut dst.cloud_nickname, &row.cloud_nickname);
                merge_field(&mut dst.cloud_display_name, &row.cloud_display_name);
            }
            None => {
                index.insert(key, merged.len());
                merged.push(row);
            }
        }
    }

    merged
}

fn merge_field(dst: &mut String, src: &str) {
    if !src.is_empty() {
        *dst = src.to_string();
    }
}

/// Join the two repository inventories on exact name equality.
///
/// Server-side rows come first in their fetch order, cloud-only rows
/// follow. Unmatched rows keep the absent side's URL empty.
pub fn reconcile_repos(server: &[ServerRepo], cloud: &[CloudRepo]) -> Vec<MergedRepo> {
    let by_name: HashMap<&str, &CloudRepo> =
        cloud.iter().map(|r| (r.name.as_str(), r)).collect();

    let mut merged: Vec<MergedRepo> = Vec::new();
    for repo in server {
        let counterpart = by_name.get(repo.name.as_str());
        merged.push(MergedRepo {
            name: repo.name.clone(),
            project_key: repo.project_key.clone(),
            matched: counterpart.is_some(),
            source: repo.https.clone(),
            target: counterpart.map(|c| c.https.clone()).unwrap_or_default(),
        });
    }

    let server_names: HashMap<&str, ()> =
        server.iter().map(|r| (r.name.as_str(), ())).collect();
    for repo in cloud {
        if !server_names.contains_key(repo.name.as_str()) {
            merged.push(MergedRepo {
                name: repo.name.clone(),
                project_key: String::new(),
                matched: false,
                source: String::new(),
                target: repo.https.clone(),
            });
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_user(id: u64, slug: &str, name: &str) -> ServerUser {
        ServerUser {
            id,
            slug: slug.to_string(),
            display_name: name.to_string(),
            email_address: format!("{slug}@example.com"),
        }
    }

    fn cloud_member(uuid: &str, nickname: &str, name: &str) -> CloudMember {
        CloudMember {
            account_id: format!("acct-{nickname}"),
            uuid: uuid.to_string(),
            nickname: nickname.to_string(),
            display_name: name.to_string(),
        }
    }

    fn server_repo(slug: &str, name: &str, project: &str) -> ServerRepo {
        ServerRepo {
            id: 1,
            slug: slug.to_string(),
            name: name.to_string(),
            scm_id: "git".to_string(),
            project_key: project.to_string(),
            https: format!("http://server/{project}/{slug}.git"),
            ssh: String::new(),
        }
    }

    fn cloud_repo(slug: &str, name: &str) -> CloudRepo {
        CloudRepo {
            uuid: format!("{{{slug}}}"),
            slug: slug.to_string(),
            name: name.to_string(),
            scm: "git".to_string(),
            https: format!("https://bitbucket.org/ws/{slug}.git"),
            ssh: String::new(),
        }
    }

    #[test]
    fn diacritic_variants_match_across_systems() {
        let server = [server_user(7, "jdiaz", "José Díaz")];
        let cloud = [cloud_member("{u1}", "jose", "jose diaz")];
        let rows = reconcile_users(&server, &cloud);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].matched());
        assert_eq!(rows[0].server_slug, "jdiaz");
        assert_eq!(rows[0].cloud_uuid, "{u1}");
    }

    #[test]
    fn one_sided_users_are_retained_unmatched() {
        let server = [server_user(1, "only-server", "Only Server")];
        let cloud = [cloud_member("{u2}", "onlycloud", "Only Cloud")];
        let rows = reconcile_users(&server, &cloud);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| !r.matched()));
    }

    #[test]
    fn reconciliation_is_commutative_on_keys_and_matched() {
        let server = [
            server_user(1, "a", "Ann A"),
            server_user(2, "b", "Bob B"),
        ];
        let cloud = [cloud_member("{u}", "ann", "ann a")];

        let forward = reconcile_users(&server, &cloud);
        // Swapping which side is processed first must not change the set of
        // keys or the matched flags; only ordering may differ.
        let mut forward_keys: Vec<(String, bool)> = forward
            .iter()
            .map(|r| {
                let name = if r.server_display_name.is_empty() {
                    &r.cloud_display_name
                } else {
                    &r.server_display_name
                };
                (match_key(name), r.matched())
            })
            .collect();
        forward_keys.sort();
        assert_eq!(
            forward_keys,
            vec![
                ("ann a".to_string(), true),
                ("bob b".to_string(), false)
            ]
        );
    }

    #[test]
    fn merge_pass_folds_rows_sharing_server_slug() {
        let rows = vec![
            UserMatch {
                server_slug: "jdoe".to_string(),
                server_display_name: "John Doe".to_string(),
                ..Default::default()
            },
            UserMatch {
                server_slug: "jdoe".to_string(),
                cloud_uuid: "{u9}".to_string(),
                cloud_nickname: "jdoe".to_string(),
                ..Default::default()
            },
        ];
        let merged = merge_user_rows(rows);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].server_display_name, "John Doe");
        assert_eq!(merged[0].cloud_uuid, "{u9}");
        assert!(merged[0].matched());
    }

    #[test]
    fn repos_join_on_exact_name_only() {
        let server = [server_repo("svc-a", "svc-a", "PRJ")];
        let cloud = [cloud_repo("svc-a2", "SVC-A")];
        let merged = reconcile_repos(&server, &cloud);
        // Names differ in case, so neither side matches.
        assert_eq!(merged.len(), 2);
        assert!(merged.iter().all(|r| !r.matched));
    }

    #[test]
    fn on_prem_only_repo_yields_unmatched_with_empty_target() {
        let server = [server_repo("svc-a", "svc-a", "PRJ")];
        let merged = reconcile_repos(&server, &[]);
        assert_eq!(merged.len(), 1);
        assert!(!merged[0].matched);
        assert!(merged[0].target.is_empty());
        assert_eq!(merged[0].project_key, "PRJ");
    }

    #[test]
    fn matched_repo_carries_both_clone_urls() {
        let server = [server_repo("svc-a", "svc-a", "PRJ")];
        let cloud = [cloud_repo("svc-a", "svc-a")];
        let merged = reconcile_repos(&server, &cloud);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].matched);
        assert_eq!(merged[0].source, "http://server/PRJ/svc-a.git");
        assert_eq!(merged[0].target, "https://bitbucket.org/ws/svc-a.git");
    }
}
