//! Migration executors, one module per stage.
//!
//! Every executor follows the same contract: loop over its entity set,
//! perform exactly one create-or-update call per entity, contain failures
//! at the entity boundary, and log a summary at the end. Re-running an
//! executor is the retry mechanism.

pub mod branches;
pub mod groups;
pub mod inventory;
pub mod mirror;
pub mod permissions;
pub mod personal;
pub mod reviewers;
pub mod rewrite;
pub mod users;

use std::collections::HashMap;

use smig_common::ApplyOutcome;
use smig_common::normalize::match_key;
use smig_common::types::UserMatch;
use tracing::info;

/// Per-executor outcome counters, logged once at the end of a stage.
#[derive(Debug, Default)]
pub struct RunSummary {
    label: &'static str,
    created: usize,
    already: usize,
    skipped: usize,
    failed: usize,
}

impl RunSummary {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: &ApplyOutcome) {
        match outcome {
            ApplyOutcome::Created => self.created += 1,
            ApplyOutcome::AlreadyExists => self.already += 1,
            ApplyOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn skip(&mut self) {
        self.skipped += 1;
    }

    pub fn fail(&mut self) {
        self.failed += 1;
    }

    pub fn log(&self) {
        info!(
            stage = self.label,
            created = self.created,
            already_present = self.already,
            skipped = self.skipped,
            failed = self.failed,
            "stage complete"
        );
    }
}

/// Index the user correspondence by normalized display name (either
/// side's), yielding the cloud UUID for server-reported principals.
pub fn uuid_by_display_name(rows: &[UserMatch]) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for row in rows {
        if row.cloud_uuid.is_empty() {
            continue;
        }
        for name in [&row.server_display_name, &row.cloud_display_name] {
            if !name.is_empty() {
                map.insert(match_key(name), row.cloud_uuid.clone());
            }
        }
    }
    map
}

/// Index the user correspondence by server user id, for reviewer lookups.
pub fn rows_by_server_id(rows: &[UserMatch]) -> HashMap<String, UserMatch> {
    rows.iter()
        .filter(|r| !r.server_id.is_empty())
        .map(|r| (r.server_id.clone(), r.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_lookup_joins_on_either_display_name() {
        let rows = vec![UserMatch {
            server_display_name: "José Díaz".to_string(),
            cloud_display_name: "jose diaz".to_string(),
            cloud_uuid: "{u1}".to_string(),
            ..Default::default()
        }];
        let map = uuid_by_display_name(&rows);
        assert_eq!(map.get(&match_key("JOSE Diaz")), Some(&"{u1}".to_string()));
    }

    #[test]
    fn rows_without_cloud_uuid_never_resolve() {
        let rows = vec![UserMatch {
            server_display_name: "Server Only".to_string(),
            ..Default::default()
        }];
        assert!(uuid_by_display_name(&rows).is_empty());
    }
}
