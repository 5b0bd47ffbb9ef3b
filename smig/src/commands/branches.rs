//! Branch policy stage: replay the branching model and the configured
//! branch restrictions onto every matched repository.

use anyhow::Result;
use serde_json::{Value, json};
use smig_common::MigrationConfig;
use smig_common::api::CloudApi;
use smig_common::config::BranchPolicyConfig;
use smig_common::interchange::{self, MERGED_REPOS_CSV};
use smig_common::types::MergedRepo;
use tracing::{info, warn};

use super::RunSummary;

pub fn run(config: &MigrationConfig) -> Result<()> {
    let cloud = CloudApi::new(&config.cloud);
    let merged: Vec<MergedRepo> =
        interchange::read_rows(&config.data_file(MERGED_REPOS_CSV))?;
    let settings = branching_model_settings(&config.branch_policy);

    let mut summary = RunSummary::new("sync-branch-policy");
    for repo in merged.iter().filter(|r| r.matched) {
        let Some(slug) = extract_repo_slug(&repo.target) else {
            warn!(repo = %repo.name, target = %repo.target, "cannot derive cloud slug, skipping");
            summary.skip();
            continue;
        };

        let outcome = cloud.set_branching_model(&slug, &settings)?;
        info!(repo = %slug, %outcome, "branching model");
        summary.record(&outcome);

        for restriction in &config.branch_policy.restrictions {
            let payload = json!({
                "kind": restriction.kind,
                "pattern": restriction.pattern,
            });
            let outcome = cloud.add_branch_restriction(&slug, &payload)?;
            info!(repo = %slug, kind = %restriction.kind, %outcome, "branch restriction");
            summary.record(&outcome);
        }
    }
    summary.log();
    Ok(())
}

/// Build the branching-model settings payload from configuration.
fn branching_model_settings(policy: &BranchPolicyConfig) -> Value {
    let branch_types: Vec<Value> = policy
        .branch_types
        .iter()
        .map(|t| {
            json!({
                "kind": t.kind,
                "prefix": t.prefix,
                "enabled": t.enabled,
            })
        })
        .collect();
    json!({
        "development": {"use_mainbranch": policy.development_use_mainbranch},
        "production": {"enabled": policy.production_enabled},
        "branch_types": branch_types,
    })
}

/// Derive the cloud repository slug from its HTTP clone URL.
fn extract_repo_slug(target_url: &str) -> Option<String> {
    if !target_url.contains("bitbucket.org") {
        return None;
    }
    let trimmed = target_url.trim_end_matches(".git");
    trimmed
        .rsplit('/')
        .next()
        .filter(|slug| !slug.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use smig_common::config::BranchPolicyConfig;

    #[test]
    fn slug_comes_from_the_last_path_segment() {
        assert_eq!(
            extract_repo_slug("https://bitbucket.org/ws/svc-a.git"),
            Some("svc-a".to_string())
        );
        assert_eq!(
            extract_repo_slug("https://bitbucket.org/ws/svc-a"),
            Some("svc-a".to_string())
        );
    }

    #[test]
    fn non_cloud_urls_yield_no_slug() {
        assert_eq!(extract_repo_slug("http://server:7990/scm/prj/x.git"), None);
        assert_eq!(extract_repo_slug(""), None);
    }

    #[test]
    fn settings_payload_carries_defaults() {
        let settings = branching_model_settings(&BranchPolicyConfig::default());
        assert_eq!(settings["development"]["use_mainbranch"], true);
        assert_eq!(settings["production"]["enabled"], false);
        assert_eq!(settings["branch_types"].as_array().unwrap().len(), 4);
        assert_eq!(settings["branch_types"][0]["prefix"], "bugfix/");
    }
}
