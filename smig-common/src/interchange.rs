//! CSV interchange files — the pipeline's only persistent state.
//!
//! Each migration stage reads the files earlier stages wrote; the column
//! names are part of the contract and must stay stable across runs for
//! re-invocation to resume correctly.

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::Result;

/// Server repository inventory (`id,slug,name,scmId,project_key,https,ssh`).
pub const SERVER_REPOS_CSV: &str = "bitbucket_server_repositories.csv";
/// Cloud repository inventory (`uuid,slug,name,scm,https,ssh`).
pub const CLOUD_REPOS_CSV: &str = "bitbucket_cloud_repositories.csv";
/// Merged repository correspondence (`name,project,match,source,target`).
pub const MERGED_REPOS_CSV: &str = "merged_repositories.csv";
/// Merged user correspondence.
pub const USER_MATCH_CSV: &str = "bitbucket_users_match.csv";
/// Operator-provided group membership export.
pub const GROUP_MEMBERSHIP_CSV: &str = "group-membership.csv";
/// Operator-provided personal repository export.
pub const PERSONAL_REPOS_CSV: &str = "personal-repos.csv";

/// Write all rows to `path`, header first.
pub fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read every row of `path` into typed records.
pub fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Serde adapter for the `match` column, stored as `yes`/`no`.
pub mod yes_no {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "yes" } else { "no" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.eq_ignore_ascii_case("yes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MergedRepo, PersonalRepo, UserMatch};

    #[test]
    fn merged_repo_csv_schema_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MERGED_REPOS_CSV);
        let rows = vec![
            MergedRepo {
                name: "svc-a".to_string(),
                project_key: "PRJ".to_string(),
                matched: true,
                source: "http://server/prj/svc-a.git".to_string(),
                target: "https://bitbucket.org/ws/svc-a.git".to_string(),
            },
            MergedRepo {
                name: "orphan".to_string(),
                project_key: "PRJ".to_string(),
                matched: false,
                source: "http://server/prj/orphan.git".to_string(),
                target: String::new(),
            },
        ];
        write_rows(&path, &rows).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let header = raw.lines().next().unwrap();
        assert_eq!(header, "name,project,match,source,target");
        assert!(raw.contains("svc-a,PRJ,yes,"));
        assert!(raw.contains("orphan,PRJ,no,"));

        let back: Vec<MergedRepo> = read_rows(&path).unwrap();
        assert!(back[0].matched);
        assert!(!back[1].matched);
    }

    #[test]
    fn user_match_csv_keeps_original_column_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(USER_MATCH_CSV);
        write_rows(
            &path,
            &[UserMatch {
                server_slug: "jdoe".to_string(),
                server_display_name: "John Doe".to_string(),
                ..Default::default()
            }],
        )
        .unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with(
            "server_slug,server_id,server_displayName,server_emailAddress,\
             cloud_uuid,cloud_account_id,cloud_nickname,cloud_display_name"
        ));
    }

    #[test]
    fn personal_repo_rows_parse_database_export_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PERSONAL_REPOS_CSV);
        std::fs::write(
            &path,
            "User,Repository Slug,Repository Descr\n~rbortolin,personal,\n",
        )
        .unwrap();
        let rows: Vec<PersonalRepo> = read_rows(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user, "~rbortolin");
        assert_eq!(rows[0].slug, "personal");
        assert!(rows[0].description.is_empty());
    }
}
