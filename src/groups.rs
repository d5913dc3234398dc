//! User-declared report groups.
//!
//! A groups file maps processes and containers to named categories ("AV",
//! "Browsers", ...) so the report can attribute memory per workload rather
//! than per binary. Matching is an unanchored regex search, first match in
//! file order wins.
//!
//! File format (JSON):
//!
//! ```json
//! {
//!   "processes":  [ { "group": "AV", "processes": ["westeros", "essos.*"] } ],
//!   "containers": [ { "group": "Browsers", "containers": ["com\\.sky\\.browser"] } ]
//! }
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use serde_json::Value;
use tracing::{error, info, warn};

/// Which category set to resolve a name against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Process,
    Container,
}

/// A named group and the patterns that select its members.
#[derive(Debug, Clone)]
pub struct Group {
    name: String,
    patterns: Vec<Regex>,
}

impl Group {
    pub fn new(name: impl Into<String>, patterns: Vec<Regex>) -> Self {
        Self {
            name: name.into(),
            patterns,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unanchored search: the pattern only has to occur somewhere in the
    /// candidate name.
    pub fn is_match(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(name))
    }
}

/// Ordered group definitions for both category sets.
#[derive(Debug, Clone, Default)]
pub struct GroupManager {
    process_groups: Vec<Group>,
    container_groups: Vec<Group>,
}

impl GroupManager {
    /// Load group definitions from a JSON file.
    ///
    /// An unreadable or unparseable file is a configuration error and
    /// fails the capture before any sampling begins. Individual malformed
    /// entries inside a parseable file are logged and skipped.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Invalid groups file {}", path.display()))?;
        let json: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse groups JSON {}", path.display()))?;

        Ok(Self::from_json(&json))
    }

    /// Build from already-parsed JSON.
    pub fn from_json(json: &Value) -> Self {
        let process_groups = parse_category(json, "processes", "processes");
        info!("Loaded {} process groups", process_groups.len());

        let container_groups = parse_category(json, "containers", "containers");
        info!("Loaded {} container groups", container_groups.len());

        Self {
            process_groups,
            container_groups,
        }
    }

    /// First group in declaration order whose pattern set matches `name`.
    pub fn group_for(&self, kind: GroupKind, name: &str) -> Option<&str> {
        let groups = match kind {
            GroupKind::Process => &self.process_groups,
            GroupKind::Container => &self.container_groups,
        };

        groups
            .iter()
            .find(|g| g.is_match(name))
            .map(|g| g.name())
    }

    pub fn is_empty(&self) -> bool {
        self.process_groups.is_empty() && self.container_groups.is_empty()
    }
}

/// Walk one category array ("processes" or "containers"), tolerating
/// malformed entries.
fn parse_category(json: &Value, category: &str, member_key: &str) -> Vec<Group> {
    let mut groups = Vec::new();

    let entries = match json.get(category).and_then(Value::as_array) {
        Some(a) => a,
        None => {
            error!(
                "{} groups not a valid array - cannot map {} to groups",
                category, category
            );
            return groups;
        }
    };

    for entry in entries {
        let name = match entry.get("group").and_then(Value::as_str) {
            Some(n) => n,
            None => {
                warn!("Found malformed {} group - missing 'group' field", category);
                continue;
            }
        };

        let members = match entry.get(member_key).and_then(Value::as_array) {
            Some(m) => m,
            None => {
                warn!("Malformed group {} - no '{}' array", name, member_key);
                continue;
            }
        };

        let mut patterns = Vec::new();
        for member in members {
            let pattern = match member.as_str() {
                Some(p) => p,
                None => {
                    warn!("Non-string pattern in group {}", name);
                    continue;
                }
            };

            match Regex::new(pattern) {
                Ok(re) => patterns.push(re),
                Err(e) => warn!("Invalid pattern '{}' in group {}: {}", pattern, name, e),
            }
        }

        groups.push(Group::new(name, patterns));
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_manager() -> GroupManager {
        GroupManager::from_json(&json!({
            "processes": [
                { "group": "Browsers", "processes": ["WPEWebProcess", "WebKit"] },
                { "group": "AV", "processes": ["westeros", "essos"] },
                { "group": "Scripts", "processes": ["^/bin/sh .*watchdog"] }
            ],
            "containers": [
                { "group": "Browsers", "containers": ["app1", "com\\.sky\\.browser"] },
                { "group": "Apps", "containers": ["com\\.sky\\.as\\.apps"] }
            ]
        }))
    }

    #[test]
    fn test_first_match_in_declaration_order_wins() {
        let gm = sample_manager();

        // "WPEWebProcess" would also match no other group, but even with an
        // ambiguous name the first declared group is the answer.
        assert_eq!(
            gm.group_for(GroupKind::Process, "WPEWebProcess"),
            Some("Browsers")
        );
        assert_eq!(gm.group_for(GroupKind::Process, "westeros-renderer"), Some("AV"));
        assert_eq!(gm.group_for(GroupKind::Process, "unknown-daemon"), None);
    }

    #[test]
    fn test_match_is_search_not_full_match() {
        let gm = sample_manager();

        // Substring occurrences count
        assert_eq!(
            gm.group_for(GroupKind::Container, "com.sky.browser.instance2"),
            Some("Browsers")
        );
        // Anchors are honoured when the pattern carries them
        assert_eq!(
            gm.group_for(GroupKind::Process, "/bin/sh /lib/rdk/watchdog.sh"),
            Some("Scripts")
        );
        assert_eq!(
            gm.group_for(GroupKind::Process, "wrapper /bin/sh watchdog"),
            None
        );
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let gm = GroupManager::from_json(&json!({
            "processes": [
                { "processes": ["no-group-name"] },
                { "group": "NoMembers" },
                { "group": "BadPattern", "processes": ["([unclosed"] },
                { "group": "Good", "processes": ["good"] }
            ],
            "containers": "not-an-array"
        }));

        assert_eq!(gm.group_for(GroupKind::Process, "good-proc"), Some("Good"));
        // The group with an invalid pattern still exists but matches nothing
        assert_eq!(gm.group_for(GroupKind::Process, "([unclosed"), None);
        assert_eq!(gm.group_for(GroupKind::Container, "anything"), None);
    }

    #[test]
    fn test_load_rejects_unparseable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("groups.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(GroupManager::load(&path).is_err());
        assert!(GroupManager::load(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_load_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("groups.json");
        std::fs::write(
            &path,
            r#"{ "processes": [ { "group": "AV", "processes": ["gst-launch"] } ], "containers": [] }"#,
        )
        .unwrap();

        let gm = GroupManager::load(&path).unwrap();
        assert_eq!(gm.group_for(GroupKind::Process, "gst-launch-1.0"), Some("AV"));
    }
}
