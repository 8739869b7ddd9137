//! Default point-value policy: a rules table keyed by platform and post type.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{EngineError, Result};
use crate::traits::policy::PointPolicy;
use crate::types::submission::SubmissionKind;

/// Base points per (platform, post_type) for link submissions.
const DEFAULT_URL_RULES: &[(&str, &str, i64)] = &[
    ("youtube", "video", 15),
    ("tiktok", "video", 15),
    ("quora", "answer", 12),
    ("reddit", "answer", 12),
    ("facebook", "group_post", 10),
    ("instagram", "reel", 8),
    ("instagram", "post", 8),
    ("twitter", "tweet", 6),
    ("threads", "thread", 6),
    ("linkedin", "post", 6),
    ("instagram", "story", 3),
    ("facebook", "story", 3),
];

/// Flat value for a screenshot whose platform cannot be read from a link.
const DEFAULT_SCREENSHOT_POINTS: i64 = 3;

/// Rules table used as the engine's point policy.
#[derive(Debug, Clone)]
pub struct RulesTable {
    url_rules: HashMap<(String, String), i64>,
    screenshot_points: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RulesFile {
    #[serde(default)]
    rules: Vec<RuleEntry>,
    screenshot_points: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RuleEntry {
    platform: String,
    post_type: String,
    points: i64,
}

impl Default for RulesTable {
    fn default() -> Self {
        Self {
            url_rules: DEFAULT_URL_RULES
                .iter()
                .map(|(platform, post_type, points)| {
                    ((platform.to_string(), post_type.to_string()), *points)
                })
                .collect(),
            screenshot_points: Some(DEFAULT_SCREENSHOT_POINTS),
        }
    }
}

impl RulesTable {
    /// A table with no rules at all; every lookup misses.
    pub fn empty() -> Self {
        Self {
            url_rules: HashMap::new(),
            screenshot_points: None,
        }
    }

    /// Add or replace a link rule.
    pub fn with_rule(mut self, platform: &str, post_type: &str, points: i64) -> Self {
        self.url_rules
            .insert((platform.to_string(), post_type.to_string()), points);
        self
    }

    pub fn with_screenshot_points(mut self, points: Option<i64>) -> Self {
        self.screenshot_points = points;
        self
    }

    /// Defaults overlaid with the entries of a JSON rules document:
    ///
    /// ```json
    /// { "rules": [{ "platform": "youtube", "post_type": "video", "points": 20 }],
    ///   "screenshot_points": 2 }
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let file: RulesFile = serde_json::from_str(json)?;
        let mut table = Self::default();
        for entry in file.rules {
            if entry.points < 0 {
                return Err(EngineError::Config(format!(
                    "negative points for {}/{}",
                    entry.platform, entry.post_type
                )));
            }
            table = table.with_rule(&entry.platform, &entry.post_type, entry.points);
        }
        if let Some(points) = file.screenshot_points {
            table.screenshot_points = Some(points);
        }
        Ok(table)
    }

    /// Load a JSON rules document from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("cannot read rules file {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }
}

impl PointPolicy for RulesTable {
    fn value_for(&self, kind: SubmissionKind, platform: &str, post_type: &str) -> Option<i64> {
        match kind {
            SubmissionKind::Url => self
                .url_rules
                .get(&(platform.to_string(), post_type.to_string()))
                .copied(),
            SubmissionKind::Screenshot => self.screenshot_points,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let rules = RulesTable::default();
        assert_eq!(rules.value_for(SubmissionKind::Url, "youtube", "video"), Some(15));
        assert_eq!(rules.value_for(SubmissionKind::Url, "reddit", "answer"), Some(12));
        assert_eq!(rules.value_for(SubmissionKind::Url, "twitter", "tweet"), Some(6));
        assert_eq!(
            rules.value_for(SubmissionKind::Screenshot, "unknown", "screenshot"),
            Some(3)
        );
    }

    #[test]
    fn test_unknown_platform_misses() {
        let rules = RulesTable::default();
        assert_eq!(rules.value_for(SubmissionKind::Url, "unknown", "link"), None);
    }

    #[test]
    fn test_json_overrides_defaults() {
        let rules = RulesTable::from_json(
            r#"{"rules":[{"platform":"youtube","post_type":"video","points":20},
                         {"platform":"unknown","post_type":"link","points":1}],
                "screenshot_points":2}"#,
        )
        .unwrap();

        assert_eq!(rules.value_for(SubmissionKind::Url, "youtube", "video"), Some(20));
        assert_eq!(rules.value_for(SubmissionKind::Url, "unknown", "link"), Some(1));
        assert_eq!(rules.value_for(SubmissionKind::Url, "tiktok", "video"), Some(15));
        assert_eq!(rules.value_for(SubmissionKind::Screenshot, "unknown", "screenshot"), Some(2));
    }

    #[test]
    fn test_json_rejects_negative_points() {
        let err = RulesTable::from_json(
            r#"{"rules":[{"platform":"youtube","post_type":"video","points":-1}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
