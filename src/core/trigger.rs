//! Trigger rules - decide whether an incoming event starts a pipeline run

use crate::core::{config::TriggerConfig, ConfigError};
use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Kind of event delivered by the hosting platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Code pushed to a branch
    Push,
    /// Pull request targeting a branch
    PullRequest,
}

impl FromStr for EventKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "push" => Ok(EventKind::Push),
            "pull_request" | "pull-request" => Ok(EventKind::PullRequest),
            other => Err(ConfigError::UnknownEvent(other.to_string())),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Push => write!(f, "push"),
            EventKind::PullRequest => write!(f, "pull_request"),
        }
    }
}

/// An incoming event: kind plus the branch it concerns.
///
/// For pull requests the branch is the target (base) branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub branch: String,
}

impl Event {
    pub fn new(kind: EventKind, branch: impl Into<String>) -> Self {
        Self {
            kind,
            branch: branch.into(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.branch)
    }
}

const BRANCH_MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    // `*` stays within one path segment, `**` crosses segments
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A compiled branch filter
#[derive(Debug, Clone)]
pub struct BranchPattern {
    raw: String,
    pattern: Pattern,
}

impl BranchPattern {
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        if pattern.is_empty() {
            return Err(ConfigError::InvalidBranchPattern {
                pattern: pattern.to_string(),
                reason: "pattern is empty".to_string(),
            });
        }

        // A trailing `**` only matches when followed by a segment, so
        // `release/**` is compiled as `release/**/*`
        let normalized = if pattern == "**" || pattern.ends_with("/**") {
            format!("{}/*", pattern)
        } else {
            pattern.to_string()
        };

        let compiled = Pattern::new(&normalized).map_err(|e| ConfigError::InvalidBranchPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            raw: pattern.to_string(),
            pattern: compiled,
        })
    }

    pub fn matches(&self, branch: &str) -> bool {
        self.pattern.matches_with(branch, BRANCH_MATCH_OPTIONS)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// Event kind plus branch filters
#[derive(Debug, Clone)]
pub struct TriggerRule {
    pub kind: EventKind,
    /// Empty means every branch
    pub branches: Vec<BranchPattern>,
    pub branches_ignore: Vec<BranchPattern>,
}

impl TriggerRule {
    pub fn from_config(kind: EventKind, config: &TriggerConfig) -> Result<Self, ConfigError> {
        let compile = |patterns: &[String]| -> Result<Vec<BranchPattern>, ConfigError> {
            patterns.iter().map(|p| BranchPattern::new(p)).collect()
        };

        Ok(Self {
            kind,
            branches: compile(&config.branches)?,
            branches_ignore: compile(&config.branches_ignore)?,
        })
    }

    /// Check whether this rule admits the event
    pub fn matches(&self, event: &Event) -> bool {
        if event.kind != self.kind {
            return false;
        }

        let included = self.branches.is_empty()
            || self.branches.iter().any(|p| p.matches(&event.branch));

        included && !self.branches_ignore.iter().any(|p| p.matches(&event.branch))
    }
}

/// Decides whether an event starts a pipeline run
#[derive(Debug, Clone, Default)]
pub struct TriggerMatcher {
    rules: Vec<TriggerRule>,
}

impl TriggerMatcher {
    pub fn new(rules: Vec<TriggerRule>) -> Self {
        Self { rules }
    }

    /// Compile the `on:` section of a descriptor
    pub fn from_config(
        triggers: &BTreeMap<String, Option<TriggerConfig>>,
    ) -> Result<Self, ConfigError> {
        let rules = triggers
            .iter()
            .map(|(kind, config)| {
                let kind: EventKind = kind.parse()?;
                TriggerRule::from_config(kind, &config.clone().unwrap_or_default())
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { rules })
    }

    /// Admit iff some rule matches the event kind and branch
    pub fn admits(&self, event: &Event) -> bool {
        self.rules.iter().any(|rule| rule.matches(event))
    }

    pub fn rules(&self) -> &[TriggerRule] {
        &self.rules
    }
}
