//! Response classification
//!
//! Per-endpoint rules that turn a response into accept / ignore / fail.
//! APIs often answer a legitimately absent sub-resource with a 404 or a body
//! explaining why there is nothing to return; an `ignore` rule turns that into
//! an empty page instead of a failed resource.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// What to do with a response matching a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Treat as an empty page and stop the request chain
    Ignore,
    /// Propagate as a failure
    #[default]
    Fail,
}

/// One response-handling rule
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResponseAction {
    /// Status the response must have
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Substring the body must contain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Outcome when the rule matches
    #[serde(default)]
    pub action: ActionKind,
}

impl ResponseAction {
    /// Ignore responses with this status
    pub fn ignore_status(status: u16) -> Self {
        Self {
            status_code: Some(status),
            content: None,
            action: ActionKind::Ignore,
        }
    }

    /// Ignore responses whose body contains `content`
    pub fn ignore_content(content: impl Into<String>) -> Self {
        Self {
            status_code: None,
            content: Some(content.into()),
            action: ActionKind::Ignore,
        }
    }

    /// A rule needs at least one predicate
    pub fn validate(&self) -> Result<()> {
        match (&self.status_code, &self.content) {
            (None, None) => Err(Error::config(
                "response action needs a status_code or content predicate",
            )),
            (_, Some(content)) if content.is_empty() => {
                Err(Error::config("response action content must not be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Both predicates must hold when both are given
    pub fn matches(&self, status: u16, body: &str) -> bool {
        let status_ok = self.status_code.map_or(true, |code| code == status);
        let content_ok = self
            .content
            .as_deref()
            .map_or(true, |needle| body.contains(needle));
        status_ok && content_ok
    }
}

/// Outcome of classifying one response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Decode records and continue paginating
    Accept,
    /// Zero records; stop this request chain without error
    IgnoreEmpty,
    /// The resource fails
    Fail,
}

/// Ordered rule list for one endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponsePolicy {
    rules: Vec<ResponseAction>,
}

impl ResponsePolicy {
    /// Build a policy, rejecting rules without predicates
    pub fn new(rules: Vec<ResponseAction>) -> Result<Self> {
        for rule in &rules {
            rule.validate()?;
        }
        Ok(Self { rules })
    }

    /// The configured rules
    pub fn rules(&self) -> &[ResponseAction] {
        &self.rules
    }

    /// First matching rule wins; otherwise 2xx is accepted and anything else
    /// fails.
    pub fn classify(&self, status: u16, body: &str) -> Classification {
        if let Some(rule) = self.rules.iter().find(|r| r.matches(status, body)) {
            return match rule.action {
                ActionKind::Ignore => Classification::IgnoreEmpty,
                ActionKind::Fail => Classification::Fail,
            };
        }

        if (200..300).contains(&status) {
            Classification::Accept
        } else {
            Classification::Fail
        }
    }
}
