//! Error types.
//!
//! `RuleError` is what a single rule body returns. It is `Clone` because a
//! pending field's outcome is shared by every handle awaiting it.
//!
//! `EngineError` is what the public entry points return: construction,
//! settlement and flattening to JSON.

/// Failure raised by (or while running) a single rule.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuleError {
    /// Raised by a rule body.
    #[error("{0}")]
    Failed(String),
    /// A rule asked for a name that is neither a rule nor a pre-supplied field.
    #[error("unknown rule or field `{0}`")]
    Unknown(String),
    /// A rule read a sibling as a plain value while it was still pending.
    #[error("field `{0}` is still pending")]
    StillPending(String),
    #[error("field `{field}` is not a {expected}")]
    UnexpectedType { field: String, expected: &'static str },
    /// A rule was re-entered while it was still being computed.
    #[error("rule cycle: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },
    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },
}

impl RuleError {
    /// Shorthand for [`RuleError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        RuleError::Failed(message.into())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("rule `{rule}` failed: {source}")]
    RuleInvocation {
        rule: String,
        #[source]
        source: RuleError,
    },
    #[error("rule cycle detected: {}", .path.join(" -> "))]
    CycleDetected { path: Vec<String> },
    #[error("{} pending field(s) failed to settle: {}", .failures.len(), describe(.failures))]
    Settlement { failures: Vec<(String, RuleError)> },
    #[error("fields still pending: {}", .keys.join(", "))]
    Unsettled { keys: Vec<String> },
    #[error("document parse error: {0}")]
    Document(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

fn describe(failures: &[(String, RuleError)]) -> String {
    failures.iter().map(|(key, err)| format!("{key}: {err}")).collect::<Vec<_>>().join("; ")
}
