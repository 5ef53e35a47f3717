//! Construction metrics.
//!
//! This module defines a small set of structs used to observe and debug what a
//! construction actually computed.
//!
//! The intended usage is:
//!
//! - `construct`/`construct_with` for normal operation (the evaluation log is
//!   collected but dropped).
//! - `construct_verbose_with` for profiling rule sets and checking which rules
//!   ran, in what order and how deep in the call graph.
//!
//! ## Design notes
//!
//! - Evaluations are recorded in *completion* order: a rule that forces a
//!   sibling finishes after it, so the sibling appears first with a greater
//!   `depth`.
//! - Durations are inclusive of nested evaluations.

use crate::Field;
use std::collections::BTreeMap;
use std::time::Duration;

/// One rule body execution.
#[derive(Debug, Clone)]
pub struct RuleEvaluation {
    /// Name of the rule whose body ran.
    pub rule: &'static str,
    /// Key the result was stored under.
    pub key: &'static str,
    /// Nesting depth when the rule ran (0 = forced directly by the engine).
    pub depth: usize,
    /// Time spent in the rule body, including nested evaluations.
    pub duration: Duration,
    /// Whether the rule produced a pending field.
    pub pending: bool,
}

#[derive(Debug, Default, Clone)]
pub struct ConstructMetrics {
    /// Total elapsed time for the construction.
    pub total: Duration,
    /// Time spent in the forcing pass.
    pub forcing: Duration,
    /// Rule names in enumeration order.
    pub enumerated: Vec<&'static str>,
    /// Keys skipped by the forcing pass because they were pre-supplied.
    pub supplied: Vec<String>,
    /// Every rule body execution, in completion order.
    pub evaluations: Vec<RuleEvaluation>,
}

/// Flattened fields bundled with metrics.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub fields: BTreeMap<String, Field>,
    pub metrics: ConstructMetrics,
}
