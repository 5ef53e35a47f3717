//! Construction: forcing pass and flattening.
//!
//! ```text
//! initial values ──┐
//!                  v
//! enumerate() ──> Scope::new ──> for each public rule not supplied:
//!                                  scope.resolve(name)   (may recurse)
//!                                         │
//!                                         v
//!                                 scope.finish() -> key -> Field
//! ```
//!
//! A rule that fails aborts the whole construction. The error names the
//! innermost rule that raised it, not the rule the forcing pass started from.

use std::collections::BTreeMap;
use std::time::Instant;

use super::metrics::{ConstructMetrics, RunResult};
use super::rule_set::RuleSet;
use super::scope::Scope;
use crate::api::Options;
use crate::error::{EngineError, EngineResult};
use crate::{Field, RuleError};

pub(crate) fn construct_with_metrics<C, X>(
    rules: &RuleSet<C, X>,
    doc: &C,
    initial: BTreeMap<String, Field>,
    extras: &X,
    options: &Options,
) -> EngineResult<RunResult> {
    let total_start = Instant::now();
    let enumerated = rules.enumerate();

    tracing::debug!(rule_set = rules.name(), rules = enumerated.len(), supplied = initial.len(), "construct start");

    let supplied: Vec<String> = enumerated
        .iter()
        .filter_map(|name| rules.lookup(name))
        .filter(|rule| !rule.is_hidden() && initial.contains_key(rule.key()))
        .map(|rule| rule.key().to_string())
        .collect();

    let scope = Scope::new(rules, doc, extras, initial, options);

    let forcing_start = Instant::now();
    for &name in &enumerated {
        let Some(rule) = rules.lookup(name) else { continue };
        // Supplied, or already forced by a sibling.
        if rule.is_hidden() || scope.contains_key(rule.key()) {
            continue;
        }

        scope.resolve(name).map_err(|err| invocation_error(&scope, name, err))?;
    }
    let forcing = forcing_start.elapsed();

    let (fields, evaluations) = scope.finish();
    let total = total_start.elapsed();

    tracing::debug!(
        rule_set = rules.name(),
        fields = fields.len(),
        evaluations = evaluations.len(),
        ?total,
        "construct finished"
    );

    Ok(RunResult { fields, metrics: ConstructMetrics { total, forcing, enumerated, supplied, evaluations } })
}

fn invocation_error<C, X>(scope: &Scope<'_, C, X>, forced: &str, err: RuleError) -> EngineError {
    match err {
        RuleError::Cycle { path } => EngineError::CycleDetected { path },
        source => {
            let rule = scope.failed_rule().unwrap_or(forced).to_string();
            tracing::debug!(rule = %rule, error = %source, "rule failed during construction");
            EngineError::RuleInvocation { rule, source }
        }
    }
}
