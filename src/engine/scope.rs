//! Memoized field resolution.
//!
//! A [`Scope`] is the handle every rule body receives. It owns the per-construction
//! cache of field values and is the single entry point through which rules are
//! evaluated, whether the forcing pass asks for a field or a sibling rule does.
//!
//! ```text
//! resolve("weasel")
//!   ├─ cached?              -> return clone
//!   ├─ in progress?         -> RuleError::Cycle (when detect_cycles)
//!   └─ run body(scope)
//!        └─ scope.text("dumb") -> resolve("dumb") -> run body, cache
//!      cache result under the rule's key
//! ```
//!
//! Everything here is single-threaded: the cache lives in `RefCell`s owned by
//! one construction and is never shared. Borrows are never held across a rule
//! body call, so nested `resolve` calls are always free to mutate the cache.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use super::metrics::RuleEvaluation;
use super::rule_set::{Rule, RuleSet};
use crate::api::Options;
use crate::{Field, Pending, RuleError, Value};

/// Resolver handle passed to every rule body.
pub struct Scope<'a, C, X> {
    rules: &'a RuleSet<C, X>,
    doc: &'a C,
    extras: &'a X,
    options: &'a Options,
    /// Public (and renamed) fields, keyed by output key.
    values: RefCell<BTreeMap<String, Field>>,
    /// Hidden rule results, keyed by rule name.
    hidden: RefCell<HashMap<&'static str, Field>>,
    /// Rules currently on the call stack, outermost first.
    in_progress: RefCell<Vec<&'static str>>,
    /// Rule that raised the error currently unwinding, with that error.
    /// Cleared whenever a rule body completes, so an error a sibling
    /// recovered from is never blamed for a later failure.
    failed: RefCell<Option<(&'static str, RuleError)>>,
    evaluations: RefCell<Vec<RuleEvaluation>>,
}

impl<'a, C, X> Scope<'a, C, X> {
    pub(crate) fn new(
        rules: &'a RuleSet<C, X>,
        doc: &'a C,
        extras: &'a X,
        initial: BTreeMap<String, Field>,
        options: &'a Options,
    ) -> Self {
        Scope {
            rules,
            doc,
            extras,
            options,
            values: RefCell::new(initial),
            hidden: RefCell::new(HashMap::new()),
            in_progress: RefCell::new(Vec::new()),
            failed: RefCell::new(None),
            evaluations: RefCell::new(Vec::new()),
        }
    }

    /// The context every rule runs against.
    pub fn doc(&self) -> &'a C {
        self.doc
    }

    pub fn extras(&self) -> &'a X {
        self.extras
    }

    /// Name of the concrete rule set being constructed.
    pub fn rule_set(&self) -> &'static str {
        self.rules.name()
    }

    /// Resolve `name`, computing it at most once.
    ///
    /// `name` is a rule name, or a key that was pre-supplied in the initial
    /// values. A pre-supplied value always wins over a rule with the same key.
    pub fn resolve(&self, name: &str) -> Result<Field, RuleError> {
        let Some(rule) = self.rules.lookup(name) else {
            return self.values.borrow().get(name).cloned().ok_or_else(|| RuleError::Unknown(name.to_string()));
        };

        if let Some(field) = self.cached(rule) {
            return Ok(field);
        }

        self.evaluate(rule)
    }

    /// Resolve `name` and require a plain value.
    pub fn value(&self, name: &str) -> Result<Value, RuleError> {
        match self.resolve(name)? {
            Field::Resolved(value) => Ok(value),
            Field::Pending(_) => Err(RuleError::StillPending(name.to_string())),
        }
    }

    /// Resolve `name` and require a string value.
    pub fn text(&self, name: &str) -> Result<String, RuleError> {
        match self.value(name)? {
            Value::String(s) => Ok(s),
            _ => Err(RuleError::UnexpectedType { field: name.to_string(), expected: "string" }),
        }
    }

    /// Resolve `name` as something that can be awaited, pending or not.
    pub fn pending(&self, name: &str) -> Result<Pending, RuleError> {
        Ok(self.resolve(name)?.to_pending())
    }

    fn cached(&self, rule: &Rule<C, X>) -> Option<Field> {
        if rule.is_hidden() {
            self.hidden.borrow().get(rule.name).cloned()
        } else {
            self.values.borrow().get(rule.key()).cloned()
        }
    }

    fn evaluate(&self, rule: &Rule<C, X>) -> Result<Field, RuleError> {
        let depth = {
            let mut stack = self.in_progress.borrow_mut();
            if self.options.detect_cycles {
                if let Some(pos) = stack.iter().position(|n| *n == rule.name) {
                    let mut path: Vec<String> = stack[pos..].iter().map(|n| n.to_string()).collect();
                    path.push(rule.name.to_string());
                    tracing::debug!(rule = rule.name, path = ?path, "rule cycle detected");
                    return Err(RuleError::Cycle { path });
                }
            }
            stack.push(rule.name);
            stack.len() - 1
        };

        let start = Instant::now();
        let result = (rule.body)(self);
        self.in_progress.borrow_mut().pop();

        let field = match result {
            Ok(field) => {
                *self.failed.borrow_mut() = None;
                field
            }
            Err(err) => {
                self.record_failure(rule.name, &err);
                return Err(err);
            }
        };

        let duration = start.elapsed();
        tracing::trace!(
            rule = rule.name,
            key = rule.key(),
            depth,
            pending = field.is_pending(),
            ?duration,
            "rule evaluated"
        );
        self.evaluations.borrow_mut().push(RuleEvaluation {
            rule: rule.name,
            key: rule.key(),
            depth,
            duration,
            pending: field.is_pending(),
        });

        if rule.is_hidden() {
            self.hidden.borrow_mut().insert(rule.name, field.clone());
        } else {
            self.values.borrow_mut().insert(rule.key().to_string(), field.clone());
        }
        Ok(field)
    }

    /// Keep the nested culprit only when this body passed its error through
    /// unchanged; any other error originates here.
    fn record_failure(&self, rule: &'static str, err: &RuleError) {
        let mut failed = self.failed.borrow_mut();
        if !matches!(&*failed, Some((_, nested)) if nested == err) {
            *failed = Some((rule, err.clone()));
        }
    }

    pub(crate) fn contains_key(&self, key: &str) -> bool {
        self.values.borrow().contains_key(key)
    }

    pub(crate) fn failed_rule(&self) -> Option<&'static str> {
        self.failed.borrow().as_ref().map(|(rule, _)| *rule)
    }

    /// Tear the scope down into its public fields and evaluation log.
    pub(crate) fn finish(self) -> (BTreeMap<String, Field>, Vec<RuleEvaluation>) {
        (self.values.into_inner(), self.evaluations.into_inner())
    }
}

impl<C> Scope<'_, C, Value> {
    /// Look up `key` in an object-shaped extras value.
    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extras.get(key)
    }
}
