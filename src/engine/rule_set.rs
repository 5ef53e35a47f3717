//! Rule declaration and enumeration.
//!
//! This module holds the *static* side of the engine: rules grouped into
//! levels, and the walk that turns a chain of levels into the list of fields a
//! construction has to produce.
//!
//! A [`RuleSet`] is one level. It owns its own rules and optionally points at a
//! parent level it refines:
//!
//! ```text
//! page (root)           title, links, body_text
//!   └─ article          byline, title            <- overrides page.title
//!        └─ review      rating
//! ```
//!
//! Two questions are answered here, and they are deliberately separate:
//!
//! - **Which names exist** ([`RuleSet::enumerate`]): every name declared
//!   anywhere in the chain, concrete level first, each name once.
//! - **Which body runs** ([`RuleSet::lookup`]): the most specific level that
//!   declares the name.
//!
//! ## Invariants
//!
//! - Names are unique within a level; declaring a name twice on the same level
//!   replaces the earlier body in place (keeping its position).
//! - Enumeration order is discovery order and never depends on which body wins.

use std::collections::HashSet;
use std::sync::Arc;

use super::scope::Scope;
use crate::{Field, IntoField, RuleError, Value};

/// Type-erased rule body.
pub(crate) type RuleFn<C, X> = Arc<dyn Fn(&Scope<'_, C, X>) -> Result<Field, RuleError> + Send + Sync>;

/// How a rule's result shows up in the constructed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Emitted under the rule's own name.
    Public,
    /// Emitted under a different key.
    Renamed(&'static str),
    /// Memoized and available to sibling rules, but neither forced nor emitted.
    Hidden,
}

/// A named computation over a context and extras.
pub struct Rule<C, X = Value> {
    pub name: &'static str,
    pub visibility: Visibility,
    pub(crate) body: RuleFn<C, X>,
}

impl<C, X> Rule<C, X> {
    pub fn new<F, T>(name: &'static str, body: F) -> Self
    where
        F: Fn(&Scope<'_, C, X>) -> Result<T, RuleError> + Send + Sync + 'static,
        T: IntoField,
    {
        let body: RuleFn<C, X> = Arc::new(move |scope: &Scope<'_, C, X>| body(scope)?.into_field());
        Rule { name, visibility: Visibility::Public, body }
    }

    pub fn hidden(mut self) -> Self {
        self.visibility = Visibility::Hidden;
        self
    }

    pub fn field_name(mut self, key: &'static str) -> Self {
        self.visibility = Visibility::Renamed(key);
        self
    }

    /// Key the rule's result is stored under.
    pub fn key(&self) -> &'static str {
        match self.visibility {
            Visibility::Renamed(key) => key,
            Visibility::Public | Visibility::Hidden => self.name,
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.visibility == Visibility::Hidden
    }
}

impl<C, X> Clone for Rule<C, X> {
    fn clone(&self) -> Self {
        Rule { name: self.name, visibility: self.visibility, body: Arc::clone(&self.body) }
    }
}

impl<C, X> std::fmt::Debug for Rule<C, X> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("visibility", &self.visibility)
            .field("body", &"<function>")
            .finish()
    }
}

/// One level of rules, optionally refining a parent level.
pub struct RuleSet<C, X = Value> {
    name: &'static str,
    parent: Option<Arc<RuleSet<C, X>>>,
    rules: Vec<Rule<C, X>>,
}

impl<C, X> RuleSet<C, X> {
    /// Create an empty root level.
    pub fn new(name: &'static str) -> Self {
        RuleSet { name, parent: None, rules: Vec::new() }
    }

    /// Make this level a refinement of `parent`.
    pub fn extends(mut self, parent: Arc<RuleSet<C, X>>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Add (or replace on this level) a public rule.
    pub fn rule<F, T>(self, name: &'static str, body: F) -> Self
    where
        F: Fn(&Scope<'_, C, X>) -> Result<T, RuleError> + Send + Sync + 'static,
        T: IntoField,
    {
        self.with(Rule::new(name, body))
    }

    /// Add a rule whose result is emitted under `key` instead of `name`.
    pub fn rule_as<F, T>(self, name: &'static str, key: &'static str, body: F) -> Self
    where
        F: Fn(&Scope<'_, C, X>) -> Result<T, RuleError> + Send + Sync + 'static,
        T: IntoField,
    {
        self.with(Rule::new(name, body).field_name(key))
    }

    /// Add a helper rule that siblings can resolve but that is never emitted.
    pub fn hidden_rule<F, T>(self, name: &'static str, body: F) -> Self
    where
        F: Fn(&Scope<'_, C, X>) -> Result<T, RuleError> + Send + Sync + 'static,
        T: IntoField,
    {
        self.with(Rule::new(name, body).hidden())
    }

    pub fn with(mut self, rule: Rule<C, X>) -> Self {
        match self.rules.iter_mut().find(|r| r.name == rule.name) {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn parent(&self) -> Option<&RuleSet<C, X>> {
        self.parent.as_deref()
    }

    /// Rules declared on this level only.
    pub fn own_rules(&self) -> &[Rule<C, X>] {
        &self.rules
    }

    /// Names of every rule in the chain, concrete level first.
    pub fn enumerate(&self) -> Vec<&'static str> {
        self.enumerate_until(None)
    }

    /// Names of every rule declared from this level up to, but excluding, `stop`.
    ///
    /// The walk always includes this level, then continues to each ancestor
    /// only while that ancestor strictly descends from `stop`. With `stop =
    /// None` the whole chain is walked.
    ///
    /// ```text
    /// review.enumerate_until(Some(page))
    ///   review: [rating]            collected
    ///   article: [byline, title]    collected (article descends from page)
    ///   page                        stop, excluded
    ///   => [rating, byline, title]
    /// ```
    pub fn enumerate_until(&self, stop: Option<&RuleSet<C, X>>) -> Vec<&'static str> {
        let mut seen: HashSet<&'static str> = HashSet::new();
        let mut names = Vec::new();
        let mut level = Some(self);

        while let Some(set) = level {
            for rule in &set.rules {
                if seen.insert(rule.name) {
                    names.push(rule.name);
                }
            }
            level = set.parent().filter(|p| stop.is_none_or(|s| p.descends_from(s)));
        }

        names
    }

    /// Most specific rule named `name`.
    pub fn lookup(&self, name: &str) -> Option<&Rule<C, X>> {
        self.levels().find_map(|set| set.rules.iter().find(|r| r.name == name))
    }

    /// True if `ancestor` is a strict ancestor of this level.
    pub fn descends_from(&self, ancestor: &RuleSet<C, X>) -> bool {
        self.levels().skip(1).any(|set| std::ptr::eq(set, ancestor))
    }

    /// This level followed by each ancestor.
    fn levels(&self) -> impl Iterator<Item = &RuleSet<C, X>> {
        std::iter::successors(Some(self), |set| set.parent())
    }
}

impl<C, X> std::fmt::Debug for RuleSet<C, X> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSet")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name))
            .field("rules", &self.rules)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Arc<RuleSet<String>> {
        Arc::new(RuleSet::<String>::new("base").rule("dumb", |_| Ok("lame")).rule("doc", |cx| Ok(cx.doc().clone())))
    }

    #[test]
    fn enumerate_concrete_level_first_without_duplicates() {
        let base = base();
        let child = RuleSet::new("child").extends(Arc::clone(&base)).rule("weasel", |_| Ok("bagel")).rule("dumb", |_| {
            Ok("dumber")
        });

        assert_eq!(child.enumerate(), vec!["weasel", "dumb", "doc"]);
        assert_eq!(base.enumerate(), vec!["dumb", "doc"]);
    }

    #[test]
    fn enumerate_until_excludes_stop_level() {
        let base = base();
        let mid = Arc::new(RuleSet::new("mid").extends(Arc::clone(&base)).rule("mid_only", |_| Ok(1i64)));
        let leaf = RuleSet::new("leaf").extends(Arc::clone(&mid)).rule("leaf_only", |_| Ok(2i64));

        assert_eq!(leaf.enumerate_until(Some(&base)), vec!["leaf_only", "mid_only"]);
        assert_eq!(leaf.enumerate_until(Some(&mid)), vec!["leaf_only"]);
        // A stop outside the chain still collects the concrete level.
        let stranger: RuleSet<String> = RuleSet::new("stranger");
        assert_eq!(leaf.enumerate_until(Some(&stranger)), vec!["leaf_only"]);
    }

    #[test]
    fn enumerate_empty_level() {
        let empty: RuleSet<String> = RuleSet::new("empty");
        assert!(empty.enumerate().is_empty());

        let child = RuleSet::new("child").extends(base());
        assert_eq!(child.enumerate(), vec!["dumb", "doc"]);
    }

    #[test]
    fn lookup_prefers_most_specific_level() {
        let child = RuleSet::new("child").extends(base()).rule_as("dumb", "silly", |_| Ok("dumber"));

        let rule = child.lookup("dumb").unwrap();
        assert_eq!(rule.key(), "silly");
        assert_eq!(child.lookup("doc").unwrap().key(), "doc");
        assert!(child.lookup("missing").is_none());
    }

    #[test]
    fn redeclaring_on_same_level_replaces_in_place() {
        let set: RuleSet<String> =
            RuleSet::new("set").rule("a", |_| Ok(1i64)).rule("b", |_| Ok(2i64)).hidden_rule("a", |_| Ok(3i64));

        assert_eq!(set.enumerate(), vec!["a", "b"]);
        assert!(set.lookup("a").unwrap().is_hidden());
    }

    #[test]
    fn prebuilt_rules_keep_their_visibility() {
        let set: RuleSet<String> = RuleSet::new("prebuilt")
            .with(Rule::new("slug", |_| Ok("a-b")).field_name("id"))
            .with(Rule::new("raw", |_| Ok("A B")).hidden());

        let own: Vec<(&str, Visibility)> = set.own_rules().iter().map(|r| (r.name, r.visibility)).collect();
        assert_eq!(own, vec![("slug", Visibility::Renamed("id")), ("raw", Visibility::Hidden)]);
        assert_eq!(set.lookup("slug").unwrap().key(), "id");
    }

    #[test]
    fn descends_from_is_strict() {
        let base = base();
        let child = RuleSet::new("child").extends(Arc::clone(&base));

        assert!(child.descends_from(&base));
        assert!(!base.descends_from(&base));
        assert!(!base.descends_from(&child));
    }
}
