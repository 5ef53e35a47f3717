//! Ready-made rule sets.
//!
//! These are ordinary [`RuleSet`](crate::RuleSet)s; extend them with
//! `RuleSet::extends` (or `extends:` in [`rule_set!`](crate::rule_set)) to add
//! or override rules for a particular kind of page.

pub mod page;
