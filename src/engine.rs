//! Lazy field resolution engine.
//!
//! This module is the *internal entry point* for the engine. It is split into
//! focused submodules under `src/engine/`; the public API in `api.rs` and the
//! document adapter in `document.rs` only go through the items re-exported here.
//!
//! ## How the parts work together
//!
//! Constructing an object from a rule set is a pipeline:
//!
//! ```text
//! RuleSet chain ──┐
//!                 │  RuleSet::enumerate             (rule_set.rs)
//!                 └───────────────┬────────────────
//!                                 │
//! initial values ── Scope::new ───┤                 (scope.rs)
//!                                 v
//!                      construct_with_metrics       (construct.rs)
//!                        - skip supplied + hidden
//!                        - force the rest through Scope::resolve
//!                        - rules resolve siblings on demand (memoized)
//!                                 │
//!                                 v
//!                     key -> Field (Resolved | Pending)
//!                                 │
//!                                 v
//!                         settle (optional)          (settle.rs)
//!                        - join_all pending fields
//!                                 │
//!                                 v
//!                          key -> Resolved(Value)
//! ```
//!
//! ## Responsibilities by module
//!
//! - `rule_set.rs`: rule declaration, refinement chains, enumeration and
//!   most-specific lookup.
//! - `scope.rs`: the memo cache, cycle guard and the handle rules receive.
//! - `construct.rs`: the forcing pass and flattening into plain fields.
//! - `settle.rs`: concurrent settlement of pending fields.
//! - `metrics.rs`: optional timing/debug data for a construction.
//!
//! ## Debugging
//!
//! The engine logs through `tracing`: construction start/finish and cycles at
//! `debug`, every rule evaluation at `trace`.

#[path = "engine/construct.rs"]
mod construct;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/rule_set.rs"]
mod rule_set;
#[path = "engine/scope.rs"]
mod scope;
#[path = "engine/settle.rs"]
mod settle;


pub(crate) use construct::construct_with_metrics;
pub use metrics::{ConstructMetrics, RuleEvaluation};
pub use rule_set::{Rule, RuleSet, Visibility};
pub use scope::Scope;
pub use settle::settle;
