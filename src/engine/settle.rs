//! Settlement of pending fields.
//!
//! Construction is synchronous, but a rule may hand back a [`Field::Pending`]
//! instead of a value. Settlement awaits every such field *together* and writes
//! the outcomes back in place:
//!
//! ```text
//! { cat: Pending, dog: Pending, dumb: "dumber" }
//!        │             │
//!        └── join_all ─┘          (no short-circuit)
//!               │
//!               v
//! { cat: "cheshire", dog: "cheshire-...", dumb: "dumber" }
//! ```
//!
//! Every pending field is awaited to completion even if another one fails, and
//! every failure is reported. Successful fields are written back even when
//! others fail; failed fields stay pending (re-awaiting them yields the same
//! error).

use futures::future::join_all;

use crate::api::Resolved;
use crate::error::{EngineError, EngineResult};
use crate::{Field, RuleError};

/// Await every pending field of `resolved` and replace it with its outcome.
///
/// Returns the same instance it was given. Settling an already-settled object
/// does nothing.
pub async fn settle(resolved: &mut Resolved) -> EngineResult<&mut Resolved> {
    let pending: Vec<_> = resolved
        .fields()
        .iter()
        .filter_map(|(key, field)| match field {
            Field::Pending(p) => Some((key.clone(), p.clone())),
            Field::Resolved(_) => None,
        })
        .collect();

    if pending.is_empty() {
        return Ok(resolved);
    }

    tracing::debug!(pending = pending.len(), "settling pending fields");

    let outcomes = join_all(pending.into_iter().map(|(key, p)| async move { (key, p.await) })).await;

    let mut failures: Vec<(String, RuleError)> = Vec::new();
    for (key, outcome) in outcomes {
        match outcome {
            Ok(value) => {
                resolved.fields_mut().insert(key, Field::Resolved(value));
            }
            Err(err) => {
                tracing::debug!(key = %key, error = %err, "pending field failed");
                failures.push((key, err));
            }
        }
    }

    if !failures.is_empty() {
        return Err(EngineError::Settlement { failures });
    }

    Ok(resolved)
}
