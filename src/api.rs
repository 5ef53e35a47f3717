use crate::engine::{self, ConstructMetrics, RuleEvaluation, RuleSet};
use crate::error::{EngineError, EngineResult};
use crate::{Field, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// Options that affect construction behavior.
#[derive(Debug, Clone)]
pub struct Options {
    /// Fail with [`EngineError::CycleDetected`] when a rule is re-entered while
    /// it is still being computed. When disabled, a cyclic rule set recurses
    /// until the stack is exhausted.
    pub detect_cycles: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self { detect_cycles: true }
    }
}

/// Pre-supplied field values. Any key present here is never computed.
#[derive(Debug, Clone, Default)]
pub struct InitialValues(BTreeMap<String, Field>);

impl InitialValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, field: impl Into<Field>) -> &mut Self {
        self.0.insert(key.into(), field.into());
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Field>> FromIterator<(K, V)> for InitialValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<serde_json::Map<String, Value>> for InitialValues {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        map.into_iter().collect()
    }
}

impl From<BTreeMap<String, Field>> for InitialValues {
    fn from(map: BTreeMap<String, Field>) -> Self {
        Self(map)
    }
}

/// The constructed object: every field key mapped to its value.
///
/// Fields may still be pending right after construction; call
/// [`Resolved::settle`] to await them.
#[derive(Debug, Clone, Default)]
pub struct Resolved {
    fields: BTreeMap<String, Field>,
}

impl Resolved {
    pub fn get(&self, key: &str) -> Option<&Field> {
        self.fields.get(key)
    }

    /// The resolved value of `key`, or `None` if it is missing or still pending.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).and_then(Field::as_value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// True when no field is pending.
    pub fn is_settled(&self) -> bool {
        self.fields.values().all(|f| !f.is_pending())
    }

    /// Keys of the fields that are still pending.
    pub fn pending_keys(&self) -> Vec<String> {
        self.fields.iter().filter(|(_, f)| f.is_pending()).map(|(k, _)| k.clone()).collect()
    }

    /// Await every pending field in place. See [`engine::settle`].
    pub async fn settle(&mut self) -> EngineResult<&mut Self> {
        engine::settle(self).await
    }

    /// Flatten into a JSON object. Fails if any field is still pending.
    pub fn to_json(&self) -> EngineResult<Value> {
        let mut map = serde_json::Map::new();
        for (key, field) in &self.fields {
            match field {
                Field::Resolved(value) => {
                    map.insert(key.clone(), value.clone());
                }
                Field::Pending(_) => return Err(EngineError::Unsettled { keys: self.pending_keys() }),
            }
        }
        Ok(Value::Object(map))
    }

    pub fn into_fields(self) -> BTreeMap<String, Field> {
        self.fields
    }

    pub(crate) fn fields(&self) -> &BTreeMap<String, Field> {
        &self.fields
    }

    pub(crate) fn fields_mut(&mut self) -> &mut BTreeMap<String, Field> {
        &mut self.fields
    }
}

/// Additional details returned by [`construct_verbose_with`].
#[derive(Debug, Clone)]
pub struct ConstructDetails {
    /// Total elapsed time.
    pub total: Duration,
    /// Time spent forcing rules.
    pub forcing: Duration,
    /// Rule names in enumeration order (hidden rules included).
    pub enumerated: Vec<String>,
    /// Keys that were pre-supplied and therefore not computed.
    pub supplied: Vec<String>,
    /// Rule bodies that ran, in completion order.
    pub evaluations: Vec<RuleEvaluation>,
}

/// Result from [`construct_verbose_with`].
#[derive(Debug, Clone)]
pub struct ConstructVerbose {
    pub resolved: Resolved,
    pub details: ConstructDetails,
}

/// Construct an object from `rules` using default [`Options`].
///
/// # Example
/// ```
/// use lazydoc::{InitialValues, RuleSet, construct};
/// use serde_json::{Value, json};
///
/// let rules = RuleSet::<String>::new("greeting")
///     .rule("name", |cx| Ok(cx.doc().to_uppercase()))
///     .rule("hello", |cx| Ok(format!("hello {}", cx.text("name")?)));
///
/// let out = construct(&rules, &"ada".to_string(), InitialValues::new(), &Value::Null).unwrap();
/// assert_eq!(out.to_json().unwrap(), json!({ "name": "ADA", "hello": "hello ADA" }));
/// ```
pub fn construct<C, X>(
    rules: &RuleSet<C, X>,
    doc: &C,
    initial: impl Into<InitialValues>,
    extras: &X,
) -> EngineResult<Resolved> {
    construct_with(rules, doc, initial, extras, &Options::default())
}

/// Construct an object from `rules` with the provided `options`.
pub fn construct_with<C, X>(
    rules: &RuleSet<C, X>,
    doc: &C,
    initial: impl Into<InitialValues>,
    extras: &X,
    options: &Options,
) -> EngineResult<Resolved> {
    let run = engine::construct_with_metrics(rules, doc, initial.into().0, extras, options)?;
    Ok(Resolved { fields: run.fields })
}

/// Construct an object and return extra details about which rules ran.
///
/// This is useful for profiling and rule debugging. The default
/// [`construct_with`] path drops these details.
pub fn construct_verbose_with<C, X>(
    rules: &RuleSet<C, X>,
    doc: &C,
    initial: impl Into<InitialValues>,
    extras: &X,
    options: &Options,
) -> EngineResult<ConstructVerbose> {
    let run = engine::construct_with_metrics(rules, doc, initial.into().0, extras, options)?;
    let ConstructMetrics { total, forcing, enumerated, supplied, evaluations } = run.metrics;

    let details = ConstructDetails {
        total,
        forcing,
        enumerated: enumerated.into_iter().map(str::to_string).collect(),
        supplied,
        evaluations,
    };

    Ok(ConstructVerbose { resolved: Resolved { fields: run.fields }, details })
}
