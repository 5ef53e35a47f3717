use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

#[macro_use]
mod macros;
mod api;
mod document;
mod engine;
mod error;
pub mod rules;

pub use api::{
    ConstructDetails, ConstructVerbose, InitialValues, Options, Resolved, construct, construct_verbose_with,
    construct_with,
};
pub use document::{
    DocumentParser, HtmlDocument, HtmlParser, XmlDocument, XmlElement, XmlParser, construct_document,
    construct_document_with, construct_html, construct_xml,
};
pub use engine::{Rule, RuleEvaluation, RuleSet, Scope, Visibility, settle};
pub use error::{EngineError, RuleError};

/// Plain value type every field eventually resolves to.
pub type Value = serde_json::Value;

// --- Fields -----------------------------------------------------------------

/// The value stored under a field key.
///
/// Construction leaves every field either resolved or pending. Pending fields
/// are produced by rules that start background work; [`settle`] replaces them
/// with their outcome.
#[derive(Clone)]
pub enum Field {
    Resolved(Value),
    Pending(Pending),
}

impl Field {
    /// Wrap an async computation as a pending field.
    pub fn pending<F>(fut: F) -> Self
    where
        F: Future<Output = Result<Value, RuleError>> + Send + 'static,
    {
        Field::Pending(Pending::new(fut))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Field::Pending(_))
    }

    /// The resolved value, or `None` while the field is still pending.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Field::Resolved(value) => Some(value),
            Field::Pending(_) => None,
        }
    }

    /// View the field as a pending handle. Resolved fields become an
    /// already-completed handle so callers can await either kind uniformly.
    pub fn to_pending(&self) -> Pending {
        match self {
            Field::Resolved(value) => Pending::ready(value.clone()),
            Field::Pending(pending) => pending.clone(),
        }
    }
}

impl std::fmt::Debug for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::Resolved(value) => f.debug_tuple("Resolved").field(value).finish(),
            Field::Pending(_) => f.write_str("Pending(<future>)"),
        }
    }
}

impl From<Value> for Field {
    fn from(value: Value) -> Self {
        Field::Resolved(value)
    }
}

impl From<Pending> for Field {
    fn from(pending: Pending) -> Self {
        Field::Pending(pending)
    }
}

/// A shared, cloneable pending computation.
///
/// Cloning does not duplicate the work: every clone observes the single
/// outcome of the underlying future, so a sibling rule can hold a handle to a
/// field that is still being computed.
#[derive(Clone)]
pub struct Pending(Shared<BoxFuture<'static, Result<Value, RuleError>>>);

impl Pending {
    pub fn new<F>(fut: F) -> Self
    where
        F: Future<Output = Result<Value, RuleError>> + Send + 'static,
    {
        Pending(fut.boxed().shared())
    }

    pub fn ready(value: Value) -> Self {
        Self::new(futures::future::ready(Ok(value)))
    }
}

impl Future for Pending {
    type Output = Result<Value, RuleError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

/// Conversion from a rule body's return value into a field.
pub trait IntoField {
    fn into_field(self) -> Result<Field, RuleError>;
}

impl IntoField for Field {
    fn into_field(self) -> Result<Field, RuleError> {
        Ok(self)
    }
}

impl IntoField for Pending {
    fn into_field(self) -> Result<Field, RuleError> {
        Ok(Field::Pending(self))
    }
}

impl IntoField for Value {
    fn into_field(self) -> Result<Field, RuleError> {
        Ok(Field::Resolved(self))
    }
}

impl IntoField for String {
    fn into_field(self) -> Result<Field, RuleError> {
        Ok(Field::Resolved(Value::String(self)))
    }
}

impl IntoField for &str {
    fn into_field(self) -> Result<Field, RuleError> {
        Ok(Field::Resolved(Value::String(self.to_string())))
    }
}

impl IntoField for bool {
    fn into_field(self) -> Result<Field, RuleError> {
        Ok(Field::Resolved(Value::Bool(self)))
    }
}

impl IntoField for i64 {
    fn into_field(self) -> Result<Field, RuleError> {
        Ok(Field::Resolved(Value::from(self)))
    }
}

impl IntoField for usize {
    fn into_field(self) -> Result<Field, RuleError> {
        Ok(Field::Resolved(Value::from(self)))
    }
}

impl IntoField for f64 {
    fn into_field(self) -> Result<Field, RuleError> {
        Ok(Field::Resolved(Value::from(self)))
    }
}

impl IntoField for Vec<String> {
    fn into_field(self) -> Result<Field, RuleError> {
        Ok(Field::Resolved(Value::from(self)))
    }
}

impl<T: IntoField> IntoField for Option<T> {
    fn into_field(self) -> Result<Field, RuleError> {
        match self {
            Some(inner) => inner.into_field(),
            None => Ok(Field::Resolved(Value::Null)),
        }
    }
}
