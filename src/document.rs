//! Document adapter.
//!
//! Rules over documents never see raw text: the adapter parses it first and
//! hands the parsed handle to every rule as the context. Parsing itself is
//! delegated to a [`DocumentParser`]. [`HtmlParser`] builds an [`HtmlDocument`]
//! on top of `scraper`; [`XmlParser`] builds an [`XmlDocument`] with `roxmltree`.

use std::convert::Infallible;

use scraper::{ElementRef, Html, Selector};

use crate::RuleError;
use crate::api::{InitialValues, Options, Resolved, construct_with};
use crate::engine::RuleSet;
use crate::error::{EngineError, EngineResult};

#[path = "document/xml.rs"]
mod xml;

pub use xml::{XmlDocument, XmlElement, XmlParser};

/// Turns raw document text into a queryable handle.
pub trait DocumentParser {
    type Handle;
    type Error: std::fmt::Display;

    fn parse(&self, raw: &str) -> Result<Self::Handle, Self::Error>;
}

/// Lenient HTML parser; never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlParser;

impl DocumentParser for HtmlParser {
    type Handle = HtmlDocument;
    type Error = Infallible;

    fn parse(&self, raw: &str) -> Result<HtmlDocument, Infallible> {
        Ok(HtmlDocument::parse(raw))
    }
}

/// A parsed HTML document with CSS-selector queries.
///
/// Text returned by the query helpers is whitespace-normalized: runs of
/// whitespace collapse to one space and the ends are trimmed.
pub struct HtmlDocument {
    html: Html,
    source: String,
}

impl HtmlDocument {
    pub fn parse(raw: &str) -> Self {
        HtmlDocument { html: Html::parse_document(raw), source: raw.to_string() }
    }

    /// The raw text this document was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    /// Every element matching `css`, in document order.
    pub fn select(&self, css: &str) -> Result<Vec<ElementRef<'_>>, RuleError> {
        let selector = parse_selector(css)?;
        Ok(self.html.select(&selector).collect())
    }

    /// Text of the first element matching `css`.
    pub fn text(&self, css: &str) -> Result<Option<String>, RuleError> {
        Ok(self.select(css)?.into_iter().next().map(element_text))
    }

    /// Non-empty text of every element matching `css`.
    pub fn texts(&self, css: &str) -> Result<Vec<String>, RuleError> {
        Ok(self.select(css)?.into_iter().map(element_text).filter(|t| !t.is_empty()).collect())
    }

    /// Attribute `name` of the first element matching `css` that carries it.
    pub fn attr(&self, css: &str, name: &str) -> Result<Option<String>, RuleError> {
        Ok(self.attrs(css, name)?.into_iter().next())
    }

    /// Attribute `name` of every element matching `css` that carries it.
    pub fn attrs(&self, css: &str, name: &str) -> Result<Vec<String>, RuleError> {
        Ok(self.select(css)?.into_iter().filter_map(|el| el.value().attr(name)).map(|v| v.trim().to_string()).collect())
    }
}

impl std::fmt::Debug for HtmlDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlDocument").field("source_len", &self.source.len()).finish()
    }
}

/// Whitespace-normalized text content of `element`.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    normalize_text(&element.text().collect::<String>())
}

pub(crate) fn normalize_text(text: &str) -> String {
    regex!(r"\s+").replace_all(text.trim(), " ").into_owned()
}

fn parse_selector(css: &str) -> Result<Selector, RuleError> {
    Selector::parse(css).map_err(|err| RuleError::Selector { selector: css.to_string(), reason: format!("{err:?}") })
}

/// Parse `raw` with `parser` and construct an object from `rules`.
pub fn construct_document<P, X>(
    parser: &P,
    rules: &RuleSet<P::Handle, X>,
    raw: &str,
    initial: impl Into<InitialValues>,
    extras: &X,
) -> EngineResult<Resolved>
where
    P: DocumentParser,
{
    construct_document_with(parser, rules, raw, initial, extras, &Options::default())
}

pub fn construct_document_with<P, X>(
    parser: &P,
    rules: &RuleSet<P::Handle, X>,
    raw: &str,
    initial: impl Into<InitialValues>,
    extras: &X,
    options: &Options,
) -> EngineResult<Resolved>
where
    P: DocumentParser,
{
    let handle = parser.parse(raw).map_err(|err| EngineError::Document(err.to_string()))?;
    tracing::debug!(rule_set = rules.name(), bytes = raw.len(), "document parsed");
    construct_with(rules, &handle, initial, extras, options)
}

/// Parse `raw` as HTML and construct an object from `rules`.
///
/// # Example
/// ```
/// use lazydoc::{HtmlDocument, InitialValues, RuleSet, construct_html};
/// use serde_json::{Value, json};
///
/// let rules = RuleSet::<HtmlDocument>::new("spans").rule("some_attribute", |cx| cx.doc().text("span"));
///
/// let out = construct_html(&rules, "<span>cool</span>", InitialValues::new(), &Value::Null).unwrap();
/// assert_eq!(out.to_json().unwrap(), json!({ "some_attribute": "cool" }));
/// ```
pub fn construct_html<X>(
    rules: &RuleSet<HtmlDocument, X>,
    raw: &str,
    initial: impl Into<InitialValues>,
    extras: &X,
) -> EngineResult<Resolved> {
    construct_document(&HtmlParser, rules, raw, initial, extras)
}

/// Parse `raw` as XML and construct an object from `rules`.
pub fn construct_xml<X>(
    rules: &RuleSet<XmlDocument, X>,
    raw: &str,
    initial: impl Into<InitialValues>,
    extras: &X,
) -> EngineResult<Resolved> {
    construct_document(&XmlParser, rules, raw, initial, extras)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn rules_receive_parsed_document() {
        let rules = RuleSet::<HtmlDocument>::new("MyParser")
            .rule("dumb", |_| Ok("lame"))
            .rule("extras", |cx| Ok(cx.extras().clone()))
            .rule("doc", |cx| Ok(cx.doc().source().to_string()))
            .rule("div", |cx| cx.doc().text("div.dumb"));

        let raw = r#"<div class="dumb">ddd</div>"#;
        let initial = InitialValues::from_iter([("init", json!("something"))]);
        let out = construct_html(&rules, raw, initial, &json!({"extra": "else"})).unwrap();

        assert_eq!(
            out.to_json().unwrap(),
            json!({
                "dumb": "lame",
                "extras": { "extra": "else" },
                "init": "something",
                "doc": raw,
                "div": "ddd",
            })
        );
    }

    #[test]
    fn missing_element_resolves_to_null() {
        let rules = RuleSet::<HtmlDocument>::new("basic").rule("some_attribute", |cx| cx.doc().text("span"));

        let out = construct_html(&rules, "<p>nothing here</p>", InitialValues::new(), &Value::Null).unwrap();
        assert_eq!(out.value("some_attribute"), Some(&Value::Null));
    }

    #[test]
    fn sibling_queries_are_memoized() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);

        let rules = RuleSet::<HtmlDocument>::new("fancy")
            .rule("some_attribute", move |cx| {
                seen.fetch_add(1, Ordering::SeqCst);
                cx.doc().text("span")
            })
            .hidden_rule("hidden", |cx| Ok(format!("{} - hidden", cx.text("some_attribute")?)))
            .rule_as("blah", "_$$$", |cx| Ok(format!("{} - blah", cx.text("hidden")?)))
            .rule("list", |cx| cx.doc().texts("span"))
            .rule("empty_list", |cx| cx.doc().texts("rad"));

        let raw = "<div><span>cool</span><span>rad</span></div>";
        let out = construct_html(&rules, raw, InitialValues::new(), &Value::Null).unwrap();

        assert_eq!(
            out.to_json().unwrap(),
            json!({
                "some_attribute": "cool",
                "_$$$": "cool - hidden - blah",
                "list": ["cool", "rad"],
                "empty_list": [],
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn attributes_and_normalized_text() {
        let doc = HtmlDocument::parse(
            r#"<ul><li><a href=" /a ">  first
                 link </a></li><li><a>no href</a></li><li><a href="/b">second</a></li></ul>"#,
        );

        assert_eq!(doc.attrs("a", "href").unwrap(), vec!["/a".to_string(), "/b".to_string()]);
        assert_eq!(doc.attr("a", "href").unwrap(), Some("/a".to_string()));
        assert_eq!(doc.text("a").unwrap(), Some("first link".to_string()));
        assert_eq!(doc.texts("li").unwrap(), vec!["first link", "no href", "second"]);
    }

    #[test]
    fn invalid_selector_fails_the_rule() {
        let rules = RuleSet::<HtmlDocument>::new("bad").rule("broken", |cx| cx.doc().text("div[["));

        let err = construct_html(&rules, "<div></div>", InitialValues::new(), &Value::Null).unwrap_err();
        match err {
            EngineError::RuleInvocation { rule, source: RuleError::Selector { selector, .. } } => {
                assert_eq!(rule, "broken");
                assert_eq!(selector, "div[[");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn options_reach_the_engine() {
        let rules = RuleSet::<HtmlDocument>::new("loop")
            .rule("a", |cx| cx.value("b"))
            .rule("b", |cx| cx.value("a"));

        let options = Options::default();
        let err = construct_document_with(&HtmlParser, &rules, "<p></p>", InitialValues::new(), &Value::Null, &options)
            .unwrap_err();
        assert_eq!(err, EngineError::CycleDetected { path: vec!["a".into(), "b".into(), "a".into()] });
    }

    struct Upper;

    impl DocumentParser for Upper {
        type Handle = String;
        type Error = String;

        fn parse(&self, raw: &str) -> Result<String, String> {
            if raw.is_empty() { Err("empty document".to_string()) } else { Ok(raw.to_uppercase()) }
        }
    }

    #[test]
    fn custom_parser_handle_is_the_context() {
        let rules = RuleSet::<String>::new("upper").rule("doc", |cx| Ok(cx.doc().clone()));

        let out = construct_document(&Upper, &rules, "abc", InitialValues::new(), &Value::Null).unwrap();
        assert_eq!(out.value("doc"), Some(&json!("ABC")));

        let err = construct_document(&Upper, &rules, "", InitialValues::new(), &Value::Null).unwrap_err();
        assert_eq!(err, EngineError::Document("empty document".to_string()));
    }
}
