//! XML documents.
//!
//! Paths are dotted tag names (`"entry.title"`), each step selecting the
//! matching children of the previous one. Tags match on their local name, so
//! namespace prefixes and default namespaces never get in the way.
//!
//! `roxmltree` borrows the text it parses; the element tree is copied into an
//! owned arena so the handle can outlive the raw input.

use super::DocumentParser;

/// Strict XML parser; malformed input fails the construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlParser;

impl DocumentParser for XmlParser {
    type Handle = XmlDocument;
    type Error = roxmltree::Error;

    fn parse(&self, raw: &str) -> Result<XmlDocument, roxmltree::Error> {
        XmlDocument::parse(raw)
    }
}

struct Node {
    name: String,
    text: Option<String>,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// A parsed XML document. Queries start at the root element.
pub struct XmlDocument {
    nodes: Vec<Node>,
    source: String,
}

impl XmlDocument {
    pub fn parse(raw: &str) -> Result<Self, roxmltree::Error> {
        let tree = roxmltree::Document::parse(raw)?;
        let mut nodes = Vec::new();
        copy_element(tree.root_element(), None, &mut nodes);
        Ok(XmlDocument { nodes, source: raw.to_string() })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> XmlElement<'_> {
        XmlElement { doc: self, id: 0 }
    }

    /// See [`XmlElement::child_text`].
    pub fn child_text(&self, path: &str) -> Option<String> {
        self.root().child_text(path)
    }

    /// See [`XmlElement::list`].
    pub fn list(&self, path: &str) -> Vec<XmlElement<'_>> {
        self.root().list(path)
    }
}

impl std::fmt::Debug for XmlDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlDocument").field("root", &self.root().name()).field("elements", &self.nodes.len()).finish()
    }
}

fn copy_element(node: roxmltree::Node<'_, '_>, parent: Option<usize>, nodes: &mut Vec<Node>) -> usize {
    let id = nodes.len();
    nodes.push(Node {
        name: node.tag_name().name().to_string(),
        text: node.text().map(str::to_string),
        parent,
        children: Vec::new(),
    });
    for child in node.children().filter(roxmltree::Node::is_element) {
        let child_id = copy_element(child, Some(id), nodes);
        nodes[id].children.push(child_id);
    }
    id
}

/// An element of an [`XmlDocument`].
///
/// Two handles are equal when they point at the same element of the same
/// document.
#[derive(Clone, Copy)]
pub struct XmlElement<'a> {
    doc: &'a XmlDocument,
    id: usize,
}

impl<'a> XmlElement<'a> {
    fn node(&self) -> &'a Node {
        &self.doc.nodes[self.id]
    }

    /// Local tag name.
    pub fn name(&self) -> &'a str {
        &self.node().name
    }

    /// Text before the first child element, as written.
    pub fn text(&self) -> Option<&'a str> {
        self.node().text.as_deref()
    }

    /// Enclosing element; `None` for the root.
    pub fn parent(&self) -> Option<XmlElement<'a>> {
        self.node().parent.map(|id| XmlElement { doc: self.doc, id })
    }

    pub fn children(self) -> impl Iterator<Item = XmlElement<'a>> {
        let doc = self.doc;
        self.node().children.iter().map(move |&id| XmlElement { doc, id })
    }

    /// Every element reached by `path`, in document order.
    pub fn list(&self, path: &str) -> Vec<XmlElement<'a>> {
        let mut matched = vec![*self];
        for tag in path.split('.') {
            matched = matched.iter().flat_map(|el| el.children()).filter(|child| child.name() == tag).collect();
        }
        matched
    }

    /// Text of the first element reached by `path`. Empty text counts as
    /// missing.
    pub fn child_text(&self, path: &str) -> Option<String> {
        self.list(path).first().and_then(XmlElement::text).filter(|t| !t.is_empty()).map(str::to_string)
    }
}

impl PartialEq for XmlElement<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.doc, other.doc) && self.id == other.id
    }
}

impl Eq for XmlElement<'_> {}

impl std::fmt::Debug for XmlElement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlElement").field("name", &self.name()).field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EngineError, InitialValues, RuleError, RuleSet, construct_xml};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn texts(elements: Vec<XmlElement<'_>>) -> Vec<String> {
        elements.iter().filter_map(|el| el.text()).map(str::to_string).collect()
    }

    fn basic(calls: &Arc<AtomicUsize>) -> Arc<RuleSet<XmlDocument>> {
        let seen = Arc::clone(calls);
        Arc::new(RuleSet::<XmlDocument>::new("basic").rule("some_attribute", move |cx| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(cx.doc().child_text("span"))
        }))
    }

    #[test]
    fn basic_rule_reads_child_text() {
        let calls = Arc::new(AtomicUsize::new(0));
        let out = construct_xml(&basic(&calls), "<xml><span>cool</span></xml>", InitialValues::new(), &Value::Null)
            .unwrap();

        assert_eq!(out.to_json().unwrap(), json!({ "some_attribute": "cool" }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn refined_rules_share_memoized_results() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fancy = RuleSet::new("fancy")
            .extends(basic(&calls))
            .hidden_rule("hidden", |cx| Ok(format!("{} - hidden", cx.text("some_attribute")?)))
            .rule_as("blah", "_$$$", |cx| Ok(format!("{} - blah", cx.text("hidden")?)))
            .rule("list", |cx| Ok(texts(cx.doc().list("span"))))
            .rule("empty_list", |cx| Ok(texts(cx.doc().list("rad"))));

        let raw = "<xml><span>cool</span><span>rad</span></xml>";
        let out = construct_xml(&fancy, raw, InitialValues::new(), &Value::Null).unwrap();

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
    fn listed_elements_link_back_to_their_parent() {
        let doc = XmlDocument::parse("<xml><span>cool</span><span>rad</span></xml>").unwrap();

        let spans = doc.list("span");
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].parent(), Some(doc.root()));
        assert_ne!(spans[0], spans[1]);
        assert_eq!(doc.root().parent(), None);

        let other = XmlDocument::parse("<xml><span>cool</span></xml>").unwrap();
        assert_ne!(other.root(), doc.root());
    }

    #[test]
    fn dotted_paths_ignore_namespaces() {
        let doc = XmlDocument::parse(
            r#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:m="urn:meta">
                 <entry><title>One</title><m:rank>1</m:rank><empty/></entry>
                 <entry><title>Two</title></entry>
               </feed>"#,
        )
        .unwrap();

        assert_eq!(doc.root().name(), "feed");
        assert_eq!(doc.child_text("entry.title"), Some("One".to_string()));
        assert_eq!(doc.child_text("entry.rank"), Some("1".to_string()));
        assert_eq!(texts(doc.list("entry.title")), vec!["One", "Two"]);
        assert_eq!(doc.child_text("entry.empty"), None);
        assert_eq!(doc.child_text("entry.missing"), None);

        let entry = doc.list("entry")[1];
        assert_eq!(entry.child_text("title"), Some("Two".to_string()));
        assert_eq!(entry.children().map(|el| el.name()).collect::<Vec<_>>(), vec!["title"]);
    }

    #[test]
    fn malformed_xml_fails_the_construction() {
        let calls = Arc::new(AtomicUsize::new(0));
        let err = construct_xml(&basic(&calls), "<xml><span>cool</xml>", InitialValues::new(), &Value::Null)
            .unwrap_err();

        assert!(matches!(err, EngineError::Document(_)), "unexpected error: {err:?}");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn missing_child_resolves_to_null() {
        let rules = RuleSet::<XmlDocument>::new("missing")
            .rule("title", |cx| Ok(cx.doc().child_text("head.title")))
            .rule("needs_title", |cx| cx.text("title").map_err(|_| RuleError::failed("no title")));

        let out = construct_xml(&rules, "<doc><head/></doc>", InitialValues::new(), &Value::Null);
        assert_eq!(
            out.unwrap_err(),
            EngineError::RuleInvocation { rule: "needs_title".into(), source: RuleError::failed("no title") }
        );
    }
}
