//! Generic page metadata.
//!
//! | field         | source                                                    |
//! |---------------|-----------------------------------------------------------|
//! | `title`       | `<title>`, else `og:title`, else the first `<h1>`         |
//! | `description` | `meta[name=description]`, else `og:description`          |
//! | `canonical`   | `link[rel=canonical]`                                     |
//! | `language`    | `<html lang>`                                             |
//! | `headings`    | `h1`-`h3` text, document order                            |
//! | `links`       | distinct `a[href]` targets, skipping fragments/`javascript:` |
//! | `word_count`  | words in the body text                                    |
//!
//! `body_text` is hidden: refinements can resolve it, it is never emitted.

use std::collections::HashSet;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::document::element_text;
use crate::{HtmlDocument, RuleError, RuleSet};

static PAGE_RULES: Lazy<Arc<RuleSet<HtmlDocument>>> = Lazy::new(|| Arc::new(build()));

/// The shared page rule set.
pub fn rules() -> Arc<RuleSet<HtmlDocument>> {
    Arc::clone(&PAGE_RULES)
}

fn build() -> RuleSet<HtmlDocument> {
    rule_set! {
        name: "page",
        context: HtmlDocument,
        rules: {
            title => |cx| title(cx.doc()),
            description => |cx| {
                let doc = cx.doc();
                match doc.attr(r#"meta[name="description"]"#, "content")? {
                    Some(description) => Ok(Some(description)),
                    None => doc.attr(r#"meta[property="og:description"]"#, "content"),
                }
            },
            canonical => |cx| cx.doc().attr(r#"link[rel="canonical"]"#, "href"),
            language => |cx| cx.doc().attr("html", "lang"),
            headings => |cx| Ok(headings(cx.doc())),
            links => |cx| Ok(links(cx.doc())),
            body_text as hidden => |cx| Ok(body_text(cx.doc())),
            word_count => |cx| Ok(cx.text("body_text")?.split_whitespace().count()),
        },
    }
}

fn title(doc: &HtmlDocument) -> Result<Option<String>, RuleError> {
    if let Some(title) = doc.text("title")?.filter(|t| !t.is_empty()) {
        return Ok(Some(title));
    }
    if let Some(title) = doc.attr(r#"meta[property="og:title"]"#, "content")? {
        return Ok(Some(title));
    }
    doc.text("h1")
}

fn headings(doc: &HtmlDocument) -> Vec<String> {
    doc.html().select(selector!("h1, h2, h3")).map(element_text).filter(|t| !t.is_empty()).collect()
}

fn links(doc: &HtmlDocument) -> Vec<String> {
    let mut seen = HashSet::new();
    doc.html()
        .select(selector!("a[href]"))
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty() && !href.starts_with('#') && !href.starts_with("javascript:"))
        .filter(|href| seen.insert(*href))
        .map(str::to_string)
        .collect()
}

fn body_text(doc: &HtmlDocument) -> String {
    doc.html().select(selector!("body")).next().map(element_text).unwrap_or_default()
}
