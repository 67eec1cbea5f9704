//! HTML documents
//!
//! HTML documents live in the same tree as XML ones and differ in their
//! default doctype, their `meta` encoding declaration and how they
//! serialize.

use crate::node::NodeKind;
use crate::{DomResult, DomTree, NodeId};

/// Public identifier of the default HTML doctype
pub const HTML_PUBLIC_ID: &str = "-//W3C//DTD HTML 4.0 Transitional//EN";
/// System identifier of the default HTML doctype
pub const HTML_SYSTEM_ID: &str = "http://www.w3.org/TR/REC-html40/loose.dtd";

const BOOLEAN_ATTRS: [&str; 13] = [
    "checked", "compact", "declare", "defer", "disabled", "ismap", "multiple", "nohref", "noresize", "noshade",
    "nowrap", "readonly", "selected",
];

const VOID_ELEMENTS: [&str; 17] = [
    "area", "base", "basefont", "br", "col", "embed", "frame", "hr", "img", "input", "isindex", "link", "meta",
    "param", "source", "track", "wbr",
];

/// Attributes written without a value in HTML
pub fn is_boolean_attr(name: &str) -> bool {
    BOOLEAN_ATTRS.iter().any(|a| a.eq_ignore_ascii_case(name))
}

/// Elements that never have an end tag
pub(crate) fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.iter().any(|e| e.eq_ignore_ascii_case(name))
}

/// Elements whose text is written unescaped
pub(crate) fn is_raw_text_element(name: &str) -> bool {
    name.eq_ignore_ascii_case("script") || name.eq_ignore_ascii_case("style")
}

/// Value of `charset=` inside a `Content-Type` value
fn charset_param(content: &str) -> Option<&str> {
    let lower = content.to_ascii_lowercase();
    let start = lower.find("charset=")? + "charset=".len();
    let rest = content[start..].trim_start();
    let end = rest.find(|c: char| c == ';' || c.is_ascii_whitespace()).unwrap_or(rest.len());
    Some(&rest[..end]).filter(|v| !v.is_empty())
}

impl DomTree {
    /// Create an HTML document
    ///
    /// Without identifiers the document gets the HTML 4.0 Transitional
    /// doctype.
    pub fn html_new_doc(&mut self, uri: Option<&str>, external_id: Option<&str>) -> DomResult<NodeId> {
        if uri.is_none() && external_id.is_none() {
            return self.html_new_doc_no_dtd(Some(HTML_SYSTEM_ID), Some(HTML_PUBLIC_ID));
        }
        self.html_new_doc_no_dtd(uri, external_id)
    }

    /// Create an HTML document with an `html` doctype only when an
    /// identifier is given
    pub fn html_new_doc_no_dtd(&mut self, uri: Option<&str>, external_id: Option<&str>) -> DomResult<NodeId> {
        let doc = self.alloc_doc(NodeKind::HtmlDocument, None)?;
        if uri.is_some() || external_id.is_some() {
            if let Err(e) = self.create_int_subset(Some(doc), Some("html"), external_id, uri) {
                self.free_doc(doc);
                return Err(e);
            }
        }
        Ok(doc)
    }

    /// Encoding declared by a `meta` element in the document head
    pub fn html_get_meta_encoding(&mut self, doc: NodeId) -> DomResult<Option<String>> {
        self.node(doc)?;
        let encoding = self.meta_encoding(doc);
        if let Some(encoding) = &encoding {
            self.injector.charge_str(encoding)?;
        }
        Ok(encoding)
    }

    /// Element child of `parent` named `name`, ignoring case
    fn html_child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.children(parent).into_iter().find(|c| {
            self.get(*c)
                .is_some_and(|n| n.kind == NodeKind::Element && n.name().is_some_and(|x| x.eq_ignore_ascii_case(name)))
        })
    }

    pub(crate) fn meta_encoding(&self, doc: NodeId) -> Option<String> {
        let mut scope = doc;
        for name in ["html", "head"] {
            if let Some(child) = self.html_child(scope, name) {
                scope = child;
            }
        }
        for meta in self.children(scope) {
            let is_meta = self
                .get(meta)
                .is_some_and(|n| n.kind == NodeKind::Element && n.name().is_some_and(|x| x.eq_ignore_ascii_case("meta")));
            if !is_meta {
                continue;
            }
            let mut http_equiv = false;
            let mut content = None;
            for attr in self.attributes(meta) {
                let Some(name) = self.get(attr).and_then(|a| a.name()) else { continue };
                let value = self.attr_value(attr);
                if name.eq_ignore_ascii_case("charset") && !value.is_empty() {
                    return Some(value);
                }
                if name.eq_ignore_ascii_case("http-equiv") && value.eq_ignore_ascii_case("content-type") {
                    http_equiv = true;
                }
                if name.eq_ignore_ascii_case("content") {
                    content = Some(value);
                }
            }
            if let (true, Some(content)) = (http_equiv, content) {
                if let Some(charset) = charset_param(&content) {
                    return Some(charset.to_owned());
                }
            }
        }
        None
    }
}
