//! Serialization
//!
//! Writes nodes, documents and DTD declarations back out as XML text.
//! Characters the target encoding cannot represent become character
//! references. HTML output drops the XML declaration, leaves void
//! elements unclosed and minimizes boolean attributes.

use std::fmt::Write;

use quick_xml::escape::{escape, partial_escape};

use crate::html::{is_boolean_attr, is_raw_text_element, is_void_element};
use crate::node::{AttributeDefault, AttributeType, EntityType, NodeKind};
use crate::{DomError, DomResult, DomTree, NodeId};

/// Public identifiers of the XHTML 1.0 DTDs
const XHTML_PUBLIC_IDS: [&str; 3] = [
    "-//W3C//DTD XHTML 1.0 Strict//EN",
    "-//W3C//DTD XHTML 1.0 Transitional//EN",
    "-//W3C//DTD XHTML 1.0 Frameset//EN",
];

/// System identifiers of the XHTML 1.0 DTDs
const XHTML_SYSTEM_IDS: [&str; 3] = [
    "http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd",
    "http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd",
    "http://www.w3.org/TR/xhtml1/DTD/xhtml1-frameset.dtd",
];

/// Whether the identifiers name one of the XHTML 1.0 DTDs
pub fn is_xhtml(system_id: Option<&str>, public_id: Option<&str>) -> bool {
    system_id.is_some_and(|s| XHTML_SYSTEM_IDS.contains(&s)) || public_id.is_some_and(|p| XHTML_PUBLIC_IDS.contains(&p))
}

/// Output character sets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Charset {
    Utf8,
    Latin1,
    Ascii,
}

impl Charset {
    fn from_name(name: Option<&str>) -> DomResult<Self> {
        let Some(name) = name else { return Ok(Self::Utf8) };
        match name.to_ascii_uppercase().as_str() {
            "UTF-8" | "UTF8" => Ok(Self::Utf8),
            "ISO-8859-1" | "LATIN1" | "ISO-LATIN-1" => Ok(Self::Latin1),
            "US-ASCII" | "ASCII" => Ok(Self::Ascii),
            _ => Err(DomError::UnsupportedEncoding),
        }
    }

    fn encodes(self, c: char) -> bool {
        match self {
            Self::Utf8 => true,
            Self::Latin1 => (c as u32) < 0x100,
            Self::Ascii => c.is_ascii(),
        }
    }
}

struct Serializer<'t> {
    tree: &'t DomTree,
    out: String,
    charset: Charset,
    format: bool,
    html: bool,
    /// Inside `script` or `style`
    raw: bool,
}

impl<'t> Serializer<'t> {
    fn new(tree: &'t DomTree, charset: Charset, format: bool) -> Self {
        Self { tree, out: String::new(), charset, format, html: false, raw: false }
    }

    fn html(tree: &'t DomTree, charset: Charset, format: bool) -> Self {
        Self { html: true, ..Self::new(tree, charset, format) }
    }

    fn push(&mut self, s: &str) {
        for c in s.chars() {
            if self.charset.encodes(c) {
                self.out.push(c);
            } else {
                let _ = write!(self.out, "&#x{:X};", c as u32);
            }
        }
    }

    fn push_text(&mut self, s: &str) {
        let escaped = partial_escape(s).replace('\r', "&#13;");
        self.push(&escaped);
    }

    fn push_attr_text(&mut self, s: &str) {
        let escaped = escape(s).replace('\n', "&#10;").replace('\r', "&#13;").replace('\t', "&#9;");
        self.push(&escaped);
    }

    fn indent(&mut self, level: usize) {
        if self.format {
            for _ in 0..level {
                self.out.push_str("  ");
            }
        }
    }

    /// ` name="value"` for an attribute node
    fn attribute(&mut self, attr: NodeId) {
        let name = self.tree.qualified_name(attr);
        self.out.push(' ');
        self.push(&name);
        if self.html && is_boolean_attr(&name) {
            return;
        }
        self.out.push_str("=\"");
        let mut cur = self.tree.first_child(attr);
        while let Some(child) = cur {
            match self.tree.get(child) {
                Some(n) if n.kind == NodeKind::EntityRef => {
                    self.out.push('&');
                    self.push(n.name().unwrap_or_default());
                    self.out.push(';');
                }
                Some(n) => self.push_attr_text(n.content().unwrap_or_default()),
                None => {}
            }
            cur = self.tree.next_sibling(child);
        }
        self.out.push('"');
    }

    fn element(&mut self, elem: NodeId, level: usize) {
        let tree = self.tree;
        let Some(node) = tree.get(elem) else { return };
        let name = tree.qualified_name(elem);
        self.out.push('<');
        self.push(&name);
        for &ns in node.ns_defs() {
            let Some(decl) = tree.namespace(ns) else { continue };
            match decl.prefix() {
                Some(prefix) => {
                    self.out.push_str(" xmlns:");
                    self.push(prefix);
                }
                None => self.out.push_str(" xmlns"),
            }
            self.out.push_str("=\"");
            self.push_attr_text(decl.href().unwrap_or_default());
            self.out.push('"');
        }
        for attr in tree.attributes(elem) {
            self.attribute(attr);
        }
        let children = tree.children(elem);
        if self.html && is_void_element(&name) {
            self.out.push('>');
            return;
        }
        if children.is_empty() {
            if self.html {
                self.out.push_str("></");
                self.push(&name);
                self.out.push('>');
            } else {
                self.out.push_str("/>");
            }
            return;
        }
        self.out.push('>');

        let format = self.format
            && children
                .iter()
                .all(|c| !matches!(tree.kind(*c), Some(NodeKind::Text | NodeKind::CData | NodeKind::EntityRef)));
        let saved = (self.format, self.raw);
        self.format = format;
        self.raw = self.html && is_raw_text_element(&name);
        for child in children {
            if format {
                self.out.push('\n');
            }
            self.indent(level + 1);
            self.node(child, level + 1);
        }
        if format {
            self.out.push('\n');
        }
        self.indent(level);
        (self.format, self.raw) = saved;
        self.out.push_str("</");
        self.push(&name);
        self.out.push('>');
    }

    fn dtd(&mut self, dtd: NodeId) {
        let tree = self.tree;
        let Some(node) = tree.get(dtd) else { return };
        self.out.push_str("<!DOCTYPE ");
        self.push(node.name().unwrap_or_default());
        if let Some(data) = node.dtd_data() {
            match (&data.external_id, &data.system_id) {
                (Some(public), system) => {
                    self.out.push_str(" PUBLIC \"");
                    self.push(public);
                    self.out.push('"');
                    if let Some(system) = system {
                        self.out.push_str(" \"");
                        self.push(system);
                        self.out.push('"');
                    }
                }
                (None, Some(system)) => {
                    self.out.push_str(" SYSTEM \"");
                    self.push(system);
                    self.out.push('"');
                }
                (None, None) => {}
            }
        }
        let children = tree.children(dtd);
        let subset = !children.is_empty() || node.dtd_data().is_some_and(|d| !d.notations.is_empty());
        if subset && !self.html {
            self.out.push_str(" [\n");
            for child in children {
                self.node(child, 0);
            }
            self.notations(dtd);
            self.out.push(']');
        }
        self.out.push('>');
    }

    fn quoted(&mut self, value: &str) {
        let quote = if value.contains('"') { '\'' } else { '"' };
        self.out.push(quote);
        self.push(value);
        self.out.push(quote);
    }

    fn element_decl(&mut self, decl: NodeId) {
        let Some(node) = self.tree.get(decl) else { return };
        let Some(data) = node.element_decl() else { return };
        self.out.push_str("<!ELEMENT ");
        if let Some(prefix) = &data.prefix {
            self.push(prefix);
            self.out.push(':');
        }
        self.push(node.name().unwrap_or_default());
        self.out.push(' ');
        self.out.push_str(data.content.as_str());
        self.out.push_str(">\n");
    }

    fn attribute_decl(&mut self, decl: NodeId) {
        let Some(node) = self.tree.get(decl) else { return };
        let Some(data) = node.attribute_decl() else { return };
        self.out.push_str("<!ATTLIST ");
        self.push(&data.element);
        self.out.push(' ');
        if let Some(prefix) = &data.prefix {
            self.push(prefix);
            self.out.push(':');
        }
        self.push(node.name().unwrap_or_default());
        if data.atype != AttributeType::Enumeration {
            self.out.push(' ');
            self.out.push_str(data.atype.as_str());
        }
        match data.default {
            AttributeDefault::None => {}
            AttributeDefault::Required => self.out.push_str(" #REQUIRED"),
            AttributeDefault::Implied => self.out.push_str(" #IMPLIED"),
            AttributeDefault::Fixed => self.out.push_str(" #FIXED"),
        }
        if let Some(value) = &data.default_value {
            self.out.push(' ');
            self.quoted(value);
        }
        self.out.push_str(">\n");
    }

    fn entity_decl(&mut self, ent: NodeId) {
        let Some(node) = self.tree.get(ent) else { return };
        let Some(data) = node.entity_data() else { return };
        if data.etype == EntityType::InternalPredefined {
            return;
        }
        self.out.push_str("<!ENTITY ");
        if data.etype.is_parameter() {
            self.out.push_str("% ");
        }
        self.push(node.name().unwrap_or_default());
        match (&data.external_id, &data.system_id) {
            (Some(public), system) => {
                self.out.push_str(" PUBLIC ");
                self.quoted(public);
                self.out.push(' ');
                self.quoted(system.as_deref().unwrap_or_default());
            }
            (None, Some(system)) => {
                self.out.push_str(" SYSTEM ");
                self.quoted(system);
            }
            (None, None) => {
                self.out.push(' ');
                self.quoted(node.content().unwrap_or_default());
            }
        }
        self.out.push_str(">\n");
    }

    fn notations(&mut self, dtd: NodeId) {
        let Some(data) = self.tree.get(dtd).and_then(|d| d.dtd_data()) else { return };
        for (name, notation) in &data.notations {
            self.out.push_str("<!NOTATION ");
            self.push(name);
            match (&notation.public_id, &notation.system_id) {
                (Some(public), system) => {
                    self.out.push_str(" PUBLIC ");
                    self.quoted(public);
                    if let Some(system) = system {
                        self.out.push(' ');
                        self.quoted(system);
                    }
                }
                (None, Some(system)) => {
                    self.out.push_str(" SYSTEM ");
                    self.quoted(system);
                }
                (None, None) => {}
            }
            self.out.push_str(">\n");
        }
    }

    fn node(&mut self, id: NodeId, level: usize) {
        let tree = self.tree;
        let Some(node) = tree.get(id) else { return };
        match node.kind {
            NodeKind::Element => self.element(id, level),
            NodeKind::Attribute => self.attribute(id),
            NodeKind::Text if self.raw => self.push(node.content().unwrap_or_default()),
            NodeKind::Text => self.push_text(node.content().unwrap_or_default()),
            NodeKind::CData => {
                self.out.push_str("<![CDATA[");
                self.push(node.content().unwrap_or_default());
                self.out.push_str("]]>");
            }
            NodeKind::EntityRef => {
                self.out.push('&');
                self.push(node.name().unwrap_or_default());
                self.out.push(';');
            }
            NodeKind::Pi => {
                self.out.push_str("<?");
                self.push(node.name().unwrap_or_default());
                if let Some(content) = node.content() {
                    self.out.push(' ');
                    self.push(content);
                }
                self.out.push_str("?>");
            }
            NodeKind::Comment => {
                self.out.push_str("<!--");
                self.push(node.content().unwrap_or_default());
                self.out.push_str("-->");
            }
            NodeKind::Document | NodeKind::HtmlDocument => {
                for child in tree.children(id) {
                    self.node(child, 0);
                    self.out.push('\n');
                }
            }
            NodeKind::DocumentFragment => {
                for child in tree.children(id) {
                    self.node(child, level);
                }
            }
            NodeKind::Dtd => self.dtd(id),
            NodeKind::ElementDecl => self.element_decl(id),
            NodeKind::AttributeDecl => self.attribute_decl(id),
            NodeKind::EntityDecl => self.entity_decl(id),
        }
    }
}

impl DomTree {
    fn finish(&mut self, out: String) -> DomResult<String> {
        self.injector.charge_str(&out)?;
        Ok(out)
    }

    /// Serialize a document with its XML declaration
    ///
    /// `encoding` overrides the document's own; unsupported encodings are
    /// an error.
    pub fn doc_dump_memory(&mut self, doc: NodeId, format: bool, encoding: Option<&str>) -> DomResult<Option<String>> {
        let Some(data) = self.node(doc)?.doc_data() else { return Ok(None) };
        let encoding = encoding.map(str::to_owned).or_else(|| data.encoding.clone());
        let version = data.version.clone();
        let charset = Charset::from_name(encoding.as_deref())?;

        let mut ser = Serializer::new(self, charset, format);
        ser.out.push_str("<?xml version=\"");
        ser.push(version.as_deref().unwrap_or(crate::DEFAULT_VERSION));
        ser.out.push('"');
        if let Some(encoding) = &encoding {
            ser.out.push_str(" encoding=\"");
            ser.push(encoding);
            ser.out.push('"');
        }
        ser.out.push_str("?>\n");
        ser.node(doc, 0);
        let out = ser.out;
        self.finish(out).map(Some)
    }

    /// Serialize a node at indentation `level`
    pub fn node_dump(&mut self, node: NodeId, level: usize, format: bool) -> DomResult<String> {
        self.node(node)?;
        let mut ser = Serializer::new(self, Charset::Utf8, format);
        ser.node(node, level);
        let out = ser.out;
        self.finish(out)
    }

    /// Serialize a node in the given output encoding
    pub fn node_dump_output(&mut self, node: NodeId, level: usize, format: bool, encoding: Option<&str>) -> DomResult<String> {
        self.node(node)?;
        let charset = Charset::from_name(encoding)?;
        let mut ser = Serializer::new(self, charset, format);
        ser.node(node, level);
        let out = ser.out;
        self.finish(out)
    }

    /// Serialize a document as HTML
    ///
    /// The output encoding is the one declared by a `meta` element, else
    /// the document's own. `None` unless `doc` is a document.
    pub fn html_doc_dump_memory(&mut self, doc: NodeId, format: bool) -> DomResult<Option<String>> {
        let Some(data) = self.node(doc)?.doc_data() else { return Ok(None) };
        let encoding = self.meta_encoding(doc).or_else(|| data.encoding.clone());
        let charset = Charset::from_name(encoding.as_deref())?;
        let mut ser = Serializer::html(self, charset, format);
        ser.node(doc, 0);
        let out = ser.out;
        self.finish(out).map(Some)
    }

    /// Serialize a document as HTML in the given output encoding
    pub fn html_doc_content_dump_output(&mut self, doc: NodeId, encoding: Option<&str>, format: bool) -> DomResult<Option<String>> {
        if self.node(doc)?.doc_data().is_none() {
            return Ok(None);
        }
        self.html_node_dump_output(doc, encoding, format).map(Some)
    }

    /// Serialize a node as HTML
    pub fn html_node_dump(&mut self, node: NodeId) -> DomResult<String> {
        self.html_node_dump_output(node, None, true)
    }

    /// Serialize a node as HTML in the given output encoding
    pub fn html_node_dump_output(&mut self, node: NodeId, encoding: Option<&str>, format: bool) -> DomResult<String> {
        self.node(node)?;
        let charset = Charset::from_name(encoding)?;
        let mut ser = Serializer::html(self, charset, format);
        ser.node(node, 0);
        let out = ser.out;
        self.finish(out)
    }

    /// Text content of a node, empty when it has none
    pub fn node_buf_get_content(&mut self, node: NodeId) -> DomResult<String> {
        Ok(self.get_content(node)?.unwrap_or_default())
    }

    /// Escape `value` for use inside an attribute value
    pub fn attr_serialize_txt_content(&mut self, value: &str) -> DomResult<String> {
        let mut ser = Serializer::new(self, Charset::Utf8, false);
        ser.push_attr_text(value);
        let out = ser.out;
        self.finish(out)
    }

    fn dump_kind(&mut self, node: NodeId, kind: NodeKind) -> DomResult<Option<String>> {
        if self.node(node)?.kind != kind {
            return Ok(None);
        }
        let mut ser = Serializer::new(self, Charset::Utf8, false);
        ser.node(node, 0);
        let out = ser.out;
        self.finish(out).map(Some)
    }

    pub fn dump_element_decl(&mut self, decl: NodeId) -> DomResult<Option<String>> {
        self.dump_kind(decl, NodeKind::ElementDecl)
    }

    pub fn dump_attribute_decl(&mut self, decl: NodeId) -> DomResult<Option<String>> {
        self.dump_kind(decl, NodeKind::AttributeDecl)
    }

    pub fn dump_entity_decl(&mut self, ent: NodeId) -> DomResult<Option<String>> {
        self.dump_kind(ent, NodeKind::EntityDecl)
    }

    /// Serialize the declarations of one table of a DTD
    fn dump_table(&mut self, dtd: NodeId, kind: Option<NodeKind>) -> DomResult<Option<String>> {
        let Some(data) = self.node(dtd)?.dtd_data() else { return Ok(None) };
        let decls: Vec<NodeId> = match kind {
            Some(NodeKind::ElementDecl) => data.elements.values().copied().collect(),
            Some(NodeKind::AttributeDecl) => data.attributes.values().copied().collect(),
            Some(_) => data.entities.values().chain(data.parameter_entities.values()).copied().collect(),
            None => Vec::new(),
        };
        let mut ser = Serializer::new(self, Charset::Utf8, false);
        match kind {
            Some(_) => {
                for decl in decls {
                    ser.node(decl, 0);
                }
            }
            None => ser.notations(dtd),
        }
        let out = ser.out;
        self.finish(out).map(Some)
    }

    pub fn dump_element_table(&mut self, dtd: NodeId) -> DomResult<Option<String>> {
        self.dump_table(dtd, Some(NodeKind::ElementDecl))
    }

    pub fn dump_attribute_table(&mut self, dtd: NodeId) -> DomResult<Option<String>> {
        self.dump_table(dtd, Some(NodeKind::AttributeDecl))
    }

    pub fn dump_entities_table(&mut self, dtd: NodeId) -> DomResult<Option<String>> {
        self.dump_table(dtd, Some(NodeKind::EntityDecl))
    }

    pub fn dump_notation_table(&mut self, dtd: NodeId) -> DomResult<Option<String>> {
        self.dump_table(dtd, None)
    }
}
