//! Node content
//!
//! Getting and setting character data, names, paths, and the `xml:*`
//! attributes (`lang`, `space`, `base`) that are inherited down the tree.

use crate::node::NodeKind;
use crate::{DomResult, DomTree, NodeId, TEXT_NAME, XML_NAMESPACE};

/// Value of `xml:space` that preserves whitespace
const SPACE_PRESERVE: &str = "preserve";
const SPACE_DEFAULT: &str = "default";

/// Characters treated as XML whitespace
#[inline]
pub(crate) fn is_blank_char(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

/// Value of a predefined entity
pub(crate) fn predefined_value(name: &str) -> Option<char> {
    Some(match name {
        "lt" => '<',
        "gt" => '>',
        "amp" => '&',
        "apos" => '\'',
        "quot" => '"',
        _ => return None,
    })
}

/// Decode a character reference body (`#123` or `#x7B`)
fn char_ref_value(body: &str) -> Option<char> {
    let digits = body.strip_prefix('#')?;
    let code = match digits.strip_prefix('x') {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<u32>().ok()?,
    };
    char::from_u32(code).filter(|c| *c != '\0')
}

impl DomTree {
    /// Split `value` into text and entity-reference nodes
    ///
    /// Character references and predefined entities are folded into the
    /// text. The nodes are unlinked; the caller owns them.
    pub fn string_get_node_list(&mut self, doc: Option<NodeId>, value: &str) -> DomResult<Vec<NodeId>> {
        let mut out = Vec::new();
        match self.parse_content(doc, value, &mut out) {
            Ok(()) => Ok(out),
            Err(e) => {
                for node in out {
                    self.free_node(node);
                }
                Err(e)
            }
        }
    }

    fn parse_content(&mut self, doc: Option<NodeId>, value: &str, out: &mut Vec<NodeId>) -> DomResult<()> {
        let mut text = String::new();
        let mut rest = value;
        while let Some(amp) = rest.find('&') {
            text.push_str(&rest[..amp]);
            let after = &rest[amp + 1..];
            let reference = after.find(';').map(|end| &after[..end]);
            match reference {
                Some(body) if body.starts_with('#') && char_ref_value(body).is_some() => {
                    text.extend(char_ref_value(body));
                }
                Some(name) if !name.is_empty() && !name.contains(is_blank_char) && !name.contains('&') => {
                    if let Some(c) = predefined_value(name) {
                        text.push(c);
                    } else {
                        if !text.is_empty() {
                            out.push(self.create(NodeKind::Text, Some(TEXT_NAME), Some(&text), doc)?);
                            text.clear();
                        }
                        out.push(self.create(NodeKind::EntityRef, Some(name), None, doc)?);
                    }
                }
                _ => {
                    text.push('&');
                    rest = after;
                    continue;
                }
            }
            rest = &after[reference.map_or(0, str::len) + 1..];
        }
        text.push_str(rest);
        if !text.is_empty() {
            out.push(self.create(NodeKind::Text, Some(TEXT_NAME), Some(&text), doc)?);
        }
        Ok(())
    }

    /// Text of an entity referenced by name, if it is declared
    fn entity_ref_text(&self, node: NodeId) -> Option<String> {
        let n = self.get(node)?;
        let name = n.name()?;
        if let Some(c) = predefined_value(name) {
            return Some(c.to_string());
        }
        let entity = self.lookup_doc_entity(n.doc, name)?;
        self.get(entity)?.content().map(str::to_owned)
    }

    /// Collect character data below `node` in document order
    fn collect_text(&self, node: NodeId, out: &mut String) {
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let Some(n) = self.get(id) else { continue };
            match n.kind {
                NodeKind::Text | NodeKind::CData => out.push_str(n.content().unwrap_or_default()),
                NodeKind::EntityRef => out.push_str(&self.entity_ref_text(id).unwrap_or_default()),
                NodeKind::Element | NodeKind::DocumentFragment | NodeKind::Document | NodeKind::HtmlDocument | NodeKind::Attribute => {
                    let mut cur = n.last_child;
                    while let Some(child) = cur {
                        stack.push(child);
                        cur = self.prev_sibling(child);
                    }
                }
                _ => {}
            }
        }
    }

    /// Text content of a node, `None` for kinds that have none
    pub fn get_content(&mut self, node: NodeId) -> DomResult<Option<String>> {
        let n = self.node(node)?;
        let content = match n.kind {
            NodeKind::Element | NodeKind::DocumentFragment | NodeKind::Document | NodeKind::HtmlDocument | NodeKind::Attribute => {
                let mut out = String::new();
                self.collect_text(node, &mut out);
                Some(out)
            }
            NodeKind::Text | NodeKind::CData | NodeKind::Comment | NodeKind::Pi | NodeKind::EntityDecl => {
                n.content.clone()
            }
            NodeKind::EntityRef => self.entity_ref_text(node),
            NodeKind::Dtd | NodeKind::ElementDecl | NodeKind::AttributeDecl => None,
        };
        if let Some(content) = &content {
            self.injector.charge_str(content)?;
        }
        Ok(content)
    }

    /// Replace the content of a node
    ///
    /// Containers get their children replaced by the parsed value; text-like
    /// nodes get their character data replaced. Other kinds are left alone.
    pub fn set_content(&mut self, node: NodeId, value: Option<&str>) -> DomResult<()> {
        let kind = self.node(node)?.kind;
        if kind.is_container() {
            let doc = self.doc(node);
            let list = match value {
                Some(v) => self.string_get_node_list(doc, v)?,
                None => Vec::new(),
            };
            for child in self.children(node) {
                self.free_node(child);
            }
            for child in list {
                self.link_last_child(node, child);
            }
        } else if kind.is_text_like() {
            let content = self.dup_opt(value)?;
            self.node_mut(node)?.content = content;
        }
        Ok(())
    }

    /// Append text to a node
    ///
    /// Elements and fragments extend their trailing text child or grow a
    /// new one; text-like nodes extend their own data.
    pub fn add_content(&mut self, node: NodeId, value: Option<&str>) -> DomResult<()> {
        let kind = self.node(node)?.kind;
        let Some(value) = value else { return Ok(()) };
        match kind {
            NodeKind::Element | NodeKind::DocumentFragment => {
                let last = self
                    .last_child(node)
                    .filter(|l| self.get(*l).is_some_and(|n| n.kind == NodeKind::Text && n.name() == Some(TEXT_NAME)));
                match last {
                    Some(last) => self.append_content(last, value),
                    None => {
                        let doc = self.doc(node);
                        let text = self.create(NodeKind::Text, Some(TEXT_NAME), Some(value), doc)?;
                        self.link_last_child(node, text);
                        Ok(())
                    }
                }
            }
            k if k.is_text_like() => self.append_content(node, value),
            _ => Ok(()),
        }
    }

    /// Truncate character data to nothing without charging the injector
    pub fn clear_content(&mut self, node: NodeId) {
        if let Some(n) = self.get_mut(node) {
            if let Some(content) = &mut n.content {
                content.clear();
            }
        }
    }

    /// Rename an element, attribute, PI or entity reference
    pub fn set_name(&mut self, node: NodeId, name: Option<&str>) -> DomResult<()> {
        let kind = self.node(node)?.kind;
        if !matches!(kind, NodeKind::Element | NodeKind::Attribute | NodeKind::Pi | NodeKind::EntityRef) {
            return Ok(());
        }
        let Some(name) = name else { return Ok(()) };
        let name = self.dup(name)?;
        self.node_mut(node)?.name = Some(name);
        Ok(())
    }

    /// Source line, or -1 when unknown
    pub fn get_line_no(&self, node: NodeId) -> i32 {
        match self.get(node) {
            Some(n) if n.line > 0 => n.line as i32,
            _ => -1,
        }
    }

    /// Qualified name of an element or attribute
    pub(crate) fn qualified_name(&self, node: NodeId) -> String {
        let name = self.get(node).and_then(|n| n.name()).unwrap_or_default();
        match self.node_ns(node).and_then(|ns| self.namespace(ns)?.prefix()) {
            Some(prefix) => format!("{}:{}", prefix, name),
            None => name.to_owned(),
        }
    }

    /// 1-based position among siblings that `same` accepts, or 0 when the
    /// node is the only one
    fn sibling_position(&self, node: NodeId, same: impl Fn(NodeId) -> bool) -> usize {
        let mut before = 0;
        let mut cur = self.prev_sibling(node);
        while let Some(s) = cur {
            if same(s) {
                before += 1;
            }
            cur = self.prev_sibling(s);
        }
        if before > 0 {
            return before + 1;
        }
        let mut cur = self.next_sibling(node);
        while let Some(s) = cur {
            if same(s) {
                return 1;
            }
            cur = self.next_sibling(s);
        }
        0
    }

    fn path_segment(&self, node: NodeId) -> Option<String> {
        let n = self.get(node)?;
        let kind = n.kind;
        let (base, position) = match kind {
            NodeKind::Element => {
                let qname = self.qualified_name(node);
                let pos = self.sibling_position(node, |s| {
                    self.kind(s) == Some(NodeKind::Element) && self.qualified_name(s) == qname
                });
                (qname, pos)
            }
            NodeKind::Attribute => return Some(format!("@{}", self.qualified_name(node))),
            NodeKind::Text | NodeKind::CData => {
                let pos = self.sibling_position(node, |s| {
                    matches!(self.kind(s), Some(NodeKind::Text | NodeKind::CData))
                });
                ("text()".to_owned(), pos)
            }
            NodeKind::Comment => {
                let pos = self.sibling_position(node, |s| self.kind(s) == Some(NodeKind::Comment));
                ("comment()".to_owned(), pos)
            }
            NodeKind::Pi => {
                let target = n.name().unwrap_or_default().to_owned();
                let pos = self.sibling_position(node, |s| {
                    self.get(s).is_some_and(|x| x.kind == NodeKind::Pi && x.name() == Some(target.as_str()))
                });
                (format!("processing-instruction('{}')", target), pos)
            }
            _ => return None,
        };
        Some(match position {
            0 => base,
            p => format!("{}[{}]", base, p),
        })
    }

    /// XPath-like location of a node
    pub fn get_node_path(&mut self, node: NodeId) -> DomResult<Option<String>> {
        let mut segments = Vec::new();
        let mut cur = Some(node);
        while let Some(id) = cur {
            if self.node(id)?.kind.is_document() {
                break;
            }
            match self.path_segment(id) {
                Some(segment) => segments.push(segment),
                None => return Ok(None),
            }
            cur = self.parent(id);
        }
        segments.reverse();
        let path = format!("/{}", segments.join("/"));
        self.injector.charge_str(&path)?;
        Ok(Some(path))
    }

    /// Nearest `xml:<name>` value on the node or its ancestors
    fn inherited_xml_attr(&self, node: NodeId, name: &str) -> Option<(NodeId, String)> {
        let mut cur = Some(node);
        while let Some(id) = cur {
            if let Some(attr) = self.find_prop(id, name, Some(XML_NAMESPACE)) {
                return Some((id, self.attr_value(attr)));
            }
            cur = self.parent(id);
        }
        None
    }

    pub fn get_lang(&mut self, node: NodeId) -> DomResult<Option<String>> {
        self.node(node)?;
        match self.inherited_xml_attr(node, "lang") {
            Some((_, lang)) => {
                self.injector.charge_str(&lang)?;
                Ok(Some(lang))
            }
            None => Ok(None),
        }
    }

    /// Set an `xml:<name>` attribute on an element; other kinds are left
    /// alone
    fn set_xml_attr(&mut self, node: NodeId, name: &str, value: Option<&str>) -> DomResult<()> {
        if self.node(node)?.kind != NodeKind::Element {
            return Ok(());
        }
        let ns = self.search_ns(node, Some("xml"))?;
        self.set_ns_prop(Some(node), ns, Some(name), value)?;
        Ok(())
    }

    pub fn set_lang(&mut self, node: NodeId, lang: Option<&str>) -> DomResult<()> {
        self.set_xml_attr(node, "lang", lang)
    }

    /// 1 for `preserve`, 0 for `default`, -1 when unspecified
    pub fn get_space_preserve(&mut self, node: NodeId) -> DomResult<i32> {
        self.node(node)?;
        let mut cur = Some(node);
        while let Some(id) = cur {
            if let Some(attr) = self.find_prop(id, "space", Some(XML_NAMESPACE)) {
                let value = self.attr_value(attr);
                self.injector.charge_str(&value)?;
                match value.as_str() {
                    SPACE_PRESERVE => return Ok(1),
                    SPACE_DEFAULT => return Ok(0),
                    _ => {}
                }
            }
            cur = self.parent(id);
        }
        Ok(-1)
    }

    /// 0 sets `default`, 1 sets `preserve`; other values are ignored
    pub fn set_space_preserve(&mut self, node: NodeId, value: i32) -> DomResult<()> {
        match value {
            0 => self.set_xml_attr(node, "space", Some(SPACE_DEFAULT)),
            1 => self.set_xml_attr(node, "space", Some(SPACE_PRESERVE)),
            _ => Ok(()),
        }
    }

    /// Base URI in effect at `node`
    ///
    /// Relative `xml:base` values are resolved against the base of the
    /// enclosing element, falling back to the document URL.
    pub fn get_base(&mut self, doc: Option<NodeId>, node: NodeId) -> DomResult<Option<String>> {
        self.node(node)?;
        let doc = doc.or_else(|| self.doc(node));
        let mut parts = Vec::new();
        let mut cur = Some(node);
        while let Some(id) = cur {
            if let Some((owner, value)) = self.inherited_xml_attr(id, "base") {
                let absolute = value.contains("://") || value.starts_with('/');
                parts.push(value);
                if absolute {
                    break;
                }
                cur = self.parent(owner);
            } else {
                break;
            }
        }
        if parts.last().is_none_or(|p| !p.contains("://") && !p.starts_with('/')) {
            if let Some(url) = doc.and_then(|d| self.get(d)?.doc_data()?.url.clone()) {
                parts.push(url);
            }
        }
        let mut base: Option<String> = None;
        for part in parts.into_iter().rev() {
            base = Some(match base {
                Some(outer) if !part.contains("://") && !part.starts_with('/') => {
                    let dir = outer.rfind('/').map_or("", |i| &outer[..=i]);
                    format!("{}{}", dir, part)
                }
                _ => part,
            });
        }
        if let Some(base) = &base {
            self.injector.charge_str(base)?;
        }
        Ok(base)
    }

    /// Set `xml:base` on an element or the URL of a document
    pub fn set_base(&mut self, node: NodeId, base: Option<&str>) -> DomResult<()> {
        match self.node(node)?.kind {
            NodeKind::Document | NodeKind::HtmlDocument => {
                let url = self.dup_opt(base)?;
                if let Some(data) = self.node_mut(node)?.doc_data_mut() {
                    data.url = url;
                }
                Ok(())
            }
            _ => self.set_xml_attr(node, "base", base),
        }
    }

    /// Text or CDATA made only of whitespace
    pub fn is_blank_node(&self, node: NodeId) -> bool {
        match self.get(node) {
            Some(n) if matches!(n.kind, NodeKind::Text | NodeKind::CData) => {
                n.content().is_none_or(|c| c.chars().all(is_blank_char))
            }
            _ => false,
        }
    }

    /// Concatenate the string value of `head` and its following siblings
    ///
    /// With `in_line`, entity references are replaced by their text;
    /// otherwise they are written as `&name;`. The escaped flavour encodes
    /// markup characters in text.
    pub fn node_list_get_string(&mut self, head: Option<NodeId>, in_line: bool, raw: bool) -> DomResult<String> {
        let mut out = String::new();
        let mut cur = head;
        while let Some(id) = cur {
            let Some(n) = self.get(id) else { break };
            match n.kind {
                NodeKind::Text | NodeKind::CData => {
                    let text = n.content().unwrap_or_default();
                    if raw || in_line {
                        out.push_str(text);
                    } else {
                        out.push_str(&quick_xml::escape::escape(text));
                    }
                }
                NodeKind::EntityRef => {
                    if in_line {
                        out.push_str(&self.entity_ref_text(id).unwrap_or_default());
                    } else {
                        out.push('&');
                        out.push_str(n.name().unwrap_or_default());
                        out.push(';');
                    }
                }
                _ => {}
            }
            cur = n.next_sibling;
        }
        self.injector.charge_str(&out)?;
        Ok(out)
    }
}
