//! XML reader
//!
//! Builds a document from text with `quick-xml`. Malformed input yields no
//! document; an allocation failure while building is reported as such. A
//! DOCTYPE's internal subset is read for entity, element, attribute and
//! notation declarations.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::attributes::split_qname;
use crate::content::is_blank_char;
use crate::dtd::AttributeDeclSpec;
use crate::entities::EntityDecl;
use crate::node::{AttributeDefault, AttributeType, ElementContent, EntityType, NodeKind};
use crate::{DomResult, DomTree, NodeId, TEXT_NAME};

/// Drop whitespace-only text
pub const PARSE_NOBLANKS: i32 = 1 << 8;
/// Turn CDATA sections into text
pub const PARSE_NOCDATA: i32 = 1 << 14;

/// Token of a markup declaration
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Quoted(String),
}

impl Token {
    fn text(&self) -> &str {
        match self {
            Self::Word(s) | Self::Quoted(s) => s,
        }
    }
}

/// Split a declaration into words, quoted literals and parenthesized groups
fn tokenize(decl: &str) -> Vec<Token> {
    let mut out = Vec::new();
    let mut chars = decl.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '"' || c == '\'' {
            chars.next();
            let literal: String = chars.by_ref().take_while(|x| *x != c).collect();
            out.push(Token::Quoted(literal));
        } else if c == '(' {
            let mut group = String::new();
            for x in chars.by_ref() {
                group.push(x);
                if x == ')' {
                    break;
                }
            }
            while let Some(&x) = chars.peek() {
                if matches!(x, '*' | '+' | '?') {
                    group.push(x);
                    chars.next();
                } else {
                    break;
                }
            }
            out.push(Token::Word(group));
        } else {
            let mut word = String::new();
            while let Some(&x) = chars.peek() {
                if x.is_whitespace() || x == '"' || x == '\'' || x == '(' {
                    break;
                }
                word.push(x);
                chars.next();
            }
            out.push(Token::Word(word));
        }
    }
    out
}

/// External identifier after `SYSTEM` or `PUBLIC`: (public, system)
fn external_id(tokens: &[Token]) -> (Option<&str>, Option<&str>) {
    match tokens {
        [Token::Word(k), Token::Quoted(system), ..] if k == "SYSTEM" => (None, Some(system)),
        [Token::Word(k), Token::Quoted(public), Token::Quoted(system), ..] if k == "PUBLIC" => {
            (Some(public), Some(system))
        }
        [Token::Word(k), Token::Quoted(public), ..] if k == "PUBLIC" => (Some(public), None),
        _ => (None, None),
    }
}

fn element_content(model: &str) -> ElementContent {
    match model {
        "EMPTY" => ElementContent::Empty,
        "ANY" => ElementContent::Any,
        m if m.trim_start_matches('(').trim_start().starts_with("#PCDATA") => ElementContent::Mixed,
        _ => ElementContent::Element,
    }
}

fn attribute_type(word: &str) -> AttributeType {
    match word {
        "ID" => AttributeType::Id,
        "IDREF" => AttributeType::IdRef,
        "IDREFS" => AttributeType::IdRefs,
        "ENTITY" => AttributeType::Entity,
        "ENTITIES" => AttributeType::Entities,
        "NMTOKEN" => AttributeType::Nmtoken,
        "NMTOKENS" => AttributeType::Nmtokens,
        "NOTATION" => AttributeType::Notation,
        w if w.starts_with('(') => AttributeType::Enumeration,
        _ => AttributeType::Cdata,
    }
}

struct Builder<'t, 'i> {
    tree: &'t mut DomTree,
    input: &'i str,
    doc: NodeId,
    options: i32,
    stack: Vec<NodeId>,
    text: String,
    line: u32,
    scanned: usize,
}

impl<'t, 'i> Builder<'t, 'i> {
    fn advance_line(&mut self, pos: usize) {
        let end = pos.min(self.input.len());
        if end > self.scanned {
            let newlines = self.input.as_bytes()[self.scanned..end].iter().filter(|b| **b == b'\n').count();
            self.line = self.line.saturating_add(u32::try_from(newlines).unwrap_or(u32::MAX));
            self.scanned = end;
        }
    }

    fn parent(&self) -> NodeId {
        self.stack.last().copied().unwrap_or(self.doc)
    }

    fn append(&mut self, node: NodeId) {
        let parent = self.parent();
        if let Some(n) = self.tree.get_mut(node) {
            n.line = self.line;
        }
        self.tree.link_last_child(parent, node);
    }

    /// Turn buffered character data into nodes; `false` for text outside
    /// the root element
    fn flush_text(&mut self) -> DomResult<bool> {
        if self.text.is_empty() {
            return Ok(true);
        }
        let text = std::mem::take(&mut self.text);
        let blank = text.chars().all(is_blank_char);
        if self.stack.is_empty() {
            return Ok(blank);
        }
        if blank && self.options & PARSE_NOBLANKS != 0 {
            return Ok(true);
        }
        for node in self.tree.string_get_node_list(Some(self.doc), &text)? {
            self.append(node);
        }
        Ok(true)
    }

    fn start(&mut self, e: &BytesStart<'_>, empty: bool) -> DomResult<bool> {
        if self.stack.is_empty() && self.tree.doc_get_root_element(Some(self.doc)).is_some() {
            return Ok(false);
        }
        let qname = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let mut attrs = Vec::new();
        for attr in e.attributes().with_checks(false) {
            let Ok(attr) = attr else { return Ok(false) };
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = String::from_utf8_lossy(&attr.value).into_owned();
            attrs.push((key, value));
        }

        let elem = self.tree.create(NodeKind::Element, Some(&qname), None, Some(self.doc))?;
        self.append(elem);
        for (key, value) in &attrs {
            if key == "xmlns" {
                self.tree.new_ns(Some(elem), Some(value), None)?;
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                self.tree.new_ns(Some(elem), Some(value), Some(prefix))?;
            }
        }
        let (ns, local) = match split_qname(&qname) {
            Some((prefix, local)) => match self.tree.search_ns(elem, Some(prefix))? {
                Some(ns) => (Some(ns), Some(local)),
                None => (None, None),
            },
            None => (self.tree.lookup_prefix(elem, None), None),
        };
        let node = self.tree.node_mut(elem)?;
        node.ns = ns;
        if let Some(local) = local {
            node.name = Some(local.to_owned());
        }

        for (key, value) in attrs {
            if key == "xmlns" || key.starts_with("xmlns:") {
                continue;
            }
            let Some(attr) = self.tree.new_doc_prop(Some(self.doc), Some(&key), Some(&value))? else { continue };
            self.tree.link_last_prop(elem, attr);
            if let Some((prefix, local)) = split_qname(&key) {
                if let Some(ns) = self.tree.search_ns(elem, Some(prefix))? {
                    let node = self.tree.node_mut(attr)?;
                    node.ns = Some(ns);
                    node.name = Some(local.to_owned());
                }
            }
        }
        if !empty {
            self.stack.push(elem);
        }
        Ok(true)
    }

    fn leaf(&mut self, kind: NodeKind, name: Option<&str>, content: &str) -> DomResult<bool> {
        if self.stack.is_empty() && !matches!(kind, NodeKind::Comment | NodeKind::Pi) {
            return Ok(false);
        }
        let node = self.tree.create(kind, name, Some(content), Some(self.doc))?;
        self.append(node);
        Ok(true)
    }

    fn doctype(&mut self, body: &str) -> DomResult<bool> {
        if self.tree.get_int_subset(Some(self.doc)).is_some() || !self.stack.is_empty() {
            return Ok(false);
        }
        let (head, subset) = match (body.find('['), body.rfind(']')) {
            (Some(open), Some(close)) if open < close => (&body[..open], Some(&body[open + 1..close])),
            _ => (body, None),
        };
        let tokens = tokenize(head);
        let Some(Token::Word(name)) = tokens.first() else { return Ok(false) };
        let (public, system) = external_id(&tokens[1..]);
        let Some(dtd) = self.tree.create_int_subset(Some(self.doc), Some(name), public, system)? else {
            return Ok(false);
        };
        if let Some(subset) = subset {
            for decl in subset.split("<!").skip(1) {
                let decl = decl.split('>').next().unwrap_or_default();
                self.declaration(dtd, decl)?;
            }
        }
        Ok(true)
    }

    /// Apply one markup declaration of the internal subset
    fn declaration(&mut self, dtd: NodeId, decl: &str) -> DomResult<()> {
        let tokens = tokenize(decl);
        let Some(Token::Word(keyword)) = tokens.first() else { return Ok(()) };
        match keyword.as_str() {
            "ENTITY" => {
                let parameter = matches!(tokens.get(1), Some(Token::Word(w)) if w == "%");
                let rest = if parameter { &tokens[2..] } else { &tokens[1..] };
                let Some(Token::Word(name)) = rest.first() else { return Ok(()) };
                let (public, system) = external_id(&rest[1..]);
                let content = match rest.get(1) {
                    Some(Token::Quoted(value)) => Some(value.as_str()),
                    _ => None,
                };
                let etype = match (parameter, content.is_some()) {
                    (false, true) => EntityType::InternalGeneral,
                    (false, false) => EntityType::ExternalGeneralParsed,
                    (true, true) => EntityType::InternalParameter,
                    (true, false) => EntityType::ExternalParameter,
                };
                let decl = EntityDecl {
                    name: Some(name),
                    etype: etype as i32,
                    external_id: public,
                    system_id: system,
                    content,
                };
                self.tree.add_doc_entity(Some(self.doc), decl)?;
            }
            "ELEMENT" => {
                if let [_, Token::Word(name), model, ..] = tokens.as_slice() {
                    self.tree.add_element_decl(Some(dtd), Some(name), element_content(model.text()) as i32)?;
                }
            }
            "ATTLIST" => {
                let Some(Token::Word(element)) = tokens.get(1) else { return Ok(()) };
                let mut rest = &tokens[2..];
                while let [Token::Word(name), Token::Word(atype), tail @ ..] = rest {
                    let atype = attribute_type(atype);
                    let mut tail = tail;
                    if atype == AttributeType::Notation {
                        if let [Token::Word(group), more @ ..] = tail {
                            if group.starts_with('(') {
                                tail = more;
                            }
                        }
                    }
                    let (default, value, consumed) = match tail {
                        [Token::Word(d), Token::Quoted(v), ..] if d == "#FIXED" => (AttributeDefault::Fixed, Some(v.as_str()), 2),
                        [Token::Word(d), ..] if d == "#REQUIRED" => (AttributeDefault::Required, None, 1),
                        [Token::Word(d), ..] if d == "#IMPLIED" => (AttributeDefault::Implied, None, 1),
                        [Token::Quoted(v), ..] => (AttributeDefault::None, Some(v.as_str()), 1),
                        _ => break,
                    };
                    let (prefix, local) = match split_qname(name) {
                        Some((p, l)) => (Some(p), l),
                        None => (None, name.as_str()),
                    };
                    let spec = AttributeDeclSpec {
                        element: Some(element),
                        name: Some(local),
                        prefix,
                        atype: atype as i32,
                        default: default as i32,
                        default_value: value,
                    };
                    self.tree.add_attribute_decl(Some(dtd), spec)?;
                    rest = &tail[consumed..];
                }
            }
            "NOTATION" => {
                if let Some(Token::Word(name)) = tokens.get(1) {
                    let (public, system) = external_id(&tokens[2..]);
                    self.tree.add_notation_decl(Some(dtd), Some(name), public, system)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Consume every event; `false` when the input is not well formed
    fn run(&mut self) -> DomResult<bool> {
        let mut reader = Reader::from_str(self.input);
        reader.config_mut().trim_text(false);
        loop {
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(e) => {
                    tracing::trace!("malformed input: {}", e);
                    return Ok(false);
                }
            };
            let pos = usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX);
            let well_formed = match event {
                Event::Text(e) => {
                    self.text.push_str(&String::from_utf8_lossy(&e));
                    true
                }
                Event::GeneralRef(e) => {
                    self.text.push('&');
                    self.text.push_str(&String::from_utf8_lossy(&e));
                    self.text.push(';');
                    true
                }
                other => {
                    if !self.flush_text()? {
                        return Ok(false);
                    }
                    self.advance_line(pos);
                    match other {
                        Event::Start(e) => self.start(&e, false)?,
                        Event::Empty(e) => self.start(&e, true)?,
                        Event::End(_) => self.stack.pop().is_some(),
                        Event::CData(e) => {
                            let content = String::from_utf8_lossy(&e).into_owned();
                            if self.options & PARSE_NOCDATA != 0 {
                                self.leaf(NodeKind::Text, Some(TEXT_NAME), &content)?
                            } else {
                                self.leaf(NodeKind::CData, Some("cdata"), &content)?
                            }
                        }
                        Event::Comment(e) => {
                            let content = String::from_utf8_lossy(&e).into_owned();
                            self.leaf(NodeKind::Comment, Some(crate::COMMENT_NAME), &content)?
                        }
                        Event::PI(e) => {
                            let target = String::from_utf8_lossy(e.target()).into_owned();
                            let content = String::from_utf8_lossy(e.content()).trim_start().to_owned();
                            self.leaf(NodeKind::Pi, Some(&target), &content)?
                        }
                        Event::Decl(e) => {
                            let version = e.version().ok().map(|v| String::from_utf8_lossy(&v).into_owned());
                            let encoding = e
                                .encoding()
                                .and_then(|r| r.ok())
                                .map(|v| String::from_utf8_lossy(&v).into_owned());
                            let version = self.tree.dup_opt(version.as_deref())?;
                            let encoding = self.tree.dup_opt(encoding.as_deref())?;
                            if let Some(data) = self.tree.node_mut(self.doc)?.doc_data_mut() {
                                if version.is_some() {
                                    data.version = version;
                                }
                                data.encoding = encoding;
                            }
                            true
                        }
                        Event::DocType(e) => {
                            let body = String::from_utf8_lossy(&e).into_owned();
                            self.doctype(&body)?
                        }
                        Event::Eof => {
                            return Ok(self.stack.is_empty() && self.tree.doc_get_root_element(Some(self.doc)).is_some());
                        }
                        _ => true,
                    }
                }
            };
            if !well_formed {
                return Ok(false);
            }
        }
    }
}

/// Whether the reader accepts documents declared in `encoding`
fn is_known_encoding(encoding: &str) -> bool {
    matches!(
        encoding.to_ascii_uppercase().as_str(),
        "UTF-8" | "UTF8" | "US-ASCII" | "ASCII" | "ISO-8859-1" | "LATIN1"
    )
}

impl DomTree {
    fn build_doc(&mut self, doc: NodeId, input: &str, url: Option<&str>, options: i32) -> DomResult<bool> {
        let url = self.dup_opt(url)?;
        if let Some(data) = self.node_mut(doc)?.doc_data_mut() {
            data.url = url;
        }
        let mut builder = Builder {
            tree: self,
            input,
            doc,
            options,
            stack: Vec::new(),
            text: String::new(),
            line: 1,
            scanned: 0,
        };
        builder.run()
    }

    /// Parse a document from text
    ///
    /// `url` becomes the document URL. An unknown `encoding` or malformed
    /// input yields `None`.
    pub fn read_doc(
        &mut self,
        input: &str,
        url: Option<&str>,
        encoding: Option<&str>,
        options: i32,
    ) -> DomResult<Option<NodeId>> {
        if encoding.is_some_and(|e| !is_known_encoding(e)) {
            return Ok(None);
        }
        let doc = self.new_doc(None)?;
        let outcome = self.build_doc(doc, input, url, options);
        match outcome {
            Ok(true) => {
                tracing::debug!("parsed document {} ({} bytes)", doc, input.len());
                Ok(Some(doc))
            }
            Ok(false) => {
                self.free_doc(doc);
                Ok(None)
            }
            Err(e) => {
                self.free_doc(doc);
                Err(e)
            }
        }
    }
}
