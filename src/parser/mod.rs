//! A namespace-aware, non-validating XML 1.0 parser building an [`XmlDoc`].
//!
//! The document type declaration is skipped (internal subset included), so only the five
//! predefined entities and character references can be expanded.

mod encoding;
mod error;

use std::path::Path;

use crate::tree::{XML_XML_NAMESPACE, XmlDoc, XmlNodeId, XmlNsId};

pub use encoding::*;
pub use error::*;

/// Character classes of the Name production of XML 1.0 Fifth Edition.
pub trait XmlParserCharValid {
    fn is_name_char(&self) -> bool;
    fn is_name_start_char(&self) -> bool;
    fn is_blank_char(&self) -> bool;
    /// The Char production: characters allowed to appear in a document at all.
    fn is_xml_char(&self) -> bool;
}

impl XmlParserCharValid for char {
    fn is_name_char(&self) -> bool {
        let c = *self as u32;
        self.is_name_start_char()
            || self.is_ascii_digit()
            || *self == '-'
            || *self == '.'
            || c == 0xB7
            || (0x300..=0x36F).contains(&c)
            || (0x203F..=0x2040).contains(&c)
    }

    fn is_name_start_char(&self) -> bool {
        let c = *self as u32;
        self.is_ascii_alphabetic()
            || *self == '_'
            || *self == ':'
            || (0xC0..=0xD6).contains(&c)
            || (0xD8..=0xF6).contains(&c)
            || (0xF8..=0x2FF).contains(&c)
            || (0x370..=0x37D).contains(&c)
            || (0x37F..=0x1FFF).contains(&c)
            || (0x200C..=0x200D).contains(&c)
            || (0x2070..=0x218F).contains(&c)
            || (0x2C00..=0x2FEF).contains(&c)
            || (0x3001..=0xD7FF).contains(&c)
            || (0xF900..=0xFDCF).contains(&c)
            || (0xFDF0..=0xFFFD).contains(&c)
            || (0x10000..=0xEFFFF).contains(&c)
    }

    fn is_blank_char(&self) -> bool {
        matches!(*self, ' ' | '\t' | '\n' | '\r')
    }

    fn is_xml_char(&self) -> bool {
        let c = *self as u32;
        matches!(c, 0x9 | 0xA | 0xD)
            || (0x20..=0xD7FF).contains(&c)
            || (0xE000..=0xFFFD).contains(&c)
            || (0x10000..=0x10FFFF).contains(&c)
    }
}

/// Parse an XML document held in memory.
///
/// `url` is only used in error reports and recorded on the document. `encoding` overrides
/// whatever the document says about its own encoding.
#[doc(alias = "xmlReadMemory")]
pub fn xml_read_memory(
    buffer: &[u8],
    url: Option<&str>,
    encoding: Option<&str>,
) -> Result<XmlDoc, XmlParserError> {
    let (text, enc) = encoding::decode_input(buffer, encoding).map_err(|mut err| {
        err.file = url.map(|url| url.to_owned());
        err
    })?;
    let mut ctxt = XmlParserCtxt::new(&text, url);
    ctxt.doc.encoding = Some(enc.to_owned());
    ctxt.parse_document()
}

/// Parse an XML file from the filesystem.
#[doc(alias = "xmlReadFile")]
pub fn xml_read_file(
    filename: impl AsRef<Path>,
    encoding: Option<&str>,
) -> Result<XmlDoc, XmlParserError> {
    let filename = filename.as_ref();
    let url = filename.to_string_lossy();
    let buffer = std::fs::read(filename).map_err(|err| XmlParserError {
        code: XmlParserErrors::XmlIOLoadError,
        message: format!("failed to load \"{url}\": {err}"),
        file: Some(url.to_string()),
        line: 0,
        column: 0,
    })?;
    xml_read_memory(&buffer, Some(&url), encoding)
}

/// Parse an XML document from a string.
///
/// The text is already decoded, so an `encoding` in the XML declaration is only recorded.
pub fn xml_read_str(text: &str) -> Result<XmlDoc, XmlParserError> {
    XmlParserCtxt::new(text.strip_prefix('\u{FEFF}').unwrap_or(text), None).parse_document()
}

/// An open element: its qualified name, its node and where its start tag begins.
struct XmlNameEntry {
    name: String,
    node: XmlNodeId,
    start: usize,
}

/// A raw attribute as written in a start tag, before namespace processing.
struct XmlRawAttr {
    name: String,
    value: String,
    start: usize,
}

pub struct XmlParserCtxt {
    input: String,
    cur: usize,
    file: Option<String>,
    doc: XmlDoc,
    name_tab: Vec<XmlNameEntry>,
}

impl XmlParserCtxt {
    pub fn new(input: &str, url: Option<&str>) -> Self {
        let mut doc = XmlDoc::new();
        doc.url = url.map(|url| url.to_owned());
        Self {
            // End-of-line handling (XML 1.0 section 2.11).
            input: input.replace("\r\n", "\n").replace('\r', "\n"),
            cur: 0,
            file: url.map(|url| url.to_owned()),
            doc,
            name_tab: vec![],
        }
    }

    fn err(&self, code: XmlParserErrors, message: impl Into<String>) -> XmlParserError {
        self.err_at(self.cur, code, message)
    }

    fn err_at(&self, pos: usize, code: XmlParserErrors, message: impl Into<String>) -> XmlParserError {
        let (line, column) = self.position(pos);
        XmlParserError {
            code,
            message: message.into(),
            file: self.file.clone(),
            line,
            column,
        }
    }

    /// 1-based line and column of the byte offset `pos`.
    fn position(&self, pos: usize) -> (usize, usize) {
        let before = &self.input[..pos.min(self.input.len())];
        let line = before.matches('\n').count() + 1;
        let column = before
            .rsplit('\n')
            .next()
            .map_or(0, |last| last.chars().count())
            + 1;
        (line, column)
    }

    fn rest(&self) -> &str {
        &self.input[self.cur..]
    }

    fn current_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn looking_at(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    fn advance(&mut self, len: usize) {
        self.cur = (self.cur + len).min(self.input.len());
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.current_char()?;
        self.advance(c.len_utf8());
        Some(c)
    }

    /// Skip blank characters, returning whether any were skipped.
    fn skip_blanks(&mut self) -> bool {
        let len = self.rest().len() - self.rest().trim_start_matches(|c: char| c.is_blank_char()).len();
        self.advance(len);
        len > 0
    }

    /// Consume everything up to and including `delim`, returning the text before it.
    fn take_until(&mut self, delim: &str) -> Option<String> {
        let end = self.rest().find(delim)?;
        let text = self.rest()[..end].to_owned();
        self.advance(end + delim.len());
        Some(text)
    }

    fn check_chars(&self, text: &str, start: usize) -> Result<(), XmlParserError> {
        if let Some((i, c)) = text.char_indices().find(|(_, c)| !c.is_xml_char()) {
            return Err(self.err_at(
                start + i,
                XmlParserErrors::XmlErrInvalidChar,
                format!("Char 0x{:X} out of allowed range", c as u32),
            ));
        }
        Ok(())
    }

    #[doc(alias = "xmlParseName")]
    fn parse_name(&mut self) -> Option<String> {
        let first = self.current_char().filter(|c| c.is_name_start_char())?;
        let len = first.len_utf8()
            + self.rest()[first.len_utf8()..]
                .find(|c: char| !c.is_name_char())
                .unwrap_or(self.rest().len() - first.len_utf8());
        let name = self.rest()[..len].to_owned();
        self.advance(len);
        Some(name)
    }

    /// Parse a whole document.
    #[doc(alias = "xmlParseDocument")]
    pub fn parse_document(mut self) -> Result<XmlDoc, XmlParserError> {
        if self.looking_at("<?xml")
            && self.rest()[5..].starts_with(|c: char| c.is_blank_char())
        {
            self.parse_xml_decl()?;
        }
        self.parse_misc()?;
        if self.looking_at("<!DOCTYPE") {
            self.parse_doctype()?;
            self.parse_misc()?;
        }
        if self.rest().is_empty() {
            return Err(self.err(XmlParserErrors::XmlErrDocumentEmpty, "Document is empty"));
        }
        if !self.looking_at("<") {
            return Err(self.err(
                XmlParserErrors::XmlErrDocumentEmpty,
                "Start tag expected, '<' not found",
            ));
        }
        self.parse_element()?;
        self.parse_misc()?;
        if !self.rest().is_empty() {
            return Err(self.err(
                XmlParserErrors::XmlErrDocumentEnd,
                "Extra content at the end of the document",
            ));
        }
        Ok(self.doc)
    }

    #[doc(alias = "xmlParseXMLDecl")]
    fn parse_xml_decl(&mut self) -> Result<(), XmlParserError> {
        self.advance(5);
        let Some(decl) = self.take_until("?>") else {
            return Err(self.err(
                XmlParserErrors::XmlErrXMLDeclNotFinished,
                "parsing XML declaration: '?>' expected",
            ));
        };
        let pseudo_attr = |name: &str| -> Option<String> {
            let (_, rest) = decl.split_once(name)?;
            let rest = rest.trim_start().strip_prefix('=')?.trim_start();
            let quote = rest.chars().next().filter(|&c| c == '"' || c == '\'')?;
            let rest = &rest[1..];
            rest.find(quote).map(|end| rest[..end].to_owned())
        };
        if let Some(version) = pseudo_attr("version") {
            self.doc.version = Some(version);
        }
        if self.doc.encoding.is_none() {
            self.doc.encoding = pseudo_attr("encoding");
        }
        Ok(())
    }

    /// Skip the comments, PIs and blanks allowed around the root element.
    #[doc(alias = "xmlParseMisc")]
    fn parse_misc(&mut self) -> Result<(), XmlParserError> {
        let parent = self.doc.root();
        loop {
            self.skip_blanks();
            if self.looking_at("<!--") {
                self.parse_comment(parent)?;
            } else if self.looking_at("<?") {
                self.parse_pi(parent)?;
            } else {
                return Ok(());
            }
        }
    }

    #[doc(alias = "xmlParseDocTypeDecl")]
    fn parse_doctype(&mut self) -> Result<(), XmlParserError> {
        let start = self.cur;
        self.advance("<!DOCTYPE".len());
        let mut quote = None;
        let mut depth = 0usize;
        while let Some(c) = self.next_char() {
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '"' | '\'') => quote = Some(c),
                (None, '[') => depth += 1,
                (None, ']') => depth = depth.saturating_sub(1),
                (None, '>') if depth == 0 => return Ok(()),
                _ => {}
            }
        }
        Err(self.err_at(
            start,
            XmlParserErrors::XmlErrDoctypeNotFinished,
            "DOCTYPE improperly terminated",
        ))
    }

    #[doc(alias = "xmlParseComment")]
    fn parse_comment(&mut self, parent: XmlNodeId) -> Result<(), XmlParserError> {
        let start = self.cur;
        self.advance(4);
        let Some(content) = self.take_until("-->") else {
            return Err(self.err_at(
                start,
                XmlParserErrors::XmlErrCommentNotFinished,
                "Comment not terminated",
            ));
        };
        self.check_chars(&content, start + 4)?;
        let comment = self.doc.new_comment(&content);
        self.doc.add_child(parent, comment);
        Ok(())
    }

    #[doc(alias = "xmlParsePI")]
    fn parse_pi(&mut self, parent: XmlNodeId) -> Result<(), XmlParserError> {
        let start = self.cur;
        self.advance(2);
        let Some(target) = self.parse_name() else {
            return Err(self.err(
                XmlParserErrors::XmlErrPINotFinished,
                "xmlParsePI : no target name",
            ));
        };
        if target.eq_ignore_ascii_case("xml") {
            return Err(self.err_at(
                start,
                XmlParserErrors::XmlErrReservedXmlName,
                "XML declaration allowed only at the start of the document",
            ));
        }
        let content = if self.looking_at("?>") {
            self.advance(2);
            None
        } else if self.skip_blanks() {
            let content_start = self.cur;
            let Some(content) = self.take_until("?>") else {
                return Err(self.err_at(
                    start,
                    XmlParserErrors::XmlErrPINotFinished,
                    format!("PI {target} never end ..."),
                ));
            };
            self.check_chars(&content, content_start)?;
            Some(content)
        } else {
            return Err(self.err(
                XmlParserErrors::XmlErrSpaceRequired,
                format!("ParsePI: PI {target} space expected"),
            ));
        };
        let pi = self.doc.new_pi(&target, content.as_deref());
        self.doc.add_child(parent, pi);
        Ok(())
    }

    #[doc(alias = "xmlParseCDSect")]
    fn parse_cdata(&mut self, parent: XmlNodeId) -> Result<(), XmlParserError> {
        let start = self.cur;
        self.advance("<![CDATA[".len());
        let Some(content) = self.take_until("]]>") else {
            return Err(self.err_at(
                start,
                XmlParserErrors::XmlErrCDATANotFinished,
                "CData section not finished",
            ));
        };
        self.check_chars(&content, start + "<![CDATA[".len())?;
        let cdata = self.doc.new_cdata(&content);
        self.doc.add_child(parent, cdata);
        Ok(())
    }

    /// Parse a character or entity reference, the cursor being on the `&`.
    #[doc(alias = "xmlParseReference")]
    fn parse_reference(&mut self) -> Result<char, XmlParserError> {
        let start = self.cur;
        self.advance(1);
        let Some(end) = self.rest().find(';') else {
            return Err(self.err(
                XmlParserErrors::XmlErrEntityRefSemicolMissing,
                "EntityRef: expecting ';'",
            ));
        };
        let body = self.rest()[..end].to_owned();
        self.advance(end + 1);

        if let Some(num) = body.strip_prefix('#') {
            let value = match num.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => num.parse::<u32>().ok(),
            };
            return value
                .and_then(char::from_u32)
                .filter(|c| c.is_xml_char())
                .ok_or_else(|| {
                    self.err_at(
                        start,
                        XmlParserErrors::XmlErrInvalidCharRef,
                        format!("xmlParseCharRef: invalid xmlChar value {num}"),
                    )
                });
        }
        match body.as_str() {
            "lt" => Ok('<'),
            "gt" => Ok('>'),
            "amp" => Ok('&'),
            "apos" => Ok('\''),
            "quot" => Ok('"'),
            name if name.is_empty() || name.contains(|c: char| !c.is_name_char()) => Err(self
                .err_at(
                    start,
                    XmlParserErrors::XmlErrEntityRefSemicolMissing,
                    "EntityRef: expecting ';'",
                )),
            name => Err(self.err_at(
                start,
                XmlParserErrors::XmlErrUndeclaredEntity,
                format!("Entity '{name}' not defined"),
            )),
        }
    }

    /// Parse an attribute value and normalize its white space.
    #[doc(alias = "xmlParseAttValue")]
    fn parse_att_value(&mut self) -> Result<String, XmlParserError> {
        let Some(quote) = self.current_char().filter(|&c| c == '"' || c == '\'') else {
            return Err(self.err(
                XmlParserErrors::XmlErrAttributeNotStarted,
                "AttValue: \" or ' expected",
            ));
        };
        self.advance(1);
        let mut value = String::new();
        loop {
            match self.current_char() {
                None => {
                    return Err(self.err(
                        XmlParserErrors::XmlErrStringNotClosed,
                        format!("AttValue: {quote} expected"),
                    ));
                }
                Some(c) if c == quote => {
                    self.advance(1);
                    return Ok(value);
                }
                Some('<') => {
                    return Err(self.err(
                        XmlParserErrors::XmlErrLtInAttribute,
                        "Unescaped '<' not allowed in attributes values",
                    ));
                }
                Some('&') => value.push(self.parse_reference()?),
                Some(c) if c.is_blank_char() => {
                    self.advance(1);
                    value.push(' ');
                }
                Some(c) if !c.is_xml_char() => {
                    return Err(self.err(
                        XmlParserErrors::XmlErrInvalidChar,
                        format!("Char 0x{:X} out of allowed range", c as u32),
                    ));
                }
                Some(c) => {
                    self.advance(c.len_utf8());
                    value.push(c);
                }
            }
        }
    }

    /// Parse character data up to the next markup.
    #[doc(alias = "xmlParseCharData")]
    fn parse_char_data(&mut self, parent: XmlNodeId) -> Result<(), XmlParserError> {
        let mut text = String::new();
        while let Some(c) = self.current_char() {
            match c {
                '<' => break,
                '&' => text.push(self.parse_reference()?),
                c if !c.is_xml_char() => {
                    return Err(self.err(
                        XmlParserErrors::XmlErrInvalidChar,
                        format!("PCDATA invalid Char value {}", c as u32),
                    ));
                }
                c => {
                    self.advance(c.len_utf8());
                    text.push(c);
                }
            }
        }
        let node = self.doc.new_text(&text);
        self.doc.add_child(parent, node);
        Ok(())
    }

    /// Parse the root element and all of its content.
    #[doc(alias = "xmlParseElement")]
    fn parse_element(&mut self) -> Result<(), XmlParserError> {
        let root = self.doc.root();
        self.parse_start_tag(root)?;
        while let Some(top) = self.name_tab.last() {
            let node = top.node;
            if self.rest().is_empty() {
                let (line, _) = self.position(top.start);
                return Err(self.err(
                    XmlParserErrors::XmlErrTagNotFinished,
                    format!("Premature end of data in tag {} line {line}", top.name),
                ));
            }
            if self.looking_at("</") {
                self.parse_end_tag()?;
            } else if self.looking_at("<!--") {
                self.parse_comment(node)?;
            } else if self.looking_at("<![CDATA[") {
                self.parse_cdata(node)?;
            } else if self.looking_at("<?") {
                self.parse_pi(node)?;
            } else if self.looking_at("<") {
                self.parse_start_tag(node)?;
            } else {
                self.parse_char_data(node)?;
            }
        }
        Ok(())
    }

    /// Parse a start tag, create its element under `parent` and resolve namespaces.
    ///
    /// The element is pushed on the name stack unless the tag is empty.
    #[doc(alias = "xmlParseStartTag2")]
    fn parse_start_tag(&mut self, parent: XmlNodeId) -> Result<(), XmlParserError> {
        let start = self.cur;
        self.advance(1);
        let Some(name) = self.parse_name() else {
            return Err(self.err(
                XmlParserErrors::XmlErrNameRequired,
                "StartTag: invalid element name",
            ));
        };

        let mut attrs: Vec<XmlRawAttr> = vec![];
        let empty = loop {
            let blank = self.skip_blanks();
            if self.looking_at(">") {
                self.advance(1);
                break false;
            }
            if self.looking_at("/>") {
                self.advance(2);
                break true;
            }
            if self.rest().is_empty() {
                return Err(self.err(
                    XmlParserErrors::XmlErrGtRequired,
                    format!("Couldn't find end of Start Tag {name}"),
                ));
            }
            if !blank {
                return Err(self.err(
                    XmlParserErrors::XmlErrSpaceRequired,
                    "attributes construct error",
                ));
            }
            let attr_start = self.cur;
            let Some(attr_name) = self.parse_name() else {
                return Err(self.err(
                    XmlParserErrors::XmlErrGtRequired,
                    format!("Couldn't find end of Start Tag {name}"),
                ));
            };
            self.skip_blanks();
            if !self.looking_at("=") {
                return Err(self.err(
                    XmlParserErrors::XmlErrAttributeWithoutValue,
                    format!("Specification mandates value for attribute {attr_name}"),
                ));
            }
            self.advance(1);
            self.skip_blanks();
            let value = self.parse_att_value()?;
            if attrs.iter().any(|attr| attr.name == attr_name) {
                return Err(self.err_at(
                    attr_start,
                    XmlParserErrors::XmlErrAttributeRedefined,
                    format!("Attribute {attr_name} redefined"),
                ));
            }
            attrs.push(XmlRawAttr {
                name: attr_name,
                value,
                start: attr_start,
            });
        };

        let (prefix, local) = self.split_qname(&name, start)?;
        let node = self.doc.new_child(parent, None, local);

        // Namespace declarations first, so that the element and its attributes can use them.
        for attr in &attrs {
            let decl_prefix = if attr.name == "xmlns" {
                None
            } else if let Some(prefix) = attr.name.strip_prefix("xmlns:") {
                Some(prefix)
            } else {
                continue;
            };
            match decl_prefix {
                Some("xml") => {
                    if attr.value != XML_XML_NAMESPACE {
                        return Err(self.err_at(
                            attr.start,
                            XmlParserErrors::XmlNsErrXmlNamespace,
                            "xml namespace prefix mapped to wrong URI",
                        ));
                    }
                    continue;
                }
                Some("xmlns") => {
                    return Err(self.err_at(
                        attr.start,
                        XmlParserErrors::XmlNsErrXmlNamespace,
                        "redefinition of the xmlns prefix is forbidden",
                    ));
                }
                Some(p) if attr.value.is_empty() => {
                    return Err(self.err_at(
                        attr.start,
                        XmlParserErrors::XmlNsErrEmpty,
                        format!("xmlns:{p}: Empty XML namespace is not allowed"),
                    ));
                }
                _ => {}
            }
            self.doc.new_ns(node, &attr.value, decl_prefix);
        }

        let ns = self.resolve_prefix(node, prefix, local, start)?;
        self.doc.set_ns(node, ns);

        let mut seen: Vec<(Option<XmlNsId>, &str)> = vec![];
        for attr in &attrs {
            if attr.name == "xmlns" || attr.name.starts_with("xmlns:") {
                continue;
            }
            let (prefix, local) = self.split_qname(&attr.name, attr.start)?;
            // Unprefixed attributes are in no namespace.
            let ns = match prefix {
                Some(_) => self.resolve_prefix(node, prefix, local, attr.start)?,
                None => None,
            };
            let href = ns.map(|ns| self.doc.get_ns(ns).href());
            if seen
                .iter()
                .any(|&(other, name)| name == local && other.map(|o| self.doc.get_ns(o).href()) == href)
            {
                return Err(self.err_at(
                    attr.start,
                    XmlParserErrors::XmlNsErrAttributeRedefined,
                    format!(
                        "Namespaced Attribute {local} in '{}' redefined",
                        href.unwrap_or_default()
                    ),
                ));
            }
            seen.push((ns, local));
            self.doc.set_ns_prop(node, ns, local, &attr.value);
        }

        if !empty {
            self.name_tab.push(XmlNameEntry { name, node, start });
        }
        Ok(())
    }

    fn split_qname<'b>(
        &self,
        name: &'b str,
        pos: usize,
    ) -> Result<(Option<&'b str>, &'b str), XmlParserError> {
        match name.split_once(':') {
            None => Ok((None, name)),
            Some((prefix, local))
                if !prefix.is_empty()
                    && !local.is_empty()
                    && !local.contains(':')
                    && local.starts_with(|c: char| c.is_name_start_char()) =>
            {
                Ok((Some(prefix), local))
            }
            Some(_) => Err(self.err_at(
                pos,
                XmlParserErrors::XmlNsErrQname,
                format!("Failed to parse QName '{name}'"),
            )),
        }
    }

    fn resolve_prefix(
        &self,
        node: XmlNodeId,
        prefix: Option<&str>,
        local: &str,
        pos: usize,
    ) -> Result<Option<XmlNsId>, XmlParserError> {
        match self.doc.search_ns(node, prefix) {
            // `xmlns=""` undeclares the default namespace.
            Some(ns) if prefix.is_none() && self.doc.get_ns(ns).href().is_empty() => Ok(None),
            Some(ns) => Ok(Some(ns)),
            None if prefix.is_none() => Ok(None),
            None => Err(self.err_at(
                pos,
                XmlParserErrors::XmlNsErrUndefinedNamespace,
                format!(
                    "Namespace prefix {} on {local} is not defined",
                    prefix.unwrap_or_default()
                ),
            )),
        }
    }

    #[doc(alias = "xmlParseEndTag2")]
    fn parse_end_tag(&mut self) -> Result<(), XmlParserError> {
        let pos = self.cur;
        self.advance(2);
        let name = self.parse_name().unwrap_or_default();
        self.skip_blanks();
        if !self.looking_at(">") {
            return Err(self.err(XmlParserErrors::XmlErrGtRequired, "expected '>'"));
        }
        self.advance(1);
        let Some(open) = self.name_tab.pop() else {
            return Err(self.err_at(pos, XmlParserErrors::XmlErrInternalError, "unexpected end tag"));
        };
        if open.name != name {
            let (line, _) = self.position(open.start);
            return Err(self.err_at(
                pos,
                XmlParserErrors::XmlErrTagNameMismatch,
                format!(
                    "Opening and ending tag mismatch: {} line {line} and {name}",
                    open.name
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::tree::XmlElementType;

    use super::*;

    #[test]
    fn parses_namespaces_and_content() {
        let doc = xml_read_str(concat!(
            "<?xml version=\"1.0\"?>\n",
            "<!DOCTYPE r [ <!ENTITY e \"]>\"> ]>\n",
            "<!-- head -->\n",
            "<r xmlns=\"urn:d\" xmlns:p=\"urn:p\" p:a=\"1\" b=\"x&amp;y\">",
            "<p:c>t&#x41;<![CDATA[<raw>]]></p:c><?pi data?><e/></r>"
        ))
        .unwrap();
        let root = doc.get_root_element().unwrap();
        assert_eq!(doc.name(root), Some("r"));
        assert_eq!(doc.ns(root).map(|ns| doc.get_ns(ns).href()), Some("urn:d"));
        assert_eq!(doc.ns_def(root).len(), 2);
        assert_eq!(doc.get_ns_prop(root, "a", "urn:p"), Some("1"));
        assert_eq!(doc.get_prop(root, "b"), Some("x&y"));

        let children: Vec<_> = doc.child_nodes(root).collect();
        assert_eq!(children.len(), 3);
        assert_eq!(doc.qualified_name(children[0]).as_deref(), Some("p:c"));
        assert_eq!(doc.get_content(children[0]), "tA<raw>");
        assert_eq!(doc.element_type(children[1]), XmlElementType::XmlPINode);
        assert_eq!(doc.content(children[1]), Some("data"));
        assert_eq!(doc.ns(children[2]).map(|ns| doc.get_ns(ns).href()), Some("urn:d"));
        assert_eq!(doc.child_nodes(doc.root()).count(), 2);
    }

    #[test]
    fn attribute_values_are_normalized() {
        let doc = xml_read_str("<r a=\"x\ty\r\nz\"/>").unwrap();
        let root = doc.get_root_element().unwrap();
        assert_eq!(doc.get_prop(root, "a"), Some("x y z"));
    }

    #[test]
    fn empty_default_namespace_undeclares() {
        let doc = xml_read_str("<r xmlns=\"urn:d\"><c xmlns=\"\"/></r>").unwrap();
        let root = doc.get_root_element().unwrap();
        let c = doc.children(root).unwrap();
        assert!(doc.ns(c).is_none());
    }

    #[test]
    fn fatal_errors() {
        let cases = [
            ("", XmlParserErrors::XmlErrDocumentEmpty),
            ("text", XmlParserErrors::XmlErrDocumentEmpty),
            ("<a></b>", XmlParserErrors::XmlErrTagNameMismatch),
            ("<a x='1' x='2'/>", XmlParserErrors::XmlErrAttributeRedefined),
            ("<a/><b/>", XmlParserErrors::XmlErrDocumentEnd),
            ("<p:a/>", XmlParserErrors::XmlNsErrUndefinedNamespace),
            ("<a>&nope;</a>", XmlParserErrors::XmlErrUndeclaredEntity),
            ("<a><!-- open</a>", XmlParserErrors::XmlErrCommentNotFinished),
            ("<a x=1/>", XmlParserErrors::XmlErrAttributeNotStarted),
            ("<a>", XmlParserErrors::XmlErrTagNotFinished),
            ("<a>&#0;</a>", XmlParserErrors::XmlErrInvalidCharRef),
            (
                "<a xmlns:p='urn:1' xmlns:q='urn:1' p:x='1' q:x='2'/>",
                XmlParserErrors::XmlNsErrAttributeRedefined,
            ),
        ];
        for (input, code) in cases {
            let err = xml_read_str(input).unwrap_err();
            assert_eq!(err.code, code, "{input}: {err}");
        }
    }

    #[test]
    fn error_positions() {
        let err = xml_read_str("<a>\n  <b>\n</a>").unwrap_err();
        assert_eq!(err.code, XmlParserErrors::XmlErrTagNameMismatch);
        assert_eq!(err.line, 3);
        assert_eq!(err.column, 1);
        assert_eq!(
            err.message,
            "Opening and ending tag mismatch: b line 2 and a"
        );
    }

    #[test]
    fn memory_input_is_decoded() {
        let doc = xml_read_memory(
            b"<?xml version='1.0' encoding='ISO-8859-1'?><r>caf\xE9</r>",
            Some("mem.xml"),
            None,
        )
        .unwrap();
        let root = doc.get_root_element().unwrap();
        assert_eq!(doc.get_content(root), "caf\u{e9}");
        assert_eq!(doc.url.as_deref(), Some("mem.xml"));
    }
}
