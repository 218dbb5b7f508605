//! Debug dumps of the tree, in the layout of libxml2's `debugXML`.
//!
//! Only the node dumpers needed by the XPath inspector are provided; there is no
//! document checker or shell.

use std::io::Write;

use crate::{
    parser::XmlParserCharValid,
    tree::{XmlDoc, XmlElementType, XmlNodeId, XmlNsId},
};

struct XmlDebugCtxt<'a> {
    output: &'a mut dyn Write,
    doc: &'a XmlDoc,
    depth: usize,
}

impl<'a> XmlDebugCtxt<'a> {
    fn new(output: &'a mut dyn Write, doc: &'a XmlDoc, depth: usize) -> Self {
        Self { output, doc, depth }
    }

    #[doc(alias = "xmlCtxtDumpSpaces")]
    fn dump_spaces(&mut self) {
        write!(self.output, "{}", "  ".repeat(self.depth.min(50))).ok();
    }

    #[doc(alias = "xmlCtxtDumpString")]
    fn dump_string(&mut self, s: Option<&str>) {
        xml_debug_dump_string(&mut *self.output, s);
    }

    #[doc(alias = "xmlCtxtDumpNamespace")]
    fn dump_namespace(&mut self, ns: XmlNsId) {
        self.dump_spaces();
        let doc = self.doc;
        let ns = doc.get_ns(ns);
        if let Some(prefix) = ns.prefix() {
            write!(self.output, "namespace {prefix} href=").ok();
        } else {
            write!(self.output, "default namespace href=").ok();
        }
        self.dump_string(Some(ns.href()));
        writeln!(self.output).ok();
    }

    /// Dumps debug information for the attribute.
    ///
    /// The value is shown as the text child libxml2 would hold.
    #[doc(alias = "xmlCtxtDumpAttr")]
    fn dump_attr(&mut self, attr: XmlNodeId) {
        let doc = self.doc;
        self.dump_spaces();
        write!(self.output, "ATTRIBUTE ").ok();
        self.dump_string(doc.name(attr));
        writeln!(self.output).ok();

        self.depth += 1;
        self.dump_spaces();
        writeln!(self.output, "TEXT").ok();
        self.depth += 1;
        self.dump_spaces();
        write!(self.output, "content=").ok();
        self.dump_string(doc.content(attr));
        writeln!(self.output).ok();
        self.depth -= 2;
    }

    /// Dumps debug information for the element node, it is not recursive
    #[doc(alias = "xmlCtxtDumpOneNode")]
    fn dump_one_node(&mut self, node: XmlNodeId) {
        let doc = self.doc;
        self.dump_spaces();
        match doc.element_type(node) {
            XmlElementType::XmlElementNode => {
                write!(self.output, "ELEMENT ").ok();
                if let Some(ns) = doc.ns(node) {
                    if let Some(prefix) = doc.get_ns(ns).prefix() {
                        self.dump_string(Some(prefix));
                    }
                    write!(self.output, ":").ok();
                }
                self.dump_string(doc.name(node));
                writeln!(self.output).ok();
            }
            XmlElementType::XmlAttributeNode => {
                writeln!(self.output, "Error, ATTRIBUTE found here").ok();
                return;
            }
            XmlElementType::XmlTextNode => {
                writeln!(self.output, "TEXT").ok();
            }
            XmlElementType::XmlCDATASectionNode => {
                writeln!(self.output, "CDATA_SECTION").ok();
            }
            XmlElementType::XmlPINode => {
                writeln!(self.output, "PI {}", doc.name(node).unwrap_or_default()).ok();
            }
            XmlElementType::XmlCommentNode => {
                writeln!(self.output, "COMMENT").ok();
            }
            XmlElementType::XmlDocumentNode => {
                writeln!(self.output, "Error, DOCUMENT found here").ok();
                return;
            }
            XmlElementType::XmlNamespaceDecl => {
                writeln!(self.output, "Error, NAMESPACE found here").ok();
                return;
            }
        }

        self.depth += 1;
        if doc.element_type(node) == XmlElementType::XmlElementNode {
            for &ns in doc.ns_def(node) {
                self.dump_namespace(ns);
            }
            for &attr in doc.properties(node) {
                self.dump_attr(attr);
            }
        } else if let Some(content) = doc.content(node) {
            self.dump_spaces();
            write!(self.output, "content=").ok();
            self.dump_string(Some(content));
            writeln!(self.output).ok();
        }
        self.depth -= 1;
    }

    #[doc(alias = "xmlCtxtDumpNode")]
    fn dump_node(&mut self, node: XmlNodeId) {
        self.dump_one_node(node);
        if self.doc.element_type(node) == XmlElementType::XmlElementNode {
            if let Some(children) = self.doc.children(node) {
                self.depth += 1;
                self.dump_node_list(children);
                self.depth -= 1;
            }
        }
    }

    #[doc(alias = "xmlCtxtDumpNodeList")]
    fn dump_node_list(&mut self, first: XmlNodeId) {
        let mut cur = Some(first);
        while let Some(node) = cur {
            self.dump_node(node);
            cur = self.doc.next_sibling(node);
        }
    }
}

/// Dumps information about the string, shorten it if necessary
#[doc(alias = "xmlDebugDumpString")]
pub fn xml_debug_dump_string(output: &mut (impl Write + ?Sized), s: Option<&str>) {
    let Some(s) = s else {
        write!(output, "(NULL)").ok();
        return;
    };
    for c in s.bytes().take(40) {
        if (c as char).is_blank_char() {
            write!(output, " ").ok();
        } else if c >= 0x80 {
            write!(output, "#{:X}", c).ok();
        } else {
            write!(output, "{}", c as char).ok();
        }
    }
    if s.len() > 40 {
        write!(output, "...").ok();
    }
}

/// Dumps debug information for the attribute
#[doc(alias = "xmlDebugDumpAttr")]
pub fn xml_debug_dump_attr(output: &mut impl Write, doc: &XmlDoc, attr: XmlNodeId, depth: usize) {
    XmlDebugCtxt::new(output, doc, depth).dump_attr(attr);
}

/// Dumps debug information for the element node, it is not recursive
#[doc(alias = "xmlDebugDumpOneNode")]
pub fn xml_debug_dump_one_node(
    output: &mut impl Write,
    doc: &XmlDoc,
    node: XmlNodeId,
    depth: usize,
) {
    XmlDebugCtxt::new(output, doc, depth).dump_one_node(node);
}

/// Dumps debug information for the element node, it is recursive
#[doc(alias = "xmlDebugDumpNode")]
pub fn xml_debug_dump_node(output: &mut impl Write, doc: &XmlDoc, node: XmlNodeId, depth: usize) {
    XmlDebugCtxt::new(output, doc, depth).dump_node(node);
}

/// Dumps debug information for the list of element node, it is recursive
#[doc(alias = "xmlDebugDumpNodeList")]
pub fn xml_debug_dump_node_list(
    output: &mut impl Write,
    doc: &XmlDoc,
    first: Option<XmlNodeId>,
    depth: usize,
) {
    if let Some(first) = first {
        XmlDebugCtxt::new(output, doc, depth).dump_node_list(first);
    }
}
