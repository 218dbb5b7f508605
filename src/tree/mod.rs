//! In-memory XML tree.
//!
//! Nodes and namespace declarations live in arenas owned by [`XmlDoc`] and are addressed
//! through the copyable handles [`XmlNodeId`] and [`XmlNsId`].
//! The tree keeps libxml2's vocabulary: node kinds are [`XmlElementType`] with the same
//! numeric codes, attributes hang off `properties`, and namespace declarations off `ns_def`.

mod namespace;

use std::{any::type_name, cell::OnceCell, cmp::Ordering, num::NonZeroU32};

pub use namespace::*;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XmlElementType {
    XmlElementNode = 1,
    XmlAttributeNode = 2,
    XmlTextNode = 3,
    XmlCDATASectionNode = 4,
    XmlPINode = 7,
    XmlCommentNode = 8,
    XmlDocumentNode = 9,
    XmlNamespaceDecl = 18,
}

impl TryFrom<i32> for XmlElementType {
    type Error = anyhow::Error;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::XmlElementNode),
            2 => Ok(Self::XmlAttributeNode),
            3 => Ok(Self::XmlTextNode),
            4 => Ok(Self::XmlCDATASectionNode),
            7 => Ok(Self::XmlPINode),
            8 => Ok(Self::XmlCommentNode),
            9 => Ok(Self::XmlDocumentNode),
            18 => Ok(Self::XmlNamespaceDecl),
            _ => Err(anyhow::anyhow!(
                "Invalid convert from value '{value}' to {}",
                type_name::<Self>()
            )),
        }
    }
}

/// Handle of a node owned by an [`XmlDoc`].
///
/// A handle is only meaningful for the document that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct XmlNodeId(NonZeroU32);

impl XmlNodeId {
    fn from_index(index: usize) -> Self {
        Self(NonZeroU32::MIN.saturating_add(index as u32))
    }

    fn index(self) -> usize {
        self.0.get() as usize - 1
    }
}

#[derive(Debug, Clone)]
struct XmlNodeData {
    typ: XmlElementType,
    /// Element or attribute local name, PI target.
    name: Option<String>,
    ns: Option<XmlNsId>,
    /// Character data of text, CDATA, comment and PI nodes, or an attribute value.
    content: Option<String>,
    parent: Option<XmlNodeId>,
    children: Option<XmlNodeId>,
    last: Option<XmlNodeId>,
    next: Option<XmlNodeId>,
    prev: Option<XmlNodeId>,
    properties: Vec<XmlNodeId>,
    ns_def: Vec<XmlNsId>,
}

impl XmlNodeData {
    fn new(typ: XmlElementType) -> Self {
        Self {
            typ,
            name: None,
            ns: None,
            content: None,
            parent: None,
            children: None,
            last: None,
            next: None,
            prev: None,
            properties: vec![],
            ns_def: vec![],
        }
    }
}

/// An XML document and the arena of everything it owns.
#[derive(Debug, Clone)]
pub struct XmlDoc {
    nodes: Vec<XmlNodeData>,
    namespaces: Vec<XmlNs>,
    pub url: Option<String>,
    pub version: Option<String>,
    pub encoding: Option<String>,
    /// Pre-order position of every node, rebuilt after a mutation.
    order: OnceCell<Vec<u32>>,
}

impl Default for XmlDoc {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlDoc {
    /// Create an empty document: a document node and the implicit `xml` namespace.
    #[doc(alias = "xmlNewDoc")]
    pub fn new() -> Self {
        Self {
            nodes: vec![XmlNodeData::new(XmlElementType::XmlDocumentNode)],
            namespaces: vec![XmlNs {
                prefix: Some("xml".to_owned()),
                href: XML_XML_NAMESPACE.to_owned(),
                node: None,
            }],
            url: None,
            version: Some("1.0".to_owned()),
            encoding: None,
            order: OnceCell::new(),
        }
    }

    /// The document node.
    pub fn root(&self) -> XmlNodeId {
        XmlNodeId::from_index(0)
    }

    /// The namespace bound to the reserved `xml` prefix.
    pub fn xml_ns(&self) -> XmlNsId {
        XmlNsId::from_index(0)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn data(&self, node: XmlNodeId) -> &XmlNodeData {
        &self.nodes[node.index()]
    }

    fn data_mut(&mut self, node: XmlNodeId) -> &mut XmlNodeData {
        self.order.take();
        &mut self.nodes[node.index()]
    }

    fn alloc(&mut self, data: XmlNodeData) -> XmlNodeId {
        self.order.take();
        self.nodes.push(data);
        XmlNodeId::from_index(self.nodes.len() - 1)
    }

    /// Create an element node that is not linked into the tree yet.
    #[doc(alias = "xmlNewDocNode")]
    pub fn new_doc_node(&mut self, ns: Option<XmlNsId>, name: &str) -> XmlNodeId {
        let mut data = XmlNodeData::new(XmlElementType::XmlElementNode);
        data.name = Some(name.to_owned());
        data.ns = ns;
        self.alloc(data)
    }

    /// Create an element and append it to the children of `parent`.
    #[doc(alias = "xmlNewChild")]
    pub fn new_child(&mut self, parent: XmlNodeId, ns: Option<XmlNsId>, name: &str) -> XmlNodeId {
        let child = self.new_doc_node(ns, name);
        self.add_child(parent, child);
        child
    }

    #[doc(alias = "xmlNewDocText")]
    pub fn new_text(&mut self, content: &str) -> XmlNodeId {
        self.new_character_node(XmlElementType::XmlTextNode, None, content)
    }

    #[doc(alias = "xmlNewCDataBlock")]
    pub fn new_cdata(&mut self, content: &str) -> XmlNodeId {
        self.new_character_node(XmlElementType::XmlCDATASectionNode, None, content)
    }

    #[doc(alias = "xmlNewDocComment")]
    pub fn new_comment(&mut self, content: &str) -> XmlNodeId {
        self.new_character_node(XmlElementType::XmlCommentNode, None, content)
    }

    #[doc(alias = "xmlNewDocPI")]
    pub fn new_pi(&mut self, target: &str, content: Option<&str>) -> XmlNodeId {
        self.new_character_node(XmlElementType::XmlPINode, Some(target), content.unwrap_or(""))
    }

    fn new_character_node(
        &mut self,
        typ: XmlElementType,
        name: Option<&str>,
        content: &str,
    ) -> XmlNodeId {
        let mut data = XmlNodeData::new(typ);
        data.name = name.map(|name| name.to_owned());
        data.content = Some(content.to_owned());
        self.alloc(data)
    }

    /// Detach `cur` from its parent and siblings.
    #[doc(alias = "xmlUnlinkNode")]
    pub fn unlink(&mut self, cur: XmlNodeId) {
        let data = self.data(cur);
        let (parent, prev, next) = (data.parent, data.prev, data.next);
        if data.typ == XmlElementType::XmlAttributeNode {
            if let Some(parent) = parent {
                self.data_mut(parent).properties.retain(|&attr| attr != cur);
            }
        } else {
            if let Some(prev) = prev {
                self.data_mut(prev).next = next;
            } else if let Some(parent) = parent {
                self.data_mut(parent).children = next;
            }
            if let Some(next) = next {
                self.data_mut(next).prev = prev;
            } else if let Some(parent) = parent {
                self.data_mut(parent).last = prev;
            }
        }
        let data = self.data_mut(cur);
        data.parent = None;
        data.prev = None;
        data.next = None;
    }

    /// Append `cur` to the children of `parent`, unlinking it from any previous position.
    ///
    /// A text node appended after another text node is merged into it, and the surviving
    /// node is returned. Attributes are appended to `properties` instead, replacing an
    /// attribute with the same name and namespace.
    /// Returns `None` if `parent` cannot hold `cur`.
    #[doc(alias = "xmlAddChild")]
    pub fn add_child(&mut self, parent: XmlNodeId, cur: XmlNodeId) -> Option<XmlNodeId> {
        if parent == cur {
            return None;
        }
        let parent_type = self.element_type(parent);
        if !matches!(
            parent_type,
            XmlElementType::XmlElementNode | XmlElementType::XmlDocumentNode
        ) {
            return None;
        }
        self.unlink(cur);

        match self.element_type(cur) {
            XmlElementType::XmlDocumentNode | XmlElementType::XmlNamespaceDecl => None,
            XmlElementType::XmlAttributeNode => {
                if parent_type != XmlElementType::XmlElementNode {
                    return None;
                }
                let (name, ns) = (self.data(cur).name.clone(), self.ns_href(cur));
                if let Some(old) = self.properties(parent).iter().copied().find(|&attr| {
                    self.data(attr).name == name && self.ns_href(attr) == ns
                }) {
                    self.unlink(old);
                }
                self.data_mut(parent).properties.push(cur);
                self.data_mut(cur).parent = Some(parent);
                Some(cur)
            }
            typ => {
                if let Some(last) = self.data(parent).last {
                    if typ == XmlElementType::XmlTextNode
                        && self.element_type(last) == XmlElementType::XmlTextNode
                    {
                        let text = self.data(cur).content.clone().unwrap_or_default();
                        self.data_mut(last)
                            .content
                            .get_or_insert_with(String::new)
                            .push_str(&text);
                        return Some(last);
                    }
                    self.data_mut(last).next = Some(cur);
                    self.data_mut(cur).prev = Some(last);
                } else {
                    self.data_mut(parent).children = Some(cur);
                }
                self.data_mut(parent).last = Some(cur);
                self.data_mut(cur).parent = Some(parent);
                Some(cur)
            }
        }
    }

    /// Set (or reset) an attribute without namespace carried by `node`.
    ///
    /// Returns `None` if `node` is not an element.
    #[doc(alias = "xmlSetProp")]
    pub fn set_prop(&mut self, node: XmlNodeId, name: &str, value: &str) -> Option<XmlNodeId> {
        self.set_ns_prop(node, None, name, value)
    }

    /// Set (or reset) an attribute carried by `node`, bound to `ns`.
    #[doc(alias = "xmlSetNsProp")]
    pub fn set_ns_prop(
        &mut self,
        node: XmlNodeId,
        ns: Option<XmlNsId>,
        name: &str,
        value: &str,
    ) -> Option<XmlNodeId> {
        if self.element_type(node) != XmlElementType::XmlElementNode {
            return None;
        }
        let href = ns.map(|ns| self.get_ns(ns).href().to_owned());
        if let Some(attr) = self.properties(node).iter().copied().find(|&attr| {
            self.data(attr).name.as_deref() == Some(name)
                && self.ns_href(attr).as_deref() == href.as_deref()
        }) {
            let data = self.data_mut(attr);
            data.ns = ns;
            data.content = Some(value.to_owned());
            return Some(attr);
        }
        let mut data = XmlNodeData::new(XmlElementType::XmlAttributeNode);
        data.name = Some(name.to_owned());
        data.ns = ns;
        data.content = Some(value.to_owned());
        data.parent = Some(node);
        let attr = self.alloc(data);
        self.data_mut(node).properties.push(attr);
        Some(attr)
    }

    /// Declare a namespace on `node`.
    ///
    /// Returns `None` if `node` is not an element, if `prefix` is already declared on it,
    /// or if the declaration tries to rebind the reserved `xml` prefix.
    #[doc(alias = "xmlNewNs")]
    pub fn new_ns(
        &mut self,
        node: XmlNodeId,
        href: &str,
        prefix: Option<&str>,
    ) -> Option<XmlNsId> {
        if self.element_type(node) != XmlElementType::XmlElementNode {
            return None;
        }
        if prefix == Some("xml") {
            return None;
        }
        if self
            .ns_def(node)
            .iter()
            .any(|&ns| self.get_ns(ns).prefix() == prefix)
        {
            return None;
        }
        self.namespaces.push(XmlNs {
            prefix: prefix.map(|prefix| prefix.to_owned()),
            href: href.to_owned(),
            node: Some(node),
        });
        let ns = XmlNsId::from_index(self.namespaces.len() - 1);
        self.data_mut(node).ns_def.push(ns);
        Some(ns)
    }

    /// Associate a namespace with an element or attribute.
    #[doc(alias = "xmlSetNs")]
    pub fn set_ns(&mut self, node: XmlNodeId, ns: Option<XmlNsId>) {
        if matches!(
            self.element_type(node),
            XmlElementType::XmlElementNode | XmlElementType::XmlAttributeNode
        ) {
            self.data_mut(node).ns = ns;
        }
    }

    pub fn element_type(&self, node: XmlNodeId) -> XmlElementType {
        self.data(node).typ
    }

    /// Get the root element of the document.
    #[doc(alias = "xmlDocGetRootElement")]
    pub fn get_root_element(&self) -> Option<XmlNodeId> {
        self.child_nodes(self.root())
            .find(|&node| self.element_type(node) == XmlElementType::XmlElementNode)
    }

    pub fn parent(&self, node: XmlNodeId) -> Option<XmlNodeId> {
        self.data(node).parent
    }

    /// The first child of `node`.
    pub fn children(&self, node: XmlNodeId) -> Option<XmlNodeId> {
        self.data(node).children
    }

    pub fn last_child(&self, node: XmlNodeId) -> Option<XmlNodeId> {
        self.data(node).last
    }

    pub fn next_sibling(&self, node: XmlNodeId) -> Option<XmlNodeId> {
        self.data(node).next
    }

    pub fn prev_sibling(&self, node: XmlNodeId) -> Option<XmlNodeId> {
        self.data(node).prev
    }

    /// Iterate over the children of `node`.
    pub fn child_nodes(&self, node: XmlNodeId) -> impl Iterator<Item = XmlNodeId> + '_ {
        std::iter::successors(self.children(node), |&cur| self.next_sibling(cur))
    }

    /// Iterate over the strict descendants of `node` in document order.
    ///
    /// Attributes are not part of the walk.
    pub fn descendants(&self, node: XmlNodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            top: node,
            next: self.children(node),
        }
    }

    /// The attributes of an element.
    pub fn properties(&self, node: XmlNodeId) -> &[XmlNodeId] {
        &self.data(node).properties
    }

    /// Local name of an element or attribute, target of a processing instruction.
    pub fn name(&self, node: XmlNodeId) -> Option<&str> {
        self.data(node).name.as_deref()
    }

    /// The namespace an element or attribute is bound to.
    pub fn ns(&self, node: XmlNodeId) -> Option<XmlNsId> {
        self.data(node).ns
    }

    /// The namespace declarations carried by an element, in declaration order.
    pub fn ns_def(&self, node: XmlNodeId) -> &[XmlNsId] {
        &self.data(node).ns_def
    }

    /// Dereference a namespace handle.
    pub fn get_ns(&self, ns: XmlNsId) -> &XmlNs {
        &self.namespaces[ns.index()]
    }

    fn ns_href(&self, node: XmlNodeId) -> Option<String> {
        self.ns(node).map(|ns| self.get_ns(ns).href().to_owned())
    }

    /// The name of `node` including its namespace prefix, if any.
    pub fn qualified_name(&self, node: XmlNodeId) -> Option<String> {
        let name = self.name(node)?;
        match self.ns(node).and_then(|ns| self.get_ns(ns).prefix()) {
            Some(prefix) => Some(format!("{prefix}:{name}")),
            None => Some(name.to_owned()),
        }
    }

    /// The raw character data of a text, CDATA, comment or PI node, or an attribute value.
    pub fn content(&self, node: XmlNodeId) -> Option<&str> {
        self.data(node).content.as_deref()
    }

    /// Read the string value of a node.
    ///
    /// For an element or the document node this is the concatenation of all descendant
    /// text and CDATA nodes in document order.
    #[doc(alias = "xmlNodeGetContent")]
    pub fn get_content(&self, node: XmlNodeId) -> String {
        match self.element_type(node) {
            XmlElementType::XmlElementNode | XmlElementType::XmlDocumentNode => self
                .descendants(node)
                .filter(|&cur| {
                    matches!(
                        self.element_type(cur),
                        XmlElementType::XmlTextNode | XmlElementType::XmlCDATASectionNode
                    )
                })
                .filter_map(|cur| self.content(cur))
                .collect(),
            XmlElementType::XmlNamespaceDecl => String::new(),
            _ => self.content(node).unwrap_or_default().to_owned(),
        }
    }

    /// The value of the attribute `name` without namespace.
    #[doc(alias = "xmlGetNoNsProp")]
    pub fn get_prop(&self, node: XmlNodeId, name: &str) -> Option<&str> {
        self.properties(node)
            .iter()
            .find(|&&attr| self.name(attr) == Some(name) && self.ns(attr).is_none())
            .and_then(|&attr| self.content(attr))
    }

    /// The value of the attribute `name` bound to the namespace `href`.
    #[doc(alias = "xmlGetNsProp")]
    pub fn get_ns_prop(&self, node: XmlNodeId, name: &str, href: &str) -> Option<&str> {
        self.properties(node)
            .iter()
            .find(|&&attr| {
                self.name(attr) == Some(name)
                    && self.ns(attr).map(|ns| self.get_ns(ns).href()) == Some(href)
            })
            .and_then(|&attr| self.content(attr))
    }

    /// Search the `xml:lang` value in scope at `node`.
    #[doc(alias = "xmlNodeGetLang")]
    pub fn get_lang(&self, node: XmlNodeId) -> Option<&str> {
        std::iter::successors(Some(node), |&cur| self.parent(cur))
            .filter(|&cur| self.element_type(cur) == XmlElementType::XmlElementNode)
            .find_map(|cur| self.get_ns_prop(cur, "lang", XML_XML_NAMESPACE))
    }

    /// Find the element carrying `xml:id="id"`, first in document order.
    pub fn get_id(&self, id: &str) -> Option<XmlNodeId> {
        self.descendants(self.root()).find(|&node| {
            self.element_type(node) == XmlElementType::XmlElementNode
                && self.get_ns_prop(node, "id", XML_XML_NAMESPACE) == Some(id)
        })
    }

    /// Search a namespace declaration for `prefix` in scope at `node`.
    ///
    /// `None` as prefix looks for the default namespace. The `xml` prefix always resolves.
    #[doc(alias = "xmlSearchNs")]
    pub fn search_ns(&self, node: XmlNodeId, prefix: Option<&str>) -> Option<XmlNsId> {
        if prefix == Some("xml") {
            return Some(self.xml_ns());
        }
        self.in_scope_elements(node)
            .flat_map(|cur| self.ns_def(cur).iter().copied())
            .find(|&ns| self.get_ns(ns).prefix() == prefix)
    }

    /// Search a namespace declaration for `href` in scope at `node`.
    #[doc(alias = "xmlSearchNsByHref")]
    pub fn search_ns_by_href(&self, node: XmlNodeId, href: &str) -> Option<XmlNsId> {
        if href == XML_XML_NAMESPACE {
            return Some(self.xml_ns());
        }
        self.in_scope_elements(node)
            .flat_map(|cur| self.ns_def(cur).iter().copied())
            .find(|&ns| {
                self.get_ns(ns).href() == href
                    && self.search_ns(node, self.get_ns(ns).prefix()) == Some(ns)
            })
    }

    /// Search all the namespaces applying to a given element.
    ///
    /// The list starts at `node` and walks up, so inner declarations come first and a
    /// prefix redeclared further out is skipped.
    /// Returns `None` for a namespace declaration node.
    #[doc(alias = "xmlGetNsList")]
    pub fn get_ns_list(&self, node: XmlNodeId) -> Option<Vec<XmlNsId>> {
        if self.element_type(node) == XmlElementType::XmlNamespaceDecl {
            return None;
        }

        let mut ret: Vec<XmlNsId> = vec![];
        for cur in self.in_scope_elements(node) {
            for &ns in self.ns_def(cur) {
                let prefix = self.get_ns(ns).prefix();
                if ret.iter().all(|&seen| self.get_ns(seen).prefix() != prefix) {
                    ret.push(ns);
                }
            }
        }
        Some(ret)
    }

    fn in_scope_elements(&self, node: XmlNodeId) -> impl Iterator<Item = XmlNodeId> + '_ {
        std::iter::successors(Some(node), |&cur| self.parent(cur))
            .filter(|&cur| self.element_type(cur) == XmlElementType::XmlElementNode)
    }

    /// Position of `node` in a pre-order walk of the document.
    ///
    /// Attributes come right after their element and before its children. Nodes that are
    /// not linked under the document node are numbered after every linked node.
    pub fn document_order(&self, node: XmlNodeId) -> u32 {
        self.order.get_or_init(|| self.build_order())[node.index()]
    }

    /// Compare two nodes in document order.
    pub fn cmp_document_order(&self, a: XmlNodeId, b: XmlNodeId) -> Ordering {
        self.document_order(a)
            .cmp(&self.document_order(b))
            .then(a.cmp(&b))
    }

    fn build_order(&self) -> Vec<u32> {
        let mut order = vec![u32::MAX; self.nodes.len()];
        let mut pos = 0;
        let mut number = |node: XmlNodeId, order: &mut Vec<u32>| {
            order[node.index()] = pos;
            pos += 1;
            for &attr in self.properties(node) {
                order[attr.index()] = pos;
                pos += 1;
            }
        };
        number(self.root(), &mut order);
        for node in self.descendants(self.root()) {
            number(node, &mut order);
        }
        order
    }
}

/// Pre-order iterator returned by [`XmlDoc::descendants`].
pub struct Descendants<'a> {
    doc: &'a XmlDoc,
    top: XmlNodeId,
    next: Option<XmlNodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = XmlNodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.next?;
        self.next = self.doc.children(cur).or_else(|| {
            let mut node = cur;
            loop {
                if node == self.top {
                    return None;
                }
                if let Some(next) = self.doc.next_sibling(node) {
                    return Some(next);
                }
                node = self.doc.parent(node)?;
            }
        });
        Some(cur)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (XmlDoc, XmlNodeId, XmlNodeId, XmlNodeId) {
        // <root xmlns="urn:d" xmlns:a="urn:a"><mid xmlns:a="urn:a2" xmlns:b="urn:b"><leaf/></mid><side xmlns:c="urn:c"/></root>
        let mut doc = XmlDoc::new();
        let root = doc.new_child(doc.root(), None, "root");
        doc.new_ns(root, "urn:d", None);
        doc.new_ns(root, "urn:a", Some("a"));
        let mid = doc.new_child(root, None, "mid");
        doc.new_ns(mid, "urn:a2", Some("a"));
        doc.new_ns(mid, "urn:b", Some("b"));
        let leaf = doc.new_child(mid, None, "leaf");
        let side = doc.new_child(root, None, "side");
        doc.new_ns(side, "urn:c", Some("c"));
        (doc, root, mid, leaf)
    }

    fn pairs(doc: &XmlDoc, list: &[XmlNsId]) -> Vec<(Option<String>, String)> {
        list.iter()
            .map(|&ns| {
                let ns = doc.get_ns(ns);
                (ns.prefix().map(str::to_owned), ns.href().to_owned())
            })
            .collect()
    }

    #[test]
    fn element_type_conversion() {
        assert_eq!(
            XmlElementType::try_from(9).ok(),
            Some(XmlElementType::XmlDocumentNode)
        );
        assert_eq!(XmlElementType::XmlNamespaceDecl as i32, 18);
        assert!(XmlElementType::try_from(5).is_err());
    }

    #[test]
    fn ns_list_is_innermost_first() {
        let (doc, root, _, leaf) = sample();
        let list = doc.get_ns_list(leaf).unwrap();
        assert_eq!(
            pairs(&doc, &list),
            vec![
                (Some("a".to_owned()), "urn:a2".to_owned()),
                (Some("b".to_owned()), "urn:b".to_owned()),
                (None, "urn:d".to_owned()),
            ]
        );
        let list = doc.get_ns_list(root).unwrap();
        assert_eq!(pairs(&doc, &list).len(), 2);
        assert!(doc.get_ns_list(doc.root()).unwrap().is_empty());
    }

    #[test]
    fn search_ns_walks_ancestors() {
        let (doc, _, mid, leaf) = sample();
        let a = doc.search_ns(leaf, Some("a")).unwrap();
        assert_eq!(doc.get_ns(a).href(), "urn:a2");
        assert_eq!(doc.get_ns(a).node(), Some(mid));
        assert!(doc.search_ns(leaf, Some("c")).is_none());
        let xml = doc.search_ns(leaf, Some("xml")).unwrap();
        assert_eq!(doc.get_ns(xml).href(), XML_XML_NAMESPACE);
        let d = doc.search_ns(leaf, None).unwrap();
        assert_eq!(doc.get_ns(d).href(), "urn:d");
    }

    #[test]
    fn new_ns_refuses_duplicates() {
        let (mut doc, root, _, leaf) = sample();
        assert!(doc.new_ns(root, "urn:other", Some("a")).is_none());
        assert!(doc.new_ns(root, "urn:other", Some("xml")).is_none());
        let text = doc.new_text("x");
        doc.add_child(leaf, text);
        assert!(doc.new_ns(text, "urn:t", Some("t")).is_none());
    }

    #[test]
    fn text_nodes_merge_and_content_concatenates() {
        let mut doc = XmlDoc::new();
        let root = doc.new_child(doc.root(), None, "r");
        let t1 = doc.new_text("ab");
        let t2 = doc.new_text("cd");
        assert_eq!(doc.add_child(root, t1), Some(t1));
        assert_eq!(doc.add_child(root, t2), Some(t1));
        let inner = doc.new_child(root, None, "i");
        let cdata = doc.new_cdata("<e>");
        doc.add_child(inner, cdata);
        let comment = doc.new_comment("skip");
        doc.add_child(root, comment);
        assert_eq!(doc.get_content(root), "abcd<e>");
        assert_eq!(doc.get_content(comment), "skip");
        assert_eq!(doc.child_nodes(root).count(), 3);
    }

    #[test]
    fn attributes_and_document_order() {
        let mut doc = XmlDoc::new();
        let root = doc.new_child(doc.root(), None, "r");
        let a = doc.new_child(root, None, "a");
        let b = doc.new_child(root, None, "b");
        let id = doc.set_prop(a, "id", "1").unwrap();
        assert_eq!(doc.set_prop(a, "id", "2"), Some(id));
        assert_eq!(doc.get_prop(a, "id"), Some("2"));
        let lang = doc.set_ns_prop(root, Some(doc.xml_ns()), "lang", "en").unwrap();
        assert_eq!(doc.get_lang(b), Some("en"));
        assert_eq!(doc.parent(lang), Some(root));

        assert_eq!(doc.cmp_document_order(root, lang), Ordering::Less);
        assert_eq!(doc.cmp_document_order(lang, a), Ordering::Less);
        assert_eq!(doc.cmp_document_order(id, b), Ordering::Less);
        assert_eq!(doc.cmp_document_order(b, a), Ordering::Greater);

        let c = doc.new_doc_node(None, "c");
        doc.add_child(root, c);
        doc.unlink(a);
        assert_eq!(doc.child_nodes(root).collect::<Vec<_>>(), vec![b, c]);
        assert_eq!(doc.cmp_document_order(b, c), Ordering::Less);
        assert_eq!(doc.get_root_element(), Some(root));
    }

    #[test]
    fn xml_id_lookup() {
        let mut doc = XmlDoc::new();
        let root = doc.new_child(doc.root(), None, "r");
        let a = doc.new_child(root, None, "a");
        doc.set_ns_prop(a, Some(doc.xml_ns()), "id", "k1");
        assert_eq!(doc.get_id("k1"), Some(a));
        assert_eq!(doc.get_id("k2"), None);
    }
}
