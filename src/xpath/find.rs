//! Namespace-aware query entry points.
//!
//! A query runs in three stages: the caller's namespace argument is normalized into
//! [`NamespaceDeclaration`]s, an [`EvaluationContext`] merges them over the namespaces in
//! scope at the context node, and [`evaluate`] compiles and runs the expression.
//! [`XmlXPathFind`] chains the three.

use std::{error::Error, fmt::Display};

use crate::tree::{XmlDoc, XmlElementType, XmlNodeId, XmlNsId};

use super::{
    XmlXPathContext, XmlXPathError, XmlXPathObject, xml_xpath_compile, xml_xpath_compiled_eval,
};

/// One namespace binding.
///
/// An absent prefix is the default namespace. An absent URI is a bare prefix, which is
/// kept in the table but never reaches the XPath engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDeclaration {
    pub prefix: Option<String>,
    pub uri: Option<String>,
}

impl NamespaceDeclaration {
    fn new(prefix: &str, uri: Option<&str>) -> Self {
        let prefix = prefix.trim();
        let uri = uri.map(str::trim).filter(|uri| !uri.is_empty());
        Self {
            prefix: (!prefix.is_empty()).then(|| prefix.to_owned()),
            uri: uri.map(str::to_owned),
        }
    }

    /// Split `"prefix:uri"` at the first colon. Without a colon the whole string is a
    /// bare prefix.
    fn parse(s: &str) -> Self {
        match s.split_once(':') {
            Some((prefix, uri)) => Self::new(prefix, Some(uri)),
            None => Self::new(s, None),
        }
    }

    fn from_handle(doc: &XmlDoc, ns: XmlNsId) -> Self {
        let ns = doc.get_ns(ns);
        Self::new(ns.prefix().unwrap_or_default(), Some(ns.href()))
    }
}

/// The namespace argument of a query.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum NamespaceSpecArg {
    #[default]
    Absent,
    /// `"prefix:uri"` or a bare `"prefix"`.
    String(String),
    Handle(XmlNsId),
    List(Vec<NamespaceSpecItem>),
}

/// One member of a [`NamespaceSpecArg::List`].
#[derive(Debug, Clone, PartialEq)]
pub enum NamespaceSpecItem {
    String(String),
    /// `[prefix, uri]`
    Pair(Vec<String>),
    Handle(XmlNsId),
    /// A nested list, accepted only when it is a pair of strings.
    List(Vec<NamespaceSpecItem>),
    /// A missing member.
    Nil,
}

impl From<&str> for NamespaceSpecArg {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for NamespaceSpecArg {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<XmlNsId> for NamespaceSpecArg {
    fn from(value: XmlNsId) -> Self {
        Self::Handle(value)
    }
}

impl From<Vec<NamespaceSpecItem>> for NamespaceSpecArg {
    fn from(value: Vec<NamespaceSpecItem>) -> Self {
        Self::List(value)
    }
}

impl From<Vec<&str>> for NamespaceSpecArg {
    fn from(value: Vec<&str>) -> Self {
        Self::List(value.into_iter().map(NamespaceSpecItem::from).collect())
    }
}

impl From<Vec<[&str; 2]>> for NamespaceSpecArg {
    fn from(value: Vec<[&str; 2]>) -> Self {
        Self::List(value.into_iter().map(NamespaceSpecItem::from).collect())
    }
}

impl From<Vec<XmlNsId>> for NamespaceSpecArg {
    fn from(value: Vec<XmlNsId>) -> Self {
        Self::List(value.into_iter().map(NamespaceSpecItem::Handle).collect())
    }
}

impl<T: Into<NamespaceSpecArg>> From<Option<T>> for NamespaceSpecArg {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Absent, Into::into)
    }
}

impl From<&str> for NamespaceSpecItem {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for NamespaceSpecItem {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<[&str; 2]> for NamespaceSpecItem {
    fn from([prefix, uri]: [&str; 2]) -> Self {
        Self::Pair(vec![prefix.to_owned(), uri.to_owned()])
    }
}

impl From<XmlNsId> for NamespaceSpecItem {
    fn from(value: XmlNsId) -> Self {
        Self::Handle(value)
    }
}

/// A namespace argument that could not be normalized.
///
/// `index` is the position of the offending member, 0 for a scalar argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizationError {
    MalformedPair { index: usize, len: usize },
    UnsupportedElementType { index: usize },
}

impl Display for NormalizationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedPair { index, len } => write!(
                f,
                "nested array must be an array of strings, prefix and href/uri (element {index} has {len} members)"
            ),
            Self::UnsupportedElementType { index } => write!(
                f,
                "Invalid argument type, only accept string, array of strings, or an array of arrays (element {index})"
            ),
        }
    }
}

impl Error for NormalizationError {}

fn normalize_pair<S: AsRef<str>>(
    pair: &[S],
    index: usize,
) -> Result<NamespaceDeclaration, NormalizationError> {
    match pair {
        [prefix, uri] => Ok(NamespaceDeclaration::new(prefix.as_ref(), Some(uri.as_ref()))),
        _ => Err(NormalizationError::MalformedPair {
            index,
            len: pair.len(),
        }),
    }
}

fn normalize_item(
    doc: &XmlDoc,
    item: &NamespaceSpecItem,
    index: usize,
) -> Result<NamespaceDeclaration, NormalizationError> {
    match item {
        NamespaceSpecItem::String(s) => Ok(NamespaceDeclaration::parse(s)),
        NamespaceSpecItem::Pair(pair) => normalize_pair(pair, index),
        NamespaceSpecItem::Handle(ns) => Ok(NamespaceDeclaration::from_handle(doc, *ns)),
        NamespaceSpecItem::List(list) => {
            let strings = list
                .iter()
                .map(|member| match member {
                    NamespaceSpecItem::String(s) => Some(s.as_str()),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()
                .ok_or(NormalizationError::UnsupportedElementType { index })?;
            normalize_pair(&strings, index)
        }
        NamespaceSpecItem::Nil => Err(NormalizationError::UnsupportedElementType { index }),
    }
}

/// Turn a namespace argument into an ordered list of declarations.
///
/// Output order is input order. The first bad member aborts the whole call.
pub fn normalize(
    doc: &XmlDoc,
    spec: &NamespaceSpecArg,
) -> Result<Vec<NamespaceDeclaration>, NormalizationError> {
    match spec {
        NamespaceSpecArg::Absent => Ok(vec![]),
        NamespaceSpecArg::String(s) => Ok(vec![NamespaceDeclaration::parse(s)]),
        NamespaceSpecArg::Handle(ns) => Ok(vec![NamespaceDeclaration::from_handle(doc, *ns)]),
        NamespaceSpecArg::List(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| normalize_item(doc, item, index))
            .collect(),
    }
}

/// A context node with its finalized namespace table.
#[derive(Debug, Clone)]
pub struct EvaluationContext<'a> {
    doc: &'a XmlDoc,
    node: XmlNodeId,
    namespaces: Vec<NamespaceDeclaration>,
    variables: Vec<(String, XmlXPathObject)>,
}

impl<'a> EvaluationContext<'a> {
    /// Bind `node` and merge `overrides` over the namespaces in scope.
    ///
    /// For the document node the scope is the root element. An override replaces the entry
    /// with the same prefix in place, otherwise it is appended.
    pub fn build(doc: &'a XmlDoc, node: XmlNodeId, overrides: Vec<NamespaceDeclaration>) -> Self {
        let scope_root = if doc.element_type(node) == XmlElementType::XmlDocumentNode {
            doc.get_root_element()
        } else {
            Some(node)
        };
        let mut namespaces = scope_root
            .and_then(|root| doc.get_ns_list(root))
            .unwrap_or_default()
            .into_iter()
            .map(|ns| NamespaceDeclaration::from_handle(doc, ns))
            .collect::<Vec<_>>();

        for decl in overrides {
            match namespaces.iter_mut().find(|cur| cur.prefix == decl.prefix) {
                Some(cur) => *cur = decl,
                None => namespaces.push(decl),
            }
        }

        Self {
            doc,
            node,
            namespaces,
            variables: vec![],
        }
    }

    /// Bind `$name` for the evaluation. A second binding of the same name replaces the first.
    pub fn register_variable(&mut self, name: &str, value: XmlXPathObject) {
        match self.variables.iter_mut().find(|(cur, _)| cur == name) {
            Some((_, cur)) => *cur = value,
            None => self.variables.push((name.to_owned(), value)),
        }
    }

    pub fn doc(&self) -> &'a XmlDoc {
        self.doc
    }

    pub fn node(&self) -> XmlNodeId {
        self.node
    }

    pub fn namespaces(&self) -> &[NamespaceDeclaration] {
        &self.namespaces
    }

    /// The URI bound to `prefix`, `None` for the default namespace.
    pub fn lookup_ns(&self, prefix: Option<&str>) -> Option<&str> {
        self.namespaces
            .iter()
            .find(|decl| decl.prefix.as_deref() == prefix)
            .and_then(|decl| decl.uri.as_deref())
    }

    /// The engine context for one evaluation.
    ///
    /// Only prefixed bindings with a URI are registered: XPath 1.0 has no default namespace.
    fn xpath_context(&self) -> XmlXPathContext<'a> {
        let mut ctxt = XmlXPathContext::new(self.doc);
        ctxt.node = self.node;
        for decl in &self.namespaces {
            if let (Some(prefix), Some(uri)) = (&decl.prefix, &decl.uri) {
                ctxt.register_ns(prefix, Some(uri));
            }
        }
        for (name, value) in &self.variables {
            ctxt.register_variable(name, Some(value.clone()));
        }
        ctxt
    }
}

/// A query that could not produce a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryError {
    /// The node or the expression is missing. `given` counts the ones supplied.
    ArityError { given: usize },
    InvalidExpression(XmlXPathError),
    EvaluationFailed(XmlXPathError),
}

impl Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ArityError { given } => write!(f, "wrong number of arguments ({given} for 2)"),
            Self::InvalidExpression(code) => {
                write!(f, "Invalid XPath expression (expr does not compile): {code}")
            }
            Self::EvaluationFailed(code) => {
                write!(f, "Invalid XPath expression for this document: {code}")
            }
        }
    }
}

impl Error for QueryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ArityError { .. } => None,
            Self::InvalidExpression(code) | Self::EvaluationFailed(code) => Some(code),
        }
    }
}

/// Compile `expression` and evaluate it in `context`.
///
/// An empty node-set is a successful result. Node-sets come back in document order.
pub fn evaluate(
    expression: &str,
    context: &EvaluationContext,
) -> Result<XmlXPathObject, QueryError> {
    let comp = xml_xpath_compile(expression).map_err(QueryError::InvalidExpression)?;
    let mut ctxt = context.xpath_context();
    xml_xpath_compiled_eval(&comp, &mut ctxt).map_err(QueryError::EvaluationFailed)
}

/// Failure of [`XmlXPathFind::find`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindError {
    Namespace(NormalizationError),
    Query(QueryError),
}

impl Display for FindError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Namespace(err) => err.fmt(f),
            Self::Query(err) => err.fmt(f),
        }
    }
}

impl Error for FindError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Namespace(err) => Some(err),
            Self::Query(err) => Some(err),
        }
    }
}

impl From<NormalizationError> for FindError {
    fn from(value: NormalizationError) -> Self {
        Self::Namespace(value)
    }
}

impl From<QueryError> for FindError {
    fn from(value: QueryError) -> Self {
        Self::Query(value)
    }
}

/// Builder running a whole query: normalize the namespaces, build the context, evaluate.
///
/// ```
/// use xpfind::{parser::xml_read_str, xpath::XmlXPathFind};
///
/// let doc = xml_read_str(r#"<r xmlns:a="urn:a"><a:x/><b:x xmlns:b="urn:a"/></r>"#).unwrap();
/// let res = XmlXPathFind::new()
///     .node(doc.root())
///     .expression("count(//n:x)")
///     .namespaces("n:urn:a")
///     .find(&doc)
///     .unwrap();
/// assert_eq!(res.cast_to_number(&doc), 2.0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct XmlXPathFind {
    node: Option<XmlNodeId>,
    expression: Option<String>,
    namespaces: NamespaceSpecArg,
    variables: Vec<(String, XmlXPathObject)>,
}

impl XmlXPathFind {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, node: XmlNodeId) -> Self {
        self.node = Some(node);
        self
    }

    pub fn expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    pub fn namespaces(mut self, namespaces: impl Into<NamespaceSpecArg>) -> Self {
        self.namespaces = namespaces.into();
        self
    }

    pub fn variable(mut self, name: impl Into<String>, value: XmlXPathObject) -> Self {
        self.variables.push((name.into(), value));
        self
    }

    /// Run the query against `doc`.
    ///
    /// A missing node or expression is reported before anything else is looked at.
    pub fn find(&self, doc: &XmlDoc) -> Result<XmlXPathObject, FindError> {
        let (Some(node), Some(expression)) = (self.node, self.expression.as_deref()) else {
            let given = self.node.is_some() as usize + self.expression.is_some() as usize;
            return Err(QueryError::ArityError { given }.into());
        };
        let overrides = normalize(doc, &self.namespaces)?;
        let mut context = EvaluationContext::build(doc, node, overrides);
        for (name, value) in &self.variables {
            context.register_variable(name, value.clone());
        }
        Ok(evaluate(expression, &context)?)
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::xml_read_str;

    use super::*;

    fn decl(prefix: Option<&str>, uri: Option<&str>) -> NamespaceDeclaration {
        NamespaceDeclaration {
            prefix: prefix.map(str::to_owned),
            uri: uri.map(str::to_owned),
        }
    }

    #[test]
    fn normalize_strings() {
        let doc = XmlDoc::new();
        assert_eq!(
            normalize(&doc, &"a:b:c".into()).unwrap(),
            [decl(Some("a"), Some("b:c"))]
        );
        assert_eq!(normalize(&doc, &"bare".into()).unwrap(), [decl(Some("bare"), None)]);
        assert_eq!(normalize(&doc, &":urn:d".into()).unwrap(), [decl(None, Some("urn:d"))]);
        assert_eq!(normalize(&doc, &"p: ".into()).unwrap(), [decl(Some("p"), None)]);
        assert!(normalize(&doc, &NamespaceSpecArg::Absent).unwrap().is_empty());
        assert!(normalize(&doc, &None::<&str>.into()).unwrap().is_empty());
    }

    #[test]
    fn normalize_lists_keep_order() {
        let doc = XmlDoc::new();
        let spec = NamespaceSpecArg::List(vec![
            " p1:u1".into(),
            ["p2", "u2"].into(),
            NamespaceSpecItem::List(vec!["p3".into(), "u3".into()]),
        ]);
        assert_eq!(
            normalize(&doc, &spec).unwrap(),
            [
                decl(Some("p1"), Some("u1")),
                decl(Some("p2"), Some("u2")),
                decl(Some("p3"), Some("u3")),
            ]
        );
    }

    #[test]
    fn normalize_rejects_bad_members() {
        let doc = XmlDoc::new();
        let spec = NamespaceSpecArg::List(vec![
            "ok:u".into(),
            NamespaceSpecItem::Pair(vec!["a".into(), "b".into(), "c".into()]),
        ]);
        assert_eq!(
            normalize(&doc, &spec),
            Err(NormalizationError::MalformedPair { index: 1, len: 3 })
        );
        let spec = NamespaceSpecArg::List(vec![NamespaceSpecItem::List(vec![
            "a".into(),
            NamespaceSpecItem::Nil,
        ])]);
        assert_eq!(
            normalize(&doc, &spec),
            Err(NormalizationError::UnsupportedElementType { index: 0 })
        );
        let spec = NamespaceSpecArg::List(vec!["a:b".into(), NamespaceSpecItem::Nil]);
        assert_eq!(
            normalize(&doc, &spec),
            Err(NormalizationError::UnsupportedElementType { index: 1 })
        );
    }

    #[test]
    fn build_merges_overrides_in_place() {
        let doc =
            xml_read_str(r#"<r xmlns="urn:d" xmlns:a="urn:a" xmlns:b="urn:b"><c xmlns:a="urn:a2"/></r>"#)
                .unwrap();
        let ctx = EvaluationContext::build(
            &doc,
            doc.root(),
            vec![decl(Some("a"), Some("urn:x")), decl(Some("z"), Some("urn:z"))],
        );
        assert_eq!(
            ctx.namespaces(),
            [
                decl(None, Some("urn:d")),
                decl(Some("a"), Some("urn:x")),
                decl(Some("b"), Some("urn:b")),
                decl(Some("z"), Some("urn:z")),
            ]
        );
        assert_eq!(ctx.lookup_ns(Some("a")), Some("urn:x"));
        assert_eq!(ctx.lookup_ns(None), Some("urn:d"));

        let inner = doc.descendants(doc.root()).nth(1).unwrap();
        let ctx = EvaluationContext::build(&doc, inner, vec![]);
        assert_eq!(ctx.lookup_ns(Some("a")), Some("urn:a2"));
        assert_eq!(ctx.namespaces().len(), 3);
    }

    #[test]
    fn evaluate_outcomes() {
        let doc = xml_read_str(r#"<r xmlns:a="urn:a"><a:x/><x/></r>"#).unwrap();
        let ctx = EvaluationContext::build(&doc, doc.root(), vec![]);
        assert!(matches!(
            evaluate("///not valid", &ctx),
            Err(QueryError::InvalidExpression(_))
        ));
        let res = evaluate("//missing-tag", &ctx).unwrap();
        assert!(res.node_set().is_some_and(|set| set.is_empty()));
        assert_eq!(evaluate("count(//a:x)", &ctx), Ok(XmlXPathObject::Number(1.0)));

        let ctx = EvaluationContext::build(&doc, doc.root(), vec![decl(Some("a"), None)]);
        assert_eq!(
            evaluate("//a:x", &ctx),
            Err(QueryError::EvaluationFailed(XmlXPathError::XPathUndefPrefixError))
        );
    }

    #[test]
    fn variables_reach_the_engine() {
        let doc = xml_read_str("<r/>").unwrap();
        let mut ctx = EvaluationContext::build(&doc, doc.root(), vec![]);
        let point = XmlXPathObject::Point {
            node: doc.root(),
            index: 0,
        };
        ctx.register_variable("p", point.clone());
        assert_eq!(evaluate("$p", &ctx), Ok(point));
    }

    #[test]
    fn find_checks_arity_first() {
        let doc = XmlDoc::new();
        let err = XmlXPathFind::new()
            .expression("/")
            .namespaces(NamespaceSpecArg::List(vec![NamespaceSpecItem::Nil]))
            .find(&doc);
        assert_eq!(err, Err(FindError::Query(QueryError::ArityError { given: 1 })));
        assert_eq!(
            err.unwrap_err().to_string(),
            "wrong number of arguments (1 for 2)"
        );
        assert!(matches!(
            XmlXPathFind::new()
                .node(doc.root())
                .expression("/")
                .namespaces(vec![["a", "b"]])
                .find(&doc),
            Ok(XmlXPathObject::NodeSet(_))
        ));
    }
}
