//! End-to-end checks of the query pipeline.

use std::{cell::RefCell, io::Write, rc::Rc};

use xpfind::{
    globals::{reset_generic_error, set_generic_error},
    parser::xml_read_str,
    tree::{XmlDoc, XmlNodeId},
    xpath::{
        EvaluationContext, FindError, NamespaceDeclaration, NamespaceSpecArg, NamespaceSpecItem,
        NormalizationError, QueryError, XmlXPathError, XmlXPathFind, XmlXPathObject,
        XmlXPathObjectType, evaluate, normalize, xml_xpath_debug,
    },
};

const XINCLUDE: &str = r#"<?xml version="1.0"?>
<doc xmlns:xi="http://example.com/xi" xmlns="urn:default">
  <xi:include href="a.xml"/>
  <section xmlns:s="urn:section">
    <xi:include href="b.xml"/>
    <s:item/>
  </section>
  <aside xmlns:sib="urn:sibling"/>
  <xi:include href="c.xml"/>
</doc>"#;

#[derive(Clone, Default)]
struct Captured(Rc<RefCell<Vec<u8>>>);

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn decl(prefix: &str, uri: &str) -> NamespaceDeclaration {
    NamespaceDeclaration {
        prefix: Some(prefix.to_owned()),
        uri: Some(uri.to_owned()),
    }
}

fn element(doc: &XmlDoc, name: &str) -> XmlNodeId {
    doc.descendants(doc.root())
        .find(|&node| doc.name(node) == Some(name))
        .unwrap()
}

fn prefixes(ctx: &EvaluationContext) -> Vec<Option<String>> {
    ctx.namespaces()
        .iter()
        .map(|decl| decl.prefix.clone())
        .collect()
}

#[test]
fn normalize_splits_at_first_colon() {
    let doc = XmlDoc::new();
    let res = normalize(&doc, &"a:b:c".into()).unwrap();
    assert_eq!(res, vec![decl("a", "b:c")]);

    let res = normalize(&doc, &"xi:http://example.com/xi".into()).unwrap();
    assert_eq!(res, vec![decl("xi", "http://example.com/xi")]);
}

#[test]
fn normalize_mixed_list_in_order() {
    let doc = XmlDoc::new();
    let spec = NamespaceSpecArg::List(vec![" p1:u1".into(), ["p2", "u2"].into()]);
    let res = normalize(&doc, &spec).unwrap();
    assert_eq!(res, vec![decl("p1", "u1"), decl("p2", "u2")]);
}

#[test]
fn normalize_rejects_triple() {
    let doc = XmlDoc::new();
    let spec = NamespaceSpecArg::List(vec![NamespaceSpecItem::Pair(vec![
        "a".to_owned(),
        "b".to_owned(),
        "c".to_owned(),
    ])]);
    assert_eq!(
        normalize(&doc, &spec),
        Err(NormalizationError::MalformedPair { index: 0, len: 3 })
    );
}

#[test]
fn build_scope_follows_ancestors() {
    let doc = xml_read_str(XINCLUDE).unwrap();

    let ctx = EvaluationContext::build(&doc, doc.root(), vec![]);
    let mut seen = prefixes(&ctx);
    seen.sort();
    assert_eq!(seen, vec![None, Some("xi".to_owned())]);

    let item = element(&doc, "item");
    let ctx = EvaluationContext::build(&doc, item, vec![]);
    assert_eq!(ctx.lookup_ns(Some("s")), Some("urn:section"));
    assert_eq!(ctx.lookup_ns(Some("xi")), Some("http://example.com/xi"));
    assert_eq!(ctx.lookup_ns(None), Some("urn:default"));
    assert_eq!(ctx.lookup_ns(Some("sib")), None);
}

#[test]
fn override_replaces_ambient_binding() {
    let doc = xml_read_str(XINCLUDE).unwrap();
    let ctx = EvaluationContext::build(
        &doc,
        doc.root(),
        vec![NamespaceDeclaration {
            prefix: None,
            uri: Some("override-uri".to_owned()),
        }],
    );
    assert_eq!(ctx.lookup_ns(None), Some("override-uri"));
    assert_eq!(
        ctx.namespaces()
            .iter()
            .filter(|decl| decl.prefix.is_none())
            .count(),
        1
    );

    let ctx = EvaluationContext::build(&doc, doc.root(), vec![decl("xi", "urn:other")]);
    let res = evaluate("count(//xi:include)", &ctx).unwrap();
    assert_eq!(res, XmlXPathObject::Number(0.0));
}

#[test]
fn invalid_expression_is_reported() {
    let doc = xml_read_str(XINCLUDE).unwrap();
    let sink = Captured::default();
    set_generic_error(None, Some(sink.clone()));
    let ctx = EvaluationContext::build(&doc, doc.root(), vec![]);
    let res = evaluate("///not valid", &ctx);
    reset_generic_error();
    assert!(matches!(res, Err(QueryError::InvalidExpression(_))));
    let log = String::from_utf8(sink.0.borrow().clone()).unwrap();
    assert!(log.contains("XPath error"), "{log}");
}

#[test]
fn missing_tag_is_empty_node_set() {
    let doc = xml_read_str(XINCLUDE).unwrap();
    let ctx = EvaluationContext::build(&doc, doc.root(), vec![]);
    let res = evaluate("//missing-tag", &ctx).unwrap();
    assert_eq!(res.typ(), XmlXPathObjectType::XPathNodeset);
    assert_eq!(res.node_set().map(|set| set.len()), Some(0));
}

#[test]
fn repeated_evaluation_is_stable() {
    let doc = xml_read_str(XINCLUDE).unwrap();
    let run = || {
        let ctx = EvaluationContext::build(&doc, doc.root(), vec![]);
        let res = evaluate("//xi:include | //*[@href]", &ctx).unwrap();
        res.node_set().unwrap().iter().collect::<Vec<_>>()
    };
    let first = run();
    assert_eq!(first.len(), 3);
    assert_eq!(first, run());
}

#[test]
fn dump_of_failed_result_writes_nothing() {
    let doc = xml_read_str(XINCLUDE).unwrap();
    let res = XmlXPathFind::new()
        .node(doc.root())
        .expression("//undeclared:x")
        .find(&doc)
        .ok();
    assert!(res.is_none());

    let mut out = vec![];
    assert!(!xml_xpath_debug(&doc, res.as_ref(), &mut out));
    assert!(out.is_empty());
}

#[test]
fn xinclude_scenario() {
    let doc = xml_read_str(XINCLUDE).unwrap();
    let res = XmlXPathFind::new()
        .node(doc.root())
        .expression("//xi:include")
        .find(&doc)
        .unwrap();
    let set = res.node_set().unwrap();
    let hrefs = set
        .iter()
        .map(|node| doc.get_prop(node, "href").unwrap())
        .collect::<Vec<_>>();
    assert_eq!(hrefs, ["a.xml", "b.xml", "c.xml"]);
    assert!(
        set.iter()
            .all(|node| doc.qualified_name(node).as_deref() == Some("xi:include"))
    );
}

#[test]
fn find_reports_each_failure_kind() {
    let doc = xml_read_str(XINCLUDE).unwrap();

    let err = XmlXPathFind::new()
        .expression("/")
        .find(&doc)
        .unwrap_err();
    assert_eq!(err, FindError::Query(QueryError::ArityError { given: 1 }));
    assert_eq!(err.to_string(), "wrong number of arguments (1 for 2)");

    let err = XmlXPathFind::new()
        .node(doc.root())
        .expression("/")
        .namespaces(vec![NamespaceSpecItem::Nil])
        .find(&doc)
        .unwrap_err();
    assert_eq!(
        err,
        FindError::Namespace(NormalizationError::UnsupportedElementType { index: 0 })
    );

    // a bare prefix is accepted but never bound
    let err = XmlXPathFind::new()
        .node(doc.root())
        .expression("//p:x")
        .namespaces("p")
        .find(&doc)
        .unwrap_err();
    assert_eq!(
        err,
        FindError::Query(QueryError::EvaluationFailed(
            XmlXPathError::XPathUndefPrefixError
        ))
    );
}

#[test]
fn context_node_scopes_relative_paths() {
    let doc = xml_read_str(XINCLUDE).unwrap();
    let section = element(&doc, "section");
    let res = XmlXPathFind::new()
        .node(section)
        .expression("xi:include/@href")
        .find(&doc)
        .unwrap();
    assert_eq!(res.cast_to_string(&doc), "b.xml");

    let res = XmlXPathFind::new()
        .node(section)
        .expression("count(s:item) + count(../xi:include)")
        .find(&doc)
        .unwrap();
    assert_eq!(res, XmlXPathObject::Number(3.0));
}

#[test]
fn handles_and_pairs_bind_prefixes() {
    let doc = xml_read_str(XINCLUDE).unwrap();
    let root = doc.get_root_element().unwrap();
    let xi = doc.search_ns(root, Some("xi")).unwrap();

    let res = XmlXPathFind::new()
        .node(doc.root())
        .expression("count(//x:include)")
        .namespaces(vec![["x", "http://example.com/xi"]])
        .find(&doc)
        .unwrap();
    assert_eq!(res, XmlXPathObject::Number(3.0));

    let res = XmlXPathFind::new()
        .node(doc.root())
        .expression("count(//xi:include)")
        .namespaces(xi)
        .find(&doc)
        .unwrap();
    assert_eq!(res, XmlXPathObject::Number(3.0));
}
