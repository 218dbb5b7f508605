//! Fixture-driven query suite.
//!
//! Every `tests/data/NAME.xml` is paired with `tests/data/NAME.queries`. Each non-empty line
//! of a `.queries` file is either a comment (`#`), a namespace binding (`ns PREFIX:URI`)
//! applied to the following queries, or a query:
//!
//! ```text
//! count(//item) ==> number 3
//! //item[1]/@id ==> nodeset 1
//! string(//item[2]) ==> string second
//! //bad:tag ==> error
//! ```

use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};

use glob::glob;
use xpfind::{
    parser::xml_read_file,
    tree::XmlDoc,
    xpath::{XmlXPathFind, XmlXPathObject, xml_xpath_cast_string_to_number},
};

#[derive(Debug)]
enum Expected {
    NodeSet(usize),
    Boolean(bool),
    Number(f64),
    String(String),
    Error,
}

impl Expected {
    fn parse(s: &str) -> Option<Self> {
        let (kind, value) = s.split_once(' ').unwrap_or((s, ""));
        match kind {
            "nodeset" => value.parse().ok().map(Self::NodeSet),
            "boolean" => value.parse().ok().map(Self::Boolean),
            "number" => Some(Self::Number(xml_xpath_cast_string_to_number(value))),
            "string" => Some(Self::String(value.to_owned())),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    fn matches(&self, doc: &XmlDoc, res: Option<&XmlXPathObject>) -> bool {
        match (self, res) {
            (Self::Error, res) => res.is_none(),
            (_, None) => false,
            (Self::NodeSet(len), Some(res)) => res.node_set().map(|set| set.len()) == Some(*len),
            (Self::Boolean(b), Some(res)) => *res == XmlXPathObject::Boolean(*b),
            (Self::Number(n), Some(XmlXPathObject::Number(got))) => {
                (n.is_nan() && got.is_nan()) || n == got
            }
            (Self::Number(_), Some(_)) => false,
            (Self::String(s), Some(res)) => {
                matches!(res, XmlXPathObject::String(_)) && res.cast_to_string(doc) == *s
            }
        }
    }
}

fn run_queries(xml: &Path, queries: &Path) -> (usize, Vec<String>) {
    let doc = match xml_read_file(xml, None) {
        Ok(doc) => doc,
        Err(err) => return (0, vec![format!("{}: {err}", xml.display())]),
    };
    let script = match read_to_string(queries) {
        Ok(script) => script,
        Err(err) => return (0, vec![format!("{}: {err}", queries.display())]),
    };

    let mut namespaces = vec![];
    let mut tests = 0;
    let mut failures = vec![];
    for (lineno, line) in script.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(binding) = line.strip_prefix("ns ") {
            namespaces.push(binding.trim().to_owned());
            continue;
        }
        let location = format!("{}:{}", queries.display(), lineno + 1);
        let Some((expr, expected)) = line.split_once("==>") else {
            failures.push(format!("{location}: missing '==>'"));
            continue;
        };
        let Some(expected) = Expected::parse(expected.trim()) else {
            failures.push(format!("{location}: bad expectation '{}'", expected.trim()));
            continue;
        };

        tests += 1;
        let res = XmlXPathFind::new()
            .node(doc.root())
            .expression(expr.trim())
            .namespaces(namespaces.iter().map(String::as_str).collect::<Vec<_>>())
            .find(&doc);
        if !expected.matches(&doc, res.as_ref().ok()) {
            failures.push(format!(
                "{location}: '{}' expected {expected:?}, got {res:?}",
                expr.trim()
            ));
        }
    }
    (tests, failures)
}

#[test]
fn main() {
    let data = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data");
    let pattern = data.join("*.xml");
    let mut tests = 0;
    let mut failures = vec![];
    for xml in glob(&pattern.to_string_lossy())
        .unwrap()
        .filter_map(Result::ok)
    {
        let queries = xml.with_extension("queries");
        if !queries.is_file() {
            continue;
        }
        let (n, mut errs) = run_queries(&xml, &queries);
        tests += n;
        failures.append(&mut errs);
    }

    for failure in &failures {
        eprintln!("{failure}");
    }
    println!("Total {} tests, {} errors", tests, failures.len());
    assert!(tests > 0, "no fixtures found under {}", data.display());
    assert!(failures.is_empty());
}
