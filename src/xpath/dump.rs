//! The diagnostic inspector: debug dumps of XPath objects and compiled expressions.
//!
//! The dumpers exist only with the `libxml_debug` feature. [`xml_xpath_debug`] is always
//! available and degrades to an advisory without it.

use std::io::Write;

use crate::tree::XmlDoc;

use super::XmlXPathObject;

#[cfg(feature = "libxml_debug")]
pub use self::debug::*;

/// Dump `obj` to `output` and report whether anything was written.
///
/// Without an object nothing is written and `false` is returned. Without the
/// `libxml_debug` feature the sink is left untouched, an advisory goes to the generic
/// error channel and `false` is returned.
pub fn xml_xpath_debug(
    doc: &XmlDoc,
    obj: Option<&XmlXPathObject>,
    output: &mut impl Write,
) -> bool {
    #[cfg(feature = "libxml_debug")]
    {
        let Some(obj) = obj else {
            return false;
        };
        xml_xpath_debug_dump_object(output, doc, Some(obj), 0);
        true
    }
    #[cfg(not(feature = "libxml_debug"))]
    {
        let _ = (doc, obj, output);
        crate::generic_error!("xpfind was compiled without debug support\n");
        false
    }
}

#[cfg(feature = "libxml_debug")]
mod debug {
    use std::io::Write;

    use crate::{
        debug_xml::{
            xml_debug_dump_attr, xml_debug_dump_node_list, xml_debug_dump_one_node,
            xml_debug_dump_string,
        },
        tree::{XmlDoc, XmlElementType, XmlNodeId},
        xpath::{
            XmlNodeSet, XmlXPathAxisVal, XmlXPathCompExpr, XmlXPathObject, XmlXPathOp,
            XmlXPathTestVal, XmlXPathTypeVal, xml_xpath_is_inf, xml_xpath_is_nan,
        },
    };

    fn shift(depth: usize) -> String {
        "  ".repeat(depth.min(25))
    }

    fn xml_xpath_debug_dump_node(
        output: &mut impl Write,
        doc: &XmlDoc,
        cur: Option<XmlNodeId>,
        depth: usize,
    ) {
        let Some(cur) = cur else {
            writeln!(output, "{}Node is NULL !", shift(depth)).ok();
            return;
        };

        match doc.element_type(cur) {
            XmlElementType::XmlDocumentNode => {
                writeln!(output, "{} /", shift(depth)).ok();
            }
            XmlElementType::XmlAttributeNode => xml_debug_dump_attr(output, doc, cur, depth),
            _ => xml_debug_dump_one_node(output, doc, cur, depth),
        }
    }

    fn xml_xpath_debug_dump_node_set(
        output: &mut impl Write,
        doc: &XmlDoc,
        cur: &XmlNodeSet,
        depth: usize,
    ) {
        writeln!(output, "Set contains {} nodes:", cur.len()).ok();
        for (i, node) in cur.iter().enumerate() {
            write!(output, "{}{}", shift(depth), i + 1).ok();
            xml_xpath_debug_dump_node(output, doc, Some(node), depth + 1);
        }
    }

    fn xml_xpath_debug_dump_value_tree(
        output: &mut impl Write,
        doc: &XmlDoc,
        cur: &XmlNodeSet,
        depth: usize,
    ) {
        let Some(root) = cur.get(0) else {
            writeln!(output, "{}Value Tree is NULL !", shift(depth)).ok();
            return;
        };
        write!(output, "{}{}", shift(depth), depth.min(25) + 1).ok();
        xml_debug_dump_node_list(output, doc, doc.children(root), depth + 1);
    }

    fn xml_xpath_debug_dump_location_set(
        output: &mut impl Write,
        doc: &XmlDoc,
        locs: &[XmlXPathObject],
        depth: usize,
    ) {
        for (i, loc) in locs.iter().enumerate() {
            write!(output, "{}{} : ", shift(depth), i + 1).ok();
            xml_xpath_debug_dump_object(output, doc, Some(loc), depth + 1);
        }
    }

    fn write_index(output: &mut impl Write, index: i32) {
        if index >= 0 {
            write!(output, "index {index} in ").ok();
        }
    }

    /// Dump the content of the object for debugging purposes
    #[doc(alias = "xmlXPathDebugDumpObject")]
    pub fn xml_xpath_debug_dump_object(
        output: &mut impl Write,
        doc: &XmlDoc,
        cur: Option<&XmlXPathObject>,
        depth: usize,
    ) {
        let shift = shift(depth);
        write!(output, "{shift}").ok();

        let Some(cur) = cur else {
            writeln!(output, "Object is empty (NULL)").ok();
            return;
        };
        match cur {
            XmlXPathObject::Undefined => {
                writeln!(output, "Object is uninitialized").ok();
            }
            XmlXPathObject::NodeSet(set) => {
                writeln!(output, "Object is a Node Set :").ok();
                xml_xpath_debug_dump_node_set(output, doc, set, depth);
            }
            XmlXPathObject::XSLTTree(set) => {
                writeln!(output, "Object is an XSLT value tree :").ok();
                xml_xpath_debug_dump_value_tree(output, doc, set, depth);
            }
            XmlXPathObject::Boolean(b) => {
                writeln!(output, "Object is a Boolean : {b}").ok();
            }
            &XmlXPathObject::Number(n) => match xml_xpath_is_inf(n) {
                1 => {
                    writeln!(output, "Object is a number : Infinity").ok();
                }
                -1 => {
                    writeln!(output, "Object is a number : -Infinity").ok();
                }
                _ if xml_xpath_is_nan(n) => {
                    writeln!(output, "Object is a number : NaN").ok();
                }
                // Omit sign for negative zero.
                _ if n == 0.0 => {
                    writeln!(output, "Object is a number : 0").ok();
                }
                _ => {
                    writeln!(output, "Object is a number : {n}").ok();
                }
            },
            XmlXPathObject::String(s) => {
                write!(output, "Object is a string : ").ok();
                xml_debug_dump_string(output, Some(s));
                writeln!(output).ok();
            }
            &XmlXPathObject::Point { node, index } => {
                write!(output, "Object is a point : index {index} in node").ok();
                xml_xpath_debug_dump_node(output, doc, Some(node), depth + 1);
                writeln!(output).ok();
            }
            &XmlXPathObject::Range {
                start,
                start_index,
                end,
                end_index,
            } => {
                if end.is_none_or(|end| end == start && start_index == end_index) {
                    writeln!(output, "Object is a collapsed range :").ok();
                    write!(output, "{shift}").ok();
                    write_index(output, start_index);
                    writeln!(output, "node").ok();
                    xml_xpath_debug_dump_node(output, doc, Some(start), depth + 1);
                } else {
                    writeln!(output, "Object is a range :").ok();
                    write!(output, "{shift}From ").ok();
                    write_index(output, start_index);
                    writeln!(output, "node").ok();
                    xml_xpath_debug_dump_node(output, doc, Some(start), depth + 1);
                    write!(output, "{shift}To ").ok();
                    write_index(output, end_index);
                    writeln!(output, "node").ok();
                    xml_xpath_debug_dump_node(output, doc, end, depth + 1);
                    writeln!(output).ok();
                }
            }
            XmlXPathObject::LocationSet(locs) => {
                writeln!(output, "Object is a Location Set:").ok();
                xml_xpath_debug_dump_location_set(output, doc, locs, depth);
            }
            XmlXPathObject::Users(_) => {
                writeln!(output, "Object is user defined").ok();
            }
        }
    }

    fn axis_name(axis: XmlXPathAxisVal) -> &'static str {
        match axis {
            XmlXPathAxisVal::AxisAncestor => "ancestors",
            XmlXPathAxisVal::AxisAncestorOrSelf => "ancestors-or-self",
            XmlXPathAxisVal::AxisAttribute => "attributes",
            XmlXPathAxisVal::AxisChild => "child",
            XmlXPathAxisVal::AxisDescendant => "descendant",
            XmlXPathAxisVal::AxisDescendantOrSelf => "descendant-or-self",
            XmlXPathAxisVal::AxisFollowing => "following",
            XmlXPathAxisVal::AxisFollowingSibling => "following-siblings",
            XmlXPathAxisVal::AxisNamespace => "namespace",
            XmlXPathAxisVal::AxisParent => "parent",
            XmlXPathAxisVal::AxisPreceding => "preceding",
            XmlXPathAxisVal::AxisPrecedingSibling => "preceding-sibling",
            XmlXPathAxisVal::AxisSelf => "self",
        }
    }

    fn test_name(test: XmlXPathTestVal) -> &'static str {
        match test {
            XmlXPathTestVal::NodeTestNone => "none",
            XmlXPathTestVal::NodeTestType => "type",
            XmlXPathTestVal::NodeTestPI => "PI",
            XmlXPathTestVal::NodeTestAll => "all",
            XmlXPathTestVal::NodeTestNs => "namespace",
            XmlXPathTestVal::NodeTestName => "name",
        }
    }

    fn type_name(typ: XmlXPathTypeVal) -> &'static str {
        match typ {
            XmlXPathTypeVal::NodeTypeNode => "node",
            XmlXPathTypeVal::NodeTypeComment => "comment",
            XmlXPathTypeVal::NodeTypeText => "text",
            XmlXPathTypeVal::NodeTypePI => "PI",
        }
    }

    fn xml_xpath_debug_dump_step_op(
        output: &mut impl Write,
        doc: &XmlDoc,
        comp: &XmlXPathCompExpr,
        op: usize,
        depth: usize,
    ) {
        write!(output, "{}", shift(depth)).ok();
        let Some(step) = comp.steps().get(op) else {
            writeln!(output, "Step is NULL").ok();
            return;
        };
        let value4 = step.value4.as_ref().and_then(|val| val.as_str());
        let value5 = step.value5.as_ref().and_then(|val| val.as_str());
        match step.op {
            XmlXPathOp::XPathOpEnd => {
                write!(output, "END").ok();
            }
            XmlXPathOp::XPathOpAnd => {
                write!(output, "AND").ok();
            }
            XmlXPathOp::XPathOpOr => {
                write!(output, "OR").ok();
            }
            XmlXPathOp::XPathOpEqual => {
                let op = if step.value != 0 { "=" } else { "!=" };
                write!(output, "EQUAL {op}").ok();
            }
            XmlXPathOp::XPathOpCmp => {
                let op = if step.value != 0 { "<" } else { ">" };
                let eq = if step.value2 == 0 { "=" } else { "" };
                write!(output, "CMP {op}{eq}").ok();
            }
            XmlXPathOp::XPathOpPlus => {
                let op = match step.value {
                    0 => "-",
                    1 => "+",
                    2 => "unary -",
                    _ => "unary - -",
                };
                write!(output, "PLUS {op}").ok();
            }
            XmlXPathOp::XPathOpMult => {
                let op = match step.value {
                    0 => "*",
                    1 => "div",
                    _ => "mod",
                };
                write!(output, "MULT {op}").ok();
            }
            XmlXPathOp::XPathOpUnion => {
                write!(output, "UNION").ok();
            }
            XmlXPathOp::XPathOpRoot => {
                write!(output, "ROOT").ok();
            }
            XmlXPathOp::XPathOpNode => {
                write!(output, "NODE").ok();
            }
            XmlXPathOp::XPathOpSort => {
                write!(output, "SORT").ok();
            }
            XmlXPathOp::XPathOpCollect => {
                write!(output, "COLLECT ").ok();
                if let Ok(axis) = XmlXPathAxisVal::try_from(step.value) {
                    write!(output, " '{}' ", axis_name(axis)).ok();
                }
                if let Ok(test) = XmlXPathTestVal::try_from(step.value2) {
                    write!(output, "'{}' ", test_name(test)).ok();
                }
                if let Ok(typ) = XmlXPathTypeVal::try_from(step.value3) {
                    write!(output, "'{}' ", type_name(typ)).ok();
                }
                if let Some(prefix) = value4 {
                    write!(output, "{prefix}:").ok();
                }
                if let Some(name) = value5 {
                    write!(output, "{name}").ok();
                }
            }
            XmlXPathOp::XPathOpValue => {
                let object = step.value4.as_ref().and_then(|val| val.as_object());
                write!(output, "ELEM ").ok();
                xml_xpath_debug_dump_object(output, doc, object, 0);
                dump_children(output, doc, comp, step.ch1, step.ch2, depth);
                return;
            }
            XmlXPathOp::XPathOpVariable | XmlXPathOp::XPathOpFunction => {
                let kind = if step.op == XmlXPathOp::XPathOpVariable {
                    "VARIABLE"
                } else {
                    "FUNCTION"
                };
                write!(output, "{kind} ").ok();
                if let Some(prefix) = value5 {
                    write!(output, "{prefix}:").ok();
                }
                write!(output, "{}", value4.unwrap_or_default()).ok();
                if step.op == XmlXPathOp::XPathOpFunction {
                    write!(output, "({} args)", step.value).ok();
                }
            }
            XmlXPathOp::XPathOpArg => {
                write!(output, "ARG").ok();
            }
            XmlXPathOp::XPathOpPredicate => {
                write!(output, "PREDICATE").ok();
            }
            XmlXPathOp::XPathOpFilter => {
                write!(output, "FILTER").ok();
            }
        }
        writeln!(output).ok();
        dump_children(output, doc, comp, step.ch1, step.ch2, depth);
    }

    fn dump_children(
        output: &mut impl Write,
        doc: &XmlDoc,
        comp: &XmlXPathCompExpr,
        ch1: Option<usize>,
        ch2: Option<usize>,
        depth: usize,
    ) {
        for ch in [ch1, ch2].into_iter().flatten() {
            xml_xpath_debug_dump_step_op(output, doc, comp, ch, depth + 1);
        }
    }

    /// Dumps the tree of the compiled XPath expression.
    #[doc(alias = "xmlXPathDebugDumpCompExpr")]
    pub fn xml_xpath_debug_dump_comp_expr(
        output: &mut impl Write,
        doc: &XmlDoc,
        comp: &XmlXPathCompExpr,
        depth: usize,
    ) {
        writeln!(
            output,
            "{}Compiled Expression : {} elements",
            shift(depth),
            comp.steps().len()
        )
        .ok();
        if let Some(last) = comp.last() {
            xml_xpath_debug_dump_step_op(output, doc, comp, last, depth + 1);
        }
    }
}
