use std::collections::HashSet;

use crate::{
    generic_error,
    tree::{XmlDoc, XmlElementType, XmlNodeId},
};

use super::{
    XPATH_MAX_RECURSION_DEPTH, XmlNodeSet, XmlXPathAxisVal, XmlXPathCompExpr, XmlXPathContext,
    XmlXPathError, XmlXPathObject, XmlXPathObjectType, XmlXPathOp, XmlXPathParserContext,
    XmlXPathStepOp, XmlXPathTestVal, XmlXPathTypeVal, xml_xpath_cast_boolean_to_number,
    xml_xpath_cast_string_to_number, xml_xpath_compile, xml_xpath_err,
};

/// Evaluate the Precompiled XPath expression in the given context.
///
/// Errors are reported on the generic error channel before being returned.
#[doc(alias = "xmlXPathCompiledEval")]
pub fn xml_xpath_compiled_eval(
    comp: &XmlXPathCompExpr,
    ctxt: &mut XmlXPathContext,
) -> Result<XmlXPathObject, XmlXPathError> {
    let mut pctxt = XmlXPathParserContext::new(comp, ctxt);
    let res = pctxt.run_evaluate();
    if let Err(code) = res {
        xml_xpath_err(comp.expr(), None, code);
    }
    res
}

/// Evaluate the XPath Location Path in the given context.
#[doc(alias = "xmlXPathEval")]
pub fn xml_xpath_eval(
    expr: &str,
    ctxt: &mut XmlXPathContext,
) -> Result<XmlXPathObject, XmlXPathError> {
    let comp = xml_xpath_compile(expr)?;
    xml_xpath_compiled_eval(&comp, ctxt)
}

impl XmlXPathParserContext<'_, '_> {
    /// Evaluate the whole compiled expression and return its value.
    ///
    /// The context node, size and position of the context are restored afterwards.
    #[doc(alias = "xmlXPathRunEval")]
    pub(crate) fn run_evaluate(&mut self) -> Result<XmlXPathObject, XmlXPathError> {
        let last = self.comp.last.ok_or(XmlXPathError::XPathInvalidOperand)?;
        let saved = (
            self.context.node,
            self.context.context_size,
            self.context.proximity_position,
        );
        self.context.depth = 0;

        let res = self
            .evaluate_precompiled_operation(last)
            .and_then(|_| self.value_pop());

        (
            self.context.node,
            self.context.context_size,
            self.context.proximity_position,
        ) = saved;
        if res.is_ok() && !self.value_tab.is_empty() {
            generic_error!(
                "xmlXPathCompiledEval: {} object(s) left on the stack.\n",
                self.value_tab.len()
            );
            self.value_tab.clear();
        }
        res
    }

    fn evaluate_child(&mut self, ch: Option<usize>) -> Result<(), XmlXPathError> {
        let ch = ch.ok_or(XmlXPathError::XPathInvalidOperand)?;
        self.evaluate_precompiled_operation(ch)
    }

    /// Evaluate the Precompiled XPath operation and push its value on the stack.
    #[doc(alias = "xmlXPathCompOpEval")]
    pub(crate) fn evaluate_precompiled_operation(&mut self, op: usize) -> Result<(), XmlXPathError> {
        if self.context.depth >= XPATH_MAX_RECURSION_DEPTH {
            return Err(XmlXPathError::XPathRecursionLimitExceeded);
        }
        self.context.depth += 1;
        let res = self.evaluate_operation(op);
        self.context.depth -= 1;
        res
    }

    fn evaluate_operation(&mut self, op: usize) -> Result<(), XmlXPathError> {
        let comp = self.comp;
        let step = comp
            .steps
            .get(op)
            .ok_or(XmlXPathError::XPathInvalidOperand)?;

        // This frame is on the stack once per nesting level. Keep temporaries in the helpers.
        match step.op {
            XmlXPathOp::XPathOpEnd => Ok(()),
            XmlXPathOp::XPathOpAnd | XmlXPathOp::XPathOpOr => self.evaluate_logical(step),
            XmlXPathOp::XPathOpEqual | XmlXPathOp::XPathOpCmp => self.evaluate_comparison(step),
            XmlXPathOp::XPathOpPlus | XmlXPathOp::XPathOpMult => self.evaluate_arithmetic(step),
            XmlXPathOp::XPathOpUnion => self.evaluate_union(step),
            XmlXPathOp::XPathOpRoot => {
                let root = self.context.doc.root();
                self.value_push(XmlNodeSet::with_value(root).into())
            }
            XmlXPathOp::XPathOpNode => {
                self.value_push(XmlNodeSet::with_value(self.context.node).into())
            }
            XmlXPathOp::XPathOpCollect => self.evaluate_collect(step),
            XmlXPathOp::XPathOpValue => self.evaluate_value(step),
            XmlXPathOp::XPathOpVariable => self.evaluate_variable(step),
            XmlXPathOp::XPathOpFunction => self.evaluate_function(step),
            XmlXPathOp::XPathOpArg => {
                if step.ch1.is_some() {
                    self.evaluate_child(step.ch1)?;
                }
                self.evaluate_child(step.ch2)
            }
            XmlXPathOp::XPathOpFilter => self.evaluate_filter(step),
            // Predicates are only reached through the step they belong to.
            XmlXPathOp::XPathOpPredicate => Err(XmlXPathError::XPathInvalidOperand),
            XmlXPathOp::XPathOpSort => {
                self.evaluate_child(step.ch1)?;
                let doc = self.context.doc;
                if let Some(XmlXPathObject::NodeSet(set)) = self.value_tab.last_mut() {
                    set.sort(doc);
                }
                Ok(())
            }
        }
    }

    #[inline(never)]
    fn evaluate_logical(&mut self, step: &XmlXPathStepOp) -> Result<(), XmlXPathError> {
        // `or` stops at the first true operand, `and` at the first false one.
        let shortcut = step.op == XmlXPathOp::XPathOpOr;
        self.evaluate_child(step.ch1)?;
        if self.pop_boolean()? == shortcut {
            return self.value_push(shortcut.into());
        }
        self.evaluate_child(step.ch2)?;
        let res = self.pop_boolean()?;
        self.value_push(res.into())
    }

    #[inline(never)]
    fn evaluate_comparison(&mut self, step: &XmlXPathStepOp) -> Result<(), XmlXPathError> {
        self.evaluate_child(step.ch1)?;
        self.evaluate_child(step.ch2)?;
        let arg2 = self.value_pop()?;
        let arg1 = self.value_pop()?;
        let doc = self.context.doc;
        let res = if step.op == XmlXPathOp::XPathOpEqual {
            xml_xpath_equal_values(doc, &arg1, &arg2, step.value == 0)
        } else {
            xml_xpath_compare_values(doc, step.value != 0, step.value2 != 0, &arg1, &arg2)
        };
        self.value_push(res.into())
    }

    #[inline(never)]
    fn evaluate_arithmetic(&mut self, step: &XmlXPathStepOp) -> Result<(), XmlXPathError> {
        self.evaluate_child(step.ch1)?;
        if step.ch2.is_some() {
            self.evaluate_child(step.ch2)?;
        }
        let res = match (step.op, step.value) {
            (XmlXPathOp::XPathOpPlus, 2) => -self.pop_number()?,
            (XmlXPathOp::XPathOpPlus, 3) => self.pop_number()?,
            (op, value) => {
                let val = self.pop_number()?;
                let arg = self.pop_number()?;
                match (op, value) {
                    (XmlXPathOp::XPathOpPlus, 0) => arg - val,
                    (XmlXPathOp::XPathOpPlus, 1) => arg + val,
                    (XmlXPathOp::XPathOpMult, 0) => arg * val,
                    (XmlXPathOp::XPathOpMult, 1) => arg / val,
                    (XmlXPathOp::XPathOpMult, 2) => arg % val,
                    _ => return Err(XmlXPathError::XPathInvalidOperand),
                }
            }
        };
        self.value_push(res.into())
    }

    #[inline(never)]
    fn evaluate_union(&mut self, step: &XmlXPathStepOp) -> Result<(), XmlXPathError> {
        self.evaluate_child(step.ch1)?;
        self.evaluate_child(step.ch2)?;
        let arg2 = self.pop_node_set()?;
        let mut arg1 = self.pop_node_set()?;
        arg1.merge(&arg2);
        arg1.sort(self.context.doc);
        self.value_push(arg1.into())
    }

    #[inline(never)]
    fn evaluate_collect(&mut self, step: &XmlXPathStepOp) -> Result<(), XmlXPathError> {
        self.evaluate_child(step.ch1)?;
        let input = self.pop_node_set()?;
        let res = self.node_collect_and_test(step, &input)?;
        self.value_push(res.into())
    }

    #[inline(never)]
    fn evaluate_value(&mut self, step: &XmlXPathStepOp) -> Result<(), XmlXPathError> {
        let value = step
            .value4
            .as_ref()
            .and_then(|value| value.as_object())
            .ok_or(XmlXPathError::XPathInvalidOperand)?;
        self.value_push(value.clone())
    }

    #[inline(never)]
    fn evaluate_variable(&mut self, step: &XmlXPathStepOp) -> Result<(), XmlXPathError> {
        let name = step
            .value4
            .as_ref()
            .and_then(|name| name.as_str())
            .ok_or(XmlXPathError::XPathInvalidOperand)?;
        let ns_uri = self.resolve_prefix(step.value5.as_ref().and_then(|p| p.as_str()))?;
        let value = self
            .context
            .lookup_variable_ns(name, ns_uri.as_deref())
            .cloned()
            .ok_or(XmlXPathError::XPathUndefVariableError)?;
        self.value_push(value)
    }

    #[inline(never)]
    fn evaluate_function(&mut self, step: &XmlXPathStepOp) -> Result<(), XmlXPathError> {
        let frame = self.value_tab.len();
        let nargs =
            usize::try_from(step.value).map_err(|_| XmlXPathError::XPathInvalidOperand)?;
        if step.ch1.is_some() {
            self.evaluate_child(step.ch1)?;
        }
        if self.value_tab.len() != frame + nargs {
            return Err(XmlXPathError::XPathStackError);
        }

        let name = step
            .value4
            .as_ref()
            .and_then(|name| name.as_str())
            .ok_or(XmlXPathError::XPathInvalidOperand)?;
        let ns_uri = self.resolve_prefix(step.value5.as_ref().and_then(|p| p.as_str()))?;
        let func = self
            .context
            .lookup_function_ns(name, ns_uri.as_deref())
            .ok_or(XmlXPathError::XPathUnknownFuncError)?;
        func(self, nargs)?;
        if self.value_tab.len() != frame + 1 {
            return Err(XmlXPathError::XPathStackError);
        }
        Ok(())
    }

    #[inline(never)]
    fn evaluate_filter(&mut self, step: &XmlXPathStepOp) -> Result<(), XmlXPathError> {
        self.evaluate_child(step.ch1)?;
        let mut set = self.pop_node_set()?;
        set.sort(self.context.doc);
        let nodes = match step.ch2 {
            Some(expr) => self.filter_nodes(set.node_tab, expr)?,
            None => set.node_tab,
        };
        self.value_push(XmlNodeSet { node_tab: nodes }.into())
    }

    /// Resolve a prefix used in the expression through the namespace table of the context.
    fn resolve_prefix(&self, prefix: Option<&str>) -> Result<Option<String>, XmlXPathError> {
        match prefix {
            Some(prefix) => self
                .context
                .lookup_ns(prefix)
                .map(|uri| Some(uri.to_owned()))
                .ok_or(XmlXPathError::XPathUndefPrefixError),
            None => Ok(None),
        }
    }

    /// Walk `axis` from every node of `input`, keep the nodes passing the node test and the
    /// predicates of `step`, and return the union in document order.
    #[doc(alias = "xmlXPathNodeCollectAndTest")]
    fn node_collect_and_test(
        &mut self,
        step: &XmlXPathStepOp,
        input: &XmlNodeSet,
    ) -> Result<XmlNodeSet, XmlXPathError> {
        let invalid = |_| XmlXPathError::XPathInvalidOperand;
        let axis = XmlXPathAxisVal::try_from(step.value).map_err(invalid)?;
        let test = XmlXPathTestVal::try_from(step.value2).map_err(invalid)?;
        let typ = XmlXPathTypeVal::try_from(step.value3).map_err(invalid)?;
        let name = step.value5.as_ref().and_then(|name| name.as_str());
        let ns_uri = self.resolve_prefix(step.value4.as_ref().and_then(|p| p.as_str()))?;
        if axis == XmlXPathAxisVal::AxisNamespace {
            return Err(XmlXPathError::XPathUnsupportedAxis);
        }

        let doc = self.context.doc;
        let mut seen = HashSet::new();
        let mut out = vec![];
        for node in input.iter() {
            let matched = xml_xpath_axis_nodes(doc, node, axis)
                .into_iter()
                .filter(|&cur| {
                    xml_xpath_node_test(doc, cur, axis, test, typ, ns_uri.as_deref(), name)
                })
                .collect::<Vec<_>>();
            let matched = match step.ch2 {
                Some(predicate) => self.apply_predicates(predicate, matched)?,
                None => matched,
            };
            out.extend(matched.into_iter().filter(|&cur| seen.insert(cur)));
        }

        let mut res = XmlNodeSet { node_tab: out };
        res.sort(doc);
        Ok(res)
    }

    /// Apply a chain of step predicates, oldest first.
    fn apply_predicates(
        &mut self,
        predicate: usize,
        mut nodes: Vec<XmlNodeId>,
    ) -> Result<Vec<XmlNodeId>, XmlXPathError> {
        let comp = self.comp;
        let mut chain = vec![];
        let mut cur = Some(predicate);
        while let Some(index) = cur {
            let step = comp
                .steps
                .get(index)
                .ok_or(XmlXPathError::XPathInvalidOperand)?;
            chain.push(step.ch2);
            cur = step.ch1;
        }
        for expr in chain.into_iter().rev().flatten() {
            nodes = self.filter_nodes(nodes, expr)?;
        }
        Ok(nodes)
    }

    /// Keep the nodes for which the predicate expression `expr` holds.
    ///
    /// Positions follow the order of `nodes`.
    #[doc(alias = "xmlXPathNodeSetFilter")]
    fn filter_nodes(
        &mut self,
        nodes: Vec<XmlNodeId>,
        expr: usize,
    ) -> Result<Vec<XmlNodeId>, XmlXPathError> {
        let saved = (
            self.context.node,
            self.context.context_size,
            self.context.proximity_position,
        );
        let size = nodes.len();
        let mut kept = vec![];
        let mut res = Ok(());
        for (i, node) in nodes.into_iter().enumerate() {
            self.context.node = node;
            self.context.context_size = size;
            self.context.proximity_position = i + 1;
            match self.evaluate_predicate_result(expr, i + 1) {
                Ok(true) => kept.push(node),
                Ok(false) => {}
                Err(err) => {
                    res = Err(err);
                    break;
                }
            }
        }
        (
            self.context.node,
            self.context.context_size,
            self.context.proximity_position,
        ) = saved;
        res.map(|_| kept)
    }

    /// Evaluate a predicate result for the current node.
    /// A number is true iff it equals the proximity position.
    #[doc(alias = "xmlXPathEvaluatePredicateResult")]
    fn evaluate_predicate_result(
        &mut self,
        expr: usize,
        position: usize,
    ) -> Result<bool, XmlXPathError> {
        self.evaluate_precompiled_operation(expr)?;
        match self.value_pop()? {
            XmlXPathObject::Number(number) => Ok(number == position as f64),
            res => Ok(res.cast_to_boolean()),
        }
    }
}

/// The nodes reachable from `node` along `axis`, in axis order.
///
/// Reverse axes list the nearest node first. The namespace axis is empty.
pub(crate) fn xml_xpath_axis_nodes(
    doc: &XmlDoc,
    node: XmlNodeId,
    axis: XmlXPathAxisVal,
) -> Vec<XmlNodeId> {
    let is_attribute = doc.element_type(node) == XmlElementType::XmlAttributeNode;
    let ancestors = || std::iter::successors(doc.parent(node), |&cur| doc.parent(cur));
    match axis {
        XmlXPathAxisVal::AxisChild => doc.child_nodes(node).collect(),
        XmlXPathAxisVal::AxisDescendant => doc.descendants(node).collect(),
        XmlXPathAxisVal::AxisDescendantOrSelf => std::iter::once(node)
            .chain(doc.descendants(node))
            .collect(),
        XmlXPathAxisVal::AxisParent => doc.parent(node).into_iter().collect(),
        XmlXPathAxisVal::AxisAncestor => ancestors().collect(),
        XmlXPathAxisVal::AxisAncestorOrSelf => std::iter::once(node).chain(ancestors()).collect(),
        XmlXPathAxisVal::AxisSelf => vec![node],
        XmlXPathAxisVal::AxisAttribute => {
            if doc.element_type(node) == XmlElementType::XmlElementNode {
                doc.properties(node).to_vec()
            } else {
                vec![]
            }
        }
        XmlXPathAxisVal::AxisFollowingSibling if is_attribute => vec![],
        XmlXPathAxisVal::AxisFollowingSibling => {
            std::iter::successors(doc.next_sibling(node), |&cur| doc.next_sibling(cur)).collect()
        }
        XmlXPathAxisVal::AxisPrecedingSibling if is_attribute => vec![],
        XmlXPathAxisVal::AxisPrecedingSibling => {
            std::iter::successors(doc.prev_sibling(node), |&cur| doc.prev_sibling(cur)).collect()
        }
        XmlXPathAxisVal::AxisFollowing => {
            let mut res = vec![];
            let mut cur = Some(node);
            if is_attribute {
                // The content of the owner element follows its attributes.
                cur = doc.parent(node);
                res.extend(cur.into_iter().flat_map(|parent| doc.descendants(parent)));
            }
            while let Some(now) = cur {
                let mut sibling = doc.next_sibling(now);
                while let Some(next) = sibling {
                    res.push(next);
                    res.extend(doc.descendants(next));
                    sibling = doc.next_sibling(next);
                }
                cur = doc.parent(now);
            }
            res
        }
        XmlXPathAxisVal::AxisPreceding => {
            let mut res = vec![];
            let mut cur = if is_attribute { doc.parent(node) } else { Some(node) };
            while let Some(now) = cur {
                let mut sibling = doc.prev_sibling(now);
                while let Some(prev) = sibling {
                    let mut subtree = std::iter::once(prev)
                        .chain(doc.descendants(prev))
                        .collect::<Vec<_>>();
                    subtree.reverse();
                    res.extend(subtree);
                    sibling = doc.prev_sibling(prev);
                }
                cur = doc.parent(now);
            }
            res
        }
        XmlXPathAxisVal::AxisNamespace => vec![],
    }
}

/// Check one node against a node test.
///
/// An unprefixed name only matches nodes without namespace.
pub(crate) fn xml_xpath_node_test(
    doc: &XmlDoc,
    node: XmlNodeId,
    axis: XmlXPathAxisVal,
    test: XmlXPathTestVal,
    typ: XmlXPathTypeVal,
    ns_uri: Option<&str>,
    name: Option<&str>,
) -> bool {
    let node_type = doc.element_type(node);
    let principal = if axis == XmlXPathAxisVal::AxisAttribute {
        XmlElementType::XmlAttributeNode
    } else {
        XmlElementType::XmlElementNode
    };
    let node_uri = || doc.ns(node).map(|ns| doc.get_ns(ns).href());
    match test {
        XmlXPathTestVal::NodeTestNone => false,
        XmlXPathTestVal::NodeTestType => match typ {
            XmlXPathTypeVal::NodeTypeNode => true,
            XmlXPathTypeVal::NodeTypeComment => node_type == XmlElementType::XmlCommentNode,
            XmlXPathTypeVal::NodeTypeText => matches!(
                node_type,
                XmlElementType::XmlTextNode | XmlElementType::XmlCDATASectionNode
            ),
            XmlXPathTypeVal::NodeTypePI => node_type == XmlElementType::XmlPINode,
        },
        XmlXPathTestVal::NodeTestPI => {
            node_type == XmlElementType::XmlPINode && doc.name(node) == name
        }
        XmlXPathTestVal::NodeTestAll => node_type == principal,
        XmlXPathTestVal::NodeTestNs => node_type == principal && node_uri() == ns_uri,
        XmlXPathTestVal::NodeTestName => {
            node_type == principal && doc.name(node) == name && node_uri() == ns_uri
        }
    }
}

fn is_boolean_or_number(obj: &XmlXPathObject) -> (bool, bool) {
    (
        obj.typ() == XmlXPathObjectType::XPathBoolean,
        obj.typ() == XmlXPathObjectType::XPathNumber,
    )
}

/// Implement the equality operation on XPath objects content.
///
/// With `neq`, implement `!=`, which is not the negation of `=` for node-sets.
#[doc(alias = "xmlXPathEqualValues", alias = "xmlXPathNotEqualValues")]
pub(crate) fn xml_xpath_equal_values(
    doc: &XmlDoc,
    arg1: &XmlXPathObject,
    arg2: &XmlXPathObject,
    neq: bool,
) -> bool {
    match (arg1.node_set(), arg2.node_set()) {
        (Some(set1), Some(set2)) => {
            let values2 = set2
                .iter()
                .map(|node| doc.get_content(node))
                .collect::<Vec<_>>();
            set1.iter().any(|node| {
                let value1 = doc.get_content(node);
                values2.iter().any(|value2| (value1 == *value2) != neq)
            })
        }
        (Some(set), None) => xml_xpath_equal_node_set_value(doc, set, arg2, neq),
        (None, Some(set)) => xml_xpath_equal_node_set_value(doc, set, arg1, neq),
        (None, None) => {
            let (bool1, num1) = is_boolean_or_number(arg1);
            let (bool2, num2) = is_boolean_or_number(arg2);
            let eq = if bool1 || bool2 {
                arg1.cast_to_boolean() == arg2.cast_to_boolean()
            } else if num1 || num2 {
                arg1.cast_to_number(doc) == arg2.cast_to_number(doc)
            } else {
                arg1.cast_to_string(doc) == arg2.cast_to_string(doc)
            };
            eq != neq
        }
    }
}

#[doc(alias = "xmlXPathEqualNodeSetFloat", alias = "xmlXPathEqualNodeSetString")]
fn xml_xpath_equal_node_set_value(
    doc: &XmlDoc,
    set: &XmlNodeSet,
    value: &XmlXPathObject,
    neq: bool,
) -> bool {
    match value {
        XmlXPathObject::Boolean(b) => (!set.is_empty() == *b) != neq,
        XmlXPathObject::Number(number) => set.iter().any(|node| {
            (xml_xpath_cast_string_to_number(&doc.get_content(node)) == *number) != neq
        }),
        XmlXPathObject::String(s) => set.iter().any(|node| (doc.get_content(node) == *s) != neq),
        _ => false,
    }
}

fn compare_numbers(inf: bool, strict: bool, lhs: f64, rhs: f64) -> bool {
    match (inf, strict) {
        (true, true) => lhs < rhs,
        (true, false) => lhs <= rhs,
        (false, true) => lhs > rhs,
        (false, false) => lhs >= rhs,
    }
}

/// Implement the compare operation on XPath objects:
/// `arg1 < arg2` (`inf`, `strict`), `arg1 <= arg2` (`inf`), `arg1 > arg2` (`strict`),
/// `arg1 >= arg2`.
#[doc(alias = "xmlXPathCompareValues")]
pub(crate) fn xml_xpath_compare_values(
    doc: &XmlDoc,
    inf: bool,
    strict: bool,
    arg1: &XmlXPathObject,
    arg2: &XmlXPathObject,
) -> bool {
    let numbers = |set: &XmlNodeSet| {
        set.iter()
            .map(|node| xml_xpath_cast_string_to_number(&doc.get_content(node)))
            .collect::<Vec<_>>()
    };
    let scalar = |set: &XmlNodeSet, other: &XmlXPathObject| match other {
        XmlXPathObject::Boolean(b) => (
            vec![xml_xpath_cast_boolean_to_number(!set.is_empty())],
            xml_xpath_cast_boolean_to_number(*b),
        ),
        other => (numbers(set), other.cast_to_number(doc)),
    };
    match (arg1.node_set(), arg2.node_set()) {
        (Some(set1), Some(set2)) => {
            let values2 = numbers(set2);
            numbers(set1).into_iter().any(|value1| {
                values2
                    .iter()
                    .any(|&value2| compare_numbers(inf, strict, value1, value2))
            })
        }
        (Some(set), None) => {
            let (values, other) = scalar(set, arg2);
            values
                .into_iter()
                .any(|value| compare_numbers(inf, strict, value, other))
        }
        (None, Some(set)) => {
            let (values, other) = scalar(set, arg1);
            values
                .into_iter()
                .any(|value| compare_numbers(inf, strict, other, value))
        }
        (None, None) => compare_numbers(
            inf,
            strict,
            arg1.cast_to_number(doc),
            arg2.cast_to_number(doc),
        ),
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::xml_read_str;

    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<root xmlns:p="urn:p"><a id="1">one</a><b><a id="2">two</a><!--c--><?pi data?></b><p:a id="3">3</p:a><a id="4">4</a></root>"#;

    fn eval(doc: &XmlDoc, expr: &str) -> Result<XmlXPathObject, XmlXPathError> {
        let mut ctxt = XmlXPathContext::new(doc);
        ctxt.register_ns("p", Some("urn:p"));
        let comp = XmlXPathCompExpr::parse(expr).map_err(|(code, _)| code)?;
        XmlXPathParserContext::new(&comp, &mut ctxt).run_evaluate()
    }

    fn names(doc: &XmlDoc, obj: &XmlXPathObject) -> Vec<String> {
        obj.node_set()
            .unwrap()
            .iter()
            .map(|node| doc.get_content(node))
            .collect()
    }

    #[test]
    fn location_paths() {
        let doc = xml_read_str(SAMPLE).unwrap();
        assert_eq!(names(&doc, &eval(&doc, "//a").unwrap()), ["one", "two", "4"]);
        assert_eq!(names(&doc, &eval(&doc, "//p:a").unwrap()), ["3"]);
        assert_eq!(names(&doc, &eval(&doc, "/root/*[2]/a").unwrap()), ["two"]);
        assert_eq!(names(&doc, &eval(&doc, "//a[last()]").unwrap()), ["two", "4"]);
        assert_eq!(names(&doc, &eval(&doc, "(//a)[last()]").unwrap()), ["4"]);
        assert_eq!(names(&doc, &eval(&doc, "//@id[. > 2]").unwrap()), ["3", "4"]);
        assert_eq!(names(&doc, &eval(&doc, "//b/comment()").unwrap()), ["c"]);
        assert_eq!(
            names(&doc, &eval(&doc, "//processing-instruction('pi')").unwrap()),
            ["data"]
        );
        assert_eq!(
            names(&doc, &eval(&doc, "//a[@id='2']/ancestor::*").unwrap()),
            ["onetwo34", "two"]
        );
        assert_eq!(
            names(&doc, &eval(&doc, "//b/preceding-sibling::*[1] | //b/following::a").unwrap()),
            ["one", "4"]
        );
        assert!(eval(&doc, "//missing").unwrap().node_set().unwrap().is_empty());
    }

    #[test]
    fn reverse_axis_positions() {
        let doc = xml_read_str(SAMPLE).unwrap();
        assert_eq!(
            names(&doc, &eval(&doc, "//a[@id='4']/preceding::a[1]").unwrap()),
            ["two"]
        );
        assert_eq!(
            names(&doc, &eval(&doc, "//a[@id='4']/preceding-sibling::*[2]").unwrap()),
            ["two"]
        );
    }

    #[test]
    fn scalar_operators() {
        let doc = xml_read_str(SAMPLE).unwrap();
        let number = |expr| eval(&doc, expr).unwrap();
        assert_eq!(number("1 + 2 * 3"), XmlXPathObject::Number(7.0));
        assert_eq!(number("7 mod 3 - -1"), XmlXPathObject::Number(2.0));
        assert_eq!(number("1 div 0"), XmlXPathObject::Number(f64::INFINITY));
        assert_eq!(number("count(//a) = 3"), XmlXPathObject::Boolean(true));
        assert_eq!(number("//a = 'two'"), XmlXPathObject::Boolean(true));
        assert_eq!(number("//a != 'two'"), XmlXPathObject::Boolean(true));
        assert_eq!(number("//missing != 'two'"), XmlXPathObject::Boolean(false));
        assert_eq!(number("//@id >= 4"), XmlXPathObject::Boolean(true));
        assert_eq!(number("//@id > 4"), XmlXPathObject::Boolean(false));
        assert_eq!(number("//missing = false()"), XmlXPathObject::Boolean(true));
        assert_eq!(number("'a' = 'a' and 1 < 2 or 0"), XmlXPathObject::Boolean(true));
    }

    #[test]
    fn evaluation_errors() {
        let doc = xml_read_str(SAMPLE).unwrap();
        assert_eq!(
            eval(&doc, "//q:a"),
            Err(XmlXPathError::XPathUndefPrefixError)
        );
        assert_eq!(eval(&doc, "$nope"), Err(XmlXPathError::XPathUndefVariableError));
        assert_eq!(eval(&doc, "nope()"), Err(XmlXPathError::XPathUnknownFuncError));
        assert_eq!(eval(&doc, "1 | //a"), Err(XmlXPathError::XPathInvalidType));
        assert_eq!(eval(&doc, "'x'[1]"), Err(XmlXPathError::XPathInvalidType));
        assert_eq!(
            eval(&doc, "namespace::*"),
            Err(XmlXPathError::XPathUnsupportedAxis)
        );
    }

    #[test]
    fn context_is_restored() {
        let doc = xml_read_str(SAMPLE).unwrap();
        let root = doc.get_root_element().unwrap();
        let mut ctxt = XmlXPathContext::new(&doc);
        ctxt.node = root;
        let res = xml_xpath_eval("a[position() = 2]", &mut ctxt).unwrap();
        assert_eq!(names(&doc, &res), ["4"]);
        assert_eq!(ctxt.node, root);
        assert_eq!(ctxt.context_size(), 1);
    }

    #[test]
    fn deep_expressions_within_limit() {
        // Same stack as a default test thread.
        let handle = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(|| {
                let doc = xml_read_str(SAMPLE).unwrap();
                let sum = vec!["1"; 990].join("+");
                assert_eq!(eval(&doc, &sum), Ok(XmlXPathObject::Number(990.0)));
                let path = vec!["a"; 990].join("/");
                assert!(eval(&doc, &path).unwrap().node_set().unwrap().is_empty());
                let union = vec!["//a"; 990].join("|");
                assert_eq!(names(&doc, &eval(&doc, &union).unwrap()), ["one", "two", "4"]);
                let nested = format!("{}1{}", "(-".repeat(90), ")".repeat(90));
                assert_eq!(eval(&doc, &nested), Ok(XmlXPathObject::Number(1.0)));

                let sum = vec!["1"; 2000].join("+");
                assert_eq!(eval(&doc, &sum), Err(XmlXPathError::XPathRecursionLimitExceeded));
                let path = vec!["a"; 5000].join("/");
                assert_eq!(eval(&doc, &path), Err(XmlXPathError::XPathRecursionLimitExceeded));
                let union = vec!["//a"; 2000].join("|");
                assert_eq!(eval(&doc, &union), Err(XmlXPathError::XPathRecursionLimitExceeded));
            })
            .unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn long_predicate_chain() {
        let doc = xml_read_str(SAMPLE).unwrap();
        let expr = format!("//a{}", "[1]".repeat(5000));
        assert_eq!(names(&doc, &eval(&doc, &expr).unwrap()), ["one", "two"]);
    }
}
