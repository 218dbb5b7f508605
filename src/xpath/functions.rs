//! The core function library of XPath 1.0.
//!
//! Every function follows the calling convention of [`XmlXPathFunction`]: the `nargs`
//! arguments are on top of the value stack, last argument on top, and the function
//! replaces them with exactly one result.

use crate::{
    parser::XmlParserCharValid,
    tree::{XmlElementType, XmlNodeId},
};

use super::{
    XmlNodeSet, XmlXPathError, XmlXPathFunction, XmlXPathParserContext,
    xml_xpath_cast_string_to_number,
};

/// The core functions, by name, registered in every new context.
pub(crate) const CORE_FUNCTIONS: &[(&str, XmlXPathFunction)] = &[
    ("boolean", xml_xpath_boolean_function),
    ("ceiling", xml_xpath_ceiling_function),
    ("count", xml_xpath_count_function),
    ("concat", xml_xpath_concat_function),
    ("contains", xml_xpath_contains_function),
    ("id", xml_xpath_id_function),
    ("false", xml_xpath_false_function),
    ("floor", xml_xpath_floor_function),
    ("last", xml_xpath_last_function),
    ("lang", xml_xpath_lang_function),
    ("local-name", xml_xpath_local_name_function),
    ("not", xml_xpath_not_function),
    ("name", xml_xpath_name_function),
    ("namespace-uri", xml_xpath_namespace_uri_function),
    ("normalize-space", xml_xpath_normalize_function),
    ("number", xml_xpath_number_function),
    ("position", xml_xpath_position_function),
    ("round", xml_xpath_round_function),
    ("string", xml_xpath_string_function),
    ("string-length", xml_xpath_string_length_function),
    ("starts-with", xml_xpath_starts_with_function),
    ("substring", xml_xpath_substring_function),
    ("substring-before", xml_xpath_substring_before_function),
    ("substring-after", xml_xpath_substring_after_function),
    ("sum", xml_xpath_sum_function),
    ("true", xml_xpath_true_function),
    ("translate", xml_xpath_translate_function),
];

/// Check that the number of args passed to an XPath function matches.
#[doc(alias = "CHECK_ARITY")]
pub(crate) fn check_arity(
    ctxt: &XmlXPathParserContext,
    nargs: usize,
    x: usize,
) -> Result<(), XmlXPathError> {
    if nargs != x {
        return Err(XmlXPathError::XPathInvalidArity);
    }
    if ctxt.value_tab.len() < x {
        return Err(XmlXPathError::XPathStackError);
    }
    Ok(())
}

fn check_arity_range(
    ctxt: &XmlXPathParserContext,
    nargs: usize,
    min: usize,
    max: usize,
) -> Result<(), XmlXPathError> {
    if !(min..=max).contains(&nargs) {
        return Err(XmlXPathError::XPathInvalidArity);
    }
    check_arity(ctxt, nargs, nargs)
}

/// Round half up, keeping the sign of zero for values in `[-0.5, 0.5)`.
pub(crate) fn xml_xpath_round(f: f64) -> f64 {
    if (-0.5..0.5).contains(&f) {
        // Handles negative zero.
        f * 0.0
    } else {
        let rounded = f.floor();
        if f - rounded >= 0.5 {
            rounded + 1.0
        } else {
            rounded
        }
    }
}

/// The node-set argument of the node name functions, or the context node when omitted.
fn pop_node_or_context(
    ctxt: &mut XmlXPathParserContext,
    nargs: usize,
) -> Result<Option<XmlNodeId>, XmlXPathError> {
    check_arity_range(ctxt, nargs, 0, 1)?;
    if nargs == 0 {
        return Ok(Some(ctxt.context.node));
    }
    let mut set = ctxt.pop_node_set()?;
    set.sort(ctxt.doc());
    Ok(set.get(0))
}

/// The string argument of the string functions, or the string value of the context node.
fn pop_string_or_context(
    ctxt: &mut XmlXPathParserContext,
    nargs: usize,
) -> Result<String, XmlXPathError> {
    check_arity_range(ctxt, nargs, 0, 1)?;
    if nargs == 0 {
        return Ok(ctxt.doc().get_content(ctxt.context.node));
    }
    ctxt.pop_string()
}

/// Implement the last() XPath function
///    number last()
/// The last function returns the number of nodes in the context node list.
#[doc(alias = "xmlXPathLastFunction")]
pub fn xml_xpath_last_function(
    ctxt: &mut XmlXPathParserContext,
    nargs: usize,
) -> Result<(), XmlXPathError> {
    check_arity(ctxt, nargs, 0)?;
    let size = ctxt.context.context_size() as f64;
    ctxt.value_push(size.into())
}

/// Implement the position() XPath function
///    number position()
/// The position function returns the position of the context node in the
/// context node list. The first position is 1.
#[doc(alias = "xmlXPathPositionFunction")]
pub fn xml_xpath_position_function(
    ctxt: &mut XmlXPathParserContext,
    nargs: usize,
) -> Result<(), XmlXPathError> {
    check_arity(ctxt, nargs, 0)?;
    let position = ctxt.context.proximity_position() as f64;
    ctxt.value_push(position.into())
}

/// Implement the count() XPath function
///    number count(node-set)
#[doc(alias = "xmlXPathCountFunction")]
pub fn xml_xpath_count_function(
    ctxt: &mut XmlXPathParserContext,
    nargs: usize,
) -> Result<(), XmlXPathError> {
    check_arity(ctxt, nargs, 1)?;
    let set = ctxt.pop_node_set()?;
    ctxt.value_push((set.len() as f64).into())
}

/// Implement the id() XPath function
///    node-set id(object)
/// The id function selects elements by their unique ID.
/// When the argument is a node-set, the result is the union of applying id to the
/// string value of each node. Otherwise the argument is converted to a string and split
/// on whitespace, each token being an ID.
///
/// IDs are only taken from `xml:id` attributes.
#[doc(alias = "xmlXPathIdFunction")]
pub fn xml_xpath_id_function(
    ctxt: &mut XmlXPathParserContext,
    nargs: usize,
) -> Result<(), XmlXPathError> {
    check_arity(ctxt, nargs, 1)?;
    let doc = ctxt.doc();
    let obj = ctxt.value_pop()?;
    let values: Vec<String> = match obj.node_set() {
        Some(set) => set.iter().map(|node| doc.get_content(node)).collect(),
        None => vec![obj.cast_to_string(doc)],
    };

    let mut res = values
        .iter()
        .flat_map(|value| value.split(|c: char| c.is_blank_char()))
        .filter(|id| !id.is_empty())
        .filter_map(|id| doc.get_id(id))
        .collect::<XmlNodeSet>();
    res.sort(doc);
    ctxt.value_push(res.into())
}

/// Implement the local-name() XPath function
///    string local-name(node-set?)
/// The local-name function returns a string containing the local part of the name of
/// the node in the argument node-set that is first in document order. If the node-set
/// is empty or the first node has no name, an empty string is returned. If the
/// argument is omitted it defaults to the context node.
#[doc(alias = "xmlXPathLocalNameFunction")]
pub fn xml_xpath_local_name_function(
    ctxt: &mut XmlXPathParserContext,
    nargs: usize,
) -> Result<(), XmlXPathError> {
    let doc = ctxt.doc();
    let res = pop_node_or_context(ctxt, nargs)?
        .map(|node| match doc.element_type(node) {
            XmlElementType::XmlElementNode
            | XmlElementType::XmlAttributeNode
            | XmlElementType::XmlPINode => doc.name(node).unwrap_or_default().to_owned(),
            _ => String::new(),
        })
        .unwrap_or_default();
    ctxt.value_push(res.into())
}

/// Implement the namespace-uri() XPath function
///    string namespace-uri(node-set?)
#[doc(alias = "xmlXPathNamespaceURIFunction")]
pub fn xml_xpath_namespace_uri_function(
    ctxt: &mut XmlXPathParserContext,
    nargs: usize,
) -> Result<(), XmlXPathError> {
    let doc = ctxt.doc();
    let res = pop_node_or_context(ctxt, nargs)?
        .filter(|&node| {
            matches!(
                doc.element_type(node),
                XmlElementType::XmlElementNode | XmlElementType::XmlAttributeNode
            )
        })
        .and_then(|node| doc.ns(node))
        .map(|ns| doc.get_ns(ns).href().to_owned())
        .unwrap_or_default();
    ctxt.value_push(res.into())
}

/// Implement the name() XPath function
///    string name(node-set?)
/// The name function returns a string containing a QName representing the name of the
/// node in the argument node-set that is first in document order. The prefix is the one
/// of the namespace declaration the node was bound with.
#[doc(alias = "xmlXPathNameFunction")]
pub fn xml_xpath_name_function(
    ctxt: &mut XmlXPathParserContext,
    nargs: usize,
) -> Result<(), XmlXPathError> {
    let doc = ctxt.doc();
    let res = pop_node_or_context(ctxt, nargs)?
        .map(|node| match doc.element_type(node) {
            XmlElementType::XmlElementNode | XmlElementType::XmlAttributeNode => {
                doc.qualified_name(node).unwrap_or_default()
            }
            XmlElementType::XmlPINode => doc.name(node).unwrap_or_default().to_owned(),
            _ => String::new(),
        })
        .unwrap_or_default();
    ctxt.value_push(res.into())
}

/// Implement the string() XPath function
///    string string(object?)
#[doc(alias = "xmlXPathStringFunction")]
pub fn xml_xpath_string_function(
    ctxt: &mut XmlXPathParserContext,
    nargs: usize,
) -> Result<(), XmlXPathError> {
    let res = pop_string_or_context(ctxt, nargs)?;
    ctxt.value_push(res.into())
}

/// Implement the string-length() XPath function
///    number string-length(string?)
/// The string-length returns the number of characters in the string.
#[doc(alias = "xmlXPathStringLengthFunction")]
pub fn xml_xpath_string_length_function(
    ctxt: &mut XmlXPathParserContext,
    nargs: usize,
) -> Result<(), XmlXPathError> {
    let res = pop_string_or_context(ctxt, nargs)?;
    ctxt.value_push((res.chars().count() as f64).into())
}

/// Implement the concat() XPath function
///    string concat(string, string, string*)
#[doc(alias = "xmlXPathConcatFunction")]
pub fn xml_xpath_concat_function(
    ctxt: &mut XmlXPathParserContext,
    nargs: usize,
) -> Result<(), XmlXPathError> {
    if nargs < 2 {
        return Err(XmlXPathError::XPathInvalidArity);
    }
    check_arity(ctxt, nargs, nargs)?;
    let mut parts = (0..nargs)
        .map(|_| ctxt.pop_string())
        .collect::<Result<Vec<_>, _>>()?;
    parts.reverse();
    ctxt.value_push(parts.concat().into())
}

/// Implement the contains() XPath function
///    boolean contains(string, string)
#[doc(alias = "xmlXPathContainsFunction")]
pub fn xml_xpath_contains_function(
    ctxt: &mut XmlXPathParserContext,
    nargs: usize,
) -> Result<(), XmlXPathError> {
    check_arity(ctxt, nargs, 2)?;
    let needle = ctxt.pop_string()?;
    let hay = ctxt.pop_string()?;
    ctxt.value_push(hay.contains(&needle).into())
}

/// Implement the starts-with() XPath function
///    boolean starts-with(string, string)
#[doc(alias = "xmlXPathStartsWithFunction")]
pub fn xml_xpath_starts_with_function(
    ctxt: &mut XmlXPathParserContext,
    nargs: usize,
) -> Result<(), XmlXPathError> {
    check_arity(ctxt, nargs, 2)?;
    let needle = ctxt.pop_string()?;
    let hay = ctxt.pop_string()?;
    ctxt.value_push(hay.starts_with(&needle).into())
}

/// Implement the substring() XPath function
///    string substring(string, number, number?)
/// The substring function returns the substring of the first argument starting at the
/// position specified in the second argument with length specified in the third
/// argument. Characters are counted from 1 and a character at position `p` is kept when
/// `round(start) <= p < round(start) + round(length)`.
///
/// Comparisons are done on the rounded floating point values, so `NaN` keeps nothing
/// and infinities behave as expected: `substring("12345", -42, 1 div 0)` is `"12345"`
/// while `substring("12345", -1 div 0, 1 div 0)` is empty.
#[doc(alias = "xmlXPathSubstringFunction")]
pub fn xml_xpath_substring_function(
    ctxt: &mut XmlXPathParserContext,
    nargs: usize,
) -> Result<(), XmlXPathError> {
    check_arity_range(ctxt, nargs, 2, 3)?;
    let len = if nargs == 3 {
        Some(ctxt.pop_number()?)
    } else {
        None
    };
    let start = xml_xpath_round(ctxt.pop_number()?);
    let s = ctxt.pop_string()?;
    let end = len.map_or(f64::INFINITY, |len| start + xml_xpath_round(len));

    let res = s
        .chars()
        .enumerate()
        .filter(|&(i, _)| {
            let pos = (i + 1) as f64;
            pos >= start && pos < end
        })
        .map(|(_, c)| c)
        .collect::<String>();
    ctxt.value_push(res.into())
}

/// Implement the substring-before() XPath function
///    string substring-before(string, string)
#[doc(alias = "xmlXPathSubstringBeforeFunction")]
pub fn xml_xpath_substring_before_function(
    ctxt: &mut XmlXPathParserContext,
    nargs: usize,
) -> Result<(), XmlXPathError> {
    check_arity(ctxt, nargs, 2)?;
    let find = ctxt.pop_string()?;
    let s = ctxt.pop_string()?;
    let res = s.find(&find).map(|pos| &s[..pos]).unwrap_or_default();
    ctxt.value_push(res.into())
}

/// Implement the substring-after() XPath function
///    string substring-after(string, string)
#[doc(alias = "xmlXPathSubstringAfterFunction")]
pub fn xml_xpath_substring_after_function(
    ctxt: &mut XmlXPathParserContext,
    nargs: usize,
) -> Result<(), XmlXPathError> {
    check_arity(ctxt, nargs, 2)?;
    let find = ctxt.pop_string()?;
    let s = ctxt.pop_string()?;
    let res = s
        .find(&find)
        .map(|pos| &s[pos + find.len()..])
        .unwrap_or_default();
    ctxt.value_push(res.into())
}

/// Implement the normalize-space() XPath function
///    string normalize-space(string?)
/// Strips leading and trailing whitespace and replaces sequences of whitespace
/// characters by a single space.
#[doc(alias = "xmlXPathNormalizeFunction")]
pub fn xml_xpath_normalize_function(
    ctxt: &mut XmlXPathParserContext,
    nargs: usize,
) -> Result<(), XmlXPathError> {
    let s = pop_string_or_context(ctxt, nargs)?;
    let res = s
        .split(|c: char| c.is_blank_char())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    ctxt.value_push(res.into())
}

/// Implement the translate() XPath function
///    string translate(string, string, string)
/// The translate function returns the first argument string with occurrences of
/// characters in the second argument string replaced by the character at the
/// corresponding position in the third argument string. Characters without a
/// counterpart are removed, and the first occurrence in the second argument wins.
#[doc(alias = "xmlXPathTranslateFunction")]
pub fn xml_xpath_translate_function(
    ctxt: &mut XmlXPathParserContext,
    nargs: usize,
) -> Result<(), XmlXPathError> {
    check_arity(ctxt, nargs, 3)?;
    let to = ctxt.pop_string()?.chars().collect::<Vec<_>>();
    let from = ctxt.pop_string()?;
    let s = ctxt.pop_string()?;
    let res = s
        .chars()
        .filter_map(|c| match from.chars().position(|f| f == c) {
            Some(index) => to.get(index).copied(),
            None => Some(c),
        })
        .collect::<String>();
    ctxt.value_push(res.into())
}

/// Implement the boolean() XPath function
///    boolean boolean(object)
/// The boolean function converts its argument to a boolean as follows:
///    - a number is true if and only if it is neither positive or
///      negative zero nor NaN
///    - a node-set is true if and only if it is non-empty
///    - a string is true if and only if its length is non-zero
#[doc(alias = "xmlXPathBooleanFunction")]
pub fn xml_xpath_boolean_function(
    ctxt: &mut XmlXPathParserContext,
    nargs: usize,
) -> Result<(), XmlXPathError> {
    check_arity(ctxt, nargs, 1)?;
    let res = ctxt.pop_boolean()?;
    ctxt.value_push(res.into())
}

/// Implement the not() XPath function
///    boolean not(boolean)
#[doc(alias = "xmlXPathNotFunction")]
pub fn xml_xpath_not_function(
    ctxt: &mut XmlXPathParserContext,
    nargs: usize,
) -> Result<(), XmlXPathError> {
    check_arity(ctxt, nargs, 1)?;
    let res = !ctxt.pop_boolean()?;
    ctxt.value_push(res.into())
}

#[doc(alias = "xmlXPathTrueFunction")]
pub fn xml_xpath_true_function(
    ctxt: &mut XmlXPathParserContext,
    nargs: usize,
) -> Result<(), XmlXPathError> {
    check_arity(ctxt, nargs, 0)?;
    ctxt.value_push(true.into())
}

#[doc(alias = "xmlXPathFalseFunction")]
pub fn xml_xpath_false_function(
    ctxt: &mut XmlXPathParserContext,
    nargs: usize,
) -> Result<(), XmlXPathError> {
    check_arity(ctxt, nargs, 0)?;
    ctxt.value_push(false.into())
}

/// Implement the lang() XPath function
///    boolean lang(string)
/// The lang function returns true or false depending on whether the language of the
/// context node as specified by `xml:lang` attributes is the same as or is a sublanguage
/// of the language specified by the argument string. Case is ignored.
#[doc(alias = "xmlXPathLangFunction")]
pub fn xml_xpath_lang_function(
    ctxt: &mut XmlXPathParserContext,
    nargs: usize,
) -> Result<(), XmlXPathError> {
    check_arity(ctxt, nargs, 1)?;
    let lang = ctxt.pop_string()?;
    let res = ctxt
        .doc()
        .get_lang(ctxt.context.node)
        .is_some_and(|the_lang| {
            the_lang.len() >= lang.len()
                && the_lang.is_char_boundary(lang.len())
                && the_lang[..lang.len()].eq_ignore_ascii_case(&lang)
                && matches!(the_lang.as_bytes().get(lang.len()), None | Some(b'-'))
        });
    ctxt.value_push(res.into())
}

/// Implement the number() XPath function
///    number number(object?)
#[doc(alias = "xmlXPathNumberFunction")]
pub fn xml_xpath_number_function(
    ctxt: &mut XmlXPathParserContext,
    nargs: usize,
) -> Result<(), XmlXPathError> {
    check_arity_range(ctxt, nargs, 0, 1)?;
    let res = if nargs == 0 {
        xml_xpath_cast_string_to_number(&ctxt.doc().get_content(ctxt.context.node))
    } else {
        ctxt.pop_number()?
    };
    ctxt.value_push(res.into())
}

/// Implement the sum() XPath function
///    number sum(node-set)
/// The sum function returns the sum of the values of the nodes in the argument
/// node-set.
#[doc(alias = "xmlXPathSumFunction")]
pub fn xml_xpath_sum_function(
    ctxt: &mut XmlXPathParserContext,
    nargs: usize,
) -> Result<(), XmlXPathError> {
    check_arity(ctxt, nargs, 1)?;
    let doc = ctxt.doc();
    let set = ctxt.pop_node_set()?;
    let res = set
        .iter()
        .map(|node| xml_xpath_cast_string_to_number(&doc.get_content(node)))
        .sum::<f64>();
    ctxt.value_push(res.into())
}

/// Implement the floor() XPath function
///    number floor(number)
#[doc(alias = "xmlXPathFloorFunction")]
pub fn xml_xpath_floor_function(
    ctxt: &mut XmlXPathParserContext,
    nargs: usize,
) -> Result<(), XmlXPathError> {
    check_arity(ctxt, nargs, 1)?;
    let res = ctxt.pop_number()?.floor();
    ctxt.value_push(res.into())
}

/// Implement the ceiling() XPath function
///    number ceiling(number)
/// The ceiling function returns the smallest (closest to negative infinity)
/// number that is not less than the argument and that is an integer.
#[doc(alias = "xmlXPathCeilingFunction")]
pub fn xml_xpath_ceiling_function(
    ctxt: &mut XmlXPathParserContext,
    nargs: usize,
) -> Result<(), XmlXPathError> {
    check_arity(ctxt, nargs, 1)?;
    let res = ctxt.pop_number()?.ceil();
    ctxt.value_push(res.into())
}

/// Implement the round() XPath function
///    number round(number)
/// The round function returns the number that is closest to the argument and that is
/// an integer. If there are two such numbers, then the one that is closest to positive
/// infinity is returned.
#[doc(alias = "xmlXPathRoundFunction")]
pub fn xml_xpath_round_function(
    ctxt: &mut XmlXPathParserContext,
    nargs: usize,
) -> Result<(), XmlXPathError> {
    check_arity(ctxt, nargs, 1)?;
    let res = xml_xpath_round(ctxt.pop_number()?);
    ctxt.value_push(res.into())
}

#[cfg(test)]
mod tests {
    use crate::{
        parser::xml_read_str,
        tree::XmlDoc,
        xpath::{XmlXPathContext, XmlXPathObject, xml_xpath_eval},
    };

    use super::*;

    const SAMPLE: &str = r#"<doc xmlns:p="urn:p" xml:lang="en-GB">
<p:item xml:id="i1" p:k="v">10</p:item><item xml:id="i2">2.5</item><?target body?><note xml:lang="fr">  x  y
 z </note></doc>"#;

    fn eval(doc: &XmlDoc, expr: &str) -> Result<XmlXPathObject, XmlXPathError> {
        let mut ctxt = XmlXPathContext::new(doc);
        ctxt.register_ns("q", Some("urn:p"));
        xml_xpath_eval(expr, &mut ctxt)
    }

    fn string(doc: &XmlDoc, expr: &str) -> String {
        eval(doc, expr).unwrap().cast_to_string(doc)
    }

    #[test]
    fn registry_has_every_core_function() {
        assert_eq!(CORE_FUNCTIONS.len(), 27);
        let doc = XmlDoc::new();
        let ctxt = XmlXPathContext::new(&doc);
        for &(name, _) in CORE_FUNCTIONS {
            assert!(ctxt.lookup_function(name).is_some(), "{name}");
        }
    }

    #[test]
    fn rounding() {
        assert_eq!(xml_xpath_round(2.5), 3.0);
        assert_eq!(xml_xpath_round(-2.5), -2.0);
        assert!(xml_xpath_round(-0.4).is_sign_negative());
        assert!(xml_xpath_round(f64::NAN).is_nan());
        assert_eq!(xml_xpath_round(f64::INFINITY), f64::INFINITY);
    }

    #[test]
    fn string_functions() {
        let doc = xml_read_str(SAMPLE).unwrap();
        assert_eq!(string(&doc, "concat('a', 1, true())"), "a1true");
        assert_eq!(string(&doc, "substring('12345', 2, 3)"), "234");
        assert_eq!(string(&doc, "substring('12345', 1.5, 2.6)"), "234");
        assert_eq!(string(&doc, "substring('12345', 0 div 0, 3)"), "");
        assert_eq!(string(&doc, "substring('12345', -42, 1 div 0)"), "12345");
        assert_eq!(string(&doc, "substring('12345', -1 div 0, 1 div 0)"), "");
        assert_eq!(string(&doc, "substring-before('1999/04/01', '/')"), "1999");
        assert_eq!(string(&doc, "substring-after('1999/04/01', '/')"), "04/01");
        assert_eq!(string(&doc, "substring-after('abc', 'x')"), "");
        assert_eq!(string(&doc, "normalize-space(//note)"), "x y z");
        assert_eq!(string(&doc, "translate('--aaa--', 'abc-', 'ABC')"), "AAA");
        assert_eq!(string(&doc, "string-length('héllo')"), "5");
        assert_eq!(string(&doc, "starts-with('xpath', 'xp')"), "true");
        assert_eq!(string(&doc, "contains('xpath', 'at')"), "true");
    }

    #[test]
    fn node_functions() {
        let doc = xml_read_str(SAMPLE).unwrap();
        assert_eq!(string(&doc, "count(/doc/*)"), "3");
        assert_eq!(string(&doc, "name(/doc/*[1])"), "p:item");
        assert_eq!(string(&doc, "local-name(/doc/*[1])"), "item");
        assert_eq!(string(&doc, "namespace-uri(//q:item)"), "urn:p");
        assert_eq!(string(&doc, "name(//q:item/@q:k)"), "p:k");
        assert_eq!(string(&doc, "name(//processing-instruction())"), "target");
        assert_eq!(string(&doc, "local-name(/missing)"), "");
        assert_eq!(string(&doc, "sum(//*[contains(name(), 'item')])"), "12.5");
        assert_eq!(string(&doc, "id('i2 i1')"), "10");
        assert_eq!(string(&doc, "count(id('i2 i1 nope'))"), "2");
        assert_eq!(string(&doc, "count(//item[lang('en')])"), "1");
        assert_eq!(string(&doc, "count(//note[lang('EN')])"), "0");
        assert_eq!(string(&doc, "count(//*[lang('fr')])"), "1");
        assert_eq!(string(&doc, "//item[position() = last()]"), "2.5");
    }

    #[test]
    fn numeric_functions() {
        let doc = xml_read_str(SAMPLE).unwrap();
        assert_eq!(string(&doc, "floor(-1.5)"), "-2");
        assert_eq!(string(&doc, "ceiling(1.2)"), "2");
        assert_eq!(string(&doc, "round(-0.5)"), "0");
        assert!(matches!(
            eval(&doc, "round(-0.5)"),
            Ok(XmlXPathObject::Number(n)) if n == 0.0 && n.is_sign_negative()
        ));
        assert_eq!(string(&doc, "number('  12 ')"), "12");
        assert_eq!(string(&doc, "number('x')"), "NaN");
        assert_eq!(string(&doc, "not(0) and true() and not(false())"), "true");
        assert_eq!(string(&doc, "boolean(//missing)"), "false");
    }

    #[test]
    fn argument_errors() {
        let doc = xml_read_str(SAMPLE).unwrap();
        assert_eq!(eval(&doc, "count()"), Err(XmlXPathError::XPathInvalidArity));
        assert_eq!(eval(&doc, "concat('a')"), Err(XmlXPathError::XPathInvalidArity));
        assert_eq!(eval(&doc, "true(1)"), Err(XmlXPathError::XPathInvalidArity));
        assert_eq!(eval(&doc, "count('a')"), Err(XmlXPathError::XPathInvalidType));
        assert_eq!(eval(&doc, "sum(1)"), Err(XmlXPathError::XPathInvalidType));
        assert_eq!(eval(&doc, "name(1)"), Err(XmlXPathError::XPathInvalidType));
    }
}
