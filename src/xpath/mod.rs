//! XPath 1.0 over [`XmlDoc`](crate::tree::XmlDoc).
//!
//! Expressions are compiled into a flat array of step operations ([`XmlXPathCompExpr`]) and
//! evaluated against an [`XmlXPathContext`]. Results are [`XmlXPathObject`]s.
//!
//! Most callers only need the [`find`] layer: [`XmlXPathFind`], or the pipeline
//! [`normalize`] / [`EvaluationContext::build`] / [`evaluate`].

mod compile;
mod context;
pub mod dump;
mod evaluate;
mod find;
pub mod functions;
mod node_set;
mod object;

use std::{any::type_name, error::Error, fmt::Display};

pub use compile::*;
pub use context::*;
pub use dump::*;
pub use evaluate::*;
pub use find::*;
pub use node_set::*;
pub use object::*;

use crate::{generic_error, tree::XmlElementType};

pub const XML_XPATH_NAN: f64 = f64::NAN;
pub const XML_XPATH_PINF: f64 = f64::INFINITY;
pub const XML_XPATH_NINF: f64 = f64::NEG_INFINITY;

/// Maximum nesting allowed while compiling and while evaluating an expression.
///
/// Evaluation counts one per step operation. Compilation counts 10 per nested
/// sub-expression, which allows 99 levels of parentheses or predicates.
pub const XPATH_MAX_RECURSION_DEPTH: usize = 1000;
/// Maximum number of step operations in one compiled expression.
pub const XPATH_MAX_STEPS: usize = 1000000;

/// The set of XPath error codes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum XmlXPathError {
    #[default]
    XPathExpressionOK = 0,
    XPathNumberError,
    XPathUnfinishedLiteralError,
    XPathStartLiteralError,
    XPathVariableRefError,
    XPathUndefVariableError,
    XPathInvalidPredicateError,
    XPathExprError,
    XPathUnclosedError,
    XPathUnknownFuncError,
    XPathInvalidOperand,
    XPathInvalidType,
    XPathInvalidArity,
    XPathInvalidCtxtSize,
    XPathInvalidCtxtPosition,
    XPathMemoryError,
    XPtrSyntaxError,
    XPtrResourceError,
    XPtrSubResourceError,
    XPathUndefPrefixError,
    XPathEncodingError,
    XPathInvalidCharError,
    XPathInvalidCtxt,
    XPathStackError,
    XPathForbidVariableError,
    XPathOpLimitExceeded,
    XPathRecursionLimitExceeded,
    /// Not a libxml2 code: the `namespace` axis is parsed but cannot be walked.
    XPathUnsupportedAxis,
}

impl TryFrom<i32> for XmlXPathError {
    type Error = anyhow::Error;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        use XmlXPathError::*;
        const ALL: &[XmlXPathError] = &[
            XPathExpressionOK,
            XPathNumberError,
            XPathUnfinishedLiteralError,
            XPathStartLiteralError,
            XPathVariableRefError,
            XPathUndefVariableError,
            XPathInvalidPredicateError,
            XPathExprError,
            XPathUnclosedError,
            XPathUnknownFuncError,
            XPathInvalidOperand,
            XPathInvalidType,
            XPathInvalidArity,
            XPathInvalidCtxtSize,
            XPathInvalidCtxtPosition,
            XPathMemoryError,
            XPtrSyntaxError,
            XPtrResourceError,
            XPtrSubResourceError,
            XPathUndefPrefixError,
            XPathEncodingError,
            XPathInvalidCharError,
            XPathInvalidCtxt,
            XPathStackError,
            XPathForbidVariableError,
            XPathOpLimitExceeded,
            XPathRecursionLimitExceeded,
            XPathUnsupportedAxis,
        ];
        usize::try_from(value)
            .ok()
            .and_then(|index| ALL.get(index).copied())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Invalid convert from value '{value}' to {}",
                    type_name::<Self>()
                )
            })
    }
}

// The array XML_XPATH_ERROR_MESSAGES corresponds to the enum XmlXPathError
const XML_XPATH_ERROR_MESSAGES: &[&str] = &[
    "Ok\n",
    "Number encoding\n",
    "Unfinished literal\n",
    "Start of literal\n",
    "Expected $ for variable reference\n",
    "Undefined variable\n",
    "Invalid predicate\n",
    "Invalid expression\n",
    "Missing closing curly brace\n",
    "Unregistered function\n",
    "Invalid operand\n",
    "Invalid type\n",
    "Invalid number of arguments\n",
    "Invalid context size\n",
    "Invalid context position\n",
    "Memory allocation error\n",
    "Syntax error\n",
    "Resource error\n",
    "Sub resource error\n",
    "Undefined namespace prefix\n",
    "Encoding error\n",
    "Char out of XML range\n",
    "Invalid or incomplete context\n",
    "Stack usage error\n",
    "Forbidden variable\n",
    "Operation limit exceeded\n",
    "Recursion limit exceeded\n",
    "Unsupported axis\n",
    "?? Unknown error ??\n", /* Must be last in the list! */
];

impl XmlXPathError {
    /// The libxml2 message for this code, newline included.
    pub fn message(&self) -> &'static str {
        XML_XPATH_ERROR_MESSAGES
            .get(*self as usize)
            .copied()
            .unwrap_or(XML_XPATH_ERROR_MESSAGES[XML_XPATH_ERROR_MESSAGES.len() - 1])
    }

    pub fn is_ok(&self) -> bool {
        *self == Self::XPathExpressionOK
    }
}

impl Display for XmlXPathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message().trim_end())
    }
}

impl Error for XmlXPathError {}

/// Report an XPath error on the generic error channel.
///
/// `pos` is the byte offset the error was detected at, if known. The expression is
/// printed below the message with a caret under that offset.
#[doc(alias = "xmlXPathErr")]
pub fn xml_xpath_err(expr: &str, pos: Option<usize>, error: XmlXPathError) {
    generic_error!("XPath error : {}", error.message());
    match pos {
        Some(pos) => {
            let col = expr
                .get(..pos.min(expr.len()))
                .map_or(0, |prefix| prefix.chars().count());
            generic_error!("{expr}\n{}^\n", " ".repeat(col));
        }
        None => generic_error!("{expr}\n"),
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlXPathOp {
    XPathOpEnd = 0,
    XPathOpAnd,
    XPathOpOr,
    XPathOpEqual,
    XPathOpCmp,
    XPathOpPlus,
    XPathOpMult,
    XPathOpUnion,
    XPathOpRoot,
    XPathOpNode,
    XPathOpCollect,
    XPathOpValue, /* 11 */
    XPathOpVariable,
    XPathOpFunction,
    XPathOpArg,
    XPathOpPredicate,
    XPathOpFilter, /* 16 */
    XPathOpSort,   /* 17 */
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlXPathAxisVal {
    AxisAncestor = 1,
    AxisAncestorOrSelf = 2,
    AxisAttribute = 3,
    AxisChild = 4,
    AxisDescendant = 5,
    AxisDescendantOrSelf = 6,
    AxisFollowing = 7,
    AxisFollowingSibling = 8,
    AxisNamespace = 9,
    AxisParent = 10,
    AxisPreceding = 11,
    AxisPrecedingSibling = 12,
    AxisSelf = 13,
}

impl XmlXPathAxisVal {
    /// Look up an axis by the name used in `axis::` syntax.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ancestor" => Some(Self::AxisAncestor),
            "ancestor-or-self" => Some(Self::AxisAncestorOrSelf),
            "attribute" => Some(Self::AxisAttribute),
            "child" => Some(Self::AxisChild),
            "descendant" => Some(Self::AxisDescendant),
            "descendant-or-self" => Some(Self::AxisDescendantOrSelf),
            "following" => Some(Self::AxisFollowing),
            "following-sibling" => Some(Self::AxisFollowingSibling),
            "namespace" => Some(Self::AxisNamespace),
            "parent" => Some(Self::AxisParent),
            "preceding" => Some(Self::AxisPreceding),
            "preceding-sibling" => Some(Self::AxisPrecedingSibling),
            "self" => Some(Self::AxisSelf),
            _ => None,
        }
    }

    /// Reverse axes number their proximity positions from the context node backwards.
    pub fn is_reverse(&self) -> bool {
        matches!(
            self,
            Self::AxisAncestor
                | Self::AxisAncestorOrSelf
                | Self::AxisPreceding
                | Self::AxisPrecedingSibling
        )
    }
}

impl TryFrom<i32> for XmlXPathAxisVal {
    type Error = anyhow::Error;
    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::AxisAncestor),
            2 => Ok(Self::AxisAncestorOrSelf),
            3 => Ok(Self::AxisAttribute),
            4 => Ok(Self::AxisChild),
            5 => Ok(Self::AxisDescendant),
            6 => Ok(Self::AxisDescendantOrSelf),
            7 => Ok(Self::AxisFollowing),
            8 => Ok(Self::AxisFollowingSibling),
            9 => Ok(Self::AxisNamespace),
            10 => Ok(Self::AxisParent),
            11 => Ok(Self::AxisPreceding),
            12 => Ok(Self::AxisPrecedingSibling),
            13 => Ok(Self::AxisSelf),
            _ => Err(anyhow::anyhow!(
                "Invalid convert from value '{value}' to XmlXPathAxisVal"
            )),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlXPathTestVal {
    NodeTestNone = 0,
    NodeTestType = 1,
    NodeTestPI = 2,
    NodeTestAll = 3,
    NodeTestNs = 4,
    NodeTestName = 5,
}

impl TryFrom<i32> for XmlXPathTestVal {
    type Error = anyhow::Error;
    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::NodeTestNone),
            1 => Ok(Self::NodeTestType),
            2 => Ok(Self::NodeTestPI),
            3 => Ok(Self::NodeTestAll),
            4 => Ok(Self::NodeTestNs),
            5 => Ok(Self::NodeTestName),
            _ => Err(anyhow::anyhow!(
                "Invalid convert from value '{value}' to XmlXPathTestVal"
            )),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlXPathTypeVal {
    NodeTypeNode = 0,
    NodeTypeComment = XmlElementType::XmlCommentNode as isize,
    NodeTypeText = XmlElementType::XmlTextNode as isize,
    NodeTypePI = XmlElementType::XmlPINode as isize,
}

impl TryFrom<i32> for XmlXPathTypeVal {
    type Error = anyhow::Error;
    fn try_from(value: i32) -> Result<Self, Self::Error> {
        if value == Self::NodeTypeNode as i32 {
            Ok(Self::NodeTypeNode)
        } else if value == Self::NodeTypeComment as i32 {
            Ok(Self::NodeTypeComment)
        } else if value == Self::NodeTypeText as i32 {
            Ok(Self::NodeTypeText)
        } else if value == Self::NodeTypePI as i32 {
            Ok(Self::NodeTypePI)
        } else {
            Err(anyhow::anyhow!(
                "Invalid convert from value '{value}' to XmlXPathTypeVal"
            ))
        }
    }
}

#[doc(alias = "xmlXPathIsNaN")]
pub fn xml_xpath_is_nan(val: f64) -> bool {
    val.is_nan()
}

/// Returns 1 if the value is +Infinite, -1 if -Infinite, 0 otherwise
#[doc(alias = "xmlXPathIsInf")]
pub fn xml_xpath_is_inf(val: f64) -> i32 {
    if val.is_infinite() {
        if val > 0.0 { 1 } else { -1 }
    } else {
        0
    }
}

const DBL_DIG: usize = 15;
const EXPONENT_DIGITS: usize = 3 + 2;
const UPPER_DOUBLE: f64 = 1E9;
const LOWER_DOUBLE: f64 = 1E-5;

/// Convert the number into a string representation.
#[doc(alias = "xmlXPathFormatNumber")]
fn xml_xpath_format_number(number: f64, buffer: &mut String) {
    use std::fmt::Write as _;

    match xml_xpath_is_inf(number) {
        1 => buffer.push_str("Infinity"),
        -1 => buffer.push_str("-Infinity"),
        _ if xml_xpath_is_nan(number) => buffer.push_str("NaN"),
        // Omit sign for negative zero.
        _ if number == 0.0 => buffer.push('0'),
        _ if number > i32::MIN as f64 && number < i32::MAX as f64 && number == number.trunc() => {
            write!(buffer, "{}", number as i32).ok();
        }
        _ => {
            let absolute_value = number.abs();
            if !(LOWER_DOUBLE..=UPPER_DOUBLE).contains(&absolute_value) {
                // Use scientific notation
                let integer_place = DBL_DIG + EXPONENT_DIGITS + 1;
                let fraction_place = DBL_DIG - 1;
                write!(buffer, "{number:integer_place$.fraction_place$e}").ok();

                // Remove trailing zeros of the mantissa
                let epos = buffer.find('e').unwrap_or(buffer.len());
                if let Some(mut start_trailing_zeros) = buffer[..epos].rfind(|c| c != '0') {
                    if buffer.as_bytes()[start_trailing_zeros] != b'.' {
                        start_trailing_zeros += 1;
                    }
                    buffer.replace_range(start_trailing_zeros..epos, "");
                }
            } else {
                let integer_place = absolute_value.log10().floor() as i64;
                let fraction_place = if integer_place > 0 {
                    (DBL_DIG as i64 - integer_place - 1).max(0) as usize
                } else {
                    (DBL_DIG as i64 - integer_place) as usize
                };
                write!(buffer, "{number:0.fraction_place$}").ok();

                // Remove trailing zeros
                while buffer.ends_with('0') {
                    buffer.pop();
                }
                if buffer.ends_with('.') {
                    buffer.pop();
                }
            }

            // Remove leading spaces inserted by the width specifier
            let trimmed = buffer.len() - buffer.trim_start().len();
            buffer.drain(..trimmed);
        }
    }
}

/// Converts a number to its string value.
#[doc(alias = "xmlXPathCastNumberToString")]
pub fn xml_xpath_cast_number_to_string(val: f64) -> String {
    let mut buffer = String::new();
    xml_xpath_format_number(val, &mut buffer);
    buffer
}

/// Converts a boolean to its string value.
#[doc(alias = "xmlXPathCastBooleanToString")]
pub fn xml_xpath_cast_boolean_to_string(val: bool) -> &'static str {
    if val { "true" } else { "false" }
}

/// Converts a number to its boolean value.
#[doc(alias = "xmlXPathCastNumberToBoolean")]
pub fn xml_xpath_cast_number_to_boolean(val: f64) -> bool {
    !xml_xpath_is_nan(val) && val != 0.0
}

/// Converts a string to its boolean value.
#[doc(alias = "xmlXPathCastStringToBoolean")]
pub fn xml_xpath_cast_string_to_boolean(val: &str) -> bool {
    !val.is_empty()
}

/// Converts a boolean to its number value.
#[doc(alias = "xmlXPathCastBooleanToNumber")]
pub fn xml_xpath_cast_boolean_to_number(val: bool) -> f64 {
    if val { 1.0 } else { 0.0 }
}

/// Converts a string to its number value.
///
/// Accepts optional blanks, an optional minus sign, digits with an optional fraction and an
/// optional exponent, then optional blanks. Anything else is NaN.
#[doc(alias = "xmlXPathCastStringToNumber", alias = "xmlXPathStringEvalNumber")]
pub fn xml_xpath_cast_string_to_number(val: &str) -> f64 {
    let trimmed = val.trim_matches(|c: char| matches!(c, ' ' | '\t' | '\n' | '\r'));
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let (mantissa, exponent) = match digits.find(['e', 'E']) {
        Some(pos) => (&digits[..pos], Some(&digits[pos + 1..])),
        None => (digits, None),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    let valid_mantissa = all_digits(int_part)
        && all_digits(frac_part)
        && !(int_part.is_empty() && frac_part.is_empty());
    let valid_exponent = exponent.is_none_or(|exp| {
        let exp = exp.strip_prefix(['+', '-']).unwrap_or(exp);
        !exp.is_empty() && all_digits(exp)
    });
    if !valid_mantissa || !valid_exponent {
        return XML_XPATH_NAN;
    }
    trimmed.parse::<f64>().unwrap_or(XML_XPATH_NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_and_messages() {
        assert_eq!(XmlXPathError::XPathUndefPrefixError as i32, 19);
        assert_eq!(
            XmlXPathError::XPathUndefPrefixError.to_string(),
            "Undefined namespace prefix"
        );
        assert_eq!(XmlXPathError::XPathExprError.message(), "Invalid expression\n");
        assert_eq!(
            XmlXPathError::try_from(26).ok(),
            Some(XmlXPathError::XPathRecursionLimitExceeded)
        );
        assert!(XmlXPathError::try_from(-1).is_err());
        assert!(XmlXPathError::try_from(100).is_err());
    }

    #[test]
    fn number_formatting() {
        let cases = [
            (1.0, "1"),
            (-3.0, "-3"),
            (0.5, "0.5"),
            (-0.0, "0"),
            (1.25, "1.25"),
            (f64::NAN, "NaN"),
            (f64::INFINITY, "Infinity"),
            (f64::NEG_INFINITY, "-Infinity"),
            (123456.789, "123456.789"),
            (3e10, "3e10"),
            (1e-7, "1e-7"),
        ];
        for (number, expected) in cases {
            assert_eq!(xml_xpath_cast_number_to_string(number), expected, "{number}");
        }
    }

    #[test]
    fn string_to_number() {
        assert_eq!(xml_xpath_cast_string_to_number(" 12 "), 12.0);
        assert_eq!(xml_xpath_cast_string_to_number("-.5"), -0.5);
        assert_eq!(xml_xpath_cast_string_to_number("3."), 3.0);
        assert_eq!(xml_xpath_cast_string_to_number("1e3"), 1000.0);
        assert!(xml_xpath_cast_string_to_number("").is_nan());
        assert!(xml_xpath_cast_string_to_number("+1").is_nan());
        assert!(xml_xpath_cast_string_to_number("1 2").is_nan());
        assert!(xml_xpath_cast_string_to_number(".").is_nan());
        assert!(xml_xpath_cast_string_to_number("abc").is_nan());
    }

    #[test]
    fn axis_names() {
        assert_eq!(
            XmlXPathAxisVal::from_name("following-sibling"),
            Some(XmlXPathAxisVal::AxisFollowingSibling)
        );
        assert!(XmlXPathAxisVal::AxisPreceding.is_reverse());
        assert!(!XmlXPathAxisVal::AxisChild.is_reverse());
        assert_eq!(
            XmlXPathAxisVal::try_from(XmlXPathAxisVal::AxisSelf as i32).ok(),
            Some(XmlXPathAxisVal::AxisSelf)
        );
    }
}
