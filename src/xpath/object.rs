use std::{any::Any, any::type_name, fmt::Debug, sync::Arc};

use crate::tree::{XmlDoc, XmlNodeId};

use super::{
    XML_XPATH_NAN, XmlNodeSet, xml_xpath_cast_boolean_to_number, xml_xpath_cast_boolean_to_string,
    xml_xpath_cast_number_to_boolean, xml_xpath_cast_number_to_string,
    xml_xpath_cast_string_to_boolean, xml_xpath_cast_string_to_number,
};

// An expression is evaluated to yield an object, which
// has one of the following four basic types:
//   - node-set
//   - boolean
//   - number
//   - string
//
// The other kinds only come from variables bound by the caller.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XmlXPathObjectType {
    #[default]
    XPathUndefined = 0,
    XPathNodeset = 1,
    XPathBoolean = 2,
    XPathNumber = 3,
    XPathString = 4,
    XPathPoint = 5,
    XPathRange = 6,
    XPathLocationset = 7,
    XPathUsers = 8,
    XPathXSLTTree = 9, /* An XSLT value tree, non modifiable */
}

impl TryFrom<i32> for XmlXPathObjectType {
    type Error = anyhow::Error;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::XPathUndefined),
            1 => Ok(Self::XPathNodeset),
            2 => Ok(Self::XPathBoolean),
            3 => Ok(Self::XPathNumber),
            4 => Ok(Self::XPathString),
            5 => Ok(Self::XPathPoint),
            6 => Ok(Self::XPathRange),
            7 => Ok(Self::XPathLocationset),
            8 => Ok(Self::XPathUsers),
            9 => Ok(Self::XPathXSLTTree),
            _ => Err(anyhow::anyhow!(
                "Invalid convert from value '{value}' to {}",
                type_name::<Self>()
            )),
        }
    }
}

/// Payload of an [`XmlXPathObject::Users`] value.
#[derive(Clone)]
pub enum XmlXPathObjectUserData {
    Node(XmlNodeId),
    External(Arc<dyn Any + Send + Sync>),
}

impl XmlXPathObjectUserData {
    pub fn as_node(&self) -> Option<XmlNodeId> {
        match self {
            Self::Node(node) => Some(*node),
            _ => None,
        }
    }

    pub fn as_external(&self) -> Option<&(dyn Any + Send + Sync)> {
        match self {
            Self::External(external) => Some(external.as_ref()),
            _ => None,
        }
    }
}

impl Debug for XmlXPathObjectUserData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Node(node) => f.debug_tuple("Node").field(node).finish(),
            Self::External(_) => f.write_str("External(..)"),
        }
    }
}

impl PartialEq for XmlXPathObjectUserData {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Node(l), Self::Node(r)) => l == r,
            (Self::External(l), Self::External(r)) => Arc::ptr_eq(l, r),
            _ => false,
        }
    }
}

/// The result of evaluating an XPath expression.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum XmlXPathObject {
    #[default]
    Undefined,
    NodeSet(XmlNodeSet),
    Boolean(bool),
    Number(f64),
    String(String),
    /// A location inside `node`: a child index for elements, a character index otherwise.
    Point { node: XmlNodeId, index: i32 },
    /// A range between two points. A collapsed range has no end.
    Range {
        start: XmlNodeId,
        start_index: i32,
        end: Option<XmlNodeId>,
        end_index: i32,
    },
    LocationSet(Vec<XmlXPathObject>),
    Users(XmlXPathObjectUserData),
    XSLTTree(XmlNodeSet),
}

impl XmlXPathObject {
    pub fn typ(&self) -> XmlXPathObjectType {
        match self {
            Self::Undefined => XmlXPathObjectType::XPathUndefined,
            Self::NodeSet(_) => XmlXPathObjectType::XPathNodeset,
            Self::Boolean(_) => XmlXPathObjectType::XPathBoolean,
            Self::Number(_) => XmlXPathObjectType::XPathNumber,
            Self::String(_) => XmlXPathObjectType::XPathString,
            Self::Point { .. } => XmlXPathObjectType::XPathPoint,
            Self::Range { .. } => XmlXPathObjectType::XPathRange,
            Self::LocationSet(_) => XmlXPathObjectType::XPathLocationset,
            Self::Users(_) => XmlXPathObjectType::XPathUsers,
            Self::XSLTTree(_) => XmlXPathObjectType::XPathXSLTTree,
        }
    }

    /// The node-set carried by a node-set or value tree object.
    pub fn node_set(&self) -> Option<&XmlNodeSet> {
        match self {
            Self::NodeSet(set) | Self::XSLTTree(set) => Some(set),
            _ => None,
        }
    }

    pub fn is_node_set(&self) -> bool {
        self.node_set().is_some()
    }

    /// Converts an XPath object to its boolean value.
    #[doc(alias = "xmlXPathCastToBoolean")]
    pub fn cast_to_boolean(&self) -> bool {
        match self {
            Self::NodeSet(set) | Self::XSLTTree(set) => !set.is_empty(),
            Self::String(s) => xml_xpath_cast_string_to_boolean(s),
            Self::Number(n) => xml_xpath_cast_number_to_boolean(*n),
            Self::Boolean(b) => *b,
            Self::LocationSet(locs) => !locs.is_empty(),
            Self::Undefined | Self::Users(_) => false,
            Self::Point { .. } | Self::Range { .. } => true,
        }
    }

    /// Converts an XPath object to its number value.
    #[doc(alias = "xmlXPathCastToNumber")]
    pub fn cast_to_number(&self, doc: &XmlDoc) -> f64 {
        match self {
            Self::Boolean(b) => xml_xpath_cast_boolean_to_number(*b),
            Self::Number(n) => *n,
            Self::String(s) => xml_xpath_cast_string_to_number(s),
            Self::NodeSet(_) | Self::XSLTTree(_) => {
                xml_xpath_cast_string_to_number(&self.cast_to_string(doc))
            }
            _ => XML_XPATH_NAN,
        }
    }

    /// Converts an existing object to its string value.
    ///
    /// A node-set converts to the string value of its first node in document order.
    #[doc(alias = "xmlXPathCastToString")]
    pub fn cast_to_string(&self, doc: &XmlDoc) -> String {
        match self {
            Self::NodeSet(set) | Self::XSLTTree(set) => set
                .iter()
                .min_by(|&a, &b| doc.cmp_document_order(a, b))
                .map(|node| doc.get_content(node))
                .unwrap_or_default(),
            Self::String(s) => s.clone(),
            Self::Boolean(b) => xml_xpath_cast_boolean_to_string(*b).to_owned(),
            Self::Number(n) => xml_xpath_cast_number_to_string(*n),
            _ => String::new(),
        }
    }
}

impl From<&str> for XmlXPathObject {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for XmlXPathObject {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for XmlXPathObject {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for XmlXPathObject {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<XmlNodeSet> for XmlXPathObject {
    fn from(value: XmlNodeSet) -> Self {
        Self::NodeSet(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_codes() {
        assert_eq!(XmlXPathObjectType::XPathXSLTTree as i32, 9);
        assert_eq!(
            XmlXPathObjectType::try_from(5).ok(),
            Some(XmlXPathObjectType::XPathPoint)
        );
        assert!(XmlXPathObjectType::try_from(10).is_err());
        assert_eq!(
            XmlXPathObject::from(1.5).typ(),
            XmlXPathObjectType::XPathNumber
        );
        assert_eq!(XmlXPathObject::default().typ(), XmlXPathObjectType::XPathUndefined);
    }

    #[test]
    fn casts() {
        let mut doc = XmlDoc::new();
        let root = doc.new_child(doc.root(), None, "a");
        let text = doc.new_text(" 42 ");
        doc.add_child(root, text);

        let set = XmlXPathObject::from(XmlNodeSet::from(vec![root]));
        assert!(set.cast_to_boolean());
        assert_eq!(set.cast_to_string(&doc), " 42 ");
        assert_eq!(set.cast_to_number(&doc), 42.0);

        let empty = XmlXPathObject::from(XmlNodeSet::new());
        assert!(!empty.cast_to_boolean());
        assert_eq!(empty.cast_to_string(&doc), "");
        assert!(empty.cast_to_number(&doc).is_nan());

        assert_eq!(XmlXPathObject::from(true).cast_to_string(&doc), "true");
        assert_eq!(XmlXPathObject::from(0.5).cast_to_string(&doc), "0.5");
        assert!(!XmlXPathObject::from(f64::NAN).cast_to_boolean());
        assert!(!XmlXPathObject::from("").cast_to_boolean());
        assert_eq!(XmlXPathObject::from(false).cast_to_number(&doc), 0.0);
    }

    #[test]
    fn user_data_equality() {
        let payload: Arc<dyn Any + Send + Sync> = Arc::new(7u8);
        let a = XmlXPathObjectUserData::External(payload.clone());
        let b = XmlXPathObjectUserData::External(payload);
        assert_eq!(a, b);
        assert_eq!(a.as_external().and_then(|v| v.downcast_ref::<u8>()), Some(&7));
        assert_ne!(a, XmlXPathObjectUserData::External(Arc::new(7u8)));
    }
}
