use std::num::NonZeroU32;

use super::XmlNodeId;

/// The namespace bound to the reserved `xml` prefix.
pub const XML_XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Handle of a namespace declaration owned by an [`XmlDoc`](super::XmlDoc).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct XmlNsId(NonZeroU32);

impl XmlNsId {
    pub(super) fn from_index(index: usize) -> Self {
        Self(NonZeroU32::MIN.saturating_add(index as u32))
    }

    pub(super) fn index(self) -> usize {
        self.0.get() as usize - 1
    }
}

/// A namespace declaration: `xmlns:prefix="href"`, or `xmlns="href"` when `prefix` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlNs {
    pub(super) prefix: Option<String>,
    pub(super) href: String,
    /// The element carrying the declaration. `None` for the implicit `xml` namespace.
    pub(super) node: Option<XmlNodeId>,
}

impl XmlNs {
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn href(&self) -> &str {
        &self.href
    }

    /// The element this namespace is declared on.
    pub fn node(&self) -> Option<XmlNodeId> {
        self.node
    }
}
