use std::collections::HashSet;

use crate::tree::{XmlDoc, XmlNodeId};

// when evaluating an XPath expression nodesets are created and we
// arbitrary limit the maximum length of those node set. 10000000 is
// an insanely large value which should never be reached under normal
// circumstances, one would first need to construct an in memory tree
// with more than 10 millions nodes.
pub(crate) const XPATH_MAX_NODESET_LENGTH: usize = 10000000;

/// A node-set (an unordered collection of nodes without duplicates).
///
/// Sets produced by evaluation are sorted in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNodeSet {
    pub node_tab: Vec<XmlNodeId>,
}

impl XmlNodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a node-set holding `val`.
    #[doc(alias = "xmlXPathNodeSetCreate")]
    pub fn with_value(val: XmlNodeId) -> Self {
        Self {
            node_tab: vec![val],
        }
    }

    /// Implement a functionality similar to the DOM NodeList.length.
    #[doc(alias = "xmlXPathNodeSetGetLength")]
    pub fn len(&self) -> usize {
        self.node_tab.len()
    }

    #[doc(alias = "xmlXPathNodeSetIsEmpty")]
    pub fn is_empty(&self) -> bool {
        self.node_tab.is_empty()
    }

    /// Implements a functionality similar to the DOM NodeList.item().
    #[doc(alias = "xmlXPathNodeSetItem")]
    pub fn get(&self, index: usize) -> Option<XmlNodeId> {
        self.node_tab.get(index).copied()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = XmlNodeId> + ExactSizeIterator + '_ {
        self.node_tab.iter().copied()
    }

    /// Checks whether `val` is part of the set.
    #[doc(alias = "xmlXPathNodeSetContains")]
    pub fn contains(&self, val: XmlNodeId) -> bool {
        self.node_tab.contains(&val)
    }

    /// Add a node to the set unless it is already there.
    #[doc(alias = "xmlXPathNodeSetAdd")]
    pub fn add(&mut self, val: XmlNodeId) {
        if !self.contains(val) && self.node_tab.len() < XPATH_MAX_NODESET_LENGTH {
            self.node_tab.push(val);
        }
    }

    /// Merge the nodes of `other` into `self`, skipping the ones already present.
    #[doc(alias = "xmlXPathNodeSetMerge")]
    pub fn merge(&mut self, other: &XmlNodeSet) {
        let mut seen = self.node_tab.iter().copied().collect::<HashSet<_>>();
        for node in other.iter() {
            if self.node_tab.len() >= XPATH_MAX_NODESET_LENGTH {
                break;
            }
            if seen.insert(node) {
                self.node_tab.push(node);
            }
        }
    }

    /// Sort the node set in document order.
    #[doc(alias = "xmlXPathNodeSetSort")]
    pub fn sort(&mut self, doc: &XmlDoc) {
        self.node_tab.sort_by(|&a, &b| doc.cmp_document_order(a, b));
    }
}

impl From<Vec<XmlNodeId>> for XmlNodeSet {
    fn from(node_tab: Vec<XmlNodeId>) -> Self {
        let mut set = Self::new();
        for node in node_tab {
            set.add(node);
        }
        set
    }
}

impl FromIterator<XmlNodeId> for XmlNodeSet {
    fn from_iter<T: IntoIterator<Item = XmlNodeId>>(iter: T) -> Self {
        let mut set = Self::new();
        set.merge(&Self {
            node_tab: iter.into_iter().collect(),
        });
        set
    }
}

impl IntoIterator for XmlNodeSet {
    type Item = XmlNodeId;
    type IntoIter = std::vec::IntoIter<XmlNodeId>;

    fn into_iter(self) -> Self::IntoIter {
        self.node_tab.into_iter()
    }
}

impl<'a> IntoIterator for &'a XmlNodeSet {
    type Item = &'a XmlNodeId;
    type IntoIter = std::slice::Iter<'a, XmlNodeId>;

    fn into_iter(self) -> Self::IntoIter {
        self.node_tab.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupe_merge_and_sort() {
        let mut doc = XmlDoc::new();
        let root = doc.new_child(doc.root(), None, "r");
        let a = doc.new_child(root, None, "a");
        let b = doc.new_child(root, None, "b");

        let mut set = XmlNodeSet::from(vec![b, a, b]);
        assert_eq!(set.len(), 2);
        set.merge(&XmlNodeSet::from(vec![root, a]));
        assert_eq!(set.node_tab, vec![b, a, root]);
        set.sort(&doc);
        assert_eq!(set.node_tab, vec![root, a, b]);
        assert!(set.contains(a));
        assert_eq!(set.get(3), None);
    }
}
