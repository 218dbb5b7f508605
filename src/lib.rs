//! Namespace-aware XPath queries over an in-memory XML tree.
//!
//! The query pipeline lives in [`xpath::find`]: a caller-supplied namespace specification is
//! normalized into `(prefix, uri)` pairs, merged with the namespaces in scope at the context
//! node, and the compiled expression is evaluated into a typed [`xpath::XmlXPathObject`].
//!
//! ```
//! use xpfind::{parser::xml_read_str, xpath::{XmlXPathFind, XmlXPathObjectType}};
//!
//! let doc = xml_read_str(r#"<doc xmlns:xi="http://www.w3.org/2001/XInclude"><xi:include/></doc>"#)
//!     .unwrap();
//! let res = XmlXPathFind::new()
//!     .node(doc.root())
//!     .expression("//xi:include")
//!     .find(&doc)
//!     .unwrap();
//! assert_eq!(res.typ(), XmlXPathObjectType::XPathNodeset);
//! assert_eq!(res.node_set().map(|set| set.len()), Some(1));
//! ```

#![allow(clippy::new_without_default)]

pub mod error;
pub mod globals;
pub mod parser;
pub mod tree;
pub mod xpath;

#[cfg(feature = "libxml_debug")]
pub mod debug_xml;
