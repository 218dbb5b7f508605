use std::{borrow::Cow, collections::HashMap};

use crate::tree::{XML_XML_NAMESPACE, XmlDoc, XmlNodeId};

use super::{XmlNodeSet, XmlXPathCompExpr, XmlXPathError, XmlXPathObject, functions};

// (namespace URI, local name)
type QualifiedKey = (Option<String>, String);

// Values pushed by one evaluation never get close to this unless an extension function
// misbehaves.
const XPATH_MAX_STACK_DEPTH: usize = 1000000;

/// An XPath function.
///
/// The arguments are on the value stack of `ctxt`, the last argument on top. The function
/// pops exactly `nargs` values and pushes its result.
#[doc(alias = "xmlXPathFunction")]
pub type XmlXPathFunction = fn(ctxt: &mut XmlXPathParserContext, nargs: usize) -> Result<(), XmlXPathError>;

/// Expression evaluation occurs with respect to a context.
/// The context consists of:
///    - a node (the context node)
///    - a node list (the context node list)
///    - a set of variable bindings
///    - a function library
///    - the set of namespace declarations in scope for the expression
#[doc(alias = "xmlXPathContext")]
pub struct XmlXPathContext<'a> {
    // The current document
    pub doc: &'a XmlDoc,
    // The current node
    pub node: XmlNodeId,

    // Hash table of defined variables, keyed by namespace URI and name
    pub(crate) var_hash: HashMap<QualifiedKey, XmlXPathObject>,
    // Hash table of defined funcs
    pub(crate) func_hash: HashMap<QualifiedKey, XmlXPathFunction>,
    // The namespaces hash table
    pub(crate) ns_hash: HashMap<String, String>,

    // the context size
    pub(crate) context_size: usize,
    // the proximity position
    pub(crate) proximity_position: usize,

    pub(crate) depth: usize,
}

impl<'a> XmlXPathContext<'a> {
    /// Create a new XPath context with the core function library registered.
    ///
    /// The context node is the document node.
    #[doc(alias = "xmlXPathNewContext")]
    pub fn new(doc: &'a XmlDoc) -> Self {
        let mut ctxt = Self {
            doc,
            node: doc.root(),
            var_hash: HashMap::new(),
            func_hash: HashMap::new(),
            ns_hash: HashMap::new(),
            context_size: 1,
            proximity_position: 1,
            depth: 0,
        };
        ctxt.register_all_functions();
        ctxt
    }

    pub fn context_size(&self) -> usize {
        self.context_size
    }

    pub fn proximity_position(&self) -> usize {
        self.proximity_position
    }

    /// Register a new namespace. If `ns_uri` is `None` it unregisters the namespace.
    ///
    /// Returns 0 in case of success, -1 in case of error
    #[doc(alias = "xmlXPathRegisterNs")]
    pub fn register_ns(&mut self, prefix: &str, ns_uri: Option<&str>) -> i32 {
        if prefix.is_empty() {
            return -1;
        }
        match ns_uri {
            Some(ns_uri) => {
                self.ns_hash.insert(prefix.to_owned(), ns_uri.to_owned());
            }
            None => {
                self.ns_hash.remove(prefix);
            }
        }
        0
    }

    /// Search in the namespace declaration array of the context for the given
    /// namespace name associated to the given prefix.
    ///
    /// The `xml` prefix is always bound.
    #[doc(alias = "xmlXPathNsLookup")]
    pub fn lookup_ns(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_XML_NAMESPACE);
        }
        self.ns_hash.get(prefix).map(|uri| uri.as_str())
    }

    /// Cleanup the XPath context data associated to registered namespaces.
    #[doc(alias = "xmlXPathRegisteredNsCleanup")]
    pub fn registered_ns_cleanup(&mut self) {
        self.ns_hash.clear();
    }

    /// Register a new variable value. If `value` is `None` it unregisters the variable.
    #[doc(alias = "xmlXPathRegisterVariable")]
    pub fn register_variable(&mut self, name: &str, value: Option<XmlXPathObject>) {
        self.register_variable_ns(name, None, value);
    }

    /// Register a new variable value in a namespace.
    #[doc(alias = "xmlXPathRegisterVariableNS")]
    pub fn register_variable_ns(
        &mut self,
        name: &str,
        ns_uri: Option<&str>,
        value: Option<XmlXPathObject>,
    ) {
        let key = (ns_uri.map(str::to_owned), name.to_owned());
        match value {
            Some(value) => {
                self.var_hash.insert(key, value);
            }
            None => {
                self.var_hash.remove(&key);
            }
        }
    }

    /// Search in the Variable array of the context for the given variable value.
    #[doc(alias = "xmlXPathVariableLookupNS")]
    pub fn lookup_variable_ns(&self, name: &str, ns_uri: Option<&str>) -> Option<&XmlXPathObject> {
        self.var_hash
            .get(&(ns_uri.map(str::to_owned), name.to_owned()))
    }

    /// Register a new function. If `f` is `None` it unregisters the function
    ///
    /// Returns 0 in case of success, -1 in case of error
    #[doc(alias = "xmlXPathRegisterFunc")]
    pub fn register_function(
        &mut self,
        name: Cow<'static, str>,
        f: Option<XmlXPathFunction>,
    ) -> i32 {
        self.register_function_ns(name, None, f)
    }

    /// Register a new function. If `f` is `None` it unregisters the function
    ///
    /// Returns 0 in case of success, -1 in case of error
    #[doc(alias = "xmlXPathRegisterFuncNS")]
    pub fn register_function_ns(
        &mut self,
        name: Cow<'static, str>,
        ns_uri: Option<Cow<'static, str>>,
        f: Option<XmlXPathFunction>,
    ) -> i32 {
        let key = (ns_uri.map(Cow::into_owned), name.into_owned());
        let res = if let Some(f) = f {
            self.func_hash.insert(key, f).is_some()
        } else {
            self.func_hash.remove(&key).is_none()
        };
        -(res as i32)
    }

    /// Registers all default XPath functions in this context
    #[doc(alias = "xmlXPathRegisterAllFunctions")]
    pub fn register_all_functions(&mut self) {
        for &(name, f) in functions::CORE_FUNCTIONS {
            self.register_function(name.into(), Some(f));
        }
    }

    /// Search in the Function array of the context for the given function.
    #[doc(alias = "xmlXPathFunctionLookup")]
    pub fn lookup_function(&self, name: &str) -> Option<XmlXPathFunction> {
        self.lookup_function_ns(name, None)
    }

    /// Search in the Function array of the context for the given function.
    #[doc(alias = "xmlXPathFunctionLookupNS")]
    pub fn lookup_function_ns(&self, name: &str, ns_uri: Option<&str>) -> Option<XmlXPathFunction> {
        self.func_hash
            .get(&(ns_uri.map(str::to_owned), name.to_owned()))
            .copied()
    }
}

/// An XPath parser context. It contains pure parsing information,
/// an xmlXPathContext, and the stack of objects.
#[doc(alias = "xmlXPathParserContext")]
pub struct XmlXPathParserContext<'a, 'b> {
    // the evaluation context
    pub context: &'b mut XmlXPathContext<'a>,
    // the precompiled expression
    pub(crate) comp: &'b XmlXPathCompExpr,
    // stack of values
    pub(crate) value_tab: Vec<XmlXPathObject>,
}

impl<'a, 'b> XmlXPathParserContext<'a, 'b> {
    #[doc(alias = "xmlXPathCompParserContext")]
    pub fn new(comp: &'b XmlXPathCompExpr, context: &'b mut XmlXPathContext<'a>) -> Self {
        Self {
            context,
            comp,
            value_tab: vec![],
        }
    }

    pub fn doc(&self) -> &'a XmlDoc {
        self.context.doc
    }

    /// The value on top of the stack.
    pub fn value(&self) -> Option<&XmlXPathObject> {
        self.value_tab.last()
    }

    #[doc(alias = "valuePush")]
    pub fn value_push(&mut self, value: XmlXPathObject) -> Result<(), XmlXPathError> {
        if self.value_tab.len() >= XPATH_MAX_STACK_DEPTH {
            return Err(XmlXPathError::XPathMemoryError);
        }
        self.value_tab.push(value);
        Ok(())
    }

    #[doc(alias = "valuePop")]
    pub fn value_pop(&mut self) -> Result<XmlXPathObject, XmlXPathError> {
        self.value_tab.pop().ok_or(XmlXPathError::XPathInvalidOperand)
    }

    /// Pops a number from the stack, handling conversion if needed.
    #[doc(alias = "xmlXPathPopNumber")]
    pub fn pop_number(&mut self) -> Result<f64, XmlXPathError> {
        let obj = self.value_pop()?;
        Ok(obj.cast_to_number(self.context.doc))
    }

    /// Pops a boolean from the stack, handling conversion if needed.
    #[doc(alias = "xmlXPathPopBoolean")]
    pub fn pop_boolean(&mut self) -> Result<bool, XmlXPathError> {
        Ok(self.value_pop()?.cast_to_boolean())
    }

    /// Pops a string from the stack, handling conversion if needed.
    #[doc(alias = "xmlXPathPopString")]
    pub fn pop_string(&mut self) -> Result<String, XmlXPathError> {
        match self.value_pop()? {
            XmlXPathObject::String(s) => Ok(s),
            obj => Ok(obj.cast_to_string(self.context.doc)),
        }
    }

    /// Pops a node-set from the stack. Anything else is `XPathInvalidType`.
    #[doc(alias = "xmlXPathPopNodeSet")]
    pub fn pop_node_set(&mut self) -> Result<XmlNodeSet, XmlXPathError> {
        let Some(obj) = self.value_tab.last() else {
            return Err(XmlXPathError::XPathInvalidOperand);
        };
        if !obj.is_node_set() {
            return Err(XmlXPathError::XPathInvalidType);
        }
        match self.value_pop()? {
            XmlXPathObject::NodeSet(set) | XmlXPathObject::XSLTTree(set) => Ok(set),
            _ => Err(XmlXPathError::XPathInvalidType),
        }
    }
}
