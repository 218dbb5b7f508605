use std::{
    io::{Write, stdout},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::Context;
use clap::Parser;
use xpfind::{
    generic_error,
    globals::parser_version,
    parser::xml_read_file,
    tree::{XmlDoc, XmlNodeId},
    xpath::{
        FindError, NamespaceSpecArg, XmlXPathFind, XmlXPathObject, XmlXPathObjectType,
        xml_xpath_debug,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum XpfindReturnCode {
    ReturnOk = 0,
    ErrRdfile = 4,
    ErrXpath = 10,
    ErrNamespace = 11,
}

impl From<XpfindReturnCode> for ExitCode {
    fn from(value: XpfindReturnCode) -> Self {
        ExitCode::from(value as u8)
    }
}

#[derive(clap::Parser, Debug)]
#[command(version, name = "xpfind", arg_required_else_help = true)]
struct CmdArgs {
    /// the XML document to query
    file: PathBuf,
    /// the XPath expression to evaluate
    expr: String,
    /// bind a namespace as PREFIX:URI; a bare PREFIX is accepted but never registered
    #[arg(long, value_name = "PREFIX:URI")]
    ns: Vec<String>,
    /// evaluate EXPR relative to the first node selected by this path
    #[arg(long, value_name = "XPATH")]
    node: Option<String>,
    /// --encoding encoding : assume the input is in this encoding
    #[arg(long)]
    encoding: Option<String>,
    /// dump the result with the XPath inspector instead of printing values
    #[arg(long)]
    debug: bool,
    /// trace each stage on stderr
    #[arg(long)]
    verbose: bool,
}

impl CmdArgs {
    fn namespaces(&self) -> NamespaceSpecArg {
        if self.ns.is_empty() {
            NamespaceSpecArg::Absent
        } else {
            self.ns.iter().map(String::as_str).collect::<Vec<_>>().into()
        }
    }
}

fn failure_code(err: &FindError) -> XpfindReturnCode {
    match err {
        FindError::Namespace(_) => XpfindReturnCode::ErrNamespace,
        FindError::Query(_) => XpfindReturnCode::ErrXpath,
    }
}

/// Pick the context node: the document itself, or the first hit of `--node`.
fn select_context(
    args: &CmdArgs,
    doc: &XmlDoc,
) -> Result<Option<XmlNodeId>, (XpfindReturnCode, String)> {
    let Some(path) = args.node.as_deref() else {
        return Ok(Some(doc.root()));
    };
    let res = XmlXPathFind::new()
        .node(doc.root())
        .expression(path)
        .namespaces(args.namespaces())
        .find(doc)
        .map_err(|err| (failure_code(&err), format!("--node {path}: {err}")))?;
    match res.node_set() {
        Some(set) => Ok(set.get(0)),
        None => Err((
            XpfindReturnCode::ErrXpath,
            format!("--node {path}: expression does not select nodes"),
        )),
    }
}

fn print_result(out: &mut impl Write, doc: &XmlDoc, res: &XmlXPathObject) -> anyhow::Result<()> {
    match res {
        XmlXPathObject::NodeSet(set) | XmlXPathObject::XSLTTree(set) => {
            if set.is_empty() {
                eprintln!("XPath set is empty");
            }
            for node in set.iter() {
                writeln!(out, "{}", doc.get_content(node))?;
            }
        }
        XmlXPathObject::Boolean(_) | XmlXPathObject::Number(_) | XmlXPathObject::String(_) => {
            writeln!(out, "{}", res.cast_to_string(doc))?;
        }
        _ => {
            eprintln!("XPath object of unexpected type");
        }
    }
    out.flush()?;
    Ok(())
}

fn run(args: &CmdArgs) -> anyhow::Result<XpfindReturnCode> {
    if args.verbose {
        generic_error!("{}\n", parser_version());
    }
    let doc = match xml_read_file(&args.file, args.encoding.as_deref()) {
        Ok(doc) => doc,
        Err(err) => {
            eprintln!("{err}");
            return Ok(XpfindReturnCode::ErrRdfile);
        }
    };
    if args.verbose {
        generic_error!("parsed {}: {} nodes\n", args.file.display(), doc.node_count());
    }

    let node = match select_context(args, &doc) {
        Ok(Some(node)) => node,
        Ok(None) => {
            eprintln!("--node selected no nodes");
            return Ok(XpfindReturnCode::ErrXpath);
        }
        Err((code, msg)) => {
            eprintln!("{msg}");
            return Ok(code);
        }
    };
    if args.verbose {
        generic_error!(
            "context node: {}\n",
            doc.qualified_name(node).unwrap_or_else(|| "/".to_owned())
        );
    }

    let res = match XmlXPathFind::new()
        .node(node)
        .expression(args.expr.as_str())
        .namespaces(args.namespaces())
        .find(&doc)
    {
        Ok(res) => res,
        Err(err) => {
            eprintln!("XPath evaluation failure: {err}");
            return Ok(failure_code(&err));
        }
    };
    if args.verbose {
        generic_error!("result type: {:?}\n", res.typ());
    }

    let mut out = stdout().lock();
    if args.debug {
        xml_xpath_debug(&doc, Some(&res), &mut out);
        out.flush().context("failed to flush the debug dump")?;
    } else {
        print_result(&mut out, &doc, &res).context("failed to write the result")?;
    }
    if res.typ() == XmlXPathObjectType::XPathUndefined {
        return Ok(XpfindReturnCode::ErrXpath);
    }
    Ok(XpfindReturnCode::ReturnOk)
}

fn main() -> ExitCode {
    let args = CmdArgs::parse();
    match run(&args) {
        Ok(code) => code.into(),
        Err(err) => {
            eprintln!("{err:#}");
            XpfindReturnCode::ErrRdfile.into()
        }
    }
}
