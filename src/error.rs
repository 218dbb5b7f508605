use std::io::{Write, stderr};

/// The default generic error handler.
///
/// Writes `msg` to `out` if a context is registered, otherwise to stderr.
pub fn generic_error_default(out: Option<&mut (dyn Write + 'static)>, msg: &str) {
    if let Some(out) = out {
        write!(out, "{msg}").ok();
    } else {
        write!(stderr(), "{msg}").ok();
    }
}
