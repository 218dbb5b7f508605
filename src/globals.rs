use std::{borrow::Cow, cell::RefCell, io::Write};

use const_format::concatcp;

use crate::error::generic_error_default;

pub type GenericError = fn(Option<&mut (dyn Write + 'static)>, &str);

pub struct XmlGlobalState {
    parser_version: Cow<'static, str>,
    pub(crate) generic_error: GenericError,
    pub(crate) generic_error_context: Option<Box<dyn Write>>,
}

impl XmlGlobalState {
    fn new() -> Self {
        const VERSION_STRING: &str =
            concatcp!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));
        Self {
            parser_version: Cow::Borrowed(VERSION_STRING),
            generic_error: generic_error_default,
            generic_error_context: None,
        }
    }
}

thread_local! {
    pub static GLOBAL_STATE: RefCell<XmlGlobalState> = RefCell::new(XmlGlobalState::new());
}

/// Set new generic error function and generic error context.
///
/// If `func` is `None`, set `generic_error_default`.
/// If `context` is `None`, current context is clear and no context is set.
pub fn set_generic_error(func: Option<GenericError>, context: Option<impl Write + 'static>) {
    GLOBAL_STATE.with_borrow_mut(|state| {
        state.generic_error = func.unwrap_or(generic_error_default);
        state.generic_error_context = context.map(|context| {
            let boxed: Box<dyn Write + 'static> = Box::new(context);
            boxed
        });
    });
}

/// Restore the default generic error handler and drop the registered context.
pub fn reset_generic_error() {
    set_generic_error(None, None::<Vec<u8>>);
}

/// Send `msg` through the current generic error handler.
///
/// Prefer the [`generic_error!`](crate::generic_error) macro.
pub fn xml_generic_error(msg: &str) {
    GLOBAL_STATE.with_borrow_mut(|state| {
        let handler = state.generic_error;
        handler(state.generic_error_context.as_deref_mut(), msg);
    });
}

/// The name and version of this library, e.g. `xpfind 0.1.0`.
pub fn parser_version() -> Cow<'static, str> {
    GLOBAL_STATE.with_borrow(|state| state.parser_version.clone())
}

/// Format a message and send it through the generic error handler.
#[macro_export]
macro_rules! generic_error {
    ( $fmt:literal $(, $args:expr )* $(,)? ) => {
        $crate::globals::xml_generic_error(&format!($fmt $(, $args )*))
    };
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn generic_error_goes_to_registered_context() {
        let buf = SharedBuf::default();
        set_generic_error(None, Some(buf.clone()));
        crate::generic_error!("Pbm popping {} NS\n", 2);
        reset_generic_error();
        assert_eq!(buf.0.borrow().as_slice(), b"Pbm popping 2 NS\n");
    }

    #[test]
    fn custom_handler_is_used() {
        fn prefixed(out: Option<&mut (dyn Write + 'static)>, msg: &str) {
            if let Some(out) = out {
                write!(out, "custom: {msg}").ok();
            }
        }
        let buf = SharedBuf::default();
        set_generic_error(Some(prefixed), Some(buf.clone()));
        crate::generic_error!("hello\n");
        reset_generic_error();
        assert_eq!(buf.0.borrow().as_slice(), b"custom: hello\n");
    }

    #[test]
    fn version_string_names_the_crate() {
        let version = parser_version();
        assert!(version.starts_with("xpfind "));
        assert!(version.ends_with(env!("CARGO_PKG_VERSION")));
    }
}
