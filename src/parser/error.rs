use std::{error::Error, fmt::Display};

macro_rules! impl_xml_parser_errors {
    ( $( $variant:ident = $code:literal ),* $(,)? ) => {
        /// Error codes the parser can report, numbered as in libxml2's `xmlParserErrors`.
        #[repr(C)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum XmlParserErrors {
            $( $variant = $code ),*
        }

        impl TryFrom<i32> for XmlParserErrors {
            type Error = anyhow::Error;
            fn try_from(value: i32) -> Result<Self, Self::Error> {
                $(
                    if value == Self::$variant as i32 {
                        return Ok(Self::$variant);
                    }
                )*
                Err(anyhow::anyhow!("Invalid convert from value '{value}' to {}", std::any::type_name::<Self>()))
            }
        }

        impl Default for XmlParserErrors {
            fn default() -> Self {
                Self::XmlErrOK
            }
        }
    };
}
impl_xml_parser_errors!(
    XmlErrOK = 0,
    XmlErrInternalError = 1,
    XmlErrDocumentEmpty = 4,
    XmlErrDocumentEnd = 5,
    XmlErrInvalidCharRef = 8,
    XmlErrInvalidChar = 9,
    XmlErrEntityRefSemicolMissing = 23,
    XmlErrUndeclaredEntity = 26,
    XmlErrUnknownEncoding = 31,
    XmlErrUnsupportedEncoding = 32,
    XmlErrStringNotClosed = 34,
    XmlErrLtInAttribute = 38,
    XmlErrAttributeNotStarted = 39,
    XmlErrAttributeWithoutValue = 41,
    XmlErrAttributeRedefined = 42,
    XmlErrCommentNotFinished = 45,
    XmlErrPINotFinished = 47,
    XmlErrXMLDeclNotFinished = 57,
    XmlErrDoctypeNotFinished = 61,
    XmlErrCDATANotFinished = 63,
    XmlErrReservedXmlName = 64,
    XmlErrSpaceRequired = 65,
    XmlErrNameRequired = 68,
    XmlErrGtRequired = 73,
    XmlErrLtSlashRequired = 74,
    XmlErrEqualRequired = 75,
    XmlErrTagNameMismatch = 76,
    XmlErrTagNotFinished = 77,
    XmlNsErrXmlNamespace = 200,
    XmlNsErrUndefinedNamespace = 201,
    XmlNsErrQname = 202,
    XmlNsErrAttributeRedefined = 203,
    XmlNsErrEmpty = 204,
    XmlIOLoadError = 1549,
);

impl XmlParserErrors {
    pub fn is_ok(&self) -> bool {
        *self == Self::XmlErrOK
    }
}

/// A fatal parse error and the position it was detected at.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlParserError {
    pub code: XmlParserErrors,
    pub message: String,
    pub file: Option<String>,
    /// 1-based line.
    pub line: usize,
    /// 1-based column, counted in characters.
    pub column: usize,
}

impl Display for XmlParserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.file.as_deref() {
            Some(file) => write!(f, "{file}:{}: ", self.line)?,
            None => write!(f, "Entity: line {}: ", self.line)?,
        }
        write!(f, "parser error : {}", self.message)
    }
}

impl Error for XmlParserError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_i32() {
        assert_eq!(XmlParserErrors::XmlNsErrUndefinedNamespace as i32, 201);
        assert_eq!(
            XmlParserErrors::try_from(76).ok(),
            Some(XmlParserErrors::XmlErrTagNameMismatch)
        );
        assert!(XmlParserErrors::try_from(2).is_err());
        assert!(XmlParserErrors::default().is_ok());
    }

    #[test]
    fn display_matches_libxml_layout() {
        let err = XmlParserError {
            code: XmlParserErrors::XmlErrTagNameMismatch,
            message: "Opening and ending tag mismatch: a line 1 and b".to_owned(),
            file: Some("in.xml".to_owned()),
            line: 3,
            column: 7,
        };
        assert_eq!(
            err.to_string(),
            "in.xml:3: parser error : Opening and ending tag mismatch: a line 1 and b"
        );
    }
}
