//! XPath 1.0 tokenizer and compiler.
//!
//! The expression is first split into tokens, resolving the lexical ambiguities of
//! <https://www.w3.org/TR/1999/REC-xpath-19991116/#exprlex>, then compiled by recursive
//! descent into a flat array of [`XmlXPathStepOp`]. Children of an operation are indices
//! into that array, so a compiled expression owns all of its parts and is freed as a whole.

use crate::parser::XmlParserCharValid;

use super::{
    XPATH_MAX_RECURSION_DEPTH, XPATH_MAX_STEPS, XmlXPathAxisVal, XmlXPathError, XmlXPathObject,
    XmlXPathOp, XmlXPathTestVal, XmlXPathTypeVal, xml_xpath_err,
};

/// Extra operand attached to a step operation.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlXPathStepOpValue {
    String(String),
    Object(Box<XmlXPathObject>),
}

impl XmlXPathStepOpValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&XmlXPathObject> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

/// One operation of a compiled expression.
///
/// The meaning of the value fields depends on `op`:
///
/// | op         | value      | value2 | value3 | value4 | value5 |
/// |------------|------------|--------|--------|--------|--------|
/// | `Equal`    | 1 for `=`, 0 for `!=` | | | | |
/// | `Cmp`      | 1 for `<`  | 1 if strict | | | |
/// | `Plus`     | 1 add, 0 sub, 2 negate, 3 to number | | | | |
/// | `Mult`     | 0 `*`, 1 `div`, 2 `mod` | | | | |
/// | `Collect`  | axis       | test   | type   | prefix | name   |
/// | `Value`    |            |        |        | object |        |
/// | `Variable` |            |        |        | name   | prefix |
/// | `Function` | arg count  |        |        | name   | prefix |
#[derive(Debug, Clone, PartialEq)]
pub struct XmlXPathStepOp {
    pub op: XmlXPathOp,
    pub ch1: Option<usize>,
    pub ch2: Option<usize>,
    pub value: i32,
    pub value2: i32,
    pub value3: i32,
    pub value4: Option<XmlXPathStepOpValue>,
    pub value5: Option<XmlXPathStepOpValue>,
}

/// A compiled XPath expression.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlXPathCompExpr {
    pub(crate) steps: Vec<XmlXPathStepOp>,
    /// Index of the root operation.
    pub(crate) last: Option<usize>,
    pub(crate) expr: String,
}

impl XmlXPathCompExpr {
    pub fn steps(&self) -> &[XmlXPathStepOp] {
        &self.steps
    }

    pub fn last(&self) -> Option<usize> {
        self.last
    }

    /// The source text this expression was compiled from.
    pub fn expr(&self) -> &str {
        &self.expr
    }

    /// Compile `expr`, returning the error code and the byte offset it was detected at.
    pub(crate) fn parse(expr: &str) -> Result<Self, (XmlXPathError, usize)> {
        let tokens = tokenize(expr)?;
        let mut compiler = XmlXPathCompiler {
            tokens,
            index: 0,
            end: expr.len(),
            comp: XmlXPathCompExpr {
                steps: vec![],
                last: None,
                expr: expr.to_owned(),
            },
            depth: 0,
        };
        if compiler.tokens.is_empty() {
            return Err((XmlXPathError::XPathExprError, 0));
        }
        compiler.compile_expr(true)?;
        if compiler.peek().is_some() {
            return Err((XmlXPathError::XPathExprError, compiler.pos()));
        }
        Ok(compiler.comp)
    }
}

/// Compile an XPath expression.
///
/// A syntax error is reported on the generic error channel with a caret under the
/// offending position, and its code is returned.
#[doc(alias = "xmlXPathCompile")]
pub fn xml_xpath_compile(expr: &str) -> Result<XmlXPathCompExpr, XmlXPathError> {
    XmlXPathCompExpr::parse(expr).map_err(|(code, pos)| {
        xml_xpath_err(expr, Some(pos), code);
        code
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TokenError {
    InvalidVariableReference,
    InvalidNCName,
    ExpectedOperator,
    UnterminatedStringLiteral,
    IllegalCharacter(char),
}

impl From<TokenError> for XmlXPathError {
    fn from(value: TokenError) -> Self {
        match value {
            TokenError::InvalidVariableReference => XmlXPathError::XPathVariableRefError,
            TokenError::InvalidNCName | TokenError::ExpectedOperator => {
                XmlXPathError::XPathExprError
            }
            TokenError::UnterminatedStringLiteral => XmlXPathError::XPathUnfinishedLiteralError,
            TokenError::IllegalCharacter(c) if !c.is_xml_char() => {
                XmlXPathError::XPathInvalidCharError
            }
            TokenError::IllegalCharacter(_) => XmlXPathError::XPathExprError,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct QName<'a> {
    prefix: Option<&'a str>,
    local_name: &'a str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OperatorToken {
    And,
    Or,
    Multiply,
    Modulo,
    Divide,
    Add,
    Subtract,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Equal,
    NotEqual,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Token<'a> {
    VariableReference(QName<'a>),
    /// A name test; the local name is `*` for wildcards.
    Name(QName<'a>),
    Operator(OperatorToken),
    Number(f64),
    Literal(&'a str),
    /// e.g. `child::`
    AxisIdentifier(&'a str),
    /// `..`
    ParentNode,
    /// `.`
    SelfNode,
    /// `/`
    Slash,
    /// `//`
    DoubleSlash,
    /// `foo(`
    FunctionCall(QName<'a>),
    /// `node(`, `text(`, `comment(`, `processing-instruction(`
    NodeType(XmlXPathTypeVal),
    OpeningParenthesis,
    ClosingParenthesis,
    OpeningBracket,
    ClosingBracket,
    Comma,
    AtSign,
    Union,
}

impl Token<'_> {
    fn starts_step(&self) -> bool {
        matches!(
            self,
            Self::AxisIdentifier(_)
                | Self::AtSign
                | Self::ParentNode
                | Self::SelfNode
                | Self::Name(_)
                | Self::NodeType(_)
        )
    }

    /// Whether a `*` or a name right after this token must be read as an operator.
    fn followed_by_operator(&self) -> bool {
        matches!(
            self,
            Self::Literal(_)
                | Self::Number(_)
                | Self::Name(_)
                | Self::VariableReference(_)
                | Self::ParentNode
                | Self::SelfNode
                | Self::ClosingBracket
                | Self::ClosingParenthesis
        )
    }
}

struct Tokenizer<'a> {
    input: &'a str,
    remaining: &'a str,
}

impl<'a> Tokenizer<'a> {
    fn pos(&self) -> usize {
        self.input.len() - self.remaining.len()
    }

    fn bump(&mut self, len: usize) {
        self.remaining = &self.remaining[len..];
    }

    fn skip_whitespace(&mut self) {
        self.remaining = self.remaining.trim_start_matches(|c: char| c.is_blank_char());
    }

    /// If the result is `Err(_)` then `self.remaining` is unchanged.
    fn consume_ncname(&mut self, allow_wildcard: bool) -> Result<&'a str, TokenError> {
        if allow_wildcard && self.remaining.starts_with('*') {
            self.bump(1);
            return Ok("*");
        }

        let mut chars = self.remaining.char_indices();
        if !chars
            .next()
            .is_some_and(|(_, c)| c.is_name_start_char() && c != ':')
        {
            return Err(TokenError::InvalidNCName);
        }
        let name_end = chars
            .find(|&(_, c)| !c.is_name_char() || c == ':')
            .map_or(self.remaining.len(), |(index, _)| index);

        let (ncname, remaining) = self.remaining.split_at(name_end);
        self.remaining = remaining;
        Ok(ncname)
    }

    fn consume_qname(&mut self) -> Result<QName<'a>, TokenError> {
        let first = self.consume_ncname(false)?;
        if self.remaining.starts_with(':') && !self.remaining.starts_with("::") {
            let saved = self.remaining;
            self.bump(1);
            match self.consume_ncname(false) {
                Ok(local_name) => {
                    return Ok(QName {
                        prefix: Some(first),
                        local_name,
                    });
                }
                Err(err) => {
                    self.remaining = saved;
                    return Err(err);
                }
            }
        }
        Ok(QName {
            prefix: None,
            local_name: first,
        })
    }

    /// Skip blanks and consume `what` if it comes next. Nothing is consumed otherwise.
    fn consume_after_whitespace(&mut self, what: &str) -> bool {
        let rest = self.remaining.trim_start_matches(|c: char| c.is_blank_char());
        match rest.strip_prefix(what) {
            Some(rest) => {
                self.remaining = rest;
                true
            }
            None => false,
        }
    }

    /// Parses a single token from the beginning and updates the remaining input accordingly.
    ///
    /// Must not be called on empty input.
    fn consume_single_token(&mut self, expect_operator_token: bool) -> Result<Token<'a>, TokenError> {
        if self.remaining.starts_with('$') {
            self.bump(1);
            let name = self
                .consume_qname()
                .map_err(|_| TokenError::InvalidVariableReference)?;
            return Ok(Token::VariableReference(name));
        }

        if let Ok(ncname) = self.consume_ncname(true) {
            if expect_operator_token {
                return match_operator_name(ncname).map(Token::Operator);
            }
            if ncname == "*" {
                return Ok(Token::Name(QName {
                    prefix: None,
                    local_name: ncname,
                }));
            }

            if self.remaining.starts_with(':') && !self.remaining.starts_with("::") {
                // The previous name was the prefix of a qualified name (foo:bar)
                self.bump(1);
                let name = QName {
                    prefix: Some(ncname),
                    local_name: self.consume_ncname(true)?,
                };
                if name.local_name != "*" && self.consume_after_whitespace("(") {
                    return Ok(Token::FunctionCall(name));
                }
                return Ok(Token::Name(name));
            }
            if self.consume_after_whitespace("::") {
                return Ok(Token::AxisIdentifier(ncname));
            }
            if self.consume_after_whitespace("(") {
                return Ok(match ncname {
                    "processing-instruction" => Token::NodeType(XmlXPathTypeVal::NodeTypePI),
                    "node" => Token::NodeType(XmlXPathTypeVal::NodeTypeNode),
                    "text" => Token::NodeType(XmlXPathTypeVal::NodeTypeText),
                    "comment" => Token::NodeType(XmlXPathTypeVal::NodeTypeComment),
                    _ => Token::FunctionCall(QName {
                        prefix: None,
                        local_name: ncname,
                    }),
                });
            }
            return Ok(Token::Name(QName {
                prefix: None,
                local_name: ncname,
            }));
        }

        let Some(c) = self.remaining.chars().next() else {
            return Err(TokenError::InvalidNCName);
        };
        let single = |token: Token<'a>| -> (usize, Result<Token<'a>, TokenError>) { (1, Ok(token)) };
        let (len, token) = match c {
            '0'..='9' => return Ok(Token::Number(self.consume_numeric_literal())),
            '\'' | '"' => return self.consume_string_literal().map(Token::Literal),
            '.' => match self.remaining[1..].chars().next() {
                // A period is the parent node (".."), a numeric literal (".123") or the
                // self node (".").
                Some('0'..='9') => return Ok(Token::Number(self.consume_numeric_literal())),
                Some('.') => (2, Ok(Token::ParentNode)),
                _ => single(Token::SelfNode),
            },
            '/' if self.remaining.starts_with("//") => (2, Ok(Token::DoubleSlash)),
            '/' => single(Token::Slash),
            '-' => single(Token::Operator(OperatorToken::Subtract)),
            '+' => single(Token::Operator(OperatorToken::Add)),
            '=' => single(Token::Operator(OperatorToken::Equal)),
            '!' if self.remaining.starts_with("!=") => {
                (2, Ok(Token::Operator(OperatorToken::NotEqual)))
            }
            '<' if self.remaining.starts_with("<=") => {
                (2, Ok(Token::Operator(OperatorToken::LessThanOrEqual)))
            }
            '<' => single(Token::Operator(OperatorToken::LessThan)),
            '>' if self.remaining.starts_with(">=") => {
                (2, Ok(Token::Operator(OperatorToken::GreaterThanOrEqual)))
            }
            '>' => single(Token::Operator(OperatorToken::GreaterThan)),
            '(' => single(Token::OpeningParenthesis),
            ')' => single(Token::ClosingParenthesis),
            '[' => single(Token::OpeningBracket),
            ']' => single(Token::ClosingBracket),
            ',' => single(Token::Comma),
            '@' => single(Token::AtSign),
            '|' => single(Token::Union),
            other => (0, Err(TokenError::IllegalCharacter(other))),
        };
        self.bump(len);
        token
    }

    fn consume_string_literal(&mut self) -> Result<&'a str, TokenError> {
        let input = self.remaining;
        let quote = &input[..1];
        let Some((literal, remaining)) = input[1..].split_once(quote) else {
            return Err(TokenError::UnterminatedStringLiteral);
        };
        self.remaining = remaining;
        Ok(literal)
    }

    /// <https://www.w3.org/TR/1999/REC-xpath-19991116/#NT-Number>
    fn consume_numeric_literal(&mut self) -> f64 {
        let mut has_period = false;
        let end = self
            .remaining
            .char_indices()
            .find(|&(_, c)| {
                let is_first_period = !has_period && c == '.';
                has_period |= c == '.';
                !c.is_ascii_digit() && !is_first_period
            })
            .map_or(self.remaining.len(), |(index, _)| index);
        let (number, remaining) = self.remaining.split_at(end);
        self.remaining = remaining;
        number.parse().unwrap_or(f64::NAN)
    }
}

fn match_operator_name(operator_name: &str) -> Result<OperatorToken, TokenError> {
    match operator_name {
        "and" => Ok(OperatorToken::And),
        "or" => Ok(OperatorToken::Or),
        "mod" => Ok(OperatorToken::Modulo),
        "div" => Ok(OperatorToken::Divide),
        "*" => Ok(OperatorToken::Multiply),
        _ => Err(TokenError::ExpectedOperator),
    }
}

/// Split `input` into tokens paired with their byte offsets.
fn tokenize(input: &str) -> Result<Vec<(Token<'_>, usize)>, (XmlXPathError, usize)> {
    let mut tokenizer = Tokenizer {
        input,
        remaining: input,
    };
    let mut tokens = vec![];

    // If there is a preceding token and the preceding token is not one of @, ::, (, [, ,
    // or an Operator, then a * must be recognized as a MultiplyOperator and an NCName
    // must be recognized as an OperatorName.
    let mut expect_operator_token = false;

    tokenizer.skip_whitespace();
    while !tokenizer.remaining.is_empty() {
        let pos = tokenizer.pos();
        let token = tokenizer
            .consume_single_token(expect_operator_token)
            .map_err(|err| (XmlXPathError::from(err), pos))?;
        tokens.push((token, pos));
        expect_operator_token = token.followed_by_operator();
        tokenizer.skip_whitespace();
    }
    Ok(tokens)
}

type CompileResult<T> = Result<T, (XmlXPathError, usize)>;

struct XmlXPathCompiler<'a> {
    tokens: Vec<(Token<'a>, usize)>,
    index: usize,
    end: usize,
    comp: XmlXPathCompExpr,
    depth: usize,
}

impl<'a> XmlXPathCompiler<'a> {
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.index).map(|&(token, _)| token)
    }

    fn pos(&self) -> usize {
        self.tokens.get(self.index).map_or(self.end, |&(_, pos)| pos)
    }

    fn advance(&mut self) {
        self.index += 1;
    }

    fn error<T>(&self, code: XmlXPathError) -> CompileResult<T> {
        Err((code, self.pos()))
    }

    fn next_is(&self, token: Token) -> bool {
        self.peek() == Some(token)
    }

    /// Add a step to an XPath Compiled Expression
    ///
    /// Returns the index of the new step.
    #[allow(clippy::too_many_arguments)]
    #[doc(alias = "xmlXPathCompExprAdd")]
    fn add_compiled_expression(
        &mut self,
        ch1: Option<usize>,
        ch2: Option<usize>,
        op: XmlXPathOp,
        value: i32,
        value2: i32,
        value3: i32,
        value4: Option<XmlXPathStepOpValue>,
        value5: Option<XmlXPathStepOpValue>,
    ) -> CompileResult<usize> {
        if self.comp.steps.len() >= XPATH_MAX_STEPS {
            return self.error(XmlXPathError::XPathMemoryError);
        }
        self.comp.steps.push(XmlXPathStepOp {
            op,
            ch1,
            ch2,
            value,
            value2,
            value3,
            value4,
            value5,
        });
        let index = self.comp.steps.len() - 1;
        self.comp.last = Some(index);
        Ok(index)
    }

    fn push_binary(
        &mut self,
        op: XmlXPathOp,
        ch1: Option<usize>,
        ch2: Option<usize>,
        value: i32,
        value2: i32,
    ) -> CompileResult<usize> {
        self.add_compiled_expression(ch1, ch2, op, value, value2, 0, None, None)
    }

    fn push_collect_dos(&mut self) -> CompileResult<usize> {
        self.add_compiled_expression(
            self.comp.last,
            None,
            XmlXPathOp::XPathOpCollect,
            XmlXPathAxisVal::AxisDescendantOrSelf as i32,
            XmlXPathTestVal::NodeTestType as i32,
            XmlXPathTypeVal::NodeTypeNode as i32,
            None,
            None,
        )
    }

    /// ```text
    /// [14]   Expr ::=   OrExpr
    /// [21]   OrExpr ::=   AndExpr | OrExpr 'or' AndExpr
    /// ```
    #[doc(alias = "xmlXPathCompileExpr")]
    fn compile_expr(&mut self, sort: bool) -> CompileResult<()> {
        if self.depth >= XPATH_MAX_RECURSION_DEPTH {
            return self.error(XmlXPathError::XPathRecursionLimitExceeded);
        }
        // Parsing a single '(' goes through about 10 functions before recursing.
        self.depth += 10;

        self.compile_and_expr()?;
        while self.next_is(Token::Operator(OperatorToken::Or)) {
            let op1 = self.comp.last;
            self.advance();
            self.compile_and_expr()?;
            self.push_binary(XmlXPathOp::XPathOpOr, op1, self.comp.last, 0, 0)?;
        }
        if sort
            && self
                .comp
                .last
                .is_some_and(|last| self.comp.steps[last].op != XmlXPathOp::XPathOpValue)
        {
            // Node-sets of sub expressions whose result is consumed as a whole, such as the
            // argument of count(), do not need this.
            self.push_binary(XmlXPathOp::XPathOpSort, self.comp.last, None, 0, 0)?;
        }

        self.depth -= 10;
        Ok(())
    }

    /// `[22]   AndExpr ::=   EqualityExpr | AndExpr 'and' EqualityExpr`
    fn compile_and_expr(&mut self) -> CompileResult<()> {
        self.compile_equality_expr()?;
        while self.next_is(Token::Operator(OperatorToken::And)) {
            let op1 = self.comp.last;
            self.advance();
            self.compile_equality_expr()?;
            self.push_binary(XmlXPathOp::XPathOpAnd, op1, self.comp.last, 0, 0)?;
        }
        Ok(())
    }

    /// ```text
    /// [23]   EqualityExpr ::=   RelationalExpr
    ///                | EqualityExpr '=' RelationalExpr
    ///                | EqualityExpr '!=' RelationalExpr
    /// ```
    fn compile_equality_expr(&mut self) -> CompileResult<()> {
        self.compile_relational_expr()?;
        while let Some(Token::Operator(
            operator @ (OperatorToken::Equal | OperatorToken::NotEqual),
        )) = self.peek()
        {
            let op1 = self.comp.last;
            let eq = (operator == OperatorToken::Equal) as i32;
            self.advance();
            self.compile_relational_expr()?;
            self.push_binary(XmlXPathOp::XPathOpEqual, op1, self.comp.last, eq, 0)?;
        }
        Ok(())
    }

    /// ```text
    /// [24]   RelationalExpr ::=   AdditiveExpr
    ///                | RelationalExpr '<' AdditiveExpr
    ///                | RelationalExpr '>' AdditiveExpr
    ///                | RelationalExpr '<=' AdditiveExpr
    ///                | RelationalExpr '>=' AdditiveExpr
    /// ```
    fn compile_relational_expr(&mut self) -> CompileResult<()> {
        self.compile_additive_expr()?;
        while let Some(Token::Operator(
            operator @ (OperatorToken::LessThan
            | OperatorToken::LessThanOrEqual
            | OperatorToken::GreaterThan
            | OperatorToken::GreaterThanOrEqual),
        )) = self.peek()
        {
            let op1 = self.comp.last;
            let inf = matches!(
                operator,
                OperatorToken::LessThan | OperatorToken::LessThanOrEqual
            ) as i32;
            let strict = matches!(
                operator,
                OperatorToken::LessThan | OperatorToken::GreaterThan
            ) as i32;
            self.advance();
            self.compile_additive_expr()?;
            self.push_binary(XmlXPathOp::XPathOpCmp, op1, self.comp.last, inf, strict)?;
        }
        Ok(())
    }

    /// ```text
    /// [25]   AdditiveExpr ::=   MultiplicativeExpr
    ///                   | AdditiveExpr '+' MultiplicativeExpr
    ///                   | AdditiveExpr '-' MultiplicativeExpr
    /// ```
    fn compile_additive_expr(&mut self) -> CompileResult<()> {
        self.compile_multiplicative_expr()?;
        while let Some(Token::Operator(
            operator @ (OperatorToken::Add | OperatorToken::Subtract),
        )) = self.peek()
        {
            let op1 = self.comp.last;
            let plus = (operator == OperatorToken::Add) as i32;
            self.advance();
            self.compile_multiplicative_expr()?;
            self.push_binary(XmlXPathOp::XPathOpPlus, op1, self.comp.last, plus, 0)?;
        }
        Ok(())
    }

    /// ```text
    /// [26]   MultiplicativeExpr ::=   UnaryExpr
    ///                  | MultiplicativeExpr MultiplyOperator UnaryExpr
    ///                  | MultiplicativeExpr 'div' UnaryExpr
    ///                  | MultiplicativeExpr 'mod' UnaryExpr
    /// ```
    fn compile_multiplicative_expr(&mut self) -> CompileResult<()> {
        self.compile_unary_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Operator(OperatorToken::Multiply)) => 0,
                Some(Token::Operator(OperatorToken::Divide)) => 1,
                Some(Token::Operator(OperatorToken::Modulo)) => 2,
                _ => break,
            };
            let op1 = self.comp.last;
            self.advance();
            self.compile_unary_expr()?;
            self.push_binary(XmlXPathOp::XPathOpMult, op1, self.comp.last, op, 0)?;
        }
        Ok(())
    }

    /// `[27]   UnaryExpr ::=   UnionExpr | '-' UnaryExpr`
    fn compile_unary_expr(&mut self) -> CompileResult<()> {
        let mut minus = false;
        let mut found = false;
        while self.next_is(Token::Operator(OperatorToken::Subtract)) {
            minus = !minus;
            found = true;
            self.advance();
        }

        self.compile_union_expr()?;
        if found {
            let value = if minus { 2 } else { 3 };
            self.push_binary(XmlXPathOp::XPathOpPlus, self.comp.last, None, value, 0)?;
        }
        Ok(())
    }

    /// `[18]   UnionExpr ::=   PathExpr | UnionExpr '|' PathExpr`
    fn compile_union_expr(&mut self) -> CompileResult<()> {
        self.compile_path_expr()?;
        while self.next_is(Token::Union) {
            let op1 = self.comp.last;
            self.advance();
            self.compile_path_expr()?;
            self.push_binary(XmlXPathOp::XPathOpUnion, op1, self.comp.last, 0, 0)?;
        }
        Ok(())
    }

    /// ```text
    /// [19]   PathExpr ::=   LocationPath
    ///               | FilterExpr
    ///               | FilterExpr '/' RelativeLocationPath
    ///               | FilterExpr '//' RelativeLocationPath
    /// ```
    ///
    /// The / operator and // operators combine an arbitrary expression
    /// and a relative location path. It is an error if the expression
    /// does not evaluate to a node-set.
    fn compile_path_expr(&mut self) -> CompileResult<()> {
        match self.peek() {
            Some(
                Token::VariableReference(_)
                | Token::OpeningParenthesis
                | Token::Number(_)
                | Token::Literal(_)
                | Token::FunctionCall(_),
            ) => {
                self.compile_filter_expr()?;
                match self.peek() {
                    Some(Token::DoubleSlash) => {
                        self.advance();
                        self.push_collect_dos()?;
                        self.compile_relative_location_path()
                    }
                    Some(Token::Slash) => {
                        self.advance();
                        self.compile_relative_location_path()
                    }
                    _ => Ok(()),
                }
            }
            Some(Token::Slash | Token::DoubleSlash) => {
                self.push_binary(XmlXPathOp::XPathOpRoot, None, None, 0, 0)?;
                self.compile_location_path()
            }
            Some(token) if token.starts_step() => {
                self.push_binary(XmlXPathOp::XPathOpNode, None, None, 0, 0)?;
                self.compile_location_path()
            }
            _ => self.error(XmlXPathError::XPathExprError),
        }
    }

    /// ```text
    /// [1]   LocationPath ::=   RelativeLocationPath
    ///                    | AbsoluteLocationPath
    /// [2]   AbsoluteLocationPath ::=   '/' RelativeLocationPath?
    ///                    | AbbreviatedAbsoluteLocationPath
    /// [10]   AbbreviatedAbsoluteLocationPath ::=
    ///                          '//' RelativeLocationPath
    /// ```
    ///
    /// // is short for /descendant-or-self::node()/. For example,
    /// //para is short for /descendant-or-self::node()/child::para and
    /// so will select any para element in the document.
    #[doc(alias = "xmlXPathCompLocationPath")]
    fn compile_location_path(&mut self) -> CompileResult<()> {
        match self.peek() {
            Some(Token::DoubleSlash) => {
                self.advance();
                self.push_collect_dos()?;
                self.compile_relative_location_path()
            }
            Some(Token::Slash) => {
                self.advance();
                if self.peek().is_some_and(|token| token.starts_step()) {
                    self.compile_relative_location_path()?;
                }
                Ok(())
            }
            _ => self.compile_relative_location_path(),
        }
    }

    /// ```text
    /// [3]   RelativeLocationPath ::=   Step
    ///                     | RelativeLocationPath '/' Step
    ///                     | AbbreviatedRelativeLocationPath
    /// [11]  AbbreviatedRelativeLocationPath ::=   RelativeLocationPath '//' Step
    /// ```
    #[doc(alias = "xmlXPathCompRelativeLocationPath")]
    fn compile_relative_location_path(&mut self) -> CompileResult<()> {
        self.compile_step()?;
        loop {
            match self.peek() {
                Some(Token::DoubleSlash) => {
                    self.advance();
                    self.push_collect_dos()?;
                }
                Some(Token::Slash) => self.advance(),
                _ => return Ok(()),
            }
            self.compile_step()?;
        }
    }

    /// ```text
    /// [4] Step ::=   AxisSpecifier NodeTest Predicate* | AbbreviatedStep
    /// [12] AbbreviatedStep ::=   '.' | '..'
    /// [5] AxisSpecifier ::= AxisName '::' | AbbreviatedAxisSpecifier
    /// [13] AbbreviatedAxisSpecifier ::= '@'?
    /// ```
    ///
    /// A location step of . is short for self::node() and .. is short for parent::node().
    #[doc(alias = "xmlXPathCompStep")]
    fn compile_step(&mut self) -> CompileResult<()> {
        let axis = match self.peek() {
            Some(Token::ParentNode) => {
                self.advance();
                self.add_compiled_expression(
                    self.comp.last,
                    None,
                    XmlXPathOp::XPathOpCollect,
                    XmlXPathAxisVal::AxisParent as i32,
                    XmlXPathTestVal::NodeTestType as i32,
                    XmlXPathTypeVal::NodeTypeNode as i32,
                    None,
                    None,
                )?;
                return Ok(());
            }
            Some(Token::SelfNode) => {
                self.advance();
                return Ok(());
            }
            Some(Token::AxisIdentifier(name)) => {
                let Some(axis) = XmlXPathAxisVal::from_name(name) else {
                    return self.error(XmlXPathError::XPathExprError);
                };
                self.advance();
                axis
            }
            Some(Token::AtSign) => {
                self.advance();
                XmlXPathAxisVal::AxisAttribute
            }
            _ => XmlXPathAxisVal::AxisChild,
        };

        let (test, typ, prefix, name) = self.compile_node_test()?;

        let op1 = self.comp.last;
        self.comp.last = None;
        while self.next_is(Token::OpeningBracket) {
            self.compile_predicate(false)?;
        }

        let string = |s: Option<String>| s.map(XmlXPathStepOpValue::String);
        self.add_compiled_expression(
            op1,
            self.comp.last,
            XmlXPathOp::XPathOpCollect,
            axis as i32,
            test as i32,
            typ as i32,
            string(prefix),
            string(name),
        )?;
        Ok(())
    }

    /// ```text
    /// [7] NodeTest ::=   NameTest
    ///            | NodeType '(' ')'
    ///            | 'processing-instruction' '(' Literal ')'
    ///
    /// [37] NameTest ::=  '*'
    ///            | NCName ':' '*'
    ///            | QName
    /// ```
    ///
    /// Returns the test, the node type, and the prefix and name to match.
    #[doc(alias = "xmlXPathCompNodeTest")]
    #[allow(clippy::type_complexity)]
    fn compile_node_test(
        &mut self,
    ) -> CompileResult<(XmlXPathTestVal, XmlXPathTypeVal, Option<String>, Option<String>)> {
        match self.peek() {
            Some(Token::Name(QName {
                prefix,
                local_name,
            })) => {
                let prefix = prefix.map(|prefix| prefix.to_owned());
                self.advance();
                Ok(match (prefix, local_name) {
                    (None, "*") => (
                        XmlXPathTestVal::NodeTestAll,
                        XmlXPathTypeVal::NodeTypeNode,
                        None,
                        None,
                    ),
                    (Some(prefix), "*") => (
                        XmlXPathTestVal::NodeTestNs,
                        XmlXPathTypeVal::NodeTypeNode,
                        Some(prefix),
                        None,
                    ),
                    (prefix, name) => (
                        XmlXPathTestVal::NodeTestName,
                        XmlXPathTypeVal::NodeTypeNode,
                        prefix,
                        Some(name.to_owned()),
                    ),
                })
            }
            Some(Token::NodeType(typ)) => {
                self.advance();
                let mut test = XmlXPathTestVal::NodeTestType;
                let mut name = None;
                if typ == XmlXPathTypeVal::NodeTypePI {
                    // Specific case: search a PI by name.
                    if let Some(Token::Literal(target)) = self.peek() {
                        test = XmlXPathTestVal::NodeTestPI;
                        name = Some(target.to_owned());
                        self.advance();
                    }
                }
                if !self.next_is(Token::ClosingParenthesis) {
                    return self.error(XmlXPathError::XPathUnclosedError);
                }
                self.advance();
                Ok((test, typ, None, name))
            }
            _ => self.error(XmlXPathError::XPathExprError),
        }
    }

    /// `[20]   FilterExpr ::=   PrimaryExpr | FilterExpr Predicate`
    ///
    /// It is an error if the expression to be filtered does not evaluate to a node-set.
    #[doc(alias = "xmlXPathCompFilterExpr")]
    fn compile_filter_expr(&mut self) -> CompileResult<()> {
        self.compile_primary_expr()?;
        while self.next_is(Token::OpeningBracket) {
            self.compile_predicate(true)?;
        }
        Ok(())
    }

    /// ```text
    /// [15]   PrimaryExpr ::=   VariableReference
    ///                | '(' Expr ')'
    ///                | Literal
    ///                | Number
    ///                | FunctionCall
    /// ```
    #[doc(alias = "xmlXPathCompPrimaryExpr")]
    fn compile_primary_expr(&mut self) -> CompileResult<()> {
        match self.peek() {
            Some(Token::VariableReference(QName {
                prefix,
                local_name,
            })) => {
                let name = XmlXPathStepOpValue::String(local_name.to_owned());
                let prefix = prefix.map(|prefix| XmlXPathStepOpValue::String(prefix.to_owned()));
                self.advance();
                self.add_compiled_expression(
                    None,
                    None,
                    XmlXPathOp::XPathOpVariable,
                    0,
                    0,
                    0,
                    Some(name),
                    prefix,
                )?;
            }
            Some(Token::OpeningParenthesis) => {
                self.advance();
                self.compile_expr(true)?;
                if !self.next_is(Token::ClosingParenthesis) {
                    return self.error(XmlXPathError::XPathExprError);
                }
                self.advance();
            }
            Some(Token::Number(number)) => {
                self.advance();
                self.push_value(XmlXPathObject::Number(number))?;
            }
            Some(Token::Literal(literal)) => {
                let value = XmlXPathObject::String(literal.to_owned());
                self.advance();
                self.push_value(value)?;
            }
            Some(Token::FunctionCall(name)) => {
                let name = (name.prefix.map(|p| p.to_owned()), name.local_name.to_owned());
                self.advance();
                self.compile_function_call(name)?;
            }
            _ => return self.error(XmlXPathError::XPathExprError),
        }
        Ok(())
    }

    fn push_value(&mut self, value: XmlXPathObject) -> CompileResult<usize> {
        self.add_compiled_expression(
            None,
            None,
            XmlXPathOp::XPathOpValue,
            0,
            0,
            0,
            Some(XmlXPathStepOpValue::Object(Box::new(value))),
            None,
        )
    }

    /// ```text
    /// [16]   FunctionCall ::=   FunctionName '(' ( Argument ( ',' Argument)*)? ')'
    /// [17]   Argument ::=   Expr
    /// ```
    ///
    /// The opening parenthesis has already been consumed with the name.
    #[doc(alias = "xmlXPathCompFunctionCall")]
    fn compile_function_call(&mut self, (prefix, name): (Option<String>, String)) -> CompileResult<()> {
        // count() does not need its node-set sorted.
        let sort = !(prefix.is_none() && name == "count");
        let mut nbargs = 0;

        self.comp.last = None;
        if !self.next_is(Token::ClosingParenthesis) {
            loop {
                let op1 = self.comp.last;
                self.comp.last = None;
                self.compile_expr(sort)?;
                self.push_binary(XmlXPathOp::XPathOpArg, op1, self.comp.last, 0, 0)?;
                nbargs += 1;
                match self.peek() {
                    Some(Token::ClosingParenthesis) => break,
                    Some(Token::Comma) => self.advance(),
                    _ => return self.error(XmlXPathError::XPathExprError),
                }
            }
        }
        self.advance();
        self.add_compiled_expression(
            self.comp.last,
            None,
            XmlXPathOp::XPathOpFunction,
            nbargs,
            0,
            0,
            Some(XmlXPathStepOpValue::String(name)),
            prefix.map(XmlXPathStepOpValue::String),
        )?;
        Ok(())
    }

    /// ```text
    /// [8]   Predicate ::=   '[' PredicateExpr ']'
    /// [9]   PredicateExpr ::=   Expr
    /// ```
    #[doc(alias = "xmlXPathCompPredicate")]
    fn compile_predicate(&mut self, filter: bool) -> CompileResult<()> {
        let op1 = self.comp.last;
        if !self.next_is(Token::OpeningBracket) {
            return self.error(XmlXPathError::XPathInvalidPredicateError);
        }
        self.advance();

        self.comp.last = None;
        // Step predicates see their node list in axis order already.
        self.compile_expr(filter)?;
        if !self.next_is(Token::ClosingBracket) {
            return self.error(XmlXPathError::XPathInvalidPredicateError);
        }
        self.advance();

        let op = if filter {
            XmlXPathOp::XPathOpFilter
        } else {
            XmlXPathOp::XPathOpPredicate
        };
        self.push_binary(op, op1, self.comp.last, 0, 0)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ops(expr: &str) -> Vec<XmlXPathOp> {
        XmlXPathCompExpr::parse(expr)
            .unwrap()
            .steps()
            .iter()
            .map(|step| step.op)
            .collect()
    }

    fn parse_err(expr: &str) -> (XmlXPathError, usize) {
        XmlXPathCompExpr::parse(expr).unwrap_err()
    }

    #[test]
    fn tokenizes_operator_names_by_context() {
        let tokens = tokenize("div div div").unwrap();
        assert_eq!(
            tokens.iter().map(|&(token, _)| token).collect::<Vec<_>>(),
            vec![
                Token::Name(QName {
                    prefix: None,
                    local_name: "div"
                }),
                Token::Operator(OperatorToken::Divide),
                Token::Name(QName {
                    prefix: None,
                    local_name: "div"
                }),
            ]
        );
        let tokens = tokenize("* * @*").unwrap();
        assert_eq!(tokens[1].0, Token::Operator(OperatorToken::Multiply));
        assert_eq!(tokens[3].1, 5);
    }

    #[test]
    fn tokenizes_names_axes_and_calls() {
        let tokens = tokenize("child :: xi:include | f:g (1) | text ( )").unwrap();
        let tokens = tokens.iter().map(|&(token, _)| token).collect::<Vec<_>>();
        assert_eq!(tokens[0], Token::AxisIdentifier("child"));
        assert_eq!(
            tokens[1],
            Token::Name(QName {
                prefix: Some("xi"),
                local_name: "include"
            })
        );
        assert_eq!(
            tokens[3],
            Token::FunctionCall(QName {
                prefix: Some("f"),
                local_name: "g"
            })
        );
        assert_eq!(tokens[7], Token::NodeType(XmlXPathTypeVal::NodeTypeText));
        assert_eq!(
            tokenize("$p:v")
                .unwrap()
                .first()
                .map(|&(token, _)| token),
            Some(Token::VariableReference(QName {
                prefix: Some("p"),
                local_name: "v"
            }))
        );
    }

    #[test]
    fn numbers_and_literals() {
        let tokens = tokenize(".5 + 3. - '..'").unwrap();
        assert_eq!(tokens[0].0, Token::Number(0.5));
        assert_eq!(tokens[2].0, Token::Number(3.0));
        assert_eq!(tokens[4].0, Token::Literal(".."));
    }

    #[test]
    fn location_paths_compile_to_collect_chains() {
        assert_eq!(
            ops("//a"),
            vec![
                XmlXPathOp::XPathOpRoot,
                XmlXPathOp::XPathOpCollect,
                XmlXPathOp::XPathOpCollect,
                XmlXPathOp::XPathOpSort,
            ]
        );
        let comp = XmlXPathCompExpr::parse("a/@b").unwrap();
        let collect = &comp.steps()[2];
        assert_eq!(collect.op, XmlXPathOp::XPathOpCollect);
        assert_eq!(collect.value, XmlXPathAxisVal::AxisAttribute as i32);
        assert_eq!(collect.value2, XmlXPathTestVal::NodeTestName as i32);
        assert_eq!(collect.value5.as_ref().and_then(|v| v.as_str()), Some("b"));
        assert_eq!(collect.ch1, Some(1));
        assert_eq!(comp.last(), Some(3));
        assert_eq!(ops("1 + 2"), vec![
            XmlXPathOp::XPathOpValue,
            XmlXPathOp::XPathOpValue,
            XmlXPathOp::XPathOpPlus,
            XmlXPathOp::XPathOpSort,
        ]);
        assert_eq!(ops("'lit'"), vec![XmlXPathOp::XPathOpValue]);
    }

    #[test]
    fn predicates_and_function_arguments() {
        // Predicates are compiled before the step that owns them.
        let comp = XmlXPathCompExpr::parse("p:a[1][@x]").unwrap();
        let collect = comp
            .steps()
            .iter()
            .rfind(|step| step.op == XmlXPathOp::XPathOpCollect)
            .unwrap();
        assert_eq!(collect.value5.as_ref().and_then(|v| v.as_str()), Some("a"));
        assert_eq!(collect.value4.as_ref().and_then(|v| v.as_str()), Some("p"));
        let last_predicate = &comp.steps()[collect.ch2.unwrap()];
        assert_eq!(last_predicate.op, XmlXPathOp::XPathOpPredicate);
        assert_eq!(
            comp.steps()[last_predicate.ch1.unwrap()].op,
            XmlXPathOp::XPathOpPredicate
        );

        let comp = XmlXPathCompExpr::parse("concat('a', 'b', 'c')").unwrap();
        let func = comp
            .steps()
            .iter()
            .find(|step| step.op == XmlXPathOp::XPathOpFunction)
            .unwrap();
        assert_eq!(func.value, 3);
        assert_eq!(func.value4.as_ref().and_then(|v| v.as_str()), Some("concat"));
        assert_eq!(comp.steps()[func.ch1.unwrap()].op, XmlXPathOp::XPathOpArg);
    }

    #[test]
    fn syntax_errors() {
        assert_eq!(parse_err("///not valid").0, XmlXPathError::XPathExprError);
        assert_eq!(parse_err("").0, XmlXPathError::XPathExprError);
        assert_eq!(
            parse_err("'abc"),
            (XmlXPathError::XPathUnfinishedLiteralError, 0)
        );
        assert_eq!(
            parse_err("a[1"),
            (XmlXPathError::XPathInvalidPredicateError, 3)
        );
        assert_eq!(parse_err("$"), (XmlXPathError::XPathVariableRefError, 0));
        assert_eq!(
            parse_err("processing-instruction('x'"),
            (XmlXPathError::XPathUnclosedError, 26)
        );
        assert_eq!(parse_err("a # b"), (XmlXPathError::XPathExprError, 2));
        assert_eq!(parse_err("a \u{1}"), (XmlXPathError::XPathInvalidCharError, 2));
        assert_eq!(parse_err("bogus::a").0, XmlXPathError::XPathExprError);
        assert_eq!(parse_err("f(1,").0, XmlXPathError::XPathExprError);
        assert_eq!(parse_err("(1").0, XmlXPathError::XPathExprError);
    }

    #[test]
    fn nesting_limit() {
        // Each nested expression counts 10 against the limit.
        let deepest = format!("{}1{}", "(".repeat(99), ")".repeat(99));
        assert!(XmlXPathCompExpr::parse(&deepest).is_ok());
        let deep = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(
            parse_err(&deep).0,
            XmlXPathError::XPathRecursionLimitExceeded
        );
        let predicates = format!("a{}", "[b".repeat(100) + &"]".repeat(100));
        assert_eq!(
            parse_err(&predicates).0,
            XmlXPathError::XPathRecursionLimitExceeded
        );
    }
}
