use std::fmt::Display;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;
use tracing::trace;

use crate::{
    Error, Lexer, named_source,
    lex::{Token, TokenKind, TokenSource},
};

#[derive(Error, Debug, Diagnostic)]
#[error("Unexpected {found}")]
#[diagnostic(help("expected {expected} here"))]
pub struct SyntaxError {
    #[source_code]
    src: NamedSource<String>,

    #[label("here")]
    bad_bit: SourceSpan,

    pub found: String,
    pub expected: String,
}

/// Deepest parenthesis nesting the parser accepts.
pub const MAX_NESTING: usize = 256;

#[derive(Error, Debug, Diagnostic)]
#[error("Parentheses nested deeper than {MAX_NESTING} levels")]
#[diagnostic(help("split the expression over several assignments"))]
pub struct NestingTooDeep {
    #[source_code]
    src: NamedSource<String>,

    #[label("this parenthesis")]
    bad_bit: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
}

/// A parsed arithmetic expression. Each node owns its children.
///
/// A long `1 + 1 + ...` chain nests as deep as it has operators, so
/// formatting and dropping walk the tree with an explicit stack.
#[derive(Debug, PartialEq, Eq)]
pub enum Node {
    Literal {
        value: i64,
    },
    BinaryOp {
        left: Box<Node>,
        op: Operator,
        right: Box<Node>,
        /// Where the operator sits in the source text.
        span: SourceSpan,
    },
}

impl Node {
    fn binary(left: Node, op: Operator, span: SourceSpan, right: Node) -> Self {
        Node::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
            span,
        }
    }

    fn take_children(&mut self, into: &mut Vec<Node>) {
        if let Node::BinaryOp { left, right, .. } = self {
            into.push(std::mem::replace(&mut **left, Node::Literal { value: 0 }));
            into.push(std::mem::replace(&mut **right, Node::Literal { value: 0 }));
        }
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.take_children(&mut pending);
        while let Some(mut node) = pending.pop() {
            node.take_children(&mut pending);
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operator::Add => write!(f, "+"),
            Operator::Sub => write!(f, "-"),
            Operator::Mul => write!(f, "*"),
            Operator::Div => write!(f, "/"),
        }
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        enum Item<'a> {
            Node(&'a Node),
            Text(&'static str),
        }

        let mut stack = vec![Item::Node(self)];
        while let Some(item) = stack.pop() {
            match item {
                Item::Text(text) => f.write_str(text)?,
                Item::Node(Node::Literal { value }) => write!(f, "{value}")?,
                Item::Node(Node::BinaryOp {
                    left, op, right, ..
                }) => {
                    write!(f, "({op} ")?;
                    stack.push(Item::Text(")"));
                    stack.push(Item::Node(&**right));
                    stack.push(Item::Text(" "));
                    stack.push(Item::Node(&**left));
                }
            }
        }
        Ok(())
    }
}

/// Recursive-descent parser over any [`TokenSource`]:
///
/// ```text
/// expr   := term (('+' | '-') term)*
/// term   := factor (('*' | '/') factor)*
/// factor := Literal | '(' expr ')'
/// ```
pub struct Parser<'de, S = Lexer<'de>> {
    filename: Option<&'de str>,
    whole: &'de str,
    tokens: S,
    current: Option<Token<'de>>,
    depth: usize,
}

impl<'de> Parser<'de> {
    pub fn new(filename: Option<&'de str>, whole: &'de str) -> Self {
        Self::with_tokens(filename, whole, Lexer::new(filename, whole))
    }
}

impl<'de, S: TokenSource<'de>> Parser<'de, S> {
    /// `whole` is the text the token offsets point into.
    pub fn with_tokens(filename: Option<&'de str>, whole: &'de str, tokens: S) -> Self {
        Parser {
            filename,
            whole,
            tokens,
            current: None,
            depth: 0,
        }
    }

    /// Parses one expression and requires that nothing follows it.
    pub fn parse(mut self) -> Result<Node, Error> {
        let node = self.expr()?;
        let trailing = self.current()?;
        if trailing.kind != TokenKind::EndOfInput {
            return Err(self.unexpected(trailing, "an operator or the end of the expression"));
        }
        trace!(%node, "parsed expression");
        Ok(node)
    }

    fn current(&mut self) -> Result<Token<'de>, Error> {
        if let Some(token) = self.current {
            return Ok(token);
        }
        let token = self.tokens.next_token()?;
        trace!(%token, "pulled token");
        self.current = Some(token);
        Ok(token)
    }

    fn eat(&mut self, expected: TokenKind) -> Result<Token<'de>, Error> {
        let token = self.current()?;
        if token.kind != expected {
            return Err(self.unexpected(token, describe(expected)));
        }
        self.current = None;
        Ok(token)
    }

    fn unexpected(&self, token: Token<'de>, expected: &str) -> Error {
        let found = match token.kind {
            TokenKind::EndOfInput => "end of expression".to_string(),
            _ => format!("token '{}'", token.literal),
        };
        SyntaxError {
            src: named_source(self.filename, self.whole),
            bad_bit: token.span(),
            found,
            expected: expected.to_string(),
        }
        .into()
    }

    pub fn expr(&mut self) -> Result<Node, Error> {
        let mut node = self.term()?;
        loop {
            let token = self.current()?;
            let op = match token.kind {
                TokenKind::Plus => Operator::Add,
                TokenKind::Minus => Operator::Sub,
                _ => break,
            };
            self.eat(token.kind)?;
            let right = self.term()?;
            node = Node::binary(node, op, token.span(), right);
        }
        Ok(node)
    }

    fn term(&mut self) -> Result<Node, Error> {
        let mut node = self.factor()?;
        loop {
            let token = self.current()?;
            let op = match token.kind {
                TokenKind::Star => Operator::Mul,
                TokenKind::Slash => Operator::Div,
                _ => break,
            };
            self.eat(token.kind)?;
            let right = self.factor()?;
            node = Node::binary(node, op, token.span(), right);
        }
        Ok(node)
    }

    fn factor(&mut self) -> Result<Node, Error> {
        let token = self.current()?;
        match (token.kind, token.value) {
            (TokenKind::Literal, Some(value)) => {
                self.eat(TokenKind::Literal)?;
                Ok(Node::Literal { value })
            }
            (TokenKind::LeftParen, _) => {
                self.eat(TokenKind::LeftParen)?;
                if self.depth == MAX_NESTING {
                    return Err(NestingTooDeep {
                        src: named_source(self.filename, self.whole),
                        bad_bit: token.span(),
                    }
                    .into());
                }
                self.depth += 1;
                let node = self.expr()?;
                self.depth -= 1;
                self.eat(TokenKind::RightParen)?;
                Ok(node)
            }
            _ => Err(self.unexpected(token, "a number or `(`")),
        }
    }
}

fn describe(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Literal => "a number",
        TokenKind::Plus => "`+`",
        TokenKind::Minus => "`-`",
        TokenKind::Star => "`*`",
        TokenKind::Slash => "`/`",
        TokenKind::LeftParen => "`(`",
        TokenKind::RightParen => "`)`",
        TokenKind::EndOfInput => "the end of the expression",
    }
}
