use std::{fmt::Display, ops::Range};

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::{Error, named_source};

#[derive(Error, Debug, Diagnostic)]
#[error("Unexpected character '{token}'")]
#[diagnostic(help("only digits, `+ - * /` and parentheses may appear in an expression"))]
pub struct UnexpectedCharacter {
    #[source_code]
    src: NamedSource<String>,

    #[label("this character")]
    bad_bit: SourceSpan,

    pub token: char,
}

impl UnexpectedCharacter {
    pub fn line(&self) -> usize {
        self.src.inner()[..self.bad_bit.offset()].matches('\n').count() + 1
    }
}

#[derive(Error, Debug, Diagnostic)]
#[error("integer literal `{literal}` does not fit in 64 bits")]
#[diagnostic(code(lex::literal_too_large))]
pub struct LiteralTooLarge {
    #[source_code]
    src: NamedSource<String>,

    #[label("this numeric literal")]
    bad_bit: SourceSpan,

    pub literal: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Literal,
    Plus,
    Minus,
    Star,
    Slash,
    LeftParen,
    RightParen,
    EndOfInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'de> {
    pub kind: TokenKind,
    pub value: Option<i64>,
    pub literal: &'de str,
    pub offset: usize,
}

impl Token<'_> {
    pub fn span(&self) -> SourceSpan {
        SourceSpan::from(self.offset..self.offset + self.literal.len())
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Literal => write!(f, "LITERAL"),
            TokenKind::Plus => write!(f, "PLUS"),
            TokenKind::Minus => write!(f, "MINUS"),
            TokenKind::Star => write!(f, "STAR"),
            TokenKind::Slash => write!(f, "SLASH"),
            TokenKind::LeftParen => write!(f, "LEFT_PAREN"),
            TokenKind::RightParen => write!(f, "RIGHT_PAREN"),
            TokenKind::EndOfInput => write!(f, "EOF"),
        }
    }
}

impl Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lit = self.literal;
        match self.value {
            Some(n) => write!(f, "{} {lit} {n}", self.kind),
            None => write!(f, "{} {lit} null", self.kind),
        }
    }
}

/// Anything the parser can pull tokens from.
///
/// Once the input is exhausted an implementation must keep returning a
/// [`TokenKind::EndOfInput`] token.
pub trait TokenSource<'de> {
    fn next_token(&mut self) -> Result<Token<'de>, Error>;
}

pub struct Lexer<'de> {
    filename: Option<&'de str>,
    whole: &'de str,
    rest: &'de str,
    pub byte: usize,
}

impl<'de> Lexer<'de> {
    pub fn new(filename: Option<&'de str>, input: &'de str) -> Self {
        Self::within(filename, input, 0..input.len())
    }

    /// Lexes only `range` of `whole`, keeping offsets relative to `whole`.
    pub fn within(filename: Option<&'de str>, whole: &'de str, range: Range<usize>) -> Self {
        Lexer {
            filename,
            whole,
            byte: range.start,
            rest: &whole[range],
        }
    }

    fn end_of_input(&self) -> Token<'de> {
        Token {
            kind: TokenKind::EndOfInput,
            value: None,
            literal: "",
            offset: self.byte,
        }
    }
}

impl<'de> TokenSource<'de> for Lexer<'de> {
    fn next_token(&mut self) -> Result<Token<'de>, Error> {
        let trimmed = self.rest.trim_start();
        self.byte += self.rest.len() - trimmed.len();
        self.rest = trimmed;

        let mut chars = self.rest.chars();
        let Some(c) = chars.next() else {
            return Ok(self.end_of_input());
        };
        let offset = self.byte;
        let cur = self.rest;

        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '0'..='9' => {
                let first_non_digit = cur
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(cur.len());
                let literal = &cur[..first_non_digit];
                self.byte += literal.len();
                self.rest = &cur[literal.len()..];

                let Ok(n) = literal.parse::<i64>() else {
                    return Err(LiteralTooLarge {
                        src: named_source(self.filename, self.whole),
                        bad_bit: SourceSpan::from(offset..self.byte),
                        literal: literal.to_string(),
                    }
                    .into());
                };
                return Ok(Token {
                    kind: TokenKind::Literal,
                    value: Some(n),
                    literal,
                    offset,
                });
            }
            c => {
                return Err(UnexpectedCharacter {
                    src: named_source(self.filename, self.whole),
                    bad_bit: SourceSpan::from(offset..offset + c.len_utf8()),
                    token: c,
                }
                .into());
            }
        };

        self.rest = chars.as_str();
        self.byte += c.len_utf8();
        Ok(Token {
            kind,
            value: None,
            literal: &cur[..c.len_utf8()],
            offset,
        })
    }
}

impl<'de> Iterator for Lexer<'de> {
    type Item = Result<Token<'de>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_token() {
            Ok(Token {
                kind: TokenKind::EndOfInput,
                ..
            }) => None,
            Err(e) => {
                // an error is final; don't report the same character forever
                self.rest = "";
                Some(Err(e))
            }
            token => Some(token),
        }
    }
}
