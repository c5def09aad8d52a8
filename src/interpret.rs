use std::{collections::HashMap, fmt::Display, ops::Range};

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;
use tracing::debug;

use crate::{
    Error, Lexer, Parser,
    eval::Evaluator,
    lex::{Token, TokenKind, TokenSource},
    named_source,
};

#[derive(Error, Debug, Diagnostic)]
#[error("Program must end with `;`")]
#[diagnostic(help("terminate every assignment with ` ;`"))]
pub struct MissingTerminator {
    #[source_code]
    src: NamedSource<String>,

    #[label("expected `;` after this")]
    bad_bit: SourceSpan,
}

#[derive(Error, Debug, Diagnostic)]
#[error("Program contains no statements")]
#[diagnostic(help("write at least one `name = expression ;`"))]
pub struct EmptyProgram {
    #[source_code]
    src: NamedSource<String>,

    #[label("nothing to evaluate")]
    bad_bit: SourceSpan,
}

#[derive(Error, Debug, Diagnostic)]
#[error("Statement is not an assignment")]
#[diagnostic(help("write statements as `name = expression ;` with spaces around `=`"))]
pub struct AssignmentError {
    #[source_code]
    src: NamedSource<String>,

    #[label("expected `=` here")]
    bad_bit: SourceSpan,
}

#[derive(Error, Debug, Diagnostic)]
#[error("Variable `{name}` was not defined")]
pub struct UndefinedVariable {
    #[source_code]
    src: NamedSource<String>,

    #[label("not assigned by any earlier statement")]
    bad_bit: SourceSpan,

    #[help]
    hint: Option<String>,

    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    pub value: i64,
}

/// The bindings produced by one program run, in statement order.
///
/// Names may repeat; lookups see the most recent binding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    bindings: Vec<Binding>,
    /// Position of the latest binding for each name.
    latest: HashMap<String, usize>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.latest
            .get(name)
            .map(|&index| self.bindings[index].value)
    }

    pub fn bind(&mut self, name: impl Into<String>, value: i64) {
        let name = name.into();
        self.latest.insert(name.clone(), self.bindings.len());
        self.bindings.push(Binding { name, value });
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Binding> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn to_pairs(&self) -> Vec<(&str, i64)> {
        self.iter()
            .map(|binding| (binding.name.as_str(), binding.value))
            .collect()
    }
}

impl IntoIterator for Environment {
    type Item = Binding;
    type IntoIter = std::vec::IntoIter<Binding>;

    fn into_iter(self) -> Self::IntoIter {
        self.bindings.into_iter()
    }
}

impl<'a> IntoIterator for &'a Environment {
    type Item = &'a Binding;
    type IntoIter = std::slice::Iter<'a, Binding>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Display for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.name, self.value)
    }
}

impl Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for binding in &self.bindings {
            writeln!(f, "{binding}")?;
        }
        Ok(())
    }
}

/// Runs a program of `name = expression ;` statements.
pub struct Interpreter<'de> {
    filename: Option<&'de str>,
    whole: &'de str,
}

impl<'de> Interpreter<'de> {
    pub fn new(filename: Option<&'de str>, whole: &'de str) -> Self {
        Interpreter { filename, whole }
    }

    /// Evaluates every statement in order. The first failure aborts the
    /// run and no bindings are returned.
    #[tracing::instrument(level = "debug", skip_all, fields(file = self.filename.unwrap_or("<input>")))]
    pub fn run(&self) -> Result<Environment, Error> {
        let body = self.whole.trim_end();
        if !body.ends_with(';') {
            let last = body.chars().next_back().map_or(0, char::len_utf8);
            return Err(MissingTerminator {
                src: self.src(),
                bad_bit: SourceSpan::from(body.len() - last..body.len()),
            }
            .into());
        }

        // text after the final `;` is ignored
        let mut statements = Vec::new();
        let mut start = 0;
        for (end, _) in body.match_indices(';') {
            statements.push(start..end);
            start = end + 1;
        }
        if statements.is_empty() {
            return Err(EmptyProgram {
                src: self.src(),
                bad_bit: SourceSpan::from(0..body.len()),
            }
            .into());
        }
        debug!(count = statements.len(), "split program");

        let mut environment = Environment::new();
        for range in statements {
            self.statement(range, &mut environment)?;
        }
        Ok(environment)
    }

    fn statement(&self, range: Range<usize>, environment: &mut Environment) -> Result<(), Error> {
        let mut words = Words::new(self.whole, range.clone());
        let (name, equals) = (words.next(), words.next());
        let name = match (name, equals) {
            (Some(name), Some(equals)) if equals.text == "=" => name,
            (_, Some(word)) | (Some(word), None) => {
                return Err(self.not_an_assignment(word.span()));
            }
            (None, None) => {
                return Err(self.not_an_assignment(SourceSpan::from(range.start..range.end)));
            }
        };

        let operands = Operands {
            interpreter: self,
            environment: &*environment,
            pending: name.text,
            words,
            lexer: None,
            end: range.end,
        };
        let tree = Parser::with_tokens(self.filename, self.whole, operands).parse()?;
        let value = Evaluator::new(self.filename, self.whole).evaluate(&tree)?;

        debug!(name = name.text, value, "bound variable");
        environment.bind(name.text, value);
        Ok(())
    }

    fn not_an_assignment(&self, bad_bit: SourceSpan) -> Error {
        AssignmentError {
            src: self.src(),
            bad_bit,
        }
        .into()
    }

    fn src(&self) -> NamedSource<String> {
        named_source(self.filename, self.whole)
    }
}

#[derive(Debug, Clone, Copy)]
struct Word<'de> {
    text: &'de str,
    offset: usize,
}

impl Word<'_> {
    fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.text.len()
    }

    fn span(&self) -> SourceSpan {
        SourceSpan::from(self.range())
    }
}

/// Whitespace-separated words of a slice, with offsets into the whole text.
struct Words<'de> {
    rest: &'de str,
    byte: usize,
}

impl<'de> Words<'de> {
    fn new(whole: &'de str, range: Range<usize>) -> Self {
        Words {
            byte: range.start,
            rest: &whole[range],
        }
    }
}

impl<'de> Iterator for Words<'de> {
    type Item = Word<'de>;

    fn next(&mut self) -> Option<Self::Item> {
        let trimmed = self.rest.trim_start();
        self.byte += self.rest.len() - trimmed.len();
        self.rest = trimmed;
        if trimmed.is_empty() {
            return None;
        }

        let len = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
        let word = Word {
            text: &trimmed[..len],
            offset: self.byte,
        };
        self.rest = &trimmed[len..];
        self.byte += len;
        Some(word)
    }
}

/// Tokens of a right-hand side. Words starting with a lowercase letter are
/// variable references and become literals holding the bound value; every
/// other word goes through the lexer.
struct Operands<'a, 'de> {
    interpreter: &'a Interpreter<'de>,
    environment: &'a Environment,
    /// Name assigned by the current statement; it has no value yet.
    pending: &'de str,
    words: Words<'de>,
    lexer: Option<Lexer<'de>>,
    end: usize,
}

impl<'de> Operands<'_, 'de> {
    fn resolve(&self, word: Word<'de>) -> Result<Token<'de>, Error> {
        let Some(value) = self.environment.get(word.text) else {
            let hint = (word.text == self.pending).then(|| {
                format!("`{}` only gets a value once this statement completes", word.text)
            });
            return Err(UndefinedVariable {
                src: self.interpreter.src(),
                bad_bit: word.span(),
                hint,
                name: word.text.to_string(),
            }
            .into());
        };
        Ok(Token {
            kind: TokenKind::Literal,
            value: Some(value),
            literal: word.text,
            offset: word.offset,
        })
    }
}

impl<'de> TokenSource<'de> for Operands<'_, 'de> {
    fn next_token(&mut self) -> Result<Token<'de>, Error> {
        loop {
            if let Some(lexer) = &mut self.lexer {
                let token = lexer.next_token()?;
                if token.kind != TokenKind::EndOfInput {
                    return Ok(token);
                }
                self.lexer = None;
            }

            let Some(word) = self.words.next() else {
                return Ok(Token {
                    kind: TokenKind::EndOfInput,
                    value: None,
                    literal: "",
                    offset: self.end,
                });
            };
            if word.text.starts_with(|c: char| c.is_ascii_lowercase()) {
                return self.resolve(word);
            }
            self.lexer = Some(Lexer::within(
                self.interpreter.filename,
                self.interpreter.whole,
                word.range(),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, process};

    fn pairs(program: &str) -> Vec<(String, i64)> {
        process(program)
            .unwrap()
            .into_iter()
            .map(|binding| (binding.name, binding.value))
            .collect()
    }

    fn kind(program: &str) -> ErrorKind {
        process(program).unwrap_err().kind()
    }

    #[test]
    fn single_assignment() {
        assert_eq!(pairs("x = 2 + 3 ;"), [("x".to_string(), 5)]);
    }

    #[test]
    fn references_earlier_statements() {
        assert_eq!(
            pairs("x = 4 ; y = x * 2 ;"),
            [("x".to_string(), 4), ("y".to_string(), 8)]
        );
    }

    #[test]
    fn latest_binding_wins_and_both_are_kept() {
        assert_eq!(
            pairs("x = 1 ; x = x + 1 ; y = x ;"),
            [
                ("x".to_string(), 1),
                ("x".to_string(), 2),
                ("y".to_string(), 2)
            ]
        );
    }

    #[test]
    fn negative_values_substitute_as_one_literal() {
        assert_eq!(
            pairs("a = 0 - 7 ; b = a / 2 ;"),
            [("a".to_string(), -7), ("b".to_string(), -4)]
        );
    }

    #[test]
    fn trailing_whitespace_after_terminator_is_fine() {
        assert_eq!(pairs("k = 7 ;  \n"), [("k".to_string(), 7)]);
    }

    #[test]
    fn missing_terminator() {
        assert_eq!(kind("x = 1"), ErrorKind::Format);
        assert_eq!(kind("x = 1 ; y = 2"), ErrorKind::Format);
        assert_eq!(kind(""), ErrorKind::Format);
    }

    #[test]
    fn missing_equals() {
        assert_eq!(kind("x 1 ;"), ErrorKind::Assignment);
        assert_eq!(kind("x == 1 ;"), ErrorKind::Assignment);
        assert_eq!(kind("x ;"), ErrorKind::Assignment);
        assert_eq!(kind(" ;"), ErrorKind::Assignment);
        assert_eq!(kind("x = 1 ; ; y = 2 ;"), ErrorKind::Assignment);
    }

    #[test]
    fn undefined_variable() {
        let err = process("x = 1 ; y = z + x ;").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UndefinedVariable);
        let Error::UndefinedVariable(inner) = err else {
            panic!("expected an undefined variable error");
        };
        assert_eq!(inner.name, "z");
        assert_eq!(inner.hint, None);
    }

    #[test]
    fn self_reference_without_prior_binding() {
        let Err(Error::UndefinedVariable(inner)) = process("x = x + 1 ;") else {
            panic!("expected an undefined variable error");
        };
        assert_eq!(inner.name, "x");
        assert!(inner.hint.is_some());
    }

    #[test]
    fn unseparated_symbols_around_names_fail_to_lex() {
        assert_eq!(kind("x = 1 ; y = (x + 1) ;"), ErrorKind::Lex);
    }

    #[test]
    fn unseparated_literals_still_lex() {
        assert_eq!(pairs("x = (1+2)*3 ;"), [("x".to_string(), 9)]);
    }

    #[test]
    fn empty_right_hand_side() {
        assert_eq!(kind("x = ;"), ErrorKind::Syntax);
    }

    #[test]
    fn division_by_zero_aborts_the_run() {
        assert_eq!(kind("x = 1 ; y = 5 / 0 ; z = 2 ;"), ErrorKind::DivisionByZero);
    }

    #[test]
    fn words_carry_offsets() {
        let words: Vec<_> = Words::new("a = 12  ;", 0..8)
            .map(|word| (word.text, word.offset))
            .collect();
        assert_eq!(words, [("a", 0), ("=", 2), ("12", 4)]);
    }

    #[test]
    fn environment_renders_one_line_per_binding() {
        let env = process("x = 2 ; y = x * x ;").unwrap();
        assert_eq!(env.to_string(), "x = 2\ny = 4\n");
        assert_eq!(env.get("y"), Some(4));
        assert_eq!(env.to_pairs(), [("x", 2), ("y", 4)]);
    }

    #[test]
    fn rebinding_updates_lookup_but_keeps_history() {
        let mut env = Environment::new();
        env.bind("a", 1);
        env.bind("b", 2);
        env.bind("a", 3);
        assert_eq!(env.get("a"), Some(3));
        assert_eq!(env.get("b"), Some(2));
        assert_eq!(env.get("c"), None);
        assert_eq!(env.to_pairs(), [("a", 1), ("b", 2), ("a", 3)]);
        assert_eq!(env.len(), 2);
    }
}
