use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::{
    Error, named_source,
    parse::{Node, Operator},
};

#[derive(Error, Debug, Diagnostic)]
#[error("Division by zero")]
#[diagnostic(help("the right operand of `/` evaluated to 0"))]
pub struct DivisionByZero {
    #[source_code]
    src: NamedSource<String>,

    #[label("this division")]
    bad_bit: SourceSpan,
}

#[derive(Error, Debug, Diagnostic)]
#[error("Integer overflow in `{lhs} {op} {rhs}`")]
#[diagnostic(help("values must stay within the range of a 64-bit signed integer"))]
pub struct ArithmeticOverflow {
    #[source_code]
    src: NamedSource<String>,

    #[label("this operation")]
    bad_bit: SourceSpan,

    pub lhs: i64,
    pub op: Operator,
    pub rhs: i64,
}

/// Walks an expression tree. Borrows the text the tree was parsed from so
/// runtime errors can point into it.
pub struct Evaluator<'de> {
    filename: Option<&'de str>,
    whole: &'de str,
}

impl<'de> Evaluator<'de> {
    pub fn new(filename: Option<&'de str>, whole: &'de str) -> Self {
        Evaluator { filename, whole }
    }

    /// Post-order walk with an explicit stack; left operands are evaluated
    /// before right ones.
    pub fn evaluate(&self, node: &Node) -> Result<i64, Error> {
        enum Step<'a> {
            Visit(&'a Node),
            Apply(Operator, SourceSpan),
        }

        let mut steps = vec![Step::Visit(node)];
        let mut values: Vec<i64> = Vec::new();
        while let Some(step) = steps.pop() {
            match step {
                Step::Visit(Node::Literal { value }) => values.push(*value),
                Step::Visit(Node::BinaryOp {
                    left,
                    op,
                    right,
                    span,
                }) => {
                    steps.push(Step::Apply(*op, *span));
                    steps.push(Step::Visit(&**right));
                    steps.push(Step::Visit(&**left));
                }
                Step::Apply(op, span) => {
                    let (Some(rhs), Some(lhs)) = (values.pop(), values.pop()) else {
                        unreachable!("operands are evaluated before their operator");
                    };
                    values.push(self.apply(lhs, op, rhs, span)?);
                }
            }
        }
        match values.as_slice() {
            [value] => Ok(*value),
            _ => unreachable!("a tree evaluates to exactly one value"),
        }
    }

    fn apply(&self, lhs: i64, op: Operator, rhs: i64, span: SourceSpan) -> Result<i64, Error> {
        let value = match op {
            Operator::Add => lhs.checked_add(rhs),
            Operator::Sub => lhs.checked_sub(rhs),
            Operator::Mul => lhs.checked_mul(rhs),
            Operator::Div => {
                if rhs == 0 {
                    return Err(DivisionByZero {
                        src: named_source(self.filename, self.whole),
                        bad_bit: span,
                    }
                    .into());
                }
                floor_div(lhs, rhs)
            }
        };
        value.ok_or_else(|| {
            ArithmeticOverflow {
                src: named_source(self.filename, self.whole),
                bad_bit: span,
                lhs,
                op,
                rhs,
            }
            .into()
        })
    }
}

/// Integer division rounding toward negative infinity.
///
/// Returns `None` on overflow (`i64::MIN / -1`); `rhs` must be non-zero.
pub fn floor_div(lhs: i64, rhs: i64) -> Option<i64> {
    let quotient = lhs.checked_div(rhs)?;
    if lhs % rhs != 0 && (lhs < 0) != (rhs < 0) {
        Some(quotient - 1)
    } else {
        Some(quotient)
    }
}
