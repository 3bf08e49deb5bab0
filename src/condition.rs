//! Conditions of `if` and `elsif`
//!
//! A condition is a chain of comparisons joined by `and` / `or`. There is no
//! precedence between the two: the chain folds from the right, so
//! `a or b and c` means `a or (b and c)` and `a and b or c` means
//! `a and (b or c)`.

use crate::ast::{Literal, Variable};
use crate::context::Context;
use crate::error::{Error, Result, SyntaxErrorKind};
use crate::markup;
use crate::value::Value;

/// Most comparisons allowed in one chain
pub const MAX_CONDITIONS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Contains,
}

impl Operator {
    fn from_word(word: &str) -> Option<Self> {
        Some(match word {
            "==" => Operator::Eq,
            "!=" | "<>" => Operator::Ne,
            "<" => Operator::Lt,
            ">" => Operator::Gt,
            "<=" => Operator::Le,
            ">=" => Operator::Ge,
            "contains" => Operator::Contains,
            _ => return None,
        })
    }

    fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Le => "<=",
            Operator::Ge => ">=",
            Operator::Contains => "contains",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Test {
    /// `else`: always holds
    Always,
    /// Truthiness of one operand
    Truthy(Variable),
    Compare {
        left: Variable,
        op: Operator,
        right: Variable,
    },
}

/// One comparison, optionally linked to the rest of the chain
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub test: Test,
    pub link: Option<(Combinator, Box<Condition>)>,
}

impl Condition {
    pub fn always() -> Self {
        Self {
            test: Test::Always,
            link: None,
        }
    }

    /// Parse the markup of a conditional tag
    pub fn parse(markup: &str, tag: &str) -> std::result::Result<Self, SyntaxErrorKind> {
        let usage = || SyntaxErrorKind::TagSyntax {
            tag: tag.to_string(),
            usage: format!("{tag} [expression]"),
        };

        let words = split_words(markup).ok_or_else(usage)?;
        let mut groups: Vec<Vec<Word<'_>>> = vec![Vec::new()];
        let mut combinators = Vec::new();
        for word in words {
            let combinator = match word.text {
                "and" => Some(Combinator::And),
                "or" => Some(Combinator::Or),
                _ => None,
            };
            match combinator {
                Some(c) => {
                    combinators.push(c);
                    groups.push(Vec::new());
                }
                None => {
                    if let Some(group) = groups.last_mut() {
                        group.push(word);
                    }
                }
            }
        }

        if groups.len() > MAX_CONDITIONS {
            return Err(SyntaxErrorKind::TooManyConditions {
                tag: tag.to_string(),
                max: MAX_CONDITIONS,
            });
        }

        let mut groups = groups.into_iter().rev();
        let last = groups.next().ok_or_else(usage)?;
        let mut condition = Self::parse_group(markup, &last).ok_or_else(usage)?;
        for (group, combinator) in groups.zip(combinators.into_iter().rev()) {
            let mut newer = Self::parse_group(markup, &group).ok_or_else(usage)?;
            newer.link = Some((combinator, Box::new(condition)));
            condition = newer;
        }
        Ok(condition)
    }

    /// `left`, or `left op right`
    fn parse_group(markup: &str, words: &[Word<'_>]) -> Option<Self> {
        let first = words.first()?;
        let last = words.last()?;

        let op_at = words
            .iter()
            .enumerate()
            .skip(1)
            .find_map(|(i, w)| Operator::from_word(w.text).map(|op| (i, op)));

        let operand = |from: &Word<'_>, to: &Word<'_>| {
            markup::parse_variable(&markup[from.start..to.end]).ok()
        };
        let test = match op_at {
            Some((i, op)) => {
                let right_first = words.get(i + 1)?;
                let left = operand(first, &words[i - 1])?;
                let right = operand(right_first, last)?;
                Test::Compare { left, op, right }
            }
            None => Test::Truthy(operand(first, last)?),
        };
        Some(Self { test, link: None })
    }

    /// Number of comparisons in the chain
    pub fn chain_len(&self) -> usize {
        let mut count = 1;
        let mut next = &self.link;
        while let Some((_, rest)) = next {
            count += 1;
            next = &rest.link;
        }
        count
    }

    pub fn is_else(&self) -> bool {
        matches!(self.test, Test::Always)
    }

    pub fn evaluate(&self, ctx: &Context<'_>) -> Result<bool> {
        let own = self.evaluate_test(ctx)?;
        match &self.link {
            None => Ok(own),
            Some((Combinator::And, rest)) => Ok(own && rest.evaluate(ctx)?),
            Some((Combinator::Or, rest)) => Ok(own || rest.evaluate(ctx)?),
        }
    }

    fn evaluate_test(&self, ctx: &Context<'_>) -> Result<bool> {
        match &self.test {
            Test::Always => Ok(true),
            Test::Truthy(variable) => Ok(ctx.evaluate(variable)?.is_truthy()),
            Test::Compare { left, op, right } => {
                // `x == empty` compares against the literal, not its value
                if let Some(special) = right.as_literal().filter(|l| is_emptiness(l)) {
                    let value = ctx.expose(ctx.evaluate(left)?);
                    return emptiness_test(*op, &value, special);
                }
                if let Some(special) = left.as_literal().filter(|l| is_emptiness(l)) {
                    let value = ctx.expose(ctx.evaluate(right)?);
                    return emptiness_test(*op, &value, special);
                }

                let left = ctx.expose(ctx.evaluate(left)?);
                let right = ctx.expose(ctx.evaluate(right)?);
                compare(*op, &left, &right)
            }
        }
    }
}

fn is_emptiness(lit: &Literal) -> bool {
    matches!(lit, Literal::Empty | Literal::Blank)
}

fn emptiness_test(op: Operator, value: &Value, lit: &Literal) -> Result<bool> {
    let matches = match lit {
        Literal::Blank => value.is_blank(),
        _ => value.is_empty(),
    };
    match op {
        Operator::Eq => Ok(matches),
        Operator::Ne => Ok(!matches),
        other => Err(Error::render(format!(
            "cannot use '{}' with empty or blank",
            other.as_str()
        ))),
    }
}

fn compare(op: Operator, left: &Value, right: &Value) -> Result<bool> {
    match op {
        Operator::Eq => Ok(left.loose_eq(right)),
        Operator::Ne => Ok(!left.loose_eq(right)),
        Operator::Contains => Ok(left.contains(right)),
        Operator::Lt | Operator::Gt | Operator::Le | Operator::Ge => {
            if left.is_nil() || right.is_nil() {
                return Ok(false);
            }
            let ordering = left.compare(right).ok_or_else(|| {
                Error::render(format!(
                    "comparison of {} with {} failed",
                    left.type_name(),
                    right.type_name()
                ))
            })?;
            Ok(match op {
                Operator::Lt => ordering.is_lt(),
                Operator::Gt => ordering.is_gt(),
                Operator::Le => ordering.is_le(),
                _ => ordering.is_ge(),
            })
        }
    }
}

/// A whitespace-separated word of condition markup, with its byte range
#[derive(Debug, Clone, Copy)]
struct Word<'a> {
    text: &'a str,
    start: usize,
    end: usize,
}

/// Split on whitespace, keeping quoted strings whole. `None` if a quote is
/// left open.
fn split_words(markup: &str) -> Option<Vec<Word<'_>>> {
    let bytes = markup.as_bytes();
    let mut words = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
            if bytes[i] == b'\'' || bytes[i] == b'"' {
                let quote = bytes[i];
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                if i == bytes.len() {
                    return None;
                }
            }
            i += 1;
        }
        words.push(Word {
            text: &markup[start..i],
            start,
            end: i,
        });
    }
    Some(words)
}
