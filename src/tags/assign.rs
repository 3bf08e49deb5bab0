//! `{% assign name = value | filters %}`

use super::Tag;
use crate::ast::Variable;
use crate::context::Context;
use crate::error::{Result, SyntaxErrorKind};
use crate::markup::Scanner;
use crate::parser::{Parser, TagHeader};
use crate::render::Flow;

/// Binds a variable at the top level of the render
#[derive(Debug)]
pub struct Assign {
    to: String,
    from: Variable,
}

impl Assign {
    pub fn parse(header: TagHeader, parser: &mut Parser<'_>) -> Result<Box<dyn Tag>> {
        match parse_markup(&header.markup) {
            Some((to, from)) => Ok(Box::new(Assign { to, from })),
            None => Err(parser.syntax_error(
                SyntaxErrorKind::TagSyntax {
                    tag: "assign".to_string(),
                    usage: "assign [var] = [source]".to_string(),
                },
                header.span,
            )),
        }
    }
}

fn parse_markup(markup: &str) -> Option<(String, Variable)> {
    let mut scanner = Scanner::new(markup);
    scanner.skip_whitespace();
    let to = scanner.ident()?.to_string();
    scanner.skip_whitespace();
    if !scanner.eat('=') {
        return None;
    }
    let rest = scanner.rest();
    if rest.trim().is_empty() {
        return None;
    }
    let from = crate::markup::parse_variable(rest).ok()?;
    Some((to, from))
}

impl Tag for Assign {
    fn render(&self, ctx: &mut Context<'_>, _out: &mut String) -> Result<Flow> {
        let value = ctx.evaluate(&self.from)?;
        ctx.assign(self.to.as_str(), value);
        Ok(Flow::Normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_markup() {
        let (to, from) = parse_markup("total = 2 | plus: 3").unwrap();
        assert_eq!(to, "total");
        assert_eq!(from.filters.len(), 1);
    }

    #[test]
    fn test_invalid_markup() {
        assert!(parse_markup("total").is_none());
        assert!(parse_markup("= 1").is_none());
        assert!(parse_markup("total =").is_none());
        assert!(parse_markup("total = 'open").is_none());
    }
}
