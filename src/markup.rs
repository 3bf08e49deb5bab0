//! Expression grammar inside `{{ }}` and tag markup
//!
//! ```text
//! variable   := expr ('|' name (':' expr (',' expr)*)?)*
//! expr       := string | number | range | keyword | lookup
//! lookup     := name ('.' name | '[' expr ']')*
//! range      := '(' expr '..' expr ')'
//! ```

use crate::ast::{Expr, FilterCall, Literal, Lookup, Segment, Variable};
use std::fmt;

/// A markup fragment could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupError {
    pub message: String,
}

impl MarkupError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for MarkupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

pub type MarkupResult<T> = std::result::Result<T, MarkupError>;

/// Parse the markup of a `{{ }}` token
pub fn parse_variable(markup: &str) -> MarkupResult<Variable> {
    let mut scanner = Scanner::new(markup);
    let variable = scanner.variable()?;
    scanner.finish()?;
    Ok(variable)
}

/// Parse a single expression with no filters
pub fn parse_expr(markup: &str) -> MarkupResult<Expr> {
    let mut scanner = Scanner::new(markup);
    let expr = scanner.expr()?;
    scanner.finish()?;
    Ok(expr)
}

pub(crate) fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

pub(crate) fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

/// Character cursor over a markup string
pub(crate) struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    pub fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_str(&self, s: &str) -> bool {
        self.src[self.pos..].starts_with(s)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    pub fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    pub fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    pub fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    /// Consume trailing whitespace and require end of input
    pub fn finish(&mut self) -> MarkupResult<()> {
        self.skip_whitespace();
        if self.is_at_end() {
            Ok(())
        } else {
            Err(MarkupError::new(format!("unexpected '{}'", self.rest())))
        }
    }

    /// Read an identifier, if one starts here
    pub fn ident(&mut self) -> Option<&'a str> {
        let start = self.pos;
        if !self.peek().is_some_and(is_ident_start) {
            return None;
        }
        while self.peek().is_some_and(is_ident_char) {
            self.advance();
        }
        self.eat('?');
        Some(&self.src[start..self.pos])
    }

    /// Expect a keyword followed by whitespace or end of input
    pub fn keyword(&mut self, word: &str) -> bool {
        let save = self.pos;
        match self.ident() {
            Some(found) if found == word => true,
            _ => {
                self.pos = save;
                false
            }
        }
    }

    pub fn variable(&mut self) -> MarkupResult<Variable> {
        self.skip_whitespace();
        let expr = if self.is_at_end() || self.peek() == Some('|') {
            Expr::Literal(Literal::Nil)
        } else {
            self.expr()?
        };

        let mut filters = Vec::new();
        loop {
            self.skip_whitespace();
            if !self.eat('|') {
                break;
            }
            self.skip_whitespace();
            let name = self
                .ident()
                .ok_or_else(|| MarkupError::new("expected filter name"))?
                .to_string();
            let mut args = Vec::new();
            self.skip_whitespace();
            if self.eat(':') {
                loop {
                    self.skip_whitespace();
                    args.push(self.expr()?);
                    self.skip_whitespace();
                    if !self.eat(',') {
                        break;
                    }
                }
            }
            filters.push(FilterCall { name, args });
        }

        Ok(Variable { expr, filters })
    }

    pub fn expr(&mut self) -> MarkupResult<Expr> {
        self.skip_whitespace();
        match self.peek() {
            Some(quote @ ('\'' | '"')) => self.string(quote),
            Some('(') => self.range(),
            Some(c) if c.is_ascii_digit() || c == '-' => self.number(),
            Some(c) if is_ident_start(c) => self.lookup(),
            Some(c) => Err(MarkupError::new(format!("unexpected character '{c}'"))),
            None => Err(MarkupError::new("expected expression")),
        }
    }

    fn string(&mut self, quote: char) -> MarkupResult<Expr> {
        self.advance();
        let start = self.pos;
        while let Some(c) = self.advance() {
            if c == quote {
                let text = &self.src[start..self.pos - 1];
                return Ok(Expr::Literal(Literal::Str(text.to_string())));
            }
        }
        Err(MarkupError::new("unterminated string"))
    }

    fn number(&mut self) -> MarkupResult<Expr> {
        let start = self.pos;
        self.eat('-');
        let digits_start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.pos == digits_start {
            return Err(MarkupError::new("expected digits after '-'"));
        }

        // `1..5` inside a range is not a float
        let is_float = self.peek() == Some('.')
            && !self.peek_str("..")
            && self.src[self.pos + 1..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_digit());
        if is_float {
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
            let text = &self.src[start..self.pos];
            return text
                .parse::<f64>()
                .map(|f| Expr::Literal(Literal::Float(f)))
                .map_err(|_| MarkupError::new(format!("invalid number '{text}'")));
        }

        let text = &self.src[start..self.pos];
        text.parse::<i64>()
            .map(|i| Expr::Literal(Literal::Int(i)))
            .map_err(|_| MarkupError::new(format!("invalid number '{text}'")))
    }

    fn range(&mut self) -> MarkupResult<Expr> {
        self.advance();
        let start = self.expr()?;
        self.skip_whitespace();
        if !self.peek_str("..") {
            return Err(MarkupError::new("expected '..' in range"));
        }
        self.pos += 2;
        let end = self.expr()?;
        self.skip_whitespace();
        if !self.eat(')') {
            return Err(MarkupError::new("expected ')' to close range"));
        }
        Ok(Expr::Range(Box::new(start), Box::new(end)))
    }

    fn lookup(&mut self) -> MarkupResult<Expr> {
        let name = self
            .ident()
            .ok_or_else(|| MarkupError::new("expected name"))?
            .to_string();

        let mut path = Vec::new();
        loop {
            if self.peek() == Some('.') && !self.peek_str("..") {
                self.advance();
                let field = self
                    .ident()
                    .ok_or_else(|| MarkupError::new("expected name after '.'"))?;
                path.push(Segment::Field(field.to_string()));
            } else if self.eat('[') {
                let index = self.expr()?;
                self.skip_whitespace();
                if !self.eat(']') {
                    return Err(MarkupError::new("expected ']'"));
                }
                path.push(Segment::Index(index));
            } else {
                break;
            }
        }

        if path.is_empty() {
            let keyword = match name.as_str() {
                "true" => Some(Literal::Bool(true)),
                "false" => Some(Literal::Bool(false)),
                "nil" | "null" => Some(Literal::Nil),
                "empty" => Some(Literal::Empty),
                "blank" => Some(Literal::Blank),
                _ => None,
            };
            if let Some(lit) = keyword {
                return Ok(Expr::Literal(lit));
            }
        }

        Ok(Expr::Lookup(Lookup { name, path }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str, path: Vec<Segment>) -> Expr {
        Expr::Lookup(Lookup {
            name: name.to_string(),
            path,
        })
    }

    #[test]
    fn test_literals() {
        assert_eq!(parse_expr("42").unwrap(), Expr::Literal(Literal::Int(42)));
        assert_eq!(parse_expr("-3").unwrap(), Expr::Literal(Literal::Int(-3)));
        assert_eq!(
            parse_expr("1.5").unwrap(),
            Expr::Literal(Literal::Float(1.5))
        );
        assert_eq!(
            parse_expr("'it'").unwrap(),
            Expr::Literal(Literal::Str("it".to_string()))
        );
        assert_eq!(parse_expr("nil").unwrap(), Expr::Literal(Literal::Nil));
        assert_eq!(parse_expr("empty").unwrap(), Expr::Literal(Literal::Empty));
    }

    #[test]
    fn test_lookup_path() {
        let expr = parse_expr("user.tags[0].name").unwrap();
        assert_eq!(
            expr,
            lookup(
                "user",
                vec![
                    Segment::Field("tags".to_string()),
                    Segment::Index(Expr::Literal(Literal::Int(0))),
                    Segment::Field("name".to_string()),
                ]
            )
        );
    }

    #[test]
    fn test_keyword_as_field() {
        let expr = parse_expr("list.empty?").unwrap();
        assert_eq!(
            expr,
            lookup("list", vec![Segment::Field("empty?".to_string())])
        );
    }

    #[test]
    fn test_range() {
        let expr = parse_expr("(1..n)").unwrap();
        assert_eq!(
            expr,
            Expr::Range(
                Box::new(Expr::Literal(Literal::Int(1))),
                Box::new(lookup("n", vec![]))
            )
        );
    }

    #[test]
    fn test_filter_pipeline() {
        let var = parse_variable(" 2 | plus: 3 | split: ',', 'x' | upcase ").unwrap();
        assert_eq!(var.expr, Expr::Literal(Literal::Int(2)));
        let names: Vec<_> = var.filters.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["plus", "split", "upcase"]);
        assert_eq!(var.filters[1].args.len(), 2);
        assert!(var.filters[2].args.is_empty());
    }

    #[test]
    fn test_empty_variable() {
        let var = parse_variable("  ").unwrap();
        assert_eq!(var.expr, Expr::Literal(Literal::Nil));
        assert!(var.filters.is_empty());
    }

    #[test]
    fn test_errors() {
        assert!(parse_variable("'open").is_err());
        assert!(parse_variable("a b").is_err());
        assert!(parse_variable("x | ").is_err());
        assert!(parse_expr("(1..2").is_err());
        assert!(parse_expr("-").is_err());
    }
}
