//! Tokenizer for Liquid markup
//!
//! Splits a template into text, `{% tag %}` and `{{ variable }}` tokens.
//! Tokenizing never fails: a delimiter that is opened but never closed yields
//! a token with `terminated == false` and the parser reports it.

use crate::ast::{Span, span};

/// Token types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Text,
    Tag,
    Variable,
}

/// A token with its span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Text content, or the markup between the delimiters (trim markers removed)
    pub content: String,
    /// Exact source slice, delimiters included
    pub raw: String,
    pub span: Span,
    pub terminated: bool,
    /// Opened with `{%-` / `{{-`
    pub trim_before: bool,
    /// Closed with `-%}` / `-}}`
    pub trim_after: bool,
}

impl Token {
    fn text(content: &str, offset: usize) -> Self {
        Self {
            kind: TokenKind::Text,
            content: content.to_string(),
            raw: content.to_string(),
            span: span(offset, content.len()),
            terminated: true,
            trim_before: false,
            trim_after: false,
        }
    }
}

/// Tokenize a whole template, applying whitespace trim markers
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = Lexer::new(source).collect();
    apply_trim(&mut tokens);
    tokens
}

/// Lexer state over a borrowed source
pub struct Lexer<'a> {
    source: &'a str,
    /// Current byte position in source
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source, pos: 0 }
    }

    /// Peek at the next n bytes as a string slice
    fn peek_n(&self, at: usize, n: usize) -> Option<&'a str> {
        self.source.get(at..at + n)
    }

    /// Find the next opening delimiter at or after `from`
    fn find_open(&self, from: usize) -> Option<(usize, TokenKind)> {
        let bytes = self.source.as_bytes();
        let mut i = from;
        while i + 1 < bytes.len() {
            if bytes[i] == b'{' {
                match bytes[i + 1] {
                    b'%' => return Some((i, TokenKind::Tag)),
                    b'{' => return Some((i, TokenKind::Variable)),
                    _ => {}
                }
            }
            i += 1;
        }
        None
    }

    /// Lex raw template text until we hit a delimiter
    fn lex_text(&mut self, end: usize) -> Token {
        let start = self.pos;
        self.pos = end;
        Token::text(&self.source[start..end], start)
    }

    /// Lex `{% ... %}` or `{{ ... }}` starting at the current position
    fn lex_markup(&mut self, kind: TokenKind) -> Token {
        let start = self.pos;
        let close = match kind {
            TokenKind::Tag => "%}",
            _ => "}}",
        };

        let trim_before = self.peek_n(start + 2, 1) == Some("-");
        let inner_start = start + 2 + usize::from(trim_before);

        let Some(close_at) = self.source[inner_start..]
            .find(close)
            .map(|i| inner_start + i)
        else {
            self.pos = self.source.len();
            let raw = &self.source[start..];
            return Token {
                kind,
                content: self.source[inner_start.min(self.source.len())..].to_string(),
                raw: raw.to_string(),
                span: span(start, raw.len()),
                terminated: false,
                trim_before,
                trim_after: false,
            };
        };

        let trim_after = close_at > inner_start && self.peek_n(close_at - 1, 1) == Some("-");
        let inner_end = if trim_after { close_at - 1 } else { close_at };
        self.pos = close_at + close.len();

        let raw = &self.source[start..self.pos];
        Token {
            kind,
            content: self.source[inner_start..inner_end].to_string(),
            raw: raw.to_string(),
            span: span(start, raw.len()),
            terminated: true,
            trim_before,
            trim_after,
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.pos >= self.source.len() {
            return None;
        }

        match self.find_open(self.pos) {
            Some((at, kind)) if at == self.pos => Some(self.lex_markup(kind)),
            Some((at, _)) => Some(self.lex_text(at)),
            None => Some(self.lex_text(self.source.len())),
        }
    }
}

/// Strip whitespace around trim markers.
///
/// `{%-` removes spaces and tabs at the end of the preceding text, back to
/// the last newline. `-%}` removes spaces and tabs at the start of the
/// following text and then at most one line break.
fn apply_trim(tokens: &mut [Token]) {
    for i in 0..tokens.len() {
        if tokens[i].kind == TokenKind::Text {
            continue;
        }

        if tokens[i].trim_before
            && i > 0
            && let Some(prev) = tokens.get_mut(i - 1)
            && prev.kind == TokenKind::Text
        {
            let kept = prev.content.trim_end_matches([' ', '\t']).len();
            prev.content.truncate(kept);
        }

        if tokens[i].trim_after
            && let Some(next) = tokens.get_mut(i + 1)
            && next.kind == TokenKind::Text
        {
            let rest = next.content.trim_start_matches([' ', '\t']);
            let rest = rest
                .strip_prefix("\r\n")
                .or_else(|| rest.strip_prefix('\n'))
                .unwrap_or(rest);
            next.content = rest.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_plain_text() {
        let tokens = tokenize("Hello, world!");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Text);
        assert_eq!(tokens[0].content, "Hello, world!");
    }

    #[test]
    fn test_mixed_tokens() {
        assert_eq!(
            kinds("a{{ b }}c{% d %}"),
            vec![
                TokenKind::Text,
                TokenKind::Variable,
                TokenKind::Text,
                TokenKind::Tag
            ]
        );
    }

    #[test]
    fn test_markup_content_and_span() {
        let tokens = tokenize("ab{% if x %}");
        assert_eq!(tokens[1].content, " if x ");
        assert_eq!(tokens[1].raw, "{% if x %}");
        assert_eq!(tokens[1].span.offset(), 2);
        assert_eq!(tokens[1].span.len(), 10);
        assert!(tokens[1].terminated);
    }

    #[test]
    fn test_lone_brace_is_text() {
        let tokens = tokenize("a { b } c");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].content, "a { b } c");
    }

    #[test]
    fn test_unterminated() {
        let tokens = tokenize("x {{ name ");
        assert_eq!(tokens.len(), 2);
        assert!(!tokens[1].terminated);
        assert_eq!(tokens[1].content, " name ");

        let tokens = tokenize("{%");
        assert!(!tokens[0].terminated);
        assert_eq!(tokens[0].content, "");
    }

    #[test]
    fn test_trim_before() {
        let tokens = tokenize("foo\n\t  {%- if true %}");
        assert_eq!(tokens[0].content, "foo\n");
        assert_eq!(tokens[1].content, " if true ");
    }

    #[test]
    fn test_trim_after_eats_one_newline() {
        let tokens = tokenize("{% if true -%}  \n\nhi");
        assert_eq!(tokens[1].content, "\nhi");

        let tokens = tokenize("{{ x -}}\r\nhi");
        assert_eq!(tokens[1].content, "hi");
    }

    #[test]
    fn test_trim_empty_markup() {
        let tokens = tokenize("a {{-}} b");
        assert_eq!(tokens[1].content, "");
        assert!(tokens[1].trim_before);
        assert!(!tokens[1].trim_after);
        assert_eq!(tokens[0].content, "a");
    }
}
