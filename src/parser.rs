//! Block parser
//!
//! Turns the token stream into a [`Document`]. The root document and every
//! block tag share one body loop, [`Parser::parse_body`]: text and variables
//! become nodes, tags are looked up in the registry and built by their
//! factory, which may in turn consume its own body from the same parser.

use crate::ast::{Document, Node, Span, TagNode, TextNode, VariableNode, span};
use crate::error::{Error, Result, SyntaxError, SyntaxErrorKind, TemplateSource};
use crate::lexer::{Token, TokenKind, tokenize};
use crate::markup::{self, MarkupError};
use crate::tags::TagRegistry;
use std::vec::IntoIter;

/// A tag token split into its name and markup: `{% name markup %}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagHeader {
    pub name: String,
    pub markup: String,
    pub span: Span,
}

/// A node list being filled by [`Parser::parse_body`]
pub trait BlockBody {
    /// Name used in error messages, e.g. `if`
    fn block_name(&self) -> &str;

    /// The tag name that closes this body. `None` means the body runs to
    /// the end of input.
    fn end_delimiter(&self) -> Option<String> {
        Some(format!("end{}", self.block_name()))
    }

    fn push_node(&mut self, node: Node);

    /// Nodes of the list currently being filled
    fn nodes(&self) -> &[Node];

    /// Called for a tag the registry does not know
    fn unknown_tag(&mut self, header: TagHeader, parser: &mut Parser<'_>) -> Result<()> {
        Err(parser.unknown_tag_error(&header, self.block_name()))
    }
}

/// Root body: runs to end of input
struct DocumentBody {
    nodes: Vec<Node>,
}

impl BlockBody for DocumentBody {
    fn block_name(&self) -> &str {
        "document"
    }

    fn end_delimiter(&self) -> Option<String> {
        None
    }

    fn push_node(&mut self, node: Node) {
        self.nodes.push(node);
    }

    fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    fn unknown_tag(&mut self, header: TagHeader, parser: &mut Parser<'_>) -> Result<()> {
        Err(parser.syntax_error(
            SyntaxErrorKind::UnknownTag { name: header.name },
            header.span,
        ))
    }
}

/// Template parser
pub struct Parser<'a> {
    tokens: IntoIter<Token>,
    tags: &'a TagRegistry,
    source: &'a TemplateSource,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a TemplateSource, tags: &'a TagRegistry) -> Self {
        Self {
            tokens: tokenize(source.source()).into_iter(),
            tags,
            source,
        }
    }

    pub fn source(&self) -> &TemplateSource {
        self.source
    }

    /// Parse the whole template
    pub fn parse(mut self) -> Result<Document> {
        let mut body = DocumentBody { nodes: Vec::new() };
        self.parse_body(&mut body, span(0, 0))?;
        Ok(Document {
            nodes: body.nodes,
            span: span(0, self.source.source().len()),
        })
    }

    /// Fill `body` until its end delimiter. `opened_at` is the span of the
    /// tag that opened the block, reported when the block is never closed.
    pub fn parse_body<B>(&mut self, body: &mut B, opened_at: Span) -> Result<()>
    where
        B: BlockBody + ?Sized,
    {
        while let Some(token) = self.tokens.next() {
            match token.kind {
                TokenKind::Text => {
                    if !token.content.is_empty() {
                        body.push_node(Node::Text(TextNode {
                            text: token.content,
                            span: token.span,
                        }));
                    }
                }
                TokenKind::Variable => {
                    if !token.terminated {
                        return Err(self.syntax_error(
                            SyntaxErrorKind::VariableNotTerminated { markup: token.raw },
                            token.span,
                        ));
                    }
                    let variable = markup::parse_variable(&token.content)
                        .map_err(|e| self.markup_error(e, &token.content, token.span))?;
                    body.push_node(Node::Variable(VariableNode {
                        variable,
                        markup: token.content.trim().to_string(),
                        span: token.span,
                    }));
                }
                TokenKind::Tag => {
                    let header = self.tag_header(token)?;
                    if body.end_delimiter().as_deref() == Some(header.name.as_str()) {
                        return Ok(());
                    }

                    let tags = self.tags;
                    match tags.get(&header.name) {
                        Some(factory) => {
                            let name = header.name.clone();
                            let markup = header.markup.clone();
                            let tag_span = header.span;
                            let tag = factory(header, self)?;
                            body.push_node(Node::Tag(TagNode {
                                name,
                                markup,
                                tag,
                                span: tag_span,
                            }));
                            if let Some(Node::Tag(node)) = body.nodes().last() {
                                node.tag
                                    .assert_rules(body.nodes())
                                    .map_err(|kind| self.syntax_error(kind, tag_span))?;
                            }
                        }
                        None => body.unknown_tag(header, self)?,
                    }
                }
            }
        }

        match body.end_delimiter() {
            None => Ok(()),
            Some(_) => Err(self.syntax_error(
                SyntaxErrorKind::BlockNotClosed {
                    block: body.block_name().to_string(),
                },
                opened_at,
            )),
        }
    }

    /// Split a tag token into name and markup
    fn tag_header(&self, token: Token) -> Result<TagHeader> {
        let inner = token.content.trim();
        let name_len = inner
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(inner.len());

        if !token.terminated || name_len == 0 {
            return Err(self.syntax_error(
                SyntaxErrorKind::TagNotTerminated { markup: token.raw },
                token.span,
            ));
        }

        Ok(TagHeader {
            name: inner[..name_len].to_string(),
            markup: inner[name_len..].trim().to_string(),
            span: token.span,
        })
    }

    pub fn syntax_error(&self, kind: SyntaxErrorKind, span: Span) -> Error {
        SyntaxError {
            kind,
            src: self.source.named_source(),
            span,
        }
        .into()
    }

    pub fn markup_error(&self, error: MarkupError, markup: &str, span: Span) -> Error {
        self.syntax_error(
            SyntaxErrorKind::Markup {
                message: error.message,
                markup: markup.trim().to_string(),
            },
            span,
        )
    }

    /// The default answer to a tag the registry does not know
    pub fn unknown_tag_error(&self, header: &TagHeader, block: &str) -> Error {
        let kind = match header.name.as_str() {
            "else" => SyntaxErrorKind::UnexpectedElse {
                block: block.to_string(),
            },
            "end" => SyntaxErrorKind::InvalidEnd {
                block: block.to_string(),
                delimiter: format!("end{block}"),
            },
            name => SyntaxErrorKind::UnknownTag {
                name: name.to_string(),
            },
        };
        self.syntax_error(kind, header.span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<Document> {
        let source = TemplateSource::new("test", s);
        let tags = TagRegistry::standard();
        Parser::new(&source, &tags).parse()
    }

    fn kind(s: &str) -> SyntaxErrorKind {
        match parse(s) {
            Err(Error::Syntax(e)) => e.kind,
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_text() {
        let doc = parse("Hello, world!").unwrap();
        assert_eq!(doc.nodes.len(), 1);
        assert!(matches!(&doc.nodes[0], Node::Text(t) if t.text == "Hello, world!"));
    }

    #[test]
    fn test_parse_variable() {
        let doc = parse("{{ name | upcase }}").unwrap();
        assert!(matches!(&doc.nodes[0], Node::Variable(v) if v.markup == "name | upcase"));
    }

    #[test]
    fn test_parse_block() {
        let doc = parse("a{% if x %}b{% endif %}c").unwrap();
        assert_eq!(doc.nodes.len(), 3);
        assert_eq!(doc.nodes[1].tag_name(), Some("if"));
    }

    #[test]
    fn test_trimmed_text_is_dropped() {
        let doc = parse("{% assign a = 1 -%}\n{{ a }}").unwrap();
        assert_eq!(doc.nodes.len(), 2);
    }

    #[test]
    fn test_unknown_tag() {
        assert_eq!(
            kind("{% bogus %}"),
            SyntaxErrorKind::UnknownTag {
                name: "bogus".to_string()
            }
        );
    }

    #[test]
    fn test_block_never_closed() {
        assert_eq!(
            kind("{% if true %}x"),
            SyntaxErrorKind::BlockNotClosed {
                block: "if".to_string()
            }
        );
    }

    #[test]
    fn test_wrong_end() {
        assert_eq!(
            kind("{% tablerow i in list %}{% end %}"),
            SyntaxErrorKind::InvalidEnd {
                block: "tablerow".to_string(),
                delimiter: "endtablerow".to_string()
            }
        );
        assert_eq!(
            kind("{% tablerow i in list %}{% else %}{% endtablerow %}"),
            SyntaxErrorKind::UnexpectedElse {
                block: "tablerow".to_string()
            }
        );
    }

    #[test]
    fn test_not_terminated() {
        assert!(matches!(
            kind("{% if true"),
            SyntaxErrorKind::TagNotTerminated { .. }
        ));
        assert!(matches!(
            kind("{{ name"),
            SyntaxErrorKind::VariableNotTerminated { .. }
        ));
        assert!(matches!(kind("{% %}"), SyntaxErrorKind::TagNotTerminated { .. }));
    }

    #[test]
    fn test_error_span_points_at_tag() {
        let Err(Error::Syntax(e)) = parse("abc {% bogus %}") else {
            panic!("expected syntax error");
        };
        assert_eq!(e.span.offset(), 4);
        assert_eq!(e.span.len(), 11);
    }

    #[test]
    fn test_end_at_root_is_unknown() {
        assert!(matches!(kind("{% endif %}"), SyntaxErrorKind::UnknownTag { .. }));
    }
}
