//! AST nodes for templates
//!
//! Every node carries a [`Span`] for error reporting. A template is parsed
//! once into a [`Document`] and rendered many times.

use crate::tags::Tag;
use miette::SourceSpan;

/// A span in the source (re-export from miette)
pub type Span = SourceSpan;

/// Create a span from offset and length
pub fn span(offset: usize, len: usize) -> Span {
    SourceSpan::new(offset.into(), len)
}

/// A parsed template body
#[derive(Debug)]
pub struct Document {
    pub nodes: Vec<Node>,
    pub span: Span,
}

/// A node in the template AST
#[derive(Debug)]
pub enum Node {
    /// Raw text (passed through unchanged)
    Text(TextNode),
    /// Interpolation: {{ var | filter }}
    Variable(VariableNode),
    /// A registered tag, possibly owning child nodes
    Tag(TagNode),
}

impl Node {
    pub fn span(&self) -> Span {
        match self {
            Node::Text(n) => n.span,
            Node::Variable(n) => n.span,
            Node::Tag(n) => n.span,
        }
    }

    /// Name of the tag, if this is a tag node
    pub fn tag_name(&self) -> Option<&str> {
        match self {
            Node::Tag(n) => Some(&n.name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextNode {
    pub text: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct VariableNode {
    pub variable: Variable,
    pub markup: String,
    pub span: Span,
}

#[derive(Debug)]
pub struct TagNode {
    pub name: String,
    pub markup: String,
    pub tag: Box<dyn Tag>,
    pub span: Span,
}

// ============================================================================
// Expressions
// ============================================================================

/// A root expression followed by its filter pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub expr: Expr,
    pub filters: Vec<FilterCall>,
}

impl Variable {
    pub fn new(expr: Expr) -> Self {
        Self {
            expr,
            filters: Vec::new(),
        }
    }

    /// The bare literal, if this variable is one with no filters
    pub fn as_literal(&self) -> Option<&Literal> {
        match &self.expr {
            Expr::Literal(lit) if self.filters.is_empty() => Some(lit),
            _ => None,
        }
    }
}

/// `| name: arg1, arg2`
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCall {
    pub name: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    /// (start..end), inclusive
    Range(Box<Expr>, Box<Expr>),
    Lookup(Lookup),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// `empty`: equal to empty strings and collections
    Empty,
    /// `blank`: like `empty`, also matching nil, false and whitespace
    Blank,
}

/// `name.field[index]...`
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub name: String,
    pub path: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Field(String),
    Index(Expr),
}
