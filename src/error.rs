//! Errors for template parsing and rendering
//!
//! Syntax errors carry the template source and a labelled span so that
//! miette can point at the offending tag. Render-time errors are plain
//! messages; they are either written inline or propagated depending on the
//! active [`ErrorMode`](crate::ErrorMode).

use miette::{Diagnostic, NamedSource, SourceSpan};
use std::sync::Arc;
use std::time::Duration;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// A named template source, kept around for diagnostics
#[derive(Debug, Clone)]
pub struct TemplateSource {
    name: String,
    source: Arc<String>,
}

impl TemplateSource {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: Arc::new(source.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn named_source(&self) -> NamedSource<String> {
        NamedSource::new(&self.name, self.source.to_string())
    }
}

/// Any failure produced by the engine
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Timeout(#[from] TimeoutError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Argument(#[from] ArgumentError),
}

impl Error {
    pub fn render(message: impl Into<String>) -> Self {
        Error::Render(RenderError::new(message))
    }

    pub fn argument(message: impl Into<String>) -> Self {
        Error::Argument(ArgumentError::new(message))
    }

    /// Fatal errors abort the render regardless of the error mode.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::Argument(_))
    }

    pub fn syntax_kind(&self) -> Option<&SyntaxErrorKind> {
        match self {
            Error::Syntax(e) => Some(&e.kind),
            _ => None,
        }
    }
}

/// A template failed to parse
#[derive(Debug, thiserror::Error, Diagnostic)]
#[error("{kind}")]
#[diagnostic(code(cannelle::syntax))]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,

    #[source_code]
    pub src: NamedSource<String>,

    #[label("here")]
    pub span: SourceSpan,
}

/// What went wrong while parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyntaxErrorKind {
    #[error("unknown tag '{name}'")]
    UnknownTag { name: String },

    #[error("'{block}' tag was never closed")]
    BlockNotClosed { block: String },

    #[error("{block} tag does not expect else tag")]
    UnexpectedElse { block: String },

    #[error("'end' is not a valid delimiter for {block} tags. use {delimiter}")]
    InvalidEnd { block: String, delimiter: String },

    #[error("tag '{markup}' was not properly terminated")]
    TagNotTerminated { markup: String },

    #[error("variable '{markup}' was not properly terminated")]
    VariableNotTerminated { markup: String },

    /// Markup of a known tag does not match its grammar
    #[error("syntax error in '{tag}' tag - valid syntax: {usage}")]
    TagSyntax { tag: String, usage: String },

    #[error("syntax error in '{tag}' tag - max {max} conditions are allowed")]
    TooManyConditions { tag: String, max: usize },

    /// Invalid expression inside `{{ }}` or a tag
    #[error("{message} in '{markup}'")]
    Markup { message: String, markup: String },

    /// A structural rule of a tag was violated (raised by custom tags)
    #[error("{message}")]
    Rule { message: String },
}

#[derive(Debug, thiserror::Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(cannelle::render))]
pub struct RenderError {
    pub message: String,
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The render deadline passed before all nodes were written
#[derive(Debug, thiserror::Error, Diagnostic)]
#[error("render deadline exceeded after {elapsed:?}")]
#[diagnostic(code(cannelle::timeout))]
pub struct TimeoutError {
    pub elapsed: Duration,
}

/// Invalid input handed to the engine by the caller
#[derive(Debug, thiserror::Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(cannelle::argument))]
pub struct ArgumentError {
    pub message: String,
}

impl ArgumentError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_messages() {
        let kind = SyntaxErrorKind::BlockNotClosed {
            block: "if".to_string(),
        };
        assert_eq!(kind.to_string(), "'if' tag was never closed");

        let kind = SyntaxErrorKind::InvalidEnd {
            block: "tablerow".to_string(),
            delimiter: "endtablerow".to_string(),
        };
        assert_eq!(
            kind.to_string(),
            "'end' is not a valid delimiter for tablerow tags. use endtablerow"
        );
    }

    #[test]
    fn test_fatal_errors() {
        assert!(Error::argument("missing").is_fatal());
        assert!(!Error::render("oops").is_fatal());
    }
}
