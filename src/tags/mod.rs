//! Tags and the tag registry
//!
//! A tag is built at parse time by the factory registered under its name.
//! Block tags consume their body from the parser inside the factory; the
//! resulting [`Tag`] renders itself against a [`Context`].

mod assign;
mod if_tag;
mod interrupt;
mod tablerow;

pub use assign::Assign;
pub use if_tag::If;
pub use interrupt::{Break, Continue};
pub use tablerow::TableRow;

use crate::ast::Node;
use crate::context::Context;
use crate::error::{Result, SyntaxErrorKind};
use crate::parser::{BlockBody, Parser, TagHeader};
use crate::render::Flow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A parsed tag
pub trait Tag: fmt::Debug + Send + Sync {
    /// Write the tag's output. Loop-control tags return a non-normal [`Flow`].
    fn render(&self, ctx: &mut Context<'_>, out: &mut String) -> Result<Flow>;

    /// Check structural rules once the tag is placed; `siblings` includes
    /// the tag itself as its last element
    fn assert_rules(&self, _siblings: &[Node]) -> std::result::Result<(), SyntaxErrorKind> {
        Ok(())
    }
}

/// Builds a tag from its header, consuming its body when it is a block
pub type TagFactory =
    Arc<dyn Fn(TagHeader, &mut Parser<'_>) -> Result<Box<dyn Tag>> + Send + Sync>;

/// Tags known to an environment
#[derive(Clone, Default)]
pub struct TagRegistry {
    factories: HashMap<String, TagFactory>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding `assign`, `if`, `tablerow`, `break` and `continue`
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register("assign", Assign::parse);
        registry.register("if", If::parse);
        registry.register("tablerow", TableRow::parse);
        registry.register("break", Break::parse);
        registry.register("continue", Continue::parse);
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(TagHeader, &mut Parser<'_>) -> Result<Box<dyn Tag>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    pub fn get(&self, name: &str) -> Option<&TagFactory> {
        self.factories.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl fmt::Debug for TagRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort_unstable();
        f.debug_struct("TagRegistry").field("tags", &names).finish()
    }
}

/// A single node list closed by `end<name>`, for simple block tags
#[derive(Debug)]
pub struct BlockNodes {
    name: String,
    nodes: Vec<Node>,
}

impl BlockNodes {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
        }
    }

    /// Parse a body for the block opened by `header`
    pub fn parse(header: &TagHeader, parser: &mut Parser<'_>) -> Result<Vec<Node>> {
        let mut body = Self::new(header.name.clone());
        parser.parse_body(&mut body, header.span)?;
        Ok(body.nodes)
    }
}

impl BlockBody for BlockNodes {
    fn block_name(&self) -> &str {
        &self.name
    }

    fn push_node(&mut self, node: Node) {
        self.nodes.push(node);
    }

    fn nodes(&self) -> &[Node] {
        &self.nodes
    }
}
