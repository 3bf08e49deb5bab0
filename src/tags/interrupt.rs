//! `{% break %}` and `{% continue %}`

use super::Tag;
use crate::context::Context;
use crate::error::Result;
use crate::parser::{Parser, TagHeader};
use crate::render::Flow;

/// Stops the enclosing loop
#[derive(Debug)]
pub struct Break;

impl Break {
    pub fn parse(_header: TagHeader, _parser: &mut Parser<'_>) -> Result<Box<dyn Tag>> {
        Ok(Box::new(Break))
    }
}

impl Tag for Break {
    fn render(&self, _ctx: &mut Context<'_>, _out: &mut String) -> Result<Flow> {
        Ok(Flow::Break)
    }
}

/// Skips to the next iteration of the enclosing loop
#[derive(Debug)]
pub struct Continue;

impl Continue {
    pub fn parse(_header: TagHeader, _parser: &mut Parser<'_>) -> Result<Box<dyn Tag>> {
        Ok(Box::new(Continue))
    }
}

impl Tag for Continue {
    fn render(&self, _ctx: &mut Context<'_>, _out: &mut String) -> Result<Flow> {
        Ok(Flow::Continue)
    }
}
