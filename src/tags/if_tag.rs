//! `{% if %}` with `elsif` / `elseif` and `else` branches

use super::Tag;
use crate::ast::Node;
use crate::condition::Condition;
use crate::context::Context;
use crate::error::{Result, SyntaxErrorKind};
use crate::parser::{BlockBody, Parser, TagHeader};
use crate::render::{Flow, render_all};

#[derive(Debug)]
struct Branch {
    condition: Condition,
    nodes: Vec<Node>,
}

/// Renders the first branch whose condition holds
#[derive(Debug)]
pub struct If {
    branches: Vec<Branch>,
}

impl If {
    pub fn parse(header: TagHeader, parser: &mut Parser<'_>) -> Result<Box<dyn Tag>> {
        let condition = Condition::parse(&header.markup, &header.name)
            .map_err(|kind| parser.syntax_error(kind, header.span))?;

        let mut body = IfBody {
            name: header.name.clone(),
            branches: vec![Branch {
                condition,
                nodes: Vec::new(),
            }],
        };
        parser.parse_body(&mut body, header.span)?;
        Ok(Box::new(If {
            branches: body.branches,
        }))
    }
}

impl Tag for If {
    fn render(&self, ctx: &mut Context<'_>, out: &mut String) -> Result<Flow> {
        ctx.stack(|ctx| {
            for branch in &self.branches {
                if branch.condition.evaluate(ctx)? {
                    return render_all(&branch.nodes, ctx, out);
                }
            }
            Ok(Flow::Normal)
        })
    }
}

struct IfBody {
    name: String,
    branches: Vec<Branch>,
}

impl BlockBody for IfBody {
    fn block_name(&self) -> &str {
        &self.name
    }

    fn push_node(&mut self, node: Node) {
        if let Some(branch) = self.branches.last_mut() {
            branch.nodes.push(node);
        }
    }

    fn nodes(&self) -> &[Node] {
        match self.branches.last() {
            Some(branch) => &branch.nodes,
            None => &[],
        }
    }

    fn unknown_tag(&mut self, header: TagHeader, parser: &mut Parser<'_>) -> Result<()> {
        let after_else = self.branches.last().is_some_and(|b| b.condition.is_else());
        match header.name.as_str() {
            "elsif" | "elseif" | "else" if after_else => Err(parser.syntax_error(
                SyntaxErrorKind::Rule {
                    message: format!(
                        "'{}' may not follow 'else' in '{}' tag",
                        header.name, self.name
                    ),
                },
                header.span,
            )),
            "elsif" | "elseif" => {
                let condition = Condition::parse(&header.markup, &header.name)
                    .map_err(|kind| parser.syntax_error(kind, header.span))?;
                self.branches.push(Branch {
                    condition,
                    nodes: Vec::new(),
                });
                Ok(())
            }
            "else" => {
                self.branches.push(Branch {
                    condition: Condition::always(),
                    nodes: Vec::new(),
                });
                Ok(())
            }
            _ => Err(parser.unknown_tag_error(&header, self.block_name())),
        }
    }
}
