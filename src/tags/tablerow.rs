//! `{% tablerow item in collection cols:3 limit:6 offset:2 %}`
//!
//! Writes the rows of an HTML table, one cell per item:
//!
//! ```text
//! <tr class="row1">
//! <td class="col1">..</td><td class="col2">..</td></tr>
//! <tr class="row2"><td class="col1">..</td></tr>
//! ```

use super::{BlockNodes, Tag};
use crate::ast::{Expr, Node};
use crate::context::Context;
use crate::error::{Result, SyntaxErrorKind};
use crate::markup::Scanner;
use crate::parser::{Parser, TagHeader};
use crate::render::{Flow, render_all};
use crate::value::Value;

#[derive(Debug)]
pub struct TableRow {
    variable: String,
    collection: Expr,
    attributes: Vec<(String, Expr)>,
    nodes: Vec<Node>,
}

struct Markup {
    variable: String,
    collection: Expr,
    attributes: Vec<(String, Expr)>,
}

impl TableRow {
    pub fn parse(header: TagHeader, parser: &mut Parser<'_>) -> Result<Box<dyn Tag>> {
        let Some(markup) = parse_markup(&header.markup) else {
            return Err(parser.syntax_error(
                SyntaxErrorKind::TagSyntax {
                    tag: "tablerow".to_string(),
                    usage: "tablerow [item] in [collection] cols:[number]".to_string(),
                },
                header.span,
            ));
        };
        let nodes = BlockNodes::parse(&header, parser)?;
        Ok(Box::new(TableRow {
            variable: markup.variable,
            collection: markup.collection,
            attributes: markup.attributes,
            nodes,
        }))
    }

    fn attribute(&self, ctx: &Context<'_>, name: &str) -> Result<Option<i64>> {
        match self.attributes.iter().find(|(key, _)| key == name) {
            Some((_, expr)) => Ok(ctx.expose(ctx.resolve(expr)?).as_int()),
            None => Ok(None),
        }
    }
}

fn parse_markup(markup: &str) -> Option<Markup> {
    let mut scanner = Scanner::new(markup);
    scanner.skip_whitespace();
    let variable = scanner.ident()?.to_string();
    scanner.skip_whitespace();
    if !scanner.keyword("in") {
        return None;
    }
    let collection = scanner.expr().ok()?;

    let mut attributes = Vec::new();
    loop {
        scanner.skip_whitespace();
        while scanner.eat(',') {
            scanner.skip_whitespace();
        }
        if scanner.is_at_end() {
            break;
        }
        let key = scanner.ident()?.to_string();
        scanner.skip_whitespace();
        if !scanner.eat(':') {
            return None;
        }
        let value = scanner.expr().ok()?;
        attributes.push((key, value));
    }

    Some(Markup {
        variable,
        collection,
        attributes,
    })
}

impl Tag for TableRow {
    fn render(&self, ctx: &mut Context<'_>, out: &mut String) -> Result<Flow> {
        let collection = ctx.expose(ctx.resolve(&self.collection)?);
        let Value::Array(items) = collection else {
            return Ok(Flow::Normal);
        };

        let offset = self.attribute(ctx, "offset")?.unwrap_or(0);
        let offset = usize::try_from(offset).unwrap_or(0);
        let limit = self.attribute(ctx, "limit")?;
        let cols = self.attribute(ctx, "cols")?.unwrap_or(0);
        let cols = usize::try_from(cols).unwrap_or(0);

        let items: Vec<Value> = match limit {
            Some(limit) => {
                let limit = usize::try_from(limit).unwrap_or(0);
                items.into_iter().skip(offset).take(limit).collect()
            }
            None => items.into_iter().skip(offset).collect(),
        };
        let length = items.len();

        out.push_str("<tr class=\"row1\">\n");
        ctx.stack(|ctx| {
            let mut row = 1;
            let mut col = 0;
            for (index, item) in items.into_iter().enumerate() {
                ctx.set(self.variable.as_str(), item);
                ctx.set("tablerowloop", loop_info(index, length, col, cols));

                col += 1;
                out.push_str(&format!("<td class=\"col{col}\">"));
                let flow = render_all(&self.nodes, ctx, out)?;
                out.push_str("</td>");

                if flow == Flow::Break {
                    break;
                }
                if col == cols && index + 1 != length {
                    col = 0;
                    row += 1;
                    out.push_str(&format!("</tr>\n<tr class=\"row{row}\">"));
                }
            }
            Ok(())
        })?;
        out.push_str("</tr>\n");

        Ok(Flow::Normal)
    }
}

/// The `tablerowloop` variable; `col0` is the column before this cell
fn loop_info(index: usize, length: usize, col0: usize, cols: usize) -> Value {
    [
        ("length", Value::from(length)),
        ("index", Value::from(index + 1)),
        ("index0", Value::from(index)),
        ("rindex", Value::from(length - index)),
        ("rindex0", Value::from(length - index - 1)),
        ("first", Value::from(index == 0)),
        ("last", Value::from(index + 1 == length)),
        ("col", Value::from(col0 + 1)),
        ("col0", Value::from(col0)),
        ("col_first", Value::from(col0 == 0)),
        ("col_last", Value::from(col0 + 1 == cols)),
    ]
    .into_iter()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_markup() {
        let markup = parse_markup("item in products cols:3, limit: 2").unwrap();
        assert_eq!(markup.variable, "item");
        let keys: Vec<_> = markup.attributes.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["cols", "limit"]);
    }

    #[test]
    fn test_invalid_markup() {
        assert!(parse_markup("item products").is_none());
        assert!(parse_markup("item in").is_none());
        assert!(parse_markup("item in list cols").is_none());
    }

    #[test]
    fn test_loop_info() {
        let Value::Hash(info) = loop_info(2, 3, 0, 2) else {
            panic!("expected hash");
        };
        assert_eq!(info["index"], Value::Int(3));
        assert_eq!(info["rindex0"], Value::Int(0));
        assert_eq!(info["last"], Value::Bool(true));
        assert_eq!(info["col_first"], Value::Bool(true));
        assert_eq!(info["col_last"], Value::Bool(false));
    }
}
