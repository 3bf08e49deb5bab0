//! Compiled templates and the node renderer
//!
//! A [`Template`] is parsed once and can be rendered many times, from any
//! number of threads. Each render gets its own [`Context`]; the only state
//! shared between renders is the template's persistent assigns, written by
//! `{% assign %}` unless the template isolates its renders.

use crate::ast::{Document, Node};
use crate::context::{Assigns, Context};
use crate::environment::Environment;
use crate::error::{Error, Result, TemplateSource};
use crate::parser::Parser;
use crate::value::{FormatSettings, Value};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Loop-control signal returned by every node render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Normal,
    Break,
    Continue,
}

/// What to do with an error raised while rendering a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorMode {
    /// Write `Liquid error: <message>` in place of the node and go on
    #[default]
    Inline,
    /// Abort the render with the error
    Strict,
}

/// Per-render settings
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Extra assigns, visible for this render only
    pub assigns: Assigns,
    pub format: FormatSettings,
    pub error_mode: ErrorMode,
    /// Absolute deadline
    pub deadline: Option<Instant>,
    /// Deadline relative to the start of each render
    pub timeout: Option<Duration>,
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_assign(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assigns.insert(name.into(), value.into());
        self
    }

    pub fn with_error_mode(mut self, error_mode: ErrorMode) -> Self {
        self.error_mode = error_mode;
        self
    }

    pub fn with_format(mut self, format: FormatSettings) -> Self {
        self.format = format;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The earliest of the absolute deadline and `now + timeout`
    fn effective_deadline(&self, now: Instant) -> Option<Instant> {
        let relative = self.timeout.and_then(|t| now.checked_add(t));
        match (self.deadline, relative) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Output of a render together with the errors written inline
#[derive(Debug)]
pub struct Rendered {
    pub output: String,
    pub errors: Vec<Error>,
}

/// A compiled template
#[derive(Clone)]
pub struct Template {
    env: Arc<Environment>,
    document: Arc<Document>,
    source: TemplateSource,
    persistent: Arc<RwLock<Assigns>>,
    persist_assigns: bool,
}

impl Template {
    /// Parse a template against a finished environment
    pub fn parse(env: &Arc<Environment>, name: &str, source: &str) -> Result<Self> {
        let source = TemplateSource::new(name, source);
        let document = Parser::new(&source, env.tags()).parse()?;
        tracing::debug!(template = name, nodes = document.nodes.len(), "parsed template");
        Ok(Self {
            env: Arc::clone(env),
            document: Arc::new(document),
            source,
            persistent: Arc::new(RwLock::new(Assigns::new())),
            persist_assigns: true,
        })
    }

    /// Replace the template text, keeping the persistent assigns
    pub fn reparse(&mut self, source: &str) -> Result<()> {
        let source = TemplateSource::new(self.source.name(), source);
        let document = Parser::new(&source, self.env.tags()).parse()?;
        self.document = Arc::new(document);
        self.source = source;
        Ok(())
    }

    /// Keep `{% assign %}` results local to each render. Assigns set through
    /// [`Template::assign`] are still shared.
    pub fn with_isolated_assigns(mut self) -> Self {
        self.persist_assigns = false;
        self
    }

    pub fn isolates_assigns(&self) -> bool {
        !self.persist_assigns
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    pub fn source(&self) -> &TemplateSource {
        &self.source
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn environment(&self) -> &Arc<Environment> {
        &self.env
    }

    /// Snapshot of the persistent assigns
    pub fn persistent_assigns(&self) -> Assigns {
        self.persistent
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Set a persistent assign, visible to every later render
    pub fn assign(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.persistent
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), value.into());
    }

    /// Render with the given data context
    ///
    /// `data` must be a hash (or nil); its entries become per-render assigns.
    pub fn render(&self, data: impl Into<Value>, options: &RenderOptions) -> Result<String> {
        self.render_collecting(data, options)
            .map(|rendered| rendered.output)
    }

    /// Render with variables and default options
    pub fn render_with<I, K, V>(&self, vars: I) -> Result<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let data: Value = vars.into_iter().collect();
        self.render(data, &RenderOptions::default())
    }

    /// Render, also returning the errors written inline
    pub fn render_collecting(
        &self,
        data: impl Into<Value>,
        options: &RenderOptions,
    ) -> Result<Rendered> {
        let mut custom = match data.into() {
            Value::Hash(map) => map.into_iter().collect::<Assigns>(),
            Value::Nil => Assigns::new(),
            other => {
                return Err(Error::argument(format!(
                    "data context must be a hash, got {}",
                    other.type_name()
                )));
            }
        };
        custom.extend(options.assigns.iter().map(|(k, v)| (k.clone(), v.clone())));

        let now = Instant::now();
        let mut ctx = Context::new(
            &self.env,
            &self.persistent,
            custom,
            options.error_mode,
            options.format.clone(),
            options.effective_deadline(now),
        );
        ctx.set_persist_assigns(self.persist_assigns);

        tracing::trace!(template = self.name(), "render start");
        let mut output = String::new();
        render_all(&self.document.nodes, &mut ctx, &mut output)?;
        let errors = ctx.into_errors();
        tracing::trace!(
            template = self.name(),
            bytes = output.len(),
            errors = errors.len(),
            elapsed = ?now.elapsed(),
            "render done"
        );

        Ok(Rendered { output, errors })
    }
}

impl std::fmt::Debug for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name())
            .field("nodes", &self.document.nodes.len())
            .finish()
    }
}

/// Render nodes in order, stopping at the first non-normal [`Flow`]
pub fn render_all(nodes: &[Node], ctx: &mut Context<'_>, out: &mut String) -> Result<Flow> {
    for node in nodes {
        ctx.check_deadline()?;
        match render_node(node, ctx, out) {
            Ok(Flow::Normal) => {}
            Ok(flow) => return Ok(flow),
            Err(error) => ctx.handle_error(error, out)?,
        }
    }
    Ok(Flow::Normal)
}

fn render_node(node: &Node, ctx: &mut Context<'_>, out: &mut String) -> Result<Flow> {
    match node {
        Node::Text(text) => out.push_str(&text.text),
        Node::Variable(var) => {
            let value = ctx.evaluate(&var.variable)?;
            out.push_str(&ctx.to_output(value));
        }
        Node::Tag(tag) => return tag.tag.render(ctx, out),
    }
    Ok(Flow::Normal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(source: &str) -> String {
        let env = Arc::new(Environment::new());
        Template::parse(&env, "test", source)
            .unwrap()
            .render(Value::Nil, &RenderOptions::default())
            .unwrap()
    }

    #[test]
    fn test_simple_text() {
        assert_eq!(render("Hello, world!"), "Hello, world!");
    }

    #[test]
    fn test_render_with_vars() {
        let env = Arc::new(Environment::new());
        let t = Template::parse(&env, "test", "Hello, {{ name }}!").unwrap();
        assert_eq!(t.render_with([("name", "Ann")]).unwrap(), "Hello, Ann!");
    }

    #[test]
    fn test_break_at_root_is_swallowed() {
        assert_eq!(render("a{% break %}b"), "a");
    }

    #[test]
    fn test_inline_error() {
        let env = Arc::new(Environment::new());
        let t = Template::parse(&env, "test", "a{{ 1 | divided_by: 0 }}b").unwrap();
        let rendered = t
            .render_collecting(Value::Nil, &RenderOptions::default())
            .unwrap();
        assert_eq!(rendered.output, "aLiquid error: divided by 0b");
        assert_eq!(rendered.errors.len(), 1);
    }

    #[test]
    fn test_strict_error() {
        let env = Arc::new(Environment::new());
        let t = Template::parse(&env, "test", "a{{ 1 | divided_by: 0 }}b").unwrap();
        let options = RenderOptions::new().with_error_mode(ErrorMode::Strict);
        assert!(matches!(t.render(Value::Nil, &options), Err(Error::Render(_))));
    }

    #[test]
    fn test_argument_errors_always_propagate() {
        let env = Arc::new(Environment::new());
        let t = Template::parse(&env, "test", "{{ 1 | plus }}").unwrap();
        let result = t.render(Value::Nil, &RenderOptions::default());
        assert!(matches!(result, Err(Error::Argument(_))));
    }

    #[test]
    fn test_data_must_be_hash() {
        let env = Arc::new(Environment::new());
        let t = Template::parse(&env, "test", "x").unwrap();
        assert!(t.render(Value::Int(1), &RenderOptions::default()).is_err());
    }

    #[test]
    fn test_reparse_keeps_persistent_assigns() {
        let env = Arc::new(Environment::new());
        let mut t = Template::parse(&env, "test", "{% assign foo = 'kept' %}{{ foo }}").unwrap();
        assert_eq!(t.render_with([("x", 1)]).unwrap(), "kept");
        t.reparse("{{ foo }}").unwrap();
        assert_eq!(t.render_with([("x", 1)]).unwrap(), "kept");
        assert_eq!(t.source().source(), "{{ foo }}");
    }

    #[test]
    fn test_effective_deadline() {
        let now = Instant::now();
        let options = RenderOptions::new()
            .with_deadline(now + Duration::from_secs(5))
            .with_timeout(Duration::from_secs(1));
        assert_eq!(
            options.effective_deadline(now),
            Some(now + Duration::from_secs(1))
        );
        assert_eq!(RenderOptions::new().effective_deadline(now), None);
    }
}
