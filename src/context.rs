//! Rendering context
//!
//! Holds the variable scopes of one render call. Lookups walk the scope
//! stack from the innermost frame outwards, then the per-render assigns, then
//! the template's persistent assigns, then the environment globals.

use crate::ast::{Expr, Literal, Segment, Variable};
use crate::environment::Environment;
use crate::error::{Error, Result, TimeoutError};
use crate::render::ErrorMode;
use crate::value::{FormatSettings, Value};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Instant;

/// Name → value bindings
pub type Assigns = HashMap<String, Value>;

/// Longest range literal a template may build
pub const MAX_RANGE_LEN: usize = 1_000_000;

/// Evaluation state of one render call
pub struct Context<'a> {
    env: &'a Environment,
    /// Scope frames, innermost last. The first frame is never popped.
    scopes: Vec<Assigns>,
    /// Data context and option assigns, visible for this render only
    custom: Assigns,
    persistent: &'a RwLock<Assigns>,
    /// Whether `assign` also writes the persistent assigns
    persist_assigns: bool,
    error_mode: ErrorMode,
    format: FormatSettings,
    started: Instant,
    deadline: Option<Instant>,
    errors: Vec<Error>,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        env: &'a Environment,
        persistent: &'a RwLock<Assigns>,
        custom: Assigns,
        error_mode: ErrorMode,
        format: FormatSettings,
        deadline: Option<Instant>,
    ) -> Self {
        Self {
            env,
            scopes: vec![Assigns::new()],
            custom,
            persistent,
            persist_assigns: true,
            error_mode,
            format,
            started: Instant::now(),
            deadline,
            errors: Vec::new(),
        }
    }

    pub fn environment(&self) -> &Environment {
        self.env
    }

    pub fn error_mode(&self) -> ErrorMode {
        self.error_mode
    }

    pub fn format(&self) -> &FormatSettings {
        &self.format
    }

    /// Errors written inline so far
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    pub(crate) fn set_persist_assigns(&mut self, persist: bool) {
        self.persist_assigns = persist;
    }

    pub(crate) fn into_errors(self) -> Vec<Error> {
        self.errors
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    /// Look up a name; unknown names are nil
    pub fn get(&self, name: &str) -> Value {
        self.lookup(name).into_owned().into_resolved()
    }

    /// Look up a name without copying it out of the scopes. Persistent
    /// assigns sit behind a lock and come back owned.
    fn lookup(&self, name: &str) -> Cow<'_, Value> {
        for scope in self.scopes.iter().rev() {
            if let Some(value) = scope.get(name) {
                return Cow::Borrowed(value);
            }
        }
        if let Some(value) = self.custom.get(name) {
            return Cow::Borrowed(value);
        }
        let persistent = self
            .persistent
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = persistent.get(name) {
            return Cow::Owned(value.clone());
        }
        drop(persistent);
        match self.env.global(name) {
            Some(value) => Cow::Borrowed(value),
            None => Cow::Owned(Value::Nil),
        }
    }

    /// Bind a name in the innermost scope frame
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), value);
        }
    }

    /// Bind a name in the outermost frame and, unless the template isolates
    /// its renders, in the persistent assigns so later renders see it
    pub fn assign(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if self.persist_assigns {
            self.persistent
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(name.clone(), value.clone());
        }
        self.scopes[0].insert(name, value);
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Assigns::new());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Run `f` inside a fresh scope frame, popping it on every exit path
    pub fn stack<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.push_scope();
        let result = f(self);
        self.pop_scope();
        result
    }

    /// Fail once the render deadline has passed
    pub fn check_deadline(&self) -> Result<()> {
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(TimeoutError {
                elapsed: self.started.elapsed(),
            }
            .into());
        }
        Ok(())
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    /// Evaluate an expression without applying any transform
    pub fn resolve(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(lit) => Ok(literal_value(lit)),
            Expr::Range(start, end) => {
                let start = self.resolve(start)?;
                let end = self.resolve(end)?;
                match (start.as_int(), end.as_int()) {
                    (Some(start), Some(end)) => range(start, end),
                    _ => Err(Error::render(format!(
                        "invalid range ({}..{})",
                        start.render(),
                        end.render()
                    ))),
                }
            }
            Expr::Lookup(lookup) => {
                let mut value = self.lookup(&lookup.name);
                for segment in &lookup.path {
                    if value.is_nil() {
                        break;
                    }
                    let next = match &value {
                        Cow::Borrowed(current) => self.step(*current, segment)?,
                        Cow::Owned(current) => self
                            .step(current, segment)?
                            .map(|found| Cow::Owned(found.into_owned())),
                    };
                    value = next.unwrap_or(Cow::Owned(Value::Nil));
                }
                Ok(value.into_owned().into_resolved())
            }
        }
    }

    /// One `.name` or `[index]` step of a lookup path
    fn step<'v>(&self, value: &'v Value, segment: &Segment) -> Result<Option<Cow<'v, Value>>> {
        let adapters = self.env.adapters();
        Ok(match segment {
            Segment::Field(name) => adapters.member_ref(value, name),
            Segment::Index(index) => {
                let index = self.expose(self.resolve(index)?);
                adapters.index_ref(value, &index)
            }
        })
    }

    /// Evaluate a variable, applying its filters left to right
    pub fn evaluate(&self, variable: &Variable) -> Result<Value> {
        let mut value = self.resolve(&variable.expr)?;
        for call in &variable.filters {
            let input = self.expose(value);
            let args = call
                .args
                .iter()
                .map(|arg| self.resolve(arg).map(|v| self.expose(v)))
                .collect::<Result<Vec<_>>>()?;
            value = self.env.filters().apply(&call.name, &input, &args)?;
        }
        Ok(value)
    }

    /// Apply the object transform of a host value, if it has one
    pub fn expose(&self, value: Value) -> Value {
        self.env.adapters().expose(value)
    }

    /// The text written for a value
    pub fn to_output(&self, value: Value) -> String {
        let value = self.expose(value);
        match self.env.value_transformer(value.kind()) {
            Some(transform) => transform(&value),
            None => value.to_output_string(&self.format),
        }
    }

    /// Write a failed node's message inline, or propagate it.
    ///
    /// Timeout and argument errors always propagate.
    pub(crate) fn handle_error(&mut self, error: Error, out: &mut String) -> Result<()> {
        if error.is_fatal() || self.error_mode == ErrorMode::Strict {
            return Err(error);
        }
        tracing::warn!(%error, "rendering error inline");
        match &error {
            Error::Syntax(_) => out.push_str("Liquid syntax error: "),
            _ => out.push_str("Liquid error: "),
        }
        out.push_str(&error.to_string());
        self.errors.push(error);
        Ok(())
    }
}

/// The inclusive range `start..=end`, empty when `end < start`
fn range(start: i64, end: i64) -> Result<Value> {
    if end < start {
        return Ok(Value::Array(Vec::new()));
    }
    let len = end
        .checked_sub(start)
        .and_then(|span| usize::try_from(span).ok())
        .and_then(|span| span.checked_add(1))
        .filter(|&len| len <= MAX_RANGE_LEN);
    match len {
        Some(_) => Ok(Value::Array((start..=end).map(Value::Int).collect())),
        None => Err(Error::render(format!(
            "range ({start}..{end}) is longer than {MAX_RANGE_LEN} items"
        ))),
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Nil => Value::Nil,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(i) => Value::Int(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::Str(s) => Value::Str(s.clone()),
        Literal::Empty | Literal::Blank => Value::Str(String::new()),
    }
}
