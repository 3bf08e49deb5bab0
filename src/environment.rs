//! Engine configuration: tags, filters, adapters, output transformers and
//! globals.
//!
//! An environment is configured through `&mut self` and then frozen in an
//! `Arc`; templates are parsed against the frozen environment, so nothing can
//! be registered once rendering starts.
//!
//! ```
//! use cannelle::{Environment, Template, Value};
//! use std::sync::Arc;
//!
//! let mut env = Environment::new();
//! env.register_filter("Shout", |v, _| Ok(Value::from(v.render().to_uppercase() + "!")));
//! let env = Arc::new(env);
//!
//! let template = Template::parse(&env, "hello", "{{ name | shout }}").unwrap();
//! let out = template.render_with([("name", "tobi")]).unwrap();
//! assert_eq!(out, "TOBI!");
//! ```

use crate::adapter::{Adapter, AdapterRegistry};
use crate::context::Assigns;
use crate::error::Result;
use crate::filters::FilterRegistry;
use crate::parser::{Parser, TagHeader};
use crate::render::Template;
use crate::tags::{Tag, TagRegistry};
use crate::value::{Value, ValueKind};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Replaces the output text of every value of one kind
pub type ValueTransformer = Arc<dyn Fn(&Value) -> String + Send + Sync>;

pub struct Environment {
    tags: TagRegistry,
    filters: FilterRegistry,
    adapters: AdapterRegistry,
    value_transformers: HashMap<ValueKind, ValueTransformer>,
    globals: Assigns,
}

impl Environment {
    /// An environment with the standard tags and filters
    pub fn new() -> Self {
        Self {
            tags: TagRegistry::standard(),
            filters: FilterRegistry::standard(),
            ..Self::empty()
        }
    }

    /// An environment with no tags and no filters
    pub fn empty() -> Self {
        Self {
            tags: TagRegistry::new(),
            filters: FilterRegistry::new(),
            adapters: AdapterRegistry::new(),
            value_transformers: HashMap::new(),
            globals: Assigns::new(),
        }
    }

    pub fn register_tag<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(TagHeader, &mut Parser<'_>) -> Result<Box<dyn Tag>> + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!(tag = %name, "registered tag");
        self.tags.register(name, factory);
        self
    }

    /// Register a filter. `AddTwo` is callable as `add_two`.
    pub fn register_filter<F>(&mut self, name: &str, filter: F) -> &mut Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        tracing::debug!(filter = name, "registered filter");
        self.filters.register(name, filter);
        self
    }

    pub fn register_adapter<T: Any + Send + Sync>(&mut self, adapter: Adapter<T>) -> &mut Self {
        self.adapters.register(adapter);
        self
    }

    /// Control how values of `kind` are written out
    pub fn register_value_transformer<F>(&mut self, kind: ValueKind, transformer: F) -> &mut Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        tracing::debug!(?kind, "registered value transformer");
        self.value_transformers.insert(kind, Arc::new(transformer));
        self
    }

    /// A variable visible to every template, below all other assigns
    pub fn register_global(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.globals.insert(name.into(), value.into());
        self
    }

    /// Parse a template; shorthand for [`Template::parse`]
    pub fn parse(env: &Arc<Self>, name: &str, source: &str) -> Result<Template> {
        Template::parse(env, name, source)
    }

    pub fn tags(&self) -> &TagRegistry {
        &self.tags
    }

    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    pub fn value_transformer(&self, kind: ValueKind) -> Option<&ValueTransformer> {
        self.value_transformers.get(&kind)
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut globals: Vec<_> = self.globals.keys().collect();
        globals.sort_unstable();
        f.debug_struct("Environment")
            .field("tags", &self.tags)
            .field("filters", &self.filters)
            .field("adapters", &self.adapters)
            .field("value_transformers", &self.value_transformers.keys())
            .field("globals", &globals)
            .finish()
    }
}
