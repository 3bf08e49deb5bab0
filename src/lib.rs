//! cannelle: a Liquid template engine
//!
//! Templates are parsed once against an [`Environment`] and rendered many
//! times against plain data or host objects:
//!
//! ```
//! use cannelle::{Environment, RenderOptions, Template, Value};
//! use std::sync::Arc;
//!
//! let env = Arc::new(Environment::new());
//! let template = Template::parse(
//!     &env,
//!     "greeting",
//!     "{% if user.admin %}Welcome back, {{ user.name | capitalize }}{% endif %}",
//! )
//! .unwrap();
//!
//! let user: Value = [("name", Value::from("tobi")), ("admin", Value::from(true))]
//!     .into_iter()
//!     .collect();
//! let out = template
//!     .render([("user", user)].into_iter().collect::<Value>(), &RenderOptions::default())
//!     .unwrap();
//! assert_eq!(out, "Welcome back, Tobi");
//! ```

#![allow(clippy::result_large_err)]

pub mod adapter;
pub mod ast;
pub mod condition;
pub mod config;
pub mod context;
pub mod environment;
pub mod error;
pub mod filters;
pub mod lexer;
pub mod markup;
pub mod parser;
pub mod render;
pub mod tags;
pub mod value;

pub use adapter::{Adapter, Members, Object, ObjectRef, Visibility, schema_computations};
pub use config::{EngineConfig, RenderConfig};
pub use context::{Assigns, Context};
pub use environment::{Environment, ValueTransformer};
pub use error::{
    ArgumentError, Error, RenderError, Result, SyntaxError, SyntaxErrorKind, TemplateSource,
    TimeoutError,
};
pub use filters::FilterRegistry;
pub use parser::{BlockBody, Parser, TagHeader};
pub use render::{ErrorMode, Flow, RenderOptions, Rendered, Template, render_all};
pub use tags::{BlockNodes, Tag, TagRegistry};
pub use value::{FormatSettings, LazyValue, Value, ValueKind};
