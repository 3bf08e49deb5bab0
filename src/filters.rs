//! Filters applied with `{{ value | name: args }}`
//!
//! A filter receives the piped value and its evaluated arguments. Missing
//! required arguments are argument errors and abort the render; inputs a
//! filter cannot work with are render errors.

use crate::error::{Error, Result};
use crate::value::{Number, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A filter implementation
pub type FilterFn = Arc<dyn Fn(&Value, &[Value]) -> Result<Value> + Send + Sync>;

/// Filters known to an environment
#[derive(Clone, Default)]
pub struct FilterRegistry {
    filters: HashMap<String, FilterFn>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the standard filters
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register("plus", plus);
        registry.register("minus", minus);
        registry.register("times", times);
        registry.register("divided_by", divided_by);
        registry.register("modulo", modulo);
        registry.register("size", size);
        registry.register("upcase", |v, _| Ok(Value::from(v.render().to_uppercase())));
        registry.register("downcase", |v, _| Ok(Value::from(v.render().to_lowercase())));
        registry.register("capitalize", capitalize);
        registry.register("append", append);
        registry.register("prepend", prepend);
        registry.register("strip", |v, _| Ok(Value::from(v.render().trim())));
        registry.register("lstrip", |v, _| Ok(Value::from(v.render().trim_start())));
        registry.register("rstrip", |v, _| Ok(Value::from(v.render().trim_end())));
        registry.register("split", split);
        registry.register("join", join);
        registry.register("first", first);
        registry.register("last", last);
        registry.register("reverse", reverse);
        registry.register("replace", replace);
        registry.register("remove", remove);
        registry.register("truncate", truncate);
        registry.register("default", default);
        registry.register("escape", escape);
        registry
    }

    /// Register a filter. CamelCase names are stored in snake_case.
    pub fn register<F>(&mut self, name: &str, filter: F)
    where
        F: Fn(&Value, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.filters.insert(normalize_name(name), Arc::new(filter));
    }

    pub fn get(&self, name: &str) -> Option<&FilterFn> {
        self.filters.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    pub fn apply(&self, name: &str, input: &Value, args: &[Value]) -> Result<Value> {
        let filter = self
            .get(name)
            .ok_or_else(|| Error::render(format!("unknown filter '{name}'")))?;
        filter(input, args)
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.filters.keys().collect();
        names.sort_unstable();
        f.debug_struct("FilterRegistry")
            .field("filters", &names)
            .finish()
    }
}

/// `AddTwo` → `add_two`
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
            out.push(c);
        }
    }
    out
}

fn arg<'v>(args: &'v [Value], index: usize, filter: &str) -> Result<&'v Value> {
    args.get(index).ok_or_else(|| {
        Error::argument(format!(
            "filter '{filter}' expects at least {} argument(s)",
            index + 1
        ))
    })
}

fn number(value: &Value, filter: &str) -> Result<Number> {
    value
        .as_number()
        .ok_or_else(|| Error::render(format!("{filter}: '{}' is not a number", value.render())))
}

// ============================================================================
// Math
// ============================================================================

fn arithmetic(
    input: &Value,
    args: &[Value],
    filter: &str,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value> {
    let lhs = number(input, filter)?;
    let rhs = number(arg(args, 0, filter)?, filter)?;
    let result = match (lhs, rhs) {
        (Number::Int(a), Number::Int(b)) => match int_op(a, b) {
            Some(n) => Number::Int(n),
            None => Number::Float(float_op(a as f64, b as f64)),
        },
        (a, b) => Number::Float(float_op(a.as_f64(), b.as_f64())),
    };
    Ok(result.into())
}

fn plus(input: &Value, args: &[Value]) -> Result<Value> {
    arithmetic(input, args, "plus", i64::checked_add, |a, b| a + b)
}

fn minus(input: &Value, args: &[Value]) -> Result<Value> {
    arithmetic(input, args, "minus", i64::checked_sub, |a, b| a - b)
}

fn times(input: &Value, args: &[Value]) -> Result<Value> {
    arithmetic(input, args, "times", i64::checked_mul, |a, b| a * b)
}

fn divided_by(input: &Value, args: &[Value]) -> Result<Value> {
    let divisor = number(arg(args, 0, "divided_by")?, "divided_by")?;
    if divisor.as_f64() == 0.0 {
        return Err(Error::render("divided by 0"));
    }
    arithmetic(input, args, "divided_by", i64::checked_div, |a, b| a / b)
}

fn modulo(input: &Value, args: &[Value]) -> Result<Value> {
    let divisor = number(arg(args, 0, "modulo")?, "modulo")?;
    if divisor.as_f64() == 0.0 {
        return Err(Error::render("divided by 0"));
    }
    arithmetic(input, args, "modulo", i64::checked_rem, |a, b| a % b)
}

// ============================================================================
// Strings
// ============================================================================

fn size(input: &Value, _args: &[Value]) -> Result<Value> {
    let n = match input {
        Value::Str(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Hash(map) => map.len(),
        _ => 0,
    };
    Ok(Value::from(n))
}

fn capitalize(input: &Value, _args: &[Value]) -> Result<Value> {
    let text = input.render();
    let mut chars = text.chars();
    let out: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    Ok(Value::from(out))
}

fn append(input: &Value, args: &[Value]) -> Result<Value> {
    let suffix = arg(args, 0, "append")?;
    Ok(Value::from(input.render() + &suffix.render()))
}

fn prepend(input: &Value, args: &[Value]) -> Result<Value> {
    let prefix = arg(args, 0, "prepend")?;
    Ok(Value::from(prefix.render() + &input.render()))
}

fn split(input: &Value, args: &[Value]) -> Result<Value> {
    let pattern = arg(args, 0, "split")?.render();
    let text = input.render();
    let parts: Vec<Value> = if pattern.is_empty() {
        text.chars().map(|c| Value::from(c.to_string())).collect()
    } else {
        text.split(pattern.as_str()).map(Value::from).collect()
    };
    Ok(Value::Array(parts))
}

fn join(input: &Value, args: &[Value]) -> Result<Value> {
    let glue = args.first().map_or_else(|| " ".to_string(), Value::render);
    match input {
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(Value::render).collect();
            Ok(Value::from(parts.join(&glue)))
        }
        other => Ok(Value::from(other.render())),
    }
}

fn replace(input: &Value, args: &[Value]) -> Result<Value> {
    let from = arg(args, 0, "replace")?.render();
    let to = arg(args, 1, "replace")?.render();
    if from.is_empty() {
        return Ok(Value::from(input.render()));
    }
    Ok(Value::from(input.render().replace(&from, &to)))
}

fn remove(input: &Value, args: &[Value]) -> Result<Value> {
    let needle = arg(args, 0, "remove")?.render();
    if needle.is_empty() {
        return Ok(Value::from(input.render()));
    }
    Ok(Value::from(input.render().replace(&needle, "")))
}

fn truncate(input: &Value, args: &[Value]) -> Result<Value> {
    let length = match args.first() {
        Some(n) => n.as_int().ok_or_else(|| {
            Error::render(format!("truncate: '{}' is not a number", n.render()))
        })?,
        None => 50,
    };
    let ellipsis = args.get(1).map_or_else(|| "...".to_string(), Value::render);

    let text = input.render();
    let length = usize::try_from(length).unwrap_or(0);
    if text.chars().count() <= length {
        return Ok(Value::from(text));
    }
    let keep = length.saturating_sub(ellipsis.chars().count());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(&ellipsis);
    Ok(Value::from(out))
}

fn escape(input: &Value, _args: &[Value]) -> Result<Value> {
    let text = input.render();
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    Ok(Value::from(out))
}

// ============================================================================
// Collections
// ============================================================================

fn first(input: &Value, _args: &[Value]) -> Result<Value> {
    match input {
        Value::Array(items) => Ok(items.first().cloned().unwrap_or_default()),
        _ => Ok(Value::Nil),
    }
}

fn last(input: &Value, _args: &[Value]) -> Result<Value> {
    match input {
        Value::Array(items) => Ok(items.last().cloned().unwrap_or_default()),
        _ => Ok(Value::Nil),
    }
}

fn reverse(input: &Value, _args: &[Value]) -> Result<Value> {
    match input {
        Value::Array(items) => Ok(Value::Array(items.iter().rev().cloned().collect())),
        other => Err(Error::render(format!(
            "reverse: expected array, got {}",
            other.type_name()
        ))),
    }
}

fn default(input: &Value, args: &[Value]) -> Result<Value> {
    let fallback = arg(args, 0, "default")?;
    if input.is_truthy() && !input.is_empty() {
        Ok(input.clone())
    } else {
        Ok(fallback.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(name: &str, input: impl Into<Value>, args: &[Value]) -> Result<Value> {
        FilterRegistry::standard().apply(name, &input.into(), args)
    }

    #[test]
    fn test_math() {
        assert_eq!(apply("plus", 2, &[Value::Int(3)]).unwrap(), Value::Int(5));
        assert_eq!(
            apply("plus", 2, &[Value::Float(0.5)]).unwrap(),
            Value::Float(2.5)
        );
        assert_eq!(apply("minus", "10", &[Value::Int(4)]).unwrap(), Value::Int(6));
        assert_eq!(apply("times", 5, &[Value::Int(4)]).unwrap(), Value::Int(20));
        assert_eq!(
            apply("divided_by", 7, &[Value::Int(2)]).unwrap(),
            Value::Int(3)
        );
        assert_eq!(
            apply("divided_by", 7, &[Value::Float(2.0)]).unwrap(),
            Value::Float(3.5)
        );
        assert_eq!(apply("modulo", 7, &[Value::Int(3)]).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_negative_division_truncates() {
        assert_eq!(
            apply("divided_by", -7, &[Value::Int(2)]).unwrap(),
            Value::Int(-3)
        );
        assert_eq!(apply("modulo", -7, &[Value::Int(3)]).unwrap(), Value::Int(-1));
        assert_eq!(apply("modulo", 7, &[Value::Int(-3)]).unwrap(), Value::Int(1));
        assert_eq!(
            apply("modulo", -7.5, &[Value::Int(2)]).unwrap(),
            Value::Float(-1.5)
        );
    }

    #[test]
    fn test_divide_by_zero() {
        let err = apply("divided_by", 1, &[Value::Int(0)]).unwrap_err();
        assert!(matches!(err, Error::Render(_)));
        assert_eq!(err.to_string(), "divided by 0");
    }

    #[test]
    fn test_missing_argument_is_fatal() {
        let err = apply("plus", 1, &[]).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_not_a_number() {
        let err = apply("plus", "abc", &[Value::Int(1)]).unwrap_err();
        assert!(matches!(err, Error::Render(_)));
    }

    #[test]
    fn test_strings() {
        assert_eq!(apply("upcase", "abc", &[]).unwrap(), Value::from("ABC"));
        assert_eq!(apply("capitalize", "tobi", &[]).unwrap(), Value::from("Tobi"));
        assert_eq!(
            apply("append", "a", &[Value::from("b")]).unwrap(),
            Value::from("ab")
        );
        assert_eq!(apply("strip", "  x ", &[]).unwrap(), Value::from("x"));
        assert_eq!(
            apply("replace", "a-b-c", &[Value::from("-"), Value::from("+")]).unwrap(),
            Value::from("a+b+c")
        );
        assert_eq!(
            apply("escape", "<a href='x'>", &[]).unwrap(),
            Value::from("&lt;a href=&#39;x&#39;&gt;")
        );
    }

    #[test]
    fn test_truncate() {
        assert_eq!(
            apply("truncate", "1234567890", &[Value::Int(7)]).unwrap(),
            Value::from("1234...")
        );
        assert_eq!(
            apply("truncate", "short", &[Value::Int(10)]).unwrap(),
            Value::from("short")
        );
    }

    #[test]
    fn test_split_join() {
        let parts = apply("split", "a,b,c", &[Value::from(",")]).unwrap();
        assert_eq!(parts, Value::from(vec!["a", "b", "c"]));
        assert_eq!(
            apply("join", parts, &[Value::from("-")]).unwrap(),
            Value::from("a-b-c")
        );
    }

    #[test]
    fn test_collections() {
        let list = Value::from(vec![1, 2, 3]);
        assert_eq!(apply("size", list.clone(), &[]).unwrap(), Value::Int(3));
        assert_eq!(apply("first", list.clone(), &[]).unwrap(), Value::Int(1));
        assert_eq!(
            apply("reverse", list, &[]).unwrap(),
            Value::from(vec![3, 2, 1])
        );
    }

    #[test]
    fn test_default() {
        assert_eq!(
            apply("default", Value::Nil, &[Value::from("x")]).unwrap(),
            Value::from("x")
        );
        assert_eq!(
            apply("default", "set", &[Value::from("x")]).unwrap(),
            Value::from("set")
        );
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("AddTwo"), "add_two");
        assert_eq!(normalize_name("divided_by"), "divided_by");
        assert_eq!(normalize_name("HTMLEscape"), "htmlescape");
    }

    #[test]
    fn test_unknown_filter() {
        let err = apply("nope", 1, &[]).unwrap_err();
        assert_eq!(err.to_string(), "unknown filter 'nope'");
    }
}
