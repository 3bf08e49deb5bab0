//! Runtime values
//!
//! Everything a template can see is a [`Value`]. Host objects travel as
//! [`Value::Object`] and are read through the adapter layer.

use crate::adapter::{Object, ObjectRef};
use facet_value::DestructuredRef;
use std::any::Any;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// A template value
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Value>),
    Hash(BTreeMap<String, Value>),
    Object(ObjectRef),
    /// Computed on first use, then shared by every clone
    Lazy(LazyValue),
}

/// A value produced by a closure the first time it is read
#[derive(Clone)]
pub struct LazyValue {
    cell: Arc<OnceLock<Value>>,
    init: Arc<dyn Fn() -> Value + Send + Sync>,
}

impl LazyValue {
    pub fn new<F, V>(init: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        Self {
            cell: Arc::new(OnceLock::new()),
            init: Arc::new(move || init().into()),
        }
    }

    /// The computed value, running the closure if nobody has yet
    pub fn get(&self) -> &Value {
        self.cell.get_or_init(|| (self.init)())
    }

    pub fn is_computed(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl PartialEq for LazyValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl fmt::Debug for LazyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.get() {
            Some(value) => write!(f, "Lazy({value:?})"),
            None => f.write_str("Lazy(<pending>)"),
        }
    }
}

/// The variant of a [`Value`], used to key output transformers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Nil,
    Bool,
    Int,
    Float,
    Str,
    Array,
    Hash,
    Object,
}

/// Number formatting applied when values are written out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSettings {
    pub decimal_separator: char,
}

impl Default for FormatSettings {
    fn default() -> Self {
        Self {
            decimal_separator: '.',
        }
    }
}

/// A numeric view of a value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Int(i) => Value::Int(i),
            Number::Float(f) => Value::Float(f),
        }
    }
}

impl Value {
    /// Wrap a type implementing [`Object`]
    pub fn object<T: Object>(object: T) -> Self {
        Value::Object(ObjectRef::native(object))
    }

    /// Wrap any host value; it is only visible through a registered adapter
    pub fn foreign<T: Any + Send + Sync>(object: T) -> Self {
        Value::Object(ObjectRef::foreign(object))
    }

    /// A value computed by `init` on first read. Clones share the result, so
    /// `init` runs at most once however many renders see the value.
    pub fn lazy<F, V>(init: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        Value::Lazy(LazyValue::new(init))
    }

    /// The value behind any lazy wrappers
    pub fn resolved(&self) -> &Value {
        let mut value = self;
        while let Value::Lazy(lazy) = value {
            value = lazy.get();
        }
        value
    }

    /// Take the value out of any lazy wrappers
    pub fn into_resolved(self) -> Value {
        if matches!(self, Value::Lazy(_)) {
            self.resolved().clone()
        } else {
            self
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self.resolved() {
            Value::Nil => ValueKind::Nil,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Str,
            Value::Array(_) => ValueKind::Array,
            Value::Hash(_) => ValueKind::Hash,
            Value::Object(_) => ValueKind::Object,
            Value::Lazy(_) => ValueKind::Nil,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self.resolved() {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Hash(_) => "hash",
            Value::Object(o) => o.type_name(),
            Value::Lazy(_) => "nil",
        }
    }

    /// Only nil and false are falsy
    pub fn is_truthy(&self) -> bool {
        !matches!(self.resolved(), Value::Nil | Value::Bool(false))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self.resolved(), Value::Nil)
    }

    /// Matches the `empty` literal
    pub fn is_empty(&self) -> bool {
        match self.resolved() {
            Value::Str(s) => s.is_empty(),
            Value::Array(a) => a.is_empty(),
            Value::Hash(h) => h.is_empty(),
            _ => false,
        }
    }

    /// Matches the `blank` literal
    pub fn is_blank(&self) -> bool {
        match self.resolved() {
            Value::Nil | Value::Bool(false) => true,
            Value::Str(s) => s.trim().is_empty(),
            other => other.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.resolved() {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view. Strings holding a number convert.
    pub fn as_number(&self) -> Option<Number> {
        match self.resolved() {
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            Value::Str(s) => {
                let s = s.trim();
                if let Ok(i) = s.parse::<i64>() {
                    Some(Number::Int(i))
                } else {
                    s.parse::<f64>().ok().map(Number::Float)
                }
            }
            _ => None,
        }
    }

    /// Integer view, truncating floats
    pub fn as_int(&self) -> Option<i64> {
        match self.as_number()? {
            Number::Int(i) => Some(i),
            Number::Float(f) if f.is_finite() => Some(f as i64),
            Number::Float(_) => None,
        }
    }

    /// Render with default format settings
    pub fn render(&self) -> String {
        self.to_output_string(&FormatSettings::default())
    }

    /// The text written for this value. Nil and host objects render empty.
    pub fn to_output_string(&self, format: &FormatSettings) -> String {
        match self.resolved() {
            Value::Nil | Value::Object(_) | Value::Lazy(_) => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f, format),
            Value::Str(s) => s.clone(),
            Value::Array(items) => items.iter().map(|v| v.to_output_string(format)).collect(),
            Value::Hash(map) => {
                let entries: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{k}: {}", v.to_output_string(format)))
                    .collect();
                format!("{{{}}}", entries.join(", "))
            }
        }
    }

    /// Equality with int/float coercion
    pub fn loose_eq(&self, other: &Value) -> bool {
        let (this, other) = (self.resolved(), other.resolved());
        match (this, other) {
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            _ => this == other,
        }
    }

    /// Ordering for `<`, `>`, `<=`, `>=`.
    ///
    /// `None` means the two values are not comparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        let (this, other) = (self.resolved(), other.resolved());
        match (this, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                let a = this.as_number()?.as_f64();
                let b = other.as_number()?.as_f64();
                a.partial_cmp(&b)
            }
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// The `contains` operator
    pub fn contains(&self, needle: &Value) -> bool {
        let needle = needle.resolved();
        match self.resolved() {
            Value::Str(haystack) => match needle {
                Value::Str(n) => haystack.contains(n.as_str()),
                Value::Nil => false,
                other => haystack.contains(other.render().as_str()),
            },
            Value::Array(items) => items.iter().any(|item| item.loose_eq(needle)),
            Value::Hash(map) => needle.as_str().is_some_and(|key| map.contains_key(key)),
            _ => false,
        }
    }
}

/// Format a float, keeping at least one fractional digit
fn format_float(f: f64, format: &FormatSettings) -> String {
    let text = if f.is_finite() && f.fract() == 0.0 {
        format!("{f:.1}")
    } else {
        f.to_string()
    };
    if format.decimal_separator == '.' {
        text
    } else {
        text.replace('.', &format.decimal_separator.to_string())
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(i: $t) -> Self {
                Value::Int(i64::from(i))
            }
        })*
    };
}

from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        i64::try_from(i).map_or(Value::Float(i as f64), Value::Int)
    }
}

impl From<u64> for Value {
    fn from(i: u64) -> Self {
        i64::try_from(i).map_or(Value::Float(i as f64), Value::Int)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f64::from(f))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Nil, Into::into)
    }
}

impl<K: Into<String>, V: Into<Value>> From<HashMap<K, V>> for Value {
    fn from(map: HashMap<K, V>) -> Self {
        Value::Hash(map.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<Value>> From<BTreeMap<K, V>> for Value {
    fn from(map: BTreeMap<K, V>) -> Self {
        Value::Hash(map.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Hash(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<&facet_value::Value> for Value {
    fn from(value: &facet_value::Value) -> Self {
        match value.destructure_ref() {
            DestructuredRef::Null => Value::Nil,
            DestructuredRef::Bool(b) => Value::Bool(b),
            DestructuredRef::Number(n) => match n.to_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.to_f64().unwrap_or_default()),
            },
            DestructuredRef::String(s) => Value::Str(s.as_str().to_string()),
            DestructuredRef::Array(arr) => Value::Array(arr.iter().map(Value::from).collect()),
            DestructuredRef::Object(obj) => Value::Hash(
                obj.iter()
                    .map(|(k, v)| (k.as_str().to_string(), Value::from(v)))
                    .collect(),
            ),
            _ => Value::Str(format!("{value:?}")),
        }
    }
}

impl From<facet_value::Value> for Value {
    fn from(value: facet_value::Value) -> Self {
        Value::from(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_value::{VArray, VObject, VString};

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Int(0).is_truthy());
        assert!(Value::from("").is_truthy());
    }

    #[test]
    fn test_output_strings() {
        assert_eq!(Value::Int(20).render(), "20");
        assert_eq!(Value::Float(2.0).render(), "2.0");
        assert_eq!(Value::Float(0.25).render(), "0.25");
        assert_eq!(Value::Nil.render(), "");
        assert_eq!(Value::from(vec!["a", "b"]).render(), "ab");
    }

    #[test]
    fn test_large_floats_keep_fraction() {
        assert_eq!(Value::Float(1e20).render(), "100000000000000000000.0");
        assert_eq!(Value::Float(-3e16).render(), "-30000000000000000.0");
    }

    #[test]
    fn test_lazy_runs_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let value = Value::lazy(move || counter.fetch_add(1, Ordering::SeqCst) + 1);
        let copy = value.clone();

        assert_eq!(value.render(), "1");
        assert_eq!(copy.render(), "1");
        assert!(copy.loose_eq(&Value::Int(1)));
        assert_eq!(value.kind(), ValueKind::Int);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_decimal_separator() {
        let format = FormatSettings {
            decimal_separator: ',',
        };
        assert_eq!(Value::Float(1.5).to_output_string(&format), "1,5");
    }

    #[test]
    fn test_loose_equality() {
        assert!(Value::Int(1).loose_eq(&Value::Float(1.0)));
        assert!(!Value::Int(1).loose_eq(&Value::from("1")));
    }

    #[test]
    fn test_compare() {
        assert_eq!(
            Value::Int(1).compare(&Value::Float(1.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::from("b").compare(&Value::from("a")),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::Int(1).compare(&Value::from("a")), None);
    }

    #[test]
    fn test_blank_and_empty() {
        assert!(Value::from("").is_empty());
        assert!(!Value::from(" ").is_empty());
        assert!(Value::from(" ").is_blank());
        assert!(Value::Nil.is_blank());
        assert!(!Value::Nil.is_empty());
    }

    #[test]
    fn test_from_facet_value() {
        let mut user = VObject::new();
        user.insert(VString::from("name"), facet_value::Value::from("Bob"));
        user.insert(VString::from("age"), facet_value::Value::from(42i64));
        user.insert(
            VString::from("tags"),
            facet_value::Value::from(VArray::from_iter([facet_value::Value::from("a")])),
        );

        let value = Value::from(facet_value::Value::from(user));
        let Value::Hash(map) = value else {
            panic!("expected hash");
        };
        assert_eq!(map["name"], Value::from("Bob"));
        assert_eq!(map["age"], Value::Int(42));
        assert_eq!(map["tags"], Value::from(vec!["a"]));
    }
}
