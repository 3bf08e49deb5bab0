//! Member resolution for template values
//!
//! Built-in containers resolve members structurally. Host objects expose
//! members either by implementing [`Object`] or through an [`Adapter`]
//! registered on the environment. The set of visible members of a type (its
//! schema) is computed once per type and kept in a small thread-local cache,
//! so looking up `user.name` on a thousand users computes one schema.

use crate::value::Value;
use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

type Erased = dyn Any + Send + Sync;
type Getter = Arc<dyn Fn(&Erased) -> Option<Value> + Send + Sync>;
type Transform = Arc<dyn Fn(&Erased) -> Option<Value> + Send + Sync>;
type CatchAll = Arc<dyn Fn(&Erased, &str) -> Option<Value> + Send + Sync>;

/// A host type that describes its own template-visible members
///
/// ```
/// use cannelle::{Members, Object, Value};
///
/// struct User {
///     name: String,
/// }
///
/// impl Object for User {
///     fn describe(members: &mut Members<Self>) {
///         members.member("name", |u: &User| u.name.clone());
///     }
/// }
///
/// let value = Value::object(User { name: "Bob".into() });
/// assert!(value.is_truthy());
/// ```
pub trait Object: Any + Send + Sync + Sized {
    /// List the zero-argument members templates may read
    fn describe(members: &mut Members<Self>);

    /// Catch-all for names not listed by `describe`
    fn before_method(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// Named member getters for a type `T`
pub struct Members<T> {
    getters: Vec<(String, Getter)>,
    _marker: PhantomData<fn(&T)>,
}

impl<T: Any + Send + Sync> Members<T> {
    pub fn new() -> Self {
        Self {
            getters: Vec::new(),
            _marker: PhantomData,
        }
    }

    pub fn member<F, V>(&mut self, name: impl Into<String>, get: F) -> &mut Self
    where
        F: Fn(&T) -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        let getter: Getter =
            Arc::new(move |any: &Erased| any.downcast_ref::<T>().map(|t| get(t).into()));
        self.getters.push((name.into(), getter));
        self
    }

    pub fn len(&self) -> usize {
        self.getters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.getters.is_empty()
    }
}

impl<T: Any + Send + Sync> Default for Members<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy)]
struct NativeHooks {
    describe: fn() -> Vec<(String, Getter)>,
    before_method: fn(&Erased, &str) -> Option<Value>,
}

fn describe_native<T: Object>() -> Vec<(String, Getter)> {
    let mut members = Members::<T>::new();
    T::describe(&mut members);
    members.getters
}

fn before_method_native<T: Object>(any: &Erased, name: &str) -> Option<Value> {
    any.downcast_ref::<T>()?.before_method(name)
}

/// A shared handle to a host object
#[derive(Clone)]
pub struct ObjectRef {
    inner: Arc<Erased>,
    type_id: TypeId,
    type_name: &'static str,
    native: Option<NativeHooks>,
}

impl ObjectRef {
    pub fn native<T: Object>(object: T) -> Self {
        Self {
            inner: Arc::new(object),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            native: Some(NativeHooks {
                describe: describe_native::<T>,
                before_method: before_method_native::<T>,
            }),
        }
    }

    pub fn foreign<T: Any + Send + Sync>(object: T) -> Self {
        Self {
            inner: Arc::new(object),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            native: None,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    fn as_any(&self) -> &Erased {
        self.inner.as_ref()
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({})", self.type_name)
    }
}

// ============================================================================
// Registrations
// ============================================================================

/// Which members of an adapted type templates may read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    /// Every described member
    All,
    /// Only the named members
    Only(Vec<String>),
}

impl Visibility {
    fn allows(&self, name: &str) -> bool {
        match self {
            Visibility::All => true,
            Visibility::Only(names) => names.iter().any(|n| n == name),
        }
    }
}

/// Exposes a host type to templates without it implementing [`Object`]
///
/// ```
/// use cannelle::{Adapter, Environment};
///
/// struct Money {
///     cents: i64,
/// }
///
/// let mut env = Environment::new();
/// env.register_adapter(
///     Adapter::<Money>::new()
///         .member("cents", |m: &Money| m.cents)
///         .transform(|m: &Money| format!("${}.{:02}", m.cents / 100, m.cents % 100)),
/// );
/// ```
pub struct Adapter<T> {
    members: Members<T>,
    visibility: Visibility,
    transform: Option<Transform>,
    catch_all: Option<CatchAll>,
}

impl<T: Any + Send + Sync> Adapter<T> {
    pub fn new() -> Self {
        Self {
            members: Members::new(),
            visibility: Visibility::All,
            transform: None,
            catch_all: None,
        }
    }

    pub fn member<F, V>(mut self, name: impl Into<String>, get: F) -> Self
    where
        F: Fn(&T) -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        self.members.member(name, get);
        self
    }

    /// Restrict visible members to `names`
    pub fn allow<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.visibility = Visibility::Only(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn allow_all(mut self) -> Self {
        self.visibility = Visibility::All;
        self
    }

    /// Replace the object with another value whenever it is used whole
    pub fn transform<F, V>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        self.transform = Some(Arc::new(move |any: &Erased| {
            any.downcast_ref::<T>().map(|t| f(t).into())
        }));
        self
    }

    /// Resolve names no visible member matches
    pub fn catch_all<F>(mut self, f: F) -> Self
    where
        F: Fn(&T, &str) -> Option<Value> + Send + Sync + 'static,
    {
        self.catch_all = Some(Arc::new(move |any: &Erased, name: &str| {
            f(any.downcast_ref::<T>()?, name)
        }));
        self
    }
}

impl<T: Any + Send + Sync> Default for Adapter<T> {
    fn default() -> Self {
        Self::new()
    }
}

struct Registration {
    type_name: &'static str,
    members: Vec<(String, Getter)>,
    visibility: Visibility,
    transform: Option<Transform>,
    catch_all: Option<CatchAll>,
}

fn next_registry_id() -> u64 {
    static NEXT_ID: AtomicU64 = AtomicU64::new(1);
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

fn pair((key, value): (&String, &Value)) -> Value {
    Value::Array(vec![Value::Str(key.clone()), value.clone()])
}

/// Adapters known to an environment, keyed by type
pub struct AdapterRegistry {
    /// Distinguishes cache entries of different registries
    id: u64,
    registrations: HashMap<TypeId, Arc<Registration>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            id: next_registry_id(),
            registrations: HashMap::new(),
        }
    }

    pub fn register<T: Any + Send + Sync>(&mut self, adapter: Adapter<T>) {
        let registration = Registration {
            type_name: std::any::type_name::<T>(),
            members: adapter.members.getters,
            visibility: adapter.visibility,
            transform: adapter.transform,
            catch_all: adapter.catch_all,
        };
        tracing::debug!(
            type_name = registration.type_name,
            members = registration.members.len(),
            "registered adapter"
        );
        self.registrations
            .insert(TypeId::of::<T>(), Arc::new(registration));
        // Cached schemas of the old id can never be hit again
        self.id = next_registry_id();
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    fn get(&self, type_id: TypeId) -> Option<&Registration> {
        self.registrations.get(&type_id).map(Arc::as_ref)
    }

    /// Apply the registered transform, if any. Non-objects pass through.
    pub fn expose(&self, value: Value) -> Value {
        let value = value.into_resolved();
        let Value::Object(object) = &value else {
            return value;
        };
        let transformed = self
            .get(object.type_id())
            .and_then(|reg| reg.transform.as_ref())
            .and_then(|transform| transform(object.as_any()));
        transformed.unwrap_or(value)
    }

    /// Resolve `value.name`. Missing members yield `None`.
    pub fn member(&self, value: &Value, name: &str) -> Option<Value> {
        self.member_ref(value, name).map(Cow::into_owned)
    }

    /// Resolve `value.name`, borrowing from `value` where it holds the member
    pub fn member_ref<'v>(&self, value: &'v Value, name: &str) -> Option<Cow<'v, Value>> {
        match value.resolved() {
            // `first` and `last` are [key, value] pairs in key order
            Value::Hash(map) => match map.get(name) {
                Some(found) => Some(Cow::Borrowed(found)),
                None => match name {
                    "size" => Some(Cow::Owned(Value::from(map.len()))),
                    "first" => map.iter().next().map(pair).map(Cow::Owned),
                    "last" => map.iter().next_back().map(pair).map(Cow::Owned),
                    _ => None,
                },
            },
            Value::Array(items) => match name {
                "size" => Some(Cow::Owned(Value::from(items.len()))),
                "first" => items.first().map(Cow::Borrowed),
                "last" => items.last().map(Cow::Borrowed),
                _ => None,
            },
            Value::Str(s) => match name {
                "size" => Some(Cow::Owned(Value::from(s.chars().count()))),
                _ => None,
            },
            Value::Object(object) => self.object_member(object, name).map(Cow::Owned),
            _ => None,
        }
    }

    /// Resolve `value[index]`
    pub fn index(&self, value: &Value, index: &Value) -> Option<Value> {
        self.index_ref(value, index).map(Cow::into_owned)
    }

    /// Resolve `value[index]`, borrowing from `value` where possible
    pub fn index_ref<'v>(&self, value: &'v Value, index: &Value) -> Option<Cow<'v, Value>> {
        match (value.resolved(), index.resolved()) {
            (Value::Array(items), index) => {
                let i = index.as_int()?;
                let i = if i < 0 {
                    items.len().checked_sub(usize::try_from(i.unsigned_abs()).ok()?)?
                } else {
                    usize::try_from(i).ok()?
                };
                items.get(i).map(Cow::Borrowed)
            }
            (_, Value::Str(name)) => self.member_ref(value, name),
            _ => None,
        }
    }

    fn object_member(&self, object: &ObjectRef, name: &str) -> Option<Value> {
        let schema = self.schema(object);
        if let Some(getter) = schema.members.get(name) {
            return getter(object.as_any());
        }

        if let Some(reg) = self.get(object.type_id()) {
            if let Some(found) = reg
                .catch_all
                .as_ref()
                .and_then(|catch_all| catch_all(object.as_any(), name))
            {
                return Some(found);
            }
            // A transform-only adapter reads members off the transformed value
            if schema.members.is_empty()
                && let Some(transform) = &reg.transform
                && let Some(transformed) = transform(object.as_any())
                && !matches!(transformed, Value::Object(_))
            {
                return self.member(&transformed, name);
            }
        }

        object
            .native
            .and_then(|hooks| (hooks.before_method)(object.as_any(), name))
    }

    fn schema(&self, object: &ObjectRef) -> Arc<TypeSchema> {
        let key = CacheKey {
            registry: self.id,
            type_id: object.type_id(),
        };
        SCHEMA_CACHE.with(|cache| {
            cache
                .borrow_mut()
                .get_or_insert(key, || self.compute_schema(object))
        })
    }

    fn compute_schema(&self, object: &ObjectRef) -> TypeSchema {
        COMPUTATIONS.with(|count| count.set(count.get() + 1));

        let mut getters = object
            .native
            .map(|hooks| (hooks.describe)())
            .unwrap_or_default();
        let registration = self.get(object.type_id());
        if let Some(reg) = registration {
            getters.extend(reg.members.iter().cloned());
        }

        let visibility = registration.map_or(&Visibility::All, |reg| &reg.visibility);
        let members: HashMap<String, Getter> = getters
            .into_iter()
            .filter(|(name, _)| visibility.allows(name))
            .collect();

        tracing::debug!(
            type_name = object.type_name(),
            members = members.len(),
            "computed member schema"
        );
        TypeSchema { members }
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for AdapterRegistry {
    fn clone(&self) -> Self {
        Self {
            id: next_registry_id(),
            registrations: self.registrations.clone(),
        }
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.registrations.values().map(|r| r.type_name).collect();
        names.sort_unstable();
        f.debug_struct("AdapterRegistry")
            .field("id", &self.id)
            .field("types", &names)
            .finish()
    }
}

// ============================================================================
// Schema cache
// ============================================================================

const SCHEMA_CACHE_SLOTS: usize = 32;

/// The visible members of one type, as seen by one registry
struct TypeSchema {
    members: HashMap<String, Getter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    registry: u64,
    type_id: TypeId,
}

/// Direct-mapped table: a colliding insert evicts the previous entry
struct SchemaCache {
    slots: Vec<Option<(CacheKey, Arc<TypeSchema>)>>,
}

impl SchemaCache {
    fn new() -> Self {
        Self {
            slots: vec![None; SCHEMA_CACHE_SLOTS],
        }
    }

    fn slot(key: &CacheKey) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % SCHEMA_CACHE_SLOTS as u64) as usize
    }

    fn get_or_insert(
        &mut self,
        key: CacheKey,
        compute: impl FnOnce() -> TypeSchema,
    ) -> Arc<TypeSchema> {
        let index = Self::slot(&key);
        if let Some((cached, schema)) = &self.slots[index]
            && *cached == key
        {
            return Arc::clone(schema);
        }
        let schema = Arc::new(compute());
        self.slots[index] = Some((key, Arc::clone(&schema)));
        schema
    }
}

thread_local! {
    static SCHEMA_CACHE: RefCell<SchemaCache> = RefCell::new(SchemaCache::new());
    static COMPUTATIONS: Cell<u64> = const { Cell::new(0) };
}

/// Number of type schemas computed on the current thread so far
pub fn schema_computations() -> u64 {
    COMPUTATIONS.with(Cell::get)
}
