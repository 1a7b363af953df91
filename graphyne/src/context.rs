//! Provide a [`Context`] shared by every stage of a request's lifecycle.

use std::any::Any;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::ops::DerefMut;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::json_ext::Object;
use crate::schema::Warden;

/// A map of request-scoped state that is not serializable.
///
/// Values are keyed by their type, one value per type.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    /// Insert a value, returning the previously stored value of the same type if any.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.map
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|boxed| boxed.downcast().ok().map(|boxed| *boxed))
    }

    /// Get a reference to a previously inserted value.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref())
    }

    /// Get a mutable reference to a previously inserted value.
    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.map
            .get_mut(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_mut())
    }

    /// Remove a value, returning it if it was present.
    pub fn remove<T: 'static>(&mut self) -> Option<T> {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast().ok().map(|boxed| *boxed))
    }

    /// Whether a value of type `T` is present.
    pub fn contains_key<T: 'static>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions").finish()
    }
}

/// Use `Extensions` to pass data between capability callbacks that is not
/// serializable.
///
/// This can be accessed at any point in the request lifecycle.
/// Extensions are thread safe, and must be locked for mutation.
///
/// For example:
/// `context.extensions().with_lock(|mut lock| lock.insert::<MyData>(data));`
#[derive(Default, Clone, Debug)]
pub struct ExtensionsMutex {
    extensions: Arc<parking_lot::Mutex<Extensions>>,
}

impl ExtensionsMutex {
    /// Locks the extensions for interaction.
    ///
    /// The lock will be dropped once the closure completes.
    pub fn with_lock<'a, T, F: FnOnce(ExtensionsGuard<'a>) -> T>(&'a self, func: F) -> T {
        let locked = ExtensionsGuard::new(&self.extensions);
        func(locked)
    }
}

pub struct ExtensionsGuard<'a> {
    guard: parking_lot::MutexGuard<'a, Extensions>,
}

impl<'a> ExtensionsGuard<'a> {
    fn new(guard: &'a parking_lot::Mutex<Extensions>) -> Self {
        Self {
            guard: guard.lock(),
        }
    }
}

impl Deref for ExtensionsGuard<'_> {
    type Target = Extensions;

    fn deref(&self) -> &Extensions {
        &self.guard
    }
}

impl DerefMut for ExtensionsGuard<'_> {
    fn deref_mut(&mut self) -> &mut Extensions {
        &mut self.guard
    }
}

/// Context for a request.
///
/// The context is shared by the query, its capability callbacks, and the
/// executor. Cloning is cheap and clones observe each other's writes.
#[derive(Clone, Default, Debug)]
pub struct Context {
    /// Serializable request-scoped entries, keyed by name.
    entries: Arc<parking_lot::RwLock<Object>>,

    /// Typed request-scoped state.
    extensions: ExtensionsMutex,
}

impl Context {
    /// Create a new empty context.
    pub fn new() -> Self {
        Context::default()
    }

    /// Returns the typed extensions of this context.
    pub fn extensions(&self) -> &ExtensionsMutex {
        &self.extensions
    }

    /// Get a value from the context using the provided key.
    ///
    /// Semantics:
    ///  - If the operation fails, that's because the data could not be deserialized.
    ///  - If the operation succeeds, the value is an [`Option`].
    pub fn get<K, V>(&self, key: K) -> Result<Option<V>, serde_json::Error>
    where
        K: AsRef<str>,
        V: DeserializeOwned,
    {
        self.entries
            .read()
            .get(key.as_ref())
            .cloned()
            .map(serde_json_bytes::from_value)
            .transpose()
    }

    /// Insert a value into the context using the provided key and value.
    ///
    /// Returns the previous value for that key, if any.
    pub fn insert<K, V>(&self, key: K, value: V) -> Result<Option<V>, serde_json::Error>
    where
        K: Into<String>,
        V: Serialize + DeserializeOwned,
    {
        let value = serde_json_bytes::to_value(value)?;
        self.entries
            .write()
            .insert(key.into(), value)
            .map(serde_json_bytes::from_value)
            .transpose()
    }

    /// Whether the context holds an entry for `key`.
    pub fn contains_key<K: AsRef<str>>(&self, key: K) -> bool {
        self.entries.read().contains_key(key.as_ref())
    }

    /// Returns the schema-visibility warden installed for this request, if any.
    pub fn warden(&self) -> Option<Arc<dyn Warden>> {
        self.extensions
            .with_lock(|lock| lock.get::<Arc<dyn Warden>>().cloned())
    }

    /// Install a schema-visibility warden for this request.
    pub fn set_warden(&self, warden: Arc<dyn Warden>) {
        self.extensions.with_lock(|mut lock| {
            lock.insert(warden);
        });
    }
}
