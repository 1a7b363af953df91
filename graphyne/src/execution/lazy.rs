//! Deferred values with memoized, on-demand resolution.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Error raised while resolving a deferred value.
///
/// The first resolution failure is stored and re-raised verbatim on every
/// subsequent read of the same deferred value.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub struct LazyError {
    pub message: String,
}

impl LazyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for LazyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.message.fmt(f)
    }
}

enum LazyState<T> {
    /// Not resolved yet. Holds the thunk to run on first read.
    Pending(Box<dyn FnOnce() -> Result<T, LazyError> + Send>),

    /// A read is currently running the thunk.
    InProgress,

    /// Resolved. Every read from now on returns a clone of this outcome.
    Resolved(Result<T, LazyError>),
}

/// A deferred value.
///
/// The wrapped thunk runs at most once, on the first [`get`](Lazy::get); its
/// outcome, success or failure, is memoized and shared by every clone.
pub struct Lazy<T> {
    state: Arc<parking_lot::Mutex<LazyState<T>>>,
}

impl<T> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.state.lock() {
            LazyState::Pending(_) => "pending",
            LazyState::InProgress => "in progress",
            LazyState::Resolved(_) => "resolved",
        };
        f.debug_struct("Lazy").field("state", &state).finish()
    }
}

impl<T: Clone + 'static> Lazy<T> {
    /// Wrap a thunk to be run on first read.
    pub fn new<F>(resolve: F) -> Self
    where
        F: FnOnce() -> Result<T, LazyError> + Send + 'static,
    {
        Self {
            state: Arc::new(parking_lot::Mutex::new(LazyState::Pending(Box::new(
                resolve,
            )))),
        }
    }

    /// Wrap an already known value.
    pub fn resolved(value: T) -> Self {
        Self {
            state: Arc::new(parking_lot::Mutex::new(LazyState::Resolved(Ok(value)))),
        }
    }

    /// Resolve the deferred value.
    ///
    /// The first call runs the thunk; later calls return the stored outcome.
    /// A stored failure is re-raised on every read.
    pub fn get(&self) -> Result<T, LazyError> {
        let taken = {
            let mut state = self.state.lock();
            match &*state {
                LazyState::Resolved(result) => return result.clone(),
                LazyState::InProgress => {
                    return Err(LazyError::new("deferred value depends on itself"));
                }
                LazyState::Pending(_) => std::mem::replace(&mut *state, LazyState::InProgress),
            }
        };
        let result = match taken {
            LazyState::Pending(resolve) => resolve(),
            // both other states returned above while the lock was held
            _ => Err(LazyError::new("deferred value is already being resolved")),
        };
        *self.state.lock() = LazyState::Resolved(result.clone());
        result
    }
}

/// A value that is either immediately available or deferred.
#[derive(Clone, Debug)]
pub enum MaybeLazy<T> {
    /// The value is available now.
    Ready(T),

    /// The value becomes available when the wrapped [`Lazy`] resolves.
    Deferred(Lazy<T>),
}

impl<T: Clone + 'static> MaybeLazy<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, MaybeLazy::Ready(_))
    }

    /// Force the value out, resolving it if deferred.
    pub fn resolve(self) -> Result<T, LazyError> {
        match self {
            MaybeLazy::Ready(value) => Ok(value),
            MaybeLazy::Deferred(lazy) => lazy.get(),
        }
    }
}

/// Apply a continuation to a possibly-deferred value.
///
/// If `value` is ready the continuation runs synchronously and its outcome is
/// returned as is. If `value` is deferred, a new deferred value is returned
/// that, when resolved, resolves `value`, feeds it to the continuation, and
/// flattens the continuation's own possibly-deferred outcome. Errors from
/// either stage propagate to the caller of the final resolution.
pub fn after_lazy<T, U, F>(value: MaybeLazy<T>, continuation: F) -> Result<MaybeLazy<U>, LazyError>
where
    T: Clone + Send + 'static,
    U: Clone + 'static,
    F: FnOnce(T) -> Result<MaybeLazy<U>, LazyError> + Send + 'static,
{
    match value {
        MaybeLazy::Ready(value) => continuation(value),
        MaybeLazy::Deferred(lazy) => Ok(MaybeLazy::Deferred(Lazy::new(move || {
            let value = lazy.get()?;
            match continuation(value)? {
                MaybeLazy::Ready(resolved) => Ok(resolved),
                MaybeLazy::Deferred(nested) => nested.get(),
            }
        }))),
    }
}
