/// Type-state markers for the builder pattern
///
/// These types track which required collaborators have been set on the
/// builder at compile-time, so `build()` cannot be called without them.

use std::marker::PhantomData;

/// Marker trait for endpoint resolver state
pub trait ResolverState {}

/// Resolver has not been set
pub struct NoResolver;
impl ResolverState for NoResolver {}

/// Resolver has been set
pub struct HasResolver;
impl ResolverState for HasResolver {}

/// Marker trait for poll source state
pub trait SourceState {}

/// Poll source has not been set
pub struct NoSource;
impl SourceState for NoSource {}

/// Poll source has been set
pub struct HasSource;
impl SourceState for HasSource {}

/// Phantom marker to prevent direct construction
#[derive(Debug, Clone, Copy)]
pub struct TypeState<R, S> {
    _resolver: PhantomData<R>,
    _source: PhantomData<S>,
}

impl<R, S> TypeState<R, S> {
    pub(crate) fn new() -> Self {
        Self {
            _resolver: PhantomData,
            _source: PhantomData,
        }
    }
}

impl<R, S> Default for TypeState<R, S> {
    fn default() -> Self {
        Self::new()
    }
}
