//! Backend services that caches sit in front of

use futures::future::BoxFuture;

/// A backend that produces a value for a set of request parameters
///
/// `method` names the entry point the cache was configured with, so one
/// service can expose several operations and be wrapped by several caches.
pub trait Service<P>: Send + Sync {
    /// Value produced on success
    type Output;
    /// Failure payload, passed through caches unchanged
    type Error;

    /// Invokes `method` with `params`
    fn call<'a>(
        &'a self,
        method: &'a str,
        params: &'a P,
    ) -> BoxFuture<'a, Result<Self::Output, Self::Error>>;
}
