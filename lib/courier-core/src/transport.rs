//! The transport contract.
//!
//! A [`Transport`] submits a fully-formed request and returns a response or
//! an error. The real hyper transport and the mock transport both implement
//! it, and decorators wrap one transport inside another. [`BoxTransport`]
//! erases the concrete type so clients can hold any implementation.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::{Request, Response, Result};

/// Boxed future returned by [`BoxTransport`].
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<Response>> + Send + 'a>>;

/// Submits requests.
///
/// Implementations must not interpret execution directives; by the time a
/// request reaches a transport the client has already stripped them.
pub trait Transport: Send + Sync {
    /// Submit a request and return the response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request could not be submitted or no response
    /// was received (network, TLS, timeout, or a mock mismatch).
    fn submit(&self, request: Request) -> impl Future<Output = Result<Response>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn submit(&self, request: Request) -> impl Future<Output = Result<Response>> + Send {
        T::submit(self.as_ref(), request)
    }
}

trait ErasedTransport: Send + Sync {
    fn submit_boxed(&self, request: Request) -> TransportFuture<'_>;
}

impl<T: Transport> ErasedTransport for T {
    fn submit_boxed(&self, request: Request) -> TransportFuture<'_> {
        Box::pin(self.submit(request))
    }
}

/// A type-erased, cheaply clonable [`Transport`].
#[derive(Clone)]
pub struct BoxTransport {
    inner: Arc<dyn ErasedTransport>,
}

impl BoxTransport {
    /// Erases a transport.
    pub fn new<T: Transport + 'static>(transport: T) -> Self {
        Self {
            inner: Arc::new(transport),
        }
    }
}

impl fmt::Debug for BoxTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxTransport").finish_non_exhaustive()
    }
}

impl Transport for BoxTransport {
    fn submit(&self, request: Request) -> impl Future<Output = Result<Response>> + Send {
        self.inner.submit_boxed(request)
    }
}
