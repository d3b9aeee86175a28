//! Interceptor chains.
//!
//! An [`Interceptor`] wraps every call that reaches the RPC server. It gets
//! the request and a [`Next`] handle; it may inspect or rewrite the request,
//! delegate with `next.run(request).await`, and inspect the response, or it
//! may answer on its own without calling `next` at all.
//!
//! Unary and streaming calls run through separate chains. The wire does not
//! say whether a method streams, so the chain is told which method paths do:
//!
//! ```ignore
//! let chain = InterceptorChain::builder()
//!     .unary(RequestIdInterceptor)
//!     .unary(TraceInterceptor)
//!     .stream(TraceInterceptor)
//!     .streaming_method("/grpc.health.v1.Health/Watch")
//!     .build();
//! ```

use std::collections::HashSet;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tonic::metadata::MetadataMap;
use tonic::Status;
use tower::util::BoxCloneService;
use tower::ServiceExt;

/// Request type seen by interceptors.
pub type RpcRequest = http::Request<tonic::body::Body>;

/// Response type produced by interceptors.
pub type RpcResponse = http::Response<tonic::body::Body>;

/// The service at the end of a chain.
pub(crate) type Endpoint = BoxCloneService<RpcRequest, RpcResponse, Infallible>;

/// Middleware invoked around each RPC call.
#[async_trait]
pub trait Interceptor: Send + Sync + 'static {
    async fn intercept(&self, request: RpcRequest, next: Next) -> RpcResponse;
}

#[async_trait]
impl<I: Interceptor + ?Sized> Interceptor for Arc<I> {
    async fn intercept(&self, request: RpcRequest, next: Next) -> RpcResponse {
        (**self).intercept(request, next).await
    }
}

/// The remainder of a chain, ending in the service itself.
pub struct Next {
    chain: Arc<[Arc<dyn Interceptor>]>,
    position: usize,
    endpoint: Endpoint,
}

impl Next {
    pub(crate) fn new(chain: Arc<[Arc<dyn Interceptor>]>, endpoint: Endpoint) -> Self {
        Self {
            chain,
            position: 0,
            endpoint,
        }
    }

    /// Pass the request to the next interceptor, or to the service when the
    /// chain is exhausted.
    pub async fn run(mut self, request: RpcRequest) -> RpcResponse {
        match self.chain.get(self.position).cloned() {
            Some(interceptor) => {
                self.position += 1;
                interceptor.intercept(request, self).await
            }
            None => match self.endpoint.oneshot(request).await {
                Ok(response) => response,
                Err(never) => match never {},
            },
        }
    }
}

/// Build an interceptor from an async closure.
pub fn from_fn<F, Fut>(f: F) -> FromFn<F>
where
    F: Fn(RpcRequest, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RpcResponse> + Send + 'static,
{
    FromFn { f }
}

/// Interceptor returned by [`from_fn`].
#[derive(Clone)]
pub struct FromFn<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Interceptor for FromFn<F>
where
    F: Fn(RpcRequest, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RpcResponse> + Send + 'static,
{
    async fn intercept(&self, request: RpcRequest, next: Next) -> RpcResponse {
        (self.f)(request, next).await
    }
}

/// Adapt a tonic-style metadata interceptor.
///
/// The function sees the call's metadata and extensions. Returning `Err`
/// answers the call with that status; returning `Ok` passes the (possibly
/// modified) metadata and extensions on.
pub fn from_metadata_fn<F>(f: F) -> MetadataFn<F>
where
    F: Fn(tonic::Request<()>) -> Result<tonic::Request<()>, Status> + Send + Sync + 'static,
{
    MetadataFn { f }
}

/// Interceptor returned by [`from_metadata_fn`].
#[derive(Clone)]
pub struct MetadataFn<F> {
    f: F,
}

#[async_trait]
impl<F> Interceptor for MetadataFn<F>
where
    F: Fn(tonic::Request<()>) -> Result<tonic::Request<()>, Status> + Send + Sync + 'static,
{
    async fn intercept(&self, request: RpcRequest, next: Next) -> RpcResponse {
        let (mut parts, body) = request.into_parts();
        let metadata = MetadataMap::from_headers(std::mem::take(&mut parts.headers));
        let extensions = std::mem::take(&mut parts.extensions);

        match (self.f)(tonic::Request::from_parts(metadata, extensions, ())) {
            Ok(request) => {
                let (metadata, extensions, ()) = request.into_parts();
                parts.headers = metadata.into_headers();
                parts.extensions = extensions;
                next.run(http::Request::from_parts(parts, body)).await
            }
            Err(status) => status.into_http(),
        }
    }
}

/// Whether a call is dispatched through the unary or the stream chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Unary,
    Streaming,
}

/// Ordered unary and stream interceptors.
#[derive(Clone)]
pub struct InterceptorChain {
    unary: Arc<[Arc<dyn Interceptor>]>,
    stream: Arc<[Arc<dyn Interceptor>]>,
    streaming_methods: Arc<HashSet<String>>,
}

impl InterceptorChain {
    pub fn builder() -> InterceptorChainBuilder {
        InterceptorChainBuilder::default()
    }

    /// A chain with no interceptors.
    pub fn empty() -> Self {
        Self::builder().build()
    }

    pub fn is_empty(&self) -> bool {
        self.unary.is_empty() && self.stream.is_empty()
    }

    pub fn unary_len(&self) -> usize {
        self.unary.len()
    }

    pub fn stream_len(&self) -> usize {
        self.stream.len()
    }

    /// Classify a request path such as `/pkg.Service/Method`.
    pub fn call_kind(&self, path: &str) -> CallKind {
        if self.streaming_methods.contains(path) {
            CallKind::Streaming
        } else {
            CallKind::Unary
        }
    }

    pub(crate) fn for_path(&self, path: &str) -> Arc<[Arc<dyn Interceptor>]> {
        match self.call_kind(path) {
            CallKind::Unary => Arc::clone(&self.unary),
            CallKind::Streaming => Arc::clone(&self.stream),
        }
    }
}

impl Default for InterceptorChain {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("unary", &self.unary.len())
            .field("stream", &self.stream.len())
            .field("streaming_methods", &self.streaming_methods)
            .finish()
    }
}

/// Builder for [`InterceptorChain`]. Interceptors run in the order added.
#[derive(Default)]
pub struct InterceptorChainBuilder {
    unary: Vec<Arc<dyn Interceptor>>,
    stream: Vec<Arc<dyn Interceptor>>,
    streaming_methods: HashSet<String>,
}

impl InterceptorChainBuilder {
    /// Append an interceptor for unary calls.
    pub fn unary<I: Interceptor>(mut self, interceptor: I) -> Self {
        self.unary.push(Arc::new(interceptor));
        self
    }

    /// Append an interceptor for streaming calls.
    pub fn stream<I: Interceptor>(mut self, interceptor: I) -> Self {
        self.stream.push(Arc::new(interceptor));
        self
    }

    /// Append an interceptor to both chains.
    pub fn both<I: Interceptor>(mut self, interceptor: I) -> Self {
        let shared: Arc<dyn Interceptor> = Arc::new(interceptor);
        self.unary.push(Arc::clone(&shared));
        self.stream.push(shared);
        self
    }

    /// Route calls on `path` through the stream chain.
    pub fn streaming_method(mut self, path: impl Into<String>) -> Self {
        self.streaming_methods.insert(path.into());
        self
    }

    pub fn build(self) -> InterceptorChain {
        InterceptorChain {
            unary: self.unary.into(),
            stream: self.stream.into(),
            streaming_methods: Arc::new(self.streaming_methods),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl Interceptor for Noop {
        async fn intercept(&self, request: RpcRequest, next: Next) -> RpcResponse {
            next.run(request).await
        }
    }

    #[test]
    fn streaming_methods_select_stream_chain() {
        let chain = InterceptorChain::builder()
            .unary(Noop)
            .stream(Noop)
            .stream(Noop)
            .streaming_method("/grpc.health.v1.Health/Watch")
            .build();

        assert_eq!(chain.call_kind("/grpc.health.v1.Health/Watch"), CallKind::Streaming);
        assert_eq!(chain.call_kind("/grpc.health.v1.Health/Check"), CallKind::Unary);
        assert_eq!(chain.for_path("/grpc.health.v1.Health/Watch").len(), 2);
        assert_eq!(chain.for_path("/grpc.health.v1.Health/Check").len(), 1);
    }

    #[test]
    fn both_appends_to_each_chain() {
        let chain = InterceptorChain::builder().both(Noop).unary(Noop).build();
        assert_eq!(chain.unary_len(), 2);
        assert_eq!(chain.stream_len(), 1);
        assert!(!chain.is_empty());
        assert!(InterceptorChain::empty().is_empty());
    }
}
