//! Tower layer that runs an [`InterceptorChain`] in front of the RPC routes.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::util::BoxCloneService;
use tower::{Layer, Service};

use crate::rpc::interceptor::{Endpoint, InterceptorChain, Next, RpcRequest, RpcResponse};

/// Applies an [`InterceptorChain`] to the wrapped service.
#[derive(Debug, Clone)]
pub struct InterceptorLayer {
    chain: InterceptorChain,
}

impl InterceptorLayer {
    pub fn new(chain: InterceptorChain) -> Self {
        Self { chain }
    }
}

impl<S> Layer<S> for InterceptorLayer
where
    S: Service<RpcRequest, Response = RpcResponse, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Service = InterceptedService;

    fn layer(&self, inner: S) -> Self::Service {
        InterceptedService {
            chain: self.chain.clone(),
            inner: BoxCloneService::new(inner),
        }
    }
}

/// Service produced by [`InterceptorLayer`].
#[derive(Clone)]
pub struct InterceptedService {
    chain: InterceptorChain,
    inner: Endpoint,
}

impl Service<RpcRequest> for InterceptedService {
    type Response = RpcResponse;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<RpcResponse, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Readiness of the inner service is awaited per call by `Next`.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: RpcRequest) -> Self::Future {
        let chain = self.chain.for_path(request.uri().path());
        let next = Next::new(chain, self.inner.clone());
        Box::pin(async move { Ok(next.run(request).await) })
    }
}
