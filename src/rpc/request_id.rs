//! Request ID assignment.
//!
//! # Responsibilities
//! - Reuse the caller's `x-request-id` metadata when it is present and valid
//! - Otherwise generate a UUID v4 and add it to the request metadata
//! - Expose the ID to service handlers as a [`RequestId`] extension

use std::fmt;

use async_trait::async_trait;
use http::HeaderValue;
use uuid::Uuid;

use crate::rpc::interceptor::{Interceptor, Next, RpcRequest, RpcResponse};

/// Metadata key carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Request ID stored in the request extensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read the request ID from a tonic request inside a service handler.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&RequestId>;
}

impl<T> RequestIdExt for tonic::Request<T> {
    fn request_id(&self) -> Option<&RequestId> {
        self.extensions().get::<RequestId>()
    }
}

impl<B> RequestIdExt for http::Request<B> {
    fn request_id(&self) -> Option<&RequestId> {
        self.extensions().get::<RequestId>()
    }
}

/// Interceptor that makes sure every call carries a request ID.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdInterceptor;

#[async_trait]
impl Interceptor for RequestIdInterceptor {
    async fn intercept(&self, mut request: RpcRequest, next: Next) -> RpcResponse {
        let existing = request
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(|v| RequestId(v.to_string()));

        let id = match existing {
            Some(id) => id,
            None => {
                let id = RequestId::new();
                if let Ok(value) = HeaderValue::from_str(id.as_str()) {
                    request.headers_mut().insert(X_REQUEST_ID, value);
                }
                id
            }
        };
        request.extensions_mut().insert(id);

        next.run(request).await
    }
}
