//! Ordered middleware chain in front of a transport

use std::sync::Arc;

use paybridge_types::PayBridgeResult;
use serde_json::Value;
use tracing::instrument;

use crate::middleware::{
    AuthMiddleware, LogSink, LoggingMiddleware, Middleware, Next, RetryHook, RetryMiddleware, RetryPolicy,
    TokenSource,
};
use crate::request::{HttpRequest, HttpResponse};
use crate::response::{classify, ApiResponse};
use crate::transport::Transport;

/// Request pipeline: middleware in order, then the transport
///
/// Cheap to clone; clones share the transport and middleware.
#[derive(Clone)]
pub struct Pipeline {
    transport: Arc<dyn Transport>,
    middleware: Arc<[Arc<dyn Middleware>]>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("base_url", &self.transport.base_url())
            .field("middleware", &self.middleware_names())
            .finish()
    }
}

impl Pipeline {
    pub fn builder(transport: Arc<dyn Transport>) -> PipelineBuilder {
        PipelineBuilder::new(transport)
    }

    /// Auth, then retry, then logging
    ///
    /// Logging sits innermost so every retry attempt is logged separately.
    pub fn standard(
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenSource>,
        retry: RetryPolicy,
        sink: Arc<dyn LogSink>,
        debug: bool,
    ) -> Self {
        Self::builder(transport)
            .with_auth(tokens)
            .with_retry(retry, None)
            .with_logging(sink, debug)
            .build()
    }

    /// Names of the middleware, outermost first
    pub fn middleware_names(&self) -> Vec<&'static str> {
        self.middleware.iter().map(|m| m.name()).collect()
    }

    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    /// Run the chain and return the raw response, whatever its status
    pub async fn send(&self, request: HttpRequest) -> PayBridgeResult<HttpResponse> {
        Next::new(self.transport.as_ref(), &self.middleware)
            .run(request)
            .await
    }

    /// Run the chain and classify the response
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn execute(&self, request: HttpRequest) -> PayBridgeResult<ApiResponse<Value>> {
        let response = self.send(request).await?;
        classify(&response)
    }
}

/// Assembles a [`Pipeline`]
pub struct PipelineBuilder {
    transport: Arc<dyn Transport>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl PipelineBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            middleware: Vec::new(),
        }
    }

    /// Append a middleware; earlier entries wrap later ones
    pub fn with(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn with_auth(self, tokens: Arc<dyn TokenSource>) -> Self {
        self.with(Arc::new(AuthMiddleware::new(tokens)))
    }

    pub fn with_retry(self, policy: RetryPolicy, hook: Option<RetryHook>) -> Self {
        let mut retry = RetryMiddleware::new(policy);
        if let Some(hook) = hook {
            retry = retry.with_hook(hook);
        }
        self.with(Arc::new(retry))
    }

    pub fn with_logging(self, sink: Arc<dyn LogSink>, enabled: bool) -> Self {
        self.with(Arc::new(LoggingMiddleware::new(sink, enabled)))
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            transport: self.transport,
            middleware: self.middleware.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{StaticToken, TracingSink};
    use crate::transport::MockTransport;
    use paybridge_types::PayBridgeError;
    use serde_json::json;
    use std::time::Duration;

    fn standard(transport: Arc<MockTransport>) -> Pipeline {
        Pipeline::standard(
            transport,
            Arc::new(StaticToken::new("tok")),
            RetryPolicy::default().with_base_delay(Duration::from_millis(10)),
            Arc::new(TracingSink),
            true,
        )
    }

    #[test]
    fn test_standard_order() {
        let pipeline = standard(Arc::new(MockTransport::new("https://mock.test")));
        assert_eq!(pipeline.middleware_names(), vec!["auth", "retry", "logging"]);
    }

    #[tokio::test]
    async fn test_execute_classifies() {
        let transport = Arc::new(MockTransport::new("https://mock.test"));
        transport.push_json(200, json!({"data": {"id": "d1"}}));
        let pipeline = standard(transport.clone());

        let response = pipeline.execute(HttpRequest::get("/deposits/d1")).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.data["data"]["id"], "d1");
        assert_eq!(transport.requests()[0].header("Authorization"), Some("Bearer tok"));
    }

    #[tokio::test]
    async fn test_execute_maps_validation() {
        let transport = Arc::new(MockTransport::new("https://mock.test"));
        transport.push_json(
            422,
            json!({"message": "invalid", "errors": {"amount": ["must be positive"]}}),
        );
        let pipeline = standard(transport);

        let err = pipeline
            .execute(HttpRequest::post("/deposits").with_json(json!({"amount": "-1"})))
            .await
            .unwrap_err();
        assert!(matches!(err, PayBridgeError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_empty_pipeline_hits_transport() {
        let transport = Arc::new(MockTransport::new("https://mock.test"));
        transport.push_json(204, json!(null));
        let pipeline = Pipeline::builder(transport.clone()).build();

        assert!(pipeline.middleware_names().is_empty());
        let response = pipeline.send(HttpRequest::delete("/pix/keys/k1")).await.unwrap();
        assert_eq!(response.status, 204);
        assert_eq!(transport.call_count(), 1);
    }
}
