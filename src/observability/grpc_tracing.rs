//! gRPC Tracing Interceptor
//!
//! Tower middleware that wraps every xDS gRPC call in a tracing span
//! recording method, status, and duration.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use tonic::codegen::http::{Request, Response};
use tower::{Layer, Service};
use tracing::{info_span, Instrument, Span};

/// Tower layer providing automatic tracing for xDS gRPC calls.
#[derive(Clone, Default)]
pub struct GrpcTracingLayer;

impl GrpcTracingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for GrpcTracingLayer {
    type Service = GrpcTracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GrpcTracingService { inner }
    }
}

#[derive(Clone)]
pub struct GrpcTracingService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for GrpcTracingService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Default + Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let grpc_path = request.uri().path().to_string();
        let (service_name, method_name) = parse_grpc_path(&grpc_path);
        let span = create_grpc_span(&service_name, &method_name);

        let mut inner = self.inner.clone();

        Box::pin(
            async move {
                let start = Instant::now();
                let result = inner.call(request).await;

                let duration_ms = start.elapsed().as_millis() as f64;
                Span::current().record("grpc.duration_ms", duration_ms);
                Span::current().record("grpc.status", if result.is_ok() { "OK" } else { "ERROR" });

                result
            }
            .instrument(span),
        )
    }
}

/// Parse gRPC path into service and method names.
///
/// gRPC paths are formatted as `/package.ServiceName/MethodName`.
fn parse_grpc_path(path: &str) -> (String, String) {
    let parts: Vec<&str> = path.trim_start_matches('/').split('/').collect();

    match parts.as_slice() {
        [service, method] => (service.to_string(), method.to_string()),
        [single] if !single.is_empty() => (single.to_string(), "unknown".to_string()),
        _ => ("unknown".to_string(), "unknown".to_string()),
    }
}

fn create_grpc_span(service: &str, method: &str) -> Span {
    info_span!(
        "grpc.server",
        otel.name = %format!("{}/{}", service, method),
        rpc.system = "grpc",
        rpc.service = %service,
        rpc.method = %method,
        grpc.status = tracing::field::Empty,
        grpc.duration_ms = tracing::field::Empty,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_grpc_path_standard() {
        let (service, method) = parse_grpc_path(
            "/envoy.service.discovery.v3.AggregatedDiscoveryService/StreamAggregatedResources",
        );
        assert_eq!(service, "envoy.service.discovery.v3.AggregatedDiscoveryService");
        assert_eq!(method, "StreamAggregatedResources");
    }

    #[test]
    fn parse_grpc_path_empty() {
        let (service, method) = parse_grpc_path("/");
        assert_eq!(service, "unknown");
        assert_eq!(method, "unknown");
    }

    #[test]
    fn parse_grpc_path_single_component() {
        let (service, method) = parse_grpc_path("/ServiceOnly");
        assert_eq!(service, "ServiceOnly");
        assert_eq!(method, "unknown");
    }

    #[test]
    fn create_grpc_span_does_not_panic() {
        let span = create_grpc_span("TestService", "TestMethod");
        drop(span);
    }
}
