//! Correlation ID middleware.
//!
//! Every request gets a correlation ID (from `X-Correlation-ID` or freshly
//! generated). It is stored in the request extensions, recorded on an
//! `http_request` span, and echoed on the response.
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/orders/me", get(my_orders))
//!     .layer(correlation_id_layer());
//! ```

use axum::{extract::Request, http::HeaderValue, response::Response};
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

/// Header carrying the correlation ID in both directions.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Create the correlation ID layer.
#[must_use]
pub const fn correlation_id_layer() -> CorrelationIdLayer {
    CorrelationIdLayer
}

/// Layer that wraps services with [`CorrelationIdMiddleware`].
#[derive(Clone, Copy, Debug)]
pub struct CorrelationIdLayer;

impl<S> Layer<S> for CorrelationIdLayer {
    type Service = CorrelationIdMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationIdMiddleware { inner }
    }
}

/// Middleware service assigning correlation IDs.
#[derive(Clone, Debug)]
pub struct CorrelationIdMiddleware<S> {
    inner: S,
}

impl<S> Service<Request> for CorrelationIdMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let correlation_id = req
            .headers()
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        req.extensions_mut().insert(correlation_id);

        let span = tracing::info_span!(
            "http_request",
            correlation_id = %correlation_id,
            method = %req.method(),
            uri = %req.uri(),
        );

        let fut = self.inner.call(req);

        Box::pin(async move {
            let mut response = fut.instrument(span).await?;

            if let Ok(value) = HeaderValue::from_str(&correlation_id.to_string()) {
                response.headers_mut().insert(CORRELATION_ID_HEADER, value);
            }

            Ok(response)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::extractors::CorrelationId;
    use axum::{routing::get, Router};
    use axum_test::TestServer;

    async fn echo(CorrelationId(id): CorrelationId) -> String {
        id.to_string()
    }

    fn server() -> TestServer {
        let app = Router::new()
            .route("/echo", get(echo))
            .layer(correlation_id_layer());
        TestServer::new(app).unwrap()
    }

    #[tokio::test]
    async fn echoes_incoming_id() {
        let id = Uuid::new_v4();
        let response = server()
            .get("/echo")
            .add_header(
                axum::http::HeaderName::from_static("x-correlation-id"),
                HeaderValue::from_str(&id.to_string()).unwrap(),
            )
            .await;

        assert_eq!(response.text(), id.to_string());
        assert_eq!(response.header(CORRELATION_ID_HEADER), id.to_string());
    }

    #[tokio::test]
    async fn handler_and_header_agree_on_generated_id() {
        let response = server().get("/echo").await;
        assert_eq!(response.header(CORRELATION_ID_HEADER), response.text());
    }
}
