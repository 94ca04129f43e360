//! Custom Axum extractors.
//!
//! - `CorrelationId`: the request's correlation ID (set by the middleware,
//!   read from `X-Correlation-ID`, or generated)
//! - `ClientIp`: client address from proxy headers

use crate::middleware::CORRELATION_ID_HEADER;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use std::net::{IpAddr, Ipv4Addr};
use uuid::Uuid;

/// Correlation ID for request tracing.
///
/// Checkout uses it to key the in-flight session, so a client that retries
/// with the same header lands on the same session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(id) = parts.extensions.get::<Uuid>() {
            return Ok(Self(*id));
        }

        let correlation_id = parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

/// Client IP address.
///
/// Checks `X-Forwarded-For` (first entry), then `X-Real-IP`, then falls back
/// to loopback.
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub IpAddr);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(extract_client_ip(&parts.headers)))
    }
}

fn extract_client_ip(headers: &HeaderMap) -> IpAddr {
    let forwarded = headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok());

    let real_ip = || {
        headers
            .get("X-Real-IP")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    };

    forwarded
        .or_else(real_ip)
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn parts_with(header: Option<(&str, &str)>) -> Parts {
        let mut builder = Request::builder();
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn correlation_id_from_header() {
        let uuid = Uuid::new_v4();
        let mut parts = parts_with(Some(("X-Correlation-ID", &uuid.to_string()))).await;
        let id = CorrelationId::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(id.0, uuid);
    }

    #[tokio::test]
    async fn correlation_id_prefers_extension() {
        let uuid = Uuid::new_v4();
        let mut parts = parts_with(Some(("X-Correlation-ID", "not-a-uuid"))).await;
        parts.extensions.insert(uuid);
        let id = CorrelationId::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(id.0, uuid);
    }

    #[tokio::test]
    async fn correlation_id_generated_when_absent() {
        let mut parts = parts_with(None).await;
        let id = CorrelationId::from_request_parts(&mut parts, &()).await.unwrap();
        assert_ne!(id.0, Uuid::nil());
    }

    #[tokio::test]
    async fn client_ip_from_forwarded_for() {
        let mut parts = parts_with(Some(("X-Forwarded-For", "203.0.113.1, 198.51.100.1"))).await;
        let ip = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ip.0.to_string(), "203.0.113.1");
    }

    #[tokio::test]
    async fn client_ip_from_real_ip() {
        let mut parts = parts_with(Some(("X-Real-IP", "198.51.100.42"))).await;
        let ip = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ip.0.to_string(), "198.51.100.42");
    }

    #[tokio::test]
    async fn client_ip_falls_back_to_loopback() {
        let mut parts = parts_with(None).await;
        let ip = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(ip.0.is_loopback());
    }
}
