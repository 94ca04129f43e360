//! Health check endpoints for load balancers and monitoring.

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use storefront_core::reducer::Reducer;
use storefront_runtime::{HealthCheck, HealthStatus, Store};

/// Liveness probe.
///
/// Returns 200 as long as the process is serving requests. Dependencies are
/// not checked.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Readiness probe backed by a store's health.
///
/// # Status Codes
///
/// - 200 OK: Healthy or Degraded
/// - 503 Service Unavailable: Unhealthy (e.g. the store is shutting down)
///
/// # Endpoint
///
/// ```text
/// GET /health/ready
/// ```
pub async fn health_check_with_store<S, A, E, R>(
    State(store): State<Arc<Store<S, A, E, R>>>,
) -> (StatusCode, Json<HealthCheck>)
where
    R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
    S: Send + Sync + 'static,
    A: Send + Clone + 'static,
    E: Send + Sync + 'static,
{
    let health = store.health();

    let status = match health.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, Json(health))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;
    use storefront_core::{effect::Effect, SmallVec};

    #[derive(Clone)]
    struct NoopReducer;

    impl Reducer for NoopReducer {
        type State = ();
        type Action = ();
        type Environment = ();

        fn reduce(&self, _state: &mut (), _action: (), _env: &()) -> SmallVec<[Effect<()>; 4]> {
            SmallVec::new()
        }
    }

    #[tokio::test]
    async fn liveness_is_ok() {
        let (status, body) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn readiness_follows_store() {
        let store = Arc::new(Store::new((), NoopReducer, ()));

        let (status, Json(health)) = health_check_with_store(State(Arc::clone(&store))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health.status, HealthStatus::Healthy);

        store.shutdown(Duration::from_millis(10)).await.unwrap();
        let (status, _) = health_check_with_store(State(store)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
