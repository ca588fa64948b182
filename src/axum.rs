//! Axum integration utilities.

use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::gate::{Denial, Gate, GateState};
use crate::types::PrincipalId;

use ::axum::body::Body;
use ::axum::http::Request;
use ::axum::response::{IntoResponse, Response};
use ::http::StatusCode;
use ::tower::{Layer, Service};
use tracing::error;

/// Authenticated principal attached to a request by the host's auth layer.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Principal identifier.
    pub principal: PrincipalId,
}

impl AuthContext {
    /// Creates an auth context.
    pub fn new(principal: PrincipalId) -> Self {
        Self { principal }
    }
}

/// Renders a denial with its status code.
///
/// With the `serde` feature the body is the JSON-encoded [`Denial`]
/// (`kind`, `status`, `message`, `required`); without it the body is the
/// plain-text message. Hosts that need another shape map
/// [`GateState::Denied`] themselves.
impl IntoResponse for Denial {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::FORBIDDEN);
        #[cfg(feature = "serde")]
        return (status, ::axum::Json(self)).into_response();
        #[cfg(not(feature = "serde"))]
        (status, self.message).into_response()
    }
}

fn unavailable() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "auth error").into_response()
}

/// Middleware layer that enforces a [`Gate`].
#[derive(Debug)]
pub struct GateLayer<S> {
    gate: Arc<Gate<S>>,
}

impl<S> Clone for GateLayer<S> {
    fn clone(&self) -> Self {
        Self {
            gate: Arc::clone(&self.gate),
        }
    }
}

impl<S> GateLayer<S> {
    /// Creates a new gate layer.
    pub fn new(gate: Gate<S>) -> Self {
        Self {
            gate: Arc::new(gate),
        }
    }
}

impl<S, Inner> Layer<Inner> for GateLayer<S>
where
    S: crate::store::Store,
{
    type Service = GateService<Inner, S>;

    fn layer(&self, inner: Inner) -> Self::Service {
        GateService {
            inner,
            gate: Arc::clone(&self.gate),
        }
    }
}

/// Middleware service that enforces a requirement on every request.
#[derive(Debug)]
pub struct GateService<Inner, S> {
    inner: Inner,
    gate: Arc<Gate<S>>,
}

impl<Inner: Clone, S> Clone for GateService<Inner, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            gate: Arc::clone(&self.gate),
        }
    }
}

impl<Inner, S> Service<Request<Body>> for GateService<Inner, S>
where
    Inner: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    Inner::Future: Send + 'static,
    S: crate::store::Store + 'static,
{
    type Response = Response;
    type Error = Inner::Error;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let gate = Arc::clone(&self.gate);

        Box::pin(async move {
            let principal = req
                .extensions()
                .get::<AuthContext>()
                .map(|context| context.principal.clone());

            match gate.evaluate(principal.as_ref()).await {
                Ok(GateState::Authorized) => {
                    poll_fn(|cx| inner.poll_ready(cx)).await?;
                    inner.call(req).await
                }
                Ok(GateState::Denied(denial)) => Ok(denial.into_response()),
                Ok(GateState::Unchecked) => {
                    error!(requirement = %gate.requirement(), "request left unchecked");
                    Ok(unavailable())
                }
                Err(err) => {
                    error!(
                        requirement = %gate.requirement(),
                        error = %err,
                        "authorization unavailable"
                    );
                    Ok(unavailable())
                }
            }
        })
    }
}
