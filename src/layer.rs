//! Tower middleware that reports and renders failures raised by handlers.

use crate::common::RequestContext;
use crate::failure::{Failure, kind};
use crate::handler::ExceptionHandler;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// A failure returned by a handler, waiting for [`ExceptionMiddleware`].
#[derive(Clone)]
struct Unhandled(Failure);

/// Lets handlers return `Result<_, Failure>`.
///
/// The response is only a placeholder: the failure rides along in the
/// extensions until [`ExceptionLayer`] reports and renders it.
impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        response.extensions_mut().insert(Unhandled(self));
        response
    }
}

/// Tower layer wrapping services in [`ExceptionMiddleware`].
///
/// # Example
/// ```
/// use axum::{Router, routing::get};
/// use faultline::{Failure, HandlerBuilder};
/// use faultline::layer::ExceptionLayer;
/// use std::sync::Arc;
///
/// async fn show_user() -> Result<String, Failure> {
///     Err(Failure::model_not_found("User"))
/// }
///
/// let handler = Arc::new(HandlerBuilder::new().build());
/// let app: Router = Router::new()
///     .route("/users/{id}", get(show_user))
///     .layer(ExceptionLayer::new(handler));
/// ```
#[derive(Clone)]
pub struct ExceptionLayer {
    handler: Arc<ExceptionHandler>,
}

impl ExceptionLayer {
    pub fn new(handler: Arc<ExceptionHandler>) -> Self {
        Self { handler }
    }
}

impl<S> Layer<S> for ExceptionLayer {
    type Service = ExceptionMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ExceptionMiddleware {
            inner,
            handler: self.handler.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ExceptionMiddleware<S> {
    inner: S,
    handler: Arc<ExceptionHandler>,
}

impl<S> Service<Request<Body>> for ExceptionMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let handler = self.handler.clone();
        // The clone may not be ready; keep the one that was polled.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let (parts, body) = req.into_parts();
        let context = RequestContext::from_parts(&parts);
        let req = Request::from_parts(parts, body);

        Box::pin(async move {
            let failure = match inner.call(req).await {
                Ok(mut response) => match response.extensions_mut().remove::<Unhandled>() {
                    Some(Unhandled(failure)) => failure,
                    None => return Ok(response),
                },
                Err(e) => Failure::from_boxed(&kind::GENERIC, e.into()),
            };
            Ok(handle(&handler, &context, failure))
        })
    }
}

fn handle(handler: &ExceptionHandler, context: &RequestContext, failure: Failure) -> Response {
    if let Err(unreported) = handler.report(failure.clone()) {
        let mut stderr = io::stderr().lock();
        if let Err(e) = handler.render_for_console(&mut stderr, &unreported) {
            tracing::warn!("Failed to write unreported failure to stderr: {}", e);
        }
    }
    handler.render(context, failure).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Flash;
    use crate::di::{Services, ServicesBuilder};
    use crate::handler::HandlerBuilder;
    use crate::testing::RecordingSink;
    use axum::{Router, routing::get};
    use serde_json::{Value, json};
    use tower::{ServiceExt, service_fn};

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn handler_with(sink: &Arc<RecordingSink>) -> Arc<ExceptionHandler> {
        let mut builder = HandlerBuilder::new();
        builder.services(ServicesBuilder::new().sink(sink.clone()).build());
        Arc::new(builder.build())
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn api_request(uri: &str) -> Request<Body> {
        Request::get(uri)
            .header("accept", "application/json")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_handler_failures_are_rendered() {
        let sink = Arc::new(RecordingSink::new());
        let app = Router::new()
            .route(
                "/users/{id}",
                get(|| async { Err::<String, Failure>(Failure::model_not_found("User")) }),
            )
            .layer(ExceptionLayer::new(handler_with(&sink)));

        let response = app.oneshot(api_request("/users/7")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            json_body(response).await,
            json!({ "message": "No query results for model [User]." })
        );
        // not-found is part of normal flow and never logged
        assert_eq!(sink.len(), 0);
    }

    #[tokio::test]
    async fn test_unclassified_failures_are_reported_and_hidden() {
        init_tracing();
        let sink = Arc::new(RecordingSink::new());
        let app = Router::new()
            .route(
                "/orders",
                get(|| async { Err::<String, Failure>(Failure::generic("deadlock on orders")) }),
            )
            .layer(ExceptionLayer::new(handler_with(&sink)));

        let response = app.oneshot(api_request("/orders")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await, json!({ "message": "Server Error" }));
        assert_eq!(sink.records()[0].message, "deadlock on orders");
    }

    #[tokio::test]
    async fn test_successful_responses_pass_through() {
        let sink = Arc::new(RecordingSink::new());
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(ExceptionLayer::new(handler_with(&sink)));

        let response = app.oneshot(api_request("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(sink.len(), 0);
    }

    #[tokio::test]
    async fn test_inner_service_errors_are_rendered() {
        let sink = Arc::new(RecordingSink::new());
        let service = ExceptionLayer::new(handler_with(&sink)).layer(service_fn(
            |_: Request<Body>| async {
                Err::<Response, _>(io::Error::new(io::ErrorKind::Other, "upstream closed"))
            },
        ));

        let response = service.oneshot(api_request("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(sink.records()[0].message, "upstream closed");
    }

    #[tokio::test]
    async fn test_validation_redirect_carries_flash() {
        let sink = Arc::new(RecordingSink::new());
        let app = Router::new()
            .route(
                "/register",
                get(|| async {
                    Err::<String, Failure>(Failure::validation([(
                        "email",
                        vec!["The email field is required."],
                    )]))
                }),
            )
            .layer(ExceptionLayer::new(handler_with(&sink)));

        let request = Request::get("/register?name=Ada&password=hunter2")
            .header("referer", "/signup")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()["location"], "/signup");
        let flash = response.extensions().get::<Flash>().unwrap();
        assert_eq!(flash.input.get("name"), Some(&json!("Ada")));
        assert!(flash.input.get("password").is_none());
    }

    #[tokio::test]
    async fn test_missing_sink_still_renders() {
        init_tracing();
        let mut builder = HandlerBuilder::new();
        builder.services(Services::new());
        let app = Router::new()
            .route(
                "/",
                get(|| async { Err::<String, Failure>(Failure::generic("no logger")) }),
            )
            .layer(ExceptionLayer::new(Arc::new(builder.build())));

        let response = app.oneshot(api_request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
