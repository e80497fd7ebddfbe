use std::cell::RefCell;
use std::future::Future;

use axum::{
    extract::Request,
    http::{header::HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

/// Header name for the request ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request information carried through a tokio task-local so that
/// error responses can report the request path without a global.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub request_id: String,
    pub method: String,
    pub path: String,
}

impl RequestContext {
    pub fn new(
        request_id: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            method: method.into(),
            path: path.into(),
        }
    }
}

tokio::task_local! {
    static CURRENT_REQUEST: RefCell<Option<RequestContext>>;
}

pub async fn scope_request_context<Fut, R>(context: RequestContext, future: Fut) -> R
where
    Fut: Future<Output = R>,
{
    CURRENT_REQUEST
        .scope(RefCell::new(Some(context)), future)
        .await
}

pub fn current_request_context() -> Option<RequestContext> {
    CURRENT_REQUEST
        .try_with(|cell| cell.borrow().clone())
        .ok()
        .flatten()
}

/// Middleware that assigns every request an ID, records method and path in
/// the task-local context, and echoes the ID back on the response.
pub async fn request_context_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let context = RequestContext::new(
        request_id.clone(),
        request.method().to_string(),
        request.uri().path().to_string(),
    );

    let span = tracing::info_span!(
        "request",
        request_id = %context.request_id,
        method = %context.method,
        path = %context.path,
    );
    let mut response =
        scope_request_context(context, async move { next.run(request).await })
            .instrument(span)
            .await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn context_is_visible_inside_scope() {
        let ctx = RequestContext::new("req-1", "GET", "/api/v1/orders");
        let seen = scope_request_context(ctx, async { current_request_context() }).await;
        let seen = seen.expect("context should be set");
        assert_eq!(seen.request_id, "req-1");
        assert_eq!(seen.path, "/api/v1/orders");
    }

    #[tokio::test]
    async fn context_is_absent_outside_scope() {
        assert!(current_request_context().is_none());
    }
}
