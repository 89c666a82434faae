//! Response cache middleware for the home index.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use metrics::counter;
use tracing::{debug, instrument};

use super::{
    keys::index_key,
    store::{CachedResponse, ResponseCache},
};

const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct IndexCacheState {
    pub cache: Arc<ResponseCache>,
    pub ttl: Duration,
    pub session_cookie: &'static str,
}

/// Serve `GET` requests from the cache, storing fresh 2xx renders.
///
/// Responses that set a cookie are passed through untouched.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn index_cache_layer(
    State(state): State<IndexCacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let jar = CookieJar::from_headers(request.headers());
    let session = jar.get(state.session_cookie).map(|cookie| cookie.value());
    let key = index_key(request.uri().query(), session);

    if let Some(cached) = state.cache.get(&key) {
        counter!("quillpost_index_cache_hit_total").increment(1);
        debug!(cache = "index", outcome = "hit", "serving cached response");
        return build_response(cached);
    }

    counter!("quillpost_index_cache_miss_total").increment(1);
    debug!(cache = "index", outcome = "miss", "rendering index");

    let response = next.run(request).await;
    if !response.status().is_success() || response.headers().contains_key(header::SET_COOKIE) {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    let cached = CachedResponse {
        status: parts.status.as_u16(),
        headers: parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect(),
        body: bytes.clone(),
    };
    state.cache.set(key, cached, state.ttl);
    counter!("quillpost_index_cache_store_total").increment(1);

    Response::from_parts(parts, Body::from(bytes))
}

fn build_response(cached: CachedResponse) -> Response {
    let mut builder = Response::builder().status(cached.status);

    for (name, value) in cached.headers {
        if let Ok(header_value) = HeaderValue::from_str(&value) {
            builder = builder.header(name, header_value);
        }
    }

    builder
        .body(Body::from(cached.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{Router, middleware, routing::get};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;

    fn app(renders: Arc<AtomicUsize>, cache: Arc<ResponseCache>) -> Router {
        let state = IndexCacheState {
            cache,
            ttl: Duration::from_secs(20),
            session_cookie: "session",
        };
        Router::new()
            .route(
                "/",
                get(move || {
                    let renders = renders.clone();
                    async move {
                        let count = renders.fetch_add(1, Ordering::SeqCst) + 1;
                        format!("render {count}")
                    }
                }),
            )
            .layer(middleware::from_fn_with_state(state, index_cache_layer))
    }

    async fn body_of(app: &Router, request: Request<Body>) -> String {
        let response = app.clone().oneshot(request).await.expect("response");
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    fn get_request(cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).expect("request")
    }

    #[tokio::test]
    async fn second_request_is_replayed_until_cleared() {
        let renders = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(ResponseCache::new(NonZeroUsize::new(8).expect("non-zero")));
        let app = app(renders.clone(), cache.clone());

        assert_eq!(body_of(&app, get_request(None)).await, "render 1");
        assert_eq!(body_of(&app, get_request(None)).await, "render 1");
        assert_eq!(renders.load(Ordering::SeqCst), 1);

        cache.clear();
        assert_eq!(body_of(&app, get_request(None)).await, "render 2");
    }

    #[tokio::test]
    async fn sessions_do_not_share_entries() {
        let renders = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(ResponseCache::new(NonZeroUsize::new(8).expect("non-zero")));
        let app = app(renders.clone(), cache);

        body_of(&app, get_request(None)).await;
        let signed_in = body_of(&app, get_request(Some("session=abc"))).await;
        assert_eq!(signed_in, "render 2");
    }
}
