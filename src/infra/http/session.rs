//! Cookie sessions: resolving the viewer and issuing or clearing the cookie.

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::warn;

use crate::application::access::Actor;
use crate::application::auth::IssuedSession;

use super::HttpState;

pub const SESSION_COOKIE: &str = "quillpost_session";

const SOURCE: &str = "infra::http::session";

/// The actor behind the current request. Anonymous when no valid session
/// cookie was presented.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Actor);

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Viewer(
            parts.extensions.get::<Actor>().cloned().unwrap_or_default(),
        ))
    }
}

/// Resolve the session cookie into an [`Actor`] request extension.
///
/// Lookup failures are logged and the request continues anonymously.
pub async fn resolve_viewer(
    State(state): State<HttpState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let jar = CookieJar::from_headers(request.headers());
    let actor = match jar.get(SESSION_COOKIE) {
        Some(cookie) => match state.auth.resolve(cookie.value()).await {
            Ok(user) => Actor::from(user),
            Err(err) => {
                warn!(target = SOURCE, error = %err, "session lookup failed");
                Actor::Anonymous
            }
        },
        None => Actor::Anonymous,
    };

    request.extensions_mut().insert(actor);
    next.run(request).await
}

pub fn session_cookie(session: &IssuedSession, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session.token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .expires(session.expires_at)
        .build()
}

pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}
