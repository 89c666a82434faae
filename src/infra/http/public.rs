use std::{convert::Infallible, io::ErrorKind, sync::Arc};

use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, FromRequestParts, Path, Query, State},
    http::{
        HeaderValue, Request, StatusCode, Uri,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS},
        request::Parts,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use tracing::error;

use crate::{
    application::{
        access::{Action, Actor, require_login},
        auth::AuthService,
        chrome::ChromeService,
        error::{ErrorReport, HttpError},
        feed::{FeedError, FeedService},
        follows::FollowService,
        posts::PostService,
        repos::HealthRepo,
    },
    cache::{IndexCacheState, index_cache_layer},
    infra::uploads::{UploadStorage, UploadStorageError},
    presentation::views::{
        FollowTemplate, GroupTemplate, IndexTemplate, LayoutChrome, LayoutContext,
        PostDetailTemplate, ProfileTemplate, render_not_found_response, render_template_response,
    },
};

use super::{
    auth as auth_handlers, db_health_response, denial_response,
    middleware::{log_responses, set_request_context},
    posts as post_handlers, repo_error_to_http,
    session::{Viewer, resolve_viewer},
};

const SOURCE: &str = "infra::http::public";

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub follows: Arc<FollowService>,
    pub auth: Arc<AuthService>,
    pub chrome: Arc<ChromeService>,
    pub health: Arc<dyn HealthRepo>,
    pub upload_storage: Arc<UploadStorage>,
    pub index_cache: IndexCacheState,
    pub upload_body_limit: usize,
    pub secure_cookies: bool,
}

impl HttpState {
    pub(crate) fn chrome_for(&self, actor: &Actor, path: &str) -> LayoutChrome {
        self.chrome.load(actor, path)
    }

    pub(crate) fn not_found(&self, actor: &Actor, path: &str) -> Response {
        render_not_found_response(self.chrome_for(actor, path).with_title("Page Not Found"))
    }
}

pub fn build_router(state: HttpState) -> Router {
    // Only the home index is cached.
    let cached_routes = Router::new()
        .route("/", get(index))
        .layer(middleware::from_fn_with_state(
            state.index_cache.clone(),
            index_cache_layer,
        ));

    let form_routes = Router::new()
        .route(
            "/create/",
            get(post_handlers::create_form).post(post_handlers::create_submit),
        )
        .route(
            "/posts/{id}/edit/",
            get(post_handlers::edit_form).post(post_handlers::edit_submit),
        )
        .layer(DefaultBodyLimit::max(state.upload_body_limit));

    let routes = Router::new()
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route(
            "/profile/{username}/follow/",
            get(post_handlers::profile_follow),
        )
        .route(
            "/profile/{username}/unfollow/",
            get(post_handlers::profile_unfollow),
        )
        .route("/posts/{id}/", get(post_detail))
        .route(
            "/posts/{id}/comment/",
            get(post_handlers::comment_get).post(post_handlers::add_comment),
        )
        .route("/follow/", get(follow_index))
        .route(
            "/auth/login/",
            get(auth_handlers::login_form).post(auth_handlers::login_submit),
        )
        .route(
            "/auth/signup/",
            get(auth_handlers::signup_form).post(auth_handlers::signup_submit),
        )
        .route("/auth/logout/", get(auth_handlers::logout))
        .route("/media/{*path}", get(serve_upload))
        .route("/_health/db", get(public_health));

    cached_routes
        .merge(form_routes)
        .merge(routes)
        .fallback(fallback)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn_with_state(state.clone(), resolve_viewer))
        .layer(middleware::from_fn(set_request_context))
        .with_state(state)
}

/// The raw `page` query value. Repeated keys resolve to the last one and an
/// unparseable query string reads as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PageParam(pub Option<String>);

impl PageParam {
    fn from_uri(uri: &Uri) -> Self {
        let pairs = Query::<Vec<(String, String)>>::try_from_uri(uri)
            .map(|Query(pairs)| pairs)
            .unwrap_or_default();
        PageParam(
            pairs
                .into_iter()
                .rev()
                .find(|(key, _)| key == "page")
                .map(|(_, value)| value),
        )
    }

    fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S> FromRequestParts<S> for PageParam
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(PageParam::from_uri(&parts.uri))
    }
}

async fn index(
    State(state): State<HttpState>,
    Viewer(actor): Viewer,
    page: PageParam,
) -> Response {
    let chrome = state.chrome_for(&actor, "/");

    match state.feed.index(page.as_deref()).await {
        Ok(content) => {
            let view = LayoutContext::new(chrome.with_title("Latest posts"), content);
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome),
    }
}

async fn group_posts(
    State(state): State<HttpState>,
    Viewer(actor): Viewer,
    Path(slug): Path<String>,
    page: PageParam,
) -> Response {
    let chrome = state.chrome_for(&actor, &format!("/group/{slug}/"));

    match state.feed.group(&slug, page.as_deref()).await {
        Ok(content) => {
            let title = content.title.clone();
            let view = LayoutContext::new(chrome.with_title(title), content);
            render_template_response(GroupTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome),
    }
}

async fn profile(
    State(state): State<HttpState>,
    Viewer(actor): Viewer,
    Path(username): Path<String>,
    page: PageParam,
) -> Response {
    let chrome = state.chrome_for(&actor, &format!("/profile/{username}/"));

    match state
        .feed
        .profile(&username, &actor, page.as_deref())
        .await
    {
        Ok(content) => {
            let title = format!("Posts by {}", content.username);
            let view = LayoutContext::new(chrome.with_title(title), content);
            render_template_response(ProfileTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome),
    }
}

async fn post_detail(
    State(state): State<HttpState>,
    Viewer(actor): Viewer,
    Path(raw_id): Path<String>,
) -> Response {
    let path = format!("/posts/{raw_id}/");
    let Some(id) = parse_post_id(&raw_id) else {
        return state.not_found(&actor, &path);
    };

    render_post_detail(&state, &actor, id, None, StatusCode::OK).await
}

pub(crate) async fn render_post_detail(
    state: &HttpState,
    actor: &Actor,
    id: i64,
    draft: Option<crate::application::feed::CommentDraft>,
    status: StatusCode,
) -> Response {
    let chrome = state.chrome_for(actor, &format!("/posts/{id}/"));

    match state.feed.post_detail(id, actor, draft).await {
        Ok(content) => {
            let title = post_title(&content.post.text);
            let view = LayoutContext::new(chrome.with_title(title), content);
            render_template_response(PostDetailTemplate { view }, status)
        }
        Err(err) => feed_error_to_response(err, chrome),
    }
}

async fn follow_index(
    State(state): State<HttpState>,
    Viewer(actor): Viewer,
    page: PageParam,
    request: Request<Body>,
) -> Response {
    let user = match require_login(&actor, Action::Follow, &full_path(&request)) {
        Ok(user) => user,
        Err(denial) => return denial_response(denial),
    };
    let chrome = state.chrome_for(&actor, "/follow/");

    match state.feed.follow_index(user, page.as_deref()).await {
        Ok(content) => {
            let view = LayoutContext::new(chrome.with_title("Following"), content);
            render_template_response(FollowTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome),
    }
}

async fn serve_upload(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::serve_upload";

    match state.upload_storage.read(&path).await {
        Ok(bytes) => build_upload_response(&path, bytes),
        Err(UploadStorageError::InvalidPath) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Upload not found",
            "The requested upload is not available",
        )
        .into_response(),
        Err(UploadStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Upload not found",
            "The requested upload is not available",
        )
        .into_response(),
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored upload"
            );
            HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read uploaded file",
                err.to_string(),
            )
            .into_response()
        }
    }
}

fn build_upload_response(path: &str, bytes: Bytes) -> Response {
    let len = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&len.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}

async fn public_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.ping().await)
}

async fn fallback(
    State(state): State<HttpState>,
    Viewer(actor): Viewer,
    request: Request<Body>,
) -> Response {
    state.not_found(&actor, request.uri().path())
}

pub(crate) fn feed_error_to_response(err: FeedError, chrome: LayoutChrome) -> Response {
    match err {
        FeedError::NotFound { entity } => {
            let mut response = render_not_found_response(chrome.with_title("Page Not Found"));
            ErrorReport::from_message(
                "infra::http::feed_error_to_response",
                StatusCode::NOT_FOUND,
                format!("unknown {entity}"),
            )
            .attach(&mut response);
            response
        }
        FeedError::Repo(err) => repo_error_to_http(SOURCE, err).into_response(),
    }
}

/// Post ids are positive integers; anything else is an unknown post.
pub(crate) fn parse_post_id(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().filter(|id| *id > 0)
}

/// Path plus query, used as the `next` target of login redirects.
pub(crate) fn full_path<B>(request: &Request<B>) -> String {
    request
        .uri()
        .path_and_query()
        .map(|value| value.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string())
}

fn post_title(text: &str) -> String {
    const MAX_CHARS: usize = 30;
    let title: String = text.chars().take(MAX_CHARS).collect();
    if text.chars().count() > MAX_CHARS {
        format!("{title}…")
    } else {
        title
    }
}
