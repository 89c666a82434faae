//! Handlers for the signed-in workflows: writing posts, commenting and
//! following authors.

use axum::{
    Form,
    body::Body,
    extract::{FromRequest, Path, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::extract::Multipart;
use serde::Deserialize;
use tracing::{debug, error};

use crate::{
    application::{
        access::{Action, Actor, post_detail_path, profile_path, require_login, require_owner},
        error::HttpError,
        feed::CommentDraft,
        follows::FollowError,
        forms::FormErrors,
        posts::{ImageUpload, PostError, PostSubmission},
    },
    domain::entities::PostRecord,
    presentation::views::{LayoutContext, PostFormTemplate, render_template_response},
};

use super::{
    denial_response, found,
    public::{HttpState, feed_error_to_response, full_path, parse_post_id, render_post_detail},
    session::Viewer,
};

const SOURCE: &str = "infra::http::posts";

pub(super) async fn create_form(
    State(state): State<HttpState>,
    Viewer(actor): Viewer,
    request: Request<Body>,
) -> Response {
    if let Err(denial) = require_login(&actor, Action::CreatePost, &full_path(&request)) {
        return denial_response(denial);
    }

    render_post_form(&state, &actor, None, None, None, &FormErrors::new()).await
}

pub(super) async fn create_submit(
    State(state): State<HttpState>,
    Viewer(actor): Viewer,
    request: Request<Body>,
) -> Response {
    let user = match require_login(&actor, Action::CreatePost, &full_path(&request)) {
        Ok(user) => user.clone(),
        Err(denial) => return denial_response(denial),
    };

    let submission = match read_submission(&state, request).await {
        Ok(submission) => submission,
        Err(response) => return response,
    };
    let retained = retained_fields(&submission);

    match state.posts.create(&user, submission).await {
        Ok(_) => found(&profile_path(&user.username)),
        Err(PostError::Validation(errors)) => {
            let (text, group) = retained;
            render_post_form(&state, &actor, None, Some(text), group, &errors).await
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn edit_form(
    State(state): State<HttpState>,
    Viewer(actor): Viewer,
    Path(raw_id): Path<String>,
    request: Request<Body>,
) -> Response {
    let post = match editable_post(&state, &actor, &raw_id, &full_path(&request)).await {
        Ok(post) => post,
        Err(response) => return response,
    };

    render_post_form(&state, &actor, Some(&post), None, None, &FormErrors::new()).await
}

pub(super) async fn edit_submit(
    State(state): State<HttpState>,
    Viewer(actor): Viewer,
    Path(raw_id): Path<String>,
    request: Request<Body>,
) -> Response {
    let post = match editable_post(&state, &actor, &raw_id, &full_path(&request)).await {
        Ok(post) => post,
        Err(response) => return response,
    };

    let submission = match read_submission(&state, request).await {
        Ok(submission) => submission,
        Err(response) => return response,
    };
    let retained = retained_fields(&submission);

    match state.posts.update(&post, submission).await {
        Ok(updated) => found(&post_detail_path(updated.id)),
        Err(PostError::Validation(errors)) => {
            let (text, group) = retained;
            render_post_form(&state, &actor, Some(&post), Some(text), group, &errors).await
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

/// Signed-in `GET`s of the comment endpoint just land on the post.
pub(super) async fn comment_get(
    State(state): State<HttpState>,
    Viewer(actor): Viewer,
    Path(raw_id): Path<String>,
    request: Request<Body>,
) -> Response {
    let path = full_path(&request);
    if let Err(denial) = require_login(&actor, Action::AddComment, &path) {
        return denial_response(denial);
    }

    match parse_post_id(&raw_id) {
        Some(id) => found(&post_detail_path(id)),
        None => state.not_found(&actor, &path),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommentForm {
    text: String,
}

pub(super) async fn add_comment(
    State(state): State<HttpState>,
    Viewer(actor): Viewer,
    Path(raw_id): Path<String>,
    request: Request<Body>,
) -> Response {
    let path = full_path(&request);
    let user = match require_login(&actor, Action::AddComment, &path) {
        Ok(user) => user.clone(),
        Err(denial) => return denial_response(denial),
    };
    let Some(id) = parse_post_id(&raw_id) else {
        return state.not_found(&actor, &path);
    };

    let Form(form) = match Form::<CommentForm>::from_request(request, &state).await {
        Ok(form) => form,
        Err(rejection) => return rejection.into_response(),
    };

    match state.posts.add_comment(&user, id, &form.text).await {
        Ok(_) => found(&post_detail_path(id)),
        Err(PostError::Validation(errors)) => {
            let draft = CommentDraft {
                text: form.text,
                errors,
            };
            render_post_detail(&state, &actor, id, Some(draft), StatusCode::OK).await
        }
        Err(PostError::NotFound { .. }) => state.not_found(&actor, &path),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn profile_follow(
    State(state): State<HttpState>,
    Viewer(actor): Viewer,
    Path(username): Path<String>,
    request: Request<Body>,
) -> Response {
    let path = full_path(&request);
    let user = match require_login(&actor, Action::Follow, &path) {
        Ok(user) => user,
        Err(denial) => return denial_response(denial),
    };

    match state.follows.follow(user, &username).await {
        Ok((author, outcome)) => {
            debug!(target = SOURCE, author = %author.username, ?outcome, "follow request handled");
            found(&profile_path(&author.username))
        }
        Err(FollowError::UnknownAuthor) => state.not_found(&actor, &path),
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn profile_unfollow(
    State(state): State<HttpState>,
    Viewer(actor): Viewer,
    Path(username): Path<String>,
    request: Request<Body>,
) -> Response {
    let path = full_path(&request);
    let user = match require_login(&actor, Action::Unfollow, &path) {
        Ok(user) => user,
        Err(denial) => return denial_response(denial),
    };

    match state.follows.unfollow(user, &username).await {
        Ok((author, outcome)) => {
            debug!(target = SOURCE, author = %author.username, ?outcome, "unfollow request handled");
            found(&profile_path(&author.username))
        }
        Err(FollowError::UnknownAuthor) => state.not_found(&actor, &path),
        Err(err) => HttpError::from(err).into_response(),
    }
}

/// Login, then id, then existence, then ownership.
async fn editable_post(
    state: &HttpState,
    actor: &Actor,
    raw_id: &str,
    path: &str,
) -> Result<PostRecord, Response> {
    let user = require_login(actor, Action::EditPost, path).map_err(denial_response)?;
    let id = parse_post_id(raw_id).ok_or_else(|| state.not_found(actor, path))?;

    let listing = match state.feed.queries().find(id).await {
        Ok(listing) => listing,
        Err(err) => {
            let chrome = state.chrome_for(actor, path);
            return Err(feed_error_to_response(err.into(), chrome));
        }
    };

    require_owner(user, &listing.post).map_err(denial_response)?;
    Ok(listing.post)
}

async fn render_post_form(
    state: &HttpState,
    actor: &Actor,
    existing: Option<&PostRecord>,
    text: Option<String>,
    group: Option<i64>,
    errors: &FormErrors,
) -> Response {
    let path = match existing {
        Some(post) => format!("{}edit/", post_detail_path(post.id)),
        None => "/create/".to_string(),
    };
    let chrome = state.chrome_for(actor, &path);
    let title = if existing.is_some() {
        "Edit post"
    } else {
        "New post"
    };

    match state.feed.post_form(existing, text, group).await {
        Ok(form) => {
            let view = LayoutContext::new(chrome.with_title(title), form.with_errors(errors));
            render_template_response(PostFormTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome),
    }
}

fn retained_fields(submission: &PostSubmission) -> (String, Option<i64>) {
    let group = submission
        .group
        .as_deref()
        .and_then(|value| value.trim().parse::<i64>().ok());
    (submission.text.clone(), group)
}

async fn read_submission(
    state: &HttpState,
    request: Request<Body>,
) -> Result<PostSubmission, Response> {
    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(IntoResponse::into_response)?;

    let mut submission = PostSubmission::default();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                let status = err.status();
                error!(
                    target = SOURCE,
                    status = status.as_u16(),
                    error = %err,
                    "failed to read multipart payload"
                );
                return Err(HttpError::new(
                    SOURCE,
                    status,
                    "Request could not be processed",
                    err.to_string(),
                )
                .into_response());
            }
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("text") => submission.text = field_text(field).await?,
            Some("group") => {
                let value = field_text(field).await?;
                submission.group = Some(value).filter(|value| !value.trim().is_empty());
            }
            Some("image") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|err| {
                    HttpError::new(
                        SOURCE,
                        err.status(),
                        "Request could not be processed",
                        err.to_string(),
                    )
                    .into_response()
                })?;
                submission.image = Some(ImageUpload { filename, bytes });
            }
            _ => {}
        }
    }

    Ok(submission)
}

async fn field_text(field: axum_extra::extract::multipart::Field) -> Result<String, Response> {
    field.text().await.map_err(|err| {
        HttpError::new(
            SOURCE,
            err.status(),
            "Request could not be processed",
            err.to_string(),
        )
        .into_response()
    })
}
