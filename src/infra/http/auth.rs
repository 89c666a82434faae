use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use crate::{
    application::{
        access::{Actor, safe_next},
        auth::{AuthError, LoginForm, SignupForm},
        error::HttpError,
    },
    presentation::views::{
        LayoutContext, LoggedOutTemplate, LoginTemplate, LoginView, SignupTemplate, SignupView,
        render_template_response,
    },
};

use super::{
    found,
    public::HttpState,
    session::{SESSION_COOKIE, Viewer, removal_cookie, session_cookie},
};

const LOGIN_PATH: &str = "/auth/login/";
const SIGNUP_PATH: &str = "/auth/signup/";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct NextQuery {
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct LoginPayload {
    username: String,
    password: String,
    next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct SignupPayload {
    username: String,
    password1: String,
    password2: String,
}

pub(super) async fn login_form(
    State(state): State<HttpState>,
    Viewer(actor): Viewer,
    Query(query): Query<NextQuery>,
) -> Response {
    render_login(
        &state,
        &actor,
        LoginView::new("", safe_next(query.next.as_deref())),
    )
}

pub(super) async fn login_submit(
    State(state): State<HttpState>,
    Viewer(actor): Viewer,
    jar: CookieJar,
    Form(payload): Form<LoginPayload>,
) -> Response {
    let next = safe_next(payload.next.as_deref());
    let form = LoginForm {
        username: payload.username.clone(),
        password: payload.password,
    };

    let user = match state.auth.login(form).await {
        Ok(user) => user,
        Err(AuthError::Validation(errors)) => {
            let view = LoginView::new(payload.username, next).with_errors(&errors);
            return render_login(&state, &actor, view);
        }
        Err(err) => return HttpError::from(err).into_response(),
    };

    match state.auth.open_session(&user).await {
        Ok(session) => {
            let jar = jar.add(session_cookie(&session, state.secure_cookies));
            let target = next.unwrap_or_else(|| "/".to_string());
            (jar, found(&target)).into_response()
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn signup_form(State(state): State<HttpState>, Viewer(actor): Viewer) -> Response {
    render_signup(&state, &actor, SignupView::new(""))
}

/// Create the account and sign it straight in.
pub(super) async fn signup_submit(
    State(state): State<HttpState>,
    Viewer(actor): Viewer,
    jar: CookieJar,
    Form(payload): Form<SignupPayload>,
) -> Response {
    let form = SignupForm {
        username: payload.username.clone(),
        password1: payload.password1,
        password2: payload.password2,
    };

    let user = match state.auth.signup(form).await {
        Ok(user) => user,
        Err(AuthError::Validation(errors)) => {
            let view = SignupView::new(payload.username).with_errors(&errors);
            return render_signup(&state, &actor, view);
        }
        Err(err) => return HttpError::from(err).into_response(),
    };

    match state.auth.open_session(&user).await {
        Ok(session) => {
            let jar = jar.add(session_cookie(&session, state.secure_cookies));
            (jar, found("/")).into_response()
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn logout(State(state): State<HttpState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE)
        && let Err(err) = state.auth.logout(cookie.value()).await
    {
        return HttpError::from(err).into_response();
    }

    let chrome = state
        .chrome_for(&Actor::Anonymous, "/auth/logout/")
        .with_title("Logged out");
    let page = render_template_response(
        LoggedOutTemplate {
            view: LayoutContext::new(chrome, ()),
        },
        StatusCode::OK,
    );
    (jar.remove(removal_cookie()), page).into_response()
}

fn render_login(state: &HttpState, actor: &Actor, view: LoginView) -> Response {
    let chrome = state.chrome_for(actor, LOGIN_PATH).with_title("Log in");
    render_template_response(
        LoginTemplate {
            view: LayoutContext::new(chrome, view),
        },
        StatusCode::OK,
    )
}

fn render_signup(state: &HttpState, actor: &Actor, view: SignupView) -> Response {
    let chrome = state.chrome_for(actor, SIGNUP_PATH).with_title("Sign up");
    render_template_response(
        SignupTemplate {
            view: LayoutContext::new(chrome, view),
        },
        StatusCode::OK,
    )
}
