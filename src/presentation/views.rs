use crate::application::error::{ErrorReport, HttpError};
use crate::application::forms::FormErrors;
use crate::application::pagination::Page;
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let content = ErrorPageView::not_found();
    let view = LayoutContext::new(chrome, content);
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

#[derive(Clone)]
pub struct NavigationView {
    pub entries: Vec<NavigationLinkView>,
}

#[derive(Clone)]
pub struct BrandView {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct NavigationLinkView {
    pub label: String,
    pub href: String,
    pub is_active: bool,
}

#[derive(Clone)]
pub struct FooterView {
    pub copy: String,
}

#[derive(Clone)]
pub struct LayoutChrome {
    pub brand: BrandView,
    pub navigation: NavigationView,
    pub footer: FooterView,
    pub meta: PageMetaView,
    /// Username shown in the header for signed-in viewers.
    pub viewer: Option<String>,
}

impl LayoutChrome {
    pub fn with_title(self, title: impl Into<String>) -> Self {
        Self {
            meta: self.meta.with_title(title),
            ..self
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub brand: BrandView,
    pub navigation: NavigationView,
    pub footer: FooterView,
    pub meta: PageMetaView,
    pub viewer: Option<String>,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            brand: chrome.brand,
            navigation: chrome.navigation,
            footer: chrome.footer,
            meta: chrome.meta,
            viewer: chrome.viewer,
            content,
        }
    }
}

#[derive(Clone)]
pub struct PageMetaView {
    pub title: String,
    pub description: String,
}

impl PageMetaView {
    pub fn with_title(self, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..self
        }
    }
}

#[derive(Clone)]
pub struct GroupBadge {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct PostCard {
    pub id: i64,
    pub text: String,
    pub author: String,
    pub author_href: String,
    pub published: String,
    pub iso_date: String,
    pub group: Option<GroupBadge>,
    pub image_url: Option<String>,
    pub detail_href: String,
}

#[derive(Clone)]
pub struct PageLinkView {
    pub number: u32,
    pub href: String,
    pub is_current: bool,
}

#[derive(Clone)]
pub struct PaginatorView {
    pub number: u32,
    pub num_pages: u32,
    pub previous_href: Option<String>,
    pub next_href: Option<String>,
    pub pages: Vec<PageLinkView>,
}

/// Numbered links shown on each side of the current page.
const PAGE_LINK_RADIUS: u32 = 3;

impl PaginatorView {
    pub fn build<T>(page: &Page<T>, base_path: &str) -> Self {
        let href = |number: u32| format!("{base_path}?page={number}");
        let first = page.number.saturating_sub(PAGE_LINK_RADIUS).max(1);
        let last = page.number.saturating_add(PAGE_LINK_RADIUS).min(page.num_pages);
        Self {
            number: page.number,
            num_pages: page.num_pages,
            previous_href: page.previous_number().map(href),
            next_href: page.next_number().map(href),
            pages: (first..=last)
                .map(|number| PageLinkView {
                    number,
                    href: href(number),
                    is_current: number == page.number,
                })
                .collect(),
        }
    }

    pub fn is_paginated(&self) -> bool {
        self.num_pages > 1
    }
}

pub struct PostListView {
    pub posts: Vec<PostCard>,
    pub paginator: PaginatorView,
}

impl PostListView {
    pub fn has_results(&self) -> bool {
        !self.posts.is_empty()
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<PostListView>,
}

pub struct GroupPageView {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub listing: PostListView,
}

#[derive(Template)]
#[template(path = "group_list.html")]
pub struct GroupTemplate {
    pub view: LayoutContext<GroupPageView>,
}

pub enum FollowControl {
    Hidden,
    Follow { href: String },
    Unfollow { href: String },
}

impl FollowControl {
    pub fn href(&self) -> Option<&str> {
        match self {
            FollowControl::Hidden => None,
            FollowControl::Follow { href } | FollowControl::Unfollow { href } => Some(href),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FollowControl::Unfollow { .. } => "Unfollow",
            _ => "Follow",
        }
    }

    pub fn is_following(&self) -> bool {
        matches!(self, FollowControl::Unfollow { .. })
    }
}

pub struct ProfileView {
    pub username: String,
    pub post_count: u64,
    pub follow: FollowControl,
    pub listing: PostListView,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileView>,
}

#[derive(Template)]
#[template(path = "follow.html")]
pub struct FollowTemplate {
    pub view: LayoutContext<PostListView>,
}

pub struct CommentView {
    pub author: Option<String>,
    pub author_href: Option<String>,
    pub text: String,
    pub created: String,
}

pub struct CommentFormView {
    pub action: String,
    pub text: String,
    pub errors: Vec<String>,
}

pub struct PostDetailView {
    pub post: PostCard,
    pub author_post_count: u64,
    pub edit_href: Option<String>,
    pub comments: Vec<CommentView>,
    /// Present only for signed-in viewers.
    pub comment_form: Option<CommentFormView>,
}

#[derive(Template)]
#[template(path = "post_detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailView>,
}

pub struct GroupOptionView {
    pub id: i64,
    pub title: String,
    pub is_selected: bool,
}

/// Field values and messages for the create and edit forms.
pub struct PostFormView {
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOptionView>,
    pub current_image: Option<String>,
    pub text_errors: Vec<String>,
    pub group_errors: Vec<String>,
    pub image_errors: Vec<String>,
    pub non_field_errors: Vec<String>,
}

impl PostFormView {
    pub fn with_errors(self, errors: &FormErrors) -> Self {
        Self {
            text_errors: errors.for_field("text"),
            group_errors: errors.for_field("group"),
            image_errors: errors.for_field("image"),
            non_field_errors: errors.non_field(),
            ..self
        }
    }
}

#[derive(Template)]
#[template(path = "create_post.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormView>,
}

pub struct LoginView {
    pub username: String,
    pub next: Option<String>,
    pub username_errors: Vec<String>,
    pub password_errors: Vec<String>,
    pub non_field_errors: Vec<String>,
}

impl LoginView {
    pub fn new(username: impl Into<String>, next: Option<String>) -> Self {
        Self {
            username: username.into(),
            next,
            username_errors: Vec::new(),
            password_errors: Vec::new(),
            non_field_errors: Vec::new(),
        }
    }

    pub fn with_errors(self, errors: &FormErrors) -> Self {
        Self {
            username_errors: errors.for_field("username"),
            password_errors: errors.for_field("password"),
            non_field_errors: errors.non_field(),
            ..self
        }
    }
}

#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub view: LayoutContext<LoginView>,
}

pub struct SignupView {
    pub username: String,
    pub username_errors: Vec<String>,
    pub password1_errors: Vec<String>,
    pub password2_errors: Vec<String>,
}

impl SignupView {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            username_errors: Vec::new(),
            password1_errors: Vec::new(),
            password2_errors: Vec::new(),
        }
    }

    pub fn with_errors(self, errors: &FormErrors) -> Self {
        Self {
            username_errors: errors.for_field("username"),
            password1_errors: errors.for_field("password1"),
            password2_errors: errors.for_field("password2"),
            ..self
        }
    }
}

#[derive(Template)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub view: LayoutContext<SignupView>,
}

#[derive(Template)]
#[template(path = "auth/logged_out.html")]
pub struct LoggedOutTemplate {
    pub view: LayoutContext<()>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
    pub primary_action: Option<ErrorAction>,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page Not Found".to_string(),
            message: "The page you requested does not exist.".to_string(),
            primary_action: Some(ErrorAction::home()),
        }
    }
}

pub struct ErrorAction {
    pub href: String,
    pub label: String,
}

impl ErrorAction {
    pub fn home() -> Self {
        Self {
            href: "/".to_string(),
            label: "Back to home".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}
