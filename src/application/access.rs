//! Who may do what, and where they are sent when they may not.
//!
//! Every protected action first requires an authenticated actor; editing
//! additionally requires ownership. The anonymous check never looks at the
//! target record, so unknown ids still redirect to login.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::application::repos::UserRef;
use crate::domain::entities::PostRecord;

pub const LOGIN_PATH: &str = "/auth/login/";

/// Characters left literal in the `next` parameter.
const NEXT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreatePost,
    EditPost,
    AddComment,
    Follow,
    Unfollow,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::CreatePost => "create_post",
            Action::EditPost => "edit_post",
            Action::AddComment => "add_comment",
            Action::Follow => "follow",
            Action::Unfollow => "unfollow",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Actor {
    #[default]
    Anonymous,
    Authenticated(UserRef),
}

impl Actor {
    pub fn user(&self) -> Option<&UserRef> {
        match self {
            Actor::Anonymous => None,
            Actor::Authenticated(user) => Some(user),
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user().map(|user| user.id)
    }
}

impl From<Option<UserRef>> for Actor {
    fn from(user: Option<UserRef>) -> Self {
        user.map_or(Actor::Anonymous, Actor::Authenticated)
    }
}

/// Why a request was turned away. Both outcomes are plain redirects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    Login { next: String },
    PostDetail { post_id: i64 },
}

impl Denial {
    pub fn location(&self) -> String {
        match self {
            Denial::Login { next } => login_redirect(next),
            Denial::PostDetail { post_id } => post_detail_path(*post_id),
        }
    }
}

/// Gate for every protected action. `path` is the request path to resume.
pub fn require_login<'a>(
    actor: &'a Actor,
    action: Action,
    path: &str,
) -> Result<&'a UserRef, Denial> {
    match actor {
        Actor::Authenticated(user) => Ok(user),
        Actor::Anonymous => {
            tracing::debug!(
                target = "quillpost::access",
                action = action.as_str(),
                path,
                "anonymous actor redirected to login"
            );
            Err(Denial::Login {
                next: path.to_string(),
            })
        }
    }
}

/// Second gate for edits: non-owners go back to the post without comment.
pub fn require_owner(user: &UserRef, post: &PostRecord) -> Result<(), Denial> {
    if post.author_id == user.id {
        Ok(())
    } else {
        Err(Denial::PostDetail { post_id: post.id })
    }
}

pub fn login_redirect(next: &str) -> String {
    format!(
        "{LOGIN_PATH}?next={}",
        utf8_percent_encode(next, NEXT_ENCODE_SET)
    )
}

/// Accept only local absolute paths as post-login targets.
pub fn safe_next(next: Option<&str>) -> Option<String> {
    let next = next?.trim();
    let local = next.starts_with('/') && !next.starts_with("//") && !next.contains('\\');
    local.then(|| next.to_string())
}

pub fn post_detail_path(post_id: i64) -> String {
    format!("/posts/{post_id}/")
}

pub fn profile_path(username: &str) -> String {
    format!("/profile/{}/", utf8_percent_encode(username, NEXT_ENCODE_SET))
}
