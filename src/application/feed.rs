//! Builds the view models for every public listing and the post detail page.

use std::sync::Arc;

use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339, macros::format_description};

use crate::application::access::{Actor, post_detail_path, profile_path};
use crate::application::forms::FormErrors;
use crate::application::pagination::{Page, Paginator};
use crate::application::posts::{LookupError, PostQueries, PostSequence};
use crate::application::repos::{
    CommentListing, CommentsRepo, FollowsRepo, PostListScope, PostListing, PostsRepo, RepoError,
    UserRef,
};
use crate::domain::entities::{GroupRecord, PostRecord};
use crate::presentation::views::{
    CommentFormView, CommentView, FollowControl, GroupBadge, GroupOptionView, GroupPageView,
    PaginatorView, PostCard, PostDetailView, PostFormView, PostListView, ProfileView,
};

pub const MEDIA_PREFIX: &str = "/media/";

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<LookupError> for FeedError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::NotFound { entity } => FeedError::NotFound { entity },
            LookupError::Repo(err) => FeedError::Repo(err),
        }
    }
}

/// Comment form contents to show again after a rejected submission.
#[derive(Debug, Clone, Default)]
pub struct CommentDraft {
    pub text: String,
    pub errors: FormErrors,
}

#[derive(Clone)]
pub struct FeedService {
    queries: PostQueries,
    posts: Arc<dyn PostsRepo>,
    comments: Arc<dyn CommentsRepo>,
    follows: Arc<dyn FollowsRepo>,
    paginator: Paginator,
}

impl FeedService {
    pub fn new(
        queries: PostQueries,
        posts: Arc<dyn PostsRepo>,
        comments: Arc<dyn CommentsRepo>,
        follows: Arc<dyn FollowsRepo>,
        paginator: Paginator,
    ) -> Self {
        Self {
            queries,
            posts,
            comments,
            follows,
            paginator,
        }
    }

    pub fn queries(&self) -> &PostQueries {
        &self.queries
    }

    pub async fn index(&self, page: Option<&str>) -> Result<PostListView, FeedError> {
        self.listing(&self.queries.list_all(), page, "/").await
    }

    pub async fn group(&self, slug: &str, page: Option<&str>) -> Result<GroupPageView, FeedError> {
        let (group, sequence) = self.queries.list_by_group(slug).await?;
        let base = format!("/group/{}/", group.slug);
        let listing = self.listing(&sequence, page, &base).await?;

        Ok(GroupPageView {
            title: group.title,
            slug: group.slug,
            description: group.description,
            listing,
        })
    }

    pub async fn profile(
        &self,
        username: &str,
        viewer: &Actor,
        page: Option<&str>,
    ) -> Result<ProfileView, FeedError> {
        let (author, sequence) = self.queries.list_by_author(username).await?;
        let base = profile_path(&author.username);
        let paged = self.paginator.paginate(&sequence, page).await?;
        let post_count = paged.total;

        let follow = match viewer.user() {
            Some(user) if user.id != author.id => {
                if self.follows.is_following(user.id, author.id).await? {
                    FollowControl::Unfollow {
                        href: format!("{base}unfollow/"),
                    }
                } else {
                    FollowControl::Follow {
                        href: format!("{base}follow/"),
                    }
                }
            }
            _ => FollowControl::Hidden,
        };

        Ok(ProfileView {
            username: author.username,
            post_count,
            follow,
            listing: build_listing(paged, &base),
        })
    }

    /// Posts by the authors `viewer` follows. Following nobody yields an
    /// empty page without querying posts.
    pub async fn follow_index(
        &self,
        viewer: &UserRef,
        page: Option<&str>,
    ) -> Result<PostListView, FeedError> {
        let sequence = self.queries.list_by_followed(viewer.id).await?;
        self.listing(&sequence, page, "/follow/").await
    }

    pub async fn post_detail(
        &self,
        id: i64,
        viewer: &Actor,
        draft: Option<CommentDraft>,
    ) -> Result<PostDetailView, FeedError> {
        let listing = self.queries.find(id).await?;
        let author_post_count = self
            .posts
            .count_posts(&PostListScope::Author(listing.author.id))
            .await?;
        let comments = self
            .comments
            .list_comments(id)
            .await?
            .into_iter()
            .map(comment_view)
            .collect();

        let edit_href = (viewer.user_id() == Some(listing.post.author_id))
            .then(|| format!("{}edit/", post_detail_path(id)));

        let comment_form = viewer.user().map(|_| {
            let draft = draft.unwrap_or_default();
            CommentFormView {
                action: format!("{}comment/", post_detail_path(id)),
                text: draft.text,
                errors: draft.errors.for_field("text"),
            }
        });

        Ok(PostDetailView {
            post: post_card(listing),
            author_post_count,
            edit_href,
            comments,
            comment_form,
        })
    }

    /// Blank or prefilled form for creating (`existing == None`) or editing.
    pub async fn post_form(
        &self,
        existing: Option<&PostRecord>,
        text: Option<String>,
        group: Option<i64>,
    ) -> Result<PostFormView, FeedError> {
        let groups = self.queries.groups().await?;
        let selected = match existing {
            Some(post) if text.is_none() => post.group_id,
            _ => group,
        };
        let text = text
            .or_else(|| existing.map(|post| post.text.clone()))
            .unwrap_or_default();

        let (is_edit, action) = match existing {
            Some(post) => (true, format!("{}edit/", post_detail_path(post.id))),
            None => (false, "/create/".to_string()),
        };

        Ok(PostFormView {
            is_edit,
            action,
            text,
            groups: group_options(&groups, selected),
            current_image: existing
                .and_then(|post| post.image.as_deref())
                .map(media_url),
            text_errors: Vec::new(),
            group_errors: Vec::new(),
            image_errors: Vec::new(),
            non_field_errors: Vec::new(),
        })
    }

    async fn listing(
        &self,
        sequence: &PostSequence,
        page: Option<&str>,
        base: &str,
    ) -> Result<PostListView, FeedError> {
        let paged = self.paginator.paginate(sequence, page).await?;
        Ok(build_listing(paged, base))
    }
}

fn build_listing(page: Page<PostListing>, base: &str) -> PostListView {
    let paginator = PaginatorView::build(&page, base);
    PostListView {
        posts: page.items.into_iter().map(post_card).collect(),
        paginator,
    }
}

fn group_options(groups: &[GroupRecord], selected: Option<i64>) -> Vec<GroupOptionView> {
    groups
        .iter()
        .map(|group| GroupOptionView {
            id: group.id,
            title: group.title.clone(),
            is_selected: selected == Some(group.id),
        })
        .collect()
}

pub fn post_card(listing: PostListing) -> PostCard {
    let PostListing {
        post,
        author,
        group,
    } = listing;

    PostCard {
        id: post.id,
        detail_href: post_detail_path(post.id),
        author_href: profile_path(&author.username),
        author: author.username,
        published: human_date(post.pub_date),
        iso_date: post.pub_date.format(&Rfc3339).unwrap_or_default(),
        group: group.map(|group| GroupBadge {
            href: format!("/group/{}/", group.slug),
            title: group.title,
        }),
        image_url: post.image.as_deref().map(media_url),
        text: post.text,
    }
}

fn comment_view(listing: CommentListing) -> CommentView {
    CommentView {
        author_href: listing
            .author
            .as_ref()
            .map(|author| profile_path(&author.username)),
        author: listing.author.map(|author| author.username),
        text: listing.comment.text,
        created: human_date(listing.comment.created),
    }
}

pub fn media_url(stored_path: &str) -> String {
    format!("{MEDIA_PREFIX}{stored_path}")
}

/// "14 October 2026".
pub fn human_date(timestamp: OffsetDateTime) -> String {
    let format = format_description!("[day padding:none] [month repr:long] [year]");
    timestamp
        .format(format)
        .unwrap_or_else(|_| timestamp.date().to_string())
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::application::repos::GroupRef;

    #[test]
    fn human_dates_spell_out_the_month() {
        assert_eq!(human_date(datetime!(2026-10-04 12:00 UTC)), "4 October 2026");
    }

    #[test]
    fn post_cards_link_author_group_and_image() {
        let card = post_card(PostListing {
            post: PostRecord {
                id: 7,
                text: "hello".to_string(),
                pub_date: datetime!(2026-01-02 03:04 UTC),
                author_id: 1,
                group_id: Some(3),
                image: Some("posts/abc-cat.gif".to_string()),
            },
            author: UserRef {
                id: 1,
                username: "leo".to_string(),
            },
            group: Some(GroupRef {
                id: 3,
                title: "Cats".to_string(),
                slug: "cats".to_string(),
            }),
        });

        assert_eq!(card.detail_href, "/posts/7/");
        assert_eq!(card.author_href, "/profile/leo/");
        assert_eq!(card.group.map(|group| group.href).as_deref(), Some("/group/cats/"));
        assert_eq!(card.image_url.as_deref(), Some("/media/posts/abc-cat.gif"));
        assert_eq!(card.iso_date, "2026-01-02T03:04:00Z");
    }
}
