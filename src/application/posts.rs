//! Post listings and the create/edit/comment workflows.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::forms::FormErrors;
use crate::application::pagination::{PageWindow, PagedSource};
use crate::application::repos::{
    CommentsRepo, CreateCommentParams, CreatePostParams, FollowsRepo, GroupsRepo, PostListScope,
    PostListing, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams, UserRef, UsersRepo,
};
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};
use crate::domain::posts::{
    invalid_group_choice, parse_group_choice, validate_comment_text, validate_post_text,
};
use crate::infra::uploads::{UploadStorage, UploadStorageError};

const SOURCE: &str = "quillpost::application::posts";
const INVALID_IMAGE_MESSAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

#[derive(Debug, Error)]
pub enum PostError {
    #[error("form submission is invalid")]
    Validation(FormErrors),
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Storage(#[from] UploadStorageError),
}

impl PostError {
    fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }
}

/// Failure to resolve a URL identity (group slug, username, post id).
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl LookupError {
    fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }
}

/// A lazily evaluated, newest-first run of posts.
///
/// Nothing touches the store until a paginator asks for a count or a window.
#[derive(Clone)]
pub struct PostSequence {
    repo: Arc<dyn PostsRepo>,
    scope: PostListScope,
}

impl PostSequence {
    pub fn new(repo: Arc<dyn PostsRepo>, scope: PostListScope) -> Self {
        Self { repo, scope }
    }
}

#[async_trait]
impl PagedSource for PostSequence {
    type Item = PostListing;

    async fn count(&self) -> Result<u64, RepoError> {
        if self.scope.is_empty() {
            return Ok(0);
        }
        self.repo.count_posts(&self.scope).await
    }

    async fn fetch(&self, window: PageWindow) -> Result<Vec<PostListing>, RepoError> {
        if self.scope.is_empty() {
            return Ok(Vec::new());
        }
        self.repo.list_posts(&self.scope, window).await
    }
}

/// Read side: resolves URL identities and hands back post sequences.
#[derive(Clone)]
pub struct PostQueries {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl PostQueries {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
        follows: Arc<dyn FollowsRepo>,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
            follows,
        }
    }

    pub fn list_all(&self) -> PostSequence {
        PostSequence::new(self.posts.clone(), PostListScope::All)
    }

    pub async fn list_by_group(
        &self,
        slug: &str,
    ) -> Result<(GroupRecord, PostSequence), LookupError> {
        let group = self
            .groups
            .find_group_by_slug(slug)
            .await?
            .ok_or_else(|| LookupError::not_found("group"))?;
        let sequence = PostSequence::new(self.posts.clone(), PostListScope::Group(group.id));
        Ok((group, sequence))
    }

    pub async fn list_by_author(
        &self,
        username: &str,
    ) -> Result<(UserRecord, PostSequence), LookupError> {
        let author = self
            .users
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| LookupError::not_found("user"))?;
        let sequence = PostSequence::new(self.posts.clone(), PostListScope::Author(author.id));
        Ok((author, sequence))
    }

    /// Posts by every author the viewer has a follow row for, including the
    /// viewer themself when such a row exists.
    pub async fn list_by_followed(&self, viewer_id: i64) -> Result<PostSequence, LookupError> {
        let mut authors = self.follows.followed_author_ids(viewer_id).await?;
        authors.sort_unstable();
        authors.dedup();
        Ok(PostSequence::new(
            self.posts.clone(),
            PostListScope::Authors(authors),
        ))
    }

    pub async fn find(&self, id: i64) -> Result<PostListing, LookupError> {
        self.posts
            .find_post(id)
            .await?
            .ok_or_else(|| LookupError::not_found("post"))
    }

    pub async fn groups(&self) -> Result<Vec<GroupRecord>, LookupError> {
        Ok(self.groups.list_groups().await?)
    }
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub bytes: Bytes,
}

/// Raw post form fields as submitted.
#[derive(Debug, Clone, Default)]
pub struct PostSubmission {
    pub text: String,
    pub group: Option<String>,
    pub image: Option<ImageUpload>,
}

struct CleanedPost {
    text: String,
    group_id: Option<i64>,
    image: Option<ImageUpload>,
}

/// Write side of posts and comments.
#[derive(Clone)]
pub struct PostService {
    reader: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    comments: Arc<dyn CommentsRepo>,
    storage: Arc<UploadStorage>,
}

impl PostService {
    pub fn new(
        reader: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        comments: Arc<dyn CommentsRepo>,
        storage: Arc<UploadStorage>,
    ) -> Self {
        Self {
            reader,
            writer,
            groups,
            comments,
            storage,
        }
    }

    pub async fn create(
        &self,
        author: &UserRef,
        submission: PostSubmission,
    ) -> Result<PostRecord, PostError> {
        let cleaned = self.clean(submission).await?;
        let image = self.store_image(cleaned.image).await?;

        let post = self
            .writer
            .create_post(CreatePostParams {
                author_id: author.id,
                text: cleaned.text,
                group_id: cleaned.group_id,
                image,
            })
            .await?;

        info!(
            target = SOURCE,
            post_id = post.id,
            author = %author.username,
            "post created"
        );
        Ok(post)
    }

    /// Apply an edit. Ownership is checked by the caller before this runs.
    pub async fn update(
        &self,
        post: &PostRecord,
        submission: PostSubmission,
    ) -> Result<PostRecord, PostError> {
        let cleaned = self.clean(submission).await?;
        let image = self.store_image(cleaned.image).await?;
        let replaced = image.as_ref().and(post.image.clone());

        let updated = self
            .writer
            .update_post(UpdatePostParams {
                id: post.id,
                text: cleaned.text,
                group_id: cleaned.group_id,
                image,
            })
            .await?;

        if let Some(previous) = replaced
            && let Err(err) = self.storage.delete(&previous).await
        {
            warn!(
                target = SOURCE,
                post_id = post.id,
                path = %previous,
                error = %err,
                "failed to remove replaced image"
            );
        }

        info!(target = SOURCE, post_id = post.id, "post updated");
        Ok(updated)
    }

    pub async fn add_comment(
        &self,
        author: &UserRef,
        post_id: i64,
        text: &str,
    ) -> Result<CommentRecord, PostError> {
        if self.reader.find_post(post_id).await?.is_none() {
            return Err(PostError::not_found("post"));
        }

        let text = validate_comment_text(text).map_err(|err| {
            let mut errors = FormErrors::new();
            errors.push(err);
            PostError::Validation(errors)
        })?;

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id,
                author_id: author.id,
                text,
            })
            .await?;

        info!(
            target = SOURCE,
            post_id,
            comment_id = comment.id,
            author = %author.username,
            "comment added"
        );
        Ok(comment)
    }

    async fn clean(&self, submission: PostSubmission) -> Result<CleanedPost, PostError> {
        let mut errors = FormErrors::new();

        let text = errors.collect(validate_post_text(&submission.text));

        let group_id = match errors.collect(parse_group_choice(submission.group.as_deref())) {
            Some(Some(id)) => {
                if self.groups.find_group_by_id(id).await?.is_none() {
                    errors.push(invalid_group_choice());
                }
                Some(id)
            }
            _ => None,
        };

        let image = submission
            .image
            .filter(|upload| !upload.bytes.is_empty() || !upload.filename.is_empty());
        if let Some(upload) = image.as_ref() {
            match self.storage.inspect_image(&upload.bytes) {
                Ok(_) => {}
                Err(UploadStorageError::TooLarge { limit }) => {
                    errors.add("image", format!("The image may not exceed {limit} bytes."));
                }
                Err(UploadStorageError::EmptyPayload) => {
                    errors.add("image", "The submitted file is empty.");
                }
                Err(UploadStorageError::NotAnImage { .. }) => {
                    errors.add("image", INVALID_IMAGE_MESSAGE);
                }
                Err(err) => return Err(err.into()),
            }
        }

        match text {
            Some(text) if errors.is_empty() => Ok(CleanedPost {
                text,
                group_id,
                image,
            }),
            _ => Err(PostError::Validation(errors)),
        }
    }

    async fn store_image(&self, image: Option<ImageUpload>) -> Result<Option<String>, PostError> {
        let Some(upload) = image else {
            return Ok(None);
        };
        let stored_path = self
            .storage
            .store_image(&upload.filename, upload.bytes)
            .await?;
        Ok(Some(stored_path))
    }
}
