use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{FollowsRepo, RepoError, UserRef, UsersRepo};
use crate::domain::entities::UserRecord;

const SOURCE: &str = "quillpost::application::follows";

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("author not found")]
    UnknownAuthor,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Created,
    AlreadyFollowing,
    SelfFollowIgnored,
    Removed(u64),
}

#[derive(Clone)]
pub struct FollowService {
    follows: Arc<dyn FollowsRepo>,
    users: Arc<dyn UsersRepo>,
}

impl FollowService {
    pub fn new(follows: Arc<dyn FollowsRepo>, users: Arc<dyn UsersRepo>) -> Self {
        Self { follows, users }
    }

    /// Record that `viewer` follows `username`.
    ///
    /// The existence check and the insert are separate statements, so two
    /// concurrent requests may both insert.
    pub async fn follow(
        &self,
        viewer: &UserRef,
        username: &str,
    ) -> Result<(UserRecord, FollowOutcome), FollowError> {
        let author = self.author(username).await?;
        if author.id == viewer.id {
            return Ok((author, FollowOutcome::SelfFollowIgnored));
        }

        if self.follows.is_following(viewer.id, author.id).await? {
            return Ok((author, FollowOutcome::AlreadyFollowing));
        }

        self.follows.create_follow(viewer.id, author.id).await?;
        info!(
            target = SOURCE,
            follower = %viewer.username,
            author = %author.username,
            "follow created"
        );
        Ok((author, FollowOutcome::Created))
    }

    /// Remove every follow row from `viewer` to `username`.
    pub async fn unfollow(
        &self,
        viewer: &UserRef,
        username: &str,
    ) -> Result<(UserRecord, FollowOutcome), FollowError> {
        let author = self.author(username).await?;
        let removed = self.follows.delete_follows(viewer.id, author.id).await?;
        if removed > 0 {
            info!(
                target = SOURCE,
                follower = %viewer.username,
                author = %author.username,
                removed,
                "follow removed"
            );
        }
        Ok((author, FollowOutcome::Removed(removed)))
    }

    async fn author(&self, username: &str) -> Result<UserRecord, FollowError> {
        self.users
            .find_user_by_username(username)
            .await?
            .ok_or(FollowError::UnknownAuthor)
    }
}
