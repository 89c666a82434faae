use time::OffsetDateTime;

use crate::application::repos::{GroupRef, PostListing, UserRef};
use crate::domain::entities::PostRecord;

pub(super) const POST_COLUMNS: &str = "id, text, pub_date, author_id, group_id, image";

pub(super) const LISTING_SELECT: &str = "SELECT p.id, p.text, p.pub_date, p.author_id, \
     p.group_id, p.image, u.username AS author_username, \
     g.title AS group_title, g.slug AS group_slug \
     FROM posts p \
     INNER JOIN users u ON u.id = p.author_id \
     LEFT JOIN groups g ON g.id = p.group_id \
     WHERE 1=1 ";

#[derive(sqlx::FromRow)]
pub(super) struct PostRow {
    pub id: i64,
    pub text: String,
    pub pub_date: OffsetDateTime,
    pub author_id: i64,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            text: row.text,
            pub_date: row.pub_date,
            author_id: row.author_id,
            group_id: row.group_id,
            image: row.image,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct PostListingRow {
    pub id: i64,
    pub text: String,
    pub pub_date: OffsetDateTime,
    pub author_id: i64,
    pub group_id: Option<i64>,
    pub image: Option<String>,
    pub author_username: String,
    pub group_title: Option<String>,
    pub group_slug: Option<String>,
}

impl From<PostListingRow> for PostListing {
    fn from(row: PostListingRow) -> Self {
        let group = match (row.group_id, row.group_title, row.group_slug) {
            (Some(id), Some(title), Some(slug)) => Some(GroupRef { id, title, slug }),
            _ => None,
        };

        Self {
            author: UserRef {
                id: row.author_id,
                username: row.author_username,
            },
            group,
            post: PostRecord {
                id: row.id,
                text: row.text,
                pub_date: row.pub_date,
                author_id: row.author_id,
                group_id: row.group_id,
                image: row.image,
            },
        }
    }
}
