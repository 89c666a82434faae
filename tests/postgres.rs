use quillpost::{
    application::{
        pagination::PageWindow,
        repos::{
            CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams,
            CreateUserParams, FollowsRepo, GroupsRepo, PostListScope, PostsRepo, PostsWriteRepo,
            RepoError, UpdatePostParams, UsersRepo,
        },
    },
    domain::entities::{GroupRecord, PostRecord, UserRecord},
    infra::db::PostgresRepositories,
};
use sqlx::PgPool;

const FIRST_PAGE: PageWindow = PageWindow {
    offset: 0,
    limit: 10,
};

async fn seed_user(repos: &PostgresRepositories, username: &str) -> UserRecord {
    repos
        .create_user(CreateUserParams {
            username: username.to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
        })
        .await
        .expect("create user")
}

async fn seed_group(repos: &PostgresRepositories, slug: &str) -> GroupRecord {
    repos
        .create_group(CreateGroupParams {
            title: slug.to_uppercase(),
            slug: slug.to_string(),
            description: String::new(),
        })
        .await
        .expect("create group")
}

/// Insert a post dated `days_ago` days in the past.
async fn seed_post(
    repos: &PostgresRepositories,
    author: &UserRecord,
    group: Option<&GroupRecord>,
    text: &str,
    days_ago: i32,
) -> PostRecord {
    let post = repos
        .create_post(CreatePostParams {
            author_id: author.id,
            text: text.to_string(),
            group_id: group.map(|group| group.id),
            image: None,
        })
        .await
        .expect("create post");

    sqlx::query("UPDATE posts SET pub_date = now() - make_interval(days => $2) WHERE id = $1")
        .bind(post.id)
        .bind(days_ago)
        .execute(repos.pool())
        .await
        .expect("backdate post");

    post
}

async fn listed_texts(repos: &PostgresRepositories, scope: &PostListScope) -> Vec<String> {
    repos
        .list_posts(scope, FIRST_PAGE)
        .await
        .expect("list posts")
        .into_iter()
        .map(|listing| listing.post.text)
        .collect()
}

async fn row_count(repos: &PostgresRepositories, sql: &str) -> i64 {
    sqlx::query_scalar(sql)
        .fetch_one(repos.pool())
        .await
        .expect("count rows")
}

#[sqlx::test(migrations = "./migrations")]
async fn listings_respect_every_scope(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let leo = seed_user(&repos, "leo").await;
    let mia = seed_user(&repos, "mia").await;
    let max = seed_user(&repos, "max").await;
    let cats = seed_group(&repos, "cats").await;

    seed_post(&repos, &leo, Some(&cats), "leo in cats", 3).await;
    seed_post(&repos, &mia, None, "mia alone", 2).await;
    seed_post(&repos, &max, Some(&cats), "max in cats", 1).await;
    seed_post(&repos, &leo, None, "leo today", 0).await;

    assert_eq!(
        listed_texts(&repos, &PostListScope::All).await,
        ["leo today", "max in cats", "mia alone", "leo in cats"]
    );
    assert_eq!(repos.count_posts(&PostListScope::All).await, Ok(4));

    let group = PostListScope::Group(cats.id);
    assert_eq!(
        listed_texts(&repos, &group).await,
        ["max in cats", "leo in cats"]
    );
    assert_eq!(repos.count_posts(&group).await, Ok(2));

    let author = PostListScope::Author(leo.id);
    assert_eq!(
        listed_texts(&repos, &author).await,
        ["leo today", "leo in cats"]
    );
    assert_eq!(repos.count_posts(&author).await, Ok(2));

    // Duplicate ids, as duplicate follow rows produce, match each post once.
    let authors = PostListScope::Authors(vec![leo.id, mia.id, leo.id]);
    assert_eq!(
        listed_texts(&repos, &authors).await,
        ["leo today", "mia alone", "leo in cats"]
    );
    assert_eq!(repos.count_posts(&authors).await, Ok(3));

    let nobody = PostListScope::Authors(Vec::new());
    assert!(listed_texts(&repos, &nobody).await.is_empty());
    assert_eq!(repos.count_posts(&nobody).await, Ok(0));
}

#[sqlx::test(migrations = "./migrations")]
async fn listings_slice_by_window(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let leo = seed_user(&repos, "leo").await;
    for day in 0..13 {
        seed_post(&repos, &leo, None, &format!("post {day}"), day).await;
    }

    let second = PageWindow {
        offset: 10,
        limit: 10,
    };
    let listings = repos
        .list_posts(&PostListScope::All, second)
        .await
        .expect("second page");
    let texts: Vec<_> = listings.iter().map(|l| l.post.text.as_str()).collect();
    assert_eq!(texts, ["post 10", "post 11", "post 12"]);
}

#[sqlx::test(migrations = "./migrations")]
async fn update_without_image_keeps_the_stored_one(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let leo = seed_user(&repos, "leo").await;
    let cats = seed_group(&repos, "cats").await;
    let created = repos
        .create_post(CreatePostParams {
            author_id: leo.id,
            text: "before".to_string(),
            group_id: Some(cats.id),
            image: Some("posts/abc-cat.gif".to_string()),
        })
        .await
        .expect("create post");

    let updated = repos
        .update_post(UpdatePostParams {
            id: created.id,
            text: "after".to_string(),
            group_id: None,
            image: None,
        })
        .await
        .expect("update post");

    assert_eq!(updated.text, "after");
    assert_eq!(updated.group_id, None);
    assert_eq!(updated.image.as_deref(), Some("posts/abc-cat.gif"));
    assert_eq!(updated.pub_date, created.pub_date);

    let replaced = repos
        .update_post(UpdatePostParams {
            id: created.id,
            text: "after".to_string(),
            group_id: None,
            image: Some("posts/def-dog.png".to_string()),
        })
        .await
        .expect("replace image");
    assert_eq!(replaced.image.as_deref(), Some("posts/def-dog.png"));
}

#[sqlx::test(migrations = "./migrations")]
async fn updating_a_missing_post_is_not_found(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let result = repos
        .update_post(UpdatePostParams {
            id: 4242,
            text: "nothing".to_string(),
            group_id: None,
            image: None,
        })
        .await;
    assert_eq!(result, Err(RepoError::NotFound));
}

#[sqlx::test(migrations = "./migrations")]
async fn deleting_a_group_keeps_its_posts_ungrouped(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let leo = seed_user(&repos, "leo").await;
    let cats = seed_group(&repos, "cats").await;
    let post = seed_post(&repos, &leo, Some(&cats), "grouped", 0).await;

    sqlx::query("DELETE FROM groups WHERE id = $1")
        .bind(cats.id)
        .execute(repos.pool())
        .await
        .expect("delete group");

    let listing = repos
        .find_post(post.id)
        .await
        .expect("find post")
        .expect("post survives");
    assert_eq!(listing.post.group_id, None);
    assert_eq!(listing.group, None);
    assert_eq!(repos.count_posts(&PostListScope::Group(cats.id)).await, Ok(0));
}

#[sqlx::test(migrations = "./migrations")]
async fn deleting_a_post_removes_its_comments(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let leo = seed_user(&repos, "leo").await;
    let mia = seed_user(&repos, "mia").await;
    let doomed = seed_post(&repos, &leo, None, "doomed", 1).await;
    let kept = seed_post(&repos, &leo, None, "kept", 0).await;
    for post in [&doomed, &kept] {
        repos
            .create_comment(CreateCommentParams {
                post_id: post.id,
                author_id: mia.id,
                text: "nice".to_string(),
            })
            .await
            .expect("create comment");
    }

    sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(doomed.id)
        .execute(repos.pool())
        .await
        .expect("delete post");

    assert!(repos
        .list_comments(doomed.id)
        .await
        .expect("comments")
        .is_empty());
    assert_eq!(repos.list_comments(kept.id).await.expect("comments").len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn deleting_a_user_removes_their_content(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let leo = seed_user(&repos, "leo").await;
    let mia = seed_user(&repos, "mia").await;
    let post = seed_post(&repos, &mia, None, "by mia", 0).await;
    repos
        .create_comment(CreateCommentParams {
            post_id: post.id,
            author_id: leo.id,
            text: "from leo".to_string(),
        })
        .await
        .expect("create comment");
    repos.create_follow(mia.id, leo.id).await.expect("follow");
    repos.create_follow(leo.id, mia.id).await.expect("follow");

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(leo.id)
        .execute(repos.pool())
        .await
        .expect("delete user");

    assert!(repos
        .list_comments(post.id)
        .await
        .expect("comments")
        .is_empty());
    assert!(repos
        .followed_author_ids(mia.id)
        .await
        .expect("followed")
        .is_empty());
    assert_eq!(row_count(&repos, "SELECT COUNT(*) FROM follows").await, 0);
    assert_eq!(repos.count_posts(&PostListScope::Author(mia.id)).await, Ok(1));
}

#[sqlx::test(migrations = "./migrations")]
async fn missing_references_are_invalid_input(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let leo = seed_user(&repos, "leo").await;

    let follow = repos.create_follow(leo.id, 9_999).await;
    assert_eq!(
        follow.err(),
        Some(RepoError::InvalidInput {
            message: "follows.author_id points at a missing users row".to_string()
        })
    );

    let post = repos
        .create_post(CreatePostParams {
            author_id: leo.id,
            text: "lost".to_string(),
            group_id: Some(9_999),
            image: None,
        })
        .await;
    assert_eq!(
        post.err(),
        Some(RepoError::InvalidInput {
            message: "posts.group_id points at a missing groups row".to_string()
        })
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn duplicate_group_slug_reports_the_constraint(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    seed_group(&repos, "cats").await;

    let again = repos
        .create_group(CreateGroupParams {
            title: "Cats again".to_string(),
            slug: "cats".to_string(),
            description: String::new(),
        })
        .await;
    assert_eq!(
        again.err(),
        Some(RepoError::Duplicate {
            constraint: "groups_slug_key".to_string()
        })
    );
}
