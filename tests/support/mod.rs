//! Shared harness for router-level tests: an in-memory store that implements
//! every repository trait, plus helpers for driving the router.
#![allow(dead_code)]

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
    response::Response,
};
use http_body_util::BodyExt;
use quillpost::{
    application::{
        auth::{AuthService, AuthSettings},
        chrome::{ChromeService, SiteIdentity},
        feed::FeedService,
        follows::FollowService,
        pagination::{PageWindow, Paginator},
        posts::{PostQueries, PostService},
        repos::{
            CommentListing, CommentsRepo, CreateCommentParams, CreateGroupParams,
            CreatePostParams, CreateSessionParams, CreateUserParams, FollowsRepo, GroupRef,
            GroupsRepo, HealthRepo, PostListScope, PostListing, PostsRepo, PostsWriteRepo,
            RepoError, SessionsRepo, UpdatePostParams, UserRef, UsersRepo,
        },
    },
    cache::{IndexCacheState, ResponseCache},
    domain::entities::{
        CommentRecord, FollowRecord, GroupRecord, PostRecord, SessionRecord, UserRecord,
    },
    infra::{
        http::{HttpState, SESSION_COOKIE, build_router},
        uploads::UploadStorage,
    },
};
use tempfile::TempDir;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

/// 1x1 transparent GIF.
pub const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    users: Vec<UserRecord>,
    sessions: HashMap<Uuid, SessionRecord>,
    groups: Vec<GroupRecord>,
    posts: Vec<PostRecord>,
    comments: Vec<CommentRecord>,
    follows: Vec<FollowRecord>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn matches(post: &PostRecord, scope: &PostListScope) -> bool {
        match scope {
            PostListScope::All => true,
            PostListScope::Group(id) => post.group_id == Some(*id),
            PostListScope::Author(id) => post.author_id == *id,
            PostListScope::Authors(ids) => ids.contains(&post.author_id),
        }
    }

    fn listing(&self, post: &PostRecord) -> Option<PostListing> {
        let author = self.users.iter().find(|user| user.id == post.author_id)?;
        let group = post.group_id.and_then(|id| {
            self.groups
                .iter()
                .find(|group| group.id == id)
                .map(|group| GroupRef {
                    id: group.id,
                    title: group.title.clone(),
                    slug: group.slug.clone(),
                })
        });
        Some(PostListing {
            post: post.clone(),
            author: UserRef::from(author),
            group,
        })
    }

    fn scoped(&self, scope: &PostListScope) -> Vec<&PostRecord> {
        let mut posts: Vec<&PostRecord> = self
            .posts
            .iter()
            .filter(|post| Self::matches(post, scope))
            .collect();
        posts.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        posts
    }
}

/// In-memory stand-in for the Postgres adapter, with the same delete policies.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    post_queries: AtomicUsize,
}

impl MemoryStore {
    /// Number of `count_posts`/`list_posts` calls served so far.
    pub fn post_queries(&self) -> usize {
        self.post_queries.load(Ordering::SeqCst)
    }

    pub async fn add_user(&self, username: &str) -> UserRecord {
        let mut state = self.state.lock().await;
        let user = UserRecord {
            id: state.next_id(),
            username: username.to_string(),
            password_hash: String::new(),
            created_at: OffsetDateTime::now_utc(),
        };
        state.users.push(user.clone());
        user
    }

    pub async fn add_group(&self, title: &str, slug: &str) -> GroupRecord {
        let mut state = self.state.lock().await;
        let group = GroupRecord {
            id: state.next_id(),
            title: title.to_string(),
            slug: slug.to_string(),
            description: format!("About {title}"),
        };
        state.groups.push(group.clone());
        group
    }

    /// Insert a post published `age_minutes` ago.
    pub async fn add_post(
        &self,
        author: &UserRecord,
        text: &str,
        group: Option<&GroupRecord>,
        age_minutes: i64,
    ) -> PostRecord {
        let mut state = self.state.lock().await;
        let post = PostRecord {
            id: state.next_id(),
            text: text.to_string(),
            pub_date: OffsetDateTime::now_utc() - Duration::minutes(age_minutes),
            author_id: author.id,
            group_id: group.map(|group| group.id),
            image: None,
        };
        state.posts.push(post.clone());
        post
    }

    pub async fn add_follow(&self, user: &UserRecord, author: &UserRecord) {
        let mut state = self.state.lock().await;
        let follow = FollowRecord {
            id: state.next_id(),
            user_id: user.id,
            author_id: author.id,
        };
        state.follows.push(follow);
    }

    /// Remove a post and cascade to its comments.
    pub async fn remove_post(&self, id: i64) {
        let mut state = self.state.lock().await;
        state.posts.retain(|post| post.id != id);
        state.comments.retain(|comment| comment.post_id != Some(id));
    }

    pub async fn posts(&self) -> Vec<PostRecord> {
        self.state.lock().await.posts.clone()
    }

    pub async fn post(&self, id: i64) -> Option<PostRecord> {
        self.state
            .lock()
            .await
            .posts
            .iter()
            .find(|post| post.id == id)
            .cloned()
    }

    pub async fn comments(&self) -> Vec<CommentRecord> {
        self.state.lock().await.comments.clone()
    }

    pub async fn follow_count(&self, user: &UserRecord, author: &UserRecord) -> usize {
        self.state
            .lock()
            .await
            .follows
            .iter()
            .filter(|follow| follow.user_id == user.id && follow.author_id == author.id)
            .count()
    }

    pub async fn user(&self, username: &str) -> Option<UserRecord> {
        self.state
            .lock()
            .await
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned()
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn count_posts(&self, scope: &PostListScope) -> Result<u64, RepoError> {
        self.post_queries.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().await;
        Ok(state.scoped(scope).len() as u64)
    }

    async fn list_posts(
        &self,
        scope: &PostListScope,
        window: PageWindow,
    ) -> Result<Vec<PostListing>, RepoError> {
        self.post_queries.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().await;
        Ok(state
            .scoped(scope)
            .into_iter()
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .filter_map(|post| state.listing(post))
            .collect())
    }

    async fn find_post(&self, id: i64) -> Result<Option<PostListing>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .posts
            .iter()
            .find(|post| post.id == id)
            .and_then(|post| state.listing(post)))
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.state.lock().await;
        let post = PostRecord {
            id: state.next_id(),
            text: params.text,
            pub_date: OffsetDateTime::now_utc(),
            author_id: params.author_id,
            group_id: params.group_id,
            image: params.image,
        };
        state.posts.push(post.clone());
        Ok(post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.state.lock().await;
        let post = state
            .posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.text = params.text;
        post.group_id = params.group_id;
        if let Some(image) = params.image {
            post.image = Some(image);
        }
        Ok(post.clone())
    }
}

#[async_trait]
impl GroupsRepo for MemoryStore {
    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let mut groups = self.state.lock().await.groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.groups.iter().find(|group| group.slug == slug).cloned())
    }

    async fn find_group_by_id(&self, id: i64) -> Result<Option<GroupRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.groups.iter().find(|group| group.id == id).cloned())
    }

    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut state = self.state.lock().await;
        if state.groups.iter().any(|group| group.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "groups_slug_key".to_string(),
            });
        }
        let group = GroupRecord {
            id: state.next_id(),
            title: params.title,
            slug: params.slug,
            description: params.description,
        };
        state.groups.push(group.clone());
        Ok(group)
    }
}

#[async_trait]
impl CommentsRepo for MemoryStore {
    async fn list_comments(&self, post_id: i64) -> Result<Vec<CommentListing>, RepoError> {
        let state = self.state.lock().await;
        let mut comments: Vec<CommentListing> = state
            .comments
            .iter()
            .filter(|comment| comment.post_id == Some(post_id))
            .map(|comment| CommentListing {
                comment: comment.clone(),
                author: comment.author_id.and_then(|id| {
                    state
                        .users
                        .iter()
                        .find(|user| user.id == id)
                        .map(UserRef::from)
                }),
            })
            .collect();
        comments.sort_by(|a, b| {
            a.comment
                .created
                .cmp(&b.comment.created)
                .then(a.comment.id.cmp(&b.comment.id))
        });
        Ok(comments)
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut state = self.state.lock().await;
        let comment = CommentRecord {
            id: state.next_id(),
            post_id: Some(params.post_id),
            author_id: Some(params.author_id),
            text: params.text,
            created: OffsetDateTime::now_utc(),
        };
        state.comments.push(comment.clone());
        Ok(comment)
    }
}

#[async_trait]
impl FollowsRepo for MemoryStore {
    async fn followed_author_ids(&self, user_id: i64) -> Result<Vec<i64>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .follows
            .iter()
            .filter(|follow| follow.user_id == user_id)
            .map(|follow| follow.author_id)
            .collect())
    }

    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .follows
            .iter()
            .any(|follow| follow.user_id == user_id && follow.author_id == author_id))
    }

    async fn create_follow(
        &self,
        user_id: i64,
        author_id: i64,
    ) -> Result<FollowRecord, RepoError> {
        let mut state = self.state.lock().await;
        let follow = FollowRecord {
            id: state.next_id(),
            user_id,
            author_id,
        };
        state.follows.push(follow.clone());
        Ok(follow)
    }

    async fn delete_follows(&self, user_id: i64, author_id: i64) -> Result<u64, RepoError> {
        let mut state = self.state.lock().await;
        let before = state.follows.len();
        state
            .follows
            .retain(|follow| !(follow.user_id == user_id && follow.author_id == author_id));
        Ok((before - state.follows.len()) as u64)
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn find_user_by_id(&self, id: i64) -> Result<Option<UserRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|user| user.id == id).cloned())
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut state = self.state.lock().await;
        if state.users.iter().any(|user| user.username == params.username) {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }
        let user = UserRecord {
            id: state.next_id(),
            username: params.username,
            password_hash: params.password_hash,
            created_at: OffsetDateTime::now_utc(),
        };
        state.users.push(user.clone());
        Ok(user)
    }
}

#[async_trait]
impl SessionsRepo for MemoryStore {
    async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<SessionRecord, RepoError> {
        let mut state = self.state.lock().await;
        let session = SessionRecord {
            id: params.id,
            user_id: params.user_id,
            secret_hash: params.secret_hash,
            created_at: OffsetDateTime::now_utc(),
            expires_at: params.expires_at,
        };
        state.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<SessionRecord>, RepoError> {
        Ok(self.state.lock().await.sessions.get(&id).cloned())
    }

    async fn delete_session(&self, id: Uuid) -> Result<(), RepoError> {
        self.state.lock().await.sessions.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl HealthRepo for MemoryStore {
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

/// A router wired to a fresh [`MemoryStore`] and a temporary uploads root.
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub state: HttpState,
    pub cache: Arc<ResponseCache>,
    router: Router,
    _uploads: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::default());
        let uploads = tempfile::tempdir().expect("temp uploads dir");
        let upload_storage = Arc::new(
            UploadStorage::new(uploads.path().to_path_buf(), 1024 * 1024)
                .expect("upload storage"),
        );

        let posts_repo: Arc<dyn PostsRepo> = store.clone();
        let groups_repo: Arc<dyn GroupsRepo> = store.clone();
        let users_repo: Arc<dyn UsersRepo> = store.clone();
        let follows_repo: Arc<dyn FollowsRepo> = store.clone();
        let comments_repo: Arc<dyn CommentsRepo> = store.clone();

        let queries = PostQueries::new(
            posts_repo.clone(),
            groups_repo.clone(),
            users_repo.clone(),
            follows_repo.clone(),
        );
        let feed = Arc::new(FeedService::new(
            queries,
            posts_repo.clone(),
            comments_repo.clone(),
            follows_repo.clone(),
            Paginator::default(),
        ));
        let posts = Arc::new(PostService::new(
            posts_repo,
            store.clone(),
            groups_repo,
            comments_repo,
            upload_storage.clone(),
        ));
        let follows = Arc::new(FollowService::new(follows_repo, users_repo.clone()));
        let auth = Arc::new(
            AuthService::new(
                users_repo,
                store.clone(),
                AuthSettings {
                    session_ttl: Duration::hours(1),
                    argon2_memory_kib: 8,
                    argon2_iterations: 1,
                },
            )
            .expect("auth service"),
        );
        let chrome = Arc::new(ChromeService::new(SiteIdentity {
            title: "Quillpost".to_string(),
            description: "Test site".to_string(),
            footer_copy: "© Quillpost".to_string(),
        }));

        let cache = Arc::new(ResponseCache::new(
            NonZeroUsize::new(64).expect("non-zero"),
        ));
        let state = HttpState {
            feed,
            posts,
            follows,
            auth,
            chrome,
            health: store.clone(),
            upload_storage,
            index_cache: IndexCacheState {
                cache: cache.clone(),
                ttl: StdDuration::from_secs(20),
                session_cookie: SESSION_COOKIE,
            },
            upload_body_limit: 2 * 1024 * 1024,
            secure_cookies: false,
        };

        Self {
            router: build_router(state.clone()),
            store,
            state,
            cache,
            _uploads: uploads,
        }
    }

    /// Create `username` and return a `Cookie` header value for a live session.
    pub async fn sign_in(&self, username: &str) -> (UserRecord, String) {
        let user = match self.store.user(username).await {
            Some(user) => user,
            None => self.store.add_user(username).await,
        };
        let session = self
            .state
            .auth
            .open_session(&user)
            .await
            .expect("open session");
        (user, format!("{SESSION_COOKIE}={}", session.token))
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router response")
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).expect("request"))
            .await
    }

    pub async fn post_form(&self, path: &str, body: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).expect("request"))
            .await
    }

    pub async fn post_multipart(
        &self,
        path: &str,
        form: Multipart,
        cookie: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, form.content_type());
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(form.finish())).expect("request"))
            .await
    }
}

/// Minimal `multipart/form-data` body builder.
pub struct Multipart {
    boundary: String,
    body: Vec<u8>,
}

impl Multipart {
    pub fn new() -> Self {
        Self {
            boundary: format!("quillpost-{}", Uuid::new_v4().simple()),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        self.body
    }
}

pub async fn body_text(response: Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

pub fn location(response: &Response) -> Option<String> {
    header_value(response.headers(), header::LOCATION.as_str())
}

pub fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

pub fn assert_redirect(response: &Response, expected: &str) {
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(response).as_deref(), Some(expected));
}

/// Number of post cards rendered in a listing page.
pub fn card_count(html: &str) -> usize {
    html.matches("class=\"post-card\"").count()
}
