use std::{process, sync::Arc, time::Duration};

use quillpost::{
    application::{
        auth::{AuthService, AuthSettings},
        chrome::{ChromeService, SiteIdentity},
        error::AppError,
        feed::FeedService,
        follows::FollowService,
        pagination::Paginator,
        posts::{PostQueries, PostService},
        repos::{
            CommentsRepo, CreateGroupParams, FollowsRepo, GroupsRepo, HealthRepo, PostsRepo,
            PostsWriteRepo, SessionsRepo, UsersRepo,
        },
    },
    cache::{IndexCacheState, ResponseCache},
    config,
    domain::{
        posts::validate_group_title,
        slug::{generate_unique_slug, validate_slug},
    },
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState, SESSION_COOKIE},
        telemetry,
        uploads::UploadStorage,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
        config::Command::CreateGroup(args) => run_create_group(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings, true).await?;
    let state = build_http_state(repositories, &settings)?;
    serve_http(&settings, state).await
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    init_repositories(&settings, true).await?;
    info!(target = "quillpost::migrate", "Migrations applied");
    Ok(())
}

async fn run_create_group(
    settings: config::Settings,
    args: config::CreateGroupArgs,
) -> Result<(), AppError> {
    let title = validate_group_title(&args.title)
        .map_err(|err| AppError::validation(err.to_string()))?;
    let repositories = init_repositories(&settings, false).await?;
    let groups: Arc<dyn GroupsRepo> = repositories;

    let existing: Vec<String> = groups
        .list_groups()
        .await
        .map_err(|err| AppError::unexpected(err.to_string()))?
        .into_iter()
        .map(|group| group.slug)
        .collect();

    let slug = match args.slug {
        Some(slug) => {
            validate_slug(&slug).map_err(|err| AppError::validation(err.to_string()))?;
            if existing.contains(&slug) {
                return Err(AppError::validation(format!(
                    "a group with slug `{slug}` already exists"
                )));
            }
            slug
        }
        None => generate_unique_slug(&title, |candidate| {
            !existing.iter().any(|slug| slug == candidate)
        })
        .map_err(|err| AppError::validation(err.to_string()))?,
    };

    let group = groups
        .create_group(CreateGroupParams {
            title,
            slug,
            description: args.description,
        })
        .await
        .map_err(|err| AppError::unexpected(err.to_string()))?;

    info!(
        target = "quillpost::create_group",
        id = group.id,
        slug = %group.slug,
        "Group created"
    );
    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
    migrate: bool,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or(InfraError::MissingDatabaseUrl)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(InfraError::Connect)?;

    if migrate {
        PostgresRepositories::run_migrations(&pool)
            .await
            .map_err(InfraError::Migrate)?;
    }

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_http_state(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<HttpState, AppError> {
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
    let groups_repo: Arc<dyn GroupsRepo> = repositories.clone();
    let comments_repo: Arc<dyn CommentsRepo> = repositories.clone();
    let follows_repo: Arc<dyn FollowsRepo> = repositories.clone();
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let sessions_repo: Arc<dyn SessionsRepo> = repositories.clone();
    let health_repo: Arc<dyn HealthRepo> = repositories;

    let upload_storage = Arc::new(
        UploadStorage::new(
            settings.uploads.directory.clone(),
            settings.uploads.max_request_bytes.get(),
        )
        .map_err(|err| InfraError::uploads(&settings.uploads.directory, err))?,
    );
    let upload_body_limit = usize::try_from(settings.uploads.max_request_bytes.get())
        .map_err(|_| AppError::validation("uploads.max_request_bytes exceeds usize"))?;

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
        posts_write_repo,
        groups_repo,
        comments_repo,
        upload_storage.clone(),
    ));
    let follows = Arc::new(FollowService::new(follows_repo, users_repo.clone()));

    let session_ttl = time::Duration::try_from(settings.auth.session_ttl)
        .map_err(|err| AppError::validation(format!("auth.session_ttl_hours: {err}")))?;
    let auth = Arc::new(
        AuthService::new(
            users_repo,
            sessions_repo,
            AuthSettings {
                session_ttl,
                argon2_memory_kib: settings.auth.argon2_memory_kib,
                argon2_iterations: settings.auth.argon2_iterations,
            },
        )
        .map_err(|err| AppError::unexpected(err.to_string()))?,
    );

    let chrome = Arc::new(ChromeService::new(SiteIdentity {
        title: settings.server.site_title.clone(),
        description: settings.server.site_description.clone(),
        footer_copy: format!("© {}", settings.server.site_title),
    }));

    let index_cache = IndexCacheState {
        cache: Arc::new(ResponseCache::new(settings.cache.max_entries)),
        ttl: settings.cache.index_ttl,
        session_cookie: SESSION_COOKIE,
    };

    Ok(HttpState {
        feed,
        posts,
        follows,
        auth,
        chrome,
        health: health_repo,
        upload_storage,
        index_cache,
        upload_body_limit,
        secure_cookies: settings.auth.secure_cookies,
    })
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|source| InfraError::Bind {
            addr: settings.server.addr,
            source,
        })?;
    info!(addr = %settings.server.addr, "listening");

    let (signalled_tx, signalled_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = signalled_tx.send(());
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        biased;
        result = &mut server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = signalled_rx => {
            drain(&mut server, settings.server.graceful_shutdown).await?;
        }
    }

    Ok(())
}

async fn drain<F>(server: &mut std::pin::Pin<&mut F>, grace: Duration) -> Result<(), AppError>
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    info!(grace_seconds = grace.as_secs(), "shutting down");
    match tokio::time::timeout(grace, server.as_mut()).await {
        Ok(result) => result.map_err(|err| AppError::unexpected(format!("server error: {err}"))),
        Err(_) => {
            warn!("graceful shutdown timed out; dropping open connections");
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
