use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Failures while bringing the service up, before any request is handled.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("database url is not configured; set `database.url` or QUILLPOST__DATABASE__URL")]
    MissingDatabaseUrl,
    #[error("failed to connect to the database: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("failed to apply migrations: {0}")]
    Migrate(#[source] sqlx::Error),
    #[error("uploads directory `{}` is unusable: {source}", path.display())]
    Uploads {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
}

impl InfraError {
    pub fn uploads(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Uploads {
            path: path.into(),
            source,
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }

    /// True for failures of the database itself rather than of local setup.
    pub fn is_database(&self) -> bool {
        matches!(self, InfraError::Connect(_) | InfraError::Migrate(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uploads_error_names_the_directory() {
        let err = InfraError::uploads(
            "/srv/media",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(err.to_string().contains("/srv/media"));
        assert!(!err.is_database());
    }

    #[test]
    fn pool_failures_count_as_database_errors() {
        assert!(InfraError::Connect(sqlx::Error::PoolTimedOut).is_database());
        assert!(!InfraError::MissingDatabaseUrl.is_database());
    }
}
