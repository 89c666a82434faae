use crate::application::repos::RepoError;
use crate::domain::relations;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const STRING_TOO_LONG: &str = "22001";
const INVALID_TEXT: &str = "22P02";
const QUERY_CANCELED: &str = "57014";

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) => {
            let code = db.code().map(|code| code.into_owned());
            classify(code.as_deref(), db.constraint(), db.message())
        }
        other => RepoError::from_persistence(other),
    }
}

fn classify(code: Option<&str>, constraint: Option<&str>, message: &str) -> RepoError {
    match code {
        Some(UNIQUE_VIOLATION) => RepoError::Duplicate {
            constraint: constraint.unwrap_or("unknown").to_string(),
        },
        Some(FOREIGN_KEY_VIOLATION) => RepoError::InvalidInput {
            message: describe_foreign_key(constraint, message),
        },
        Some(STRING_TOO_LONG) | Some(INVALID_TEXT) => RepoError::InvalidInput {
            message: message.to_string(),
        },
        Some(QUERY_CANCELED) => RepoError::Timeout,
        Some(code) if code.starts_with("23") => RepoError::Integrity {
            message: message.to_string(),
        },
        _ => RepoError::from_persistence(message),
    }
}

fn describe_foreign_key(constraint: Option<&str>, message: &str) -> String {
    match constraint.and_then(relations::by_constraint) {
        Some(relation) => format!(
            "{}.{} points at a missing {} row",
            relation.table, relation.column, relation.references
        ),
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follow_and_post_foreign_keys_are_told_apart() {
        let follow = classify(
            Some(FOREIGN_KEY_VIOLATION),
            Some("follows_author_id_fkey"),
            "insert or update on table \"follows\" violates foreign key constraint",
        );
        assert_eq!(
            follow,
            RepoError::InvalidInput {
                message: "follows.author_id points at a missing users row".into()
            }
        );

        let post = classify(
            Some(FOREIGN_KEY_VIOLATION),
            Some("posts_group_id_fkey"),
            "insert or update on table \"posts\" violates foreign key constraint",
        );
        assert_eq!(
            post,
            RepoError::InvalidInput {
                message: "posts.group_id points at a missing groups row".into()
            }
        );
    }

    #[test]
    fn unknown_foreign_key_keeps_the_server_message() {
        let err = classify(Some(FOREIGN_KEY_VIOLATION), None, "violates foreign key");
        assert_eq!(
            err,
            RepoError::InvalidInput {
                message: "violates foreign key".into()
            }
        );
    }

    #[test]
    fn unique_violations_carry_the_constraint() {
        let err = classify(Some(UNIQUE_VIOLATION), Some("posts_slug_key"), "duplicate key");
        assert_eq!(
            err,
            RepoError::Duplicate {
                constraint: "posts_slug_key".into()
            }
        );
    }

    #[test]
    fn other_codes_are_classified_by_class() {
        assert_eq!(
            classify(Some(QUERY_CANCELED), None, "canceling statement"),
            RepoError::Timeout
        );
        assert!(matches!(
            classify(Some("23502"), None, "null value"),
            RepoError::Integrity { .. }
        ));
        assert!(matches!(
            classify(Some(STRING_TOO_LONG), None, "value too long"),
            RepoError::InvalidInput { .. }
        ));
        assert!(matches!(
            classify(None, None, "connection reset"),
            RepoError::Persistence(_)
        ));
    }

    #[test]
    fn missing_rows_and_pool_timeouts() {
        assert_eq!(map_sqlx_error(sqlx::Error::RowNotFound), RepoError::NotFound);
        assert_eq!(map_sqlx_error(sqlx::Error::PoolTimedOut), RepoError::Timeout);
    }
}
