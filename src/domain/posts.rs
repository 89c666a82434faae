//! Content rules for posts, comments and groups.

use super::error::DomainError;

pub const GROUP_TITLE_MAX_CHARS: usize = 200;
pub const IMAGE_DIRECTORY: &str = "posts";

/// Trim and require post text.
pub fn validate_post_text(raw: &str) -> Result<String, DomainError> {
    required_text("text", raw)
}

/// Trim and require comment text.
pub fn validate_comment_text(raw: &str) -> Result<String, DomainError> {
    required_text("text", raw)
}

pub fn validate_group_title(raw: &str) -> Result<String, DomainError> {
    let title = required_text("title", raw)?;
    if title.chars().count() > GROUP_TITLE_MAX_CHARS {
        return Err(DomainError::validation(
            "title",
            format!("Ensure this value has at most {GROUP_TITLE_MAX_CHARS} characters."),
        ));
    }
    Ok(title)
}

/// Parse the optional group selector submitted with a post form.
///
/// An empty value means "no group"; anything else must be a numeric id.
pub fn parse_group_choice(raw: Option<&str>) -> Result<Option<i64>, DomainError> {
    let Some(value) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };

    value
        .parse::<i64>()
        .map(Some)
        .map_err(|_| invalid_group_choice())
}

pub fn invalid_group_choice() -> DomainError {
    DomainError::validation(
        "group",
        "Select a valid choice. That choice is not one of the available choices.",
    )
}

fn required_text(field: &'static str, raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(field, "This field is required."));
    }
    Ok(trimmed.to_string())
}
