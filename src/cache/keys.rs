use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub const INDEX_KEY_PREFIX: &str = "index_page";

pub fn hash_value<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Key for one cached index rendering.
///
/// The page shows viewer-specific navigation, so the session cookie takes
/// part in the key. The raw cookie never appears in it.
pub fn index_key(query: Option<&str>, session: Option<&str>) -> String {
    let query = query.unwrap_or("");
    match session {
        Some(token) => format!("{INDEX_KEY_PREFIX}:{query}:{:016x}", hash_value(&token)),
        None => format!("{INDEX_KEY_PREFIX}:{query}:anonymous"),
    }
}
