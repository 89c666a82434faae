//! Field-level error collection shared by every HTML form.

use crate::domain::error::DomainError;

pub const NON_FIELD: &str = "__all__";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    entries: Vec<(&'static str, String)>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.entries.push((field, message.into()));
    }

    pub fn push(&mut self, error: DomainError) {
        let field = error.field().unwrap_or(NON_FIELD);
        self.entries.push((field, error.message()));
    }

    /// Record the error side of `result` and hand back the success value.
    pub fn collect<T>(&mut self, result: Result<T, DomainError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.push(err);
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn for_field(&self, field: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(name, _)| *name == field)
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn non_field(&self) -> Vec<String> {
        self.for_field(NON_FIELD)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.entries
            .iter()
            .map(|(field, message)| (*field, message.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_land_on_their_field() {
        let mut errors = FormErrors::new();
        let value: Option<()> = errors.collect(Err(DomainError::validation("text", "required")));
        assert!(value.is_none());
        assert_eq!(errors.for_field("text"), vec!["required".to_string()]);
        assert!(errors.non_field().is_empty());
    }

    #[test]
    fn non_validation_errors_are_non_field() {
        let mut errors = FormErrors::new();
        errors.push(DomainError::invariant("broken"));
        assert_eq!(errors.non_field().len(), 1);
    }
}
