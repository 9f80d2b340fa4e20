use crate::errors::{AppError, AppResult};

/// Collects every missing or malformed field of a request before failing.
#[derive(Debug, Default)]
pub struct Validator {
    missing: Vec<String>,
    invalid: Vec<(String, String)>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value, recording `field` as missing when absent. The
    /// placeholder returned for a missing value is never persisted because
    /// [`Validator::finish`] fails first.
    pub fn required<T: Default>(&mut self, field: &str, value: Option<T>) -> T {
        match value {
            Some(v) => v,
            None => {
                self.missing.push(field.to_string());
                T::default()
            }
        }
    }

    /// Records `field` as missing when absent and hands the option back.
    pub fn present<T>(&mut self, field: &str, value: Option<T>) -> Option<T> {
        if value.is_none() {
            self.missing.push(field.to_string());
        }
        value
    }

    /// Like [`Validator::required`] but blank strings count as missing.
    pub fn required_text(&mut self, field: &str, value: Option<String>) -> String {
        match value.map(|v| v.trim().to_string()) {
            Some(v) if !v.is_empty() => v,
            _ => {
                self.missing.push(field.to_string());
                String::new()
            }
        }
    }

    pub fn invalid(&mut self, field: &str, message: impl Into<String>) {
        self.invalid.push((field.to_string(), message.into()));
    }

    pub fn check(&mut self, ok: bool, field: &str, message: impl Into<String>) {
        if !ok {
            self.invalid(field, message);
        }
    }

    pub fn max_chars(&mut self, field: &str, value: Option<&str>, max: usize) {
        if let Some(value) = value {
            if value.chars().count() > max {
                self.invalid(field, format!("{field} cannot be more than {max} characters"));
            }
        }
    }

    pub fn non_empty<T>(&mut self, field: &str, items: &[T]) {
        if items.is_empty() && !self.missing.iter().any(|m| m == field) {
            self.invalid(field, format!("{field} needs at least one entry"));
        }
    }

    pub fn finish(self) -> AppResult<()> {
        if self.missing.is_empty() && self.invalid.is_empty() {
            return Ok(());
        }

        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing required fields: {}", self.missing.join(", ")));
        }
        parts.extend(self.invalid.iter().map(|(_, message)| message.clone()));

        let mut fields = self.missing;
        for (field, _) in self.invalid {
            if !fields.contains(&field) {
                fields.push(field);
            }
        }

        Err(AppError::validation(parts.join("; "), fields))
    }
}

/// Trims optional free text, mapping blank input to `None`.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}
