//! User entity and validated create/update input

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ValidationError;

/// Width of the `name` and `email` columns.
pub const MAX_FIELD_LEN: usize = 255;

/// A stored user row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Name and email for a create or full-replace update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    name: String,
    email: String,
}

impl NewUser {
    /// Build from optional request fields.
    ///
    /// Both fields must be present and non-blank. Surrounding whitespace is
    /// trimmed before storing.
    ///
    /// # Example
    /// ```
    /// use usersvc_server::models::NewUser;
    ///
    /// assert!(NewUser::new(Some("Ann"), Some("ann@x.com")).is_ok());
    /// assert!(NewUser::new(None, Some("ann@x.com")).is_err());
    /// ```
    pub fn new(name: Option<&str>, email: Option<&str>) -> Result<Self, ValidationError> {
        Ok(Self {
            name: required("name", name)?,
            email: required("email", email)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

fn required(field: &'static str, value: Option<&str>) -> Result<String, ValidationError> {
    let value = value.ok_or(ValidationError::Missing { field })?.trim();

    if value.is_empty() {
        return Err(ValidationError::Empty { field });
    }

    if value.chars().count() > MAX_FIELD_LEN {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_FIELD_LEN,
        });
    }

    Ok(value.to_owned())
}
