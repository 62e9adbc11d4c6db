//! Request field validation errors

/// Why a `name` or `email` value was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Missing { field: &'static str },

    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// Longer than the column allows
    #[error("{field} exceeds maximum length of {max} characters")]
    TooLong { field: &'static str, max: usize },
}

impl ValidationError {
    /// The request field at fault.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Missing { field } | Self::Empty { field } | Self::TooLong { field, .. } => field,
        }
    }
}
