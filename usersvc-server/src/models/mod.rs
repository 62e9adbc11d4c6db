//! Domain models with validation at construction
//!
//! Request input is checked when building [`NewUser`].
//! Invalid input returns [`ValidationError`], not panic.

pub mod user;
pub mod validation;

pub use user::{NewUser, User};
pub use validation::ValidationError;
