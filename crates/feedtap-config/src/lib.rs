//! # feedtap config
//!
//! TOML configuration with `${VAR}` expansion, defaults for every field, and
//! validation. The CSS selectors for the target site live here as data.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};
