//! Run configuration: model, loading, and validation.

mod model;
mod validation;

pub use model::{Config, FilterConfig, LedgerConfig, MailboxConfig, PhotosConfig, UploadConfig};
pub use validation::{ValidationError, ValidationResult, validate_config};
