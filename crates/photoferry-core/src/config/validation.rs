//! Configuration validation.

use super::model::Config;

/// Validation error for run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// IMAP host is empty.
    EmptyHost,
    /// IMAP port is invalid.
    InvalidPort,
    /// IMAP username is empty.
    EmptyUsername,
    /// IMAP password is empty.
    EmptyPassword,
    /// Watched sender address is empty.
    EmptySender,
    /// Watched sender address format is invalid.
    InvalidSender,
    /// Subject pattern is empty.
    EmptySubjectPattern,
    /// Lookback window is zero days.
    ZeroLookback,
    /// Album name is empty.
    EmptyAlbumName,
    /// Supported format list is empty.
    NoSupportedFormats,
    /// A supported format entry lacks its leading dot.
    MalformedFormat,
    /// Maximum file size is zero.
    ZeroMaxFileSize,
    /// Maximum upload attempts is zero.
    ZeroMaxAttempts,
    /// Ledger path is empty.
    EmptyLedgerPath,
    /// Photo library credentials are incomplete.
    IncompleteCredentials,
}

impl ValidationError {
    /// Get human-readable error message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::EmptyHost => "IMAP server is required",
            Self::InvalidPort => "IMAP port must be 1-65535",
            Self::EmptyUsername => "IMAP username is required",
            Self::EmptyPassword => "IMAP password is required",
            Self::EmptySender => "Sender address is required",
            Self::InvalidSender => "Invalid sender address format",
            Self::EmptySubjectPattern => "Subject pattern is required",
            Self::ZeroLookback => "Lookback window must be at least 1 day",
            Self::EmptyAlbumName => "Album name is required",
            Self::NoSupportedFormats => "At least one supported format is required",
            Self::MalformedFormat => "Format entries must start with a dot, e.g. \".jpg\"",
            Self::ZeroMaxFileSize => "Maximum file size must be at least 1 MB",
            Self::ZeroMaxAttempts => "Maximum upload attempts must be at least 1",
            Self::EmptyLedgerPath => "Ledger path is required",
            Self::IncompleteCredentials => "Photo library credentials are incomplete",
        }
    }

    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyHost => "mailbox.host",
            Self::InvalidPort => "mailbox.port",
            Self::EmptyUsername => "mailbox.username",
            Self::EmptyPassword => "mailbox.password",
            Self::EmptySender | Self::InvalidSender => "mailbox.sender_email",
            Self::EmptySubjectPattern => "filter.subject_pattern",
            Self::ZeroLookback => "filter.lookback_days",
            Self::EmptyAlbumName => "uploads.album_name",
            Self::NoSupportedFormats | Self::MalformedFormat => "uploads.supported_formats",
            Self::ZeroMaxFileSize => "uploads.max_file_size_mb",
            Self::ZeroMaxAttempts => "uploads.max_upload_attempts",
            Self::EmptyLedgerPath => "ledger.path",
            Self::IncompleteCredentials => "photos",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ValidationError {}

/// Result of validating a configuration.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Validate a run configuration.
///
/// Returns `Ok(())` if valid, or `Err(Vec<ValidationError>)` with all errors.
///
/// # Errors
///
/// Returns a vector of `ValidationError` if any fields are invalid.
pub fn validate_config(config: &Config) -> ValidationResult {
    let mut errors = Vec::new();

    // Mailbox validation
    if config.mailbox.host.trim().is_empty() {
        errors.push(ValidationError::EmptyHost);
    }
    if config.mailbox.port == 0 {
        errors.push(ValidationError::InvalidPort);
    }
    if config.mailbox.username.trim().is_empty() {
        errors.push(ValidationError::EmptyUsername);
    }
    if config.mailbox.password.is_empty() {
        errors.push(ValidationError::EmptyPassword);
    }
    if config.mailbox.sender_email.trim().is_empty() {
        errors.push(ValidationError::EmptySender);
    } else if !is_valid_email(&config.mailbox.sender_email) {
        errors.push(ValidationError::InvalidSender);
    }

    // Filter validation
    if config.filter.subject_pattern.is_empty() {
        errors.push(ValidationError::EmptySubjectPattern);
    }
    if config.filter.lookback_days == 0 {
        errors.push(ValidationError::ZeroLookback);
    }

    // Upload validation
    if config.uploads.album_name.trim().is_empty() {
        errors.push(ValidationError::EmptyAlbumName);
    }
    if config.uploads.supported_formats.is_empty() {
        errors.push(ValidationError::NoSupportedFormats);
    } else if config
        .uploads
        .supported_formats
        .iter()
        .any(|f| !f.starts_with('.') || f.len() < 2)
    {
        errors.push(ValidationError::MalformedFormat);
    }
    if config.uploads.max_file_size_mb == 0 {
        errors.push(ValidationError::ZeroMaxFileSize);
    }
    if config.uploads.max_upload_attempts == 0 {
        errors.push(ValidationError::ZeroMaxAttempts);
    }

    // Ledger validation
    if config.ledger.path.trim().is_empty() {
        errors.push(ValidationError::EmptyLedgerPath);
    }

    // Credentials validation
    if config.photos.client_id.trim().is_empty()
        || config.photos.client_secret.is_empty()
        || config.photos.refresh_token.is_empty()
    {
        errors.push(ValidationError::IncompleteCredentials);
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Basic email validation.
fn is_valid_email(email: &str) -> bool {
    let email = email.trim();

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() {
        return false;
    }

    if domain.is_empty() || !domain.contains('.') {
        return false;
    }

    let domain_parts: Vec<&str> = domain.split('.').collect();
    if domain_parts.iter().any(|p| p.is_empty()) {
        return false;
    }

    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn valid_config() -> Config {
        Config::from_toml(
            r#"
            [mailbox]
            host = "imap.example.com"
            username = "me@example.com"
            password = "pw"
            sender_email = "school@example.com"

            [filter]
            subject_pattern = "[School ]"

            [uploads]
            album_name = "School Photos"

            [ledger]
            path = "ledger.sqlite"

            [photos]
            client_id = "id"
            client_secret = "secret"
            refresh_token = "rt"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_valid_email() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("user.name@sub.example.com"));
    }

    #[test]
    fn test_invalid_email() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("user"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("user@example"));
        assert!(!is_valid_email("user@@example.com"));
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_all_errors_collected() {
        let mut config = valid_config();
        config.mailbox.host = String::new();
        config.mailbox.password = String::new();
        config.uploads.album_name = "  ".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::EmptyHost));
        assert!(errors.contains(&ValidationError::EmptyPassword));
        assert!(errors.contains(&ValidationError::EmptyAlbumName));
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_malformed_format_rejected() {
        let mut config = valid_config();
        config.uploads.supported_formats = vec!["jpg".to_string()];
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::MalformedFormat));
    }

    #[test]
    fn test_bad_sender_rejected() {
        let mut config = valid_config();
        config.mailbox.sender_email = "not-an-address".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::InvalidSender));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = valid_config();
        config.uploads.max_upload_attempts = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::ZeroMaxAttempts));
    }
}
