use schwab_api_wrapper::sanitize::SanitizeError;
use schwab_api_wrapper::{ApiError, ApiErrorKind, ConfigError, TokenStoreError, ValidationError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    TokenStore(#[from] TokenStoreError),

    #[error(transparent)]
    Sanitize(#[from] SanitizeError),

    #[error("{failed} of {total} files were not sanitized")]
    SanitizeIncomplete { failed: usize, total: usize },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::Usage(_) => 2,
            Self::Api(error) => match error.kind() {
                ApiErrorKind::ReauthRequired => 5,
                // Rejected locally before any request was sent.
                ApiErrorKind::InvalidRequest if error.status().is_none() => 2,
                _ => 3,
            },
            Self::Config(_) | Self::TokenStore(_) => 11,
            Self::Sanitize(SanitizeError::Read { .. } | SanitizeError::Write { .. }) => 10,
            Self::Sanitize(SanitizeError::Json { .. }) => 4,
            Self::Sanitize(SanitizeError::SensitiveData { .. }) | Self::SanitizeIncomplete { .. } => 2,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_map_to_distinct_exit_codes() {
        let reauth = CliError::Api(ApiError::reauth_required("refresh token expired"));
        assert_eq!(reauth.exit_code(), 5);

        let local = CliError::Api(ValidationError::EmptySymbolList.into());
        assert_eq!(local.exit_code(), 2);

        let remote = CliError::Api(ApiError::from_status(400, "bad symbol"));
        assert_eq!(remote.exit_code(), 3);

        let unavailable = CliError::Api(ApiError::from_status(503, "maintenance"));
        assert_eq!(unavailable.exit_code(), 3);
    }

    #[test]
    fn local_failures_use_their_own_codes() {
        assert_eq!(CliError::Usage(String::from("bad date")).exit_code(), 2);
        assert_eq!(
            CliError::Config(ConfigError::MissingField { field: "client_id" }).exit_code(),
            11
        );
        assert_eq!(
            CliError::Io(std::io::Error::other("disk full")).exit_code(),
            10
        );
    }
}
