/// Header carrying the editing API key.
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing {API_KEY_HEADER} header")]
    Missing,
    #[error("invalid API key")]
    Invalid,
}

/// Validates the provided API key against the configured one.
///
/// When no key is configured the check always passes, so a local development server does not
/// need one. The expected key is resolved at startup and passed in; this never reads the
/// environment.
pub fn validate_api_key(provided: Option<&str>, expected: Option<&str>) -> Result<(), AuthError> {
    let Some(expected) = expected.filter(|k| !k.is_empty()) else {
        return Ok(());
    };

    match provided {
        None => Err(AuthError::Missing),
        Some(key) if key == expected => Ok(()),
        Some(_) => Err(AuthError::Invalid),
    }
}
