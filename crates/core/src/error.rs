//! Domain error kinds surfaced to the user.

use thiserror::Error;

/// Problems with user-entered form data. Shown as a blocking message, never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// One or more required fields are blank.
    #[error("Fill in the required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    /// The cover URL is not an http(s) URL.
    #[error("The cover link must start with http:// or https://")]
    InvalidUrl,
    /// The size could not be parsed as a number.
    #[error("The size must be a number (e.g. 4.37)")]
    InvalidSize,
}

/// Sign-in failures mapped to user-readable messages.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Email or password left blank.
    #[error("Enter both email and password")]
    MissingFields,
    /// The identity is not the configured administrator.
    #[error("Access restricted to the administrator")]
    NotAuthorized,
    /// Wrong password for the account.
    #[error("Incorrect password")]
    WrongPassword,
    /// No account with that email.
    #[error("User not found")]
    UserNotFound,
    /// Malformed email address.
    #[error("Invalid email")]
    InvalidEmail,
    /// The request never reached the service.
    #[error("Connection error, check your internet access")]
    Network(#[source] reqwest::Error),
    /// Any other rejection reported by the service.
    #[error("Sign-in failed: {0}")]
    Rejected(String),
}

impl AuthError {
    /// Map an identity service error code onto a variant.
    pub fn from_code(code: &str) -> Self {
        // Codes may carry a trailing explanation ("TOO_MANY_ATTEMPTS_TRY_LATER : ...").
        let head = code.split([' ', ':']).next().unwrap_or(code);
        match head {
            "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => Self::WrongPassword,
            "EMAIL_NOT_FOUND" => Self::UserNotFound,
            "INVALID_EMAIL" => Self::InvalidEmail,
            _ => Self::Rejected(code.to_string()),
        }
    }
}

/// Failures talking to the remote document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transport-level failure.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    /// The store answered with a non-success status.
    #[error("store returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },
    /// The payload did not have the expected shape.
    #[error("unexpected store payload: {0}")]
    Decode(String),
    /// A write was attempted without a signed-in session.
    #[error("sign in before adding games")]
    Unauthenticated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_identity_codes() {
        assert!(matches!(
            AuthError::from_code("INVALID_PASSWORD"),
            AuthError::WrongPassword
        ));
        assert!(matches!(
            AuthError::from_code("EMAIL_NOT_FOUND"),
            AuthError::UserNotFound
        ));
        assert!(matches!(
            AuthError::from_code("INVALID_EMAIL"),
            AuthError::InvalidEmail
        ));
        match AuthError::from_code("TOO_MANY_ATTEMPTS_TRY_LATER : Access disabled") {
            AuthError::Rejected(code) => assert!(code.starts_with("TOO_MANY")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_fields_lists_names() {
        let err = ValidationError::MissingFields(vec!["name", "size"]);
        assert_eq!(err.to_string(), "Fill in the required fields: name, size");
    }
}
