use crate::identity::OAuthProvider;

/// Failures reported by an [`AuthBackend`](crate::AuthBackend).
#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    #[error("row not found")]
    NotFound,
    #[error("row already exists")]
    Conflict,
    /// An error the identity provider reported about the request itself (bad credentials,
    /// unconfirmed email, rate limiting, ...). The message is the provider's own text.
    #[error("{message}")]
    Auth { message: String, status: Option<u16> },
    #[error("backend call timed out")]
    Timeout,
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl BackendError {
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth { message: message.into(), status: None }
    }
}

/// Errors surfaced by [`SessionCoordinator`](crate::SessionCoordinator) operations. Display texts
/// are meant to be shown to the user as-is.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("No user logged in")]
    NoIdentity,
    #[error("{0}")]
    Rejected(String),
    #[error("{message}")]
    Unexpected {
        message: String,
        #[source]
        source: BackendError,
    },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn sign_in_message(provider_message: &str) -> String {
    if provider_message.contains("Invalid login credentials") {
        "Invalid email or password. Please check your credentials and try again.".to_owned()
    } else if provider_message.contains("Email not confirmed") {
        "Please verify your email address before signing in. Check your inbox for a confirmation email.".to_owned()
    } else if provider_message.contains("Too many requests") {
        "Too many login attempts. Please wait a moment and try again.".to_owned()
    } else {
        provider_message.to_owned()
    }
}

pub(crate) fn sign_up_message(provider_message: &str) -> String {
    if provider_message.contains("User already registered") {
        "An account with this email already exists. Please sign in instead.".to_owned()
    } else if provider_message.contains("Password") {
        "Password does not meet requirements. Please choose a stronger password.".to_owned()
    } else if provider_message.contains("Email") {
        "Invalid email address. Please check and try again.".to_owned()
    } else {
        provider_message.to_owned()
    }
}

pub(crate) const UNEXPECTED_SIGN_IN: &str = "An unexpected error occurred during sign in. Please try again.";
pub(crate) const UNEXPECTED_SIGN_UP: &str = "An unexpected error occurred during sign up. Please try again.";

pub(crate) fn unexpected_provider_message(provider: OAuthProvider) -> String {
    format!("Failed to sign in with {provider}. Please try again.")
}
