use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, TimeZone as _, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An authenticated user as the identity provider reports it.
///
/// The metadata bag is filled differently per login method: password sign-ups carry whatever was
/// sent at sign-up, social providers carry their own claims (`name`, `picture`, `user_name`, ...).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "user_metadata")]
    pub metadata: Map<String, Value>,
}

impl Identity {
    pub fn new(id: impl Into<String>, email: Option<String>, metadata: Map<String, Value>) -> Self {
        Self { id: id.into(), email, metadata }
    }

    /// Returns the metadata value under `key` when it is a non-empty string.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str).filter(|value| !value.is_empty())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Unix timestamp in seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: Identity,
}

impl Session {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at.and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }

    /// Whether the access token expires within `margin` of `now`. Sessions without an expiry never
    /// expire.
    pub fn expires_within(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        self.expires_at().is_some_and(|expires_at| expires_at - margin <= now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    SignedIn,
    TokenRefreshed,
    SignedOut,
    /// Every other provider event (`USER_UPDATED`, `INITIAL_SESSION`, `PASSWORD_RECOVERY`, ...).
    Other(String),
}

impl Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::SignedIn => write!(f, "SIGNED_IN"),
            EventKind::TokenRefreshed => write!(f, "TOKEN_REFRESHED"),
            EventKind::SignedOut => write!(f, "SIGNED_OUT"),
            EventKind::Other(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleEvent {
    pub kind: EventKind,
    pub session: Option<Session>,
}

impl LifecycleEvent {
    pub fn new(kind: EventKind, session: Option<Session>) -> Self {
        Self { kind, session }
    }

    pub fn signed_in(session: Session) -> Self {
        Self::new(EventKind::SignedIn, Some(session))
    }

    pub fn token_refreshed(session: Session) -> Self {
        Self::new(EventKind::TokenRefreshed, Some(session))
    }

    pub fn signed_out() -> Self {
        Self::new(EventKind::SignedOut, None)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Github,
    Facebook,
    Twitter,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Github => "github",
            OAuthProvider::Facebook => "facebook",
            OAuthProvider::Twitter => "twitter",
        }
    }

    /// Extra authorization query parameters the provider needs.
    pub fn query_params(&self) -> Vec<(String, String)> {
        match self {
            OAuthProvider::Google => vec![
                ("access_type".to_owned(), "offline".to_owned()),
                ("prompt".to_owned(), "consent".to_owned()),
            ],
            _ => Vec::new(),
        }
    }
}

impl Display for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(thiserror::Error, Debug)]
#[error("unknown oauth provider `{0}`")]
pub struct UnknownProvider(String);

impl FromStr for OAuthProvider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(OAuthProvider::Google),
            "github" => Ok(OAuthProvider::Github),
            "facebook" => Ok(OAuthProvider::Facebook),
            "twitter" => Ok(OAuthProvider::Twitter),
            _ => Err(UnknownProvider(s.to_owned())),
        }
    }
}
