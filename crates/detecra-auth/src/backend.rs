use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use url::Url;

use crate::error::BackendError;
use crate::identity::{Identity, LifecycleEvent, OAuthProvider, Session};
use crate::profile::{NewProfile, Profile, ProfilePatch};

/// Receiving end of the backend's lifecycle event stream. Dropping it unsubscribes.
pub type LifecycleEvents = broadcast::Receiver<LifecycleEvent>;

#[derive(Debug, Clone, PartialEq)]
pub struct OAuthRequest {
    pub provider: OAuthProvider,
    pub redirect_to: Url,
    pub query_params: Vec<(String, String)>,
}

/// The identity-and-storage service the coordinator depends on.
///
/// Profile reads report a missing row as [`BackendError::NotFound`] and inserts report a
/// uniqueness violation as [`BackendError::Conflict`]; the coordinator relies on both to provision
/// idempotently.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn get_current_session(&self) -> Result<Option<Session>, BackendError>;

    fn subscribe(&self) -> LifecycleEvents;

    async fn read_profile(&self, id: &str) -> Result<Profile, BackendError>;

    async fn insert_profile(&self, profile: &NewProfile) -> Result<Profile, BackendError>;

    async fn update_profile(&self, id: &str, patch: &ProfilePatch) -> Result<Profile, BackendError>;

    async fn end_session(&self) -> Result<(), BackendError>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, BackendError>;

    /// Returns the created identity, if the provider hands one back before confirmation.
    async fn sign_up_with_password(
        &self,
        email: &str,
        password: &str,
        metadata: &Map<String, Value>,
        redirect_to: &Url,
    ) -> Result<Option<Identity>, BackendError>;

    /// Starts a redirect-based sign-in and returns the URL the user has to visit. Completion is
    /// reported later as a [`LifecycleEvent`].
    async fn sign_in_with_oauth(&self, request: &OAuthRequest) -> Result<Url, BackendError>;
}
