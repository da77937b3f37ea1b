mod provisioning;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::backend::{AuthBackend, OAuthRequest};
use crate::config::CoordinatorConfig;
use crate::error::{
    sign_in_message, sign_up_message, unexpected_provider_message, BackendError, Error, Result, UNEXPECTED_SIGN_IN,
    UNEXPECTED_SIGN_UP,
};
use crate::identity::{EventKind, Identity, LifecycleEvent, OAuthProvider, Session};
use crate::profile::{NewProfile, Profile, ProfileDefaults, ProfilePatch};

/// What the rest of the application sees of authentication.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    pub identity: Option<Identity>,
    pub session: Option<Session>,
    pub profile: Option<Profile>,
    pub loading: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self { identity: None, session: None, profile: None, loading: true }
    }
}

impl AuthState {
    pub fn is_signed_in(&self) -> bool {
        self.identity.is_some()
    }

    /// Profile name, or the one derived from the raw identity while no profile is loaded.
    pub fn display_name(&self) -> Option<String> {
        self.profile
            .as_ref()
            .and_then(|profile| profile.full_name.clone())
            .or_else(|| self.identity.as_ref().and_then(|identity| ProfileDefaults::derive(identity).full_name))
    }

    pub fn display_avatar(&self) -> Option<String> {
        self.profile
            .as_ref()
            .and_then(|profile| profile.avatar_url.clone())
            .or_else(|| self.identity.as_ref().and_then(|identity| ProfileDefaults::derive(identity).avatar_url))
    }
}

/// Keeps [`AuthState`] in step with an [`AuthBackend`]'s lifecycle events and provisions a profile
/// row for every identity it sees signed in.
///
/// Call [`start`](Self::start) once to subscribe and load the initial session, and
/// [`dispose`](Self::dispose) when done; results arriving after disposal are dropped.
pub struct SessionCoordinator<B: AuthBackend + 'static> {
    core: Arc<Core<B>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

pub(crate) struct Core<B> {
    backend: Arc<B>,
    config: CoordinatorConfig,
    state: watch::Sender<AuthState>,
    disposed: AtomicBool,
}

impl<B: AuthBackend + 'static> SessionCoordinator<B> {
    pub fn new(backend: Arc<B>, config: CoordinatorConfig) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self {
            core: Arc::new(Core { backend, config, state, disposed: AtomicBool::new(false) }),
            listener: Mutex::new(None),
        }
    }

    /// Subscribes to the backend's lifecycle events and loads the current session.
    pub async fn start(&self) {
        let mut events = self.core.backend.subscribe();
        let core = Arc::clone(&self.core);
        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => core.on_lifecycle_event(event).await,
                    Err(RecvError::Lagged(skipped)) => warn!("lifecycle listener lagged, {skipped} events skipped."),
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("lifecycle listener stopped.");
        });

        if let Some(previous) = self.listener.lock().unwrap_or_else(|e| e.into_inner()).replace(handle) {
            previous.abort();
        }

        self.core.bootstrap().await;
    }

    pub async fn bootstrap(&self) {
        self.core.bootstrap().await
    }

    pub async fn on_lifecycle_event(&self, event: LifecycleEvent) {
        self.core.on_lifecycle_event(event).await
    }

    pub async fn resolve_profile(&self, identity: &Identity) {
        self.core.resolve_profile(identity).await
    }

    pub fn state(&self) -> AuthState {
        self.core.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.core.state.subscribe()
    }

    pub async fn sign_up(&self, email: &str, password: &str, full_name: &str) -> Result<()> {
        let mut metadata = Map::new();
        metadata.insert("full_name".to_owned(), Value::String(full_name.to_owned()));

        let created = self
            .core
            .call(self.core.backend.sign_up_with_password(email, password, &metadata, &self.core.config.site_origin))
            .await;

        let identity = match created {
            Ok(identity) => identity,
            Err(BackendError::Auth { message, .. }) => return Err(Error::Rejected(sign_up_message(&message))),
            Err(source) => {
                error!("sign up failed: {source}");
                return Err(Error::Unexpected { message: UNEXPECTED_SIGN_UP.to_owned(), source });
            }
        };

        let Some(identity) = identity else {
            return Ok(());
        };

        info!("user(id: {}) signed up.", identity.id);

        tokio::time::sleep(self.core.config.signup_settle).await;

        let new_profile = NewProfile {
            id: identity.id.clone(),
            email: Some(email.to_owned()),
            full_name: Some(full_name.to_owned()),
            avatar_url: None,
            github_username: None,
        };
        if let Err(e) = self.core.call(self.core.backend.insert_profile(&new_profile)).await {
            warn!("profile(id: {}) creation deferred until first sign in: {e}", identity.id);
        }

        Ok(())
    }

    /// Password sign-in. The profile is resolved when the resulting sign-in event arrives.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<()> {
        match self.core.call(self.core.backend.sign_in_with_password(email, password)).await {
            Ok(session) => {
                info!("user(id: {}) signed in with password.", session.user.id);
                Ok(())
            }
            Err(BackendError::Auth { message, .. }) => Err(Error::Rejected(sign_in_message(&message))),
            Err(source) => {
                error!("sign in failed: {source}");
                Err(Error::Unexpected { message: UNEXPECTED_SIGN_IN.to_owned(), source })
            }
        }
    }

    /// Starts an OAuth sign-in from `current_path` and returns the URL to send the user to.
    pub async fn sign_in_with_provider(&self, provider: OAuthProvider, current_path: &str) -> Result<Url> {
        let redirect_to = self.core.config.oauth_redirect(current_path).map_err(|e| Error::Unexpected {
            message: unexpected_provider_message(provider),
            source: BackendError::Anyhow(e.into()),
        })?;
        let request = OAuthRequest { provider, redirect_to, query_params: provider.query_params() };

        match self.core.call(self.core.backend.sign_in_with_oauth(&request)).await {
            Ok(url) => {
                info!("oauth sign in with {provider} started.");
                Ok(url)
            }
            Err(BackendError::Auth { message, .. }) => {
                error!("oauth sign in with {provider} rejected: {message}");
                Err(Error::Rejected(message))
            }
            Err(source) => {
                error!("oauth sign in with {provider} failed: {source}");
                Err(Error::Unexpected { message: unexpected_provider_message(provider), source })
            }
        }
    }

    /// Ends the session and drops the local profile right away. Identity and session are cleared
    /// by the sign-out event that follows.
    pub async fn sign_out(&self) -> Result<()> {
        let result = self.core.call(self.core.backend.end_session()).await;
        self.core.mutate(|state| state.profile = None);

        result.map_err(|e| {
            warn!("sign out failed: {e}");
            e.into()
        })
    }

    pub async fn update_profile(&self, patch: ProfilePatch) -> Result<Profile> {
        let identity_id = self.core.state.borrow().identity.as_ref().map(|identity| identity.id.clone());
        let Some(identity_id) = identity_id else {
            return Err(Error::NoIdentity);
        };

        let patch = patch.stamped(Utc::now());
        let profile = self.core.call(self.core.backend.update_profile(&identity_id, &patch)).await?;

        self.core.mutate(|state| state.profile = Some(profile.clone()));
        info!("profile(id: {identity_id}) updated.");

        Ok(profile)
    }

    /// Stops the event listener. State is frozen from here on.
    pub fn dispose(&self) {
        self.core.disposed.store(true, Ordering::SeqCst);
        if let Some(handle) = self.listener.lock().unwrap_or_else(|e| e.into_inner()).take() {
            handle.abort();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }
}

impl<B: AuthBackend + 'static> Drop for SessionCoordinator<B> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<B: AuthBackend> Core<B> {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Applies `f` unless the coordinator has been disposed. Returns whether it was applied.
    fn mutate(&self, f: impl FnOnce(&mut AuthState)) -> bool {
        if self.is_disposed() {
            return false;
        }
        self.state.send_modify(f);
        true
    }

    async fn call<T>(
        &self,
        future: impl Future<Output = std::result::Result<T, BackendError>>,
    ) -> std::result::Result<T, BackendError> {
        tokio::time::timeout(self.config.call_timeout, future).await.unwrap_or_else(|_| Err(BackendError::Timeout))
    }

    /// Replaces session and identity wholesale. Returns the adopted identity, if any.
    fn adopt_session(&self, session: Option<Session>) -> Option<Identity> {
        let identity = session.as_ref().map(|session| session.user.clone());
        let adopted = self.mutate(|state| {
            state.identity = identity.clone();
            state.session = session;
        });

        if adopted {
            identity
        } else {
            None
        }
    }

    async fn bootstrap(&self) {
        match self.call(self.backend.get_current_session()).await {
            Ok(session) => match self.adopt_session(session) {
                Some(identity) => self.resolve_profile(&identity).await,
                None => {
                    self.mutate(|state| state.loading = false);
                }
            },
            Err(e) => {
                error!("failed to get current session: {e}");
                self.mutate(|state| state.loading = false);
            }
        }
    }

    async fn on_lifecycle_event(&self, event: LifecycleEvent) {
        if self.is_disposed() {
            return;
        }
        debug!("lifecycle event {} received.", event.kind);

        match event.kind {
            EventKind::SignedIn | EventKind::TokenRefreshed => match self.adopt_session(event.session) {
                Some(identity) => self.resolve_profile(&identity).await,
                None => {
                    self.mutate(|state| state.loading = false);
                }
            },
            EventKind::SignedOut => {
                self.mutate(|state| {
                    state.session = None;
                    state.identity = None;
                    state.profile = None;
                    state.loading = false;
                });
            }
            EventKind::Other(_) => match self.adopt_session(event.session) {
                Some(identity) => self.resolve_profile(&identity).await,
                None => {
                    self.mutate(|state| {
                        state.profile = None;
                        state.loading = false;
                    });
                }
            },
        }
    }
}
