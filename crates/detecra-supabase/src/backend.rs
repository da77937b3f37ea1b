use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use detecra_auth::{
    AuthBackend, BackendError, Identity, LifecycleEvent, LifecycleEvents, NewProfile, OAuthRequest, Profile,
    ProfilePatch, Session,
};
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::SignUpOutcome;
use crate::config::SupabaseConfig;
use crate::pkce::Pkce;
use crate::session_store::SessionStore;

/// Sessions this close to expiry are refreshed before being handed out.
const REFRESH_MARGIN_SECS: i64 = 60;

pub struct SupabaseBackend {
    pub(crate) http: reqwest::Client,
    pub(crate) config: SupabaseConfig,
    session: Mutex<Option<Session>>,
    pkce_verifier: Mutex<Option<String>>,
    store: Option<SessionStore>,
    events: broadcast::Sender<LifecycleEvent>,
}

impl SupabaseBackend {
    pub fn new(config: SupabaseConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let store = config.session_file.clone().map(SessionStore::new);
        Self {
            http: reqwest::Client::new(),
            config,
            session: Mutex::new(None),
            pkce_verifier: Mutex::new(None),
            store,
            events,
        }
    }

    /// The in-memory session, without touching the network.
    pub fn session(&self) -> Option<Session> {
        lock(&self.session).clone()
    }

    /// Exchanges the current refresh token for a new session and reports `TOKEN_REFRESHED`.
    pub async fn refresh_session(&self) -> Result<Session, BackendError> {
        let refresh_token = self
            .session()
            .and_then(|session| session.refresh_token)
            .ok_or_else(|| anyhow::anyhow!("no refresh token available"))?;

        self.refresh_with(&refresh_token).await
    }

    /// Completes a redirect-based sign-in with the `code` the provider redirected back with.
    /// Reports `SIGNED_IN` on success.
    pub async fn exchange_code_for_session(&self, auth_code: &str) -> Result<Session, BackendError> {
        let verifier =
            lock(&self.pkce_verifier).take().ok_or_else(|| anyhow::anyhow!("no oauth sign in is pending"))?;

        let session = self.exchange_code(auth_code, &verifier).await?;
        info!("user(id: {}) signed in with oauth.", session.user.id);
        self.set_session(Some(session.clone()));
        self.emit(LifecycleEvent::signed_in(session.clone()));

        Ok(session)
    }

    async fn refresh_with(&self, refresh_token: &str) -> Result<Session, BackendError> {
        let session = self.refresh_token_grant(refresh_token).await?;
        debug!("session of user(id: {}) refreshed.", session.user.id);
        self.set_session(Some(session.clone()));
        self.emit(LifecycleEvent::token_refreshed(session.clone()));

        Ok(session)
    }

    pub(crate) fn bearer(&self) -> String {
        self.session().map(|session| session.access_token).unwrap_or_else(|| self.config.anon_key.clone())
    }

    fn set_session(&self, session: Option<Session>) {
        if let Some(store) = &self.store {
            let persisted = match &session {
                Some(session) => store.save(session),
                None => store.clear(),
            };
            if let Err(e) = persisted {
                warn!("failed to persist session to {}: {e}", store.path().display());
            }
        }
        *lock(&self.session) = session;
    }

    fn emit(&self, event: LifecycleEvent) {
        if self.events.send(event).is_err() {
            debug!("no lifecycle subscribers.");
        }
    }
}

#[async_trait]
impl AuthBackend for SupabaseBackend {
    async fn get_current_session(&self) -> Result<Option<Session>, BackendError> {
        let session = self.session().or_else(|| self.store.as_ref().and_then(SessionStore::load));
        let Some(session) = session else {
            return Ok(None);
        };

        if !session.expires_within(Utc::now(), chrono::Duration::seconds(REFRESH_MARGIN_SECS)) {
            *lock(&self.session) = Some(session.clone());
            return Ok(Some(session));
        }

        match session.refresh_token {
            Some(refresh_token) => self.refresh_with(&refresh_token).await.map(Some),
            None => {
                self.set_session(None);
                Ok(None)
            }
        }
    }

    fn subscribe(&self) -> LifecycleEvents {
        self.events.subscribe()
    }

    async fn read_profile(&self, id: &str) -> Result<Profile, BackendError> {
        self.select_profile(id).await
    }

    async fn insert_profile(&self, profile: &NewProfile) -> Result<Profile, BackendError> {
        self.insert_profile_row(profile).await
    }

    async fn update_profile(&self, id: &str, patch: &ProfilePatch) -> Result<Profile, BackendError> {
        self.update_profile_row(id, patch).await
    }

    async fn end_session(&self) -> Result<(), BackendError> {
        let remote = match self.session() {
            Some(session) => self.logout(&session.access_token).await,
            None => Ok(()),
        };

        self.set_session(None);
        self.emit(LifecycleEvent::signed_out());

        remote
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        let session = self.password_grant(email, password).await?;
        self.set_session(Some(session.clone()));
        self.emit(LifecycleEvent::signed_in(session.clone()));

        Ok(session)
    }

    async fn sign_up_with_password(
        &self,
        email: &str,
        password: &str,
        metadata: &Map<String, Value>,
        redirect_to: &Url,
    ) -> Result<Option<Identity>, BackendError> {
        match self.sign_up(email, password, metadata, redirect_to).await? {
            SignUpOutcome::SignedIn(session) => {
                let identity = session.user.clone();
                self.set_session(Some(session.clone()));
                self.emit(LifecycleEvent::signed_in(session));
                Ok(Some(identity))
            }
            SignUpOutcome::ConfirmationPending(identity) => Ok(Some(identity)),
            SignUpOutcome::Unknown => Ok(None),
        }
    }

    async fn sign_in_with_oauth(&self, request: &OAuthRequest) -> Result<Url, BackendError> {
        let pkce = Pkce::generate();
        let url = self.authorize_url(request, &pkce.challenge).map_err(anyhow::Error::from)?;
        *lock(&self.pkce_verifier) = Some(pkce.verifier);

        Ok(url)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
