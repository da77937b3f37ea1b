use tracing::{debug, error, info, warn};

use super::Core;
use crate::backend::AuthBackend;
use crate::error::BackendError;
use crate::identity::Identity;
use crate::profile::{NewProfile, Profile};

impl<B: AuthBackend> Core<B> {
    /// Reads the profile of `identity`, creating it on first sight. Clears the loading flag once,
    /// whatever the outcome.
    pub(super) async fn resolve_profile(&self, identity: &Identity) {
        let profile = self.read_or_provision(identity).await;

        self.mutate(|state| {
            if let Some(profile) = profile {
                state.profile = Some(profile);
            }
            state.loading = false;
        });
    }

    async fn read_or_provision(&self, identity: &Identity) -> Option<Profile> {
        match self.call(self.backend.read_profile(&identity.id)).await {
            Ok(profile) => return Some(profile),
            Err(BackendError::NotFound) => debug!("profile(id: {}) not found.", identity.id),
            // any other read failure still falls through to provisioning
            Err(e) => warn!("failed to read profile(id: {}), provisioning anyway: {e}", identity.id),
        }

        self.provision(identity).await
    }

    async fn provision(&self, identity: &Identity) -> Option<Profile> {
        let new_profile = NewProfile::for_identity(identity);
        let mut attempt = 0;

        loop {
            if attempt > 0 && self.is_disposed() {
                debug!("profile(id: {}) provisioning abandoned after dispose.", identity.id);
                return None;
            }
            attempt += 1;

            match self.call(self.backend.insert_profile(&new_profile)).await {
                Ok(profile) => {
                    info!("profile(id: {}) provisioned.", identity.id);
                    return Some(profile);
                }
                Err(BackendError::Conflict) => {
                    debug!("profile(id: {}) already provisioned concurrently.", identity.id);
                    return match self.call(self.backend.read_profile(&identity.id)).await {
                        Ok(profile) => Some(profile),
                        Err(e) => {
                            warn!("failed to read concurrently provisioned profile(id: {}): {e}", identity.id);
                            None
                        }
                    };
                }
                Err(e) => match self.config.retry.delay_after(attempt) {
                    Some(_) if self.is_disposed() => {
                        debug!("profile(id: {}) provisioning abandoned after dispose: {e}", identity.id);
                        return None;
                    }
                    Some(delay) => {
                        warn!("failed to create profile(id: {}) on attempt {attempt}: {e}", identity.id);
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        error!("failed to create profile(id: {}) after {attempt} attempts: {e}", identity.id);
                        return None;
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::{Map, Value};
    use tokio::sync::broadcast;
    use url::Url;

    use crate::backend::{AuthBackend, LifecycleEvents, OAuthRequest};
    use crate::coordinator::test::{config, identity, session_for};
    use crate::coordinator::SessionCoordinator;
    use crate::error::BackendError;
    use crate::identity::{Identity, LifecycleEvent, Session};
    use crate::profile::{NewProfile, Profile, ProfilePatch};
    use crate::retry::RetryPolicy;

    /// A table with a uniqueness constraint on `id`. Every call yields once so that concurrent
    /// resolutions interleave between read and insert.
    #[derive(Default)]
    struct InMemoryBackend {
        rows: Mutex<HashMap<String, Profile>>,
        reads: AtomicUsize,
        inserts: AtomicUsize,
        hang_session_fetch: bool,
    }

    impl InMemoryBackend {
        fn row_count(&self) -> usize {
            self.rows.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl AuthBackend for InMemoryBackend {
        async fn get_current_session(&self) -> Result<Option<Session>, BackendError> {
            if self.hang_session_fetch {
                std::future::pending::<()>().await;
            }
            Ok(None)
        }

        fn subscribe(&self) -> LifecycleEvents {
            broadcast::channel(1).1
        }

        async fn read_profile(&self, id: &str) -> Result<Profile, BackendError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            let row = self.rows.lock().unwrap().get(id).cloned();
            tokio::task::yield_now().await;
            row.ok_or(BackendError::NotFound)
        }

        async fn insert_profile(&self, profile: &NewProfile) -> Result<Profile, BackendError> {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;

            let mut rows = self.rows.lock().unwrap();
            if rows.contains_key(&profile.id) {
                return Err(BackendError::Conflict);
            }
            let now = Utc::now();
            let row = Profile {
                id: profile.id.clone(),
                full_name: profile.full_name.clone(),
                email: profile.email.clone(),
                avatar_url: profile.avatar_url.clone(),
                github_username: profile.github_username.clone(),
                created_at: now,
                updated_at: now,
            };
            rows.insert(row.id.clone(), row.clone());
            Ok(row)
        }

        async fn update_profile(&self, _id: &str, _patch: &ProfilePatch) -> Result<Profile, BackendError> {
            Err(BackendError::Anyhow(anyhow::anyhow!("not supported")))
        }

        async fn end_session(&self) -> Result<(), BackendError> {
            Ok(())
        }

        async fn sign_in_with_password(&self, _email: &str, _password: &str) -> Result<Session, BackendError> {
            Err(BackendError::Anyhow(anyhow::anyhow!("not supported")))
        }

        async fn sign_up_with_password(
            &self,
            _email: &str,
            _password: &str,
            _metadata: &Map<String, Value>,
            _redirect_to: &Url,
        ) -> Result<Option<Identity>, BackendError> {
            Err(BackendError::Anyhow(anyhow::anyhow!("not supported")))
        }

        async fn sign_in_with_oauth(&self, _request: &OAuthRequest) -> Result<Url, BackendError> {
            Err(BackendError::Anyhow(anyhow::anyhow!("not supported")))
        }
    }

    #[tokio::test]
    async fn when_resolutions_race_then_exactly_one_row_is_created_and_both_converge() {
        let backend = Arc::new(InMemoryBackend::default());
        let first = SessionCoordinator::new(Arc::clone(&backend), config(RetryPolicy::immediate(3)));
        let second = SessionCoordinator::new(Arc::clone(&backend), config(RetryPolicy::immediate(3)));
        let user = identity("U1", "a@example.com");

        tokio::join!(first.resolve_profile(&user), second.resolve_profile(&user));

        assert_eq!(backend.row_count(), 1);
        assert_eq!(backend.inserts.load(Ordering::SeqCst), 2);
        // two initial reads plus the single re-read after the losing insert
        assert_eq!(backend.reads.load(Ordering::SeqCst), 3);
        assert_eq!(first.state().profile, second.state().profile);
        assert!(first.state().profile.is_some());
    }

    #[tokio::test]
    async fn when_sign_in_and_refresh_arrive_together_then_state_holds_the_stored_row() {
        let backend = Arc::new(InMemoryBackend::default());
        let coordinator = SessionCoordinator::new(Arc::clone(&backend), config(RetryPolicy::immediate(3)));
        let session = session_for(identity("U1", "a@example.com"));

        tokio::join!(
            coordinator.on_lifecycle_event(LifecycleEvent::signed_in(session.clone())),
            coordinator.on_lifecycle_event(LifecycleEvent::token_refreshed(session)),
        );

        let stored = backend.rows.lock().unwrap().get("U1").cloned();
        let state = coordinator.state();
        assert_eq!(backend.row_count(), 1);
        assert!(stored.is_some());
        assert_eq!(state.profile, stored);
        assert!(!state.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn when_session_fetch_hangs_then_timeout_clears_loading() {
        let backend = Arc::new(InMemoryBackend { hang_session_fetch: true, ..Default::default() });
        let mut config = config(RetryPolicy::immediate(3));
        config.call_timeout = Duration::from_secs(5);
        let coordinator = SessionCoordinator::new(backend, config);
        let started = tokio::time::Instant::now();

        coordinator.bootstrap().await;

        assert_eq!(started.elapsed(), Duration::from_secs(5));
        assert!(!coordinator.state().loading);
        assert!(coordinator.state().identity.is_none());
    }
}
