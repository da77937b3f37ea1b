use std::sync::Arc;
use std::time::Duration;

use detecra_auth::{AuthState, SessionCoordinator};
use detecra_supabase::SupabaseBackend;
use tracing::debug;

use crate::config::AppConfig;

/// How long commands wait for the profile after a sign-in event.
const PROFILE_WAIT: Duration = Duration::from_secs(15);

pub(crate) struct Context {
    pub config: AppConfig,
    pub backend: Arc<SupabaseBackend>,
    pub coordinator: SessionCoordinator<SupabaseBackend>,
}

impl Context {
    pub async fn start(config: AppConfig) -> anyhow::Result<Self> {
        let backend = Arc::new(SupabaseBackend::new(config.supabase_config()?));
        let coordinator = SessionCoordinator::new(Arc::clone(&backend), (&config).into());

        coordinator.start().await;

        Ok(Self { config, backend, coordinator })
    }

    /// Waits until the signed-in identity has its profile, or gives up and returns whatever the
    /// state is by then.
    pub async fn wait_for_profile(&self) -> AuthState {
        let mut state = self.coordinator.subscribe();
        let ready = tokio::time::timeout(PROFILE_WAIT, state.wait_for(has_own_profile))
            .await
            .is_ok_and(|changed| changed.is_ok());

        if !ready {
            debug!("profile not available after {}s.", PROFILE_WAIT.as_secs());
        }
        self.coordinator.state()
    }

    pub fn dispose(&self) {
        self.coordinator.dispose();
    }
}

fn has_own_profile(state: &AuthState) -> bool {
    match (&state.identity, &state.profile) {
        (Some(identity), Some(profile)) => identity.id == profile.id,
        _ => false,
    }
}
