//! Session and profile coordination for the Detecra site.
//!
//! [`SessionCoordinator`] keeps an in-memory view of the signed-in identity, its session and the
//! app-owned profile row, driven by the lifecycle events an [`AuthBackend`] reports. Every
//! identity seen signed in gets exactly one profile row, provisioned lazily from the identity's
//! metadata.

pub mod backend;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod identity;
pub mod profile;
pub mod retry;

pub use backend::{AuthBackend, LifecycleEvents, OAuthRequest};
pub use config::CoordinatorConfig;
pub use coordinator::{AuthState, SessionCoordinator};
pub use error::{BackendError, Error, Result};
pub use identity::{EventKind, Identity, LifecycleEvent, OAuthProvider, Session};
pub use profile::{NewProfile, Profile, ProfileDefaults, ProfilePatch};
pub use retry::{Backoff, RetryPolicy};
