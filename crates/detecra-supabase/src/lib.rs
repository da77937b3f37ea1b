//! [`AuthBackend`](detecra_auth::AuthBackend) for a hosted Supabase project: GoTrue for
//! identities and sessions, PostgREST for the `user_profiles` table.

mod auth;
mod backend;
mod config;
mod error;
mod pkce;
mod rest;
mod session_store;

pub use backend::SupabaseBackend;
pub use config::SupabaseConfig;
