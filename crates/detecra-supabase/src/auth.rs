use chrono::Utc;
use detecra_auth::{BackendError, Identity, OAuthRequest, Session};
use serde_json::{json, Map, Value};
use url::Url;

use crate::backend::SupabaseBackend;
use crate::error::{check, Api};

pub(crate) const API_KEY_HEADER: &str = "apikey";

/// What the sign-up endpoint handed back.
#[derive(Debug, PartialEq)]
pub(crate) enum SignUpOutcome {
    /// Email confirmation is off: the user is signed in straight away.
    SignedIn(Session),
    /// The user exists but has to confirm their email before signing in.
    ConfirmationPending(Identity),
    Unknown,
}

impl SignUpOutcome {
    fn from_response(value: Value) -> Result<Self, serde_json::Error> {
        if value.get("access_token").is_some() {
            return Ok(Self::SignedIn(with_expiry(serde_json::from_value(value)?)));
        }
        if value.get("id").is_some() {
            return Ok(Self::ConfirmationPending(serde_json::from_value(value)?));
        }
        match value.get("user") {
            Some(user) if user.is_object() => Ok(Self::ConfirmationPending(serde_json::from_value(user.clone())?)),
            _ => Ok(Self::Unknown),
        }
    }
}

/// Older auth servers omit `expires_at`; derive it from `expires_in`.
fn with_expiry(mut session: Session) -> Session {
    if session.expires_at.is_none() {
        session.expires_at = session.expires_in.map(|expires_in| Utc::now().timestamp() + expires_in);
    }
    session
}

impl SupabaseBackend {
    pub(crate) async fn password_grant(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        self.token_grant("password", json!({ "email": email, "password": password })).await
    }

    pub(crate) async fn refresh_token_grant(&self, refresh_token: &str) -> Result<Session, BackendError> {
        self.token_grant("refresh_token", json!({ "refresh_token": refresh_token })).await
    }

    pub(crate) async fn exchange_code(&self, auth_code: &str, code_verifier: &str) -> Result<Session, BackendError> {
        self.token_grant("pkce", json!({ "auth_code": auth_code, "code_verifier": code_verifier })).await
    }

    async fn token_grant(&self, grant_type: &str, body: Value) -> Result<Session, BackendError> {
        let mut url = self.config.auth_endpoint("token").map_err(anyhow::Error::from)?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);

        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.config.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(anyhow::Error::from)?;
        let session = check(Api::Auth, response).await?.json::<Session>().await.map_err(anyhow::Error::from)?;

        Ok(with_expiry(session))
    }

    pub(crate) async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &Map<String, Value>,
        redirect_to: &Url,
    ) -> Result<SignUpOutcome, BackendError> {
        let mut url = self.config.auth_endpoint("signup").map_err(anyhow::Error::from)?;
        url.query_pairs_mut().append_pair("redirect_to", redirect_to.as_str());

        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.config.anon_key)
            .json(&json!({ "email": email, "password": password, "data": metadata }))
            .send()
            .await
            .map_err(anyhow::Error::from)?;
        let value = check(Api::Auth, response).await?.json::<Value>().await.map_err(anyhow::Error::from)?;

        Ok(SignUpOutcome::from_response(value).map_err(anyhow::Error::from)?)
    }

    pub(crate) async fn logout(&self, access_token: &str) -> Result<(), BackendError> {
        let url = self.config.auth_endpoint("logout").map_err(anyhow::Error::from)?;

        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.config.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(anyhow::Error::from)?;
        check(Api::Auth, response).await?;

        Ok(())
    }

    pub(crate) fn authorize_url(&self, request: &OAuthRequest, code_challenge: &str) -> Result<Url, url::ParseError> {
        let mut url = self.config.auth_endpoint("authorize")?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("provider", request.provider.as_str())
                .append_pair("redirect_to", request.redirect_to.as_str())
                .append_pair("code_challenge", code_challenge)
                .append_pair("code_challenge_method", "s256");
            for (key, value) in &request.query_params {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }
}
