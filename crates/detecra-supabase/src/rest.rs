use detecra_auth::{BackendError, NewProfile, Profile, ProfilePatch};
use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use url::Url;

use crate::auth::API_KEY_HEADER;
use crate::backend::SupabaseBackend;
use crate::error::{check, Api};

const PROFILE_TABLE: &str = "user_profiles";
/// Makes PostgREST answer with a single object, and fail with `PGRST116` on zero rows.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const PREFER_HEADER: &str = "Prefer";
const RETURN_REPRESENTATION: &str = "return=representation";

impl SupabaseBackend {
    pub(crate) async fn select_profile(&self, id: &str) -> Result<Profile, BackendError> {
        let url = self.profile_url(Some(id), true)?;
        single(self.rest_request(Method::GET, url)).await
    }

    pub(crate) async fn insert_profile_row(&self, profile: &NewProfile) -> Result<Profile, BackendError> {
        let url = self.profile_url(None, false)?;
        single(self.rest_request(Method::POST, url).header(PREFER_HEADER, RETURN_REPRESENTATION).json(profile)).await
    }

    pub(crate) async fn update_profile_row(&self, id: &str, patch: &ProfilePatch) -> Result<Profile, BackendError> {
        let url = self.profile_url(Some(id), false)?;
        single(self.rest_request(Method::PATCH, url).header(PREFER_HEADER, RETURN_REPRESENTATION).json(patch)).await
    }

    fn profile_url(&self, id: Option<&str>, select_all: bool) -> Result<Url, BackendError> {
        let mut url = self.config.rest_endpoint(PROFILE_TABLE).map_err(anyhow::Error::from)?;
        let mut filters = Vec::new();
        if let Some(id) = id {
            filters.push(("id", format!("eq.{id}")));
        }
        if select_all {
            filters.push(("select", "*".to_owned()));
        }
        if !filters.is_empty() {
            url.query_pairs_mut().extend_pairs(filters);
        }
        Ok(url)
    }

    fn rest_request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(API_KEY_HEADER, &self.config.anon_key)
            .bearer_auth(self.bearer())
            .header(ACCEPT, SINGLE_OBJECT)
    }
}

async fn single<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, BackendError> {
    let response = request.send().await.map_err(anyhow::Error::from)?;
    Ok(check(Api::Rest, response).await?.json::<T>().await.map_err(anyhow::Error::from)?)
}
