use std::path::PathBuf;

use bon::Builder;
use url::Url;

#[derive(Builder, Debug, Clone)]
#[builder(on(String, into))]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://<project>.supabase.co`.
    pub url: Url,
    pub anon_key: String,
    /// Where the session is persisted between runs. Nothing is persisted when unset.
    pub session_file: Option<PathBuf>,
    #[builder(default = 16)]
    pub event_capacity: usize,
}

impl SupabaseConfig {
    pub(crate) fn auth_endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        with_trailing_slash(self.url.clone()).join("auth/v1/")?.join(path)
    }

    pub(crate) fn rest_endpoint(&self, table: &str) -> Result<Url, url::ParseError> {
        with_trailing_slash(self.url.clone()).join("rest/v1/")?.join(table)
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
