use std::time::Duration;

use bon::Builder;
use url::Url;

use crate::retry::RetryPolicy;

#[derive(Builder, Debug, Clone)]
pub struct CoordinatorConfig {
    /// Origin of the site that hosts the sign-in pages. OAuth and email-confirmation redirects
    /// point back here.
    pub site_origin: Url,

    #[builder(default)]
    pub retry: RetryPolicy,

    /// Upper bound for every single backend call.
    #[builder(default = Duration::from_secs(30))]
    pub call_timeout: Duration,

    /// Pause after a successful sign-up before the first profile insert.
    #[builder(default = Duration::from_millis(500))]
    pub signup_settle: Duration,
}

impl CoordinatorConfig {
    /// Where an OAuth provider should send the user back to, given the path they started from.
    /// Starting from the sign-in or sign-up page lands on the demo page.
    pub fn oauth_redirect(&self, current_path: &str) -> Result<Url, url::ParseError> {
        let path = match current_path {
            "/signin" | "/signup" => "/demo",
            path => path,
        };
        self.site_origin.join(path)
    }
}
