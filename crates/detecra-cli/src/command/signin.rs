use async_trait::async_trait;
use clap::Args;
use detecra_auth::OAuthProvider;
use inquire::{Password, Text};
use tracing::debug;

use crate::callback::CallbackListener;
use crate::context::Context;
use crate::utils::validation::{ensure_valid, validate_email, validate_password};
use crate::utils::{print_notice, print_success};

use super::RunCommand;

/// Path the sign in is started from. OAuth redirects from here land on the demo page.
const SIGN_IN_PATH: &str = "/signin";

#[derive(Args, Debug)]
pub struct SigninCommand {
    #[clap(short = 'e', long)]
    email: Option<String>,
    /// Sign in in the browser through google, github, facebook or twitter instead of with a
    /// password.
    #[clap(short = 'p', long, conflicts_with = "email")]
    provider: Option<OAuthProvider>,
}

#[async_trait]
impl RunCommand for SigninCommand {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        match self.provider {
            Some(provider) => sign_in_with_provider(ctx, provider).await?,
            None => self.sign_in_with_password(ctx).await?,
        }

        let state = ctx.wait_for_profile().await;
        let name = state.display_name().unwrap_or_else(|| "there".to_owned());
        print_success(&format!("Signed in. Welcome, {name}!"))
    }
}

impl SigninCommand {
    async fn sign_in_with_password(&self, ctx: &Context) -> anyhow::Result<()> {
        let email = match &self.email {
            Some(email) => {
                ensure_valid(email, validate_email)?;
                email.clone()
            }
            None => Text::new("Email:").with_validator(validate_email).prompt()?,
        };
        let password = Password::new("Password:").without_confirmation().with_validator(validate_password).prompt()?;

        ctx.coordinator.sign_in(email.trim(), &password).await?;
        Ok(())
    }
}

async fn sign_in_with_provider(ctx: &Context, provider: OAuthProvider) -> anyhow::Result<()> {
    let listener = CallbackListener::bind(&ctx.config.site.origin)?;
    let authorize_url = ctx.coordinator.sign_in_with_provider(provider, SIGN_IN_PATH).await?;

    if let Err(e) = webbrowser::open(authorize_url.as_str()) {
        debug!("failed to open browser: {e}");
    }
    print_notice(&format!("Continue signing in with {provider} in your browser:\n{authorize_url}"))?;

    let wait = ctx.config.oauth_wait();
    let code = tokio::task::spawn_blocking(move || listener.wait_for_code(wait)).await??;

    ctx.backend.exchange_code_for_session(&code).await?;
    Ok(())
}
