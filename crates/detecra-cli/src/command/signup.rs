use async_trait::async_trait;
use clap::Args;
use inquire::{Password, Text};

use crate::context::Context;
use crate::utils::print_success;
use crate::utils::validation::{ensure_valid, validate_email, validate_full_name, validate_new_password};

use super::RunCommand;

#[derive(Args, Debug)]
pub struct SignupCommand {
    #[clap(short = 'e', long)]
    email: Option<String>,
    #[clap(short = 'n', long = "full-name")]
    full_name: Option<String>,
}

#[async_trait]
impl RunCommand for SignupCommand {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        let full_name = match &self.full_name {
            Some(full_name) => {
                ensure_valid(full_name, validate_full_name)?;
                full_name.clone()
            }
            None => Text::new("Full name:").with_validator(validate_full_name).prompt()?,
        };

        let email = match &self.email {
            Some(email) => {
                ensure_valid(email, validate_email)?;
                email.clone()
            }
            None => Text::new("Email:").with_validator(validate_email).prompt()?,
        };

        let password = Password::new("Password:")
            .with_validator(validate_new_password)
            .with_custom_confirmation_message("Confirm password:")
            .with_custom_confirmation_error_message("Passwords do not match")
            .prompt()?;

        ctx.coordinator.sign_up(email.trim(), &password, full_name.trim()).await?;

        print_success("Account created! Check your email to confirm your account, then run `detecra signin`.")
    }
}
