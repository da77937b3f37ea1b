use async_trait::async_trait;
use clap::Args;

use crate::context::Context;
use crate::utils::{print_notice, print_success};

use super::RunCommand;

#[derive(Args, Debug)]
pub struct SignoutCommand {}

#[async_trait]
impl RunCommand for SignoutCommand {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        if !ctx.coordinator.state().is_signed_in() {
            return print_notice("Not signed in.");
        }

        ctx.coordinator.sign_out().await?;
        print_success("Signed out.")
    }
}
