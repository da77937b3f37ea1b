use std::path::PathBuf;

use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};

use crate::context::Context;

use self::profile::ProfileCommand;
use self::signin::SigninCommand;
use self::signout::SignoutCommand;
use self::signup::SignupCommand;

pub mod profile;
pub mod signin;
pub mod signout;
pub mod signup;

#[async_trait]
pub(crate) trait RunCommand {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()>;
}

#[derive(Parser, Debug)]
#[command(term_width = 0, version, name = "detecra")]
pub struct Cli {
    #[clap(flatten)]
    pub args: GlobalArgs,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Config file to use instead of the one in the user config directory.
    #[arg(long, global = true, env = "DETECRA_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, env = "DETECRA_SUPABASE_URL")]
    pub supabase_url: Option<String>,

    #[arg(long, global = true, env = "DETECRA_SUPABASE_ANON_KEY", hide_env_values = true)]
    pub supabase_anon_key: Option<String>,

    #[arg(long, global = true, env = "DETECRA_LOG_LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an account with email and password.
    Signup(SignupCommand),
    /// Sign in with email and password or an OAuth provider.
    Signin(SigninCommand),
    /// Sign out and forget the stored session.
    Signout(SignoutCommand),
    /// Show or update the profile of the signed-in user.
    #[clap(subcommand)]
    Profile(ProfileCommand),
}

#[async_trait]
impl RunCommand for Command {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        match self {
            Command::Signup(cmd) => cmd.run(ctx).await,
            Command::Signin(cmd) => cmd.run(ctx).await,
            Command::Signout(cmd) => cmd.run(ctx).await,
            Command::Profile(cmd) => cmd.run(ctx).await,
        }
    }
}
