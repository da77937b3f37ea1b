use anyhow::Result;
use clap::Parser as _;
use command::{Cli, RunCommand};

use crate::context::Context;

mod callback;
mod command;
mod config;
mod context;
mod logger;
mod utils;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let app_config = config::load_config(&cli.args)?;

    logger::init_logger((&app_config).into());

    let context = Context::start(app_config).await?;
    let result = cli.command.run(&context).await;
    context.dispose();

    result
}
