#[macro_use]
extern crate tracing;

use clap::Parser;
use eyre::Result;
use fastpath_cli::{handler, utils};

mod args;
mod cmd;

use args::{Fastpath, FastpathSubcommand};

fn main() -> Result<()> {
    handler::install();
    utils::subscriber();

    let args = Fastpath::parse();
    tokio::runtime::Builder::new_multi_thread().enable_all().build()?.block_on(run(args))
}

async fn run(args: Fastpath) -> Result<()> {
    trace!(?args, "parsed arguments");
    match args.cmd {
        FastpathSubcommand::Keys { command } => command.run().await,
        FastpathSubcommand::Send(cmd) => cmd.run().await,
        FastpathSubcommand::Status(cmd) => cmd.run().await,
    }
}
