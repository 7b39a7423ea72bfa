use crate::cmd::send::print_status;
use clap::Parser;
use eyre::Result;
use fastpath_cli::{
    opts::{RpcOpts, wallet_client},
    utils,
};
use fastpath_session::Poller;

/// CLI arguments for `fastpath status`.
#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// The call bundle id returned by `fastpath send`.
    pub id: String,

    /// Poll until the bundle leaves the pending state.
    #[arg(long)]
    pub wait: bool,

    /// Print the status as JSON.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub rpc: RpcOpts,
}

impl StatusArgs {
    pub async fn run(self) -> Result<()> {
        let config = self.rpc.load_config()?;
        let wallet = wallet_client(&config)?;
        let status = if self.wait {
            Poller::from(&config.poll)
                .wait_for_calls_status(&wallet, &self.id, &utils::ctrl_c_token())
                .await?
        } else {
            wallet.get_calls_status(&self.id).await?
        };
        if !self.json && status.is_pending() {
            println!("Status {} (pending)", status.status);
            return Ok(());
        }
        print_status(&status, self.json)
    }
}
