use alloy_primitives::{Address, Bytes, U256};
use clap::Parser;
use eyre::Result;
use fastpath_cli::{
    opts::{RpcOpts, resolver, wallet_client},
    utils,
};
use fastpath_session::{
    CallsStatus, DispatchOptions, Dispatcher, Poller, RequiredPermissions, TransactionCall,
    TransactionResult,
};

/// CLI arguments for `fastpath send`.
#[derive(Debug, Parser)]
pub struct SendArgs {
    /// The call target.
    #[arg(long, value_name = "ADDRESS")]
    pub to: Address,

    /// ABI-encoded calldata.
    #[arg(long, value_name = "HEX")]
    pub data: Option<Bytes>,

    /// Native value attached to the call, in wei.
    #[arg(long, value_name = "WEI")]
    pub value: Option<U256>,

    /// Targets the session key must cover. Defaults to the call target.
    #[arg(long = "require", value_name = "ADDRESS", num_args = 1..)]
    pub required: Vec<Address>,

    /// Tokens the call spends, looked up in the key's spend limits.
    #[arg(long = "require-token", value_name = "ADDRESS", num_args = 1..)]
    pub required_tokens: Vec<Address>,

    /// Always send through the passkey wallet.
    #[arg(long)]
    pub no_session_key: bool,

    /// Wait until the bundle leaves the pending state.
    #[arg(long)]
    pub wait: bool,

    /// Print the result as JSON.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub rpc: RpcOpts,
}

impl SendArgs {
    pub async fn run(self) -> Result<()> {
        let config = self.rpc.load_config()?;
        let calls = vec![self.call()];
        let required = self.required_permissions(&calls);
        let prefer_session_key = config.prefer_session_key && !self.no_session_key;

        let dispatcher = Dispatcher::new(
            wallet_client(&config)?,
            resolver(&config)?,
            DispatchOptions::from(&config),
        );
        let result = dispatcher.execute(&calls, &required, prefer_session_key).await;
        debug!(?result, "dispatched");

        if self.json {
            utils::print_json(&result)?;
        } else {
            print_result(&result);
        }
        let id = match (result.success, &result.transaction_id) {
            (true, Some(id)) => id.clone(),
            _ if result.is_user_rejected() => eyre::bail!("transaction cancelled in the wallet"),
            _ => eyre::bail!(
                "transaction failed: {}",
                result.error.as_deref().unwrap_or("no call bundle id returned")
            ),
        };

        if self.wait {
            let status = Poller::from(&config.poll)
                .wait_for_calls_status(dispatcher.wallet(), &id, &utils::ctrl_c_token())
                .await?;
            print_status(&status, self.json)?;
        }
        Ok(())
    }

    fn call(&self) -> TransactionCall {
        let mut call = TransactionCall::new(self.to);
        if let Some(data) = &self.data {
            call = call.with_data(data.clone());
        }
        if let Some(value) = self.value {
            call = call.with_value(value);
        }
        call
    }

    fn required_permissions(&self, calls: &[TransactionCall]) -> RequiredPermissions {
        let required = if self.required.is_empty() {
            RequiredPermissions::from_calls(calls)
        } else {
            RequiredPermissions::new(self.required.iter().copied())
        };
        if self.required_tokens.is_empty() {
            return required;
        }
        required.with_tokens(self.required_tokens.iter().copied())
    }
}

fn print_result(result: &TransactionResult) {
    let Some(id) = &result.transaction_id else { return };
    match &result.key_id {
        Some(key_id) => println!("Sent {id} with session key {key_id}"),
        None => println!("Sent {id} through the wallet"),
    }
}

pub(crate) fn print_status(status: &CallsStatus, json: bool) -> Result<()> {
    if json {
        return utils::print_json(status);
    }
    let outcome = if status.is_success() { "confirmed" } else { "failed" };
    println!("Status {} ({outcome})", status.status);
    Ok(())
}
