use alloy_primitives::Address;
use clap::Parser;
use eyre::Result;
use fastpath_config::{
    Config,
    figment::{
        self, Metadata, Profile,
        value::{Dict, Map, Value},
    },
};
use fastpath_session::{FileKeyStore, RpcWalletProvider, SessionKeyResolver, WalletClient};
use std::path::PathBuf;

/// Wallet connector options shared by all commands.
#[derive(Clone, Debug, Default, Parser)]
pub struct RpcOpts {
    /// The wallet connector's JSON-RPC endpoint.
    #[arg(long, short, visible_alias = "rpc-url", value_name = "URL")]
    pub url: Option<String>,

    /// The smart account whose permission grants are used.
    #[arg(long, short, value_name = "ADDRESS")]
    pub account: Option<Address>,

    /// Chain id of prepared calls. Queried from the wallet if unset.
    #[arg(long, value_name = "CHAIN_ID")]
    pub chain_id: Option<u64>,

    /// Directory holding local session key material.
    #[arg(long, value_name = "DIR")]
    pub keystore: Option<PathBuf>,

    /// Timeout for a single wallet request in seconds.
    #[arg(long, value_name = "SECS")]
    pub rpc_timeout: Option<u64>,
}

impl figment::Provider for RpcOpts {
    fn metadata(&self) -> Metadata {
        Metadata::named("RpcOpts")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, figment::Error> {
        Ok(Map::from([(Profile::Default, self.dict())]))
    }
}

impl RpcOpts {
    pub fn dict(&self) -> Dict {
        let mut dict = Dict::new();
        if let Some(url) = &self.url {
            dict.insert("rpc_url".into(), url.clone().into());
        }
        if let Some(account) = self.account {
            dict.insert("account".into(), account.to_string().into());
        }
        if let Some(chain_id) = self.chain_id {
            dict.insert("chain_id".into(), Value::from(chain_id));
        }
        if let Some(keystore) = &self.keystore {
            dict.insert("keystore_dir".into(), keystore.to_string_lossy().into_owned().into());
        }
        if let Some(timeout) = self.rpc_timeout {
            dict.insert("request_timeout".into(), Value::from(timeout));
        }
        dict
    }

    /// Loads the config with these options merged on top.
    pub fn load_config(&self) -> Result<Config> {
        Ok(Config::load_with(self.clone())?)
    }
}

/// Wallet client for the configured endpoint.
pub fn wallet_client(config: &Config) -> Result<WalletClient<RpcWalletProvider>> {
    let url: url::Url = config
        .rpc_url
        .parse()
        .map_err(|e| eyre::eyre!("invalid rpc url `{}`: {e}", config.rpc_url))?;
    Ok(WalletClient::new(RpcWalletProvider::new_http(url)).with_timeout(config.request_timeout()))
}

/// Resolver over the configured keystore directory.
pub fn resolver(config: &Config) -> Result<SessionKeyResolver<FileKeyStore>> {
    let dir = config
        .keystore_dir()
        .ok_or_else(|| eyre::eyre!("could not determine the keystore directory; pass --keystore"))?;
    Ok(SessionKeyResolver::new(FileKeyStore::open(dir)?))
}
