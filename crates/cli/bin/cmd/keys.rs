use clap::{Parser, Subcommand};
use eyre::Result;
use fastpath_cli::{
    opts::{RpcOpts, resolver, wallet_client},
    utils,
};
use fastpath_config::Config;
use fastpath_session::{CreateSessionKey, KeyType, Lifecycle};
use std::time::Duration;

/// CLI arguments for `fastpath keys`.
#[derive(Debug, Subcommand)]
pub enum KeysSubcommand {
    /// List the account's active session keys.
    #[command(visible_alias = "ls")]
    List {
        #[command(flatten)]
        rpc: RpcOpts,

        /// Print the keys as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate a session key and request a grant for it.
    ///
    /// The requested scope is read from the `[grant]` section of the config.
    #[command(visible_alias = "new")]
    Create(CreateArgs),

    /// Revoke a session key's grant and delete its local material.
    #[command(visible_alias = "rm")]
    Revoke {
        /// The grant id, as printed by `fastpath keys list`.
        id: String,

        #[command(flatten)]
        rpc: RpcOpts,
    },

    /// Delete local key material that no active grant refers to.
    Prune {
        #[command(flatten)]
        rpc: RpcOpts,
    },
}

#[derive(Debug, Parser)]
pub struct CreateArgs {
    /// Key type of the new key. Defaults to the configured `key_type`.
    #[arg(long, value_name = "TYPE")]
    pub key_type: Option<KeyType>,

    /// Lifetime of the grant in seconds. Defaults to the configured `session_key_ttl`.
    #[arg(long, value_name = "SECS")]
    pub ttl: Option<u64>,

    #[command(flatten)]
    pub rpc: RpcOpts,
}

impl KeysSubcommand {
    pub async fn run(self) -> Result<()> {
        match self {
            Self::List { rpc, json } => {
                let config = rpc.load_config()?;
                let (wallet, resolver) = (wallet_client(&config)?, resolver(&config)?);
                let lifecycle = Lifecycle::new(&wallet, &resolver, config.account);
                let keys = lifecycle.list().await?;
                if config.prune_orphans {
                    let pruned = lifecycle.prune_orphans().await?;
                    debug!(count = pruned.len(), "pruned orphaned key material");
                }
                if json {
                    utils::print_json(&keys)?;
                } else if keys.is_empty() {
                    println!("No active session keys.");
                } else {
                    println!("{}", utils::keys_table(&keys, resolver.now()));
                }
            }
            Self::Create(args) => args.run().await?,
            Self::Revoke { id, rpc } => {
                let config = rpc.load_config()?;
                let (wallet, resolver) = (wallet_client(&config)?, resolver(&config)?);
                let key = Lifecycle::new(&wallet, &resolver, config.account)
                    .revoke_session_key(&id)
                    .await?;
                println!("Revoked session key {}", key.id);
            }
            Self::Prune { rpc } => {
                let config = rpc.load_config()?;
                let (wallet, resolver) = (wallet_client(&config)?, resolver(&config)?);
                let pruned = Lifecycle::new(&wallet, &resolver, config.account).prune_orphans().await?;
                if pruned.is_empty() {
                    println!("No orphaned key material.");
                }
                for public_key in pruned {
                    println!("Removed {public_key}");
                }
            }
        }
        Ok(())
    }
}

impl CreateArgs {
    pub async fn run(self) -> Result<()> {
        let config = self.rpc.load_config()?;
        let request = self.request(&config)?;
        let (wallet, resolver) = (wallet_client(&config)?, resolver(&config)?);
        let key = Lifecycle::new(&wallet, &resolver, config.account).create_session_key(request).await?;
        println!("Created {} session key {}", key.key_type, key.id);
        println!("Public key: {}", key.public_key);
        Ok(())
    }

    fn request(&self, config: &Config) -> Result<CreateSessionKey> {
        let mut request = CreateSessionKey::try_from(&config.grant)?;
        request.key_type = match self.key_type {
            Some(key_type) => key_type,
            None => config.key_type.parse().map_err(|e: String| eyre::eyre!(e))?,
        };
        request.ttl = Duration::from_secs(self.ttl.unwrap_or(config.session_key_ttl));
        Ok(request)
    }
}
