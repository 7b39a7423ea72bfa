//! # fastpath-config
//!
//! Fastpath configuration.
//!
//! Values are layered, later sources overriding earlier ones:
//!
//! 1. built-in defaults ([`Config::default`])
//! 2. the global `~/.fastpath/fastpath.toml`
//! 3. the local `fastpath.toml` (or the file named by `FASTPATH_CONFIG`)
//! 4. `FASTPATH_*` environment variables
//! 5. any provider merged by the caller, such as CLI flags

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
extern crate tracing;

use alloy_primitives::Address;
use figment::{
    Figment, Metadata, Profile, Provider,
    providers::{Env, Format, Serialized, Toml},
    value::{Dict, Map},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

pub use figment;

pub mod error;
pub use error::{ConfigError, ExtractConfigError};

mod grant;
pub use grant::{CallGrant, FeeTokenGrant, GrantConfig, SpendGrant};

/// Fastpath configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JSON-RPC endpoint of the wallet connector.
    pub rpc_url: String,
    /// The smart account whose permission grants are queried.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<Address>,
    /// Chain id used for prepared calls. Queried with `eth_chainId` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// Whether dispatches should try a session key before the passkey wallet.
    pub prefer_session_key: bool,
    /// Check 4-byte selectors of outgoing calls against selector-restricted scope entries.
    pub enforce_selectors: bool,
    /// Delete local key material that no unexpired grant refers to after listing keys.
    pub prune_orphans: bool,
    /// Directory holding local session key material.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keystore_dir: Option<PathBuf>,
    /// Timeout for a single wallet request, in seconds.
    pub request_timeout: u64,
    /// Lifetime of newly granted session keys, in seconds.
    pub session_key_ttl: u64,
    /// Key type used for newly created session keys.
    pub key_type: String,
    /// Call status polling.
    pub poll: PollConfig,
    /// Scope requested for newly created session keys.
    pub grant: GrantConfig,
}

/// The `[poll]` section.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Delay between two `wallet_getCallsStatus` requests, in milliseconds.
    pub interval_ms: u64,
    /// Upper bound of status requests before giving up.
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { interval_ms: 5_000, max_attempts: 60 }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: Self::DEFAULT_RPC_URL.to_string(),
            account: None,
            chain_id: None,
            prefer_session_key: true,
            enforce_selectors: true,
            prune_orphans: false,
            keystore_dir: None,
            request_timeout: 30,
            session_key_ttl: 60 * 60,
            key_type: "p256".to_string(),
            poll: PollConfig::default(),
            grant: GrantConfig::default(),
        }
    }
}

impl Config {
    /// The default config file name.
    pub const FILE_NAME: &'static str = "fastpath.toml";

    /// The directory fastpath reserves for itself under the user's home directory.
    pub const FASTPATH_DIR_NAME: &'static str = ".fastpath";

    /// Default wallet connector endpoint.
    pub const DEFAULT_RPC_URL: &'static str = "http://127.0.0.1:8545";

    /// Sections that can be addressed from the environment, e.g. `FASTPATH_POLL_INTERVAL_MS`.
    pub const STANDALONE_SECTIONS: &'static [&'static str] = &["poll"];

    /// Loads the config from all default sources.
    pub fn load() -> Result<Self, ExtractConfigError> {
        Self::try_from(Self::figment())
    }

    /// Loads the config from all default sources, with `provider` merged on top.
    pub fn load_with<T: Provider>(provider: T) -> Result<Self, ExtractConfigError> {
        Self::try_from(Self::figment().merge(provider))
    }

    /// Attempts to extract a `Config` from `provider`.
    pub fn try_from<T: Provider>(provider: T) -> Result<Self, ExtractConfigError> {
        trace!("load config with provider: {:?}", provider.metadata());
        Figment::from(provider).extract::<Self>().map_err(ExtractConfigError::new)
    }

    /// Returns the default figment: defaults, global and local toml files, and the environment.
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Self::default());

        if let Some(global_toml) = Self::fastpath_dir_toml().filter(|p| p.exists()) {
            figment = figment.merge(Toml::file(global_toml));
        }

        figment
            .merge(Toml::file(Env::var_or("FASTPATH_CONFIG", Self::FILE_NAME)))
            .merge(
                Env::prefixed("FASTPATH_")
                    .ignore(&["CONFIG"])
                    .map(|key| {
                        let key = key.as_str();
                        if Self::STANDALONE_SECTIONS.iter().any(|section| {
                            key.starts_with(&format!("{}_", section.to_ascii_uppercase()))
                        }) {
                            key.replacen('_', ".", 1).into()
                        } else {
                            key.into()
                        }
                    })
                    .global(),
            )
    }

    /// Returns the path to fastpath's config dir: `~/.fastpath/`.
    pub fn fastpath_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(Self::FASTPATH_DIR_NAME))
    }

    /// Returns the path to the global TOML file: `~/.fastpath/fastpath.toml`.
    pub fn fastpath_dir_toml() -> Option<PathBuf> {
        Self::fastpath_dir().map(|p| p.join(Self::FILE_NAME))
    }

    /// Returns the default keystore dir: `~/.fastpath/session-keys`.
    pub fn default_keystore_dir() -> Option<PathBuf> {
        Some(Self::fastpath_dir()?.join("session-keys"))
    }

    /// Returns the configured keystore dir, falling back to [`Self::default_keystore_dir`].
    pub fn keystore_dir(&self) -> Option<PathBuf> {
        self.keystore_dir.clone().or_else(Self::default_keystore_dir)
    }

    /// Returns the per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

impl Provider for Config {
    fn metadata(&self) -> Metadata {
        Metadata::named("fastpath defaults")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, figment::Error> {
        Serialized::defaults(self).data()
    }
}
